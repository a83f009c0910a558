//! CI platform classification.
//!
//! Inspects well-known environment variables to figure out which CI system
//! the process is running under and builds an immutable descriptor carrying
//! the platform's identity seeds and metadata attributes.

use std::collections::BTreeMap;
use std::env;
use tracing::debug;

/// Presence-indicator variables, checked in order. The first match wins, so
/// the ordering is part of the contract: an environment that sets both
/// `GITLAB_CI` and `CIRCLECI` classifies as GitLab.
const DETECTION_ORDER: &[(&str, CiPlatform)] = &[
    ("GITLAB_CI", CiPlatform::GitLab),
    ("CIRCLECI", CiPlatform::CircleCi),
    ("TRAVIS", CiPlatform::Travis),
    ("GITHUB_ACTION", CiPlatform::GitHubActions),
    ("BITBUCKET_BUILD_NUMBER", CiPlatform::Bitbucket),
];

/// The closed set of recognized CI platforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CiPlatform {
    GitLab,
    CircleCi,
    Travis,
    GitHubActions,
    Bitbucket,
    Default,
}

/// Immutable snapshot of the CI environment, created once per invocation.
///
/// `trace_seed` and `span_seed` feed deterministic trace-identity
/// derivation; `attributes` become span resource attributes. Attribute
/// values mirror the underlying variables and may be empty when a variable
/// is unset; an empty value is valid metadata, not an error.
#[derive(Debug, Clone)]
pub struct CiDescriptor {
    pub name: &'static str,
    pub service_name: String,
    pub span_name: String,
    pub trace_seed: String,
    pub span_seed: String,
    pub attributes: BTreeMap<String, String>,
}

/// Classify the current process environment.
pub fn detect() -> CiDescriptor {
    let platform = DETECTION_ORDER
        .iter()
        .find(|(var, _)| env::var_os(var).is_some())
        .map(|(_, platform)| *platform)
        .unwrap_or(CiPlatform::Default);

    debug!(platform = platform.name(), "classified CI environment");
    platform.descriptor()
}

impl CiPlatform {
    /// Display name of the platform.
    pub fn name(&self) -> &'static str {
        match self {
            CiPlatform::GitLab => "GitLab-CI",
            CiPlatform::CircleCi => "CircleCI",
            CiPlatform::Travis => "Travis-CI",
            CiPlatform::GitHubActions => "GitHub-Actions",
            CiPlatform::Bitbucket => "Bitbucket",
            CiPlatform::Default => "Default",
        }
    }

    /// Build the descriptor for this platform from the current environment.
    pub fn descriptor(&self) -> CiDescriptor {
        match self {
            CiPlatform::GitLab => CiDescriptor {
                name: self.name(),
                service_name: self.name().to_ascii_lowercase(),
                span_name: env_or_empty("CI_JOB_NAME"),
                trace_seed: env_or_empty("CI_PIPELINE_ID"),
                span_seed: env_or_empty("CI_JOB_ID"),
                // https://docs.gitlab.com/ee/ci/variables/predefined_variables.html
                attributes: attribute_map(&[
                    ("gitlab.project.id", "CI_PROJECT_ID"),
                    ("gitlab.project.name", "CI_PROJECT_NAME"),
                    ("gitlab.pipeline.id", "CI_PIPELINE_ID"),
                    ("gitlab.pipeline.ref", "CI_COMMIT_REF_NAME"),
                    ("gitlab.pipeline.sha", "CI_COMMIT_SHA"),
                    ("gitlab.job.id", "CI_JOB_ID"),
                    ("gitlab.job.name", "CI_JOB_NAME"),
                    ("gitlab.job.stage", "CI_JOB_STAGE"),
                ]),
            },
            CiPlatform::CircleCi => CiDescriptor {
                name: self.name(),
                service_name: self.name().to_ascii_lowercase(),
                span_name: env_or_empty("CIRCLE_JOB"),
                trace_seed: env_or_empty("CIRCLE_WORKFLOW_ID"),
                span_seed: env_or_empty("CIRCLE_WORKFLOW_JOB_ID"),
                // https://circleci.com/docs/variables/
                attributes: attribute_map(&[
                    ("circleci.project.name", "CIRCLE_PROJECT_REPONAME"),
                    ("circleci.workflow.id", "CIRCLE_WORKFLOW_ID"),
                    ("circleci.workflow.job_id", "CIRCLE_WORKFLOW_JOB_ID"),
                    ("circleci.build.num", "CIRCLE_BUILD_NUM"),
                    ("circleci.build.url", "CIRCLE_BUILD_URL"),
                    ("circleci.job", "CIRCLE_JOB"),
                    ("circleci.sha", "CIRCLE_SHA1"),
                ]),
            },
            CiPlatform::Travis => CiDescriptor {
                name: self.name(),
                service_name: self.name().to_ascii_lowercase(),
                span_name: env_or_empty("TRAVIS_JOB_NAME"),
                trace_seed: env_or_empty("TRAVIS_BUILD_ID"),
                span_seed: env_or_empty("TRAVIS_JOB_ID"),
                // https://docs.travis-ci.com/user/environment-variables/
                attributes: attribute_map(&[
                    ("travis.build.branch", "TRAVIS_BRANCH"),
                    ("travis.build.id", "TRAVIS_BUILD_ID"),
                    ("travis.build.url", "TRAVIS_BUILD_WEB_URL"),
                    ("travis.job.name", "TRAVIS_JOB_NAME"),
                    ("travis.job.number", "TRAVIS_JOB_NUMBER"),
                    ("travis.job.url", "TRAVIS_JOB_WEB_URL"),
                    ("travis.repo", "TRAVIS_REPO_SLUG"),
                    ("travis.sha", "TRAVIS_COMMIT"),
                ]),
            },
            CiPlatform::GitHubActions => CiDescriptor {
                name: self.name(),
                service_name: self.name().to_ascii_lowercase(),
                span_name: env_or_empty("GITHUB_JOB"),
                // A run id alone is not unique across re-runs of the same
                // workflow; the attempt counter disambiguates.
                trace_seed: format!(
                    "{}-{}-{}",
                    env_or_empty("GITHUB_RUN_ID"),
                    env_or_empty("GITHUB_RUN_NUMBER"),
                    env_or_empty("GITHUB_RUN_ATTEMPT"),
                ),
                span_seed: env_or_empty("GITHUB_JOB"),
                // https://docs.github.com/en/actions/learn-github-actions/variables
                attributes: attribute_map(&[
                    ("github.action", "GITHUB_ACTION"),
                    ("github.action.repo", "GITHUB_ACTION_REPOSITORY"),
                    ("github.workflow", "GITHUB_WORKFLOW"),
                    ("github.job.id", "GITHUB_JOB"),
                    ("github.run.id", "GITHUB_RUN_ID"),
                    ("github.run.number", "GITHUB_RUN_NUMBER"),
                    ("github.ref.name", "GITHUB_REF"),
                    ("github.ref.type", "GITHUB_REF_TYPE"),
                    ("github.repo.name", "GITHUB_REPOSITORY"),
                    ("github.repo.id", "GITHUB_REPOSITORY_ID"),
                    ("github.repo.owner", "GITHUB_REPOSITORY_OWNER"),
                    ("github.repo.owner-id", "GITHUB_REPOSITORY_OWNER_ID"),
                    ("github.sha", "GITHUB_SHA"),
                ]),
            },
            CiPlatform::Bitbucket => CiDescriptor {
                name: self.name(),
                service_name: self.name().to_ascii_lowercase(),
                // Bitbucket has no step-name variable; the step UUID is the
                // closest stable handle.
                span_name: env_or_empty("BITBUCKET_STEP_UUID"),
                trace_seed: env_or_empty("BITBUCKET_PIPELINE_UUID"),
                span_seed: env_or_empty("BITBUCKET_STEP_UUID"),
                // https://support.atlassian.com/bitbucket-cloud/docs/variables-and-secrets/
                attributes: attribute_map(&[
                    ("bitbucket.build", "BITBUCKET_BUILD_NUMBER"),
                    ("bitbucket.sha", "BITBUCKET_COMMIT"),
                    ("bitbucket.branch", "BITBUCKET_BRANCH"),
                    ("bitbucket.repo.slug", "BITBUCKET_REPO_SLUG"),
                    ("bitbucket.repo.uuid", "BITBUCKET_REPO_UUID"),
                ]),
            },
            // No CI indicators present. There is no stable identity to
            // derive from, so the seeds are random and runs will not
            // converge on a shared trace.
            CiPlatform::Default => CiDescriptor {
                name: self.name(),
                service_name: "tracewrap".to_string(),
                span_name: "cmd".to_string(),
                trace_seed: random_seed(),
                span_seed: random_seed(),
                attributes: BTreeMap::new(),
            },
        }
    }
}

fn env_or_empty(key: &str) -> String {
    env::var(key).unwrap_or_default()
}

fn attribute_map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(key, var)| ((*key).to_string(), env_or_empty(var)))
        .collect()
}

fn random_seed() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Mutex, MutexGuard};

    // Process environment is global; tests that touch it must not overlap.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn scrubbed_env() -> MutexGuard<'static, ()> {
        let guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        for (var, _) in DETECTION_ORDER {
            unsafe { env::remove_var(var) };
        }
        guard
    }

    fn set(key: &str, value: &str) {
        unsafe { env::set_var(key, value) };
    }

    fn unset(key: &str) {
        unsafe { env::remove_var(key) };
    }

    #[test]
    fn detects_each_platform_by_indicator() {
        let cases = [
            ("GITLAB_CI", "GitLab-CI"),
            ("CIRCLECI", "CircleCI"),
            ("TRAVIS", "Travis-CI"),
            ("GITHUB_ACTION", "GitHub-Actions"),
            ("BITBUCKET_BUILD_NUMBER", "Bitbucket"),
        ];
        for (var, want) in cases {
            let _guard = scrubbed_env();
            set(var, "true");
            let descriptor = detect();
            unset(var);
            assert_eq!(descriptor.name, want);
        }
    }

    #[test]
    fn gitlab_wins_when_circleci_is_also_set() {
        let _guard = scrubbed_env();
        set("GITLAB_CI", "true");
        set("CIRCLECI", "true");
        let descriptor = detect();
        unset("GITLAB_CI");
        unset("CIRCLECI");
        assert_eq!(descriptor.name, "GitLab-CI");
    }

    #[test]
    fn unrecognized_environment_falls_back_to_default() {
        let _guard = scrubbed_env();
        set("SOME_OTHER_CI", "true");
        let descriptor = detect();
        unset("SOME_OTHER_CI");
        assert_eq!(descriptor.name, "Default");
        assert_eq!(descriptor.service_name, "tracewrap");
        assert_eq!(descriptor.span_name, "cmd");
    }

    #[test]
    fn unset_metadata_keeps_keys_with_empty_values() {
        let _guard = scrubbed_env();
        for var in [
            "CI_PROJECT_ID",
            "CI_PROJECT_NAME",
            "CI_PIPELINE_ID",
            "CI_COMMIT_REF_NAME",
            "CI_COMMIT_SHA",
            "CI_JOB_ID",
            "CI_JOB_NAME",
            "CI_JOB_STAGE",
        ] {
            unset(var);
        }
        set("GITLAB_CI", "true");
        let descriptor = detect();
        unset("GITLAB_CI");

        assert_eq!(descriptor.attributes.len(), 8);
        assert!(descriptor.attributes.values().all(String::is_empty));
        assert!(descriptor.attributes.contains_key("gitlab.pipeline.sha"));
    }

    #[test]
    fn github_trace_seed_includes_run_attempt() {
        let _guard = scrubbed_env();
        set("GITHUB_ACTION", "run1");
        set("GITHUB_RUN_ID", "10");
        set("GITHUB_RUN_NUMBER", "2");
        set("GITHUB_RUN_ATTEMPT", "3");
        let descriptor = detect();
        for var in [
            "GITHUB_ACTION",
            "GITHUB_RUN_ID",
            "GITHUB_RUN_NUMBER",
            "GITHUB_RUN_ATTEMPT",
        ] {
            unset(var);
        }
        assert_eq!(descriptor.trace_seed, "10-2-3");
    }

    #[test]
    fn default_seeds_are_random_per_invocation() {
        let _guard = scrubbed_env();
        let first = CiPlatform::Default.descriptor();
        let second = CiPlatform::Default.descriptor();
        assert_eq!(first.trace_seed.len(), 32);
        assert_ne!(first.trace_seed, second.trace_seed);
        assert_ne!(first.trace_seed, first.span_seed);
    }

    #[test]
    fn service_name_is_lowercased_platform_name() {
        let _guard = scrubbed_env();
        set("CIRCLECI", "true");
        let descriptor = detect();
        unset("CIRCLECI");
        assert_eq!(descriptor.service_name, "circleci");
    }
}
