//! CI context derived from Drone environment variables.

use crate::env::{
    Environment, BUILD_EVENT, COMMIT_BRANCH, COMMIT_SHA, REMOTE_URL, SOURCE_BRANCH, TAG,
};

/// Repository identity and build trigger of the current run.
///
/// Missing variables yield empty strings, never errors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CiContext {
    pub repository: String,

    /// One of `tag`, `pull_request`, `branch`, `push`, `commit`, or empty.
    pub build_event: String,

    pub build_event_value: String,
}

impl CiContext {
    pub fn from_env(env: &Environment) -> Self {
        let (build_event, build_event_value) = build_event_info(env);
        Self {
            repository: env.get_or_empty(REMOTE_URL),
            build_event,
            build_event_value,
        }
    }
}

/// Classify the build trigger and pick its value.
///
/// A push with a known branch is reported as `branch`; `tag` and
/// `pull_request` keep their Drone names. Without a recognized
/// `DRONE_BUILD_EVENT`, a tag wins over a commit SHA.
pub fn build_event_info(env: &Environment) -> (String, String) {
    let owned = |event: &str, value: Option<&str>| {
        (event.to_string(), value.unwrap_or_default().to_string())
    };

    match env.get(BUILD_EVENT) {
        Some("tag") => owned("tag", env.get(TAG)),
        Some("pull_request") => owned("pull_request", env.get(SOURCE_BRANCH)),
        Some("push") => match env.get(COMMIT_BRANCH) {
            Some(branch) => owned("branch", Some(branch)),
            None => owned("push", None),
        },
        _ => {
            if let Some(tag) = env.get(TAG) {
                owned("tag", Some(tag))
            } else if let Some(sha) = env.get(COMMIT_SHA) {
                owned("commit", Some(sha))
            } else {
                owned("", None)
            }
        }
    }
}
