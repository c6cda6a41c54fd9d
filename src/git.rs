//! Git operations for deploys: picking the ref to ship and pushing it.

use crate::runner;
use anyhow::Result;
use std::fmt;
use std::process::{Command, ExitStatus};

/// What gets pushed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GitRef {
    Branch(String),
    Tag(String),
}

impl GitRef {
    pub fn name(&self) -> &str {
        match self {
            Self::Branch(name) | Self::Tag(name) => name,
        }
    }

    /// Refspec pushing this ref onto `remote_branch`.
    ///
    /// Tags are peeled so annotated tags push their commit.
    pub fn refspec(&self, remote_branch: &str) -> String {
        match self {
            Self::Branch(name) => format!("{name}:refs/heads/{remote_branch}"),
            Self::Tag(name) => format!("{name}^{{}}:refs/heads/{remote_branch}"),
        }
    }
}

impl fmt::Display for GitRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Branch(name) => write!(f, "branch {name}"),
            Self::Tag(name) => write!(f, "tag {name}"),
        }
    }
}

/// Result of a push.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Success,
    Failed(Option<i32>),
    Interrupted,
}

impl PushOutcome {
    pub fn from_status(status: ExitStatus) -> Self {
        if status.success() {
            return Self::Success;
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if status.signal() == Some(libc::SIGINT) {
                return Self::Interrupted;
            }
        }
        // git exits 130 when it reports an interrupt itself.
        match status.code() {
            Some(130) => Self::Interrupted,
            code => Self::Failed(code),
        }
    }
}

/// Currently checked-out branch, `None` when detached.
pub fn current_branch() -> Result<Option<String>> {
    let branch = runner::run_capture("git", &["rev-parse", "--abbrev-ref", "HEAD"])?;
    Ok(parse_branch(&branch))
}

fn parse_branch(output: &str) -> Option<String> {
    match output.trim() {
        "" | "HEAD" => None,
        name => Some(name.to_string()),
    }
}

/// All tags in the repository.
pub fn tags() -> Result<Vec<String>> {
    let output = runner::run_capture("git", &["tag", "--list"])?;
    Ok(output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect())
}

/// Most recent tag reachable from HEAD.
pub fn latest_tag() -> Option<String> {
    runner::run_capture("git", &["describe", "--tags", "--abbrev=0"])
        .ok()
        .filter(|t| !t.is_empty())
}

/// Force-push `git_ref` to `url`, streaming git's progress to `on_line`.
pub fn push(
    url: &str,
    git_ref: &GitRef,
    remote_branch: &str,
    on_line: &mut dyn FnMut(&str),
) -> Result<PushOutcome> {
    let refspec = git_ref.refspec(remote_branch);
    log::debug!("git push --force {url} {refspec}");
    let status = runner::run_streaming(
        Command::new("git").args(["push", "--force", url, &refspec]),
        on_line,
    )?;
    Ok(PushOutcome::from_status(status))
}

/// Add a remote. Returns `false` when it already exists.
pub fn add_remote(name: &str, url: &str) -> Result<bool> {
    let existing = runner::run_capture("git", &["remote"])?;
    if existing.lines().any(|r| r.trim() == name) {
        return Ok(false);
    }
    runner::run_capture("git", &["remote", "add", name, url])?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refspec() {
        assert_eq!(
            GitRef::Branch("feature/x".into()).refspec("main"),
            "feature/x:refs/heads/main"
        );
        assert_eq!(
            GitRef::Tag("v1.2.0".into()).refspec("main"),
            "v1.2.0^{}:refs/heads/main"
        );
    }

    #[test]
    fn test_parse_branch() {
        assert_eq!(parse_branch("main\n").as_deref(), Some("main"));
        assert_eq!(parse_branch("HEAD"), None);
        assert_eq!(parse_branch(""), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_push_outcome_from_status() {
        use std::os::unix::process::ExitStatusExt;

        assert_eq!(
            PushOutcome::from_status(ExitStatus::from_raw(0)),
            PushOutcome::Success
        );
        assert_eq!(
            PushOutcome::from_status(ExitStatus::from_raw(1 << 8)),
            PushOutcome::Failed(Some(1))
        );
        assert_eq!(
            PushOutcome::from_status(ExitStatus::from_raw(libc::SIGINT)),
            PushOutcome::Interrupted
        );
    }
}
