use thiserror::Error;

/// Failure of a single external `git` invocation.
#[derive(Debug, Error)]
pub enum GitError {
    /// The `git` process could not be started at all (binary missing, bad cwd, ...).
    #[error("failed to spawn `git {command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    /// `git` ran but exited unsuccessfully.
    #[error("`git {command}` exited with {}: {stderr}", exit_label(.code))]
    Failed {
        command: String,
        /// Exit code, `None` when the process was killed by a signal.
        code: Option<i32>,
        stderr: String,
    },
}

impl GitError {
    /// The git sub-command line that failed, without the leading `git`.
    pub fn command(&self) -> &str {
        match self {
            Self::Spawn { command, .. } | Self::Failed { command, .. } => command,
        }
    }
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {code}"),
        None => "signal".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_display_includes_command_and_stderr() {
        let err = GitError::Failed {
            command: "push origin main".to_string(),
            code: Some(128),
            stderr: "fatal: unable to access remote".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("git push origin main"), "got: {text}");
        assert!(text.contains("status 128"), "got: {text}");
        assert!(text.contains("unable to access remote"), "got: {text}");
        assert_eq!(err.command(), "push origin main");
    }

    #[test]
    fn test_failed_display_without_exit_code() {
        let err = GitError::Failed {
            command: "status --porcelain".to_string(),
            code: None,
            stderr: String::new(),
        };
        assert!(err.to_string().contains("signal"));
    }
}
