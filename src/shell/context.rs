//! Read-only view of session state handed to stages and predicates.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

use super::path;

/// Working directory plus environment, as seen by commands.
#[derive(Debug, Clone, Default)]
pub struct ExecContext {
    pub cwd: PathBuf,
    pub env: HashMap<String, String>,
}

impl ExecContext {
    /// Snapshot of the current process: working directory and environment.
    pub fn from_process() -> std::io::Result<Self> {
        Ok(Self {
            cwd: env::current_dir()?,
            env: env::vars().collect(),
        })
    }

    pub fn var(&self, key: &str) -> Option<&str> {
        self.env.get(key).map(String::as_str)
    }

    /// Resolve a path argument against the working directory.
    pub fn resolve(&self, p: &str) -> PathBuf {
        path::resolve(&self.cwd, p)
    }

    /// Locate an executable using this context's `PATH`.
    pub fn which(&self, name: &str) -> Option<PathBuf> {
        which::which_in(name, self.var("PATH"), &self.cwd).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_which_uses_context_path() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ExecContext {
            cwd: dir.path().to_path_buf(),
            env: HashMap::from([("PATH".to_string(), dir.path().display().to_string())]),
        };
        assert!(ctx.which("definitely-not-a-real-binary-xyz").is_none());
    }

    #[test]
    fn test_resolve_against_cwd() {
        let ctx = ExecContext {
            cwd: PathBuf::from("/srv/data"),
            env: HashMap::new(),
        };
        assert_eq!(ctx.resolve("in/file.txt"), PathBuf::from("/srv/data/in/file.txt"));
    }
}
