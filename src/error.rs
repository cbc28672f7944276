//! Error taxonomy shared by the session, builtins and pipeline stages.

use std::io;
use std::process::ExitStatus;
use std::sync::Arc;

use thiserror::Error;

pub type Result<T, E = ShellError> = std::result::Result<T, E>;

/// Coarse classification of a [`ShellError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed quoting or line structure
    Syntax,
    /// Wrong arity or malformed argument for a command
    Argument,
    /// Missing alias, executable or file
    NotFound,
    /// Stream, filesystem or process failure
    Io,
    /// Conditional expression failure
    Eval,
}

#[derive(Debug, Clone, Error)]
pub enum ShellError {
    #[error("syntax error: {0}")]
    Syntax(String),

    #[error("{0}")]
    Argument(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: Arc<io::Error>,
    },

    /// An external process ran but did not exit successfully.
    #[error("{program}: {status}")]
    Status { program: String, status: String },

    #[error("eval: {0}")]
    Eval(String),

    /// Failure of one command of a script line, tagged with the command name
    /// and the (expanded) line it came from.
    #[error("{stage} failed in `{line}`: {source}")]
    Stage {
        stage: String,
        line: String,
        #[source]
        source: Box<ShellError>,
    },
}

impl ShellError {
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        ShellError::Io {
            context: context.into(),
            source: Arc::new(source),
        }
    }

    pub fn status(program: impl Into<String>, status: ExitStatus) -> Self {
        ShellError::Status {
            program: program.into(),
            status: status.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ShellError::Syntax(_) => ErrorKind::Syntax,
            ShellError::Argument(_) => ErrorKind::Argument,
            ShellError::NotFound(_) => ErrorKind::NotFound,
            ShellError::Io { source, .. } if source.kind() == io::ErrorKind::NotFound => {
                ErrorKind::NotFound
            }
            ShellError::Io { .. } | ShellError::Status { .. } => ErrorKind::Io,
            ShellError::Eval(_) => ErrorKind::Eval,
            ShellError::Stage { source, .. } => source.kind(),
        }
    }

    /// Name of the failing command when the error was raised by a script line.
    pub fn stage(&self) -> Option<&str> {
        match self {
            ShellError::Stage { stage, .. } => Some(stage),
            _ => None,
        }
    }

    /// Tag the error with the command and line that produced it. Already tagged
    /// errors are returned unchanged.
    pub fn in_stage(self, stage: &str, line: &str) -> Self {
        match self {
            tagged @ ShellError::Stage { .. } => tagged,
            other => ShellError::Stage {
                stage: stage.to_string(),
                line: line.to_string(),
                source: Box::new(other),
            },
        }
    }

    /// True when the consumer side of a pipe went away; a producer stage
    /// treats that as a normal end of output.
    pub fn is_broken_pipe(&self) -> bool {
        match self {
            ShellError::Io { source, .. } => source.kind() == io::ErrorKind::BrokenPipe,
            ShellError::Stage { source, .. } => source.is_broken_pipe(),
            _ => false,
        }
    }
}

impl From<io::Error> for ShellError {
    fn from(err: io::Error) -> Self {
        ShellError::io("I/O error", err)
    }
}

/// `with_context`-style helper for I/O results.
pub trait IoContext<T> {
    fn io_context<C, F>(self, f: F) -> Result<T>
    where
        C: Into<String>,
        F: FnOnce() -> C;
}

impl<T> IoContext<T> for io::Result<T> {
    fn io_context<C, F>(self, f: F) -> Result<T>
    where
        C: Into<String>,
        F: FnOnce() -> C,
    {
        self.map_err(|e| ShellError::io(f(), e))
    }
}
