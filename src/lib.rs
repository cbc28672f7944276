//! titan-script - a small scripting engine
//!
//! Features:
//! - Line continuation, `$VAR` / `${VAR}` expansion and single-pass aliases
//! - Pipelines of in-process commands and external programs over OS pipes
//! - `if EXPR then COMMAND` lines with file and command predicates
//! - A first-error latch that stops the script at the failing line

pub mod commands;
pub mod error;
pub mod shell;

pub use error::{ErrorKind, ShellError};
pub use shell::Session;
