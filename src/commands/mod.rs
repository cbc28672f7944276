//! Pipeline leaf commands.
//!
//! Each command reads its input stream, writes its output stream and never
//! touches session state. Flags are parsed with `lexopt` when the pipeline
//! is built, so a bad flag fails the line before any stage starts.

mod encoding;
mod net;
mod text;
mod time;

use std::io::{BufRead, Write};
use std::sync::Arc;

use crate::error::{IoContext, Result, ShellError};
use crate::shell::context::ExecContext;
use crate::shell::registry::CommandFactory;

pub use self::encoding::Base64Cmd;
pub use self::net::WgetCmd;
pub use self::text::{CatCmd, EchoCmd, HeadCmd, WhichCmd};
pub use self::time::{FileLastModifiedCmd, GitLastModifiedCmd, ParseTimeCmd};

/// A leaf command usable as a pipeline stage.
pub trait Command: Send {
    fn name(&self) -> &'static str;

    /// Consume flags from `argv` (options are kept on `self`) and return the
    /// positional arguments.
    fn parse_flags(&mut self, argv: &[String]) -> Result<Vec<String>>;

    fn run(
        &self,
        ctx: &ExecContext,
        stdin: &mut dyn BufRead,
        stdout: &mut dyn Write,
        args: &[String],
    ) -> Result<()>;
}

/// The default pipeline command table.
pub fn defaults() -> Vec<(&'static str, CommandFactory)> {
    vec![
        ("base64", of::<Base64Cmd>()),
        ("cat", of::<CatCmd>()),
        ("echo", of::<EchoCmd>()),
        ("fileLastModified", of::<FileLastModifiedCmd>()),
        ("gitLastModified", of::<GitLastModifiedCmd>()),
        ("head", of::<HeadCmd>()),
        ("strptime", of::<ParseTimeCmd>()),
        ("wget", of::<WgetCmd>()),
        ("which", of::<WhichCmd>()),
    ]
}

fn of<C: Command + Default + 'static>() -> CommandFactory {
    Arc::new(|| Box::new(C::default()) as Box<dyn Command>)
}

/// Create a lexopt parser over a command's arguments.
pub(crate) fn make_parser(argv: &[String]) -> lexopt::Parser {
    lexopt::Parser::from_args(argv.iter().cloned())
}

pub(crate) fn flag_error(name: &str, err: lexopt::Error) -> ShellError {
    ShellError::Argument(format!("{}: {}", name, err))
}

/// Parse an argument list that accepts no flags at all.
pub(crate) fn positional_only(name: &str, argv: &[String]) -> Result<Vec<String>> {
    use lexopt::prelude::*;

    let mut parser = make_parser(argv);
    let mut args = Vec::new();
    while let Some(arg) = parser.next().map_err(|e| flag_error(name, e))? {
        match arg {
            Value(val) => args.push(val.string().map_err(|e| flag_error(name, e))?),
            _ => return Err(flag_error(name, arg.unexpected())),
        }
    }
    Ok(args)
}

/// Apply `f` to every argument, or to every input line when there are no
/// arguments, writing each `Some` result followed by a newline.
pub(crate) fn for_each_line<F>(
    name: &str,
    stdin: &mut dyn BufRead,
    stdout: &mut dyn Write,
    args: &[String],
    mut f: F,
) -> Result<()>
where
    F: FnMut(&str) -> Result<Option<String>>,
{
    fn emit(name: &str, out: &mut dyn Write, value: Option<String>) -> Result<()> {
        if let Some(value) = value {
            writeln!(out, "{}", value).io_context(|| format!("{}: write failed", name))?;
        }
        Ok(())
    }

    if !args.is_empty() {
        for arg in args {
            emit(name, stdout, f(arg)?)?;
        }
        return Ok(());
    }

    for line in stdin.lines() {
        let line = line.io_context(|| format!("{}: read failed", name))?;
        emit(name, stdout, f(&line)?)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn argv(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_positional_only_rejects_flags() {
        assert_eq!(positional_only("x", &argv(&["a", "b"])).unwrap(), argv(&["a", "b"]));
        assert!(positional_only("x", &argv(&["-q"])).is_err());
        assert_eq!(positional_only("x", &argv(&["--", "-q"])).unwrap(), argv(&["-q"]));
    }

    #[test]
    fn test_for_each_line_prefers_args() {
        let mut stdin = Cursor::new(b"ignored\n".to_vec());
        let mut out = Vec::new();
        for_each_line("t", &mut stdin, &mut out, &argv(&["a", "b"]), |s| {
            Ok(Some(s.to_uppercase()))
        })
        .unwrap();
        assert_eq!(out, b"A\nB\n");
    }

    #[test]
    fn test_for_each_line_reads_stdin_and_skips_none() {
        let mut stdin = Cursor::new(b"keep\ndrop\nkeep\n".to_vec());
        let mut out = Vec::new();
        for_each_line("t", &mut stdin, &mut out, &[], |s| {
            Ok((s == "keep").then(|| s.to_string()))
        })
        .unwrap();
        assert_eq!(out, b"keep\nkeep\n");
    }

    #[test]
    fn test_defaults_are_named_consistently() {
        for (name, factory) in defaults() {
            assert_eq!(factory().name(), name);
        }
    }
}
