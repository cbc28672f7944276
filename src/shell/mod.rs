//! Script session - environment, aliases, command tables and the error latch

pub mod builtin;
pub mod cond;
pub mod context;
pub mod expand;
pub mod parser;
pub mod path;
pub mod pipeline;
pub mod registry;
pub mod stream;

use std::collections::HashMap;
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use self::context::ExecContext;
use self::parser::Token;
use self::pipeline::Pipeline;
use self::registry::{Builtin, CommandFactory, Registry, Resolution, Scope};
use self::stream::{InputStream, IoStreams, OutputStream};
use crate::error::{IoContext, Result, ShellError};

/// State carried across the lines of a script.
///
/// Lines run strictly in order. The first failing line is recorded and every
/// later call returns that same error without running anything.
#[derive(Debug)]
pub struct Session {
    ctx: ExecContext,
    aliases: HashMap<String, Vec<String>>,
    registry: Registry,
    first_error: Option<ShellError>,
    stdin: InputStream,
    stdout: OutputStream,
    stderr: OutputStream,
}

impl Session {
    /// A session seeded with the process environment and working directory.
    pub fn new() -> Result<Self> {
        let ctx = ExecContext::from_process().io_context(|| "session: cannot read process state")?;
        Ok(Self::with_context(ctx))
    }

    pub fn with_context(ctx: ExecContext) -> Self {
        Self {
            ctx,
            aliases: HashMap::new(),
            registry: Registry::with_defaults(),
            first_error: None,
            stdin: InputStream::Null,
            stdout: OutputStream::Inherit,
            stderr: OutputStream::InheritStderr,
        }
    }

    /// Add (`Some`) or remove (`None`) session builtins.
    pub fn with_builtins<I, S>(mut self, builtins: I) -> Self
    where
        I: IntoIterator<Item = (S, Option<Builtin>)>,
        S: AsRef<str>,
    {
        for (name, handler) in builtins {
            self.registry.set_builtin(name.as_ref(), handler);
        }
        self
    }

    /// Add (`Some`) or remove (`None`) pipeline commands.
    pub fn with_commands<I, S>(mut self, commands: I) -> Self
    where
        I: IntoIterator<Item = (S, Option<CommandFactory>)>,
        S: AsRef<str>,
    {
        for (name, factory) in commands {
            self.registry.set_command(name.as_ref(), factory);
        }
        self
    }

    pub fn with_stdin(mut self, stdin: InputStream) -> Self {
        self.stdin = stdin;
        self
    }

    pub fn with_stdout(mut self, stdout: OutputStream) -> Self {
        self.stdout = stdout;
        self
    }

    pub fn with_stderr(mut self, stderr: OutputStream) -> Self {
        self.stderr = stderr;
        self
    }

    pub fn context(&self) -> &ExecContext {
        &self.ctx
    }

    pub fn set_cwd(&mut self, cwd: impl Into<PathBuf>) {
        self.ctx.cwd = cwd.into();
    }

    /// Value of a session variable, empty when unset.
    pub fn get_env(&self, key: &str) -> String {
        self.ctx.var(key).unwrap_or_default().to_string()
    }

    pub fn put_env(&mut self, key: &str, value: &str) {
        self.ctx.env.insert(key.to_string(), value.to_string());
    }

    pub fn alias(&self, name: &str) -> Option<&[String]> {
        self.aliases.get(name).map(Vec::as_slice)
    }

    pub fn set_alias(&mut self, name: &str, words: Vec<String>) {
        self.aliases.insert(name.to_string(), words);
    }

    pub fn remove_alias(&mut self, name: &str) {
        self.aliases.remove(name);
    }

    /// Where builtins write their output.
    pub fn stdout(&mut self) -> &mut OutputStream {
        &mut self.stdout
    }

    pub fn first_error(&self) -> Option<&ShellError> {
        self.first_error.as_ref()
    }

    /// Split `script` into logical lines and run them.
    pub fn run_script(&mut self, script: &str) -> Result<()> {
        self.exec(parser::assemble_lines(script))
    }

    /// Run already-assembled logical lines in order.
    pub fn exec<I, S>(&mut self, lines: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.check_latch()?;
        for line in lines {
            if let Err(e) = self.run_line(line.as_ref()) {
                return Err(self.latch(e));
            }
        }
        Ok(())
    }

    /// Run `script` with stdout captured; stderr is left as configured.
    pub fn output(&mut self, script: &str) -> Result<Vec<u8>> {
        self.check_latch()?;

        let (mut reader, writer) = os_pipe::pipe().io_context(|| "output: pipe failed")?;
        let collector = thread::Builder::new()
            .name("session-output".into())
            .spawn(move || {
                let mut buf = Vec::new();
                reader.read_to_end(&mut buf).map(|_| buf)
            })
            .io_context(|| "output: failed to start reader")?;

        let previous = std::mem::replace(&mut self.stdout, OutputStream::Pipe(writer));
        let result = self.run_script(script);
        // closes our write end so the collector sees EOF
        drop(std::mem::replace(&mut self.stdout, previous));

        let captured = collector
            .join()
            .map_err(|_| ShellError::io("output", std::io::Error::other("reader panicked")))?
            .io_context(|| "output: read failed")?;
        result.map(|_| captured)
    }

    /// Evaluate a conditional expression against the session environment.
    pub fn test(&mut self, expr: &str) -> Result<bool> {
        self.check_latch()?;
        cond::parse(expr)
            .and_then(|e| e.eval_bool(&self.ctx))
            .map_err(|e| self.latch(e))
    }

    fn check_latch(&self) -> Result<()> {
        match &self.first_error {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }

    fn latch(&mut self, err: ShellError) -> ShellError {
        log::warn!("script aborted: {}", err);
        self.first_error.get_or_insert(err).clone()
    }

    fn run_line(&mut self, raw: &str) -> Result<()> {
        let line = raw.trim();
        if line.is_empty() {
            return Ok(());
        }

        let Some(command) = self.guard(line)? else {
            log::debug!("skipped: {}", line);
            return Ok(());
        };

        let expanded = expand::expand(command, |key| self.ctx.var(key).map(str::to_string));
        let head = expanded.split_whitespace().next().unwrap_or_default().to_string();
        let mut tokens = parser::tokenize(&expanded).map_err(|e| e.in_stage(&head, &expanded))?;
        if tokens.is_empty() {
            return Ok(());
        }
        log::debug!("run: {}", expanded);

        let alias = match tokens.first() {
            Some(Token::Word(head)) => self.aliases.get(head).cloned(),
            _ => None,
        };
        if let Some(words) = alias {
            log::debug!("alias {} -> {}", head, words.join(" "));
            tokens.splice(0..1, words.into_iter().map(Token::Word));
        }

        let builtin = match tokens.first() {
            Some(Token::Word(name)) if !tokens.contains(&Token::Pipe) => {
                match self.registry.resolve(name, Scope::Line) {
                    Resolution::Builtin(handler) => Some(handler),
                    _ => None,
                }
            }
            _ => None,
        };
        if let Some(handler) = builtin {
            let argv = parser::into_words(tokens);
            return handler(self, &argv).map_err(|e| e.in_stage(&argv[0], &expanded));
        }

        let pipeline = Pipeline::build(&expanded, tokens, &self.registry)?;
        let io = IoStreams {
            stdin: self.stdin.try_clone().io_context(|| "stdin clone failed")?,
            stdout: self.stdout.try_clone().io_context(|| "stdout clone failed")?,
            stderr: self.stderr.try_clone().io_context(|| "stderr clone failed")?,
        };
        pipeline.run(io, Arc::new(self.ctx.clone()))
    }

    /// Strip an `if EXPR then` prefix. Returns the command to run, or `None`
    /// when the condition is false.
    fn guard<'a>(&self, line: &'a str) -> Result<Option<&'a str>> {
        let Some(rest) = strip_keyword(line, "if") else {
            return Ok(Some(line));
        };

        let (expr, rest) = cond::parse_prefix(rest).map_err(|e| e.in_stage("if", line))?;
        let Some(command) = strip_keyword(rest, "then") else {
            return Err(ShellError::Syntax(format!("expected 'then' before {:?}", rest))
                .in_stage("if", line));
        };

        if expr.eval_bool(&self.ctx).map_err(|e| e.in_stage("if", line))? {
            Ok(Some(command))
        } else {
            Ok(None)
        }
    }
}

/// `keyword` followed by whitespace or the end of the text.
fn strip_keyword<'a>(text: &'a str, keyword: &str) -> Option<&'a str> {
    let rest = text.strip_prefix(keyword)?;
    if rest.is_empty() || rest.starts_with(char::is_whitespace) {
        Some(rest.trim_start())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn session() -> Session {
        Session::new().unwrap()
    }

    #[test]
    fn test_empty_script() {
        let mut s = session();
        s.run_script("").unwrap();
        s.run_script("\n\n   \n# only a comment\n").unwrap();
        assert!(s.first_error().is_none());
    }

    #[test]
    fn test_expansion_and_export() {
        let mut s = session();
        let out = s
            .output("export NAME=world\necho hello ${NAME} $NAME $UNSET_FOR_TEST.")
            .unwrap();
        assert_eq!(out, b"hello world world .");
    }

    #[test]
    fn test_alias_applied_once() {
        let mut s = session();
        s.set_alias("e", vec!["echo".into(), "one".into()]);
        s.set_alias("echo", vec!["e".into()]);
        let out = s.output("e two").unwrap();
        assert_eq!(out, b"one two");
    }

    #[test]
    fn test_if_guard() {
        let mut s = session();
        let out = s
            .output(
                "if fileExists(\".\") then echo yes\n\
                 if fileExists('/definitely/missing/path') then echo no\n",
            )
            .unwrap();
        assert_eq!(out, b"yes");
    }

    #[test]
    fn test_if_without_then() {
        let mut s = session();
        let err = s.run_script("if true echo hi").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Syntax);
        assert_eq!(err.stage(), Some("if"));
    }

    #[test]
    fn test_strip_keyword() {
        assert_eq!(strip_keyword("if  true", "if"), Some("true"));
        assert_eq!(strip_keyword("iffy", "if"), None);
        assert_eq!(strip_keyword("then", "then"), Some(""));
    }

    #[test]
    fn test_latch_is_sticky() {
        let mut s = session();
        let err = s.run_script("export").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Argument);
        assert_eq!(err.stage(), Some("export"));

        let again = s.run_script("export A=1").unwrap_err();
        assert_eq!(again.to_string(), err.to_string());
        assert_eq!(s.get_env("A"), "");
        assert!(s.test("true").is_err());
    }

    #[test]
    fn test_builtin_removed_falls_through() {
        let mut s = session().with_builtins([("echo", None)]);
        // now the pipeline echo handles the line
        assert_eq!(s.output("echo via pipeline").unwrap(), b"via pipeline");
    }
}
