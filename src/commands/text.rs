//! Byte and line copying commands: cat, head, echo, which

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Write};

use lexopt::prelude::*;

use super::{flag_error, for_each_line, make_parser, positional_only, Command};
use crate::error::{IoContext, Result};
use crate::shell::context::ExecContext;

/// cat - copy files (or stdin) to stdout
#[derive(Debug, Default)]
pub struct CatCmd;

impl Command for CatCmd {
    fn name(&self) -> &'static str {
        "cat"
    }

    fn parse_flags(&mut self, argv: &[String]) -> Result<Vec<String>> {
        positional_only(self.name(), argv)
    }

    fn run(
        &self,
        ctx: &ExecContext,
        stdin: &mut dyn BufRead,
        stdout: &mut dyn Write,
        args: &[String],
    ) -> Result<()> {
        if args.is_empty() {
            io::copy(stdin, stdout).io_context(|| "cat: copy failed")?;
            return Ok(());
        }
        for file in args {
            let target = ctx.resolve(file);
            let mut f = File::open(&target).io_context(|| format!("cat: {}", target.display()))?;
            io::copy(&mut f, stdout).io_context(|| format!("cat: {}", target.display()))?;
        }
        Ok(())
    }
}

/// head - first N bytes (`-c`) or lines (`-n`, default 10)
#[derive(Debug)]
pub struct HeadCmd {
    pub chars: Option<u64>,
    pub lines: usize,
}

impl Default for HeadCmd {
    fn default() -> Self {
        Self {
            chars: None,
            lines: 10,
        }
    }
}

impl HeadCmd {
    fn copy(&self, input: &mut dyn BufRead, out: &mut dyn Write) -> io::Result<()> {
        if let Some(n) = self.chars {
            io::copy(&mut input.take(n), out)?;
            return Ok(());
        }
        let mut line = Vec::new();
        for _ in 0..self.lines {
            line.clear();
            if input.read_until(b'\n', &mut line)? == 0 {
                break;
            }
            out.write_all(&line)?;
        }
        Ok(())
    }
}

impl Command for HeadCmd {
    fn name(&self) -> &'static str {
        "head"
    }

    fn parse_flags(&mut self, argv: &[String]) -> Result<Vec<String>> {
        let name = self.name();
        let mut parser = make_parser(argv);
        let mut files = Vec::new();
        while let Some(arg) = parser.next().map_err(|e| flag_error(name, e))? {
            match arg {
                Short('c') | Long("bytes") => {
                    let n = parser
                        .value()
                        .and_then(|v| v.parse::<u64>())
                        .map_err(|e| flag_error(name, e))?;
                    self.chars = Some(n);
                }
                Short('n') | Long("lines") => {
                    self.lines = parser
                        .value()
                        .and_then(|v| v.parse::<usize>())
                        .map_err(|e| flag_error(name, e))?;
                }
                Value(val) => files.push(val.string().map_err(|e| flag_error(name, e))?),
                _ => return Err(flag_error(name, arg.unexpected())),
            }
        }
        Ok(files)
    }

    fn run(
        &self,
        ctx: &ExecContext,
        stdin: &mut dyn BufRead,
        stdout: &mut dyn Write,
        args: &[String],
    ) -> Result<()> {
        if args.is_empty() {
            return self.copy(stdin, stdout).io_context(|| "head: copy failed");
        }
        for file in args {
            let target = ctx.resolve(file);
            let f = File::open(&target).io_context(|| format!("head: {}", target.display()))?;
            self.copy(&mut BufReader::new(f), stdout)
                .io_context(|| format!("head: {}", target.display()))?;
        }
        Ok(())
    }
}

/// echo - write the space-joined arguments, no trailing newline
#[derive(Debug, Default)]
pub struct EchoCmd;

impl Command for EchoCmd {
    fn name(&self) -> &'static str {
        "echo"
    }

    fn parse_flags(&mut self, argv: &[String]) -> Result<Vec<String>> {
        Ok(argv.to_vec())
    }

    fn run(
        &self,
        _ctx: &ExecContext,
        _stdin: &mut dyn BufRead,
        stdout: &mut dyn Write,
        args: &[String],
    ) -> Result<()> {
        stdout
            .write_all(args.join(" ").as_bytes())
            .io_context(|| "echo: write failed")
    }
}

/// which - resolve each argument (or input line) on the search path
///
/// Names that cannot be resolved produce no output.
#[derive(Debug, Default)]
pub struct WhichCmd;

impl Command for WhichCmd {
    fn name(&self) -> &'static str {
        "which"
    }

    fn parse_flags(&mut self, argv: &[String]) -> Result<Vec<String>> {
        positional_only(self.name(), argv)
    }

    fn run(
        &self,
        ctx: &ExecContext,
        stdin: &mut dyn BufRead,
        stdout: &mut dyn Write,
        args: &[String],
    ) -> Result<()> {
        for_each_line(self.name(), stdin, stdout, args, |name| {
            let name = name.trim();
            if name.is_empty() {
                return Ok(None);
            }
            Ok(ctx.which(name).map(|p| p.display().to_string()))
        })
    }
}
