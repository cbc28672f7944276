//! Timestamp commands: strptime, fileLastModified, gitLastModified

use std::fmt::Write as _;
use std::fs;
use std::io::{BufRead, Write};
use std::process::{Command as Process, Stdio};

use chrono::{DateTime, FixedOffset, Local, NaiveDateTime, SecondsFormat, Utc};
use lexopt::prelude::*;

use super::{flag_error, for_each_line, make_parser, positional_only, Command};
use crate::error::{IoContext, Result, ShellError};
use crate::shell::context::ExecContext;

const RFC3339: &str = "RFC3339";

/// Parse `value` with a chrono format string or one of the named formats
/// `RFC2822`, `RFC1123Z` and `RFC3339`. Values without an offset are taken
/// as UTC.
fn parse_time(value: &str, format: &str) -> Option<DateTime<FixedOffset>> {
    let value = value.trim();
    match format {
        "RFC2822" | "RFC1123Z" => DateTime::parse_from_rfc2822(value).ok(),
        RFC3339 => DateTime::parse_from_rfc3339(value).ok(),
        fmt => DateTime::parse_from_str(value, fmt).ok().or_else(|| {
            NaiveDateTime::parse_from_str(value, fmt)
                .ok()
                .map(|naive| naive.and_utc().fixed_offset())
        }),
    }
}

fn format_utc(t: DateTime<Utc>, format: &str) -> Result<String> {
    match format {
        RFC3339 => Ok(t.to_rfc3339_opts(SecondsFormat::Secs, true)),
        "RFC2822" | "RFC1123Z" => Ok(t.to_rfc2822()),
        fmt => {
            let mut out = String::new();
            write!(out, "{}", t.format(fmt))
                .map_err(|_| ShellError::Argument(format!("invalid time format {:?}", fmt)))?;
            Ok(out)
        }
    }
}

/// strptime - reformat timestamps, one per argument or input line
#[derive(Debug)]
pub struct ParseTimeCmd {
    pub in_format: String,
    pub out_format: String,
}

impl Default for ParseTimeCmd {
    fn default() -> Self {
        Self {
            in_format: String::new(),
            out_format: RFC3339.to_string(),
        }
    }
}

impl ParseTimeCmd {
    fn convert(&self, line: &str) -> Result<String> {
        let t = parse_time(line, &self.in_format).ok_or_else(|| {
            ShellError::Argument(format!(
                "strptime: unable to parse {:?} with {:?}",
                line, self.in_format
            ))
        })?;
        format_utc(t.with_timezone(&Utc), &self.out_format)
    }
}

impl Command for ParseTimeCmd {
    fn name(&self) -> &'static str {
        "strptime"
    }

    fn parse_flags(&mut self, argv: &[String]) -> Result<Vec<String>> {
        let name = self.name();
        let mut parser = make_parser(argv);
        let mut args = Vec::new();
        while let Some(arg) = parser.next().map_err(|e| flag_error(name, e))? {
            match arg {
                Short('i') | Long("in") => {
                    self.in_format = parser
                        .value()
                        .and_then(|v| v.string())
                        .map_err(|e| flag_error(name, e))?;
                }
                Short('o') | Long("out") => {
                    self.out_format = parser
                        .value()
                        .and_then(|v| v.string())
                        .map_err(|e| flag_error(name, e))?;
                }
                Value(val) => args.push(val.string().map_err(|e| flag_error(name, e))?),
                _ => return Err(flag_error(name, arg.unexpected())),
            }
        }
        if self.in_format.is_empty() {
            return Err(ShellError::Argument(
                "strptime: must specify input format with --in".into(),
            ));
        }
        Ok(args)
    }

    fn run(
        &self,
        _ctx: &ExecContext,
        stdin: &mut dyn BufRead,
        stdout: &mut dyn Write,
        args: &[String],
    ) -> Result<()> {
        for_each_line(self.name(), stdin, stdout, args, |line| self.convert(line).map(Some))
    }
}

/// fileLastModified - RFC 3339 modification time of each path
#[derive(Debug, Default)]
pub struct FileLastModifiedCmd;

impl Command for FileLastModifiedCmd {
    fn name(&self) -> &'static str {
        "fileLastModified"
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
        for_each_line(self.name(), stdin, stdout, args, |line| {
            let target = ctx.resolve(line);
            let modified = fs::metadata(&target)
                .and_then(|m| m.modified())
                .io_context(|| format!("fileLastModified: {}", target.display()))?;
            let local: DateTime<Local> = modified.into();
            Ok(Some(local.to_rfc3339_opts(SecondsFormat::Secs, true)))
        })
    }
}

/// gitLastModified - date of the last commit touching the given paths
#[derive(Debug, Default)]
pub struct GitLastModifiedCmd;

impl Command for GitLastModifiedCmd {
    fn name(&self) -> &'static str {
        "gitLastModified"
    }

    fn parse_flags(&mut self, argv: &[String]) -> Result<Vec<String>> {
        positional_only(self.name(), argv)
    }

    fn run(
        &self,
        ctx: &ExecContext,
        _stdin: &mut dyn BufRead,
        stdout: &mut dyn Write,
        args: &[String],
    ) -> Result<()> {
        let output = Process::new("git")
            .args(["log", "-n", "1", "--date=rfc", "--pretty=format:%cd", "--"])
            .args(args)
            .current_dir(&ctx.cwd)
            .env_clear()
            .envs(&ctx.env)
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
            .io_context(|| "gitLastModified: failed to execute git")?;
        if !output.status.success() {
            return Err(ShellError::status("gitLastModified: git", output.status));
        }

        let text = String::from_utf8_lossy(&output.stdout);
        let text = text.trim();
        if text.is_empty() {
            return Err(ShellError::NotFound(format!(
                "gitLastModified: no commits for {}",
                args.join(" ")
            )));
        }
        let t = parse_time(text, "RFC2822").ok_or_else(|| {
            ShellError::Argument(format!("gitLastModified: unexpected date {:?}", text))
        })?;
        let stamp = format_utc(t.with_timezone(&Utc), RFC3339)?;
        writeln!(stdout, "{}", stamp)
            .io_context(|| "gitLastModified: write failed")
    }
}
