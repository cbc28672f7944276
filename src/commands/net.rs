//! wget - fetch a URL over HTTP

use std::fs::File;
use std::io::{self, BufRead, Write};

use lexopt::prelude::*;

use super::{flag_error, make_parser, Command};
use crate::error::{IoContext, Result, ShellError};
use crate::shell::context::ExecContext;
use crate::shell::path;

#[derive(Debug)]
pub struct WgetCmd {
    pub method: String,
    /// Target file; `-` means stdout, `None` the URL basename.
    pub output: Option<String>,
}

impl Default for WgetCmd {
    fn default() -> Self {
        Self {
            method: "GET".to_string(),
            output: None,
        }
    }
}

impl WgetCmd {
    fn fetch(&self, url: &str) -> Result<Box<dyn io::Read + Send + Sync>> {
        log::debug!("wget: {} {}", self.method, url);
        let response = ureq::agent()
            .request(&self.method, url)
            .call()
            .map_err(|e| ShellError::io(format!("wget: {}", url), io::Error::other(e.to_string())))?;
        Ok(response.into_reader())
    }
}

impl Command for WgetCmd {
    fn name(&self) -> &'static str {
        "wget"
    }

    fn parse_flags(&mut self, argv: &[String]) -> Result<Vec<String>> {
        let name = self.name();
        let mut parser = make_parser(argv);
        let mut urls = Vec::new();
        while let Some(arg) = parser.next().map_err(|e| flag_error(name, e))? {
            match arg {
                Long("method") => {
                    self.method = parser
                        .value()
                        .and_then(|v| v.string())
                        .map_err(|e| flag_error(name, e))?
                        .to_uppercase();
                }
                Short('O') | Long("output-document") => {
                    let file = parser
                        .value()
                        .and_then(|v| v.string())
                        .map_err(|e| flag_error(name, e))?;
                    self.output = Some(file);
                }
                Value(val) => urls.push(val.string().map_err(|e| flag_error(name, e))?),
                _ => return Err(flag_error(name, arg.unexpected())),
            }
        }
        if urls.len() != 1 {
            return Err(ShellError::Argument(format!(
                "wget: expected exactly one URL, got {}",
                urls.len()
            )));
        }
        Ok(urls)
    }

    fn run(
        &self,
        ctx: &ExecContext,
        _stdin: &mut dyn BufRead,
        stdout: &mut dyn Write,
        args: &[String],
    ) -> Result<()> {
        let url = args
            .first()
            .ok_or_else(|| ShellError::Argument("wget: missing URL".into()))?;

        let target = match self.output.as_deref() {
            Some("-") => None,
            Some(file) => Some(ctx.resolve(file)),
            None => Some(ctx.resolve(&path::basename(url))),
        };

        let mut body = self.fetch(url)?;
        match target {
            None => {
                io::copy(&mut body, stdout).io_context(|| format!("wget: {}", url))?;
            }
            Some(target) => {
                let mut file =
                    File::create(&target).io_context(|| format!("wget: {}", target.display()))?;
                io::copy(&mut body, &mut file)
                    .io_context(|| format!("wget: {}", target.display()))?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_flags() {
        let mut cmd = WgetCmd::default();
        let urls = cmd
            .parse_flags(&argv(&["--method", "head", "-O", "-", "http://localhost/x"]))
            .unwrap();
        assert_eq!(urls, argv(&["http://localhost/x"]));
        assert_eq!(cmd.method, "HEAD");
        assert_eq!(cmd.output.as_deref(), Some("-"));
    }

    #[test]
    fn test_requires_one_url() {
        let err = WgetCmd::default().parse_flags(&[]).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Argument);
        let err = WgetCmd::default()
            .parse_flags(&argv(&["http://a", "http://b"]))
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Argument);
    }

    #[test]
    fn test_unreachable_host_is_io_error() {
        let mut cmd = WgetCmd::default();
        cmd.output = Some("-".into());
        let mut out = Vec::new();
        let err = cmd
            .run(
                &ExecContext::default(),
                &mut io::empty(),
                &mut out,
                &argv(&["http://127.0.0.1:9/unreachable"]),
            )
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Io);
        assert!(out.is_empty());
    }
}
