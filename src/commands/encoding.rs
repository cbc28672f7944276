//! base64 - encode stdin with the standard alphabet

use std::io::{self, BufRead, Write};

use base64::engine::general_purpose;
use base64::write::EncoderWriter;

use super::{positional_only, Command};
use crate::error::{IoContext, Result, ShellError};
use crate::shell::context::ExecContext;

#[derive(Debug, Default)]
pub struct Base64Cmd;

impl Command for Base64Cmd {
    fn name(&self) -> &'static str {
        "base64"
    }

    fn parse_flags(&mut self, argv: &[String]) -> Result<Vec<String>> {
        let args = positional_only(self.name(), argv)?;
        if !args.is_empty() {
            return Err(ShellError::Argument(format!(
                "base64: unexpected argument {:?}",
                args[0]
            )));
        }
        Ok(args)
    }

    /// Streams the encoding; no trailing newline is added.
    fn run(
        &self,
        _ctx: &ExecContext,
        stdin: &mut dyn BufRead,
        stdout: &mut dyn Write,
        _args: &[String],
    ) -> Result<()> {
        let mut encoder = EncoderWriter::new(stdout, &general_purpose::STANDARD);
        io::copy(stdin, &mut encoder).io_context(|| "base64: copy failed")?;
        encoder.finish().io_context(|| "base64: write failed")?;
        Ok(())
    }
}
