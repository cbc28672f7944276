//! Pipeline builder - wires leaf commands and external processes together
//!
//! Stages are connected by OS pipes. Leaf commands run on their own thread,
//! everything else is spawned as a child process with the session's
//! environment and working directory.

use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;
use std::process::{Child, Command as Process, ExitStatus};
use std::sync::Arc;
use std::thread;

use os_pipe::PipeReader;

use super::context::ExecContext;
use super::parser::Token;
use super::registry::{Registry, Resolution, Scope};
use super::stream::{InputStream, IoStreams, OutputStream};
use crate::commands::Command;
use crate::error::{IoContext, Result, ShellError};

pub enum Stage {
    /// In-process leaf command with its flags already parsed.
    Command {
        name: String,
        command: Box<dyn Command>,
        args: Vec<String>,
    },
    Process {
        program: String,
        args: Vec<String>,
    },
}

impl Stage {
    pub fn name(&self) -> &str {
        match self {
            Stage::Command { name, .. } => name,
            Stage::Process { program, .. } => program,
        }
    }
}

impl std::fmt::Debug for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Command { name, args, .. } => {
                f.debug_struct("Command").field("name", name).field("args", args).finish()
            }
            Stage::Process { program, args } => {
                f.debug_struct("Process").field("program", program).field("args", args).finish()
            }
        }
    }
}

#[derive(Debug)]
pub struct Pipeline {
    line: String,
    stages: Vec<Stage>,
}

enum StageHandle {
    Thread(thread::JoinHandle<Result<()>>),
    Child(Child),
}

impl Pipeline {
    /// Split `tokens` on pipes and resolve every stage. `line` is only used
    /// to tag errors.
    pub fn build(line: &str, tokens: Vec<Token>, registry: &Registry) -> Result<Pipeline> {
        let mut groups: Vec<Vec<String>> = Vec::new();
        let mut current = Vec::new();
        for token in tokens {
            match token {
                Token::Word(w) => current.push(w),
                Token::Pipe => groups.push(std::mem::take(&mut current)),
            }
        }
        groups.push(current);

        let mut stages = Vec::with_capacity(groups.len());
        for (idx, mut argv) in groups.into_iter().enumerate() {
            if argv.is_empty() {
                return Err(ShellError::Syntax(format!("empty pipeline stage {}", idx + 1))
                    .in_stage("|", line));
            }
            let name = argv.remove(0);
            let stage = match registry.resolve(&name, Scope::Stage) {
                Resolution::Pipeline(factory) => {
                    let mut command = factory();
                    let args = command
                        .parse_flags(&argv)
                        .map_err(|e| e.in_stage(&name, line))?;
                    Stage::Command { name, command, args }
                }
                Resolution::External(program) => Stage::Process { program, args: argv },
                Resolution::Builtin(_) => Stage::Process { program: name, args: argv },
            };
            stages.push(stage);
        }

        Ok(Pipeline {
            line: line.to_string(),
            stages,
        })
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Run every stage and wait for all of them. The first failing stage, in
    /// stage order, decides the result.
    pub fn run(self, io: IoStreams, ctx: Arc<ExecContext>) -> Result<()> {
        let Pipeline { line, mut stages } = self;

        if stages.len() == 1 {
            let stage = stages.remove(0);
            let name = stage.name().to_string();
            return run_single(stage, io, &ctx).map_err(|e| e.in_stage(&name, &line));
        }

        let IoStreams {
            stdin: pipeline_stdin,
            stdout: pipeline_stdout,
            stderr: pipeline_stderr,
        } = io;
        let mut first_stdin = Some(pipeline_stdin);
        let mut last_stdout = Some(pipeline_stdout);

        let count = stages.len();
        let mut handles: Vec<(String, StageHandle)> = Vec::with_capacity(count);
        let mut prev_reader: Option<PipeReader> = None;

        for (idx, stage) in stages.into_iter().enumerate() {
            let name = stage.name().to_string();
            let stage_io = match wire(
                idx,
                count,
                &mut first_stdin,
                &mut last_stdout,
                &pipeline_stderr,
                &mut prev_reader,
            ) {
                Ok(stage_io) => stage_io,
                Err(e) => {
                    drop(prev_reader);
                    abort(handles);
                    return Err(e.in_stage(&name, &line));
                }
            };
            log::trace!("pipeline stage {} `{}` wired", idx, name);

            match start(idx, stage, stage_io, &ctx) {
                Ok(handle) => handles.push((name, handle)),
                Err(e) => {
                    drop(prev_reader);
                    abort(handles);
                    return Err(e.in_stage(&name, &line));
                }
            }
        }
        drop(pipeline_stderr);

        let mut first_error = None;
        for (name, handle) in handles {
            let result = match handle {
                StageHandle::Thread(h) => h.join().unwrap_or_else(|_| {
                    Err(ShellError::io(
                        format!("{}: stage panicked", name),
                        io::Error::other("panic"),
                    ))
                }),
                StageHandle::Child(mut child) => child
                    .wait()
                    .io_context(|| format!("{}: wait failed", name))
                    .and_then(|status| check_status(&name, status)),
            };
            if let Err(e) = result {
                log::trace!("pipeline stage `{}` failed: {}", name, e);
                if first_error.is_none() {
                    first_error = Some(e.in_stage(&name, &line));
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Streams for stage `idx` of `count`: the pipeline's own stdin/stdout at
/// the ends, a fresh OS pipe between neighbours.
fn wire(
    idx: usize,
    count: usize,
    first_stdin: &mut Option<InputStream>,
    last_stdout: &mut Option<OutputStream>,
    stderr: &OutputStream,
    prev_reader: &mut Option<PipeReader>,
) -> Result<IoStreams> {
    let stdin = match prev_reader.take() {
        Some(r) => InputStream::Pipe(r),
        None if idx == 0 => first_stdin.take().unwrap_or(InputStream::Null),
        None => return Err(ShellError::Syntax("pipeline: missing input".into())),
    };

    let stdout = if idx + 1 == count {
        last_stdout.take().unwrap_or(OutputStream::Null)
    } else {
        let (r, w) = os_pipe::pipe().io_context(|| "pipeline: pipe failed")?;
        *prev_reader = Some(r);
        OutputStream::Pipe(w)
    };

    let stderr = stderr.try_clone().io_context(|| "pipeline: stderr clone failed")?;
    Ok(IoStreams { stdin, stdout, stderr })
}

fn start(idx: usize, stage: Stage, io: IoStreams, ctx: &Arc<ExecContext>) -> Result<StageHandle> {
    match stage {
        Stage::Command { name, command, args } => {
            let ctx = Arc::clone(ctx);
            let handle = thread::Builder::new()
                .name(format!("stage-{}-{}", idx, name))
                .spawn(move || run_command(command.as_ref(), &ctx, &args, io))
                .io_context(|| format!("{}: failed to start stage thread", name))?;
            Ok(StageHandle::Thread(handle))
        }
        Stage::Process { program, args } => {
            spawn_process(&program, &args, ctx, io).map(StageHandle::Child)
        }
    }
}

/// Tear down a partially started pipeline: kill and reap children, then
/// join the stage threads. Their pipe ends close as they go.
fn abort(handles: Vec<(String, StageHandle)>) {
    let mut threads = Vec::new();
    for (name, handle) in handles {
        match handle {
            StageHandle::Child(mut child) => {
                log::trace!("pipeline abort: killing `{}`", name);
                let _ = child.kill();
                let _ = child.wait();
            }
            StageHandle::Thread(h) => threads.push(h),
        }
    }
    for h in threads {
        let _ = h.join();
    }
}

fn run_single(stage: Stage, io: IoStreams, ctx: &ExecContext) -> Result<()> {
    match stage {
        Stage::Command { command, args, .. } => run_command(command.as_ref(), ctx, &args, io),
        Stage::Process { program, args } => {
            let mut child = spawn_process(&program, &args, ctx, io)?;
            let status = child
                .wait()
                .io_context(|| format!("{}: wait failed", program))?;
            check_status(&program, status)
        }
    }
}

fn run_command(command: &dyn Command, ctx: &ExecContext, args: &[String], io: IoStreams) -> Result<()> {
    let mut stdin = BufReader::new(io.stdin);
    let mut stdout = BufWriter::new(io.stdout);
    let result = command
        .run(ctx, &mut stdin, &mut stdout, args)
        .and_then(|_| stdout.flush().io_context(|| format!("{}: flush failed", command.name())));
    match result {
        Err(e) if e.is_broken_pipe() => Ok(()),
        other => other,
    }
}

fn spawn_process(program: &str, args: &[String], ctx: &ExecContext, io: IoStreams) -> Result<Child> {
    log::debug!("spawn: {} {:?}", program, args);

    // a relative path with a separator is relative to the session directory
    let exe = if program.contains('/') && !Path::new(program).is_absolute() {
        ctx.resolve(program)
    } else {
        program.into()
    };

    let mut cmd = Process::new(exe);
    cmd.args(args)
        .env_clear()
        .envs(&ctx.env)
        .stdin(io.stdin.into_stdio())
        .stdout(io.stdout.into_stdio())
        .stderr(io.stderr.into_stdio());
    if !ctx.cwd.as_os_str().is_empty() {
        cmd.current_dir(&ctx.cwd);
    }

    cmd.spawn().map_err(|e| {
        if e.kind() == io::ErrorKind::NotFound {
            ShellError::NotFound(format!("{}: command not found", program))
        } else {
            ShellError::io(format!("failed to execute {}", program), e)
        }
    })
}

fn check_status(program: &str, status: ExitStatus) -> Result<()> {
    if status.success() || killed_by_sigpipe(status) {
        return Ok(());
    }
    Err(ShellError::status(program, status))
}

#[cfg(unix)]
fn killed_by_sigpipe(status: ExitStatus) -> bool {
    use std::os::unix::process::ExitStatusExt;
    const SIGPIPE: i32 = 13;
    status.signal() == Some(SIGPIPE)
}

#[cfg(not(unix))]
fn killed_by_sigpipe(_status: ExitStatus) -> bool {
    false
}
