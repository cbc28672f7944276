//! Session builtins - commands that read or change session state
//!
//! Each builtin receives the session and its full argv (`argv[0]` is the
//! command name). Output goes to the session's stdout. Paths are resolved
//! against the session's working directory.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use glob::glob;
use lexopt::prelude::*;

use super::registry::{builtin, Builtin};
use super::Session;
use crate::commands::{flag_error, make_parser};
use crate::error::{IoContext, Result, ShellError};

/// The default builtin table.
pub fn defaults() -> Vec<(&'static str, Builtin)> {
    vec![
        ("alias", builtin(builtin_alias)),
        ("cp", builtin(builtin_cp)),
        ("echo", builtin(builtin_echo)),
        ("export", builtin(builtin_export)),
        ("mkdir", builtin(builtin_mkdir)),
        ("mv", builtin(builtin_mv)),
        ("unalias", builtin(builtin_unalias)),
        ("which", builtin(builtin_which)),
    ]
}

fn split_argv(argv: &[String]) -> (&str, &[String]) {
    match argv.split_first() {
        Some((name, rest)) => (name.as_str(), rest),
        None => ("", &[]),
    }
}

fn write_out(session: &mut Session, name: &str, text: &str) -> Result<()> {
    let out = session.stdout();
    out.write_all(text.as_bytes())
        .and_then(|_| out.flush())
        .io_context(|| format!("{}: write failed", name))
}

/// export KEY=VALUE
fn builtin_export(session: &mut Session, argv: &[String]) -> Result<()> {
    let (name, args) = split_argv(argv);
    let [arg] = args else {
        return Err(ShellError::Argument(format!(
            "{}: expected exactly one KEY=VALUE argument, got {:?}",
            name, args
        )));
    };
    let Some((key, value)) = arg.split_once('=') else {
        return Err(ShellError::Argument(format!("{}: missing '=' in {:?}", name, arg)));
    };
    if key.is_empty() {
        return Err(ShellError::Argument(format!("{}: empty variable name", name)));
    }
    session.put_env(key, value);
    Ok(())
}

/// alias NAME [WORDS...] - show or define an alias
fn builtin_alias(session: &mut Session, argv: &[String]) -> Result<()> {
    let (name, args) = split_argv(argv);
    match args {
        [] => Err(ShellError::Argument(format!("{} requires at least one argument", name))),
        [alias] => {
            let words = session
                .alias(alias)
                .map(|w| w.join(" "))
                .ok_or_else(|| ShellError::NotFound(format!("{}: not found {}", name, alias)))?;
            write_out(session, name, &format!("{}\n", words))
        }
        [alias, words @ ..] => {
            session.set_alias(alias, words.to_vec());
            Ok(())
        }
    }
}

/// unalias NAME
fn builtin_unalias(session: &mut Session, argv: &[String]) -> Result<()> {
    let (name, args) = split_argv(argv);
    match args {
        [alias] => {
            session.remove_alias(alias);
            Ok(())
        }
        [] => Err(ShellError::Argument(format!("{} requires one argument", name))),
        _ => Err(ShellError::Argument(format!("{}: too many arguments", name))),
    }
}

/// echo - space-joined arguments, no newline
fn builtin_echo(session: &mut Session, argv: &[String]) -> Result<()> {
    let (name, args) = split_argv(argv);
    write_out(session, name, &args.join(" "))
}

/// which NAME - path of an executable on the session PATH
fn builtin_which(session: &mut Session, argv: &[String]) -> Result<()> {
    let (name, args) = split_argv(argv);
    let [program] = args else {
        return Err(ShellError::Argument(format!("{}: expected one argument", name)));
    };
    let found = session
        .context()
        .which(program)
        .ok_or_else(|| ShellError::NotFound(format!("{}: no {} in PATH", name, program)))?;
    write_out(session, name, &found.display().to_string())
}

/// mkdir [-p] DIR...
fn builtin_mkdir(session: &mut Session, argv: &[String]) -> Result<()> {
    let (name, args) = split_argv(argv);
    let mut parents = false;
    let mut dirs = Vec::new();
    let mut parser = make_parser(args);
    while let Some(arg) = parser.next().map_err(|e| flag_error(name, e))? {
        match arg {
            Short('p') | Long("parents") => parents = true,
            Value(val) => dirs.push(val.string().map_err(|e| flag_error(name, e))?),
            _ => return Err(flag_error(name, arg.unexpected())),
        }
    }

    for dir in dirs {
        let target = session.context().resolve(&dir);
        let result = if parents {
            fs::create_dir_all(&target)
        } else {
            fs::create_dir(&target)
        };
        result.io_context(|| format!("{}: {}", name, dir))?;
    }
    Ok(())
}

/// Shared argument handling for `mv` and `cp`: `[--glob] SRC... DEST`.
struct Transfer {
    sources: Vec<PathBuf>,
    dest: PathBuf,
}

impl Transfer {
    fn parse(session: &Session, name: &str, args: &[String]) -> Result<Transfer> {
        let mut use_glob = false;
        let mut paths = Vec::new();
        let mut parser = make_parser(args);
        while let Some(arg) = parser.next().map_err(|e| flag_error(name, e))? {
            match arg {
                Long("glob") => use_glob = true,
                Value(val) => paths.push(val.string().map_err(|e| flag_error(name, e))?),
                _ => return Err(flag_error(name, arg.unexpected())),
            }
        }

        let Some((dest, sources)) = paths.split_last() else {
            return Err(ShellError::Argument(format!("{}: expected at least 2 args", name)));
        };
        if sources.is_empty() {
            return Err(ShellError::Argument(format!("{}: expected at least 2 args", name)));
        }

        let ctx = session.context();
        let sources = if use_glob {
            let mut matches = Vec::new();
            for pattern in sources {
                let full = ctx.resolve(pattern);
                let entries = glob(&full.to_string_lossy()).map_err(|e| {
                    ShellError::Argument(format!("{}: glob for {:?} failed: {}", name, pattern, e))
                })?;
                for entry in entries {
                    let path = entry.map_err(|e| {
                        let context = format!("{}: glob {}", name, e.path().display());
                        ShellError::io(context, e.into_error())
                    })?;
                    matches.push(path);
                }
            }
            if matches.is_empty() {
                return Err(ShellError::NotFound(format!(
                    "{}: no matching files for {:?}",
                    name, sources
                )));
            }
            matches
        } else {
            sources.iter().map(|s| ctx.resolve(s)).collect()
        };

        Ok(Transfer {
            sources,
            dest: ctx.resolve(dest),
        })
    }

    /// Apply `op` to every (source, target) pair, stopping at the first
    /// failure.
    fn apply<F>(self, name: &str, mut op: F) -> Result<()>
    where
        F: FnMut(&Path, &Path) -> io::Result<()>,
    {
        if self.dest.is_dir() {
            for src in &self.sources {
                let base = src
                    .file_name()
                    .ok_or_else(|| ShellError::Argument(format!("{}: bad source {}", name, src.display())))?;
                let target = self.dest.join(base);
                log::debug!("{} {} -> {}", name, src.display(), target.display());
                op(src, &target).io_context(|| {
                    format!("{} {} {} failed", name, src.display(), target.display())
                })?;
            }
            return Ok(());
        }

        let [src] = self.sources.as_slice() else {
            return Err(ShellError::Argument(format!(
                "{}: last argument {} is not a directory",
                name,
                self.dest.display()
            )));
        };
        op(src, &self.dest)
            .io_context(|| format!("{} {} {} failed", name, src.display(), self.dest.display()))
    }
}

/// mv [--glob] SRC... DEST
fn builtin_mv(session: &mut Session, argv: &[String]) -> Result<()> {
    let (name, args) = split_argv(argv);
    Transfer::parse(session, name, args)?.apply(name, |src, dst| fs::rename(src, dst))
}

/// cp [--glob] SRC... DEST
fn builtin_cp(session: &mut Session, argv: &[String]) -> Result<()> {
    let (name, args) = split_argv(argv);
    Transfer::parse(session, name, args)?.apply(name, copy_file)
}

fn copy_file(src: &Path, dst: &Path) -> io::Result<()> {
    let mut input = File::open(src)?;
    let mut output = File::create(dst)?;
    io::copy(&mut input, &mut output)?;
    output.sync_all()
}
