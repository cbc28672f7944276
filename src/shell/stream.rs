//! Byte streams shared by in-process stages and spawned processes.
//!
//! Every stream is either the inherited stdio handle, a null device, one end
//! of an OS pipe or a file. In-process stages use the `Read`/`Write` impls,
//! spawned processes take the same value through [`InputStream::into_stdio`].
//! Dropping a stream closes it, which is how a finished or failed stage
//! signals EOF (or a broken pipe) to its neighbours.

use std::fs::File;
use std::io::{self, Read, Write};
use std::process::Stdio;

use os_pipe::{PipeReader, PipeWriter};

#[derive(Debug)]
pub enum InputStream {
    Inherit,
    Null,
    Pipe(PipeReader),
    File(File),
}

impl InputStream {
    pub fn try_clone(&self) -> io::Result<InputStream> {
        Ok(match self {
            InputStream::Inherit => InputStream::Inherit,
            InputStream::Null => InputStream::Null,
            InputStream::Pipe(r) => InputStream::Pipe(r.try_clone()?),
            InputStream::File(f) => InputStream::File(f.try_clone()?),
        })
    }

    pub fn into_stdio(self) -> Stdio {
        match self {
            InputStream::Inherit => Stdio::inherit(),
            InputStream::Null => Stdio::null(),
            InputStream::Pipe(r) => Stdio::from(r),
            InputStream::File(f) => Stdio::from(f),
        }
    }
}

impl Read for InputStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            InputStream::Inherit => io::stdin().read(buf),
            InputStream::Null => Ok(0),
            InputStream::Pipe(r) => r.read(buf),
            InputStream::File(f) => f.read(buf),
        }
    }
}

#[derive(Debug)]
pub enum OutputStream {
    Inherit,
    InheritStderr,
    Null,
    Pipe(PipeWriter),
    File(File),
}

impl OutputStream {
    pub fn try_clone(&self) -> io::Result<OutputStream> {
        Ok(match self {
            OutputStream::Inherit => OutputStream::Inherit,
            OutputStream::InheritStderr => OutputStream::InheritStderr,
            OutputStream::Null => OutputStream::Null,
            OutputStream::Pipe(w) => OutputStream::Pipe(w.try_clone()?),
            OutputStream::File(f) => OutputStream::File(f.try_clone()?),
        })
    }

    pub fn into_stdio(self) -> Stdio {
        match self {
            OutputStream::Inherit | OutputStream::InheritStderr => Stdio::inherit(),
            OutputStream::Null => Stdio::null(),
            OutputStream::Pipe(w) => Stdio::from(w),
            OutputStream::File(f) => Stdio::from(f),
        }
    }
}

impl Write for OutputStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            OutputStream::Inherit => io::stdout().write(buf),
            OutputStream::InheritStderr => io::stderr().write(buf),
            OutputStream::Null => Ok(buf.len()),
            OutputStream::Pipe(w) => w.write(buf),
            OutputStream::File(f) => f.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            OutputStream::Inherit => io::stdout().flush(),
            OutputStream::InheritStderr => io::stderr().flush(),
            OutputStream::Null => Ok(()),
            OutputStream::Pipe(w) => w.flush(),
            OutputStream::File(f) => f.flush(),
        }
    }
}

/// The three standard streams handed to one stage or pipeline.
#[derive(Debug)]
pub struct IoStreams {
    pub stdin: InputStream,
    pub stdout: OutputStream,
    pub stderr: OutputStream,
}
