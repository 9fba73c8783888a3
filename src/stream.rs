//! Stream endpoints for pipeline stages.
//!
//! A stage boundary is either the terminal, an opened redirection target, an
//! OS pipe to a neighboring external process, or an in-memory buffer linking
//! two builtins executed in-process.

use std::cell::RefCell;
use std::fs::File;
use std::io::{self, Cursor, Read, Write};
use std::process::Stdio;
use std::rc::Rc;

/// Shared byte buffer used to link two in-process builtins or to capture a
/// pipeline's final output.
pub type BufferHandle = Rc<RefCell<Vec<u8>>>;

pub fn buffer_handle() -> BufferHandle {
    Rc::new(RefCell::new(Vec::new()))
}

/// Consumes a handle, returning the collected bytes.
///
/// Clones only when another handle to the same buffer is still alive.
pub fn take_buffer(handle: BufferHandle) -> Vec<u8> {
    match Rc::try_unwrap(handle) {
        Ok(cell) => cell.into_inner(),
        Err(shared) => shared.borrow().clone(),
    }
}

/// Where a pipeline stage reads its standard input from.
pub enum StageInput {
    Inherit,
    File(File),
    Pipe(os_pipe::PipeReader),
    Buffer(BufferHandle),
}

impl StageInput {
    /// Stdin configuration for an external child process.
    ///
    /// A buffer only ever feeds a builtin executed in-process, so a child
    /// handed one sees an empty stream.
    pub fn into_stdio(self) -> Stdio {
        match self {
            StageInput::Inherit => Stdio::inherit(),
            StageInput::File(file) => Stdio::from(file),
            StageInput::Pipe(reader) => Stdio::from(reader),
            StageInput::Buffer(_) => Stdio::null(),
        }
    }

    /// Reader for a builtin executed in-process.
    pub fn into_reader(self) -> Box<dyn Read> {
        match self {
            StageInput::Inherit => Box::new(io::stdin()),
            StageInput::File(file) => Box::new(file),
            StageInput::Pipe(reader) => Box::new(reader),
            StageInput::Buffer(handle) => Box::new(Cursor::new(take_buffer(handle))),
        }
    }
}

/// Where a pipeline stage sends its standard output.
pub enum StageOutput {
    Inherit,
    File(File),
    Pipe(os_pipe::PipeWriter),
    Buffer(BufferHandle),
}

impl StageOutput {
    /// Stdout configuration for an external child process.
    pub fn into_stdio(self) -> Stdio {
        match self {
            StageOutput::Inherit => Stdio::inherit(),
            StageOutput::File(file) => Stdio::from(file),
            StageOutput::Pipe(writer) => Stdio::from(writer),
            StageOutput::Buffer(_) => Stdio::null(),
        }
    }

    /// Writer for a builtin executed in-process.
    pub fn into_writer(self) -> Box<dyn Write> {
        match self {
            StageOutput::Inherit => Box::new(io::stdout()),
            StageOutput::File(file) => Box::new(file),
            StageOutput::Pipe(writer) => Box::new(writer),
            StageOutput::Buffer(handle) => Box::new(BufferWriter(handle)),
        }
    }
}

/// Memory-backed writer over a [`BufferHandle`].
struct BufferWriter(BufferHandle);

impl Write for BufferWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_collects_writes() {
        let handle = buffer_handle();
        let mut writer = StageOutput::Buffer(handle.clone()).into_writer();
        writer.write_all(b"collected").unwrap();
        writer.flush().unwrap();
        drop(writer);
        assert_eq!(take_buffer(handle), b"collected");
    }

    #[test]
    fn buffer_feeds_reader() {
        let handle = buffer_handle();
        handle.borrow_mut().extend_from_slice(b"line one\n");

        let mut text = String::new();
        StageInput::Buffer(handle)
            .into_reader()
            .read_to_string(&mut text)
            .unwrap();
        assert_eq!(text, "line one\n");
    }

    #[test]
    fn take_buffer_with_live_clone_copies() {
        let handle = buffer_handle();
        handle.borrow_mut().extend_from_slice(b"shared");
        let other = handle.clone();
        assert_eq!(take_buffer(handle), b"shared");
        assert_eq!(other.borrow().as_slice(), b"shared");
    }

    #[test]
    fn pipe_round_trip() {
        let (reader, writer) = os_pipe::pipe().unwrap();
        let mut out = StageOutput::Pipe(writer).into_writer();
        out.write_all(b"through the pipe").unwrap();
        drop(out);

        let mut text = String::new();
        StageInput::Pipe(reader)
            .into_reader()
            .read_to_string(&mut text)
            .unwrap();
        assert_eq!(text, "through the pipe");
    }
}
