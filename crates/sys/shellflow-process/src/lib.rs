//! Low-level plumbing for the shellflow execution engine: output sinks,
//! the stream fan-out used to drain child processes, the bounded worker
//! pool that runs drain tasks, and host-interpreter selection.
//!
//! Nothing in this crate knows about command chaining or sessions; it
//! deals in byte streams, threads, and the interpreter's invocation
//! tokens only.

mod fan;
mod pool;
mod shell;
mod sink;

pub use fan::{READ_CHUNK, StreamFan};
pub use pool::{TaskHandle, WorkerPool};
pub use shell::Interpreter;
pub use sink::{
    LogSink, OutputSink, SharedSink, StderrSink, StdoutSink, StringSink, stderr_sink, stdout_sink,
};
