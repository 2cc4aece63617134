use std::io::{self, Write};
use std::sync::{Arc, Mutex};

/// Destination for bytes drained from a child process stream.
///
/// `close` defaults to a flush so adapters over streams the caller still
/// owns (the process's own stdout/stderr) never close the underlying
/// handle.
pub trait OutputSink: Send {
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()>;

    fn flush(&mut self) -> io::Result<()>;

    fn close(&mut self) -> io::Result<()> {
        self.flush()
    }
}

/// Sinks are shared between the session that registered them and the
/// drain tasks writing into them.
pub type SharedSink = Arc<Mutex<dyn OutputSink>>;

/// Accumulates everything written into it; the captured content can be
/// taken out as a string, resetting the buffer.
#[derive(Debug, Default)]
pub struct StringSink {
    buf: Vec<u8>,
}

impl StringSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<Mutex<StringSink>> {
        Arc::new(Mutex::new(Self::new()))
    }

    /// Returns the captured content (lossily decoded) and resets the sink.
    pub fn take_string(&mut self) -> String {
        let content = String::from_utf8_lossy(&self.buf).into_owned();
        self.buf.clear();
        content
    }
}

impl OutputSink for StringSink {
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.buf.extend_from_slice(bytes);
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

const LOG_FLUSH_THRESHOLD: usize = 1024;

/// Buffers drained bytes and forwards them as `log::info!` records once
/// a 1024-byte threshold is crossed; `close` forwards any remainder.
///
/// `flush` is deliberately a no-op: emitting partial buffers on every
/// drain-side flush would shred output into tiny records.
#[derive(Debug, Default)]
pub struct LogSink {
    buf: Vec<u8>,
}

impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<Mutex<LogSink>> {
        Arc::new(Mutex::new(Self::new()))
    }

    fn emit(&mut self) {
        if !self.buf.is_empty() {
            log::info!("{}", String::from_utf8_lossy(&self.buf));
            self.buf.clear();
        }
    }
}

impl OutputSink for LogSink {
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.buf.extend_from_slice(bytes);
        if self.buf.len() >= LOG_FLUSH_THRESHOLD {
            self.emit();
        }
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        self.emit();
        Ok(())
    }
}

/// Writes through to the process's own standard output. The caller owns
/// that handle, so `close` only flushes.
#[derive(Debug, Default)]
pub struct StdoutSink;

impl OutputSink for StdoutSink {
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        io::stdout().write_all(bytes)
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stdout().flush()
    }
}

/// Writes through to the process's own standard error; `close` only
/// flushes.
#[derive(Debug, Default)]
pub struct StderrSink;

impl OutputSink for StderrSink {
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        io::stderr().write_all(bytes)
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()
    }
}

pub fn stdout_sink() -> SharedSink {
    Arc::new(Mutex::new(StdoutSink))
}

pub fn stderr_sink() -> SharedSink {
    Arc::new(Mutex::new(StderrSink))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_sink_takes_and_resets() {
        let mut sink = StringSink::new();
        sink.write_all(b"hello ").unwrap();
        sink.write_all(b"world").unwrap();
        assert_eq!(sink.take_string(), "hello world");
        assert_eq!(sink.take_string(), "");
    }

    #[test]
    fn log_sink_buffers_below_threshold() {
        let mut sink = LogSink::new();
        sink.write_all(&[b'a'; LOG_FLUSH_THRESHOLD - 1]).unwrap();
        assert_eq!(sink.buf.len(), LOG_FLUSH_THRESHOLD - 1);
        sink.flush().unwrap();
        assert_eq!(
            sink.buf.len(),
            LOG_FLUSH_THRESHOLD - 1,
            "flush must not emit a partial buffer"
        );
    }

    #[test]
    fn log_sink_emits_at_threshold() {
        let mut sink = LogSink::new();
        sink.write_all(&[b'a'; LOG_FLUSH_THRESHOLD]).unwrap();
        assert!(sink.buf.is_empty(), "threshold write should flush to the log");
    }

    #[test]
    fn log_sink_close_drains_remainder() {
        let mut sink = LogSink::new();
        sink.write_all(b"tail").unwrap();
        sink.close().unwrap();
        assert!(sink.buf.is_empty());
    }

    #[test]
    fn std_stream_sinks_survive_close() {
        // Closing must leave the process streams usable afterwards.
        let mut out = StdoutSink;
        out.close().unwrap();
        out.write_all(b"").unwrap();
        let mut err = StderrSink;
        err.close().unwrap();
        err.write_all(b"").unwrap();
    }
}
