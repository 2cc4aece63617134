use std::io::{self, Read};

use crate::sink::SharedSink;

/// Size of the fixed buffer used when draining a process stream.
pub const READ_CHUNK: usize = 1024;

/// Fans bytes read from one input stream out to every registered sink.
///
/// Reading the child's streams promptly is what keeps the child from
/// blocking on a full pipe buffer; an empty sink list still drains the
/// stream and discards the bytes.
pub struct StreamFan {
    sinks: Vec<SharedSink>,
}

impl StreamFan {
    pub fn new(sinks: Vec<SharedSink>) -> Self {
        Self { sinks }
    }

    /// Drains `reader` to exhaustion. Every sink is flushed before this
    /// returns, whether or not the copy failed.
    pub fn drain(&self, reader: &mut dyn Read) -> io::Result<()> {
        let copied = self.copy_chunks(reader);
        let flushed = self.flush_all();
        copied.and(flushed)
    }

    fn copy_chunks(&self, reader: &mut dyn Read) -> io::Result<()> {
        let mut buf = [0u8; READ_CHUNK];
        loop {
            let n = match reader.read(&mut buf) {
                Ok(0) => return Ok(()),
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            let chunk = trim_trailing_zeros(&buf[..n]);
            if chunk.is_empty() {
                continue;
            }
            for sink in &self.sinks {
                let mut guard = sink
                    .lock()
                    .map_err(|_| io::Error::other("output sink poisoned"))?;
                guard.write_all(chunk)?;
            }
        }
    }

    fn flush_all(&self) -> io::Result<()> {
        let mut first_failure = None;
        for sink in &self.sinks {
            let result = match sink.lock() {
                Ok(mut guard) => guard.flush(),
                Err(_) => Err(io::Error::other("output sink poisoned")),
            };
            if let Err(e) = result
                && first_failure.is_none()
            {
                first_failure = Some(e);
            }
        }
        match first_failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Chunks read from a console stream can end in padding zeros on a short
/// read. Only a chunk whose final byte is zero gets trimmed; embedded
/// zeros anywhere else pass through untouched.
fn trim_trailing_zeros(chunk: &[u8]) -> &[u8] {
    match chunk.last() {
        Some(0) => {
            let end = chunk.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);
            &chunk[..end]
        }
        _ => chunk,
    }
}
