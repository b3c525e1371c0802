//! Chrome Tracing collector for scheduler visualization.
//!
//! Each participating thread records the partitions it executes into a
//! thread-local buffer, so the hot path never contends on a lock. Worker
//! threads flush their buffers when they exit; threads that only submit and
//! wait should call [`collect_local_trace`] before [`export_to_file`]. The
//! output loads into chrome://tracing or ui.perfetto.dev, one row per worker
//! id.

use std::cell::RefCell;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// One executed span, attributed to the worker that ran it.
#[derive(Debug, Clone)]
pub struct TraceEvent {
    pub name: &'static str,
    pub worker_id: usize,
    pub start_us: u64,
    pub duration_us: u64,
}

thread_local! {
    static TRACE_BUFFER: RefCell<Vec<TraceEvent>> = RefCell::new(Vec::with_capacity(4096));
}

lazy_static::lazy_static! {
    static ref TRACE_START: Instant = Instant::now();
    static ref COLLECTED: Mutex<Vec<TraceEvent>> = Mutex::new(Vec::new());
}

/// Records one span into the calling thread's buffer.
pub fn record_span(name: &'static str, worker_id: usize, start: Instant, duration: Duration) {
    let event = TraceEvent {
        name,
        worker_id,
        start_us: start.duration_since(*TRACE_START).as_micros() as u64,
        duration_us: duration.as_micros() as u64,
    };
    TRACE_BUFFER.with(|buf| buf.borrow_mut().push(event));
}

/// Drains the current thread's buffer into the shared collection. Worker
/// threads do this on exit; other participating threads must call it
/// themselves before exporting.
pub fn collect_local_trace() {
    TRACE_BUFFER.with(|buf| {
        let mut local = buf.borrow_mut();
        if !local.is_empty() {
            COLLECTED.lock().unwrap().append(&mut local);
        }
    });
}

/// Writes everything collected so far as a Chrome Tracing JSON array.
pub fn export_to_file(path: &str) -> std::io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    let events = COLLECTED.lock().unwrap();

    writeln!(writer, "[")?;
    // Label the process row once; each worker id becomes a thread row.
    write!(
        writer,
        "{{\"name\":\"process_name\",\"ph\":\"M\",\"pid\":1,\"args\":{{\"name\":\"taskpipe\"}}}}"
    )?;
    for event in events.iter() {
        // ph: X is a complete event (start + duration in one record).
        write!(
            writer,
            ",\n{{\"name\":\"{}\",\"ph\":\"X\",\"ts\":{},\"dur\":{},\"pid\":1,\"tid\":{}}}",
            event.name, event.start_us, event.duration_us, event.worker_id
        )?;
    }
    writeln!(writer, "\n]")?;
    writer.flush()
}

/// RAII span: measures from construction to drop.
pub struct TraceGuard {
    name: &'static str,
    worker_id: usize,
    start: Instant,
}

impl TraceGuard {
    pub fn new(name: &'static str, worker_id: usize) -> Self {
        TraceGuard {
            name,
            worker_id,
            start: Instant::now(),
        }
    }
}

impl Drop for TraceGuard {
    fn drop(&mut self) {
        record_span(self.name, self.worker_id, self.start, self.start.elapsed());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_records_into_local_buffer() {
        {
            let _span = TraceGuard::new("unit", 7);
        }
        let seen = TRACE_BUFFER.with(|buf| {
            buf.borrow()
                .iter()
                .any(|e| e.name == "unit" && e.worker_id == 7)
        });
        assert!(seen);
    }
}
