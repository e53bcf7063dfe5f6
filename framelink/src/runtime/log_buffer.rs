use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{Record, debug};
use parking_lot::Mutex;

use crate::error::RemoteError;
use crate::logging::{self, SubscriberId};

pub const DEFAULT_LOG_CAPACITY: usize = 1000;

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Severity {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Critical,
}

impl Severity {
    pub fn code(self) -> char {
        match self {
            Self::Trace => 'T',
            Self::Debug => 'D',
            Self::Info => 'I',
            Self::Warn => 'W',
            Self::Error => 'E',
            Self::Critical => 'C',
        }
    }
}

impl From<log::Level> for Severity {
    fn from(level: log::Level) -> Self {
        match level {
            log::Level::Trace => Self::Trace,
            log::Level::Debug => Self::Debug,
            log::Level::Info => Self::Info,
            log::Level::Warn => Self::Warn,
            log::Level::Error => Self::Error,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LogEntry {
    severity: Severity,
    source: String,
    message: String,
}

impl LogEntry {
    pub fn new(
        severity: Severity,
        source: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            source: source.into(),
            message: message.into(),
        }
    }

    pub fn from_record(record: &Record) -> Self {
        Self::new(
            record.level().into(),
            format!("[{}] ", record.target()),
            record.args().to_string(),
        )
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// `[<code>] <source><message>`; the source carries its own separator.
impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}{}",
            self.severity.code(),
            self.source,
            self.message
        )
    }
}

/// Bounded, newest-first store of log entries.
pub struct LogBuffer {
    capacity: usize,
    entries: Mutex<VecDeque<LogEntry>>,
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY)
    }
}

impl LogBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn append(&self, entry: LogEntry) {
        let mut entries = self.entries.lock();
        entries.push_front(entry);
        if entries.len() > self.capacity {
            entries.pop_back();
        }
    }

    /// Up to `max_count` rendered lines, newest first. Only the cloning of
    /// the requested slice happens under the lock.
    pub fn snapshot(&self, max_count: usize) -> Vec<String> {
        let slice: Vec<LogEntry> = {
            let entries = self.entries.lock();
            entries.iter().take(max_count).cloned().collect()
        };

        slice.iter().map(LogEntry::to_string).collect()
    }

    /// Starts feeding this buffer from the process-wide log relay until the
    /// returned subscription is dropped.
    pub fn subscribe(
        self: &Arc<Self>,
    ) -> Result<LogSubscription, RemoteError> {
        let (id, receiver) = logging::subscribe();
        let buffer = self.clone();

        let pump = thread::Builder::new()
            .name("framelink-log-pump".to_string())
            .spawn(move || {
                while let Ok(entry) = receiver.recv() {
                    buffer.append(entry);
                }
            });

        match pump {
            Ok(handle) => Ok(LogSubscription {
                id,
                pump: Some(handle),
            }),
            Err(err) => {
                logging::unsubscribe(id);
                Err(err.into())
            }
        }
    }
}

pub struct LogSubscription {
    id: SubscriberId,
    pump: Option<JoinHandle<()>>,
}

impl Drop for LogSubscription {
    fn drop(&mut self) {
        logging::unsubscribe(self.id);

        if let Some(handle) = self.pump.take() {
            if handle.join().is_err() {
                debug!("log pump thread panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use serial_test::serial;

    use super::*;

    fn entry(severity: Severity, message: &str) -> LogEntry {
        LogEntry::new(severity, "", message)
    }

    #[test]
    fn renders_severity_code_source_and_message() {
        let line = LogEntry::new(Severity::Critical, "[gpu] ", "lost device");
        assert_eq!(line.to_string(), "[C] [gpu] lost device");

        let codes: String = [
            Severity::Trace,
            Severity::Debug,
            Severity::Info,
            Severity::Warn,
            Severity::Error,
            Severity::Critical,
        ]
        .iter()
        .map(|s| s.code())
        .collect();
        assert_eq!(codes, "TDIWEC");
    }

    #[test]
    fn evicts_oldest_when_over_capacity() {
        let buffer = LogBuffer::new(3);
        buffer.append(entry(Severity::Info, "a"));
        buffer.append(entry(Severity::Warn, "b"));
        buffer.append(entry(Severity::Error, "c"));
        buffer.append(entry(Severity::Debug, "d"));

        assert_eq!(buffer.snapshot(10), vec!["[D] d", "[E] c", "[W] b"]);
        assert_eq!(buffer.len(), 3);
    }

    #[test]
    fn snapshot_size_is_min_of_appends_and_capacity() {
        for (appends, capacity) in [(0, 4), (2, 4), (4, 4), (9, 4), (5, 1)] {
            let buffer = LogBuffer::new(capacity);
            for i in 0..appends {
                buffer.append(entry(Severity::Info, &i.to_string()));
            }

            let lines = buffer.snapshot(appends);
            assert_eq!(lines.len(), appends.min(capacity));

            let expected: Vec<String> = (0..appends)
                .rev()
                .take(capacity)
                .map(|i| format!("[I] {}", i))
                .collect();
            assert_eq!(lines, expected);
        }
    }

    #[test]
    fn partial_snapshot_returns_most_recent() {
        let buffer = LogBuffer::new(10);
        for message in ["one", "two", "three", "four"] {
            buffer.append(entry(Severity::Info, message));
        }

        assert_eq!(buffer.snapshot(2), vec!["[I] four", "[I] three"]);
        assert!(buffer.snapshot(0).is_empty());
        assert!(LogBuffer::default().snapshot(5).is_empty());
    }

    #[test]
    fn zero_capacity_is_raised_to_one() {
        let buffer = LogBuffer::new(0);
        buffer.append(entry(Severity::Info, "x"));
        buffer.append(entry(Severity::Info, "y"));
        assert_eq!(buffer.snapshot(5), vec!["[I] y"]);
    }

    #[test]
    fn concurrent_appends_never_exceed_capacity() {
        let buffer = Arc::new(LogBuffer::new(50));
        let writers: Vec<_> = (0..4)
            .map(|t| {
                let buffer = buffer.clone();
                thread::spawn(move || {
                    for i in 0..500 {
                        buffer.append(entry(
                            Severity::Debug,
                            &format!("{}-{}", t, i),
                        ));
                        if i % 50 == 0 {
                            assert!(buffer.snapshot(100).len() <= 50);
                        }
                    }
                })
            })
            .collect();

        for writer in writers {
            writer.join().unwrap();
        }

        assert_eq!(buffer.len(), 50);
    }

    #[test]
    #[serial]
    fn subscription_feeds_buffer_until_dropped() {
        let buffer = Arc::new(LogBuffer::new(10));
        let subscription = buffer.subscribe().unwrap();

        logging::publish(LogEntry::new(Severity::Warn, "[host] ", "ready"));

        let deadline = Instant::now() + Duration::from_secs(5);
        while buffer.is_empty() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(buffer.snapshot(1), vec!["[W] [host] ready"]);

        drop(subscription);
        logging::publish(LogEntry::new(Severity::Warn, "", "late"));
        thread::sleep(Duration::from_millis(20));
        assert_eq!(buffer.len(), 1);
    }
}
