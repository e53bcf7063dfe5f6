use std::io::Write;
use std::sync::LazyLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};

use env_logger::{Builder, Env};
use log::{LevelFilter, Log, Metadata, Record};
use parking_lot::Mutex;
use termcolor::{Color, ColorSpec, WriteColor};

use crate::runtime::log_buffer::LogEntry;

pub use log::{debug, error, info, trace, warn};

pub const DEFAULT_FILTER: &str = "framelink=info,framelink_host=info";

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct SubscriberId(u64);

type Subscribers = Vec<(SubscriberId, Sender<LogEntry>)>;

/// Every channel that wants a copy of emitted log events.
static SUBSCRIBERS: LazyLock<Mutex<Subscribers>> =
    LazyLock::new(|| Mutex::new(Vec::new()));

static NEXT_SUBSCRIBER_ID: AtomicU64 = AtomicU64::new(1);

pub fn init_logger() {
    init_logger_with_filter(DEFAULT_FILTER);
}

/// Installs the colored stdout logger. Records that pass the filter are also
/// published to log subscribers. Calling this more than once is a no-op.
pub fn init_logger_with_filter(default_filter: &str) {
    let mut builder =
        Builder::from_env(Env::default().default_filter_or(default_filter));
    builder.filter_module("notify", LevelFilter::Warn);

    builder.format(|_buf, record| {
        let writer =
            termcolor::BufferWriter::stdout(termcolor::ColorChoice::Auto);
        let mut buffer = writer.buffer();
        let mut spec = ColorSpec::new();

        spec.set_fg(Some(match record.level() {
            log::Level::Trace => Color::Cyan,
            log::Level::Debug => Color::Blue,
            log::Level::Info => Color::Green,
            log::Level::Warn => Color::Yellow,
            log::Level::Error => Color::Red,
        }));

        buffer.set_color(&spec)?;
        let module_path = record.module_path().unwrap_or("<unknown>");
        write!(buffer, "[{}][{}]", record.level(), module_path)?;
        buffer.reset()?;
        writeln!(buffer, " {}", record.args())?;
        writer.print(&buffer)?;
        Ok(())
    });

    let inner = builder.build();
    let max_level = inner.filter();

    if log::set_boxed_logger(Box::new(RelayLogger { inner })).is_ok() {
        log::set_max_level(max_level);
    }
}

struct RelayLogger {
    inner: env_logger::Logger,
}

impl Log for RelayLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.inner.enabled(metadata)
    }

    fn log(&self, record: &Record) {
        if !self.inner.matches(record) {
            return;
        }

        self.inner.log(record);
        publish(LogEntry::from_record(record));
    }

    fn flush(&self) {
        self.inner.flush();
    }
}

pub fn subscribe() -> (SubscriberId, Receiver<LogEntry>) {
    let id = SubscriberId(NEXT_SUBSCRIBER_ID.fetch_add(1, Ordering::Relaxed));
    let (tx, rx) = mpsc::channel();
    SUBSCRIBERS.lock().push((id, tx));
    (id, rx)
}

/// Drops the subscriber's sender, which disconnects its receiver.
pub fn unsubscribe(id: SubscriberId) {
    SUBSCRIBERS.lock().retain(|(existing, _)| *existing != id);
}

/// Sends `entry` to every subscriber. Subscribers whose receiver is gone are
/// pruned.
pub fn publish(entry: LogEntry) {
    let mut subscribers = SUBSCRIBERS.lock();
    subscribers.retain(|(_, tx)| tx.send(entry.clone()).is_ok());
}

pub fn subscriber_count() -> usize {
    SUBSCRIBERS.lock().len()
}
