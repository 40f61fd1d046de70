//! Log backend with a broker mirror.
//!
//! [`MirrorLogger`] wraps the platform backend (`EspLogger` on device,
//! `env_logger` on host).  Every record goes to the backend; records at
//! `Info` or above are also copied into a bounded line buffer that the
//! main loop drains into the log topic with [`forward`].
//!
//! While [`forward`] runs, capture is suspended, so the transport's own
//! log output about publishing a line never lands back in the buffer.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use heapless::Deque;
use log::{Level, Log, Metadata, Record, SetLoggerError};

/// Lines held while the broker is unreachable.
pub const MIRROR_CAPACITY: usize = 32;

static MIRROR: Mutex<LineBuffer<MIRROR_CAPACITY>> = Mutex::new(LineBuffer::new());
static FORWARDING: AtomicBool = AtomicBool::new(false);

// ───────────────────────────────────────────────────────────────
// Line buffer
// ───────────────────────────────────────────────────────────────

/// FIFO of at most `N` formatted log lines; the oldest line is dropped
/// when full.
#[derive(Debug)]
pub struct LineBuffer<const N: usize> {
    lines: Deque<String, N>,
    dropped: u32,
}

impl<const N: usize> Default for LineBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> LineBuffer<N> {
    pub const fn new() -> Self {
        Self {
            lines: Deque::new(),
            dropped: 0,
        }
    }

    pub fn push(&mut self, line: String) {
        if self.lines.is_full() {
            self.lines.pop_front();
            self.dropped = self.dropped.saturating_add(1);
        }
        // Cannot fail: a slot was just freed.
        let _ = self.lines.push_back(line);
    }

    /// Hand lines to `sink` oldest first.  A line the sink refuses stays
    /// at the head and draining stops.  Returns the number delivered.
    pub fn drain_into<E>(&mut self, mut sink: impl FnMut(&str) -> Result<(), E>) -> usize {
        let mut sent = 0;
        while let Some(line) = self.lines.front() {
            if sink(line).is_err() {
                break;
            }
            self.lines.pop_front();
            sent += 1;
        }
        sent
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Lines lost to overflow since boot.
    pub fn dropped(&self) -> u32 {
        self.dropped
    }
}

fn format_line(record: &Record<'_>) -> String {
    format!("[{}] {}: {}", record.level(), record.target(), record.args())
}

// ───────────────────────────────────────────────────────────────
// Logger
// ───────────────────────────────────────────────────────────────

pub struct MirrorLogger<L> {
    inner: L,
}

impl<L: Log> MirrorLogger<L> {
    pub fn new(inner: L) -> Self {
        Self { inner }
    }
}

impl<L: Log> Log for MirrorLogger<L> {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        self.inner.enabled(metadata)
    }

    fn log(&self, record: &Record<'_>) {
        self.inner.log(record);
        if record.level() <= Level::Info && !FORWARDING.load(Ordering::Acquire) {
            if let Ok(mut mirror) = MIRROR.lock() {
                mirror.push(format_line(record));
            }
        }
    }

    fn flush(&self) {
        self.inner.flush();
    }
}

/// Install the mirror over the platform backend.  Call once, first thing.
#[cfg(target_os = "espidf")]
pub fn init() -> Result<(), SetLoggerError> {
    let inner = esp_idf_svc::log::EspLogger::new();
    let max = inner.get_max_level();
    log::set_boxed_logger(Box::new(MirrorLogger::new(inner)))?;
    log::set_max_level(max);
    Ok(())
}

/// Install the mirror over the platform backend.  Call once, first thing.
///
/// Host filter comes from `RUST_LOG`, defaulting to `info,nosyna=debug`.
#[cfg(not(target_os = "espidf"))]
pub fn init() -> Result<(), SetLoggerError> {
    let inner = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info,nosyna=debug"),
    )
    .build();
    let max = inner.filter().max(log::LevelFilter::Info);
    log::set_boxed_logger(Box::new(MirrorLogger::new(inner)))?;
    log::set_max_level(max);
    Ok(())
}

/// Drain captured lines through `publish`.  Lines are kept when the
/// publish fails (broker down) and retried on the next call.
pub fn forward<E>(publish: impl FnMut(&str) -> Result<(), E>) -> usize {
    let Ok(mut mirror) = MIRROR.lock() else {
        return 0;
    };
    FORWARDING.store(true, Ordering::Release);
    let sent = mirror.drain_into(publish);
    FORWARDING.store(false, Ordering::Release);
    sent
}
