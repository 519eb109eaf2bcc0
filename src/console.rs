//! Console relay: forwards browser console events into the process logger
//!
//! Browser pages emit console events asynchronously. The relay maps each
//! event's type tag to a log level, resolves its arguments, and re-emits the
//! line through the structured logger. While a message is being re-emitted
//! the process console channel is swapped into a capturing buffer so the raw
//! echo never reaches the real standard streams.

use async_trait::async_trait;
use std::sync::{Mutex, PoisonError};
use thiserror::Error;
use tracing::{debug, error, info, trace, warn, Level};

/// Console relay errors
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Failed to resolve console argument: {0}")]
    ArgumentResolution(String),
}

/// One console argument. Resolution may suspend (remote values are fetched
/// from the browser) and may fail.
#[async_trait]
pub trait ConsoleArg: Send + Sync {
    async fn resolve(&self) -> Result<serde_json::Value, RelayError>;
}

/// A single console event emitted by a browser page.
pub struct ConsoleMessage {
    kind: String,
    args: Vec<Box<dyn ConsoleArg>>,
}

impl ConsoleMessage {
    pub fn new(kind: impl Into<String>, args: Vec<Box<dyn ConsoleArg>>) -> Self {
        Self {
            kind: kind.into(),
            args,
        }
    }

    /// The message's declared type tag.
    pub fn kind(&self) -> &str {
        &self.kind
    }
}

/// Map a console type tag to a log level. Unsupported tags map to `None`
/// and the message is dropped without error.
pub fn console_level(kind: &str) -> Option<Level> {
    match kind {
        "log" | "info" => Some(Level::INFO),
        "debug" => Some(Level::DEBUG),
        "trace" => Some(Level::TRACE),
        "warning" | "warn" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

/// Render one resolved argument the way a console would print it.
fn render(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

enum Destination {
    Standard,
    Capture(String),
}

/// Process console channel with a scoped capture mode.
///
/// Normally writes pass through to the real standard streams. While a
/// [`CaptureGuard`] is live, writes land in a buffer instead.
struct ConsoleSink {
    dest: Mutex<Destination>,
}

impl ConsoleSink {
    fn new() -> Self {
        Self {
            dest: Mutex::new(Destination::Standard),
        }
    }

    /// Swap writes into a buffer until the returned guard is dropped.
    fn capture(&self) -> CaptureGuard<'_> {
        let mut dest = self.dest.lock().unwrap_or_else(PoisonError::into_inner);
        *dest = Destination::Capture(String::new());
        CaptureGuard { sink: self }
    }

    /// Echo one console line; absorbed by an active capture.
    fn print(&self, level: Level, line: &str) {
        let mut dest = self.dest.lock().unwrap_or_else(PoisonError::into_inner);
        match &mut *dest {
            Destination::Capture(buffer) => {
                buffer.push_str(line);
            }
            Destination::Standard => match level {
                Level::ERROR | Level::WARN => eprintln!("{}", line),
                _ => println!("{}", line),
            },
        }
    }

    #[cfg(test)]
    fn capturing(&self) -> bool {
        matches!(
            *self.dest.lock().unwrap_or_else(PoisonError::into_inner),
            Destination::Capture(_)
        )
    }
}

/// Restores pass-through printing when dropped, even if the echo path
/// panicked while the capture was live.
struct CaptureGuard<'a> {
    sink: &'a ConsoleSink,
}

impl CaptureGuard<'_> {
    /// Take the captured text accumulated so far.
    fn captured(&self) -> String {
        let mut dest = self
            .sink
            .dest
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match &mut *dest {
            Destination::Capture(buffer) => std::mem::take(buffer),
            Destination::Standard => String::new(),
        }
    }
}

impl Drop for CaptureGuard<'_> {
    fn drop(&mut self) {
        let mut dest = self
            .sink
            .dest
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *dest = Destination::Standard;
    }
}

type Forwarder = Box<dyn Fn(Level, &str) + Send + Sync>;

/// Forwards browser console messages into the structured logger.
///
/// The capture window assumes one in-flight relay at a time; concurrent
/// relays may misattribute captured output. The delegate runs relays
/// effectively serialized per process.
pub struct ConsoleRelay {
    sink: ConsoleSink,
    forward: Forwarder,
}

impl Default for ConsoleRelay {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsoleRelay {
    /// Relay into the process logger under the browser component target.
    pub fn new() -> Self {
        Self::with_forwarder(forward_to_tracing)
    }

    /// Relay into an arbitrary forwarder instead of the process logger.
    pub fn with_forwarder<F>(forward: F) -> Self
    where
        F: Fn(Level, &str) + Send + Sync + 'static,
    {
        Self {
            sink: ConsoleSink::new(),
            forward: Box::new(forward),
        }
    }

    /// Forward one console message.
    ///
    /// Messages with unsupported type tags are discarded silently. An
    /// argument-resolution failure fails the whole relay; callers recover
    /// and log it rather than letting it abort the owning session.
    pub async fn relay(&self, message: ConsoleMessage) -> Result<(), RelayError> {
        let Some(level) = console_level(message.kind()) else {
            return Ok(());
        };

        let mut rendered = Vec::with_capacity(message.args.len());
        for arg in &message.args {
            rendered.push(render(&arg.resolve().await?));
        }

        let line = {
            let guard = self.sink.capture();
            self.sink.print(level, &rendered.join(" "));
            guard.captured()
        };

        (self.forward)(level, &line);
        Ok(())
    }

    #[cfg(test)]
    fn capturing(&self) -> bool {
        self.sink.capturing()
    }
}

fn forward_to_tracing(level: Level, line: &str) {
    match level {
        Level::ERROR => error!(target: "browser", "{}", line),
        Level::WARN => warn!(target: "browser", "{}", line),
        Level::INFO => info!(target: "browser", "{}", line),
        Level::DEBUG => debug!(target: "browser", "{}", line),
        _ => trace!(target: "browser", "{}", line),
    }
}
