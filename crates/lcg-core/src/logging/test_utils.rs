//! In-memory log capture for asserting on lifecycle events in tests.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::field::{Field, Visit};
use tracing::subscriber::DefaultGuard;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;

/// One recorded event.
#[derive(Clone, Debug)]
pub struct CapturedEvent {
    /// Event level.
    pub level: Level,
    /// Module the event came from.
    pub target: String,
    /// Rendered message.
    pub message: String,
    /// Structured fields other than the message, rendered as strings.
    pub fields: BTreeMap<String, String>,
}

impl CapturedEvent {
    /// Rendered value of `name`.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

/// Handle to the events recorded by [`capture_logs`].
#[derive(Clone, Default)]
pub struct CapturedLogs {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl CapturedLogs {
    /// Snapshot of everything recorded.
    pub fn events(&self) -> Vec<CapturedEvent> {
        self.events.lock().clone()
    }

    /// Events whose message contains `needle`.
    pub fn matching(&self, needle: &str) -> Vec<CapturedEvent> {
        self.select(|e| e.message.contains(needle))
    }

    /// Whether an event at `level` mentions `needle`.
    pub fn has_event(&self, level: Level, needle: &str) -> bool {
        !self
            .select(|e| e.level == level && e.message.contains(needle))
            .is_empty()
    }

    /// Number of events recorded at `level`.
    pub fn count_at(&self, level: Level) -> usize {
        self.select(|e| e.level == level).len()
    }

    fn select(&self, keep: impl Fn(&CapturedEvent) -> bool) -> Vec<CapturedEvent> {
        self.events
            .lock()
            .iter()
            .filter(|e| keep(e))
            .cloned()
            .collect()
    }
}

#[derive(Default)]
struct Recorder {
    message: String,
    fields: BTreeMap<String, String>,
}

impl Recorder {
    fn put(&mut self, field: &Field, rendered: String) {
        if field.name() == "message" {
            self.message = rendered;
        } else {
            let _ = self.fields.insert(field.name().to_owned(), rendered);
        }
    }
}

impl Visit for Recorder {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.put(field, value.to_owned());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.put(field, format!("{value:?}"));
    }
}

struct CaptureLayer(CapturedLogs);

impl<S: Subscriber> Layer<S> for CaptureLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut recorder = Recorder::default();
        event.record(&mut recorder);
        let meta = event.metadata();
        self.0.events.lock().push(CapturedEvent {
            level: *meta.level(),
            target: meta.target().to_owned(),
            message: recorder.message,
            fields: recorder.fields,
        });
    }
}

/// Record every event on the current thread until the guard drops.
///
/// Only the calling thread is captured, so async tests that assert on logs
/// must run on a current-thread runtime.
pub fn capture_logs() -> (CapturedLogs, DefaultGuard) {
    let logs = CapturedLogs::default();
    let guard = tracing_subscriber::registry()
        .with(CaptureLayer(logs.clone()))
        .set_default();
    (logs, guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_message_and_fields() {
        let (logs, _guard) = capture_logs();
        tracing::info!(device_id = "abc", shockers = 3_u64, "device connected");

        let events = logs.matching("device connected");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].level, Level::INFO);
        assert_eq!(events[0].field("device_id"), Some("abc"));
        assert_eq!(events[0].field("shockers"), Some("3"));
        assert_eq!(events[0].field("missing"), None);
    }

    #[test]
    fn level_is_part_of_the_match() {
        let (logs, _guard) = capture_logs();
        tracing::warn!("storage unavailable");
        tracing::debug!("lifetime disposed");
        assert!(logs.has_event(Level::WARN, "storage"));
        assert!(!logs.has_event(Level::INFO, "storage"));
        assert_eq!(logs.count_at(Level::DEBUG), 1);
    }

    #[test]
    fn other_threads_are_not_captured() {
        let (logs, _guard) = capture_logs();
        std::thread::spawn(|| tracing::info!("elsewhere"))
            .join()
            .unwrap();
        assert!(logs.events().is_empty());
    }
}
