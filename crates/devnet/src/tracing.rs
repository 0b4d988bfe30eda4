//! A `tracing-subscriber` layer that records events so tests can assert on what was logged.

use std::{
    fmt::Debug,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};
use tracing::{
    field::{Field, Visit},
    Event, Level, Subscriber,
};
use tracing_subscriber::{layer::Context, Layer};

/// One recorded event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedEvent {
    /// The event level.
    pub level: Level,
    /// The event target, e.g. `retryable` or `gateway`.
    pub target: String,
    /// The event message followed by its fields as `name=value`.
    pub message: String,
}

/// The storage for recorded events. Clones share the same storage.
#[derive(Debug, Default, Clone)]
pub struct TraceStorage(Arc<Mutex<Vec<CapturedEvent>>>);

impl TraceStorage {
    /// Locks the storage and returns the recorded events.
    pub fn lock(&self) -> MutexGuard<'_, Vec<CapturedEvent>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the messages recorded at `level`.
    pub fn get_by_level(&self, level: Level) -> Vec<String> {
        self.lock()
            .iter()
            .filter(|event| event.level == level)
            .map(|event| event.message.clone())
            .collect()
    }

    /// Returns the messages recorded under `target`.
    pub fn get_by_target(&self, target: &str) -> Vec<String> {
        self.lock()
            .iter()
            .filter(|event| event.target == target)
            .map(|event| event.message.clone())
            .collect()
    }

    /// Returns if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

/// A subscriber layer that records every event into a [TraceStorage].
#[derive(Debug, Default)]
pub struct CollectingLayer {
    /// The storage for the recorded events.
    pub storage: TraceStorage,
}

impl CollectingLayer {
    /// Creates a new collecting layer with the specified storage.
    pub const fn new(storage: TraceStorage) -> Self {
        Self { storage }
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: Vec<String>,
}

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            self.fields.push(format!("{}={value:?}", field.name()));
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.push(format!("{}={value}", field.name()));
        }
    }
}

impl<S: Subscriber> Layer<S> for CollectingLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        let mut message = visitor.message;
        for field in visitor.fields {
            message.push(' ');
            message.push_str(&field);
        }
        self.storage.lock().push(CapturedEvent {
            level: *metadata.level(),
            target: metadata.target().to_string(),
            message,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::layer::SubscriberExt;

    #[test]
    fn test_records_level_target_and_fields() {
        let storage = TraceStorage::default();
        let subscriber = tracing_subscriber::registry().with(CollectingLayer::new(storage.clone()));
        let _guard = tracing::subscriber::set_default(subscriber);

        tracing::warn!(target: "retryable", ticket = 7, "Ticket failed");
        tracing::info!(target: "outbox", "Executed");

        assert_eq!(storage.get_by_level(Level::WARN), vec!["Ticket failed ticket=7".to_string()]);
        assert_eq!(storage.get_by_target("outbox"), vec!["Executed".to_string()]);
        assert!(!storage.is_empty());
    }
}
