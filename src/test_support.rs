//! Helpers shared by unit tests.

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::{Arc, Mutex};
use tracing::subscriber::DefaultGuard;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

/// Records the level of every event emitted by this crate
#[derive(Clone, Default)]
pub(crate) struct LevelCounter {
    levels: Arc<Mutex<Vec<Level>>>,
}

impl LevelCounter {
    /// Install as the thread's default subscriber until the guard drops
    ///
    /// Only catches events from tasks polled on the installing thread, which
    /// holds for the default current-thread `#[tokio::test]` runtime.
    pub(crate) fn install(&self) -> DefaultGuard {
        tracing::subscriber::set_default(tracing_subscriber::registry().with(self.clone()))
    }

    pub(crate) fn count(&self, level: Level) -> usize {
        self.levels
            .lock()
            .unwrap()
            .iter()
            .filter(|l| **l == level)
            .count()
    }
}

impl<S: Subscriber> Layer<S> for LevelCounter {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if metadata.target().starts_with(env!("CARGO_CRATE_NAME")) {
            self.levels.lock().unwrap().push(*metadata.level());
        }
    }
}
