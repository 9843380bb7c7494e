// The narrow interface through which the engine reaches the presentation layer.

use super::model::{Notice, Snapshot};
use tokio::sync::mpsc::UnboundedSender;

/// Receives every snapshot the engine publishes, in publish order.
///
/// Callbacks run on the engine's worker lane and must not block.
pub trait Observer: Send + Sync + 'static {
    fn on_snapshot(&self, snapshot: Snapshot);

    fn on_notice(&self, _notice: Notice) {}
}

/// Everything the engine can tell a presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    Snapshot(Snapshot),
    Notice(Notice),
}

/// Forwards events to another execution context (usually the UI thread).
impl Observer for UnboundedSender<EngineEvent> {
    fn on_snapshot(&self, snapshot: Snapshot) {
        // The receiver is gone only during teardown
        let _ = self.send(EngineEvent::Snapshot(snapshot));
    }

    fn on_notice(&self, notice: Notice) {
        let _ = self.send(EngineEvent::Notice(notice));
    }
}
