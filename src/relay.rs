use serde::Serialize;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// One message from the conversion worker to the interactive surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "payload", rename_all = "lowercase")]
pub enum RelayEvent {
    Log(String),
    Progress(u8),
    Error(String),
    Success(String),
    Done,
}

pub type RelayReceiver = UnboundedReceiver<RelayEvent>;

/// Producer half of the relay. Sends never block and are dropped silently
/// once the surface has gone away.
#[derive(Debug, Clone)]
pub struct RelaySender {
    tx: UnboundedSender<RelayEvent>,
}

pub fn channel() -> (RelaySender, RelayReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (RelaySender { tx }, rx)
}

impl RelaySender {
    pub fn send(&self, event: RelayEvent) {
        let _ = self.tx.send(event);
    }

    pub fn log(&self, line: impl Into<String>) {
        self.send(RelayEvent::Log(line.into()));
    }

    pub fn progress(&self, percent: u8) {
        self.send(RelayEvent::Progress(percent.min(100)));
    }

    pub fn error(&self, message: impl Into<String>) {
        self.send(RelayEvent::Error(message.into()));
    }

    pub fn success(&self, message: impl Into<String>) {
        self.send(RelayEvent::Success(message.into()));
    }

    pub fn done(&self) {
        self.send(RelayEvent::Done);
    }
}
