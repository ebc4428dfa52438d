use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio_util::sync::CancellationToken;

/// One streamed event. `data` is the only place an open JSON value exists —
/// every runner hands `EventSink` a typed payload and serialization happens
/// here, at the wire boundary.
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Event {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            data: None,
            message: None,
        }
    }

    pub fn with(kind: impl Into<String>, payload: &impl Serialize) -> Self {
        let kind = kind.into();
        let data = match serde_json::to_value(payload) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!(event = %kind, "unserializable event payload: {e}");
                None
            }
        };
        Self {
            kind,
            data,
            message: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: "error".to_string(),
            data: None,
            message: Some(message.into()),
        }
    }

    /// Encode as a wire frame: `data: {json}\n\n`.
    pub fn frame(&self) -> String {
        let json = serde_json::to_string(self)
            .unwrap_or_else(|_| r#"{"type":"error","message":"event serialization failed"}"#.into());
        format!("data: {json}\n\n")
    }
}

/// Ordered event channel from a run to the stream consumer.
///
/// Dropping the receiver cancels the run: the next `emit` trips the
/// cancellation token, which is shared with in-flight gateway calls.
#[derive(Clone)]
pub struct EventSink {
    tx: UnboundedSender<Event>,
    cancel: CancellationToken,
}

impl EventSink {
    pub fn channel() -> (Self, UnboundedReceiver<Event>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                tx,
                cancel: CancellationToken::new(),
            },
            rx,
        )
    }

    /// Share an externally created token (lets the caller wire the same
    /// token into the gateway).
    pub fn channel_with(cancel: CancellationToken) -> (Self, UnboundedReceiver<Event>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx, cancel }, rx)
    }

    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn emit(&self, event: Event) {
        if self.tx.send(event).is_err() && !self.cancel.is_cancelled() {
            tracing::info!("event stream closed by consumer — cancelling run");
            self.cancel.cancel();
        }
    }

    pub fn emit_with(&self, kind: impl Into<String>, payload: &impl Serialize) {
        self.emit(Event::with(kind, payload));
    }

    pub fn emit_bare(&self, kind: impl Into<String>) {
        self.emit(Event::new(kind));
    }

    pub fn emit_error(&self, message: impl Into<String>) {
        self.emit(Event::error(message));
    }
}
