use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    Thinking,
    ToolCall,
    ToolResult,
    Error,
    Output,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepEvent {
    pub kind: StepKind,
    pub turn: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    pub content: String,
}

impl StepEvent {
    pub fn new(kind: StepKind, turn: u32, content: impl Into<String>) -> Self {
        Self {
            kind,
            turn,
            tool: None,
            content: content.into(),
        }
    }

    pub fn for_tool(mut self, tool: impl Into<String>) -> Self {
        self.tool = Some(tool.into());
        self
    }
}

/// Sending half of the step-event stream. Never blocks: events are dropped
/// when the consumer falls behind.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<mpsc::Sender<StepEvent>>,
}

impl EventSink {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<StepEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx: Some(tx) }, rx)
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn emit(&self, event: StepEvent) {
        let Some(tx) = &self.tx else {
            return;
        };
        match tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                debug!(kind = ?event.kind, "Step event dropped, consumer is behind");
            }
            Err(TrySendError::Closed(_)) => {}
        }
    }
}

/// Cooperative cancellation, observed at turn boundaries.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
