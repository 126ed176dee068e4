use crate::types::UpdateEvent;
use adk_core::{AdkError, Result};
use async_trait::async_trait;
use std::sync::Mutex;
use tokio::sync::mpsc;

/// Destination for the protocol events of one execution.
///
/// Writes happen strictly in generation order from a single writer. A failed
/// write means the peer is unreachable; the executor stops immediately.
#[async_trait]
pub trait EventQueue: Send + Sync {
    async fn write(&self, event: UpdateEvent) -> Result<()>;
}

/// Forwards events into a tokio channel. Fails once the receiver is dropped.
#[derive(Clone)]
pub struct ChannelQueue {
    sender: mpsc::Sender<UpdateEvent>,
}

impl ChannelQueue {
    pub fn new(sender: mpsc::Sender<UpdateEvent>) -> Self {
        Self { sender }
    }

    /// A queue plus the receiving end, buffering up to `capacity` events.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<UpdateEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }
}

#[async_trait]
impl EventQueue for ChannelQueue {
    async fn write(&self, event: UpdateEvent) -> Result<()> {
        self.sender
            .send(event)
            .await
            .map_err(|_| AdkError::Transport("event queue receiver closed".to_string()))
    }
}

/// Collects events in memory.
#[derive(Default)]
pub struct VecQueue {
    events: Mutex<Vec<UpdateEvent>>,
}

impl VecQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<UpdateEvent> {
        self.events.lock().map(|events| events.clone()).unwrap_or_default()
    }

    pub fn into_events(self) -> Vec<UpdateEvent> {
        self.events.into_inner().unwrap_or_default()
    }
}

#[async_trait]
impl EventQueue for VecQueue {
    async fn write(&self, event: UpdateEvent) -> Result<()> {
        self.events
            .lock()
            .map_err(|_| AdkError::Transport("event queue poisoned".to_string()))?
            .push(event);
        Ok(())
    }
}
