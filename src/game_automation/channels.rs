// Communication channels for game automation
use super::types::AutomationEvent;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

const EVENT_CAPACITY: usize = 256;

/// Publishing half of the status channel. State setters publish without
/// awaiting; a full or closed channel only drops the event.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<mpsc::Sender<AutomationEvent>>,
}

impl EventSink {
    /// A sink nobody listens to.
    pub fn detached() -> Self {
        Self { tx: None }
    }

    pub fn publish(&self, event: AutomationEvent) {
        let Some(tx) = &self.tx else {
            return;
        };
        match tx.try_send(event) {
            Ok(()) | Err(TrySendError::Closed(_)) => {}
            Err(TrySendError::Full(event)) => {
                log::debug!("Event channel full, dropping {:?}", event);
            }
        }
    }
}

/// Helper function to create the status channel
pub fn create_automation_channels() -> (EventSink, mpsc::Receiver<AutomationEvent>) {
    let (event_tx, event_rx) = mpsc::channel(EVENT_CAPACITY);
    (EventSink { tx: Some(event_tx) }, event_rx)
}
