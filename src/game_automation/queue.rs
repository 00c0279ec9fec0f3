//! Commands requested from outside the loop (frontend, shortcuts) and the
//! queue they wait in until the control loop consumes them.

use super::channels::EventSink;
use super::types::AutomationEvent;
use async_trait::async_trait;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DurationUnit {
    #[default]
    Seconds,
    Minutes,
    Hours,
}

impl DurationUnit {
    pub fn to_chrono(self, amount: u64) -> chrono::Duration {
        let factor = match self {
            DurationUnit::Seconds => 1,
            DurationUnit::Minutes => 60,
            DurationUnit::Hours => 3600,
        };
        // chrono durations top out at i64::MAX milliseconds.
        let seconds = amount.saturating_mul(factor).min((i64::MAX / 1000) as u64);
        chrono::Duration::seconds(seconds as i64)
    }
}

/// A one-shot request to run a capability. `eta` is informational: the
/// loop runs commands as soon as it reads them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Command {
    pub id: u64,
    pub capability: String,
    pub enqueued_at: DateTime<Local>,
    pub duration: u64,
    pub unit: DurationUnit,
    pub eta: DateTime<Local>,
}

impl Command {
    pub fn new(id: u64, capability: impl Into<String>, duration: u64, unit: DurationUnit) -> Self {
        let enqueued_at = Local::now();
        Self {
            id,
            capability: capability.into(),
            enqueued_at,
            duration,
            unit,
            eta: enqueued_at + unit.to_chrono(duration),
        }
    }
}

#[async_trait]
pub trait CommandQueue: Send + Sync {
    async fn push(&self, capability: &str, duration: u64, unit: DurationUnit) -> Command;
    /// Pending commands in the order they were pushed.
    async fn pending(&self) -> Vec<Command>;
    /// Delete a command; false when it was already gone.
    async fn remove(&self, id: u64) -> bool;
}

/// In-process queue that mirrors every change onto the event channel.
#[derive(Debug, Default)]
pub struct MemoryQueue {
    next_id: AtomicU64,
    commands: Mutex<VecDeque<Command>>,
    events: EventSink,
}

impl MemoryQueue {
    pub fn new(events: EventSink) -> Self {
        Self {
            next_id: AtomicU64::new(1),
            commands: Mutex::new(VecDeque::new()),
            events,
        }
    }

    pub async fn len(&self) -> usize {
        self.commands.lock().await.len()
    }
}

#[async_trait]
impl CommandQueue for MemoryQueue {
    async fn push(&self, capability: &str, duration: u64, unit: DurationUnit) -> Command {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let command = Command::new(id, capability, duration, unit);
        self.commands.lock().await.push_back(command.clone());
        log::debug!("📥 queued '{}' (#{})", capability, id);
        self.events.publish(AutomationEvent::CommandQueued(command.clone()));
        command
    }

    async fn pending(&self) -> Vec<Command> {
        self.commands.lock().await.iter().cloned().collect()
    }

    async fn remove(&self, id: u64) -> bool {
        let mut commands = self.commands.lock().await;
        let Some(pos) = commands.iter().position(|c| c.id == id) else {
            return false;
        };
        commands.remove(pos);
        drop(commands);
        self.events.publish(AutomationEvent::CommandRemoved(id));
        true
    }
}
