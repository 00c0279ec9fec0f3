//! Mutable run state: the cooperative stop/pause flags and the agent state
//! that capability bodies, the loop and background jobs share.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::time::Instant;

/// Flags raised from outside (commands, shortcuts, signals) and read at the
/// top of each loop slot and inside the pipeline.
#[derive(Debug, Default)]
pub struct RunFlags {
    terminate: AtomicBool,
    pause: AtomicBool,
}

impl RunFlags {
    pub fn should_terminate(&self) -> bool {
        self.terminate.load(Ordering::SeqCst)
    }

    pub fn request_termination(&self) {
        self.terminate.store(true, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.pause.load(Ordering::SeqCst)
    }

    pub fn set_paused(&self, paused: bool) {
        self.pause.store(paused, Ordering::SeqCst);
    }
}

#[derive(Debug, Default)]
pub struct AgentState {
    pub current_activity: Option<String>,
    pub next_execution: HashMap<String, Instant>,
    pub owned_items: BTreeSet<String>,
    pub next_item_to_upgrade: Option<String>,
    pub stage: Option<u64>,
    pub usage: BTreeMap<String, u64>,
    pub master_levelled_this_prestige: bool,
}

impl AgentState {
    /// Every timer-gated capability starts out due.
    pub fn seed_timers<'a>(&mut self, capabilities: impl IntoIterator<Item = &'a str>, now: Instant) {
        for name in capabilities {
            self.next_execution.insert(name.to_string(), now);
        }
    }

    /// A capability without a timer entry is always due.
    pub fn is_due(&self, capability: &str, now: Instant) -> bool {
        self.next_execution
            .get(capability)
            .is_none_or(|next| now >= *next)
    }

    pub fn increment_usage(&mut self, capability: &str) -> u64 {
        let count = self.usage.entry(capability.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    /// Clear everything tied to the current prestige cycle.
    pub fn reset_prestige_cycle(&mut self) {
        self.master_levelled_this_prestige = false;
        self.stage = None;
    }
}
