//! Session bookkeeping: how a run ended and what it did.

use super::error::BotError;
use chrono::{DateTime, Local};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SessionOutcome {
    ServerTerminated,
    ManualTermination,
    FailsafeTriggered,
    UnresolvedTransition,
    Crashed(String),
}

impl SessionOutcome {
    pub fn from_error(error: &BotError) -> Self {
        match error {
            BotError::ServerTerminated => SessionOutcome::ServerTerminated,
            BotError::ManualTermination => SessionOutcome::ManualTermination,
            BotError::FailsafeTriggered => SessionOutcome::FailsafeTriggered,
            BotError::UnresolvedTransition { .. } => SessionOutcome::UnresolvedTransition,
            other => SessionOutcome::Crashed(other.to_string()),
        }
    }

    /// Log the outcome at the severity its class deserves.
    pub fn log(&self, error: &BotError) {
        match self {
            SessionOutcome::FailsafeTriggered => {
                log::warn!("🛑 failsafe termination of the bot has been encountered, exiting...")
            }
            SessionOutcome::ManualTermination => {
                log::info!("⏹️ manual termination of the bot has been encountered, exiting...")
            }
            SessionOutcome::ServerTerminated => {
                log::info!("⏹️ server termination has been encountered, exiting...")
            }
            SessionOutcome::UnresolvedTransition | SessionOutcome::Crashed(_) => {
                log::error!("❌ unexpected error has been encountered, exiting: {:?}", error)
            }
        }
    }
}

impl fmt::Display for SessionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionOutcome::ServerTerminated => write!(f, "server terminated"),
            SessionOutcome::ManualTermination => write!(f, "manual termination"),
            SessionOutcome::FailsafeTriggered => write!(f, "failsafe triggered"),
            SessionOutcome::UnresolvedTransition => write!(f, "unresolved transition"),
            SessionOutcome::Crashed(reason) => write!(f, "crashed: {reason}"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionRecord {
    pub started_at: DateTime<Local>,
    pub ended_at: Option<DateTime<Local>>,
    pub outcome: Option<SessionOutcome>,
    pub usage: BTreeMap<String, u64>,
}

impl SessionRecord {
    pub fn start() -> Self {
        log::info!("==========================================================");
        log::info!("🤖 session started");
        log::info!("==========================================================");
        Self {
            started_at: Local::now(),
            ended_at: None,
            outcome: None,
            usage: BTreeMap::new(),
        }
    }

    pub fn end(&mut self, outcome: SessionOutcome, usage: BTreeMap<String, u64>) {
        self.ended_at = Some(Local::now());
        self.outcome = Some(outcome);
        self.usage = usage;
        log::info!("==========================================================");
        log::info!("🏁 session ended: {}", self);
        log::info!("==========================================================");
    }
}

impl fmt::Display for SessionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let outcome = self
            .outcome
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_else(|| "running".into());
        let runs: u64 = self.usage.values().sum();
        write!(
            f,
            "{} ({} capability runs, started {})",
            outcome,
            runs,
            self.started_at.format("%Y-%m-%d %H:%M:%S")
        )
    }
}
