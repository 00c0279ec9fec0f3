// Types and enums for game automation
use super::queue::Command;
use super::session::SessionOutcome;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BotState {
    Running,
    Paused,
    Stopped,
}

/// What a capability body reports back to the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Execution {
    /// The body did its work; timers are recomputed.
    Performed,
    /// Not due, disabled or nothing to do.
    Skipped,
}

#[derive(Debug, Clone)]
pub enum AutomationEvent {
    StateChanged(BotState),
    ActivityChanged(String),
    TimerUpdated { capability: String, due_in: Duration },
    UsageIncremented { capability: String, count: u64 },
    CommandQueued(Command),
    CommandRemoved(u64),
    ItemsOwned(Vec<String>),
    StageUpdated(u64),
    Heartbeat,
    SessionEnded(SessionOutcome),
}

/// Bottom bar panels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Panel {
    Master,
    Heroes,
    Equipment,
    Pets,
    Artifacts,
    Shop,
}

impl Panel {
    pub const ALL: [Panel; 6] = [
        Panel::Master,
        Panel::Heroes,
        Panel::Equipment,
        Panel::Pets,
        Panel::Artifacts,
        Panel::Shop,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Panel::Master => "master",
            Panel::Heroes => "heroes",
            Panel::Equipment => "equipment",
            Panel::Pets => "pets",
            Panel::Artifacts => "artifacts",
            Panel::Shop => "shop",
        }
    }

    /// Every panel but the shop has an expand/collapse toggle.
    pub fn is_collapsible(self) -> bool {
        self != Panel::Shop
    }

    /// Panels that pick a sub-tab instead of scrolling.
    pub fn has_tabs(self) -> bool {
        self == Panel::Equipment
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EquipmentTab {
    Locked,
    Sword,
    Headgear,
    Chest,
    Slash,
    Aura,
}

impl EquipmentTab {
    pub fn key(self) -> &'static str {
        match self {
            EquipmentTab::Locked => "locked",
            EquipmentTab::Sword => "sword",
            EquipmentTab::Headgear => "headgear",
            EquipmentTab::Chest => "chest",
            EquipmentTab::Slash => "slash",
            EquipmentTab::Aura => "aura",
        }
    }
}
