// Game automation module
// Capability registry, execution pipeline and control loop that drive an
// idle game through a device surface and a template matcher.

pub mod bot;
pub mod capabilities;
pub mod channels;
pub mod control_loop;
pub mod error;
pub mod match_image;
pub mod navigator;
pub mod pipeline;
pub mod queue;
pub mod registry;
pub mod safety;
pub mod scanner;
pub mod scheduler;
pub mod session;
pub mod shortcuts;
pub mod state;
pub mod transition;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

// Re-export the main types and functions for easy access
pub use bot::{Bot, BotBuilder};
pub use capabilities::{builtin_capabilities, default_registry};
pub use channels::{EventSink, create_automation_channels};
pub use control_loop::{BotRunner, loop_slots};
pub use error::{BotError, BotResult};
pub use navigator::{Edge, NavigationResult, NavigationState, PanelGuard, PanelTarget, with_panel};
pub use queue::{Command, CommandQueue, DurationUnit, MemoryQueue};
pub use registry::{Capability, CapabilityInfo, CapabilityRegistry, RegistryError};
pub use safety::{AppState, FailsafeProbe, FileSettings, PanicFile, SettingsSource, StaticSettings};
pub use scanner::{ScanReport, scan_owned_items};
pub use scheduler::{BackgroundScheduler, SchedulerState};
pub use session::{SessionOutcome, SessionRecord};
pub use shortcuts::ShortcutHandler;
pub use types::{AutomationEvent, BotState, EquipmentTab, Execution, Panel};
