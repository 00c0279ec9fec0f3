pub mod adb;
pub mod config;
pub mod game_automation;

pub use adb::{AdbShell, ScreenBackend};
pub use config::BotConfig;
pub use game_automation::{Bot, BotRunner};
