// Device surface module
// Screen capture and synthetic input for an Android device driven through
// the `adb` command line tool.

pub mod backend;
pub mod error;
pub mod shell;
pub mod types;

#[cfg(test)]
mod tests;

pub use backend::ScreenBackend;
pub use error::{AdbError, AdbResult};
pub use shell::AdbShell;
pub use types::{Button, ClickSpec, Device, Point, Region, Surface};
