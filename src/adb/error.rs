use thiserror::Error;

/// A specialized `Result` type for device surface operations.
pub type AdbResult<T> = Result<T, AdbError>;

/// The error type for all capture and input operations.
#[derive(Debug, Error)]
pub enum AdbError {
    #[error(
        "'adb' binary not found in PATH. Install Android Platform Tools (https://developer.android.com/tools/adb) or add 'adb' to PATH."
    )]
    AdbNotFound,

    #[error("Failed to invoke 'adb': {source}")]
    Spawn {
        #[from]
        source: std::io::Error,
    },

    #[error("adb {command} failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("No devices available. Connect a device or start an emulator.")]
    NoDevice,

    #[error("Device '{name}' not found")]
    DeviceNotFound { name: String },

    #[error("adb connect to '{name}' failed: {output}. Try: 'adb tcpip 5555'")]
    ConnectFailed { name: String, output: String },

    #[error("Could not parse screen size from 'wm size' output.")]
    ScreenSizeParseFailed,

    #[error("Failed to decode screen capture: {description}")]
    CaptureDecodeFailed { description: String },

    #[error("Capture region {x},{y} {width}x{height} exceeds screen {screen_width}x{screen_height}")]
    RegionOutOfBounds {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        screen_width: u32,
        screen_height: u32,
    },

    #[error("Input coordinates are out of bounds: x={x}, y={y}")]
    InputOutOfBounds { x: u32, y: u32 },
}

impl AdbError {
    /// Errors that mean the device is gone rather than a single command failing.
    pub fn is_disconnect(&self) -> bool {
        match self {
            AdbError::NoDevice | AdbError::DeviceNotFound { .. } | AdbError::AdbNotFound => true,
            AdbError::CommandFailed { stderr, .. } => {
                stderr.contains("device offline") || stderr.contains("no devices")
            }
            _ => false,
        }
    }
}
