use super::match_image::MatchError;
use super::registry::RegistryError;
use crate::adb::AdbError;
use crate::config::ConfigError;
use thiserror::Error;

pub type BotResult<T> = Result<T, BotError>;

/// Engine errors. The first four end a run with a classified outcome; the
/// rest are unclassified failures.
#[derive(Debug, Error)]
pub enum BotError {
    #[error("server termination has been encountered")]
    ServerTerminated,

    #[error("manual termination of the bot has been encountered")]
    ManualTermination,

    #[error("failsafe termination of the bot has been encountered")]
    FailsafeTriggered,

    #[error("transition state of the game could not be resolved after {attempts} attempts")]
    UnresolvedTransition { attempts: u32 },

    #[error("capability '{0}' is not registered")]
    UnknownCapability(String),

    #[error("surface operation failed: {0}")]
    Surface(#[from] AdbError),

    #[error("image matching failed: {0}")]
    Match(#[from] MatchError),

    #[error("scan worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl BotError {
    /// Errors after which no more input may be sent to the device.
    pub fn halts_input(&self) -> bool {
        matches!(self, BotError::ServerTerminated | BotError::FailsafeTriggered)
    }

    /// Errors that end the whole run, so background jobs stop too.
    pub fn ends_run(&self) -> bool {
        matches!(
            self,
            BotError::ServerTerminated | BotError::ManualTermination | BotError::FailsafeTriggered
        )
    }
}
