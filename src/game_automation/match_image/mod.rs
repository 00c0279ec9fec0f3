//! Image matching for the automation engine: template lookup, the
//! [`MatchService`] seam used by every screen check, and frame hashing for
//! duplicate detection while scrolling.

pub mod config;
pub mod detector;
pub mod error;
pub mod hash;
pub mod region;
pub mod template;


pub use config::MatchConfig;
pub use detector::{MatchHit, MatchRequest, MatchService, TemplateDetector, TextMode};
pub use error::{MatchError, MatchResult};
pub use hash::FrameHash;
pub use template::{Template, TemplateLibrary, template_key};
