//! Configuration for image matching operations

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    /// Precision used when a request does not carry its own (0.0 to 1.0)
    pub confidence_threshold: f32,
    /// Whether to retry each template at several scales
    pub enable_multiscale: bool,
    /// Scale factors for multi-scale matching
    pub scale_factors: Vec<f32>,
    /// Pixels added around a template's own region when searching for it
    pub search_margin: u32,
    /// Templates larger than this are skipped to keep matching bounded
    pub max_template_pixels: u64,
    pub max_search_pixels: u64,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.8,
            enable_multiscale: false,
            scale_factors: vec![0.9, 1.0, 1.1],
            search_margin: 10,
            max_template_pixels: 1_000_000,
            max_search_pixels: 5_000_000,
        }
    }
}

impl MatchConfig {
    /// Scales tried for a request made against a frame downsized by `base`.
    pub fn scales(&self, base: f32) -> Vec<f32> {
        if self.enable_multiscale && !self.scale_factors.is_empty() {
            self.scale_factors.iter().map(|s| s * base).collect()
        } else {
            vec![base]
        }
    }
}
