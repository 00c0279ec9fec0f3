// Core surface types and traits
use super::error::AdbResult;
use async_trait::async_trait;
use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: u32,
    pub y: u32,
}

impl Point {
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

/// Rectangle in screen pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn full_screen(screen_width: u32, screen_height: u32) -> Self {
        Self::new(0, 0, screen_width, screen_height)
    }

    pub fn contains_point(&self, point: Point) -> bool {
        point.x >= self.x
            && point.x < self.x + self.width
            && point.y >= self.y
            && point.y < self.y + self.height
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2, self.y + self.height / 2)
    }

    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    pub fn fits_within(&self, screen_width: u32, screen_height: u32) -> bool {
        self.x + self.width <= screen_width && self.y + self.height <= screen_height
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Button {
    #[default]
    Left,
    /// Long press on touch devices.
    Right,
}

/// How a click is delivered: repeat count, spacing between repeats,
/// button and a random offset applied to each tap.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClickSpec {
    pub clicks: u32,
    pub interval: Duration,
    pub button: Button,
    pub jitter: u32,
}

impl Default for ClickSpec {
    fn default() -> Self {
        Self {
            clicks: 1,
            interval: Duration::ZERO,
            button: Button::Left,
            jitter: 0,
        }
    }
}

impl ClickSpec {
    pub fn times(clicks: u32) -> Self {
        Self {
            clicks,
            ..Self::default()
        }
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn jitter(mut self, jitter: u32) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn button(mut self, button: Button) -> Self {
        self.button = button;
        self
    }
}

/// A device screen that can be captured and driven with synthetic input.
#[async_trait]
pub trait Surface: Send + Sync {
    /// Capture the screen, cropped to `region` when given.
    async fn capture(&self, region: Option<Region>) -> AdbResult<RgbImage>;
    async fn click(&self, point: Point, spec: ClickSpec) -> AdbResult<()>;
    async fn drag(&self, start: Point, end: Point) -> AdbResult<()>;
    fn dimensions(&self) -> (u32, u32);
    fn name(&self) -> &str;
}

#[derive(Debug, PartialEq, Serialize, Clone)]
pub struct Device {
    pub name: String,
    pub transport_id: Option<String>,
}
