//! Template matching engine behind the [`MatchService`] seam

use super::{
    config::MatchConfig,
    error::{MatchError, MatchResult},
    template::{Template, TemplateLibrary},
};
use crate::adb::{Point, Region};
use image::{GrayImage, RgbImage};
use imageproc::template_matching::{MatchTemplateMethod, find_extremes, match_template};

/// A template located in a frame, in frame coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchHit {
    pub template: String,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub confidence: f32,
}

impl MatchHit {
    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2, self.y + self.height / 2)
    }
}

/// What to look for. The first template found wins, in list order.
#[derive(Debug, Clone)]
pub struct MatchRequest<'a> {
    pub templates: &'a [&'a str],
    pub region: Option<Region>,
    pub precision: Option<f32>,
    /// Factor the frame was downsized by relative to the screen.
    pub scale: f32,
}

impl<'a> MatchRequest<'a> {
    pub fn new(templates: &'a [&'a str]) -> Self {
        Self {
            templates,
            region: None,
            precision: None,
            scale: 1.0,
        }
    }

    pub fn region(mut self, region: Region) -> Self {
        self.region = Some(region);
        self
    }

    pub fn precision(mut self, precision: f32) -> Self {
        self.precision = Some(precision);
        self
    }

    pub fn scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextMode {
    Digits,
    Text,
}

/// Finds templates in frames. Synchronous so it can run on blocking workers.
pub trait MatchService: Send + Sync {
    fn find(&self, frame: &RgbImage, request: &MatchRequest<'_>) -> MatchResult<Option<MatchHit>>;

    fn recognize_text(&self, _frame: &RgbImage, _mode: TextMode) -> MatchResult<String> {
        Err(MatchError::TextRecognitionUnavailable)
    }
}

/// Normalized cross-correlation matcher over a [`TemplateLibrary`].
pub struct TemplateDetector {
    library: TemplateLibrary,
    config: MatchConfig,
}

impl TemplateDetector {
    pub fn new(library: TemplateLibrary, config: MatchConfig) -> Self {
        Self { library, config }
    }

    pub fn library(&self) -> &TemplateLibrary {
        &self.library
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    fn search_area(&self, template: &Template, request: &MatchRequest<'_>, frame: &GrayImage) -> Region {
        let (fw, fh) = frame.dimensions();
        let screen = (
            (fw as f32 / request.scale) as u32,
            (fh as f32 / request.scale) as u32,
        );
        request
            .region
            .or_else(|| {
                template
                    .search_region
                    .map(|r| r.expand(self.config.search_margin, screen.0, screen.1))
            })
            .map(|r| r.scaled(request.scale).clip_to_screen(fw, fh))
            .unwrap_or_else(|| Region::full_screen(fw, fh))
    }

    fn match_one(
        &self,
        frame: &GrayImage,
        template: &Template,
        request: &MatchRequest<'_>,
        threshold: f32,
    ) -> Option<MatchHit> {
        let area = self.search_area(template, request, frame);
        let cropped = image::imageops::crop_imm(frame, area.x, area.y, area.width, area.height).to_image();

        let mut best: Option<MatchHit> = None;
        for scale in self.config.scales(request.scale) {
            let scaled = if (scale - 1.0).abs() > 0.01 {
                let w = (template.width() as f32 * scale) as u32;
                let h = (template.height() as f32 * scale) as u32;
                if w == 0 || h == 0 {
                    continue;
                }
                image::imageops::resize(&template.image, w, h, image::imageops::FilterType::Triangle)
            } else {
                template.image.clone()
            };

            if scaled.width() > cropped.width() || scaled.height() > cropped.height() {
                log::debug!(
                    "Skipping '{}' at scale {:.2}: {}x{} larger than search area {}x{}",
                    template.name,
                    scale,
                    scaled.width(),
                    scaled.height(),
                    cropped.width(),
                    cropped.height()
                );
                continue;
            }
            let template_pixels = scaled.width() as u64 * scaled.height() as u64;
            let search_pixels = cropped.width() as u64 * cropped.height() as u64;
            if template_pixels > self.config.max_template_pixels
                || search_pixels > self.config.max_search_pixels
            {
                log::warn!("⚠️ Skipping oversized match for '{}'", template.name);
                continue;
            }

            let scores = match_template(&cropped, &scaled, MatchTemplateMethod::CrossCorrelationNormalized);
            let extremes = find_extremes(&scores);
            let confidence = extremes.max_value;
            if confidence >= threshold
                && best.as_ref().is_none_or(|b| confidence > b.confidence)
            {
                let (x, y) = extremes.max_value_location;
                best = Some(MatchHit {
                    template: template.name.clone(),
                    x: area.x + x,
                    y: area.y + y,
                    width: scaled.width(),
                    height: scaled.height(),
                    confidence,
                });
            }
        }
        best
    }
}

impl MatchService for TemplateDetector {
    fn find(&self, frame: &RgbImage, request: &MatchRequest<'_>) -> MatchResult<Option<MatchHit>> {
        let threshold = request.precision.unwrap_or(self.config.confidence_threshold);
        let gray = image::imageops::grayscale(frame);

        for name in request.templates {
            let Some(template) = self.library.get(name) else {
                log::debug!("Template '{}' is not loaded, treating as not visible", name);
                continue;
            };
            if let Some(hit) = self.match_one(&gray, template, request, threshold) {
                log::debug!(
                    "🎯 '{}' at ({}, {}) confidence {:.3}",
                    hit.template,
                    hit.x,
                    hit.y,
                    hit.confidence
                );
                return Ok(Some(hit));
            }
        }
        Ok(None)
    }
}
