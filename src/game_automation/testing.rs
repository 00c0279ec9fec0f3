//! Scripted surface and matcher doubles for engine tests.

use super::bot::{Bot, BotBuilder};
use super::match_image::{MatchHit, MatchRequest, MatchResult, MatchService};
use super::registry::{Capability, CapabilityRegistry};
use crate::adb::{AdbResult, ClickSpec, Point, Region, ScreenBackend, Surface};
use crate::config::BotConfig;
use async_trait::async_trait;
use image::RgbImage;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceOp {
    Capture,
    Click { point: Point, clicks: u32 },
    Drag { start: Point, end: Point },
}

/// Every operation the scripted surface received, shared with the matcher
/// so rules can depend on what already happened.
#[derive(Debug, Clone, Default)]
pub struct SurfaceLog(Arc<Mutex<Vec<SurfaceOp>>>);

impl SurfaceLog {
    fn record(&self, op: SurfaceOp) {
        self.0.lock().expect("surface log").push(op);
    }

    pub fn ops(&self) -> Vec<SurfaceOp> {
        self.0.lock().expect("surface log").clone()
    }

    pub fn clicks(&self) -> usize {
        self.taps().len()
    }

    pub fn taps(&self) -> Vec<(Point, u32)> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                SurfaceOp::Click { point, clicks } => Some((point, clicks)),
                _ => None,
            })
            .collect()
    }

    pub fn drags(&self) -> usize {
        self.ops()
            .iter()
            .filter(|op| matches!(op, SurfaceOp::Drag { .. }))
            .count()
    }
}

/// Ordered list of labels pushed by test capabilities.
#[derive(Debug, Clone, Default)]
pub struct Recorder(Arc<Mutex<Vec<String>>>);

impl Recorder {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().expect("recorder").push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().expect("recorder").clone()
    }

    pub fn count(&self, entry: &str) -> usize {
        self.entries().iter().filter(|e| *e == entry).count()
    }
}

/// Returns queued frames as-is, then a black screen.
pub struct ScriptedSurface {
    log: SurfaceLog,
    frames: Mutex<VecDeque<RgbImage>>,
}

#[async_trait]
impl Surface for ScriptedSurface {
    async fn capture(&self, _region: Option<Region>) -> AdbResult<RgbImage> {
        self.log.record(SurfaceOp::Capture);
        let frame = self.frames.lock().expect("frames").pop_front();
        Ok(frame.unwrap_or_else(|| RgbImage::new(48, 80)))
    }

    async fn click(&self, point: Point, spec: ClickSpec) -> AdbResult<()> {
        self.log.record(SurfaceOp::Click {
            point,
            clicks: spec.clicks,
        });
        Ok(())
    }

    async fn drag(&self, start: Point, end: Point) -> AdbResult<()> {
        self.log.record(SurfaceOp::Drag { start, end });
        Ok(())
    }

    fn dimensions(&self) -> (u32, u32) {
        (480, 800)
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

type Rule = dyn Fn(&str, &SurfaceLog, &RgbImage) -> bool + Send + Sync;

/// Reports a template as visible when its rule says so.
#[derive(Clone)]
pub struct ScriptedMatcher {
    rule: Arc<Rule>,
    log: SurfaceLog,
    queries: Arc<Mutex<Vec<String>>>,
}

impl ScriptedMatcher {
    pub fn when<F>(rule: F) -> Self
    where
        F: Fn(&str, &SurfaceLog, &RgbImage) -> bool + Send + Sync + 'static,
    {
        Self {
            rule: Arc::new(rule),
            log: SurfaceLog::default(),
            queries: Arc::default(),
        }
    }

    pub fn nothing() -> Self {
        Self::when(|_, _, _| false)
    }

    pub fn showing(templates: &[&str]) -> Self {
        let visible: Vec<String> = templates.iter().map(|t| t.to_string()).collect();
        Self::when(move |template, _, _| visible.iter().any(|v| v == template))
    }
}

impl MatchService for ScriptedMatcher {
    fn find(&self, frame: &RgbImage, request: &MatchRequest<'_>) -> MatchResult<Option<MatchHit>> {
        for template in request.templates {
            self.queries.lock().expect("queries").push(template.to_string());
            if (self.rule)(template, &self.log, frame) {
                return Ok(Some(MatchHit {
                    template: template.to_string(),
                    x: 0,
                    y: 0,
                    width: 10,
                    height: 10,
                    confidence: 1.0,
                }));
            }
        }
        Ok(None)
    }
}

/// Builds bots over the scripted doubles and keeps handles to inspect them.
pub struct Harness {
    config: BotConfig,
    log: SurfaceLog,
    frames: Vec<RgbImage>,
    matcher: ScriptedMatcher,
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

impl Harness {
    pub fn new() -> Self {
        Self {
            config: BotConfig::default(),
            log: SurfaceLog::default(),
            frames: Vec::new(),
            matcher: ScriptedMatcher::nothing(),
        }
        .matcher(ScriptedMatcher::nothing())
    }

    pub fn config(mut self, edit: impl FnOnce(&mut BotConfig)) -> Self {
        edit(&mut self.config);
        self
    }

    pub fn matcher(mut self, mut matcher: ScriptedMatcher) -> Self {
        matcher.log = self.log.clone();
        self.matcher = matcher;
        self
    }

    pub fn frames(mut self, frames: Vec<RgbImage>) -> Self {
        self.frames = frames;
        self
    }

    pub fn log(&self) -> &SurfaceLog {
        &self.log
    }

    /// Every template name the matcher was asked about, in order.
    pub fn queries(&self) -> Vec<String> {
        self.matcher.queries.lock().expect("queries").clone()
    }

    pub fn build(&self, capabilities: Vec<Capability>) -> Bot {
        self.build_with(capabilities, |builder| builder)
    }

    pub fn build_with(
        &self,
        capabilities: Vec<Capability>,
        customize: impl FnOnce(BotBuilder) -> BotBuilder,
    ) -> Bot {
        let registry = CapabilityRegistry::build(capabilities).expect("valid test registry");
        let surface = ScriptedSurface {
            log: self.log.clone(),
            frames: Mutex::new(self.frames.iter().cloned().collect()),
        };
        let screen = ScreenBackend::isolated(Arc::new(surface));
        let builder = Bot::builder(
            self.config.clone(),
            registry,
            screen,
            Arc::new(self.matcher.clone()),
        );
        customize(builder).build()
    }
}

pub fn test_bot(capabilities: Vec<Capability>) -> Bot {
    Harness::new().build(capabilities)
}
