//! The shared context every capability, the control loop and background jobs
//! run against.

use super::channels::EventSink;
use super::error::{BotError, BotResult};
use super::match_image::{MatchHit, MatchRequest, MatchService, TextMode};
use super::registry::CapabilityRegistry;
use super::safety::{AppState, FailsafeProbe, SETTINGS_TTL, SettingsCache, SettingsSource, StaticSettings};
use super::scheduler::SchedulerControl;
use super::state::{AgentState, RunFlags};
use super::types::{AutomationEvent, BotState};
use crate::adb::{ClickSpec, Point, Region, ScreenBackend};
use crate::config::{BotConfig, ScreenLayout};
use image::RgbImage;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};
use tokio::time::{Instant, sleep};

#[derive(Clone)]
pub struct Bot {
    inner: Arc<BotInner>,
}

struct BotInner {
    config: BotConfig,
    registry: CapabilityRegistry,
    screen: ScreenBackend,
    matcher: Arc<dyn MatchService>,
    state: Mutex<AgentState>,
    flags: RunFlags,
    settings: SettingsCache,
    app: AppState,
    failsafe: Option<Arc<dyn FailsafeProbe>>,
    scheduler: SchedulerControl,
    events: EventSink,
}

pub struct BotBuilder {
    config: BotConfig,
    registry: CapabilityRegistry,
    screen: ScreenBackend,
    matcher: Arc<dyn MatchService>,
    events: EventSink,
    settings: Arc<dyn SettingsSource>,
    app: AppState,
    failsafe: Option<Arc<dyn FailsafeProbe>>,
}

impl BotBuilder {
    pub fn events(mut self, events: EventSink) -> Self {
        self.events = events;
        self
    }

    pub fn settings(mut self, settings: Arc<dyn SettingsSource>) -> Self {
        self.settings = settings;
        self
    }

    pub fn app_state(mut self, app: AppState) -> Self {
        self.app = app;
        self
    }

    pub fn failsafe(mut self, probe: Arc<dyn FailsafeProbe>) -> Self {
        self.failsafe = Some(probe);
        self
    }

    pub fn build(self) -> Bot {
        Bot {
            inner: Arc::new(BotInner {
                config: self.config,
                registry: self.registry,
                screen: self.screen,
                matcher: self.matcher,
                state: Mutex::new(AgentState::default()),
                flags: RunFlags::default(),
                settings: SettingsCache::new(self.settings, SETTINGS_TTL),
                app: self.app,
                failsafe: self.failsafe,
                scheduler: SchedulerControl::default(),
                events: self.events,
            }),
        }
    }
}

impl Bot {
    pub fn builder(
        config: BotConfig,
        registry: CapabilityRegistry,
        screen: ScreenBackend,
        matcher: Arc<dyn MatchService>,
    ) -> BotBuilder {
        BotBuilder {
            config,
            registry,
            screen,
            matcher,
            events: EventSink::detached(),
            settings: Arc::new(StaticSettings::default()),
            app: AppState::new(),
            failsafe: None,
        }
    }

    pub fn config(&self) -> &BotConfig {
        &self.inner.config
    }

    pub fn layout(&self) -> &ScreenLayout {
        &self.inner.config.layout
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.inner.registry
    }

    pub fn flags(&self) -> &RunFlags {
        &self.inner.flags
    }

    pub fn scheduler(&self) -> &SchedulerControl {
        &self.inner.scheduler
    }

    pub fn events(&self) -> &EventSink {
        &self.inner.events
    }

    pub fn app(&self) -> &AppState {
        &self.inner.app
    }

    pub fn matcher(&self) -> Arc<dyn MatchService> {
        self.inner.matcher.clone()
    }

    pub async fn state(&self) -> MutexGuard<'_, AgentState> {
        self.inner.state.lock().await
    }

    // ------------------------------------------------------------------
    // Run control
    // ------------------------------------------------------------------

    pub fn check_liveness(&self) -> BotResult<()> {
        if self.inner.app.is_active() {
            Ok(())
        } else {
            Err(BotError::ServerTerminated)
        }
    }

    pub async fn failsafe_check(&self) -> BotResult<()> {
        let Some(probe) = &self.inner.failsafe else {
            return Ok(());
        };
        if self.inner.settings.get().await.enable_failsafe && probe.is_triggered() {
            return Err(BotError::FailsafeTriggered);
        }
        Ok(())
    }

    pub fn check_terminate(&self) -> BotResult<()> {
        if self.inner.flags.should_terminate() {
            Err(BotError::ManualTermination)
        } else {
            Ok(())
        }
    }

    /// Pause the loop and background jobs until [`Bot::resume_run`].
    pub fn pause_run(&self) {
        self.inner.flags.set_paused(true);
        self.inner.scheduler.pause();
        log::info!("⏸️ bot paused");
        self.publish(AutomationEvent::StateChanged(BotState::Paused));
    }

    pub fn resume_run(&self) {
        self.inner.flags.set_paused(false);
        self.inner.scheduler.resume();
        log::info!("▶️ bot resumed");
        self.publish(AutomationEvent::StateChanged(BotState::Running));
    }

    pub fn stop_run(&self) {
        self.inner.flags.request_termination();
        log::info!("⏹️ termination requested");
    }

    pub fn publish(&self, event: AutomationEvent) {
        self.inner.events.publish(event);
    }

    // ------------------------------------------------------------------
    // Agent state
    // ------------------------------------------------------------------

    pub async fn seed_timers(&self) {
        let timed = self.inner.registry.timed();
        let mut state = self.state().await;
        state.seed_timers(timed.iter().map(|c| c.name.as_str()), Instant::now());
    }

    pub async fn is_due(&self, capability: &str, force: bool) -> bool {
        force || self.state().await.is_due(capability, Instant::now())
    }

    /// Push `capability`'s next run one configured interval out.
    pub async fn schedule_next(&self, capability: &str) {
        let due_in = match self.inner.config.interval_for(capability) {
            Some(interval) => interval,
            None => {
                log::warn!("⚠️ no interval configured for {}, it stays due", capability);
                Duration::ZERO
            }
        };
        self.state()
            .await
            .next_execution
            .insert(capability.to_string(), Instant::now() + due_in);
        log::debug!("⏱️ {} next runs in {}s", capability, due_in.as_secs());
        self.publish(AutomationEvent::TimerUpdated {
            capability: capability.to_string(),
            due_in,
        });
    }

    pub async fn set_activity(&self, capability: &str) {
        self.state().await.current_activity = Some(capability.to_string());
        self.publish(AutomationEvent::ActivityChanged(capability.to_string()));
    }

    pub async fn record_usage(&self, capability: &str) -> u64 {
        let count = self.state().await.increment_usage(capability);
        self.publish(AutomationEvent::UsageIncremented {
            capability: capability.to_string(),
            count,
        });
        count
    }

    /// Record items confirmed by a scan and pick the next one to upgrade.
    pub async fn mark_owned(&self, items: &[String]) {
        let upgrade_order = &self.inner.config.inventory.upgrade_order;
        let mut state = self.state().await;
        state.owned_items.extend(items.iter().cloned());
        state.next_item_to_upgrade = upgrade_order
            .iter()
            .find(|name| state.owned_items.contains(*name))
            .cloned();
        drop(state);
        self.publish(AutomationEvent::ItemsOwned(items.to_vec()));
    }

    // ------------------------------------------------------------------
    // Screen
    // ------------------------------------------------------------------

    pub async fn snapshot(&self, region: Option<Region>) -> BotResult<RgbImage> {
        Ok(self.inner.screen.capture(region).await?)
    }

    /// Capture the screen and return the first of `templates` that is visible.
    pub async fn search<S: AsRef<str> + Sync>(&self, templates: &[S]) -> BotResult<Option<MatchHit>> {
        let names: Vec<String> = templates.iter().map(|t| t.as_ref().to_string()).collect();
        if names.is_empty() {
            return Ok(None);
        }
        let frame = self.snapshot(None).await?;
        let matcher = self.matcher();
        let precision = self.inner.config.match_precision;
        let hit = tokio::task::spawn_blocking(move || {
            let refs: Vec<&str> = names.iter().map(String::as_str).collect();
            matcher.find(&frame, &MatchRequest::new(&refs).precision(precision))
        })
        .await??;
        Ok(hit)
    }

    pub async fn is_visible(&self, template: &str) -> BotResult<bool> {
        Ok(self.search(&[template]).await?.is_some())
    }

    /// Click the centre of `template` if it is visible.
    pub async fn find_and_click(&self, template: &str, pause: Duration) -> BotResult<bool> {
        match self.search(&[template]).await? {
            Some(hit) => {
                self.click(hit.center(), ClickSpec::times(1), pause).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub async fn click(&self, point: Point, spec: ClickSpec, pause: Duration) -> BotResult<()> {
        self.failsafe_check().await?;
        self.inner.screen.click(point, spec).await?;
        if !pause.is_zero() {
            sleep(pause).await;
        }
        Ok(())
    }

    pub async fn drag(&self, start: Point, end: Point, pause: Duration) -> BotResult<()> {
        self.failsafe_check().await?;
        self.inner.screen.drag(start, end).await?;
        if !pause.is_zero() {
            sleep(pause).await;
        }
        Ok(())
    }

    /// Read text from a screen region through the match service.
    pub async fn read_text(&self, region: Region, mode: TextMode) -> BotResult<String> {
        let frame = self.snapshot(Some(region)).await?;
        let matcher = self.matcher();
        let text = tokio::task::spawn_blocking(move || matcher.recognize_text(&frame, mode)).await??;
        Ok(text)
    }
}
