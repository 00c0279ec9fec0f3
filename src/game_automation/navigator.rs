//! Bottom-bar panel navigation and scoped panel acquisition.
//!
//! Navigation walks `Closed -> OpenUnknownScroll -> CollapseStateReached ->
//! EdgeReached`, each step bounded by `function_timeout_loops`. Running out
//! of attempts is reported as [`NavigationResult::Stalled`], not an error.

use super::bot::Bot;
use super::error::BotResult;
use super::types::{EquipmentTab, Panel};
use crate::adb::ClickSpec;
use std::future::Future;
use std::time::Duration;

const STEP_PAUSE: Duration = Duration::from_secs(1);
const DRAG_PAUSE: Duration = Duration::from_millis(500);
const TAB_CLICKS: u32 = 5;
const TAB_CLICK_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Top,
    Bottom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanelTarget {
    pub panel: Panel,
    pub collapsed: bool,
    pub edge: Edge,
    pub tab: Option<EquipmentTab>,
}

impl PanelTarget {
    /// Collapsed and scrolled to the top.
    pub fn new(panel: Panel) -> Self {
        Self {
            panel,
            collapsed: true,
            edge: Edge::Top,
            tab: None,
        }
    }

    pub fn expanded(mut self) -> Self {
        self.collapsed = false;
        self
    }

    pub fn bottom(mut self) -> Self {
        self.edge = Edge::Bottom;
        self
    }

    pub fn tab(mut self, tab: EquipmentTab) -> Self {
        self.tab = Some(tab);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationState {
    Closed,
    OpenUnknownScroll,
    CollapseStateReached,
    EdgeReached,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationResult {
    Reached,
    /// Gave up in this state.
    Stalled(NavigationState),
}

impl NavigationResult {
    pub fn is_reached(&self) -> bool {
        matches!(self, NavigationResult::Reached)
    }
}

pub async fn navigate(bot: &Bot, target: &PanelTarget) -> BotResult<NavigationResult> {
    let bound = bot.config().function_timeout_loops;
    let layout = bot.layout();
    let Some(panel) = layout.panel(target.panel) else {
        log::warn!("⚠️ no layout configured for the {} panel", target.panel.key());
        return Ok(NavigationResult::Stalled(NavigationState::Closed));
    };
    log::debug!("🧭 navigating to {:?}", target);

    // Closed -> open.
    let mut opened = false;
    for attempt in 0..=bound {
        if bot.is_visible(&panel.active).await? {
            opened = true;
            break;
        }
        if attempt == bound {
            break;
        }
        bot.click(panel.icon, ClickSpec::times(1), STEP_PAUSE).await?;
    }
    if !opened {
        return Ok(stalled(target, NavigationState::Closed));
    }
    let mut state = NavigationState::OpenUnknownScroll;

    if target.panel.is_collapsible() {
        let (landmark, toggle) = if target.collapsed {
            (&layout.landmarks.expand_panel, layout.expand_collapse_top)
        } else {
            (&layout.landmarks.collapse_panel, layout.expand_collapse_bottom)
        };
        let mut toggled = false;
        for attempt in 0..=bound {
            if bot.is_visible(landmark).await? {
                toggled = true;
                break;
            }
            if attempt == bound {
                break;
            }
            let jitter = bot.config().actions.click_jitter;
            bot.click(toggle, ClickSpec::times(1).jitter(jitter), STEP_PAUSE)
                .await?;
        }
        if !toggled {
            return Ok(stalled(target, state));
        }
        state = NavigationState::CollapseStateReached;
    }

    if target.panel.has_tabs() {
        let Some(tab) = target.tab else {
            return Ok(NavigationResult::Reached);
        };
        let Some(point) = layout.equipment_tab(tab) else {
            log::warn!("⚠️ no layout configured for the {} tab", tab.key());
            return Ok(stalled(target, state));
        };
        bot.click(
            point,
            ClickSpec::times(TAB_CLICKS).interval(TAB_CLICK_INTERVAL),
            DRAG_PAUSE,
        )
        .await?;
        let (start, end) = match target.edge {
            Edge::Top => (layout.equipment_drag_start, layout.equipment_drag_end),
            Edge::Bottom => (layout.equipment_drag_end, layout.equipment_drag_start),
        };
        bot.drag(start, end, DRAG_PAUSE).await?;
        return Ok(NavigationResult::Reached);
    }

    let (landmark, drag_end) = match target.edge {
        Edge::Top => (&panel.top, layout.scroll_top_end),
        Edge::Bottom => match &panel.bottom {
            Some(bottom) => (bottom, layout.scroll_bottom_end),
            None => {
                log::debug!("{} has no bottom landmark, using its top", target.panel.key());
                (&panel.top, layout.scroll_bottom_end)
            }
        },
    };
    // One check more than drags, so a landmark revealed by the last drag counts.
    for attempt in 0..=bound {
        if bot.is_visible(landmark).await? {
            log::debug!("🧭 reached {:?}", target);
            return Ok(NavigationResult::Reached);
        }
        if attempt == bound {
            break;
        }
        bot.drag(layout.scroll_start, drag_end, DRAG_PAUSE).await?;
    }
    Ok(stalled(target, state))
}

fn stalled(target: &PanelTarget, state: NavigationState) -> NavigationResult {
    log::warn!("⚠️ navigation to {:?} stalled in {:?}", target.panel, state);
    NavigationResult::Stalled(state)
}

/// Collapse whatever panel is open, falling back to closing it.
/// Returns whether a safe screen was reached.
pub async fn ensure_collapsed(bot: &Bot) -> BotResult<bool> {
    let landmarks = &bot.layout().landmarks;
    for _ in 0..bot.config().function_timeout_loops {
        if bot.search(&landmarks.collapsed_markers).await?.is_some() {
            return Ok(true);
        }
        if !bot
            .find_and_click(&landmarks.collapse_panel, STEP_PAUSE)
            .await?
        {
            break;
        }
    }
    close_panels(bot).await
}

/// Close open panels through their exit landmarks.
pub async fn close_panels(bot: &Bot) -> BotResult<bool> {
    let landmarks = &bot.layout().landmarks;
    for _ in 0..bot.config().function_timeout_loops {
        if bot.find_and_click(&landmarks.exit_panel, STEP_PAUSE).await? {
            continue;
        }
        if bot
            .find_and_click(&landmarks.large_exit_panel, STEP_PAUSE)
            .await?
        {
            continue;
        }
        return Ok(true);
    }
    log::warn!("⚠️ panels are still open after closing attempts");
    Ok(false)
}

/// A navigated panel that is restored with [`ensure_collapsed`] unless it
/// is released after a clean use. Dropping an armed guard spawns the restore.
pub struct PanelGuard {
    bot: Bot,
    result: NavigationResult,
    armed: bool,
}

impl PanelGuard {
    pub async fn acquire(bot: &Bot, target: &PanelTarget) -> BotResult<Self> {
        match navigate(bot, target).await {
            Ok(result) => Ok(Self {
                bot: bot.clone(),
                result,
                armed: true,
            }),
            Err(e) => {
                if !e.halts_input()
                    && let Err(restore) = ensure_collapsed(bot).await
                {
                    log::warn!("⚠️ could not restore panels: {}", restore);
                }
                Err(e)
            }
        }
    }

    pub fn result(&self) -> NavigationResult {
        self.result
    }

    pub fn reached(&self) -> bool {
        self.result.is_reached()
    }

    /// Leave the panel as it is.
    pub fn release(mut self) {
        self.armed = false;
    }

    /// Restore the panel now.
    pub async fn abandon(mut self) -> BotResult<bool> {
        self.armed = false;
        ensure_collapsed(&self.bot).await
    }
}

impl Drop for PanelGuard {
    fn drop(&mut self) {
        if !self.armed || !self.bot.app().is_active() {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            log::warn!("⚠️ panel guard dropped outside a runtime, panels left as they are");
            return;
        };
        let bot = self.bot.clone();
        handle.spawn(async move {
            if let Err(e) = ensure_collapsed(&bot).await {
                log::warn!("⚠️ could not restore panels: {}", e);
            }
        });
    }
}

/// Navigate to `target`, run `body` there and restore the panel on any
/// exit that is not a clean success. Returns `Ok(None)` when navigation
/// stalled and the body did not run.
pub async fn with_panel<T, F, Fut>(bot: &Bot, target: &PanelTarget, body: F) -> BotResult<Option<T>>
where
    F: FnOnce(Bot) -> Fut,
    Fut: Future<Output = BotResult<T>>,
{
    let guard = PanelGuard::acquire(bot, target).await?;
    if !guard.reached() {
        guard.abandon().await?;
        return Ok(None);
    }
    match body(bot.clone()).await {
        Ok(value) => {
            guard.release();
            Ok(Some(value))
        }
        Err(e) if e.halts_input() => {
            guard.release();
            Err(e)
        }
        Err(e) => {
            if let Err(restore) = guard.abandon().await {
                log::warn!("⚠️ could not restore panels: {}", restore);
            }
            Err(e)
        }
    }
}
