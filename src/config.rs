//! Bot configuration loaded from TOML. Every section has defaults so a
//! partial file is valid.

use crate::adb::{Point, Region};
use crate::game_automation::match_image::MatchConfig;
use crate::game_automation::types::{EquipmentTab, Panel};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Built-in loop order; `loop_order` in the file overrides it.
pub const DEFAULT_LOOP_ORDER: &[&str] = &[
    "fight_boss",
    "fairy_tap",
    "level_master",
    "level_heroes",
    "prestige",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Seconds slept after each action, picked uniformly in `[min, max]`.
    pub post_action_min_wait: u64,
    pub post_action_max_wait: u64,
    /// Periodic capabilities in the order the loop visits them.
    pub loop_order: Vec<String>,
    /// Per-capability switch; capabilities not listed are enabled.
    pub enabled: HashMap<String, bool>,
    /// Seconds between runs of each timer-gated capability.
    pub intervals: HashMap<String, u64>,
    /// Capabilities forced once before the loop starts.
    pub on_start: Vec<String>,
    pub transition_max_loops: u32,
    pub function_timeout_loops: u32,
    pub pause_heartbeat_secs: u64,
    pub match_precision: f32,
    pub templates_dir: PathBuf,
    pub log_level: String,
    pub matching: MatchConfig,
    pub scan: ScanConfig,
    pub shortcuts: ShortcutConfig,
    pub inventory: InventoryConfig,
    pub actions: ActionConfig,
    pub layout: ScreenLayout,
}

impl Default for BotConfig {
    fn default() -> Self {
        let intervals = [
            ("fairy_tap", 30),
            ("level_master", 60),
            ("level_heroes", 90),
            ("prestige", 3600),
        ]
        .into_iter()
        .map(|(name, secs)| (name.to_string(), secs))
        .collect();
        Self {
            post_action_min_wait: 1,
            post_action_max_wait: 3,
            loop_order: DEFAULT_LOOP_ORDER.iter().map(|s| s.to_string()).collect(),
            enabled: HashMap::from([("prestige".to_string(), false)]),
            intervals,
            on_start: Vec::new(),
            transition_max_loops: 30,
            function_timeout_loops: 40,
            pause_heartbeat_secs: 10,
            match_precision: 0.8,
            templates_dir: PathBuf::from("templates"),
            log_level: "info".to_string(),
            matching: MatchConfig::default(),
            scan: ScanConfig::default(),
            shortcuts: ShortcutConfig::default(),
            inventory: InventoryConfig::default(),
            actions: ActionConfig::default(),
            layout: ScreenLayout::default(),
        }
    }
}

impl BotConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: BotConfig = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.post_action_min_wait > self.post_action_max_wait {
            return Err(ConfigError::Invalid(format!(
                "post_action_min_wait ({}) is larger than post_action_max_wait ({})",
                self.post_action_min_wait, self.post_action_max_wait
            )));
        }
        if self.transition_max_loops == 0 || self.function_timeout_loops == 0 {
            return Err(ConfigError::Invalid("loop bounds must be positive".into()));
        }
        if !(0.0..=1.0).contains(&self.match_precision) {
            return Err(ConfigError::Invalid(format!(
                "match_precision {} outside 0.0..=1.0",
                self.match_precision
            )));
        }
        if !(self.scan.downsize > 0.0 && self.scan.downsize <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "scan.downsize {} outside (0.0, 1.0]",
                self.scan.downsize
            )));
        }
        Ok(())
    }

    pub fn is_enabled(&self, capability: &str) -> bool {
        self.enabled.get(capability).copied().unwrap_or(true)
    }

    pub fn interval_for(&self, capability: &str) -> Option<Duration> {
        self.intervals.get(capability).map(|s| Duration::from_secs(*s))
    }

    pub fn heartbeat(&self) -> Duration {
        Duration::from_secs(self.pause_heartbeat_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Region of the inventory list that is captured.
    pub region: Region,
    pub downsize: f32,
    pub settle_ms: u64,
    /// Frames closer than this (average-hash bits) count as duplicates.
    pub duplicate_cutoff: u32,
    pub max_frames: u32,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            region: Region::new(0, 430, 480, 330),
            downsize: 0.5,
            settle_ms: 1500,
            duplicate_cutoff: 2,
            max_frames: 40,
        }
    }
}

impl ScanConfig {
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShortcutConfig {
    pub enabled: bool,
    pub cooldown_ms: u64,
}

impl Default for ShortcutConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cooldown_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InventoryConfig {
    /// Templates of collectable items the inventory scan looks for.
    pub items: Vec<String>,
    /// Preferred upgrade order; the first owned one is upgraded next.
    pub upgrade_order: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionConfig {
    pub master_level_clicks: u32,
    pub hero_level_clicks: u32,
    pub fairy_tap_clicks: u32,
    pub click_jitter: u32,
}

impl Default for ActionConfig {
    fn default() -> Self {
        Self {
            master_level_clicks: 5,
            hero_level_clicks: 3,
            fairy_tap_clicks: 5,
            click_jitter: 1,
        }
    }
}

/// Where things are on screen: fixed points, per-panel landmarks and the
/// landmarks used to recognise screen states.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenLayout {
    pub neutral_top: Point,
    pub scroll_start: Point,
    pub scroll_top_end: Point,
    pub scroll_bottom_end: Point,
    pub expand_collapse_top: Point,
    pub expand_collapse_bottom: Point,
    pub equipment_drag_start: Point,
    pub equipment_drag_end: Point,
    /// Keyed by tab name (`sword`, `headgear`, ...).
    pub equipment_tabs: BTreeMap<String, Point>,
    pub master_level: Point,
    pub hero_levels: Vec<Point>,
    pub fairy_points: Vec<Point>,
    pub prestige: Point,
    pub stage_region: Region,
    /// Keyed by panel name (`master`, `heroes`, ...).
    pub panels: BTreeMap<String, PanelLayout>,
    pub landmarks: Landmarks,
}

impl Default for ScreenLayout {
    fn default() -> Self {
        let panels = [
            (Panel::Master, 38),
            (Panel::Heroes, 118),
            (Panel::Equipment, 198),
            (Panel::Pets, 278),
            (Panel::Artifacts, 358),
            (Panel::Shop, 438),
        ]
        .into_iter()
        .map(|(panel, x)| (panel.key().to_string(), PanelLayout::standard(panel, Point::new(x, 780))))
        .collect();
        let equipment_tabs = [
            (EquipmentTab::Locked, 30),
            (EquipmentTab::Sword, 110),
            (EquipmentTab::Headgear, 190),
            (EquipmentTab::Chest, 270),
            (EquipmentTab::Slash, 350),
            (EquipmentTab::Aura, 430),
        ]
        .into_iter()
        .map(|(tab, x)| (tab.key().to_string(), Point::new(x, 140)))
        .collect();
        Self {
            neutral_top: Point::new(240, 60),
            scroll_start: Point::new(240, 520),
            scroll_top_end: Point::new(240, 760),
            scroll_bottom_end: Point::new(240, 280),
            expand_collapse_top: Point::new(380, 440),
            expand_collapse_bottom: Point::new(380, 90),
            equipment_drag_start: Point::new(240, 300),
            equipment_drag_end: Point::new(240, 700),
            equipment_tabs,
            master_level: Point::new(420, 520),
            hero_levels: vec![
                Point::new(420, 480),
                Point::new(420, 580),
                Point::new(420, 680),
            ],
            fairy_points: vec![
                Point::new(60, 180),
                Point::new(240, 160),
                Point::new(420, 180),
            ],
            prestige: Point::new(400, 710),
            stage_region: Region::new(200, 40, 80, 30),
            panels,
            landmarks: Landmarks::default(),
        }
    }
}

impl ScreenLayout {
    pub fn panel(&self, panel: Panel) -> Option<&PanelLayout> {
        self.panels.get(panel.key())
    }

    pub fn equipment_tab(&self, tab: EquipmentTab) -> Option<Point> {
        self.equipment_tabs.get(tab.key()).copied()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PanelLayout {
    /// Bottom bar point that opens the panel.
    pub icon: Point,
    /// Landmark visible once the panel is the active one.
    pub active: String,
    pub top: String,
    pub bottom: Option<String>,
}

impl PanelLayout {
    fn standard(panel: Panel, icon: Point) -> Self {
        let name = panel.key();
        Self {
            icon,
            active: format!("{name}_active"),
            top: format!("{name}_top"),
            bottom: Some(format!("{name}_bottom")),
        }
    }
}

/// A dialog that blocks the game: when `detect` is visible, the first
/// visible `dismiss` landmark is clicked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialogRule {
    pub detect: String,
    pub dismiss: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Landmarks {
    pub app_icon: String,
    pub large_exit_panel: String,
    pub exit_panel: String,
    pub expand_panel: String,
    pub collapse_panel: String,
    /// Any of these means the game is in a known, actionable state.
    pub known_good: Vec<String>,
    pub collapsed_markers: Vec<String>,
    pub dialogs: Vec<DialogRule>,
    pub ad_dialog: DialogRule,
    pub fight_boss: String,
    pub prestige_confirm: String,
    pub prestige_final: String,
}

impl Default for Landmarks {
    fn default() -> Self {
        Self {
            app_icon: "app_icon".into(),
            large_exit_panel: "large_exit_panel".into(),
            exit_panel: "exit_panel".into(),
            expand_panel: "expand_panel".into(),
            collapse_panel: "collapse_panel".into(),
            known_good: vec![
                "settings".into(),
                "exit_panel".into(),
                "fight_boss".into(),
                "leave_boss".into(),
            ],
            collapsed_markers: vec!["expand_panel".into()],
            dialogs: vec![
                DialogRule {
                    detect: "welcome_header".into(),
                    dismiss: vec!["welcome_collect_no_vip".into(), "welcome_collect_vip".into()],
                },
                DialogRule {
                    detect: "rate_header".into(),
                    dismiss: vec!["rate_icon".into()],
                },
            ],
            ad_dialog: DialogRule {
                detect: "ad_header".into(),
                dismiss: vec!["ad_collect".into(), "ad_no_thanks".into()],
            },
            fight_boss: "fight_boss".into(),
            prestige_confirm: "prestige_confirm".into(),
            prestige_final: "prestige_final".into(),
        }
    }
}

/// Settings that may change while a run is in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalSettings {
    pub enable_failsafe: bool,
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            enable_failsafe: true,
        }
    }
}
