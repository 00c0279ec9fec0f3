//! Key combos that queue capability commands.

use super::queue::{Command, CommandQueue, DurationUnit};
use super::registry::CapabilityRegistry;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

pub struct ShortcutHandler {
    queue: Arc<dyn CommandQueue>,
    combos: HashMap<String, String>,
    pressed: Vec<String>,
    cooldown: Duration,
    last_fired: Option<Instant>,
    hooked: bool,
}

impl ShortcutHandler {
    /// Combos come from every registered capability with a shortcut.
    pub fn new(registry: &CapabilityRegistry, queue: Arc<dyn CommandQueue>, cooldown: Duration) -> Self {
        let combos = registry
            .shortcuts()
            .into_iter()
            .filter_map(|info| Some((normalize(&info.shortcut?), info.name)))
            .collect();
        Self {
            queue,
            combos,
            pressed: Vec::new(),
            cooldown,
            last_fired: None,
            hooked: true,
        }
    }

    pub fn combos(&self) -> &HashMap<String, String> {
        &self.combos
    }

    pub fn is_hooked(&self) -> bool {
        self.hooked
    }

    /// Track `key` and queue a command when the held keys, in press order,
    /// form a known combo.
    pub async fn on_press(&mut self, key: &str) -> Option<Command> {
        if !self.hooked {
            return None;
        }
        let key = key.trim().to_lowercase();
        if !self.pressed.contains(&key) {
            self.pressed.push(key);
        }
        let combo = self.pressed.join("+");
        self.fire(&combo).await
    }

    pub fn on_release(&mut self, key: &str) {
        let key = key.trim().to_lowercase();
        self.pressed.retain(|k| *k != key);
    }

    /// Press every key of `combo` in order, then release them all.
    pub async fn trigger(&mut self, combo: &str) -> Option<Command> {
        let keys: Vec<&str> = combo.split('+').filter(|k| !k.trim().is_empty()).collect();
        let mut command = None;
        for key in &keys {
            if let Some(queued) = self.on_press(key).await {
                command = Some(queued);
            }
        }
        for key in &keys {
            self.on_release(key);
        }
        command
    }

    pub fn unhook(&mut self) {
        if self.hooked {
            log::debug!("⌨️ shortcuts unhooked");
        }
        self.hooked = false;
        self.pressed.clear();
    }

    async fn fire(&mut self, combo: &str) -> Option<Command> {
        let capability = self.combos.get(combo)?.clone();
        let now = Instant::now();
        if let Some(last) = self.last_fired
            && now.duration_since(last) < self.cooldown
        {
            log::debug!("⌨️ {} ignored, shortcut cooldown active", combo);
            return None;
        }
        self.last_fired = Some(now);
        log::info!("⌨️ {} -> {}", combo, capability);
        Some(self.queue.push(&capability, 0, DurationUnit::Seconds).await)
    }
}

fn normalize(combo: &str) -> String {
    combo
        .split('+')
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect::<Vec<_>>()
        .join("+")
}
