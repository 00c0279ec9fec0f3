//! The built-in capability table.

use super::bot::Bot;
use super::error::BotError;
use super::match_image::{MatchError, TextMode};
use super::navigator::{self, PanelTarget, with_panel};
use super::registry::{Capability, CapabilityFuture, CapabilityRegistry, RegistryError};
use super::scanner;
use super::transition;
use super::types::{AutomationEvent, EquipmentTab, Execution, Panel};
use crate::adb::ClickSpec;
use std::time::Duration;

const STAGE_INTERVAL: Duration = Duration::from_secs(5);
const TAP_INTERVAL: Duration = Duration::from_millis(100);
const CONFIRM_PAUSE: Duration = Duration::from_secs(1);
const PRESTIGE_SETTLE: Duration = Duration::from_secs(10);

pub fn builtin_capabilities() -> Vec<Capability> {
    let mut capabilities = vec![
        Capability::new("pause", pause)
            .queueable()
            .shortcut("p")
            .silent()
            .tooltip("Pause the bot and its background jobs."),
        Capability::new("resume", resume)
            .queueable()
            .shortcut("r")
            .silent()
            .tooltip("Resume a paused bot."),
        Capability::new("terminate", terminate)
            .queueable()
            .shortcut("e")
            .silent()
            .tooltip("Stop the bot after the current action."),
        Capability::new("fight_boss", fight_boss)
            .queueable()
            .transition()
            .shortcut("shift+f")
            .tooltip("Start the boss fight when the button is showing."),
        Capability::new("fairy_tap", fairy_tap)
            .timed()
            .transition()
            .tooltip("Tap where fairies fly by and collect their rewards."),
        Capability::new("level_master", level_master)
            .timed()
            .transition()
            .shortcut("shift+m")
            .tooltip("Level the sword master."),
        Capability::new("level_heroes", level_heroes)
            .timed()
            .transition()
            .shortcut("shift+h")
            .tooltip("Level the visible heroes."),
        Capability::new("prestige", prestige)
            .timed()
            .transition()
            .exclusive()
            .shortcut("shift+p")
            .tooltip("Prestige and start a new cycle."),
        Capability::new("scan_inventory", scan_inventory)
            .queueable()
            .transition()
            .shortcut("shift+i")
            .tooltip("Scroll the equipment list and record owned items."),
        Capability::new("update_stage", update_stage)
            .every(STAGE_INTERVAL)
            .silent(),
        Capability::new("collect_ad", collect_ad)
            .queueable()
            .tooltip("Collect a pending ad reward."),
        Capability::new("ensure_collapsed", ensure_collapsed)
            .queueable()
            .tooltip("Collapse or close any open panel."),
    ];

    for target in ["fairy_tap", "level_master", "level_heroes", "prestige"] {
        capabilities.push(Capability::recompute_for(target));
    }

    for panel in Panel::ALL {
        capabilities.push(
            Capability::new(format!("goto_{}", panel.key()), move |bot, _force| {
                Box::pin(async move {
                    let result = navigator::navigate(bot, &PanelTarget::new(panel)).await?;
                    Ok(if result.is_reached() {
                        Execution::Performed
                    } else {
                        Execution::Skipped
                    })
                })
            })
            .queueable()
            .tooltip(format!("Open the {} panel.", panel.key())),
        );
    }

    capabilities
}

pub fn default_registry() -> Result<CapabilityRegistry, RegistryError> {
    CapabilityRegistry::build(builtin_capabilities())
}

fn pause(bot: &Bot, _force: bool) -> CapabilityFuture<'_> {
    Box::pin(async move {
        bot.pause_run();
        Ok(Execution::Performed)
    })
}

fn resume(bot: &Bot, _force: bool) -> CapabilityFuture<'_> {
    Box::pin(async move {
        bot.resume_run();
        Ok(Execution::Performed)
    })
}

fn terminate(bot: &Bot, _force: bool) -> CapabilityFuture<'_> {
    Box::pin(async move {
        bot.stop_run();
        Ok(Execution::Performed)
    })
}

fn fight_boss(bot: &Bot, _force: bool) -> CapabilityFuture<'_> {
    Box::pin(async move {
        let landmark = &bot.layout().landmarks.fight_boss;
        if bot.find_and_click(landmark, CONFIRM_PAUSE).await? {
            log::info!("⚔️ boss fight started");
            Ok(Execution::Performed)
        } else {
            Ok(Execution::Skipped)
        }
    })
}

fn fairy_tap(bot: &Bot, _force: bool) -> CapabilityFuture<'_> {
    Box::pin(async move {
        let clicks = bot.config().actions.fairy_tap_clicks;
        for point in &bot.layout().fairy_points {
            bot.click(
                *point,
                ClickSpec::times(clicks).interval(TAP_INTERVAL),
                Duration::ZERO,
            )
            .await?;
        }
        if transition::dismiss(bot, &bot.layout().landmarks.ad_dialog).await? {
            log::info!("🧚 fairy reward collected");
        }
        Ok(Execution::Performed)
    })
}

fn level_master(bot: &Bot, _force: bool) -> CapabilityFuture<'_> {
    Box::pin(async move {
        let target = PanelTarget::new(Panel::Master).expanded();
        let levelled = with_panel(bot, &target, |bot| async move {
            let actions = &bot.config().actions;
            bot.click(
                bot.layout().master_level,
                ClickSpec::times(actions.master_level_clicks)
                    .interval(TAP_INTERVAL)
                    .jitter(actions.click_jitter),
                Duration::ZERO,
            )
            .await?;
            bot.state().await.master_levelled_this_prestige = true;
            Ok(())
        })
        .await?;
        Ok(performed_if(levelled.is_some()))
    })
}

fn level_heroes(bot: &Bot, _force: bool) -> CapabilityFuture<'_> {
    Box::pin(async move {
        let target = PanelTarget::new(Panel::Heroes).expanded();
        let levelled = with_panel(bot, &target, |bot| async move {
            let actions = &bot.config().actions;
            for point in &bot.layout().hero_levels {
                bot.click(
                    *point,
                    ClickSpec::times(actions.hero_level_clicks)
                        .interval(TAP_INTERVAL)
                        .jitter(actions.click_jitter),
                    Duration::ZERO,
                )
                .await?;
            }
            Ok(())
        })
        .await?;
        Ok(performed_if(levelled.is_some()))
    })
}

fn prestige(bot: &Bot, _force: bool) -> CapabilityFuture<'_> {
    Box::pin(async move {
        let target = PanelTarget::new(Panel::Master).expanded().bottom();
        let confirmed = with_panel(bot, &target, |bot| async move {
            let layout = bot.layout();
            bot.click(layout.prestige, ClickSpec::times(1), CONFIRM_PAUSE)
                .await?;
            if !bot
                .find_and_click(&layout.landmarks.prestige_confirm, CONFIRM_PAUSE)
                .await?
            {
                log::warn!("⚠️ prestige confirmation did not show");
                return Ok(false);
            }
            Ok(bot
                .find_and_click(&layout.landmarks.prestige_final, PRESTIGE_SETTLE)
                .await?)
        })
        .await?;

        if confirmed != Some(true) {
            return Ok(Execution::Skipped);
        }
        bot.state().await.reset_prestige_cycle();
        log::info!("🌟 prestige complete");
        Ok(Execution::Performed)
    })
}

fn scan_inventory(bot: &Bot, _force: bool) -> CapabilityFuture<'_> {
    Box::pin(async move {
        let items = &bot.config().inventory.items;
        if items.is_empty() {
            log::debug!("no inventory items configured, nothing to scan");
            return Ok(Execution::Skipped);
        }
        let target = PanelTarget::new(Panel::Equipment)
            .expanded()
            .tab(EquipmentTab::Sword);
        let report = with_panel(bot, &target, |bot| async move {
            scanner::scan_owned_items(&bot, items).await
        })
        .await?;
        let Some(report) = report else {
            return Ok(Execution::Skipped);
        };
        if let Some(next) = &bot.state().await.next_item_to_upgrade {
            log::info!("⬆️ next item to upgrade: {} ({} owned)", next, report.found.len());
        }
        Ok(Execution::Performed)
    })
}

fn update_stage(bot: &Bot, _force: bool) -> CapabilityFuture<'_> {
    Box::pin(async move {
        let text = match bot.read_text(bot.layout().stage_region, TextMode::Digits).await {
            Ok(text) => text,
            Err(BotError::Match(MatchError::TextRecognitionUnavailable)) => {
                log::debug!("text recognition unavailable, stage not read");
                return Ok(Execution::Skipped);
            }
            Err(e) => return Err(e),
        };
        let Some(stage) = parse_stage(&text) else {
            log::debug!("could not read a stage from {:?}", text);
            return Ok(Execution::Skipped);
        };
        let mut state = bot.state().await;
        if state.stage != Some(stage) {
            state.stage = Some(stage);
            drop(state);
            bot.publish(AutomationEvent::StageUpdated(stage));
        }
        Ok(Execution::Performed)
    })
}

fn collect_ad(bot: &Bot, _force: bool) -> CapabilityFuture<'_> {
    Box::pin(async move {
        let collected = transition::dismiss(bot, &bot.layout().landmarks.ad_dialog).await?;
        Ok(performed_if(collected))
    })
}

fn ensure_collapsed(bot: &Bot, _force: bool) -> CapabilityFuture<'_> {
    Box::pin(async move {
        let safe = navigator::ensure_collapsed(bot).await?;
        Ok(performed_if(safe))
    })
}

fn performed_if(done: bool) -> Execution {
    if done {
        Execution::Performed
    } else {
        Execution::Skipped
    }
}

/// Digits only, so OCR noise like `Stage 1,234` still reads as 1234.
fn parse_stage(text: &str) -> Option<u64> {
    let digits: String = text.chars().filter(char::is_ascii_digit).collect();
    digits.parse().ok().filter(|stage| *stage > 0)
}
