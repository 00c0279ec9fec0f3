//! Bring the game back to a known, actionable screen.

use super::bot::Bot;
use super::error::{BotError, BotResult};
use crate::adb::ClickSpec;
use crate::config::DialogRule;
use std::iter;
use std::time::Duration;
use tokio::time::sleep;

const APP_RESTART_WAIT: Duration = Duration::from_secs(5);
const NEUTRAL_CLICKS: u32 = 3;
const NEUTRAL_CLICK_INTERVAL: Duration = Duration::from_millis(500);
const RETRY_WAIT: Duration = Duration::from_secs(1);

/// Loop until a known-good landmark is visible, recovering from the app
/// being closed, blocking dialogs and oversized panels on the way.
pub async fn resolve(bot: &Bot, max_loops: u32) -> BotResult<()> {
    let layout = bot.layout();
    let landmarks = &layout.landmarks;

    for attempt in 1..=max_loops {
        if bot.find_and_click(&landmarks.app_icon, APP_RESTART_WAIT).await? {
            log::info!("📱 game was closed, reopened it");
        }

        dismiss_dialogs(bot).await?;

        if bot
            .find_and_click(&landmarks.large_exit_panel, RETRY_WAIT)
            .await?
        {
            log::debug!("closed an oversized panel");
        }

        if let Some(hit) = bot.search(&landmarks.known_good).await? {
            if attempt > 1 {
                log::debug!("✅ transition resolved on attempt {} ({})", attempt, hit.template);
            }
            return Ok(());
        }

        log::debug!("🔄 transition attempt {}/{} found no known screen", attempt, max_loops);
        bot.click(
            layout.neutral_top,
            ClickSpec::times(NEUTRAL_CLICKS).interval(NEUTRAL_CLICK_INTERVAL),
            Duration::ZERO,
        )
        .await?;
        sleep(RETRY_WAIT).await;
    }

    Err(BotError::UnresolvedTransition { attempts: max_loops })
}

/// Dismiss every configured dialog that is currently showing.
pub async fn dismiss_dialogs(bot: &Bot) -> BotResult<usize> {
    let landmarks = &bot.layout().landmarks;
    let mut dismissed = 0;
    for rule in landmarks.dialogs.iter().chain(iter::once(&landmarks.ad_dialog)) {
        if dismiss(bot, rule).await? {
            dismissed += 1;
        }
    }
    Ok(dismissed)
}

/// Click the first visible dismiss landmark when `rule.detect` is showing.
pub async fn dismiss(bot: &Bot, rule: &DialogRule) -> BotResult<bool> {
    if !bot.is_visible(&rule.detect).await? {
        return Ok(false);
    }
    match bot.search(&rule.dismiss).await? {
        Some(hit) => {
            log::info!("💬 dismissing {} via {}", rule.detect, hit.template);
            bot.click(hit.center(), ClickSpec::times(1), RETRY_WAIT).await?;
            Ok(true)
        }
        None => {
            log::warn!("⚠️ {} is showing but none of {:?} is visible", rule.detect, rule.dismiss);
            Ok(false)
        }
    }
}
