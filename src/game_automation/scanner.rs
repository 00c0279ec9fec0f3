//! Scroll a list while matching each new frame on blocking workers.
//!
//! Scrolling stops when two consecutive frames hash closer than
//! `scan.duplicate_cutoff`, i.e. the list did not move.

use super::bot::Bot;
use super::error::{BotError, BotResult};
use super::match_image::{FrameHash, MatchRequest, MatchResult, MatchService};
use crate::config::ScanConfig;
use image::RgbImage;
use image::imageops::{self, FilterType};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::sleep;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub frames_captured: u32,
    pub workers_spawned: usize,
    /// Confirmed candidates, each once.
    pub found: Vec<String>,
    /// The scan ended on a repeated frame rather than the frame limit.
    pub hit_duplicate: bool,
}

type Found = Arc<Mutex<Vec<String>>>;

/// Find which of `candidates` appear anywhere in the scrolled list and mark
/// them as owned.
pub async fn scan_owned_items(bot: &Bot, candidates: &[String]) -> BotResult<ScanReport> {
    let scan = &bot.config().scan;
    let candidates: Arc<[String]> = candidates.into();
    let found: Found = Arc::default();
    let mut workers = Vec::new();
    let mut report = ScanReport::default();

    let scrolled = scroll_and_spawn(bot, scan, &candidates, &found, &mut workers, &mut report).await;

    report.workers_spawned = workers.len();
    let mut worker_error: Option<BotError> = None;
    for worker in workers {
        match worker.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                worker_error.get_or_insert(e.into());
            }
            Err(e) => {
                worker_error.get_or_insert(e.into());
            }
        }
    }
    scrolled?;
    if let Some(e) = worker_error {
        return Err(e);
    }

    report.found = found.lock().await.clone();
    log::info!(
        "🔎 scan finished: {} frames, {} workers, found {:?}",
        report.frames_captured,
        report.workers_spawned,
        report.found
    );
    bot.mark_owned(&report.found).await;
    Ok(report)
}

async fn scroll_and_spawn(
    bot: &Bot,
    scan: &ScanConfig,
    candidates: &Arc<[String]>,
    found: &Found,
    workers: &mut Vec<JoinHandle<MatchResult<()>>>,
    report: &mut ScanReport,
) -> BotResult<()> {
    let layout = bot.layout();
    let mut frame = capture(bot, scan).await?;
    report.frames_captured = 1;
    let mut previous = FrameHash::of(&frame);
    workers.push(spawn_worker(bot.matcher(), frame, candidates.clone(), found.clone(), scan.downsize));

    for _ in 0..scan.max_frames {
        bot.drag(layout.scroll_start, layout.scroll_bottom_end, Duration::ZERO)
            .await?;
        sleep(scan.settle()).await;
        frame = capture(bot, scan).await?;
        report.frames_captured += 1;

        let hash = FrameHash::of(&frame);
        let distance = hash.distance(&previous);
        if distance < scan.duplicate_cutoff {
            log::debug!("🔎 frame {} repeats the last one (distance {})", report.frames_captured, distance);
            report.hit_duplicate = true;
            return Ok(());
        }
        previous = hash;
        workers.push(spawn_worker(bot.matcher(), frame, candidates.clone(), found.clone(), scan.downsize));
    }
    log::debug!("🔎 frame limit {} reached", scan.max_frames);
    Ok(())
}

async fn capture(bot: &Bot, scan: &ScanConfig) -> BotResult<RgbImage> {
    let frame = bot.snapshot(Some(scan.region)).await?;
    if scan.downsize >= 1.0 {
        return Ok(frame);
    }
    let width = ((frame.width() as f32 * scan.downsize) as u32).max(1);
    let height = ((frame.height() as f32 * scan.downsize) as u32).max(1);
    Ok(imageops::resize(&frame, width, height, FilterType::Triangle))
}

fn spawn_worker(
    matcher: Arc<dyn MatchService>,
    frame: RgbImage,
    candidates: Arc<[String]>,
    found: Found,
    scale: f32,
) -> JoinHandle<MatchResult<()>> {
    tokio::task::spawn_blocking(move || {
        for name in candidates.iter() {
            if found.blocking_lock().contains(name) {
                continue;
            }
            let templates = [name.as_str()];
            let request = MatchRequest::new(&templates).scale(scale);
            if matcher.find(&frame, &request)?.is_some() {
                let mut found = found.blocking_lock();
                if !found.contains(name) {
                    found.push(name.clone());
                }
            }
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game_automation::testing::{Harness, ScriptedMatcher};
    use image::Rgb;

    const WHITE: Rgb<u8> = Rgb([255, 255, 255]);

    fn half_white(left: bool) -> RgbImage {
        RgbImage::from_fn(40, 40, |x, y| {
            let lit = if left { x < 20 } else { y < 20 };
            if lit { WHITE } else { Rgb([0, 0, 0]) }
        })
    }

    /// `sword` lives in the left-lit frame, `shield` in the top-lit one and
    /// `helmet` in both.
    fn inventory() -> ScriptedMatcher {
        ScriptedMatcher::when(|template, _log, frame| {
            let (w, h) = frame.dimensions();
            match template {
                "sword" => *frame.get_pixel(0, h - 1) == WHITE,
                "shield" => *frame.get_pixel(w - 1, 0) == WHITE,
                "helmet" => *frame.get_pixel(0, 0) == WHITE,
                _ => false,
            }
        })
    }

    fn names(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_on_duplicate_and_joins_workers() {
        let harness = Harness::new()
            .config(|config| config.scan.downsize = 1.0)
            .frames(vec![half_white(true), half_white(false), half_white(false)])
            .matcher(inventory());
        let bot = harness.build(vec![]);

        let report = scan_owned_items(&bot, &names(&["sword", "shield", "helmet", "crown"]))
            .await
            .expect("scan");

        assert_eq!(report.frames_captured, 3);
        assert_eq!(report.workers_spawned, 2, "No worker for the duplicate frame");
        assert!(report.hit_duplicate);
        let mut found = report.found.clone();
        found.sort();
        assert_eq!(found, names(&["helmet", "shield", "sword"]));
        assert_eq!(harness.log().drags(), 2);

        let state = bot.state().await;
        assert!(state.owned_items.contains("helmet"));
        assert_eq!(state.owned_items.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirmed_item_is_not_searched_again() {
        let harness = Harness::new()
            .config(|config| config.scan.downsize = 1.0)
            .frames(vec![half_white(true), half_white(false), half_white(false)])
            .matcher(inventory());
        let bot = harness.build(vec![]);

        scan_owned_items(&bot, &names(&["helmet", "crown"]))
            .await
            .expect("scan");

        let queries = harness.queries();
        assert_eq!(queries.iter().filter(|q| *q == "helmet").count(), 1);
        assert_eq!(queries.iter().filter(|q| *q == "crown").count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_frame_limit_bounds_the_scroll() {
        let frames = (0..10)
            .map(|i| half_white(i % 2 == 0))
            .collect::<Vec<_>>();
        let harness = Harness::new()
            .config(|config| {
                config.scan.downsize = 1.0;
                config.scan.max_frames = 3;
            })
            .frames(frames);
        let bot = harness.build(vec![]);

        let report = scan_owned_items(&bot, &names(&["crown"])).await.expect("scan");

        assert_eq!(report.frames_captured, 4);
        assert_eq!(report.workers_spawned, 4);
        assert!(!report.hit_duplicate);
        assert!(report.found.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_downsized_frames_still_hash() {
        let harness = Harness::new()
            .frames(vec![half_white(true), half_white(true)])
            .matcher(inventory());
        let bot = harness.build(vec![]);

        let report = scan_owned_items(&bot, &names(&["helmet"])).await.expect("scan");

        assert!(report.hit_duplicate);
        assert_eq!(report.workers_spawned, 1);
    }
}
