//! Background interval jobs: one task per interval-tagged capability, each
//! invoking it through the same pipeline as the control loop.

use super::bot::Bot;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Stopped,
    Running,
    Paused,
}

impl SchedulerState {
    fn as_u8(self) -> u8 {
        match self {
            SchedulerState::Stopped => 0,
            SchedulerState::Running => 1,
            SchedulerState::Paused => 2,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => SchedulerState::Running,
            2 => SchedulerState::Paused,
            _ => SchedulerState::Stopped,
        }
    }
}

/// Shared run state of the background jobs.
#[derive(Debug, Default)]
pub struct SchedulerControl {
    state: AtomicU8,
}

impl SchedulerControl {
    pub fn state(&self) -> SchedulerState {
        SchedulerState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn transition(&self, from: SchedulerState, to: SchedulerState) -> bool {
        self.state
            .compare_exchange(from.as_u8(), to.as_u8(), Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    fn start(&self) {
        self.state.store(SchedulerState::Running.as_u8(), Ordering::SeqCst);
    }

    fn stop(&self) {
        self.state.store(SchedulerState::Stopped.as_u8(), Ordering::SeqCst);
    }

    /// Returns true when this call moved a running scheduler to paused.
    pub fn pause(&self) -> bool {
        self.transition(SchedulerState::Running, SchedulerState::Paused)
    }

    pub fn resume(&self) -> bool {
        self.transition(SchedulerState::Paused, SchedulerState::Running)
    }
}

pub struct BackgroundScheduler {
    jobs: Vec<(String, JoinHandle<()>)>,
}

impl BackgroundScheduler {
    /// Spawn a job for every enabled interval-tagged capability.
    pub fn start(bot: &Bot) -> Self {
        bot.scheduler().start();
        let mut jobs = Vec::new();
        for info in bot.registry().intervals() {
            if !bot.config().is_enabled(&info.name) {
                log::debug!("⏭️ interval job {} is disabled", info.name);
                continue;
            }
            let Some(period) = bot.registry().get(&info.name).and_then(|c| c.interval) else {
                continue;
            };
            if period.is_zero() {
                log::warn!("⚠️ interval job {} has a zero period, not scheduled", info.name);
                continue;
            }
            log::info!("⏲️ scheduling {} every {:?}", info.name, period);
            let handle = tokio::spawn(run_job(bot.clone(), info.name.clone(), period));
            jobs.push((info.name, handle));
        }
        Self { jobs }
    }

    pub fn job_count(&self) -> usize {
        self.jobs.len()
    }

    /// Stop every job and wait for them to finish.
    pub async fn shutdown(self, bot: &Bot) {
        bot.scheduler().stop();
        for (name, handle) in self.jobs {
            handle.abort();
            if let Err(e) = handle.await
                && !e.is_cancelled()
            {
                log::error!("❌ interval job {} failed: {}", name, e);
            }
        }
        log::debug!("⏲️ background scheduler shut down");
    }
}

async fn run_job(bot: Bot, name: String, period: Duration) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        ticker.tick().await;
        match bot.scheduler().state() {
            SchedulerState::Stopped => break,
            SchedulerState::Paused => {
                log::debug!("⏸️ skipping {} while paused", name);
                continue;
            }
            SchedulerState::Running => {}
        }
        if let Err(e) = bot.invoke(&name, false).await {
            if e.ends_run() {
                log::info!("⏹️ interval job {} stopping: {}", name, e);
                break;
            }
            log::warn!("⚠️ interval job {} failed: {}", name, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game_automation::registry::Capability;
    use crate::game_automation::testing::{Recorder, test_bot};
    use crate::game_automation::types::Execution;

    fn ticking(recorder: &Recorder) -> Capability {
        let recorder = recorder.clone();
        Capability::new("tick", move |_bot, _force| {
            let recorder = recorder.clone();
            Box::pin(async move {
                recorder.push("tick");
                Ok(Execution::Performed)
            })
        })
        .every(Duration::from_secs(5))
        .silent()
    }

    #[test]
    fn test_control_transitions() {
        let control = SchedulerControl::default();
        assert_eq!(control.state(), SchedulerState::Stopped);
        assert!(!control.pause(), "A stopped scheduler cannot be paused");

        control.start();
        assert!(control.pause());
        assert!(!control.pause(), "Already paused");
        assert!(control.resume());
        assert_eq!(control.state(), SchedulerState::Running);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_fire_after_one_period() {
        let recorder = Recorder::default();
        let bot = test_bot(vec![ticking(&recorder)]);
        let scheduler = BackgroundScheduler::start(&bot);
        assert_eq!(scheduler.job_count(), 1);

        tokio::time::sleep(Duration::from_millis(4900)).await;
        assert_eq!(recorder.count("tick"), 0, "Nothing fires before one period");

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(recorder.count("tick"), 1);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(recorder.count("tick"), 3);

        scheduler.shutdown(&bot).await;
        assert_eq!(bot.scheduler().state(), SchedulerState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_paused_scheduler_skips_firings() {
        let recorder = Recorder::default();
        let bot = test_bot(vec![ticking(&recorder)]);
        let scheduler = BackgroundScheduler::start(&bot);

        assert!(bot.scheduler().pause());
        tokio::time::sleep(Duration::from_secs(12)).await;
        assert_eq!(recorder.count("tick"), 0);

        assert!(bot.scheduler().resume());
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(recorder.count("tick"), 1, "Firings resume at the next period");

        scheduler.shutdown(&bot).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_job_stops_on_run_ending_error() {
        let recorder = Recorder::default();
        let bot = test_bot(vec![ticking(&recorder)]);
        let scheduler = BackgroundScheduler::start(&bot);

        bot.stop_run();
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(recorder.count("tick"), 0, "Terminated runs never reach the body");
        assert!(
            scheduler.jobs.iter().all(|(_, handle)| handle.is_finished()),
            "Job exits after ManualTermination"
        );

        scheduler.shutdown(&bot).await;
    }
}
