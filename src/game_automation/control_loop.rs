//! The main control loop: drain queued commands, then visit the enabled
//! periodic capabilities in order, forever, until a run-ending error.

use super::bot::Bot;
use super::error::BotResult;
use super::queue::CommandQueue;
use super::registry::CapabilityRegistry;
use super::scheduler::BackgroundScheduler;
use super::session::{SessionOutcome, SessionRecord};
use super::shortcuts::ShortcutHandler;
use super::types::{AutomationEvent, BotState};
use crate::config::BotConfig;
use rand::Rng;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep};

const PAUSED_POLL: Duration = Duration::from_millis(100);
const IDLE_MIN_WAIT: Duration = Duration::from_secs(1);

/// Enabled periodic capabilities in configured order. Unknown names are
/// skipped with a warning.
pub fn loop_slots(registry: &CapabilityRegistry, config: &BotConfig) -> Vec<String> {
    config
        .loop_order
        .iter()
        .filter(|name| {
            if registry.get(name).is_none() {
                log::warn!("⚠️ loop capability '{}' is not registered, skipping it", name);
                return false;
            }
            config.is_enabled(name)
        })
        .cloned()
        .collect()
}

pub struct BotRunner {
    bot: Bot,
    queue: Arc<dyn CommandQueue>,
    shortcuts: Option<Arc<Mutex<ShortcutHandler>>>,
}

impl BotRunner {
    pub fn new(bot: Bot, queue: Arc<dyn CommandQueue>) -> Self {
        Self {
            bot,
            queue,
            shortcuts: None,
        }
    }

    pub fn shortcuts(mut self, handler: Arc<Mutex<ShortcutHandler>>) -> Self {
        self.shortcuts = Some(handler);
        self
    }

    /// Run until a run-ending error, then clean up and report the session.
    pub async fn run(self) -> SessionRecord {
        let mut record = SessionRecord::start();
        self.bot.publish(AutomationEvent::StateChanged(BotState::Running));

        let mut scheduler = None;
        let error = match self.drive(&mut scheduler).await {
            Ok(never) => match never {},
            Err(e) => e,
        };

        let outcome = SessionOutcome::from_error(&error);
        outcome.log(&error);

        if let Some(scheduler) = scheduler {
            scheduler.shutdown(&self.bot).await;
        }
        if let Some(shortcuts) = &self.shortcuts {
            shortcuts.lock().await.unhook();
        }
        let usage = self.bot.state().await.usage.clone();
        record.end(outcome.clone(), usage);
        self.bot.publish(AutomationEvent::SessionEnded(outcome));
        self.bot.publish(AutomationEvent::StateChanged(BotState::Stopped));
        record
    }

    async fn drive(&self, scheduler: &mut Option<BackgroundScheduler>) -> BotResult<Infallible> {
        let bot = &self.bot;
        let slots = loop_slots(bot.registry(), bot.config());
        log::info!("🔁 loop order: {:?}", slots);
        bot.seed_timers().await;
        *scheduler = Some(BackgroundScheduler::start(bot));

        self.pre_run().await?;

        let mut last_heartbeat = None;
        loop {
            if slots.is_empty() {
                self.slot(None, &mut last_heartbeat).await?;
                continue;
            }
            for name in &slots {
                self.slot(Some(name.as_str()), &mut last_heartbeat).await?;
            }
        }
    }

    async fn pre_run(&self) -> BotResult<()> {
        for name in &self.bot.config().on_start {
            if self.bot.registry().get(name).is_none() {
                log::warn!("⚠️ on-start capability '{}' is not registered", name);
                continue;
            }
            log::info!("🚀 running {} before the loop", name);
            self.bot.invoke(name, true).await?;
        }
        Ok(())
    }

    async fn slot(&self, name: Option<&str>, last_heartbeat: &mut Option<Instant>) -> BotResult<()> {
        let bot = &self.bot;
        bot.check_liveness()?;
        self.drain_commands().await?;
        bot.check_terminate()?;

        if bot.flags().is_paused() {
            bot.failsafe_check().await?;
            let heartbeat = bot.config().heartbeat();
            if last_heartbeat.is_none_or(|at| at.elapsed() >= heartbeat) {
                log::info!("⏸️ bot is paused");
                bot.publish(AutomationEvent::Heartbeat);
                *last_heartbeat = Some(Instant::now());
            }
            sleep(PAUSED_POLL).await;
            return Ok(());
        }

        match name {
            Some(name) => {
                bot.invoke(name, false).await?;
                self.post_action_delay().await;
            }
            None => sleep(self.post_action_wait().max(IDLE_MIN_WAIT)).await,
        }
        Ok(())
    }

    /// Run every pending command once. Commands are deleted before they run
    /// so a failing command is never retried.
    async fn drain_commands(&self) -> BotResult<()> {
        let bot = &self.bot;
        for command in self.queue.pending().await {
            if bot.flags().is_paused() && command.capability != "resume" {
                break;
            }
            self.queue.remove(command.id).await;

            let Some(capability) = bot
                .registry()
                .get(&command.capability)
                .filter(|c| c.queueable || c.forceable)
            else {
                log::warn!("⚠️ dropping command for unknown capability '{}'", command.capability);
                continue;
            };
            let force = capability.forceable;
            log::info!("📤 running queued {} (#{})", command.capability, command.id);
            bot.invoke(&command.capability, force).await?;
            self.post_action_delay().await;
        }
        Ok(())
    }

    fn post_action_wait(&self) -> Duration {
        let config = self.bot.config();
        let seconds = rand::thread_rng().gen_range(config.post_action_min_wait..=config.post_action_max_wait);
        Duration::from_secs(seconds)
    }

    async fn post_action_delay(&self) {
        let wait = self.post_action_wait();
        if !wait.is_zero() {
            sleep(wait).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game_automation::channels::{EventSink, create_automation_channels};
    use crate::game_automation::queue::{DurationUnit, MemoryQueue};
    use crate::game_automation::registry::Capability;
    use crate::game_automation::testing::{Harness, Recorder};
    use crate::game_automation::types::Execution;

    /// Records `name@<seconds since start>` every time its body runs.
    fn stamped(name: &str, recorder: &Recorder, start: Instant) -> Capability {
        let recorder = recorder.clone();
        let label = name.to_string();
        Capability::new(name, move |_bot, _force| {
            let recorder = recorder.clone();
            let label = label.clone();
            Box::pin(async move {
                recorder.push(format!("{label}@{}", start.elapsed().as_secs()));
                Ok(Execution::Performed)
            })
        })
    }

    fn stop_at(seconds: u64) -> Capability {
        Capability::new("stop", move |bot, _force| {
            Box::pin(async move {
                sleep(Duration::from_secs(seconds)).await;
                bot.stop_run();
                Ok(Execution::Performed)
            })
        })
        .every(Duration::from_secs(1))
        .silent()
    }

    /// Background job that queues a command for an unregistered capability
    /// on its first firing, 30s in.
    fn queue_unknown_once(queue: &Arc<MemoryQueue>, queued: &Recorder, start: Instant) -> Capability {
        let queue = queue.clone();
        let queued = queued.clone();
        Capability::new("queue_unknown", move |_bot, _force| {
            let queue = queue.clone();
            let queued = queued.clone();
            Box::pin(async move {
                if queued.entries().is_empty() {
                    queue.push("c", 0, DurationUnit::Seconds).await;
                    queued.push(format!("c@{}", start.elapsed().as_secs()));
                }
                Ok(Execution::Performed)
            })
        })
        .every(Duration::from_secs(30))
        .silent()
    }

    fn harness(loop_order: &[&str]) -> Harness {
        let order: Vec<String> = loop_order.iter().map(|s| s.to_string()).collect();
        Harness::new().config(move |config| {
            config.loop_order = order;
            config.post_action_min_wait = 1;
            config.post_action_max_wait = 1;
            config.intervals = [("a".to_string(), 60), ("b".to_string(), 120)].into();
            config.enabled.clear();
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_timers_gate_periodic_capabilities() {
        let start = Instant::now();
        let recorder = Recorder::default();
        let queued = Recorder::default();
        let queue = Arc::new(MemoryQueue::new(EventSink::detached()));
        let bot = harness(&["a", "b"]).build(vec![
            stamped("a", &recorder, start).timed(),
            Capability::recompute_for("a"),
            stamped("b", &recorder, start).timed(),
            Capability::recompute_for("b"),
            stop_at(99),
            queue_unknown_once(&queue, &queued, start),
        ]);

        let record = BotRunner::new(bot.clone(), queue.clone()).run().await;

        assert_eq!(record.outcome, Some(SessionOutcome::ManualTermination));
        assert_eq!(queued.entries(), vec!["c@30"]);
        assert_eq!(queue.len().await, 0, "Unknown command dropped");
        assert_eq!(recorder.entries(), vec!["a@0", "b@1", "a@60"]);
        assert_eq!(record.usage.get("a"), Some(&2));
        assert_eq!(record.usage.get("b"), Some(&1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_command_is_dropped_once() {
        let recorder = Recorder::default();
        let bot = harness(&[]).build(vec![
            stamped("a", &recorder, Instant::now()).queueable(),
            Capability::new("terminate", |bot, _force| {
                Box::pin(async move {
                    bot.stop_run();
                    Ok(Execution::Performed)
                })
            })
            .queueable(),
        ]);
        let queue = Arc::new(MemoryQueue::new(EventSink::detached()));
        queue.push("missing", 0, DurationUnit::Seconds).await;
        queue.push("a", 0, DurationUnit::Seconds).await;
        queue.push("terminate", 0, DurationUnit::Seconds).await;

        let record = BotRunner::new(bot, queue.clone()).run().await;

        assert_eq!(record.outcome, Some(SessionOutcome::ManualTermination));
        assert_eq!(recorder.entries(), vec!["a@0"]);
        assert_eq!(queue.len().await, 0, "Every command is consumed once");
    }

    #[tokio::test(start_paused = true)]
    async fn test_paused_loop_only_accepts_resume() {
        let recorder = Recorder::default();
        let start = Instant::now();
        let control = |name: &'static str| {
            Capability::new(name, move |bot, _force| {
                Box::pin(async move {
                    match name {
                        "pause" => bot.pause_run(),
                        "resume" => bot.resume_run(),
                        _ => bot.stop_run(),
                    }
                    Ok(Execution::Performed)
                })
            })
            .queueable()
        };
        let bot = harness(&[]).build(vec![
            control("pause"),
            control("resume"),
            control("terminate"),
            stamped("a", &recorder, start).queueable(),
        ]);
        let queue = Arc::new(MemoryQueue::new(EventSink::detached()));
        queue.push("pause", 0, DurationUnit::Seconds).await;
        queue.push("a", 0, DurationUnit::Seconds).await;
        queue.push("resume", 0, DurationUnit::Seconds).await;

        let runner = tokio::spawn(BotRunner::new(bot.clone(), queue.clone()).run());
        sleep(Duration::from_secs(5)).await;

        assert!(bot.flags().is_paused());
        assert!(recorder.entries().is_empty(), "Nothing runs while paused");
        assert_eq!(queue.len().await, 2, "Queue stops at the first non-resume command");

        // Resume is accepted while paused once it reaches the head of the queue.
        let pending = queue.pending().await;
        queue.remove(pending[0].id).await;
        sleep(Duration::from_secs(1)).await;
        assert!(!bot.flags().is_paused());

        queue.push("a", 0, DurationUnit::Seconds).await;
        queue.push("terminate", 0, DurationUnit::Seconds).await;
        let record = runner.await.expect("runner");

        assert_eq!(record.outcome, Some(SessionOutcome::ManualTermination));
        assert_eq!(recorder.entries().len(), 1, "The queued command runs once after resume");
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_publishes_session_end() {
        let (events, mut rx) = create_automation_channels();
        let harness = harness(&[]).config(|config| config.on_start = vec!["terminate".into()]);
        let bot = harness.build_with(
            vec![
                Capability::new("terminate", |bot, _force| {
                    Box::pin(async move {
                        bot.stop_run();
                        Ok(Execution::Performed)
                    })
                })
                .queueable(),
            ],
            |builder| builder.events(events),
        );
        let queue = Arc::new(MemoryQueue::new(EventSink::detached()));

        let record = BotRunner::new(bot, queue).run().await;
        assert_eq!(record.outcome, Some(SessionOutcome::ManualTermination));

        let mut seen = Vec::new();
        while let Ok(event) = rx.try_recv() {
            seen.push(event);
        }
        assert!(matches!(
            seen.as_slice(),
            [.., AutomationEvent::SessionEnded(SessionOutcome::ManualTermination), AutomationEvent::StateChanged(BotState::Stopped)]
        ));
    }

    #[test]
    fn test_loop_slots_skip_unknown_and_disabled() {
        let noop = |name: &str| Capability::new(name, |_bot, _force| Box::pin(async { Ok(Execution::Skipped) }));
        let registry = CapabilityRegistry::build([noop("a"), noop("b"), noop("c")]).expect("registry");
        let mut config = BotConfig::default();
        config.loop_order = vec!["a".into(), "ghost".into(), "b".into(), "c".into()];
        config.enabled = [("b".to_string(), false)].into();

        assert_eq!(loop_slots(&registry, &config), vec!["a", "c"]);
    }
}
