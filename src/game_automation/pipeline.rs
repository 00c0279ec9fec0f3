//! The one path every capability invocation takes, from the control loop,
//! queued commands and background jobs alike.

use super::bot::Bot;
use super::error::BotError;
use super::registry::CapabilityFuture;
use super::scheduler::SchedulerControl;
use super::transition;
use super::types::Execution;

/// Resumes the scheduler when an exclusive body ends, however it ends.
struct SchedulerPause<'a> {
    control: &'a SchedulerControl,
    paused: bool,
}

impl<'a> SchedulerPause<'a> {
    fn acquire(control: &'a SchedulerControl) -> Self {
        let paused = control.pause();
        if paused {
            log::debug!("⏸️ background jobs paused for exclusive capability");
        }
        Self { control, paused }
    }
}

impl Drop for SchedulerPause<'_> {
    fn drop(&mut self) {
        if self.paused {
            self.control.resume();
        }
    }
}

impl Bot {
    /// Run `name` through liveness, failsafe and termination checks, the
    /// timer gate, the optional transition pre-check, the body, the paired
    /// timer recompute and usage accounting.
    pub fn invoke<'a>(&'a self, name: &'a str, force: bool) -> CapabilityFuture<'a> {
        Box::pin(async move {
            let capability = self
                .registry()
                .get(name)
                .ok_or_else(|| BotError::UnknownCapability(name.to_string()))?;

            self.check_liveness()?;
            self.failsafe_check().await?;
            self.check_terminate()?;

            if capability.forceable
                && capability.calculate_ref.is_some()
                && !self.is_due(name, force).await
            {
                log::trace!("{} is not due yet", name);
                return Ok(Execution::Skipped);
            }

            if capability.update_status {
                self.set_activity(name).await;
            }
            if capability.requires_transition_check {
                transition::resolve(self, self.config().transition_max_loops).await?;
            }

            let handler = capability.handler().clone();
            let execution = {
                let _pause = capability
                    .exclusive
                    .then(|| SchedulerPause::acquire(self.scheduler()));
                log::debug!("▶️ {} (force={})", name, force);
                handler(self, force).await?
            };

            // A forced run always moves the timer; a due run only when it did work.
            if (force || execution == Execution::Performed)
                && capability.forceable
                && let Some(calculate) = &capability.calculate_ref
            {
                self.invoke(calculate, true).await?;
            }

            self.record_usage(name).await;
            Ok(execution)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game_automation::registry::Capability;
    use crate::game_automation::safety::FailsafeProbe;
    use crate::game_automation::scheduler::{BackgroundScheduler, SchedulerState};
    use crate::game_automation::testing::{Harness, Recorder, test_bot};
    use std::sync::Arc;
    use std::time::Duration;

    fn recording(name: &str, recorder: &Recorder, outcome: Execution) -> Capability {
        let recorder = recorder.clone();
        let label = name.to_string();
        Capability::new(name, move |_bot, force| {
            let recorder = recorder.clone();
            let label = label.clone();
            Box::pin(async move {
                recorder.push(format!("{label}:force={force}"));
                Ok(outcome)
            })
        })
    }

    fn recompute(target: &str, recorder: &Recorder) -> Capability {
        let recorder = recorder.clone();
        let target = target.to_string();
        Capability::new(format!("calculate_next_{target}"), move |_bot, _force| {
            let recorder = recorder.clone();
            let target = target.clone();
            Box::pin(async move {
                recorder.push(format!("calculate_next_{target}"));
                Ok(Execution::Performed)
            })
        })
        .queueable()
        .silent()
    }

    #[tokio::test]
    async fn test_body_then_recompute_then_usage() {
        let recorder = Recorder::default();
        let bot = test_bot(vec![
            recording("level_master", &recorder, Execution::Performed).timed(),
            recompute("level_master", &recorder),
        ]);

        let execution = bot.invoke("level_master", false).await.expect("invoke");

        assert_eq!(execution, Execution::Performed);
        assert_eq!(
            recorder.entries(),
            vec!["level_master:force=false", "calculate_next_level_master"]
        );
        let state = bot.state().await;
        assert_eq!(state.usage.get("level_master"), Some(&1));
        assert_eq!(state.current_activity.as_deref(), Some("level_master"));
    }

    #[tokio::test]
    async fn test_skipped_body_does_not_recompute() {
        let recorder = Recorder::default();
        let bot = test_bot(vec![
            recording("level_master", &recorder, Execution::Skipped).timed(),
            recompute("level_master", &recorder),
        ]);

        bot.invoke("level_master", false).await.expect("invoke");

        assert_eq!(recorder.entries(), vec!["level_master:force=false"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_forced_skipped_body_still_moves_the_timer() {
        let recorder = Recorder::default();
        let bot = test_bot(vec![
            recording("level_master", &recorder, Execution::Skipped).timed(),
            Capability::recompute_for("level_master"),
        ]);
        bot.seed_timers().await;
        let seeded = bot.state().await.next_execution["level_master"];

        let execution = bot.invoke("level_master", true).await.expect("invoke");

        assert_eq!(execution, Execution::Skipped);
        let next = bot.state().await.next_execution["level_master"];
        assert!(next > seeded, "Timer pushed out after a forced run");
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_gate_unless_forced() {
        let recorder = Recorder::default();
        let bot = test_bot(vec![
            recording("level_master", &recorder, Execution::Performed).timed(),
            Capability::recompute_for("level_master"),
        ]);
        bot.seed_timers().await;

        bot.invoke("level_master", false).await.expect("due at start");
        let skipped = bot.invoke("level_master", false).await.expect("not due");
        assert_eq!(skipped, Execution::Skipped);

        bot.invoke("level_master", true).await.expect("forced");
        assert_eq!(
            recorder.entries(),
            vec!["level_master:force=false", "level_master:force=true"]
        );
        assert_eq!(bot.state().await.usage.get("level_master"), Some(&2));
    }

    #[tokio::test]
    async fn test_checks_run_before_the_body() {
        let recorder = Recorder::default();
        let bot = test_bot(vec![recording("fairy_tap", &recorder, Execution::Performed)]);

        bot.stop_run();
        let result = bot.invoke("fairy_tap", false).await;
        assert!(matches!(result, Err(BotError::ManualTermination)));

        bot.app().shutdown();
        let result = bot.invoke("fairy_tap", false).await;
        assert!(
            matches!(result, Err(BotError::ServerTerminated)),
            "Liveness is checked before termination"
        );
        assert!(recorder.entries().is_empty());
        assert!(bot.state().await.usage.is_empty());
    }

    struct Tripped;

    impl FailsafeProbe for Tripped {
        fn is_triggered(&self) -> bool {
            true
        }
    }

    #[tokio::test]
    async fn test_failsafe_blocks_the_body() {
        let recorder = Recorder::default();
        let bot = Harness::new().build_with(
            vec![recording("fairy_tap", &recorder, Execution::Performed)],
            |builder| builder.failsafe(Arc::new(Tripped)),
        );

        let result = bot.invoke("fairy_tap", false).await;

        assert!(matches!(result, Err(BotError::FailsafeTriggered)));
        assert!(recorder.entries().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_capability() {
        let bot = test_bot(vec![]);
        let result = bot.invoke("missing", true).await;
        assert!(matches!(result, Err(BotError::UnknownCapability(name)) if name == "missing"));
    }

    #[tokio::test]
    async fn test_body_error_skips_recompute_and_usage() {
        let recorder = Recorder::default();
        let bot = test_bot(vec![
            Capability::new("prestige", |_bot, _force| {
                Box::pin(async { Err(BotError::UnresolvedTransition { attempts: 1 }) })
            })
            .timed(),
            recompute("prestige", &recorder),
        ]);

        let result = bot.invoke("prestige", true).await;

        assert!(matches!(result, Err(BotError::UnresolvedTransition { .. })));
        assert!(recorder.entries().is_empty());
        assert!(bot.state().await.usage.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_exclusive_pauses_background_jobs() {
        let bot = test_bot(vec![
            Capability::new("prestige", |bot, _force| {
                Box::pin(async move {
                    assert_eq!(bot.scheduler().state(), SchedulerState::Paused);
                    Ok(Execution::Performed)
                })
            })
            .exclusive(),
            Capability::new("stage", |_bot, _force| Box::pin(async { Ok(Execution::Skipped) }))
                .every(Duration::from_secs(5)),
        ]);
        let scheduler = BackgroundScheduler::start(&bot);

        bot.invoke("prestige", false).await.expect("invoke");
        assert_eq!(bot.scheduler().state(), SchedulerState::Running);

        bot.pause_run();
        bot.invoke("prestige", false).await.expect("invoke");
        assert_eq!(
            bot.scheduler().state(),
            SchedulerState::Paused,
            "An operator pause outlives the exclusive body"
        );

        scheduler.shutdown(&bot).await;
    }
}
