mod args;

use args::Args;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use titan_adb_run::adb::{AdbShell, ScreenBackend};
use titan_adb_run::config::BotConfig;
use titan_adb_run::game_automation::match_image::{TemplateDetector, TemplateLibrary};
use titan_adb_run::game_automation::{
    AppState, AutomationEvent, Bot, BotResult, BotRunner, FileSettings, MemoryQueue, PanicFile,
    SessionRecord, ShortcutHandler, create_automation_channels, default_registry,
};
use tokio::sync::{Mutex, mpsc};

#[tokio::main]
async fn main() -> ExitCode {
    let Some(args) = Args::parse() else {
        return ExitCode::SUCCESS;
    };

    let mut config = match &args.config_path {
        Some(path) => match BotConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("❌ {e}");
                return ExitCode::FAILURE;
            }
        },
        None => BotConfig::default(),
    };
    if let Some(dir) = &args.templates_dir {
        config.templates_dir = dir.clone();
    }
    init_logging(&args, &config);

    match run(args, config).await {
        Ok(record) => {
            println!("🏁 {record}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("❌ could not start the bot: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// RUST_LOG wins, then `--debug`, then the configured level.
fn init_logging(args: &Args, config: &BotConfig) {
    let fallback = if args.debug_mode {
        "debug"
    } else {
        config.log_level.as_str()
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(fallback)).init();
}

async fn run(args: Args, config: BotConfig) -> BotResult<SessionRecord> {
    let shell = match &args.device {
        Some(name) => AdbShell::new_with_device(name).await?,
        None => AdbShell::new(None).await?,
    };

    let mut library = TemplateLibrary::new();
    let loaded = library.load_directory(&config.templates_dir)?;
    log::info!("🖼️ loaded {} templates from {:?}", loaded, config.templates_dir);
    let detector = TemplateDetector::new(library, config.matching.clone());

    let registry = default_registry()?;
    log::debug!("🧩 {} capabilities registered", registry.len());

    let (events, event_rx) = create_automation_channels();
    tokio::spawn(log_events(event_rx));
    let queue = Arc::new(MemoryQueue::new(events.clone()));

    let app = AppState::new();
    let signal_app = app.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("⏹️ ctrl-c received, stopping");
            signal_app.shutdown();
        }
    });

    let shortcuts = config.shortcuts.clone();
    let bot = Bot::builder(
        config,
        registry,
        ScreenBackend::new(Arc::new(shell)),
        Arc::new(detector),
    )
    .events(events)
    .settings(Arc::new(FileSettings::new(args.settings_path)))
    .app_state(app)
    .failsafe(Arc::new(PanicFile::new(args.panic_file.clone())))
    .build();
    log::info!("🛑 failsafe: create {:?} to stop the bot", args.panic_file);

    let mut runner = BotRunner::new(bot.clone(), queue.clone());
    if shortcuts.enabled {
        let handler = Arc::new(Mutex::new(ShortcutHandler::new(
            bot.registry(),
            queue,
            Duration::from_millis(shortcuts.cooldown_ms),
        )));
        tokio::spawn(read_combos(handler.clone()));
        runner = runner.shortcuts(handler);
    }

    Ok(runner.run().await)
}

/// Stdin is read on a plain thread so a pending read never holds up
/// runtime shutdown.
fn stdin_lines() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(16);
    std::thread::spawn(move || {
        for line in std::io::stdin().lines() {
            let Ok(line) = line else {
                break;
            };
            if tx.blocking_send(line).is_err() {
                break;
            }
        }
    });
    rx
}

/// Feed combos typed on stdin, one per line, to the shortcut handler.
async fn read_combos(handler: Arc<Mutex<ShortcutHandler>>) {
    let mut lines = stdin_lines();
    while let Some(line) = lines.recv().await {
        let combo = line.trim();
        if combo.is_empty() {
            continue;
        }
        let mut handler = handler.lock().await;
        if !handler.is_hooked() {
            break;
        }
        if handler.trigger(combo).await.is_none() {
            log::debug!("⌨️ '{}' queued nothing", combo);
        }
    }
}

async fn log_events(mut rx: mpsc::Receiver<AutomationEvent>) {
    while let Some(event) = rx.recv().await {
        match event {
            AutomationEvent::ActivityChanged(name) => log::debug!("🎯 activity: {}", name),
            AutomationEvent::UsageIncremented { capability, count } => {
                log::debug!("📊 {} ran {} times", capability, count)
            }
            AutomationEvent::ItemsOwned(items) => log::info!("🎒 owned: {:?}", items),
            AutomationEvent::StageUpdated(stage) => log::info!("🏔️ stage {}", stage),
            AutomationEvent::SessionEnded(outcome) => log::debug!("session ended: {}", outcome),
            other => log::trace!("event: {:?}", other),
        }
    }
}
