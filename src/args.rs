use std::env;
use std::path::PathBuf;

const DEFAULT_SETTINGS: &str = "settings.toml";
const PANIC_FILE_NAME: &str = "titan-adb-run.stop";

#[derive(Debug)]
pub struct Args {
    pub config_path: Option<PathBuf>,
    pub settings_path: PathBuf,
    pub templates_dir: Option<PathBuf>,
    pub device: Option<String>,
    pub panic_file: PathBuf,
    pub debug_mode: bool,
}

impl Args {
    pub fn parse() -> Option<Self> {
        Self::parse_from(env::args().skip(1))
    }

    fn parse_from(args: impl IntoIterator<Item = String>) -> Option<Self> {
        let mut parsed = Args {
            config_path: None,
            settings_path: PathBuf::from(DEFAULT_SETTINGS),
            templates_dir: None,
            device: None,
            panic_file: env::temp_dir().join(PANIC_FILE_NAME),
            debug_mode: false,
        };

        for arg in args {
            if arg == "--help" || arg == "-h" {
                print_help();
                return None;
            } else if arg == "--version" || arg == "-v" {
                println!(
                    "Titan ADB Run v{} ({})",
                    env!("BOT_VERSION"),
                    env!("BOT_BUILD_DATE")
                );
                return None;
            } else if arg == "--debug" {
                parsed.debug_mode = true;
            } else if let Some(val) = arg.strip_prefix("--config=") {
                parsed.config_path = Some(PathBuf::from(val));
            } else if let Some(val) = arg.strip_prefix("--settings=") {
                parsed.settings_path = PathBuf::from(val);
            } else if let Some(val) = arg.strip_prefix("--templates=") {
                parsed.templates_dir = Some(PathBuf::from(val));
            } else if let Some(val) = arg.strip_prefix("--device=") {
                if val.is_empty() {
                    eprintln!("❌ --device needs a serial or host:port");
                    return None;
                }
                parsed.device = Some(val.to_string());
            } else if let Some(val) = arg.strip_prefix("--panic-file=") {
                parsed.panic_file = PathBuf::from(val);
            } else {
                eprintln!("❌ Unknown argument: {}", arg);
                print_help();
                return None;
            }
        }

        Some(parsed)
    }
}

fn print_help() {
    println!("🤖 Titan ADB Run - idle game automation over ADB");
    println!();
    println!("USAGE:");
    println!("    titan-adb-run [FLAGS]");
    println!();
    println!("FLAGS:");
    println!("    --config=PATH       Bot configuration (TOML, defaults when omitted)");
    println!("    --settings=PATH     Global settings re-read while running (default: {DEFAULT_SETTINGS})");
    println!("    --templates=DIR     Template directory, overrides the configuration");
    println!("    --device=NAME       Device serial or host:port (default: first device)");
    println!("    --panic-file=PATH   Failsafe: the bot stops while this file exists");
    println!("    --debug             Enable debug logging (RUST_LOG takes precedence)");
    println!("    --help, -h          Show this help message");
    println!("    --version, -v       Show version information");
    println!();
    println!("While running, type a shortcut combo (e.g. 'shift+m', 'p', 'r', 'e') and press enter.");
    println!();
    println!("EXAMPLES:");
    println!("    titan-adb-run --config=titan.toml");
    println!("    titan-adb-run --device=192.168.1.20:5555 --debug");
}
