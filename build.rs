use std::env;
use std::process::Command;
use time::OffsetDateTime;

fn git_tag() -> Option<String> {
    let output = Command::new("git")
        .args(["describe", "--tags", "--exact-match"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8(output.stdout)
        .ok()
        .map(|s| s.trim().to_string())
}

fn main() {
    println!("cargo:rerun-if-env-changed=SOURCE_DATE_EPOCH");
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/tags");

    // Reproducible builds pin the timestamp through SOURCE_DATE_EPOCH.
    let built = env::var("SOURCE_DATE_EPOCH")
        .ok()
        .and_then(|raw| raw.parse::<i64>().ok())
        .and_then(|epoch| OffsetDateTime::from_unix_timestamp(epoch).ok())
        .unwrap_or_else(OffsetDateTime::now_utc);

    let version = env::var("CARGO_PKG_VERSION").unwrap_or_else(|_| "0.0.0".to_string());
    let release = env::var("PROFILE").is_ok_and(|p| p == "release");
    let tagged = git_tag().is_some_and(|tag| tag == format!("v{version}"));

    let display = if release || tagged {
        version
    } else {
        format!("{version}-dev")
    };

    println!("cargo:rustc-env=BOT_VERSION={display}");
    println!(
        "cargo:rustc-env=BOT_BUILD_DATE={}-{:02}-{:02}",
        built.year(),
        u8::from(built.month()),
        built.day()
    );
}
