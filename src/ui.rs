use chrono::{DateTime, Utc};
use colored::{ColoredString, Colorize};
use resources::{PHASE_RUNNING, PHASE_STOPPED};

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

/// Colored marker for a completed/succeeded pair
pub fn outcome(completed: bool, succeeded: bool) -> ColoredString {
    match (completed, succeeded) {
        (true, true) => "succeeded".green(),
        (true, false) => "failed".red(),
        (false, _) => "running".yellow(),
    }
}

/// Colored pod or notebook phase
pub fn phase(phase: &str) -> ColoredString {
    match phase {
        PHASE_RUNNING => phase.green(),
        PHASE_STOPPED => phase.dimmed(),
        "" => "Pending".yellow(),
        other => other.normal(),
    }
}

/// Age of an object relative to `now`, e.g. `3d`, `5m`
pub fn age(created: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let Some(created) = created else {
        return "-".to_string();
    };
    let secs = (now - created).num_seconds().max(0);
    match secs {
        s if s >= 86_400 => format!("{}d", s / 86_400),
        s if s >= 3_600 => format!("{}h", s / 3_600),
        s if s >= 60 => format!("{}m", s / 60),
        s => format!("{s}s"),
    }
}
