// src/utils/log.rs

//! Console reporting for CLI runs.
//!
//! Diagnostics go through the `log` macros; these helpers print the
//! user-facing run report (headers, steps, summaries) with a timestamp.

use std::sync::OnceLock;

use chrono::Local;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "debug" | "trace" => LogLevel::Debug,
            "warn" | "warning" => LogLevel::Warn,
            "error" => LogLevel::Error,
            _ => LogLevel::Info,
        }
    }
}

static LOG_LEVEL: OnceLock<LogLevel> = OnceLock::new();

/// Set the console level once; later calls are ignored.
pub fn init(level: &str) {
    let _ = LOG_LEVEL.set(LogLevel::parse(level));
}

fn should_log(level: LogLevel) -> bool {
    level >= LOG_LEVEL.get().copied().unwrap_or(LogLevel::Info)
}

fn format_log(level: LogLevel, message: &str) -> String {
    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
    format!("[{}] [{}] {}", timestamp, level.as_str(), message)
}

pub fn info(message: &str) {
    if should_log(LogLevel::Info) {
        println!("{}", format_log(LogLevel::Info, message));
    }
}

pub fn warn(message: &str) {
    if should_log(LogLevel::Warn) {
        eprintln!("{}", format_log(LogLevel::Warn, message));
    }
}

pub fn error(message: &str) {
    if should_log(LogLevel::Error) {
        eprintln!("{}", format_log(LogLevel::Error, message));
    }
}

/// Always shown.
pub fn success(message: &str) {
    println!("{}", format_log(LogLevel::Info, message));
}

/// Per-source progress line: `[completed/total] source`.
pub fn progress(completed: usize, total: usize, source_name: &str) {
    if should_log(LogLevel::Info) {
        let msg = format!("[{completed}/{total}] {source_name}");
        println!("{}", format_log(LogLevel::Info, &msg));
    }
}

pub fn step(step_num: usize, total: usize, message: &str) {
    if should_log(LogLevel::Info) {
        let msg = format!("[STEP {step_num}/{total}] {message}");
        println!("{}", format_log(LogLevel::Info, &msg));
    }
}

pub fn header(title: &str) {
    if should_log(LogLevel::Info) {
        let border = "═".repeat(60);
        println!("{}", format_log(LogLevel::Info, &border));
        println!("{}", format_log(LogLevel::Info, &format!("  {title}")));
        println!("{}", format_log(LogLevel::Info, &border));
    }
}

pub fn sub_item(message: &str) {
    if should_log(LogLevel::Info) {
        println!("{}", format_log(LogLevel::Info, &format!("    {message}")));
    }
}

/// Titled block of `key: value` lines.
pub fn summary(title: &str, items: &[(&str, String)]) {
    if should_log(LogLevel::Info) {
        println!();
        println!("{}", format_log(LogLevel::Info, &format!("[SUMMARY] {title}")));
        for (key, value) in items {
            println!("{}", format_log(LogLevel::Info, &format!("    {key}: {value}")));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_ordering() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Warn < LogLevel::Error);
    }

    #[test]
    fn test_log_level_parse() {
        assert_eq!(LogLevel::parse("debug"), LogLevel::Debug);
        assert_eq!(LogLevel::parse("WARNING"), LogLevel::Warn);
        assert_eq!(LogLevel::parse("verbose"), LogLevel::Info);
    }
}
