//! Logging and output control
//!
//! This module provides the [`Logger`] used by every registration component.
//! It supports quiet and verbose output and formats operation timing.

use std::time::Duration;

/// Logger responsible for all registration output
#[derive(Debug, Clone)]
pub struct Logger {
    pub verbose: bool,
    pub quiet: bool,
}

impl Logger {
    pub fn new(verbose: bool) -> Self {
        Self {
            verbose,
            quiet: false,
        }
    }

    pub fn new_quiet() -> Self {
        Self {
            verbose: false,
            quiet: true,
        }
    }

    fn enabled(&self, verbose_only: bool) -> bool {
        !self.quiet && (self.verbose || !verbose_only)
    }

    // Structured logging levels
    pub fn trace(&self, message: &str) {
        if self.enabled(true) {
            println!("🔍 TRACE: {}", message);
        }
    }

    pub fn debug(&self, message: &str) {
        if self.enabled(true) {
            println!("🐛 DEBUG: {}", message);
        }
    }

    /// Information message
    pub fn info(&self, message: &str) {
        if self.enabled(false) {
            println!("ℹ️  {}", message);
        }
    }

    /// Success message
    pub fn success(&self, message: &str) {
        if self.enabled(false) {
            println!("✅ {}", message);
        }
    }

    /// Warning message
    pub fn warning(&self, message: &str) {
        if self.enabled(false) {
            println!("⚠️  WARNING: {}", message);
        }
    }

    /// Detailed information (only shown in verbose mode)
    pub fn detail(&self, message: &str) {
        if self.enabled(true) {
            println!("   {}", message);
        }
    }

    /// Format duration in human-readable format
    pub fn format_duration(&self, duration: Duration) -> String {
        let millis = duration.as_millis();
        if millis < 1000 {
            format!("{}ms", millis)
        } else if millis < 60_000 {
            format!("{:.1}s", duration.as_secs_f64())
        } else {
            let secs = duration.as_secs();
            format!("{}m{}s", secs / 60, secs % 60)
        }
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new(false)
    }
}
