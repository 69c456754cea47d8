// SPDX-License-Identifier: Apache-2.0

use std::fs::File;
use std::path::Path;
use std::sync::Mutex;

use chemmap_core::ENV_CHEMMAP_LOG_LEVEL;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Clone, Copy, Default)]
pub struct LogFlags {
    pub quiet: bool,
    pub verbose: u8,
    /// JSON lines on stderr instead of the human format.
    pub json_lines: bool,
}

impl LogFlags {
    fn level_override(self) -> Option<&'static str> {
        if self.quiet {
            return Some("warn");
        }
        match self.verbose {
            0 => None,
            1 => Some("debug"),
            _ => Some("trace"),
        }
    }

    /// Explicit flags win over `CHEMMAP_LOG_LEVEL`, which wins over `info`.
    #[must_use]
    pub fn filter(self) -> EnvFilter {
        if let Some(level) = self.level_override() {
            return EnvFilter::new(level);
        }
        EnvFilter::try_from_env(ENV_CHEMMAP_LOG_LEVEL).unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

/// Installs the process-wide subscriber: stderr always, plus an appending
/// plain-text copy at `log_file` when given.
pub fn init_tracing(flags: LogFlags, log_file: Option<&Path>) -> Result<(), String> {
    let file = match log_file {
        Some(path) => Some(
            File::options()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| format!("cannot open log file {}: {e}", path.display()))?,
        ),
        None => None,
    };
    let stderr_text = (!flags.json_lines).then(|| fmt::layer().with_writer(std::io::stderr));
    let stderr_json = flags
        .json_lines
        .then(|| fmt::layer().json().with_writer(std::io::stderr));
    let file_text = file.map(|f| fmt::layer().with_ansi(false).with_writer(Mutex::new(f)));

    tracing_subscriber::registry()
        .with(flags.filter())
        .with(stderr_text)
        .with(stderr_json)
        .with(file_text)
        .try_init()
        .map_err(|e| format!("cannot install log subscriber: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiet_and_verbose_pick_levels() {
        let quiet = LogFlags {
            quiet: true,
            verbose: 2,
            ..LogFlags::default()
        };
        assert_eq!(quiet.level_override(), Some("warn"));
        let v = LogFlags {
            verbose: 1,
            ..LogFlags::default()
        };
        assert_eq!(v.level_override(), Some("debug"));
        let vv = LogFlags {
            verbose: 3,
            ..LogFlags::default()
        };
        assert_eq!(vv.level_override(), Some("trace"));
        assert_eq!(LogFlags::default().level_override(), None);
    }
}
