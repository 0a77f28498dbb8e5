use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::error::{ComptoirError, Result};

/// Discord REST endpoint used when no override is given.
pub const DEFAULT_API_BASE: &str = "https://discord.com/api/v10";

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// District gauge panels for the Comptoir
#[derive(Parser, Debug, Clone)]
#[command(
    name = "comptoir",
    about = "District gauge panels for the Comptoir",
    version
)]
pub struct Settings {
    /// Bot token
    #[arg(long, env = "DISCORD_TOKEN", hide_env_values = true, global = true)]
    pub token: Option<String>,

    /// Base URL of the Discord REST API
    #[arg(long, env = "COMPTOIR_API_BASE", default_value = DEFAULT_API_BASE, global = true)]
    pub api_base: String,

    /// Directory holding the state, channel and panel files (default: ~/.comptoir)
    #[arg(long, env = "COMPTOIR_DATA_DIR", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Snapshot file (default: <data-dir>/districts.json)
    #[arg(long, global = true)]
    pub state_file: Option<PathBuf>,

    /// Channel map file (default: <data-dir>/channels.json)
    #[arg(long, env = "COMPTOIR_CHANNELS", global = true)]
    pub channels_file: Option<PathBuf>,

    /// Persist panel message ids to this file
    #[arg(long, global = true)]
    pub panels_file: Option<PathBuf>,

    /// Messages scanned per channel when looking for an existing panel (1-100)
    #[arg(long, default_value = "50", value_parser = clap::value_parser!(u8).range(1..=100), global = true)]
    pub history_limit: u8,

    /// Logging level
    #[arg(long, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"], global = true)]
    pub log_level: String,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// What the binary should do.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Adopt or create every panel, then serve the liveness and update endpoints
    Serve {
        /// Port of the HTTP listener
        #[arg(long, env = "PORT", default_value = "8080")]
        port: u16,
    },
    /// Apply one gauge update and refresh the affected panels
    Update {
        /// District label or slug (e.g. "Haut quartier" or haut-quartier)
        district: String,
        /// Gauge label or slug (Humeur, Tension, Activité, Menaces)
        gauge: String,
        /// New value (0-5)
        #[arg(allow_hyphen_values = true)]
        value: i64,
        /// Event note for the district; an empty string clears it
        #[arg(long)]
        note: Option<String>,
    },
    /// Print the rendered panels without contacting Discord
    Show {
        /// Only print this district's panel
        district: Option<String>,
    },
}

// ── Settings impl ──────────────────────────────────────────────────────────────

impl Settings {
    /// Parse the process arguments and apply the `--debug` override.
    pub fn load() -> Self {
        Self::load_from_args(std::env::args_os().collect())
    }

    /// Same as [`Settings::load`] with an explicit argument list.
    pub fn load_from_args(args: Vec<std::ffi::OsString>) -> Self {
        Self::resolve(Settings::parse_from(args))
    }

    fn resolve(mut settings: Settings) -> Settings {
        // --debug overrides log level.
        if settings.debug {
            settings.log_level = "DEBUG".to_string();
        }
        settings
    }

    /// Resolved data directory.
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(default_data_dir)
    }

    pub fn state_file(&self) -> PathBuf {
        self.state_file
            .clone()
            .unwrap_or_else(|| self.data_dir().join("districts.json"))
    }

    pub fn channels_file(&self) -> PathBuf {
        self.channels_file
            .clone()
            .unwrap_or_else(|| self.data_dir().join("channels.json"))
    }

    /// The bot token, required by every command that talks to Discord.
    pub fn require_token(&self) -> Result<&str> {
        self.token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                ComptoirError::Config(
                    "DISCORD_TOKEN is not set (use --token or the environment)".to_string(),
                )
            })
    }
}

/// `~/.comptoir`, or `./.comptoir` when the home directory is unknown.
pub fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".comptoir")
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn parse(args: &[&str]) -> Settings {
        Settings::load_from_args(args.iter().map(Into::into).collect())
    }

    #[test]
    fn test_settings_default_values() {
        let settings = Settings::parse_from(["comptoir", "show"]);

        assert_eq!(settings.api_base, DEFAULT_API_BASE);
        assert_eq!(settings.history_limit, 50);
        assert_eq!(settings.log_level, "INFO");
        assert!(settings.panels_file.is_none());
        assert!(!settings.debug);
        assert_eq!(settings.command, Command::Show { district: None });
    }

    #[test]
    fn test_settings_paths_follow_data_dir() {
        let settings = parse(&["comptoir", "--data-dir", "/srv/comptoir", "show"]);
        assert_eq!(
            settings.state_file(),
            PathBuf::from("/srv/comptoir/districts.json")
        );
        assert_eq!(
            settings.channels_file(),
            PathBuf::from("/srv/comptoir/channels.json")
        );
    }

    #[test]
    fn test_settings_explicit_state_file_wins() {
        let settings = parse(&[
            "comptoir",
            "--data-dir",
            "/srv/comptoir",
            "--state-file",
            "/tmp/state.json",
            "show",
        ]);
        assert_eq!(settings.state_file(), PathBuf::from("/tmp/state.json"));
    }

    #[test]
    fn test_settings_debug_overrides_log_level() {
        let settings = parse(&["comptoir", "--debug", "show"]);
        assert_eq!(settings.log_level, "DEBUG");
    }

    #[test]
    fn test_settings_update_subcommand() {
        let settings = parse(&[
            "comptoir",
            "update",
            "Haut quartier",
            "Tension",
            "3",
            "--note",
            "Grève des dockers",
        ]);
        assert_eq!(
            settings.command,
            Command::Update {
                district: "Haut quartier".to_string(),
                gauge: "Tension".to_string(),
                value: 3,
                note: Some("Grève des dockers".to_string()),
            }
        );
    }

    #[test]
    fn test_settings_update_accepts_negative_value() {
        // Range checks belong to the coordinator, not the parser.
        let settings = parse(&["comptoir", "update", "mehumide", "humeur", "-3"]);
        assert!(matches!(settings.command, Command::Update { value: -3, .. }));
    }

    #[test]
    fn test_settings_history_limit_range() {
        let result = Settings::try_parse_from(["comptoir", "--history-limit", "0", "show"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_require_token() {
        let mut settings = parse(&["comptoir", "show"]);
        settings.token = None;
        assert!(settings.require_token().is_err());

        settings.token = Some("  ".to_string());
        assert!(settings.require_token().is_err());

        settings.token = Some("abc.def".to_string());
        assert_eq!(settings.require_token().unwrap(), "abc.def");
    }
}
