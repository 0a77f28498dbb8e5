use std::path::Path;
use std::sync::Arc;

use comptoir_core::channels::ChannelMap;
use comptoir_core::settings::Settings;
use comptoir_data::panels::PanelRefStore;
use comptoir_data::store::StateStore;
use comptoir_runtime::coordinator::UpdateCoordinator;
use comptoir_runtime::discord::DiscordClient;
use comptoir_runtime::reconciler::Reconciler;
use comptoir_runtime::registry::PanelRegistry;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

// ── Directory bootstrap ────────────────────────────────────────────────────────

/// Ensure the data directory exists (including any missing parents).
pub fn ensure_directories(data_dir: &Path) -> anyhow::Result<()> {
    std::fs::create_dir_all(data_dir)?;
    Ok(())
}

// ── Logging bootstrap ──────────────────────────────────────────────────────────

/// Map a Python-style level name onto a `tracing` filter directive.
fn normalise_level(log_level: &str) -> String {
    match log_level.to_uppercase().as_str() {
        "DEBUG" => "debug".to_string(),
        "INFO" => "info".to_string(),
        "WARNING" => "warn".to_string(),
        "ERROR" | "CRITICAL" => "error".to_string(),
        _ => log_level.to_lowercase(),
    }
}

/// Initialise the global `tracing` subscriber on stderr.
///
/// Falls back to `"info"` if the level string is not recognised.
pub fn setup_logging(log_level: &str) -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_new(normalise_level(log_level)).unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(filter)
        .with(subscriber)
        .try_init()?;

    Ok(())
}

// ── Engine wiring ──────────────────────────────────────────────────────────────

/// Build the coordinator talking to Discord.
///
/// Fails when the token is missing or the channel map is absent, unreadable
/// or incomplete: a panel without a channel is a configuration error, not
/// something to discover at the first update.
pub fn build_coordinator(settings: &Settings) -> anyhow::Result<UpdateCoordinator> {
    let token = settings.require_token()?;
    let channels = ChannelMap::load_from(&settings.channels_file())?;

    let registry = match &settings.panels_file {
        Some(path) => PanelRegistry::with_store(&channels, PanelRefStore::new(path)),
        None => PanelRegistry::new(&channels),
    };

    let client = DiscordClient::new(settings.api_base.clone(), token)?;
    let reconciler = Reconciler::new(Arc::new(client), Arc::new(registry))
        .with_history_limit(settings.history_limit);

    Ok(UpdateCoordinator::load(
        StateStore::new(settings.state_file()),
        reconciler,
    ))
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use comptoir_core::models::District;
    use tempfile::TempDir;

    fn settings_in(tmp: &TempDir, token: Option<&str>) -> Settings {
        let mut settings = Settings::load_from_args(vec![
            "comptoir".into(),
            "--data-dir".into(),
            tmp.path().as_os_str().to_owned(),
            "show".into(),
        ]);
        settings.token = token.map(str::to_string);
        settings
    }

    fn write_channels(tmp: &TempDir) {
        let districts: Vec<String> = District::ALL
            .into_iter()
            .enumerate()
            .map(|(i, d)| format!("\"{}\": \"{}\"", d.slug(), 200 + i))
            .collect();
        let json = format!(
            "{{\"global\": \"100\", \"districts\": {{{}}}}}",
            districts.join(", ")
        );
        std::fs::write(tmp.path().join("channels.json"), json).unwrap();
    }

    #[test]
    fn test_ensure_directories() {
        let tmp = TempDir::new().expect("tempdir");
        let data_dir = tmp.path().join("a").join("b");
        ensure_directories(&data_dir).expect("create");
        assert!(data_dir.is_dir());
    }

    #[test]
    fn test_normalise_level() {
        assert_eq!(normalise_level("DEBUG"), "debug");
        assert_eq!(normalise_level("WARNING"), "warn");
        assert_eq!(normalise_level("CRITICAL"), "error");
        assert_eq!(normalise_level("trace"), "trace");
    }

    #[test]
    fn test_build_requires_token() {
        let tmp = TempDir::new().expect("tempdir");
        write_channels(&tmp);
        let err = build_coordinator(&settings_in(&tmp, None))
            .err()
            .expect("missing token must fail");
        assert!(err.to_string().contains("DISCORD_TOKEN"));
    }

    #[test]
    fn test_build_requires_channel_map() {
        let tmp = TempDir::new().expect("tempdir");
        let result = build_coordinator(&settings_in(&tmp, Some("token")));
        assert!(result.is_err(), "missing channels.json must fail");
    }

    #[tokio::test]
    async fn test_build_with_complete_config() {
        let tmp = TempDir::new().expect("tempdir");
        write_channels(&tmp);

        let coordinator =
            build_coordinator(&settings_in(&tmp, Some("token"))).expect("wired coordinator");
        assert_eq!(coordinator.reconciler().registry().scopes().count(), 7);
        assert!(
            tmp.path().join("districts.json").exists(),
            "defaults persisted on first load"
        );
    }
}
