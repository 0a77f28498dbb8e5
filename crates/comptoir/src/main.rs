mod bootstrap;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use comptoir_core::models::{District, PanelScope};
use comptoir_core::render::render_panel;
use comptoir_core::settings::{Command, Settings};
use comptoir_data::store::StateStore;
use comptoir_runtime::coordinator::{PanelStatus, UpdateCoordinator};
use comptoir_runtime::server;

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::load();

    bootstrap::ensure_directories(&settings.data_dir())?;
    bootstrap::setup_logging(&settings.log_level)?;

    tracing::info!("Comptoir v{} starting", env!("CARGO_PKG_VERSION"));

    match settings.command.clone() {
        Command::Show { district } => {
            let snapshot = StateStore::new(settings.state_file()).load();
            let scopes = match district {
                Some(name) => vec![PanelScope::District(name.parse::<District>()?)],
                None => PanelScope::all(),
            };
            for scope in scopes {
                println!("{}", render_panel(scope, &snapshot).to_text());
            }
        }

        Command::Update {
            district,
            gauge,
            value,
            note,
        } => {
            let coordinator = bootstrap::build_coordinator(&settings)?;
            adopt_panels(&coordinator).await;

            match coordinator
                .apply_update(&district, &gauge, value, note)
                .await
            {
                Ok(ack) => {
                    println!("{}", ack.message);
                    if !ack.persisted {
                        eprintln!("⚠ snapshot could not be written to disk");
                    }
                    for panel in ack.panels.iter().filter(|p| p.status == PanelStatus::Failed) {
                        eprintln!(
                            "⚠ panel {} not refreshed: {}",
                            panel.scope,
                            panel.error.as_deref().unwrap_or("unknown error")
                        );
                    }
                }
                Err(e) if e.is_validation() => {
                    eprintln!("❌ {e}");
                    std::process::exit(2);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Command::Serve { port } => {
            let coordinator = Arc::new(bootstrap::build_coordinator(&settings)?);
            adopt_panels(&coordinator).await;

            let reports = coordinator.refresh_all().await;
            let failed = reports
                .iter()
                .filter(|r| r.status == PanelStatus::Failed)
                .count();
            tracing::info!(panels = reports.len(), failed, "startup refresh complete");

            let addr = SocketAddr::from(([0, 0, 0, 0], port));
            let app = server::router(coordinator);

            tokio::select! {
                result = server::serve(addr, app) => result?,
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Ctrl+C received; shutting down");
                }
            }
        }
    }

    Ok(())
}

/// Pick up panels left by a previous run before anything is posted.
async fn adopt_panels(coordinator: &UpdateCoordinator) {
    match coordinator.reconciler().adopt_existing().await {
        Ok(report) => tracing::info!(
            adopted = report.adopted.len(),
            known = report.already_known.len(),
            missing = report.not_found.len(),
            failed = report.failed.len(),
            "panel adoption complete"
        ),
        Err(e) => tracing::warn!(error = %e, "panel adoption skipped"),
    }
}
