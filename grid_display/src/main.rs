// main.rs - Desktop viewer for a server-driven Game of Life board

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use conway_client::{ConnectionManager, GridViewer, SessionStore};
use conway_sim::LocalServer;
use eframe::egui;
use tracing::info;

mod app;
mod cli;
mod logging;

use app::ConwayApp;
use cli::Args;

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let _log_guard = logging::init(&args.log_config())?;

    let runtime = tokio::runtime::Runtime::new().context("failed to start tokio runtime")?;
    let viewer_config = args.viewer_config();
    let sim_config = args.sim_config();
    let grid_count = sim_config.grid_count;
    let server = LocalServer::new(sim_config, runtime.handle().clone());

    let session = SessionStore::for_config(&viewer_config);
    let conn = ConnectionManager::new(Arc::new(server), session, &viewer_config);
    let viewer = GridViewer::mount(&conn, &viewer_config);
    info!(uri = %viewer_config.uri, grid_id = %viewer_config.grid_id, "starting viewer");

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default().with_inner_size([800.0, 950.0]),
        ..Default::default()
    };
    eframe::run_native(
        "Conway's Game of Life",
        options,
        Box::new(move |_cc| Box::new(ConwayApp::new(conn, viewer, grid_count, runtime))),
    )
    .map_err(|err| anyhow::anyhow!("viewer window failed: {err}"))
}
