mod app;
mod config;
mod enhance;
mod error;
mod event;
mod gallery;
mod media;
mod session;
mod theme;
mod vision;

use app::GarnishApp;
use config::GarnishConfig;
use eframe::egui;
use enhance::Enhancer;
use gallery::store::GalleryStore;
use session::store::SessionStore;
use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::Arc;
use tracing::info;
use vision::VisionClient;

fn data_root() -> PathBuf {
    dirs::data_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("garnish")
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let config = GarnishConfig::load_or_default();
    if config.api_key.is_empty() {
        info!("no API key configured; enhancement requests will fail until one is set");
    }

    let root = data_root();
    let session_store = SessionStore::open(root.join("session"))?;
    let gallery_store = GalleryStore::open(root.join("gallery"))?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("garnish-runtime")
        .build()?;

    let (tx, rx) = mpsc::channel();
    let client = Arc::new(VisionClient::new(config));
    let enhancer = Enhancer::new(client, gallery_store.clone(), tx, runtime.handle().clone());
    let app = GarnishApp::new(rx, enhancer, session_store, gallery_store);
    let _runtime = runtime;

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1180.0, 760.0])
            .with_min_inner_size([960.0, 600.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Garnish",
        native_options,
        Box::new(move |creation_context| {
            app.apply_theme(&creation_context.egui_ctx);
            Ok(Box::new(app))
        }),
    )?;

    Ok(())
}
