// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod config;
pub mod judgment;
pub mod metrics;
pub mod resolver;
pub mod service;
pub mod session;
pub mod settings;
pub mod weights;

pub use crate::api::router;
pub use crate::judgment::PairwiseJudgment;
pub use crate::resolver::{ResolverMode, WeightResolver};
pub use crate::weights::{derive_weights, WeightVector};

use std::sync::Arc;

use axum::Router;
use tracing::info;

use crate::api::AppState;
use crate::config::AppConfig;
use crate::service::HttpServiceClient;
use crate::settings::{FileSettingsStore, UserSettings};

/// Build the full router (API + `/metrics`) from a resolved config.
pub fn build_app(cfg: &AppConfig) -> anyhow::Result<Router> {
    let metrics = metrics::Metrics::init()?;

    let client = HttpServiceClient::new(&cfg.api_base_url, cfg.remote_timeout())?;
    let resolver = resolver::build_resolver(cfg.resolver, client, cfg.remote_timeout());
    let store = FileSettingsStore::new(&cfg.settings_dir)?;
    let settings = UserSettings::new(Arc::new(store));

    info!(
        resolver = resolver.name(),
        api_base_url = %cfg.api_base_url,
        settings_dir = %cfg.settings_dir.display(),
        "app configured"
    );

    let state = AppState::new(resolver, settings, cfg.save_history);
    Ok(api::router(state).merge(metrics.router()))
}

/// Build the router from `config/econutri.toml` + `ECONUTRI_*` env vars.
pub async fn app() -> anyhow::Result<Router> {
    let cfg = AppConfig::load_default()?;
    build_app(&cfg)
}
