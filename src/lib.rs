//! Book catalog service
//!
//! Wires the books module into the module registry and HTTP server.

pub mod modules;

use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use catalog_kernel::{settings::Settings, InitCtx, ModuleRegistry};

use modules::books::store::BookStore;

/// Build a registry holding every module, backed by `store`
pub fn registry(store: Arc<dyn BookStore>) -> ModuleRegistry {
    let mut registry = ModuleRegistry::new();
    modules::register_all(&mut registry, store);
    registry
}

/// Build the complete HTTP application over `store`
pub fn app(store: Arc<dyn BookStore>, settings: &Settings) -> Router {
    catalog_http::build_router(&registry(store), settings)
}

/// Open the store, run module lifecycle hooks and serve until shutdown
pub async fn run(settings: Settings) -> anyhow::Result<()> {
    let store = modules::books::open_store(&settings.database)
        .await
        .context("failed to open book store")?;

    let registry = registry(store);
    let ctx = InitCtx {
        settings: &settings,
    };

    registry.init_modules(&ctx).await?;
    registry.start_modules(&ctx).await?;

    let served = catalog_http::start_server(&registry, &settings).await;

    registry.stop_modules().await?;
    served
}
