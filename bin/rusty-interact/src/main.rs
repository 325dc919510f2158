//! # Rusty-Interact Binary
//!
//! The entry point that assembles the application based on compile-time features.

mod config;

use std::sync::Arc;

use actix_web::{web, App, HttpServer};
use ri_api::handlers::AppState;
use ri_api::middleware::{cors_policy, security_headers, standard_middleware};
use ri_core::services::Services;
use ri_core::traits::IdentityProvider;

use crate::config::AppConfig;

// Feature-gated imports: the plugins are compiled to order
#[cfg(feature = "db-sqlite")]
use ri_db_sqlite::SqliteStore;

#[cfg(feature = "identity-simple")]
use ri_identity_simple::SimpleIdentityProvider;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    let config = AppConfig::from_env();

    // 1. Initialize Database Implementation (also the article read model)
    #[cfg(feature = "db-sqlite")]
    let store = Arc::new(SqliteStore::new(&config.database_url).await?);

    // 1b. Load the publishing system's article export, when configured
    #[cfg(feature = "db-sqlite")]
    if let Some(path) = &config.articles_file {
        let json = std::fs::read_to_string(path)?;
        let count = store.import_articles_json(&json).await?;
        log::info!("loaded {} articles from {}", count, path);
    }

    // 2. Initialize Identity Implementation
    #[cfg(feature = "identity-simple")]
    let identity: Arc<dyn IdentityProvider> = Arc::new(SimpleIdentityProvider::new(&config.session_salt));

    // 3. Wire the services and wrap them in AppState
    let services = Services::new(store.clone(), store, identity.clone(), &config.service_settings());
    let state = web::Data::new(AppState { services, identity });

    log::info!("Rusty-Interact starting on http://{}", config.bind_addr);

    if config.cors_origins.is_empty() {
        log::info!("CORS_ALLOWED_ORIGINS empty, cross-origin browser access disabled");
    }
    let cors_origins = config.cors_origins.clone();
    HttpServer::new(move || {
        App::new()
            .wrap(cors_policy(&cors_origins))
            .wrap(security_headers())
            .wrap(standard_middleware())
            .app_data(state.clone())
            .configure(ri_api::configure_routes)
    })
    .bind(config.bind_addr.as_str())?
    .run()
    .await?;
    Ok(())
}
