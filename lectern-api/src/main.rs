//! Lectern API Server Entry Point
//!
//! Reads configuration from the environment, opens the PostgreSQL pool and
//! serves the Axum router until Ctrl-C.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use lectern_api::config::env_lookup;
use lectern_api::telemetry::{init_tracer, TelemetryConfig};
use lectern_api::{
    create_api_router, ApiError, ApiResult, AppState, AuthConfig, DbConfig, PgDatastore,
    ServiceConfig,
};

#[tokio::main]
async fn main() -> ApiResult<()> {
    init_tracer(&TelemetryConfig::default())?;

    let service_config = ServiceConfig::from_env()?;
    let db_config = DbConfig::from_env();
    let auth_config = AuthConfig::from_env();

    let store = PgDatastore::from_config(&db_config)?;
    tracing::info!(
        host = %db_config.host,
        dbname = %db_config.dbname,
        pool_size = store.pool_size(),
        "Datastore pool created"
    );

    let state = AppState::from_config(Arc::new(store), service_config.lectern)?;
    let app: Router = create_api_router(state, &service_config.api, auth_config);

    let addr = resolve_bind_addr(env_lookup)?;
    tracing::info!(%addr, "Starting Lectern API server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    let server = axum::serve(listener, app);
    tokio::select! {
        result = server => {
            result.map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    Ok(())
}

fn resolve_bind_addr(lookup: impl Fn(&str) -> Option<String>) -> ApiResult<SocketAddr> {
    let host = lookup("LECTERN_API_BIND").unwrap_or_else(|| "0.0.0.0".to_string());
    let port_str = lookup("PORT")
        .or_else(|| lookup("LECTERN_API_PORT"))
        .unwrap_or_else(|| "3000".to_string());
    let port = port_str
        .trim()
        .parse::<u16>()
        .map_err(|_| ApiError::invalid_input(format!("Invalid port value: {}", port_str)))?;

    let addr = format!("{}:{}", host.trim(), port);
    addr.parse::<SocketAddr>()
        .map_err(|e| ApiError::invalid_input(format!("Invalid bind address {}: {}", addr, e)))
}
