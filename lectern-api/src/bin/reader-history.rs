//! Composite History Dump
//!
//! Prints one reader's composite history (profile, recent loans and
//! statistics) as pretty JSON. Connection settings come from the same
//! `LECTERN_DB_*` variables as the server.
//!
//! Usage:
//!   reader-history <reader_id> [limit]

use std::sync::Arc;

use lectern_api::telemetry::{init_tracer, TelemetryConfig};
use lectern_api::validation::resolve_limit;
use lectern_api::{ApiError, ApiResult, DbConfig, PgDatastore, ServiceConfig};
use lectern_core::render_history;
use lectern_storage::{Gateway, LibraryQuery};

const USAGE: &str = "usage: reader-history <reader_id> [limit]";

#[tokio::main]
async fn main() -> ApiResult<()> {
    init_tracer(&TelemetryConfig::for_cli("reader-history"))?;

    let mut args = std::env::args().skip(1);
    let reader_id = args
        .next()
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| ApiError::invalid_input(USAGE))?;
    let limit = args
        .next()
        .map(|raw| {
            raw.trim()
                .parse::<i64>()
                .map_err(|_| ApiError::invalid_input(format!("limit is not a number: {}\n{}", raw, USAGE)))
        })
        .transpose()?;

    let config = ServiceConfig::from_env()?.lectern;
    let limit = resolve_limit(limit, config.history.default_limit, config.history.max_limit)?;

    let store = PgDatastore::from_config(&DbConfig::from_env())?;
    let query = LibraryQuery::new(Gateway::new(Arc::new(store), config.datastore_policy));

    let result = query.assemble_history(reader_id.trim(), limit).await?;
    println!("{}", render_history(&result)?);
    Ok(())
}
