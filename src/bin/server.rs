//! Query server: loads the entity registry, optionally migrates, mounts common and query routes.

use axum::Router;
use entity_query_sdk::{
    apply_migrations, common_routes_with_ready, ensure_database_exists, load_from_path, query_routes, AppState,
    Schema, Settings,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("entity_query_sdk=info".parse()?))
        .init();

    let settings = Settings::from_env()?;
    ensure_database_exists(&settings.database_url).await?;
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .connect(&settings.database_url)
        .await?;

    let registry = load_from_path(&settings.entity_config_path).await?;
    if settings.auto_migrate {
        apply_migrations(&pool, &registry).await?;
    }
    let schema = Schema::build(Arc::new(registry));
    tracing::info!(fields = schema.fields.len(), entities = schema.entities.len(), "schema assembled");

    let state = AppState {
        pool,
        schema: Arc::new(schema),
        statement_timeout: settings.statement_timeout,
    };

    let app = Router::new()
        .merge(common_routes_with_ready(state.clone()))
        .nest("/api/v1", query_routes(state))
        .layer(TraceLayer::new_for_http());

    let listener = TcpListener::bind(&settings.bind_addr).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
