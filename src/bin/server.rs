//! HRMS chat gateway server binary.
//!
//! Wires the token verifier, the NLU engines, the audit logger, and the
//! PostgreSQL store into the axum router and serves it.
//!
//! # Environment Variables
//!
//! - `PORT` — HTTP port (default: 8080)
//! - `DATABASE_URL` — PostgreSQL connection string
//! - `SECRET_KEY` — shared JWT secret (required)
//! - `DIALOGFLOW_PROJECT_ID`, `DIALOGFLOW_API_TOKEN`, `DIALOGFLOW_BASE_URL`,
//!   `DIALOGFLOW_LANGUAGE` — primary NLU engine
//! - `RASA_URL` — secondary NLU engine endpoint
//! - `NLU_CONFIDENCE_FLOOR` — fallback confidence floor (default: 0.4)
//! - `RUST_LOG` — tracing filter (default: "info")

use std::sync::Arc;

use hrms_gateway::audit::AuditLogger;
use hrms_gateway::nlu::providers::{DialogflowEngine, RasaEngine};
use hrms_gateway::{app_router, AppState, Config, FallbackResolver, Store, TokenVerifier};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,hrms_gateway=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    tracing::info!("connecting to PostgreSQL");
    let pool = sqlx::PgPool::connect(&config.database_url).await?;
    let store = Store::new(pool);
    store.migrate().await?;

    let primary = DialogflowEngine::new(&config.dialogflow)?;
    let secondary = RasaEngine::new(config.rasa_url.clone())?;
    let resolver = FallbackResolver::new(
        Arc::new(primary),
        Arc::new(secondary),
        config.confidence_floor,
    );
    let audit = AuditLogger::new(Arc::new(store.clone()));

    let state = AppState::new(
        TokenVerifier::new(&config.jwt_secret),
        resolver,
        audit,
        store,
    );
    let app = app_router(state);

    let bind_addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("hrms-gateway listening on {}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
