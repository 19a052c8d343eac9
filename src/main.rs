use axum::Router;
use medminder::config::AppConfig;
use medminder::db::{DocumentStore, MemoryStore, PgStore};
use medminder::services::ai::AiService;
use medminder::services::audio::{AudioStore, AUDIO_ROUTE};
use medminder::services::quiz::QuestionSource;
use medminder::state::{AppState, SharedState};
use medminder::web;
use sqlx::postgres::PgPoolOptions;
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;

    let store: Arc<dyn DocumentStore> = match &config.database_url {
        Some(database_url) => {
            tracing::info!("Connecting to database...");
            let pool = PgPoolOptions::new()
                .max_connections(10)
                .connect(database_url)
                .await
                .map_err(|e| {
                    tracing::error!("Failed to connect to database: {}", e);
                    e
                })?;
            tracing::info!("Database connection established");

            tracing::info!("Running database migrations...");
            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .map_err(|e| {
                    tracing::error!("Failed to run database migrations: {}", e);
                    e
                })?;
            tracing::info!("Database migrations completed");
            Arc::new(PgStore::new(pool))
        }
        None => {
            tracing::warn!(
                "DATABASE_URL not set; documents are kept in memory and lost on restart"
            );
            Arc::new(MemoryStore::new())
        }
    };

    let audio = AudioStore::new(&config.uploads_dir);
    audio.ensure_dir().await?;

    let ai = Arc::new(AiService::new(config.ai.clone()));
    let shared: SharedState = Arc::new(AppState {
        store,
        ai: ai.clone(),
        questions: QuestionSource::new(ai),
        audio,
        session_key: config.session_key.clone(),
        max_upload_bytes: config.max_upload_bytes,
        quiz_sessions: Arc::new(tokio::sync::RwLock::new(HashMap::new())),
    });

    let app = Router::new()
        .merge(web::routes(shared))
        .nest_service(AUDIO_ROUTE, ServeDir::new(&config.uploads_dir))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    tracing::info!("Listening on {}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
