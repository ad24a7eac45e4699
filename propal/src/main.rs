use std::path::PathBuf;
use std::sync::Arc;

use axum::http::{header, HeaderValue, Method};
use propal::api;
use propal::app_state::AppState;
use propal::config::{self, AppConfig};
use propal::llm::OpenAiCompatibleModel;
use propal::tools::knowledge::{InMemoryKnowledgeBase, KnowledgeBase};
use propal::tools::ToolRegistry;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing_subscriber::EnvFilter;

/// Load the nearest `.env`; variables already set in the process win.
fn load_env_file() -> Option<PathBuf> {
    let path = config::find_from_cwd(".env")?;
    match dotenvy::from_path(&path) {
        Ok(()) => Some(path),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable .env file");
            None
        }
    }
}

async fn load_knowledge(config: &AppConfig) -> Arc<dyn KnowledgeBase> {
    let Some(path) = config.knowledge_path.as_deref() else {
        tracing::info!("No knowledge file configured; askKnowledge returns no hits");
        return Arc::new(InMemoryKnowledgeBase::default());
    };
    match InMemoryKnowledgeBase::load(path).await {
        Ok(knowledge) => {
            tracing::info!(path = %path.display(), entries = knowledge.len(), "Knowledge base loaded");
            Arc::new(knowledge)
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to load knowledge base; continuing without it");
            Arc::new(InMemoryKnowledgeBase::default())
        }
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        let origins = origins
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(origin = %origin, "Skipping invalid CORS origin");
                    None
                }
            })
            .collect::<Vec<_>>();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT, header::AUTHORIZATION])
        .max_age(std::time::Duration::from_secs(3600))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Before config so PROPAL_* and the API key can come from .env
    match load_env_file() {
        Some(path) => tracing::info!(path = %path.display(), "Loaded .env for Propal settings"),
        None => tracing::info!("No .env found; PROPAL_* settings come from the process environment"),
    }

    let config = AppConfig::load()?;
    tracing::info!(
        bind_addr = %config.bind_addr,
        model = %config.model.id,
        max_steps = config.max_steps,
        "Starting Propal API server"
    );

    let model = OpenAiCompatibleModel::from_env(
        &config.model.base_url,
        &config.model.id,
        &config.model.api_key_env,
    )?;
    let knowledge = load_knowledge(&config).await;
    let app_state = Arc::new(AppState::new(
        Arc::new(model),
        ToolRegistry::for_server(knowledge),
        config.max_steps,
    )
    .with_max_sessions(config.max_sessions));

    let api_state = api::ApiState { app_state };
    let app = api::router()
        .with_state(api_state)
        .layer(cors_layer(&config.cors_origins));

    let listener = TcpListener::bind(config.bind_addr).await?;
    tracing::info!("Listening on http://{}", config.bind_addr);
    axum::serve(listener, app).await?;
    Ok(())
}
