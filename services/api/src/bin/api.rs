//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{
        InMemorySessionStore, KakaoOAuthAdapter, OpenAiStoryAdapter, PlaceholderFilters,
        TemplateStoryAdapter,
    },
    config::{Config, StoryBackend},
    error::ApiError,
    web::{self, rest::ApiDoc, state::AppState},
};
use async_openai::{config::OpenAIConfig, Client};
use axum::{
    http::{
        header::{ACCEPT, CONTENT_TYPE},
        HeaderValue, Method,
    },
    Router,
};
use restoration_core::ports::StoryGenerationService;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Initialize Service Adapters ---
    let oauth = Arc::new(KakaoOAuthAdapter::new(config.kakao.clone())?);
    let filters = Arc::new(PlaceholderFilters::default());
    let sessions = Arc::new(InMemorySessionStore::new());

    let stories: Arc<dyn StoryGenerationService> = match config.story_backend {
        StoryBackend::Template => {
            info!("Stories are written from the built-in template.");
            Arc::new(TemplateStoryAdapter::new())
        }
        StoryBackend::OpenAi => {
            let api_key = config
                .openai_api_key
                .as_ref()
                .ok_or_else(|| ApiError::Internal("OPENAI_API_KEY is required".to_string()))?;
            let client = Client::with_config(OpenAIConfig::new().with_api_key(api_key));
            info!("Stories are written by the '{}' model.", config.story_model);
            Arc::new(OpenAiStoryAdapter::new(client, config.story_model.clone()))
        }
    };

    if !config.samples_path.join(web::preview::BEFORE_SAMPLE).exists() {
        warn!(
            "No sample images found in {}; /preview will fail.",
            config.samples_path.display()
        );
    }

    // --- 3. Build the Shared AppState ---
    let app_state = Arc::new(AppState::new(
        config.clone(),
        sessions,
        oauth,
        filters,
        stories,
    ));

    // --- 4. Create the Web Router ---
    let allowed_origin = config.cors_origin.parse::<HeaderValue>().map_err(|e| {
        ApiError::Internal(format!(
            "Invalid CORS origin '{}': {}",
            config.cors_origin, e
        ))
    })?;
    let cors = CorsLayer::new()
        .allow_origin(allowed_origin)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE, ACCEPT]);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(web::router(app_state).layer(cors))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 5. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
