use anyhow::Result;
use std::net::SocketAddr;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cotletter::completion::CompletionService;
use cotletter::config::Config;
use cotletter::llm_client::LlmClient;
use cotletter::routes::build_router;
use cotletter::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("cotletter={}", &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Cotletter API v{}", env!("CARGO_PKG_VERSION"));

    let llm = LlmClient::new(config.llm_settings())?;
    if llm.is_configured() {
        info!("LLM client initialized (model: {})", llm.model());
    } else {
        info!("OPENAI_API_KEY not set; letters will use the template");
    }

    let state = AppState {
        completion: CompletionService::new(llm),
        config: config.clone(),
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: tighten CORS in production

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
