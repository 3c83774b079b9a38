use crate::completion::CompletionService;
use crate::config::Config;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub completion: CompletionService,
    pub config: Config,
}
