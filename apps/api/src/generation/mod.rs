// Letter generation: template fallback, request validation, prompt text and the
// HTTP handlers that tie them to the completion service.
// All model calls go through llm_client via the completion service.

pub mod handlers;
pub mod prompts;
pub mod template;
pub mod validation;
