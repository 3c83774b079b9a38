//! Cover-letter drafting: template letters, streamed model completions and a
//! durable list of generated applications.

pub mod completion;
pub mod config;
pub mod errors;
pub mod generation;
pub mod llm_client;
pub mod models;
pub mod routes;
pub mod session;
pub mod state;
pub mod store;
