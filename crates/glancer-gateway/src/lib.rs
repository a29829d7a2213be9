//! # Glancer gateway
//!
//! A single `POST /api/chat` endpoint that forwards `{prompt}` to the
//! configured LLM provider and returns its answer verbatim. The inference
//! server itself is brought up beforehand by `glancer-supervisor`.

mod config;
mod error;
mod provider;
mod server;

pub use config::{AppConfig, AppConfigBuilder, DEFAULT_HOST, DEFAULT_PORT};
pub use error::GatewayError;
pub use provider::{handle_chat_request, ChatBackend, Provider};
pub use server::{router, run, shutdown_signal, AppState, ChatRequest, SharedState};
