//! Shared helpers: logging setup, error rendering and config-document loading

pub mod document;
pub mod errors;
pub mod logging;

pub use document::{load_document, DocumentError, DocumentFormat};
pub use errors::render_chain;
pub use logging::{init_default, init_from_env, init_logging, LoggingConfig};
