pub mod config;
pub mod handlers;
pub mod middleware;
pub mod observability;
pub mod server;
pub mod state;

pub use config::{AppConfig, LoggingConfig, ServerConfig};
pub use observability::init_tracing;
pub use server::{ServerBuilder, SpiderServer, build_app};
pub use state::AppState;
