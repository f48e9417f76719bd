pub mod handlers;
pub mod server;

pub use handlers::AppState;
pub use server::{build_router, build_state, run_server, BackendConfig, EmailConfig, ServerConfig};
