pub mod api_docs;
pub mod auth;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;

pub use config::{Config, RegistryBackend};
pub use error::{ApiError, ApiResult};
pub use routes::create_app;
pub use state::AppState;
