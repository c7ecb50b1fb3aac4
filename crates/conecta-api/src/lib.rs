pub mod admin;
pub mod auth;
pub mod config;
pub mod connections;
pub mod convert;
pub mod error;
pub mod extract;
pub mod interests;
pub mod mailer;
pub mod messages;
pub mod middleware;
pub mod opportunities;
pub mod profiles;
pub mod router;
pub mod state;
pub mod storage;
pub mod templates;
pub mod use_cases;
pub mod validate;

pub use config::AppConfig;
pub use error::{ApiError, ApiResult};
pub use router::build_router;
pub use state::{AppState, AppStateInner};
