pub mod auth;
pub mod connections;
pub mod dashboard;
pub mod error;
pub mod goals;
pub mod history;
pub mod middleware;
pub mod routes;
pub mod social;
pub mod state;
pub mod uploads;

pub use error::ApiError;
pub use routes::build_router;
pub use state::{AppState, AppStateInner};
