//! HTTP surface over the orchestration engine

pub mod context;
pub mod health;
pub mod router;
pub mod state;

pub use router::{build_protected_routes, build_public_routes, build_router};
pub use state::{AppState, SharedState};
