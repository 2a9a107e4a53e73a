//! Shared application state

pub mod state;

pub use state::AppState;
