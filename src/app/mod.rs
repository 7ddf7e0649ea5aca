//! Application composition

pub mod state;

pub use state::AppState;
