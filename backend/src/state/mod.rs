// State management module
// Handles the application state shared with request handlers

pub mod app_state;

pub use app_state::AppState;
