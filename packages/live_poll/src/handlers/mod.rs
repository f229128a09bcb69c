pub mod health;
pub mod participants;
pub mod websocket;

// Re-export all handlers for easy route registration
pub use health::{health_handler, health_live_handler, metrics_handler};
pub use participants::participants_handler;
pub use websocket::poll_websocket_handler;
