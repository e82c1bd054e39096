pub mod app;
pub mod autosave;
pub mod client;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod progression;
pub mod scoring;
pub mod state;
pub mod telemetry;
pub mod ui;

pub use app::router;
pub use autosave::AutosaveCoordinator;
pub use client::GateClient;
pub use config::AppConfig;
pub use scoring::{Rank, ScoreInput, ScoreResult, compute_score};
pub use state::AppState;
