pub mod app;
pub mod cli;
pub mod download;
pub mod gateway;
pub mod tui;
pub mod ui;
pub mod util;
pub mod view;

pub use app::{config::Config, state::AppState};
