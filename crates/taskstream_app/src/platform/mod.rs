//! Terminal front end: settings, logging, file storage and the stdin loop.
mod app;
mod logging;
mod persistence;
mod settings;
mod ui;

pub use app::run_app;
