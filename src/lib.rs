pub mod api;
pub mod classify;
pub mod config;
pub mod error;
pub mod model;
pub mod refresh;
pub mod source;
pub mod state;
pub mod trend;
pub mod view;
pub mod window;
