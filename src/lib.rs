// Library surface for the binary, headless/integration tests and reuse.
// Terminal-only types (App, screens) stay in main.rs.
pub mod app_dirs;
pub mod celebration;
pub mod clock;
pub mod config;
pub mod controller;
pub mod detection;
pub mod error;
pub mod labels;
pub mod render_loop;
pub mod runtime;
pub mod scene;
pub mod session;
pub mod tracker;
pub mod word_source;
