//! Shared tracing bootstrap for the workspace binaries.

mod subscriber;

pub use subscriber::{init as init_tracing, init_with as init_tracing_with, level_from_verbosity};
pub use tracing::level_filters::LevelFilter;
