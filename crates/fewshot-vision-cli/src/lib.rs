//! Terminal front end for few-shot vision sessions.

pub mod args;
pub mod config;
pub mod oneshot;
pub mod render;
pub mod repl;

pub use args::CategoryArg;
pub use config::{load_config, resolve_config_path};
pub use oneshot::{run_classify, ImageOutcome};
pub use repl::Repl;
