pub mod anki;
pub mod cli;
pub mod load_config;
pub mod presence;
pub mod siyuan;

pub use cli::{run, Cli, Commands};
