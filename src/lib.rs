pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::cli::CliConfig;

pub use config::Settings;
pub use core::resource::ResourceClient;
pub use core::transport::{Client, TransportConfig};
pub use utils::error::{Result, TmcError};
