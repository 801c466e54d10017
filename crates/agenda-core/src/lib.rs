pub mod config;
pub mod error;

pub use config::AgendaConfig;
pub use error::{AgendaError, Result};
