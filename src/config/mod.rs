//! Resource definitions, registration loading, and process settings.

pub mod types;
pub mod loader;
pub mod settings;

pub use types::*;
pub use loader::*;
pub use settings::*;
