//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML) or ProfilerConfig::default()
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ProfilerConfig (validated)
//!     → moved into the Profiler by ProfilerBuilder::build
//! ```
//!
//! # Design Decisions
//! - Config is immutable once the profiler is built
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{ObservabilityConfig, ProfilerConfig};
pub use validation::{validate_config, ValidationError};
