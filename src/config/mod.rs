//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks, all errors at once)
//!     → site.rs (compile the optional [site] table into a matcher tree)
//!     → WaypointConfig (validated, immutable)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - A site definition that would fail to build is a config error, reported
//!   before anything is resolved

pub mod loader;
pub mod schema;
pub mod site;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{CrawlerConfig, NavigationConfig, ObservabilityConfig, ParamDef, ParamKind, SiteDef, WaypointConfig};
pub use validation::{validate_config, ValidationError};
