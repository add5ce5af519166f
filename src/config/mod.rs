//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! settings file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ResilienceSettings (validated, immutable)
//!     → handed to ResilienceCoordinator
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new settings
//!     → validation.rs validates
//!     → coordinator swaps its defaults atomically
//!     → breakers created afterwards use the new defaults
//! ```
//!
//! # Design Decisions
//! - Settings are immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal files
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, ConfigError};
pub use schema::CacheConfig;
pub use schema::CircuitBreakerConfig;
pub use schema::FallbackConfig;
pub use schema::ObservabilityConfig;
pub use schema::ResilienceSettings;
pub use schema::RetryConfig;
