//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML) + environment
//!     → loader.rs (parse, deserialize, apply env overrides)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → handed to the gateway at construction time
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → static backend table swapped wholesale
//! ```
//!
//! # Design Decisions
//! - Config is an explicit value passed to the gateway, never a global
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, resolve_config, ConfigError};
pub use schema::{
    BackendConfig, DiscoveryConfig, DiscoveryMode, GatewayConfig, KeyStrategy, ListenerConfig,
    ObservabilityConfig, RateLimitConfig, RouteConfig, TimeoutConfig,
};
