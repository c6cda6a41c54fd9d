//! # appconfig
//!
//! Layered configuration for a fleet of application environments.
//!
//! Settings are declared once globally (`all`), optionally overridden per
//! application, and again per application environment. The resolver merges
//! those layers into a [`ResolvedAppSettings`] for one [`AppEnvKey`]:
//!
//! - hash categories (`config`, `scale`, `hooks`) merge right-biased
//! - list categories (`addons`, `collaborators`, `domains`) concatenate and
//!   deduplicate, add-ons by name with the last tier winning
//! - scalar categories (`stacks`, `region`) take the most specific value
//!
//! ## Example
//!
//! ```no_run
//! use appconfig::{AppEnvKey, ConfigSources};
//! use std::path::Path;
//!
//! let config = ConfigSources::from_root(Path::new(".")).load()?;
//! let key: AppEnvKey = "awesomeapp:staging".parse()?;
//! let settings = config.resolve(&key)?;
//! println!("{} -> {}", key, settings.remote_name);
//! # Ok::<(), appconfig::ConfigError>(())
//! ```

pub mod error;
pub mod key;
pub mod layered;
pub mod loader;
pub mod resolved;

pub use error::{ConfigError, Result};
pub use key::AppEnvKey;
pub use layered::{Category, LayeredConfig};
pub use loader::ConfigSources;
pub use resolved::{AddonSpec, ResolvedAppSettings};
