//! # platform
//!
//! Typed access to the remote application platform.
//!
//! The [`Backend`] trait lists every capability the orchestrator needs:
//! apps, add-ons, collaborators, domains, config vars, formation, restarts,
//! one-off commands and log streams. Two implementations ship:
//!
//! - [`HerokuBackend`]: Heroku Platform API v3
//! - [`MemoryBackend`]: in-memory fake that records calls
//!
//! ## Example
//!
//! ```
//! use platform::{Backend, MemoryBackend};
//!
//! let backend = MemoryBackend::new().with_app("awesomeapp-staging");
//! backend.scale("awesomeapp-staging", "web", 2)?;
//! assert_eq!(backend.calls(), vec!["scale awesomeapp-staging web=2"]);
//! # Ok::<(), platform::Error>(())
//! ```

pub mod auth;
pub mod backend;
pub mod error;
pub mod types;

pub use backend::heroku::HerokuBackend;
pub use backend::memory::{ANY_APP, MemoryApp, MemoryBackend};
pub use backend::{Backend, default_backend};
pub use error::{Error, ErrorCategory, Result, ignore_not_found};
pub use types::{Addon, App, Dyno, Formation, LogOptions, NewApp, RemoteAppSnapshot};
