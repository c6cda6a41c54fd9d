//! # Declarative
//!
//! Reconciliation primitives: compare the desired state of a remote app with
//! what was observed and compute the smallest set of changes.
//!
//! Everything here is pure. Callers fetch remote state, call into this
//! crate, then issue one remote call per element of the result.
//!
//! - [`delta`]: add/remove sets for collaborators, add-ons and domains
//! - [`config_delta`]: key/value variant with a deletion marker
//! - [`ensure_database_addon`], [`pin_untiered_addons`]: add-on policy applied before diffing
//! - [`scale_order`]: process scaling order
//!
//! ## Example
//!
//! ```
//! use declarative::delta_of;
//!
//! let d = delta_of(["a@example.com", "b@example.com"], ["b@example.com", "c@example.com"]);
//! assert!(d.to_add.contains("a@example.com"));
//! assert!(d.to_remove.contains("c@example.com"));
//! ```

pub mod config_vars;
pub mod delta;
pub mod policy;
pub mod scale;

pub use config_vars::{ConfigDelta, DELETE_MARKER, config_delta, render_assignment};
pub use delta::{Delta, delta, delta_of};
pub use policy::{
    DEFAULT_DATABASE_ADDON, ensure_database_addon, is_database_addon, pin_untiered_addons,
};
pub use scale::{CLOCK_PROCESS, scale_order};
