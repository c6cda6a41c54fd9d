//! Config-variable reconciliation.
//!
//! A variant of [`delta`](crate::delta::delta) over key/value pairs:
//!
//! - a desired value equal to [`DELETE_MARKER`] removes the key, but only
//!   when the remote still has it
//! - a desired value equal to the remote value is a no-op
//! - anything else is set (added or updated)

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Desired value meaning "remove this variable from the remote app".
pub const DELETE_MARKER: &str = "DELETE";

/// Width the key column is right-aligned to when rendering assignments.
const KEY_WIDTH: usize = 25;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConfigDelta {
    /// Variables to add or update, with their new values
    pub to_set: BTreeMap<String, String>,
    /// Variables to delete from the remote
    pub to_remove: BTreeSet<String>,
}

impl ConfigDelta {
    pub fn is_empty(&self) -> bool {
        self.to_set.is_empty() && self.to_remove.is_empty()
    }
}

pub fn config_delta(
    desired: &BTreeMap<String, String>,
    observed: &BTreeMap<String, String>,
) -> ConfigDelta {
    let mut delta = ConfigDelta::default();

    for (key, value) in desired {
        let remote = observed.get(key);
        if value == DELETE_MARKER {
            if remote.is_some() {
                delta.to_remove.insert(key.clone());
            }
        } else if remote != Some(value) {
            delta.to_set.insert(key.clone(), value.clone());
        }
    }

    delta
}

/// Render `KEY = value` for display, one entry per output line.
///
/// Continuation lines of multi-line values are indented under the first.
pub fn render_assignment(key: &str, value: &str) -> Vec<String> {
    let mut lines = value.lines();
    let first = lines.next().unwrap_or_default();

    let mut rendered = vec![format!("{key:>width$} = {first}", width = KEY_WIDTH)];
    let indent = " ".repeat(KEY_WIDTH.max(key.len()) + 3);
    rendered.extend(lines.map(|line| format!("{indent}{line}")));
    rendered
}
