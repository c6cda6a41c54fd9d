//! Core types for remote platform resources.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// A remote application.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct App {
    pub name: String,
    /// Git endpoint code is pushed to
    pub git_url: String,
    pub web_url: Option<String>,
    /// Stack currently running
    pub stack: Option<String>,
    /// Stack the next build will use
    pub build_stack: Option<String>,
    pub region: Option<String>,
    pub owner_email: Option<String>,
    pub maintenance: bool,
    /// Repository size in bytes
    pub repo_size: Option<u64>,
    /// Slug size in bytes
    pub slug_size: Option<u64>,
    pub created_at: Option<DateTime<Utc>>,
    pub released_at: Option<DateTime<Utc>>,
}

impl App {
    /// Stack that new releases of the app will run on.
    pub fn effective_stack(&self) -> Option<&str> {
        self.build_stack.as_deref().or(self.stack.as_deref())
    }
}

/// Parameters for creating an app.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NewApp {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

/// An attached add-on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Addon {
    /// Attachment name on the remote (e.g. `postgresql-curved-12345`)
    pub name: String,
    /// Plan identifier as `service:tier`, comparable with desired add-ons
    pub plan: String,
}

/// Instance count for one process type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Formation {
    pub process_type: String,
    pub quantity: u32,
    pub size: Option<String>,
}

/// A one-off process started on the remote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dyno {
    pub name: String,
    pub command: String,
    pub state: Option<String>,
}

/// Options for opening a log stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogOptions {
    /// Keep the stream open for new lines
    pub tail: bool,
    /// Number of historical lines to include
    pub lines: Option<u32>,
    /// Restrict to one process (e.g. `web.1`)
    pub dyno: Option<String>,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            tail: true,
            lines: Some(100),
            dyno: None,
        }
    }
}

/// Live state of one remote app, fetched in one pass.
///
/// Never cached: each reconciliation stage fetches a fresh snapshot
/// because earlier stages may have changed the remote.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RemoteAppSnapshot {
    pub addons: BTreeSet<String>,
    pub collaborators: BTreeSet<String>,
    pub domains: BTreeSet<String>,
    pub config_vars: BTreeMap<String, String>,
    pub stack: Option<String>,
    pub formation: BTreeMap<String, u32>,
}
