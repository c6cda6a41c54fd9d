use chrono::{DateTime, Utc};
use colored::Colorize;

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

// ============================================================================
// Key/value tables
// ============================================================================

/// Rows of `key: value` with keys padded to a common width.
///
/// Multi-valued rows print one value per line, aligned under the first.
/// Empty rows are skipped.
#[derive(Debug, Default)]
pub struct Table {
    rows: Vec<(String, Vec<String>)>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn row(&mut self, key: &str, value: impl Into<String>) -> &mut Self {
        self.rows.push((key.to_string(), vec![value.into()]));
        self
    }

    pub fn optional(&mut self, key: &str, value: Option<impl Into<String>>) -> &mut Self {
        if let Some(value) = value {
            self.row(key, value);
        }
        self
    }

    pub fn list(&mut self, key: &str, values: impl IntoIterator<Item = String>) -> &mut Self {
        let mut values: Vec<String> = values.into_iter().collect();
        values.sort();
        self.rows.push((key.to_string(), values));
        self
    }

    pub fn render(&self) -> Vec<String> {
        let width = self
            .rows
            .iter()
            .map(|(key, _)| key.chars().count() + 2)
            .max()
            .unwrap_or(0);

        let mut lines = Vec::new();
        for (key, values) in &self.rows {
            let Some((first, rest)) = values.split_first() else {
                continue;
            };
            lines.push(format!("{:<width$}{first}", format!("{key}: ")));
            for value in rest {
                lines.push(format!("{:width$}{value}", ""));
            }
        }
        lines
    }
}

// ============================================================================
// Formatting
// ============================================================================

const KB: u64 = 1024;
const MB: u64 = KB * 1024;
const GB: u64 = MB * 1024;

/// Format bytes as human-readable size
pub fn format_size(bytes: u64) -> String {
    if bytes == 0 {
        "(empty)".to_string()
    } else if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}

/// Format a timestamp with its age relative to `now`.
pub fn format_timestamp(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let age = now.signed_duration_since(at);
    let relative = if age.num_days() > 0 {
        format!("{}d ago", age.num_days())
    } else if age.num_hours() > 0 {
        format!("{}h ago", age.num_hours())
    } else if age.num_minutes() > 0 {
        format!("{}m ago", age.num_minutes())
    } else {
        "just now".to_string()
    };
    format!("{} ({relative})", at.format("%Y-%m-%d %H:%M UTC"))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "(empty)");
        assert_eq!(format_size(100), "100 B");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(1024 * 1024 * 100), "100.0 MB");
        assert_eq!(format_size(1024 * 1024 * 1024 * 2 + 1024 * 1024 * 512), "2.5 GB");
    }

    #[test]
    fn test_format_timestamp() {
        let at = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let now = Utc.with_ymd_and_hms(2024, 1, 5, 3, 4, 5).unwrap();
        assert_eq!(format_timestamp(at, now), "2024-01-02 03:04 UTC (3d ago)");
        assert_eq!(format_timestamp(at, at), "2024-01-02 03:04 UTC (just now)");
    }

    #[test]
    fn test_table_alignment() {
        let mut table = Table::new();
        table
            .row("Git URL", "https://git.heroku.com/demo.git")
            .list(
                "Addons",
                vec!["redis:mini".to_string(), "heroku-postgresql:essential-0".to_string()],
            )
            .list("Collaborators", Vec::new())
            .optional("Region", None::<String>);

        assert_eq!(
            table.render(),
            vec![
                "Git URL:       https://git.heroku.com/demo.git",
                "Addons:        heroku-postgresql:essential-0",
                "               redis:mini",
            ]
        );
    }
}
