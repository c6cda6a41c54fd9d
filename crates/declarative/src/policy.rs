//! Add-on policy: every app environment carries a database.

use regex::Regex;
use std::sync::LazyLock;

/// Add-on identifiers that provide a database.
static DATABASE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"heroku-postgresql|shared-database|heroku-shared-postgresql|amazon_rds")
        .expect("database pattern is valid")
});

/// Injected when the desired add-ons contain no database.
pub const DEFAULT_DATABASE_ADDON: &str = "heroku-postgresql:essential-0";

pub fn is_database_addon(addon: &str) -> bool {
    DATABASE_PATTERN.is_match(addon)
}

/// Append [`DEFAULT_DATABASE_ADDON`] unless a database add-on is present.
///
/// Returns `true` when the default was injected.
pub fn ensure_database_addon(addons: &mut Vec<String>) -> bool {
    if addons.iter().any(|a| is_database_addon(a)) {
        return false;
    }
    addons.push(DEFAULT_DATABASE_ADDON.to_string());
    true
}

/// Pin tier-less add-ons to the installed plan of the same service.
///
/// A bare `heroku-postgresql` is satisfied by any installed
/// `heroku-postgresql:<tier>`; it takes that plan's identifier so the
/// delta sees it as present on both sides.
pub fn pin_untiered_addons(desired: &mut [String], observed: &[String]) {
    for addon in desired.iter_mut().filter(|a| !a.contains(':')) {
        let installed = observed
            .iter()
            .find(|plan| plan.split_once(':').is_some_and(|(service, _)| service == addon));
        if let Some(plan) = installed {
            addon.clone_from(plan);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_injects_default_database() {
        let mut addons = vec!["papertrail:choklad".to_string()];
        assert!(ensure_database_addon(&mut addons));
        assert_eq!(addons, vec!["papertrail:choklad", DEFAULT_DATABASE_ADDON]);

        // A second pass finds the injected one
        assert!(!ensure_database_addon(&mut addons));
        assert_eq!(addons.len(), 2);
    }

    #[test]
    fn test_existing_database_left_untouched() {
        for db in [
            "heroku-postgresql:standard-0",
            "shared-database:5mb",
            "amazon_rds",
        ] {
            let mut addons = vec![db.to_string(), "mem:50".to_string()];
            assert!(!ensure_database_addon(&mut addons));
            assert_eq!(addons, vec![db.to_string(), "mem:50".to_string()]);
        }
    }

    #[test]
    fn test_empty_list_gets_database() {
        let mut addons = Vec::new();
        assert!(ensure_database_addon(&mut addons));
        assert_eq!(addons, vec![DEFAULT_DATABASE_ADDON]);
    }

    #[test]
    fn test_untiered_addon_takes_installed_plan() {
        let observed = vec![
            "heroku-postgresql:essential-0".to_string(),
            "papertrail:choklad".to_string(),
        ];
        let mut desired = vec![
            "heroku-postgresql".to_string(),
            "papertrail:fixa".to_string(),
            "redis".to_string(),
        ];
        pin_untiered_addons(&mut desired, &observed);
        assert_eq!(
            desired,
            vec!["heroku-postgresql:essential-0", "papertrail:fixa", "redis"]
        );
    }

    #[test]
    fn test_untiered_addon_matches_whole_service_name() {
        let observed = vec!["heroku-postgresql-extra:mini".to_string()];
        let mut desired = vec!["heroku-postgresql".to_string()];
        pin_untiered_addons(&mut desired, &observed);
        assert_eq!(desired, vec!["heroku-postgresql"]);
    }
}
