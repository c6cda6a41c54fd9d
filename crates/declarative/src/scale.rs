//! Ordering of process scaling operations.

use std::collections::BTreeMap;

/// Scheduler process type, scaled after everything else because the jobs it
/// enqueues need the other process types running.
pub const CLOCK_PROCESS: &str = "clock";

/// Process types in apply order: name order, with `clock` moved last.
pub fn scale_order(scale: &BTreeMap<String, u32>) -> Vec<(String, u32)> {
    let (clock, mut ordered): (Vec<_>, Vec<_>) = scale
        .iter()
        .map(|(process, count)| (process.clone(), *count))
        .partition(|(process, _)| process == CLOCK_PROCESS);
    ordered.extend(clock);
    ordered
}
