//! Load-speed ranking.

use std::cmp::Ordering;

use crate::item::VodItem;

/// Sort by ascending average load time.
///
/// Items with at least one sample come first. Items without samples go last
/// and keep their relative order, since there is nothing to rank them by.
pub fn rank_by_load_speed(items: &mut [VodItem]) {
    items.sort_by(|a, b| match (a.sample_count > 0, b.sample_count > 0) {
        (true, true) => a.avg_speed_ms.total_cmp(&b.avg_speed_ms),
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => Ordering::Equal,
    });
}
