use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Hybrid logical timestamp assigned by the store at write time.
///
/// Combines a physical wall-clock component with a logical counter and a
/// node identifier. The logical counter keeps stamps strictly increasing
/// even when several writes land in the same wall-clock millisecond, which
/// is what makes a delta chain strictly time-ordered.
///
/// Ordering: `physical_ms` → `logical` → `node_id` (total order).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Stamp {
    /// Wall-clock milliseconds since UNIX epoch.
    pub physical_ms: u64,
    /// Logical counter for events at the same physical time.
    pub logical: u32,
    /// Node identifier to break ties between store handles.
    pub node_id: u16,
}

impl Stamp {
    /// Create a new stamp with explicit values.
    pub fn new(physical_ms: u64, logical: u32, node_id: u16) -> Self {
        Self {
            physical_ms,
            logical,
            node_id,
        }
    }

    /// Create a stamp for the current wall-clock time.
    pub fn now(node_id: u16) -> Self {
        let physical_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        Self {
            physical_ms,
            logical: 0,
            node_id,
        }
    }

    /// The zero stamp (before all recorded history).
    pub const fn zero() -> Self {
        Self {
            physical_ms: 0,
            logical: 0,
            node_id: 0,
        }
    }

    /// Returns `true` if this stamp is strictly after `other`.
    pub fn is_after(&self, other: &Self) -> bool {
        self > other
    }

    /// Returns `true` if this stamp is strictly before `other`.
    pub fn is_before(&self, other: &Self) -> bool {
        self < other
    }
}

impl PartialOrd for Stamp {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Stamp {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.physical_ms
            .cmp(&other.physical_ms)
            .then(self.logical.cmp(&other.logical))
            .then(self.node_id.cmp(&other.node_id))
    }
}

impl fmt::Debug for Stamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Stamp({}ms.{}.n{})",
            self.physical_ms, self.logical, self.node_id
        )
    }
}

impl fmt::Display for Stamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.n{}",
            self.physical_ms, self.logical, self.node_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_physical_first() {
        let a = Stamp::new(100, 5, 1);
        let b = Stamp::new(200, 0, 0);
        assert!(a < b);
    }

    #[test]
    fn ordering_logical_second() {
        let a = Stamp::new(100, 1, 9);
        let b = Stamp::new(100, 2, 0);
        assert!(a < b);
    }

    #[test]
    fn ordering_node_id_third() {
        let a = Stamp::new(100, 1, 1);
        let b = Stamp::new(100, 1, 2);
        assert!(a < b);
    }

    #[test]
    fn equal_stamps() {
        let a = Stamp::new(100, 1, 1);
        let b = Stamp::new(100, 1, 1);
        assert_eq!(a, b);
        assert!(!a.is_after(&b));
        assert!(!a.is_before(&b));
    }

    #[test]
    fn now_produces_reasonable_timestamp() {
        let stamp = Stamp::now(0);
        // Should be after 2020-01-01 (1577836800000 ms)
        assert!(stamp.physical_ms > 1_577_836_800_000);
        assert_eq!(stamp.logical, 0);
        assert_eq!(stamp.node_id, 0);
    }

    #[test]
    fn zero_is_smallest() {
        let zero = Stamp::zero();
        let any = Stamp::new(1, 0, 0);
        assert!(zero < any);
    }

    #[test]
    fn serde_roundtrip() {
        let stamp = Stamp::new(1234567890, 42, 7);
        let json = serde_json::to_string(&stamp).unwrap();
        let parsed: Stamp = serde_json::from_str(&json).unwrap();
        assert_eq!(stamp, parsed);
    }

    #[test]
    fn display_format() {
        let stamp = Stamp::new(1000, 5, 3);
        assert_eq!(format!("{stamp}"), "1000.5.n3");
    }
}
