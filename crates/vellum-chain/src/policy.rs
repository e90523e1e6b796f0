use vellum_types::VersionTag;

use crate::records::DeltaKind;

/// Decides whether the next content-bearing chain entry is a full snapshot
/// or an incremental patch.
///
/// The count of entries since the last snapshot is read off the minor
/// component of the current version; no separate counter is stored. Every
/// `interval`-th entry rolls the major component and stores full state,
/// bounding how many patches reconstruction ever has to reverse.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SnapshotPolicy {
    interval: u32,
}

impl SnapshotPolicy {
    pub fn new(interval: u32) -> Self {
        Self { interval }
    }

    /// Kind and version of the next entry, given the live record's current
    /// version. Delete markers bypass this and always advance the minor
    /// component.
    pub fn next(&self, current: VersionTag) -> (DeltaKind, VersionTag) {
        if current.minor + 1 >= self.interval {
            (DeltaKind::Snapshot, current.roll_major())
        } else {
            (DeltaKind::Patch, current.next_minor())
        }
    }
}
