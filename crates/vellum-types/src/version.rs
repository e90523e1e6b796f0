use std::fmt;

use serde::{Deserialize, Serialize};

/// Two-part revision version carried by live records and delta records.
///
/// `minor` counts chain appends since the last snapshot; `major` rolls when
/// the snapshot policy fires and `minor` resets to zero. A delta record's
/// tag is the version it produces, so it always equals the live record's
/// version immediately after that write. The one exception is creation: the
/// root snapshot is tagged (0,0) while the live record starts at (1,0).
///
/// Ordering is lexicographic: `major` → `minor`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VersionTag {
    pub major: u32,
    pub minor: u32,
}

impl VersionTag {
    /// Create a tag with explicit components.
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// The root snapshot tag (0,0).
    pub const fn root() -> Self {
        Self { major: 0, minor: 0 }
    }

    /// The tag a live record is created with (1,0).
    pub const fn initial() -> Self {
        Self { major: 1, minor: 0 }
    }

    /// Returns `true` for the root snapshot tag.
    pub fn is_root(&self) -> bool {
        self.major == 0 && self.minor == 0
    }

    /// The tag produced by appending a patch or delete marker.
    pub fn next_minor(self) -> Self {
        Self {
            major: self.major,
            minor: self.minor + 1,
        }
    }

    /// The tag produced by a fired snapshot: major advances, minor resets.
    pub fn roll_major(self) -> Self {
        Self {
            major: self.major + 1,
            minor: 0,
        }
    }
}

impl fmt::Debug for VersionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VersionTag({}.{})", self.major, self.minor)
    }
}

impl fmt::Display for VersionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}
