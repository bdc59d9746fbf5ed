//! Persistent set, layered on the map with zero-length values.

use crate::arena::Arena;
use crate::error::Result;
use crate::map::MapHandle;

/// Handle to one version of a persistent hash set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SetHandle {
    map: MapHandle,
}

impl SetHandle {
    /// An empty set.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            map: MapHandle::new(),
        }
    }

    /// Rebuilds a handle from snapshot parts.
    #[must_use]
    pub const fn from_map(map: MapHandle) -> Self {
        Self { map }
    }

    /// The underlying map handle.
    #[must_use]
    pub const fn as_map(&self) -> &MapHandle {
        &self.map
    }

    /// Number of members.
    #[must_use]
    pub const fn len(&self) -> u32 {
        self.map.len()
    }

    /// `true` when the set has no members.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// `true` if `item` is a member.
    #[must_use]
    pub fn contains(&self, a: &Arena, item: &[u8]) -> bool {
        self.map.has(a, item)
    }

    /// Adds `item`, returning the new version's handle.
    pub fn insert(&self, a: &mut Arena, item: &[u8]) -> Result<Self> {
        Ok(Self {
            map: self.map.set(a, item, &[])?,
        })
    }

    /// Removes `item`; an absent item hands the same version back.
    pub fn remove(&self, a: &mut Arena, item: &[u8]) -> Result<Self> {
        Ok(Self {
            map: self.map.delete(a, item)?,
        })
    }

    /// Returns a copy owning its own root reference.
    #[must_use]
    pub fn retain(&self, a: &mut Arena) -> Self {
        Self {
            map: self.map.retain(a),
        }
    }

    /// Drops this handle's root reference.
    pub fn release(self, a: &mut Arena) {
        self.map.release(a);
    }
}

impl Default for SetHandle {
    fn default() -> Self {
        Self::new()
    }
}
