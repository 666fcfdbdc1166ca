use serde::{Deserialize, Serialize};
use slotmap::new_key_type;
use std::fmt;

new_key_type! {
    /// Identifies a node in a per-item flow graph arena.
    pub struct FlowNodeId;

    /// Identifies an edge in a per-item flow graph arena.
    pub struct FlowEdgeId;
}

/// Identifies an item type in the catalog. Ordering follows refinement:
/// `ItemTypeId(0)` is the most basic item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ItemTypeId(pub u32);

/// Identifies a facility in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FacilityId(pub u32);

/// Identifies a transport line in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LineId(pub u32);

impl ItemTypeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl FacilityId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl LineId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ItemTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "item#{}", self.0)
    }
}

impl fmt::Display for FacilityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "facility#{}", self.0)
    }
}

impl fmt::Display for LineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line#{}", self.0)
    }
}

/// The item level a search state is currently validating.
///
/// `Done` sorts immediately below the most basic item and marks a finished
/// plan. Derived ordering gives `Done < Item(0) < Item(1) < ...`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ItemLevel {
    Done,
    Item(ItemTypeId),
}

impl ItemLevel {
    /// The next, more basic level. `Item(0)` steps to `Done`; `Done` stays.
    pub fn next_basic(self) -> ItemLevel {
        match self {
            ItemLevel::Item(ItemTypeId(0)) | ItemLevel::Done => ItemLevel::Done,
            ItemLevel::Item(ItemTypeId(n)) => ItemLevel::Item(ItemTypeId(n - 1)),
        }
    }

    pub fn item(self) -> Option<ItemTypeId> {
        match self {
            ItemLevel::Item(item) => Some(item),
            ItemLevel::Done => None,
        }
    }

    pub fn is_done(self) -> bool {
        matches!(self, ItemLevel::Done)
    }

    /// True when `item` has been or is being validated at this level, i.e.
    /// `item` is at or below this level in the refinement order.
    pub fn covers(self, item: ItemTypeId) -> bool {
        match self {
            ItemLevel::Done => false,
            ItemLevel::Item(current) => item <= current,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_ids_order_by_refinement() {
        assert!(ItemTypeId(0) < ItemTypeId(1));
        assert!(ItemTypeId(3) > ItemTypeId(2));
    }

    #[test]
    fn done_sorts_below_every_item() {
        assert!(ItemLevel::Done < ItemLevel::Item(ItemTypeId(0)));
        assert!(ItemLevel::Item(ItemTypeId(0)) < ItemLevel::Item(ItemTypeId(1)));
    }

    #[test]
    fn next_basic_steps_down_to_done() {
        let level = ItemLevel::Item(ItemTypeId(1));
        assert_eq!(level.next_basic(), ItemLevel::Item(ItemTypeId(0)));
        assert_eq!(level.next_basic().next_basic(), ItemLevel::Done);
        assert_eq!(ItemLevel::Done.next_basic(), ItemLevel::Done);
    }

    #[test]
    fn covers_items_at_or_below() {
        let level = ItemLevel::Item(ItemTypeId(1));
        assert!(level.covers(ItemTypeId(0)));
        assert!(level.covers(ItemTypeId(1)));
        assert!(!level.covers(ItemTypeId(2)));
        assert!(!ItemLevel::Done.covers(ItemTypeId(0)));
    }

    #[test]
    fn ids_are_hashable() {
        use std::collections::HashMap;
        let mut map = HashMap::new();
        map.insert(FacilityId(0), "mine");
        map.insert(FacilityId(1), "furnace");
        assert_eq!(map[&FacilityId(1)], "furnace");
    }
}
