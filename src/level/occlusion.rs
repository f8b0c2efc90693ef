use crate::level_types::Category;

/// Culling data for one instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OcclusionEntry {
    pub spatial_hash: i32,
    pub visibility: i32,
}

/// Three lists positionally aligned with the moby, tie and shrub collections.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OcclusionTable {
    lists: [Vec<OcclusionEntry>; 3],
}

impl OcclusionTable {
    pub fn new(mobys: Vec<OcclusionEntry>, ties: Vec<OcclusionEntry>, shrubs: Vec<OcclusionEntry>) -> Self {
        Self {
            lists: [mobys, ties, shrubs],
        }
    }

    pub fn list(&self, category: Category) -> &[OcclusionEntry] {
        &self.lists[category.index()]
    }

    pub fn list_mut(&mut self, category: Category) -> &mut Vec<OcclusionEntry> {
        &mut self.lists[category.index()]
    }

    pub fn set_list(&mut self, category: Category, entries: Vec<OcclusionEntry>) {
        self.lists[category.index()] = entries;
    }

    pub fn is_empty(&self) -> bool {
        self.lists.iter().all(Vec::is_empty)
    }

    pub fn total_len(&self) -> usize {
        self.lists.iter().map(Vec::len).sum()
    }
}
