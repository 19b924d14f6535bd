//! Group/pair collection
//!
//! Owns every record of one grouping scheme. Names are unique across groups
//! and pairs, and insertion order is kept for display.

use muse_foundation::{Error, GroupSpec, PairSpec, Result};
use tracing::debug;

use crate::record::{DerivedSlots, GroupRecord, PairRecord};

/// A record held by the collection
#[derive(Debug)]
pub enum GroupingEntry<T> {
    Group(GroupRecord<T>),
    Pair(PairRecord<T>),
}

impl<T> GroupingEntry<T> {
    pub fn name(&self) -> &str {
        match self {
            GroupingEntry::Group(g) => g.name(),
            GroupingEntry::Pair(p) => p.name(),
        }
    }

    pub fn as_slots(&self) -> &dyn DerivedSlots<T> {
        match self {
            GroupingEntry::Group(g) => g,
            GroupingEntry::Pair(p) => p,
        }
    }

    pub fn as_slots_mut(&mut self) -> &mut dyn DerivedSlots<T> {
        match self {
            GroupingEntry::Group(g) => g,
            GroupingEntry::Pair(p) => p,
        }
    }
}

/// All groups and pairs of the current grouping scheme
#[derive(Debug)]
pub struct GroupPairCollection<T> {
    entries: Vec<GroupingEntry<T>>,
}

impl<T> Default for GroupPairCollection<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T> GroupPairCollection<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a configured grouping scheme
    pub fn from_specs(groups: &[GroupSpec], pairs: &[PairSpec]) -> Result<Self> {
        let mut collection = Self::new();
        collection.reset(groups, pairs)?;
        Ok(collection)
    }

    /// Replace the whole scheme; every derived entity is dropped
    ///
    /// On error the collection is left empty rather than half-built.
    pub fn reset(&mut self, groups: &[GroupSpec], pairs: &[PairSpec]) -> Result<()> {
        self.entries.clear();

        let result = self.populate(groups, pairs);
        if result.is_err() {
            self.entries.clear();
        } else {
            debug!(
                groups = groups.len(),
                pairs = pairs.len(),
                "Reset grouping scheme"
            );
        }
        result
    }

    // ========================================================================
    // Mutation
    // ========================================================================

    pub fn add_group(&mut self, group: GroupRecord<T>) -> Result<()> {
        self.ensure_unique(group.name())?;
        self.entries.push(GroupingEntry::Group(group));
        Ok(())
    }

    /// Add a pair; both referenced groups must already exist
    pub fn add_pair(&mut self, pair: PairRecord<T>) -> Result<()> {
        self.ensure_unique(pair.name())?;
        for group in [pair.forward_group(), pair.backward_group()] {
            if self.group(group).is_err() {
                return Err(Error::NotFound(format!(
                    "group {group:?} referenced by pair {:?}",
                    pair.name()
                )));
            }
        }
        self.entries.push(GroupingEntry::Pair(pair));
        Ok(())
    }

    /// Remove a record; a group still used by a pair cannot be removed
    pub fn remove(&mut self, name: &str) -> Result<GroupingEntry<T>> {
        let index = self
            .position(name)
            .ok_or_else(|| Error::NotFound(name.to_string()))?;

        if let GroupingEntry::Group(_) = self.entries[index] {
            if let Some(pair) = self.pairs().find(|p| p.references(name)) {
                return Err(Error::InUse {
                    name: name.to_string(),
                    by: format!("pair {}", pair.name()),
                });
            }
        }

        Ok(self.entries.remove(index))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    // ========================================================================
    // Lookup
    // ========================================================================

    pub fn get(&self, name: &str) -> Option<&GroupingEntry<T>> {
        self.entries.iter().find(|e| e.name() == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut GroupingEntry<T>> {
        self.entries.iter_mut().find(|e| e.name() == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn group(&self, name: &str) -> Result<&GroupRecord<T>> {
        match self.get(name) {
            Some(GroupingEntry::Group(g)) => Ok(g),
            _ => Err(Error::NotFound(format!("group {name:?}"))),
        }
    }

    pub fn group_mut(&mut self, name: &str) -> Result<&mut GroupRecord<T>> {
        match self.get_mut(name) {
            Some(GroupingEntry::Group(g)) => Ok(g),
            _ => Err(Error::NotFound(format!("group {name:?}"))),
        }
    }

    pub fn pair(&self, name: &str) -> Result<&PairRecord<T>> {
        match self.get(name) {
            Some(GroupingEntry::Pair(p)) => Ok(p),
            _ => Err(Error::NotFound(format!("pair {name:?}"))),
        }
    }

    pub fn pair_mut(&mut self, name: &str) -> Result<&mut PairRecord<T>> {
        match self.get_mut(name) {
            Some(GroupingEntry::Pair(p)) => Ok(p),
            _ => Err(Error::NotFound(format!("pair {name:?}"))),
        }
    }

    /// The slot storage of any record, group or pair
    pub fn slots(&self, name: &str) -> Result<&dyn DerivedSlots<T>> {
        self.get(name)
            .map(GroupingEntry::as_slots)
            .ok_or_else(|| Error::NotFound(name.to_string()))
    }

    pub fn slots_mut(&mut self, name: &str) -> Result<&mut dyn DerivedSlots<T>> {
        self.get_mut(name)
            .map(GroupingEntry::as_slots_mut)
            .ok_or_else(|| Error::NotFound(name.to_string()))
    }

    // ========================================================================
    // Iteration (insertion order)
    // ========================================================================

    pub fn groups(&self) -> impl Iterator<Item = &GroupRecord<T>> {
        self.entries.iter().filter_map(|e| match e {
            GroupingEntry::Group(g) => Some(g),
            GroupingEntry::Pair(_) => None,
        })
    }

    pub fn pairs(&self) -> impl Iterator<Item = &PairRecord<T>> {
        self.entries.iter().filter_map(|e| match e {
            GroupingEntry::Pair(p) => Some(p),
            GroupingEntry::Group(_) => None,
        })
    }

    pub fn group_names(&self) -> Vec<String> {
        self.groups().map(|g| g.name().to_string()).collect()
    }

    pub fn pair_names(&self) -> Vec<String> {
        self.pairs().map(|p| p.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Detector ids in `1..=num_detectors` that belong to no group
    pub fn detectors_excluded(&self, num_detectors: u32) -> Vec<u32> {
        (1..=num_detectors)
            .filter(|id| !self.groups().any(|g| g.detectors().binary_search(id).is_ok()))
            .collect()
    }

    fn populate(&mut self, groups: &[GroupSpec], pairs: &[PairSpec]) -> Result<()> {
        for g in groups {
            self.add_group(GroupRecord::new(&g.name, g.detectors.clone()))?;
        }
        for p in pairs {
            self.add_pair(PairRecord::new(&p.name, &p.forward, &p.backward, p.alpha)?)?;
        }
        Ok(())
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.name() == name)
    }

    fn ensure_unique(&self, name: &str) -> Result<()> {
        if self.contains(name) {
            Err(Error::DuplicateName(name.to_string()))
        } else {
            Ok(())
        }
    }
}
