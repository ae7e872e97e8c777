use std::collections::BTreeMap;

use tracing::debug;

use checklist_core::FieldViewModel;

/// How the newly active parameter got its fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheLoad {
    Hit,
    Seeded,
}

/// Edited field lists per parameter index, for one editing session.
///
/// The active list is the working copy; every mutation writes it back to its
/// entry wholesale. No eviction: entries live until `invalidate`.
#[derive(Debug, Default)]
pub struct ParameterCache {
    entries: BTreeMap<usize, Vec<FieldViewModel>>,
    active: Option<usize>,
    working: Vec<FieldViewModel>,
}

impl ParameterCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active_index(&self) -> Option<usize> {
        self.active
    }

    pub fn active_fields(&self) -> &[FieldViewModel] {
        &self.working
    }

    pub fn contains(&self, index: usize) -> bool {
        self.entries.contains_key(&index)
    }

    pub fn entry(&self, index: usize) -> Option<&[FieldViewModel]> {
        self.entries.get(&index).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write the working list back to the active entry.
    pub fn persist_active(&mut self) {
        if let Some(index) = self.active {
            self.entries.insert(index, self.working.clone());
        }
    }

    /// Make `index` active. A cached entry is loaded verbatim; otherwise
    /// `seed` derives the list and the entry is created.
    pub fn select<E>(
        &mut self,
        index: usize,
        seed: impl FnOnce() -> Result<Vec<FieldViewModel>, E>,
    ) -> Result<CacheLoad, E> {
        self.persist_active();
        let load = match self.entries.get(&index) {
            Some(fields) => {
                self.working = fields.clone();
                CacheLoad::Hit
            }
            None => {
                let fields = seed()?;
                self.entries.insert(index, fields.clone());
                self.working = fields;
                CacheLoad::Seeded
            }
        };
        self.active = Some(index);
        debug!(index, ?load, fields = self.working.len(), "parameter selected");
        Ok(load)
    }

    /// Create the entry for `index` from `seed` unless one exists. The active
    /// index does not change. Returns whether an entry was created.
    pub fn ensure<E>(
        &mut self,
        index: usize,
        seed: impl FnOnce() -> Result<Vec<FieldViewModel>, E>,
    ) -> Result<bool, E> {
        if self.entries.contains_key(&index) {
            return Ok(false);
        }
        self.entries.insert(index, seed()?);
        Ok(true)
    }

    /// Apply `f` to the working list and overwrite the active entry with the result.
    pub fn mutate_active<R>(&mut self, f: impl FnOnce(&mut Vec<FieldViewModel>) -> R) -> R {
        let result = f(&mut self.working);
        self.persist_active();
        result
    }

    /// Apply `f` to the list of `index`, whether it is the active one or not.
    pub fn update<R>(
        &mut self,
        index: usize,
        f: impl FnOnce(&mut Vec<FieldViewModel>) -> R,
    ) -> Option<R> {
        if self.active == Some(index) {
            return Some(self.mutate_active(f));
        }
        self.entries.get_mut(&index).map(f)
    }

    /// Drop every entry and the working list. Returns the dropped indexes.
    pub fn invalidate(&mut self) -> Vec<usize> {
        let dropped: Vec<usize> = self.entries.keys().copied().collect();
        self.entries.clear();
        self.working.clear();
        self.active = None;
        debug!(?dropped, "parameter cache invalidated");
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use checklist_core::field::TextField;
    use std::convert::Infallible;

    fn text(name: &str, value: &str) -> FieldViewModel {
        FieldViewModel::Text(TextField {
            label: String::new(),
            name: name.into(),
            value: value.into(),
        })
    }

    fn seed(value: &str) -> impl FnOnce() -> Result<Vec<FieldViewModel>, Infallible> + '_ {
        move || Ok(vec![text("note", value)])
    }

    #[test]
    fn edits_survive_back_and_forth() {
        let mut cache = ParameterCache::new();
        assert_eq!(cache.select(0, seed("schema")).unwrap(), CacheLoad::Seeded);
        cache.mutate_active(|fields| fields[0] = text("note", "edited"));

        assert_eq!(cache.select(1, seed("other")).unwrap(), CacheLoad::Seeded);
        assert_eq!(cache.select(0, seed("schema")).unwrap(), CacheLoad::Hit);
        assert_eq!(cache.active_fields(), &[text("note", "edited")]);
    }

    #[test]
    fn update_reaches_inactive_entries() {
        let mut cache = ParameterCache::new();
        cache.select(0, seed("a")).unwrap();
        cache.select(1, seed("b")).unwrap();
        let touched = cache.update(0, |fields| fields[0] = text("note", "fixed"));
        assert!(touched.is_some());
        assert_eq!(cache.entry(0), Some(&[text("note", "fixed")][..]));
        assert!(cache.update(7, |_| ()).is_none());
    }

    #[test]
    fn ensure_seeds_missing_entry_only() {
        let mut cache = ParameterCache::new();
        cache.select(0, seed("a")).unwrap();
        assert!(!cache.ensure(0, seed("ignored")).unwrap());
        assert!(cache.ensure(3, seed("late")).unwrap());
        assert_eq!(cache.entry(3), Some(&[text("note", "late")][..]));
        assert_eq!(cache.active_index(), Some(0));
        assert_eq!(cache.active_fields(), &[text("note", "a")]);
    }

    #[test]
    fn invalidate_reports_dropped_indexes() {
        let mut cache = ParameterCache::new();
        cache.select(2, seed("a")).unwrap();
        cache.select(0, seed("b")).unwrap();
        assert_eq!(cache.invalidate(), vec![0, 2]);
        assert!(cache.is_empty());
        assert_eq!(cache.active_index(), None);
        assert_eq!(cache.select(2, seed("fresh")).unwrap(), CacheLoad::Seeded);
    }
}
