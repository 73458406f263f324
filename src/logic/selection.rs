use itertools::Itertools;
use std::collections::HashSet;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

/// Called with the id that was just expanded
pub type ExpandHook<K> = Arc<dyn Fn(&K) + Send + Sync>;

/// Per-list selection and expansion flags.
///
/// The two sets are independent: an id can be selected without being
/// expanded and the other way round. Iteration order of the sets means
/// nothing; render order comes from the source list (see [`selected_in`]).
///
/// [`selected_in`]: SelectionStore::selected_in
pub struct SelectionStore<K> {
    selected: HashSet<K>,
    expanded: HashSet<K>,
    on_expand: Option<ExpandHook<K>>,
}

impl<K: Eq + Hash + Clone> SelectionStore<K> {
    pub fn new() -> Self {
        Self {
            selected: HashSet::new(),
            expanded: HashSet::new(),
            on_expand: None,
        }
    }

    /// `on_expand` runs every time an id goes from collapsed to expanded.
    /// Caching whatever it loads is the caller's business.
    pub fn with_on_expand(on_expand: impl Fn(&K) + Send + Sync + 'static) -> Self {
        Self {
            on_expand: Some(Arc::new(on_expand)),
            ..Self::new()
        }
    }

    pub fn selected(&self) -> &HashSet<K> {
        &self.selected
    }

    pub fn expanded(&self) -> &HashSet<K> {
        &self.expanded
    }

    pub fn is_selected(&self, id: &K) -> bool {
        self.selected.contains(id)
    }

    pub fn is_expanded(&self, id: &K) -> bool {
        self.expanded.contains(id)
    }

    /// Returns whether `id` is selected afterwards
    pub fn toggle_selected(&mut self, id: K) -> bool {
        if self.selected.remove(&id) {
            false
        } else {
            self.selected.insert(id);
            true
        }
    }

    /// Returns whether `id` is expanded afterwards
    pub fn toggle_expanded(&mut self, id: K) -> bool {
        let expanded = self.flip_expanded(id.clone());
        if expanded {
            if let Some(hook) = &self.on_expand {
                hook(&id);
            }
        }
        expanded
    }

    /// Toggle expansion without running the hook. Callers that keep the
    /// store behind a lock use this together with [`on_expand`] so the hook
    /// runs after the lock is released.
    ///
    /// [`on_expand`]: SelectionStore::on_expand
    pub fn flip_expanded(&mut self, id: K) -> bool {
        if self.expanded.remove(&id) {
            false
        } else {
            self.expanded.insert(id);
            true
        }
    }

    pub fn on_expand(&self) -> Option<ExpandHook<K>> {
        self.on_expand.clone()
    }

    pub fn clear_selected(&mut self) {
        self.selected.clear();
    }

    pub fn select_all<I: IntoIterator<Item = K>>(&mut self, ids: I) {
        self.selected.extend(ids);
    }

    pub fn deselect_all(&mut self) {
        self.selected.clear();
    }

    /// Drop an id from both sets, e.g. after its row was deleted
    pub fn forget(&mut self, id: &K) {
        self.selected.remove(id);
        self.expanded.remove(id);
    }

    /// Keep only ids for which `keep` returns true, in both sets
    pub fn retain(&mut self, mut keep: impl FnMut(&K) -> bool) {
        self.selected.retain(|id| keep(id));
        self.expanded.retain(|id| keep(id));
    }

    /// Back to the freshly mounted state
    pub fn reset(&mut self) {
        self.selected.clear();
        self.expanded.clear();
    }

    /// Selected ids in the order they first appear in `source`
    pub fn selected_in<'a>(&self, source: impl IntoIterator<Item = &'a K>) -> Vec<K>
    where
        K: 'a,
    {
        source
            .into_iter()
            .filter(|id| self.selected.contains(*id))
            .unique()
            .cloned()
            .collect()
    }
}

impl<K: Eq + Hash + Clone> Default for SelectionStore<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: fmt::Debug> fmt::Debug for SelectionStore<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectionStore")
            .field("selected", &self.selected)
            .field("expanded", &self.expanded)
            .field("on_expand", &self.on_expand.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_toggle_selected_twice_is_identity() {
        let mut store = SelectionStore::new();
        store.select_all(["1", "2"]);
        let before = store.selected().clone();

        assert!(store.toggle_selected("3"));
        assert!(!store.toggle_selected("3"));
        assert_eq!(store.selected(), &before);

        assert!(!store.toggle_selected("1"));
        assert!(store.toggle_selected("1"));
        assert_eq!(store.selected(), &before);
    }

    #[test]
    fn test_select_all_is_idempotent() {
        let mut with_duplicates = SelectionStore::new();
        with_duplicates.select_all(["a", "b", "a"]);

        let mut plain = SelectionStore::new();
        plain.select_all(["a", "b"]);
        plain.select_all(["b"]);

        assert_eq!(with_duplicates.selected(), plain.selected());
        assert_eq!(plain.selected().len(), 2);
    }

    #[test]
    fn test_expand_triggers_load_on_every_open() {
        let loads = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&loads);
        let mut store = SelectionStore::with_on_expand(move |id: &u64| sink.lock().push(*id));

        assert!(store.toggle_expanded(12));
        assert_eq!(*loads.lock(), vec![12]);

        // collapsing does not load
        assert!(!store.toggle_expanded(12));
        assert_eq!(loads.lock().len(), 1);

        // reopening loads again
        assert!(store.toggle_expanded(12));
        assert_eq!(*loads.lock(), vec![12, 12]);
    }

    #[test]
    fn test_selection_and_expansion_are_independent() {
        let mut store = SelectionStore::new();
        store.toggle_selected(1);
        store.toggle_expanded(2);

        assert!(store.is_selected(&1) && !store.is_expanded(&1));
        assert!(store.is_expanded(&2) && !store.is_selected(&2));

        store.clear_selected();
        assert!(store.selected().is_empty());
        assert!(store.is_expanded(&2));

        store.select_all([1, 2]);
        store.deselect_all();
        assert!(store.selected().is_empty());
        assert!(store.is_expanded(&2));

        store.reset();
        assert!(store.expanded().is_empty());
    }

    #[test]
    fn test_selected_in_follows_source_order() {
        let mut store = SelectionStore::new();
        store.select_all(["c".to_string(), "a".to_string()]);
        let source = vec!["a".to_string(), "b".to_string(), "c".to_string()];

        assert_eq!(store.selected_in(&source), vec!["a".to_string(), "c".to_string()]);

        let repeated = vec!["c".to_string(), "a".to_string(), "c".to_string()];
        assert_eq!(store.selected_in(&repeated), vec!["c".to_string(), "a".to_string()]);

        store.forget(&"a".to_string());
        assert_eq!(store.selected_in(&source), vec!["c".to_string()]);
    }
}
