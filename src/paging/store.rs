use crate::model::Identifiable;
use std::collections::HashMap;
use std::sync::Arc;

/// Ordered, ID-deduplicated collection accumulated across pages.
///
/// Insertion order is arrival order. When an incoming item repeats an ID the
/// first occurrence wins, both its position and its value, so a page that
/// overlaps an earlier one cannot clobber a locally edited item.
///
/// Items are held behind an `Arc<Vec<T>>` so renderers can take a snapshot in
/// O(1); mutations go through `Arc::make_mut` and only clone when a snapshot
/// is still alive.
#[derive(Debug, Clone)]
pub struct IncrementalListStore<T> {
    items: Arc<Vec<T>>,
    index: HashMap<String, usize>,
}

impl<T> Default for IncrementalListStore<T> {
    fn default() -> Self {
        Self {
            items: Arc::new(Vec::new()),
            index: HashMap::new(),
        }
    }
}

impl<T: Identifiable + Clone> IncrementalListStore<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    /// Cheap shared view of the current contents.
    pub fn snapshot(&self) -> Arc<Vec<T>> {
        Arc::clone(&self.items)
    }

    pub fn get(&self, id: &str) -> Option<&T> {
        self.index.get(id).and_then(|&i| self.items.get(i))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Replace everything with a fresh page 1.
    pub fn replace_all(&mut self, items: Vec<T>) {
        self.items = Arc::new(Vec::with_capacity(items.len()));
        self.index.clear();
        self.push_new(items);
    }

    /// Append a later page, skipping IDs already present.
    ///
    /// Returns the number of items actually added.
    pub fn append(&mut self, items: Vec<T>) -> usize {
        let before = self.items.len();
        self.push_new(items);
        let added = self.items.len() - before;
        if added == 0 && before > 0 {
            tracing::trace!(len = before, "append added nothing new");
        }
        added
    }

    /// Apply `updater` to the item with `id`.
    ///
    /// Absent IDs are a no-op: the item may have belonged to a page that was
    /// since replaced. The updater must not change the item's ID.
    pub fn update_by_id<F>(&mut self, id: &str, updater: F) -> bool
    where
        F: FnOnce(&mut T),
    {
        let Some(&pos) = self.index.get(id) else {
            return false;
        };
        let items = Arc::make_mut(&mut self.items);
        if let Some(item) = items.get_mut(pos) {
            updater(item);
            debug_assert_eq!(item.id(), id, "updater must not change the item id");
            true
        } else {
            false
        }
    }

    /// Remove the item with `id`, if present.
    pub fn remove_by_id(&mut self, id: &str) -> Option<T> {
        let pos = self.index.remove(id)?;
        let items = Arc::make_mut(&mut self.items);
        let removed = items.remove(pos);
        for slot in self.index.values_mut() {
            if *slot > pos {
                *slot -= 1;
            }
        }
        Some(removed)
    }

    /// Drop everything, e.g. when the controller's identity changes.
    pub fn clear(&mut self) {
        self.items = Arc::new(Vec::new());
        self.index.clear();
    }

    fn push_new(&mut self, incoming: Vec<T>) {
        let items = Arc::make_mut(&mut self.items);
        items.reserve(incoming.len());
        for item in incoming {
            if self.index.contains_key(item.id()) {
                tracing::debug!(id = item.id(), "skipping duplicate item");
                continue;
            }
            self.index.insert(item.id().to_owned(), items.len());
            items.push(item);
        }
    }
}
