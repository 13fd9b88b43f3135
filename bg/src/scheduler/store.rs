//! WorkItemStore - insertion-ordered item storage
//!
//! Pure data: the store has no scheduling behavior, only the mutation
//! primitives the scheduler actor uses. It is owned by a single task, so
//! every transition is atomic with respect to other readers.

use std::collections::HashMap;

use tracing::debug;

use crate::domain::{GenerationRequest, WorkItem, WorkItemId, WorkState, WorkStatus};

#[derive(Debug, Default)]
pub struct WorkItemStore {
    /// Items in insertion order
    items: Vec<WorkItem>,

    /// id -> position in `items`
    index: HashMap<WorkItemId, usize>,
}

impl WorkItemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new Queued item and return its id
    pub fn enqueue(&mut self, request: GenerationRequest) -> WorkItemId {
        let mut item = WorkItem::new(request);
        // Ids are time-ordered UUIDs; regenerate on collision
        while self.index.contains_key(&item.id) {
            item.id = WorkItemId::new();
        }
        let id = item.id;
        debug!(%id, "WorkItemStore::enqueue: called");
        self.index.insert(id, self.items.len());
        self.items.push(item);
        id
    }

    pub fn get(&self, id: &WorkItemId) -> Option<&WorkItem> {
        self.index.get(id).map(|&pos| &self.items[pos])
    }

    /// All items in insertion order
    pub fn list_all(&self) -> &[WorkItem] {
        &self.items
    }

    /// Items with the given status, in insertion order
    pub fn list_by_status(&self, status: WorkStatus) -> impl Iterator<Item = &WorkItem> {
        self.items.iter().filter(move |item| item.status() == status)
    }

    pub fn count(&self, status: WorkStatus) -> usize {
        self.list_by_status(status).count()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Move an item to `to` if its current status is one of `from`
    ///
    /// Anything else (unknown id, status outside `from`) leaves the store
    /// untouched. Returns whether the transition was applied.
    pub fn transition(&mut self, id: &WorkItemId, from: &[WorkStatus], to: WorkState) -> bool {
        let Some(&pos) = self.index.get(id) else {
            debug!(%id, "WorkItemStore::transition: unknown id");
            return false;
        };
        let item = &mut self.items[pos];
        let current = item.status();
        if !from.contains(&current) {
            debug!(%id, %current, to = %to.status(), "WorkItemStore::transition: status not in from set, skipping");
            return false;
        }
        debug!(%id, %current, to = %to.status(), "WorkItemStore::transition: applied");
        item.apply(to);
        true
    }
}
