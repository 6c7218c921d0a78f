//! Optimistic local entries that wait for the store to confirm them.
//!
//! A new entry gets a temporary id and shows up right away. When the store
//! answers, the entry either takes the stored id or disappears.

use serde::Serialize;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum EntryKey {
    Tentative(Uuid),
    Confirmed(i64),
}

#[derive(Debug, Clone, Serialize)]
pub struct Entry<T> {
    pub key: EntryKey,
    pub item: T,
}

#[derive(Debug, Clone)]
pub struct PendingList<T> {
    entries: Vec<Entry<T>>,
}

impl<T> Default for PendingList<T> {
    fn default() -> Self {
        PendingList {
            entries: Vec::new(),
        }
    }
}

impl<T> PendingList<T> {
    pub fn from_confirmed(items: impl IntoIterator<Item = (i64, T)>) -> Self {
        PendingList {
            entries: items
                .into_iter()
                .map(|(id, item)| Entry {
                    key: EntryKey::Confirmed(id),
                    item,
                })
                .collect(),
        }
    }

    pub fn add_tentative(&mut self, item: T) -> Uuid {
        let temp_id = Uuid::new_v4();
        self.entries.push(Entry {
            key: EntryKey::Tentative(temp_id),
            item,
        });
        temp_id
    }

    fn position(&self, temp_id: Uuid) -> AppResult<usize> {
        self.entries
            .iter()
            .position(|entry| entry.key == EntryKey::Tentative(temp_id))
            .ok_or_else(|| AppError::NotFound {
                entity: "tentative entry".to_string(),
                id: temp_id.to_string(),
            })
    }

    /// Swap the temporary id for the stored one.
    pub fn confirm(&mut self, temp_id: Uuid, id: i64) -> AppResult<&mut T> {
        let idx = self.position(temp_id)?;
        let entry = &mut self.entries[idx];
        entry.key = EntryKey::Confirmed(id);
        Ok(&mut entry.item)
    }

    /// Roll the entry back out.
    pub fn reject(&mut self, temp_id: Uuid) -> AppResult<T> {
        let idx = self.position(temp_id)?;
        Ok(self.entries.remove(idx).item)
    }

    pub fn entries(&self) -> &[Entry<T>] {
        &self.entries
    }

    pub fn items(&self) -> impl Iterator<Item = &T> {
        self.entries.iter().map(|entry| &entry.item)
    }

    pub fn confirmed_items(&self) -> impl Iterator<Item = &T> {
        self.entries
            .iter()
            .filter(|entry| matches!(entry.key, EntryKey::Confirmed(_)))
            .map(|entry| &entry.item)
    }

    pub fn has_pending(&self) -> bool {
        self.entries
            .iter()
            .any(|entry| matches!(entry.key, EntryKey::Tentative(_)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tentative_entry_visible_until_settled() {
        let mut list = PendingList::from_confirmed(vec![(1, "rent")]);
        let temp = list.add_tentative("groceries");
        assert!(list.has_pending());
        assert_eq!(list.items().count(), 2);
        assert_eq!(list.confirmed_items().count(), 1);

        assert_eq!(*list.confirm(temp, 7).unwrap(), "groceries");
        assert!(!list.has_pending());
        assert_eq!(list.entries()[1].key, EntryKey::Confirmed(7));
    }

    #[test]
    fn reject_removes_entry() {
        let mut list = PendingList::default();
        let temp = list.add_tentative(10);
        assert_eq!(list.reject(temp).unwrap(), 10);
        assert_eq!(list.items().count(), 0);
    }

    #[test]
    fn settling_twice_fails() {
        let mut list = PendingList::default();
        let temp = list.add_tentative("x");
        list.confirm(temp, 1).unwrap();
        assert!(matches!(list.confirm(temp, 2), Err(AppError::NotFound { .. })));
        assert!(list.reject(temp).is_err());
    }

    #[test]
    fn key_serializes_with_kind() {
        let json = serde_json::to_value(EntryKey::Confirmed(3)).unwrap();
        assert_eq!(json["kind"], "confirmed");
        assert_eq!(json["id"], 3);
    }
}
