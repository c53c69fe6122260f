use std::collections::HashSet;

use serde::Serialize;

/// Insertion-ordered set of selected device ids. Position decides series
/// order and colour, so it is preserved exactly as given.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Selection {
    ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionChange {
    pub selection: Selection,
    /// Newly present ids, in selection order.
    pub added: Vec<String>,
    /// Ids that dropped out, in their previous order.
    pub removed: Vec<String>,
}

impl SelectionChange {
    pub fn is_noop(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

impl Selection {
    /// Builds a selection, keeping the first occurrence of repeated ids.
    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let ids = ids
            .into_iter()
            .map(Into::into)
            .filter(|id: &String| seen.insert(id.clone()))
            .collect();
        Self { ids }
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, device_id: &str) -> bool {
        self.ids.iter().any(|id| id == device_id)
    }

    /// Replaces the whole selection and reports the diff against `self`.
    pub fn replace(&self, next: Selection) -> SelectionChange {
        let added = next
            .ids
            .iter()
            .filter(|id| !self.contains(id))
            .cloned()
            .collect();
        let removed = self
            .ids
            .iter()
            .filter(|id| !next.contains(id))
            .cloned()
            .collect();

        SelectionChange {
            selection: next,
            added,
            removed,
        }
    }

    /// Appends `device_id` unless it is already selected.
    pub fn with(&self, device_id: &str) -> Selection {
        Selection::from_ids(self.ids.iter().map(String::as_str).chain([device_id]))
    }

    pub fn without(&self, device_id: &str) -> Selection {
        Selection {
            ids: self.ids.iter().filter(|id| *id != device_id).cloned().collect(),
        }
    }
}
