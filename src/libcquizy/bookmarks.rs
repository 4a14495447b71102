use serde::{Deserialize, Serialize};

/// Question ids marked for later review, in the order they were marked.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookmarkSet {
    ids: Vec<i64>,
}

impl BookmarkSet {
    pub fn contains(&self, id: i64) -> bool {
        self.ids.contains(&id)
    }

    /// Returns whether `id` is bookmarked afterwards.
    pub fn toggle(&mut self, id: i64) -> bool {
        if let Some(position) = self.ids.iter().position(|&existing| existing == id) {
            self.ids.remove(position);
            false
        } else {
            self.ids.push(id);
            true
        }
    }

    pub fn ids(&self) -> &[i64] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
