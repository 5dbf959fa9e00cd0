use std::time::Instant;

use crate::category::Category;

/// Presentation state of one category slot.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum BucketState {
    #[default]
    Empty,
    Showing {
        /// Normalized labels, sorted.
        labels: Vec<String>,
        expires_at: Instant,
    },
}

impl BucketState {
    pub fn is_empty(&self) -> bool {
        matches!(self, BucketState::Empty)
    }

    pub fn labels(&self) -> &[String] {
        match self {
            BucketState::Empty => &[],
            BucketState::Showing { labels, .. } => labels,
        }
    }
}

/// The three category slots, updated together under one lock.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DisplayBuckets {
    recyclable: BucketState,
    non_recyclable: BucketState,
    hazardous: BucketState,
}

impl DisplayBuckets {
    pub fn get(&self, category: Category) -> &BucketState {
        match category {
            Category::Recyclable => &self.recyclable,
            Category::NonRecyclable => &self.non_recyclable,
            Category::Hazardous => &self.hazardous,
        }
    }

    pub(crate) fn set(&mut self, category: Category, state: BucketState) {
        match category {
            Category::Recyclable => self.recyclable = state,
            Category::NonRecyclable => self.non_recyclable = state,
            Category::Hazardous => self.hazardous = state,
        }
    }

    pub(crate) fn clear_all(&mut self) {
        *self = Self::default();
    }

    pub fn is_empty(&self) -> bool {
        Category::ALL.iter().all(|c| self.get(*c).is_empty())
    }
}
