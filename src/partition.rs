//! Splitting a label set into the three waste categories.

use crate::category::{Category, CategoryTable};
use crate::detect::{DetectionSet, Label};

/// Labels grouped by category. Labels without a category are absent.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Partition {
    pub recyclable: DetectionSet,
    pub non_recyclable: DetectionSet,
    pub hazardous: DetectionSet,
}

impl Partition {
    pub fn get(&self, category: Category) -> &DetectionSet {
        match category {
            Category::Recyclable => &self.recyclable,
            Category::NonRecyclable => &self.non_recyclable,
            Category::Hazardous => &self.hazardous,
        }
    }

    fn get_mut(&mut self, category: Category) -> &mut DetectionSet {
        match category {
            Category::Recyclable => &mut self.recyclable,
            Category::NonRecyclable => &mut self.non_recyclable,
            Category::Hazardous => &mut self.hazardous,
        }
    }

    pub fn is_empty(&self) -> bool {
        Category::ALL.iter().all(|c| self.get(*c).is_empty())
    }

    /// Number of categorised labels.
    pub fn len(&self) -> usize {
        Category::ALL.iter().map(|c| self.get(*c).len()).sum()
    }
}

/// Partition `labels` with `table`. Total and deterministic.
pub fn partition<'a, I>(table: &CategoryTable, labels: I) -> Partition
where
    I: IntoIterator<Item = &'a Label>,
{
    let mut out = Partition::default();
    for label in labels {
        if let Some(category) = table.category_of(label) {
            out.get_mut(category).insert(label.clone());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::CategoryLists;

    fn set(labels: &[&str]) -> DetectionSet {
        labels.iter().map(|l| l.to_string()).collect()
    }

    #[test]
    fn battery_is_hazardous_only() {
        let p = partition(&CategoryTable::default(), &set(&["battery"]));
        assert_eq!(p.hazardous, set(&["battery"]));
        assert!(p.recyclable.is_empty());
        assert!(p.non_recyclable.is_empty());
    }

    #[test]
    fn unknown_label_yields_empty_partition() {
        let p = partition(&CategoryTable::default(), &set(&["unknown_item"]));
        assert!(p.is_empty());
        assert_eq!(p, Partition::default());
    }

    #[test]
    fn buckets_are_disjoint_and_cover_known_labels() {
        let table = CategoryTable::default();
        let lists = CategoryLists::default();
        let mut input: DetectionSet = lists
            .recyclable
            .iter()
            .chain(&lists.non_recyclable)
            .chain(&lists.hazardous)
            .cloned()
            .collect();
        input.insert("unknown_item".into());
        input.insert("plastic bottle".into());

        // Every subset drawn by a simple stride must partition cleanly.
        let all: Vec<&Label> = input.iter().collect();
        for stride in 1..=5 {
            for offset in 0..stride {
                let subset: DetectionSet =
                    all.iter().skip(offset).step_by(stride).map(|l| (*l).clone()).collect();
                let p = partition(&table, &subset);

                assert!(p.recyclable.is_disjoint(&p.non_recyclable));
                assert!(p.recyclable.is_disjoint(&p.hazardous));
                assert!(p.non_recyclable.is_disjoint(&p.hazardous));

                let union: DetectionSet = Category::ALL
                    .iter()
                    .flat_map(|c| p.get(*c).iter().cloned())
                    .collect();
                let known: DetectionSet = subset
                    .iter()
                    .filter(|l| table.category_of(l).is_some())
                    .cloned()
                    .collect();
                assert_eq!(union, known);
                assert_eq!(p.len(), known.len());
            }
        }
    }
}
