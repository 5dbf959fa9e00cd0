//! Static label → waste category table.
//!
//! The table is built once at startup from three label lists and is never
//! mutated afterwards. Labels missing from every list have no category and
//! are silently left out of the display.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Waste category of a recognised object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    Recyclable,
    NonRecyclable,
    Hazardous,
}

impl Category {
    /// Display order of the three buckets.
    pub const ALL: [Category; 3] = [
        Category::Recyclable,
        Category::NonRecyclable,
        Category::Hazardous,
    ];

    /// Heading used when rendering a bucket.
    pub fn heading(self) -> &'static str {
        match self {
            Category::Recyclable => "Recyclable items:",
            Category::NonRecyclable => "Non-Recyclable items:",
            Category::Hazardous => "Hazardous items:",
        }
    }

    /// Styling tag handed to the presentation layer.
    pub fn style_tag(self) -> &'static str {
        match self {
            Category::Recyclable => "recyclable",
            Category::NonRecyclable => "non-recyclable",
            Category::Hazardous => "hazardous",
        }
    }

    /// Overlay colour (RGB).
    pub fn color(self) -> [u8; 3] {
        match self {
            Category::Recyclable => [233, 192, 78],
            Category::NonRecyclable => [94, 128, 173],
            Category::Hazardous => [194, 84, 85],
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.style_tag())
    }
}

pub const DEFAULT_RECYCLABLE: &[&str] = &[
    "cardboard_box",
    "can",
    "plastic_bottle_cap",
    "plastic_bottle",
    "reuseable_paper",
];

pub const DEFAULT_NON_RECYCLABLE: &[&str] = &[
    "plastic_bag",
    "scrap_paper",
    "stick",
    "plastic_cup",
    "snack_bag",
    "plastic_box",
    "straw",
    "plastic_cup_lid",
    "scrap_plastic",
    "cardboard_bowl",
    "plastic_cultery",
];

pub const DEFAULT_HAZARDOUS: &[&str] = &[
    "battery",
    "chemical_spray_can",
    "chemical_plastic_bottle",
    "chemical_plastic_gallon",
    "light_bulb",
    "paint_bucket",
];

/// Label lists per category, as supplied by configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryLists {
    pub recyclable: Vec<String>,
    pub non_recyclable: Vec<String>,
    pub hazardous: Vec<String>,
}

impl Default for CategoryLists {
    fn default() -> Self {
        let owned = |labels: &[&str]| labels.iter().map(|l| l.to_string()).collect();
        Self {
            recyclable: owned(DEFAULT_RECYCLABLE),
            non_recyclable: owned(DEFAULT_NON_RECYCLABLE),
            hazardous: owned(DEFAULT_HAZARDOUS),
        }
    }
}

impl CategoryLists {
    fn entries(&self) -> impl Iterator<Item = (&String, Category)> {
        self.recyclable
            .iter()
            .map(|l| (l, Category::Recyclable))
            .chain(self.non_recyclable.iter().map(|l| (l, Category::NonRecyclable)))
            .chain(self.hazardous.iter().map(|l| (l, Category::Hazardous)))
    }
}

/// Immutable lookup from label to category.
#[derive(Clone, Debug)]
pub struct CategoryTable {
    entries: HashMap<String, Category>,
}

impl CategoryTable {
    /// Build a table from category lists.
    ///
    /// A label listed under two different categories is rejected; repeating a
    /// label within the same list is harmless.
    pub fn from_lists(lists: &CategoryLists) -> Result<Self> {
        let mut entries = HashMap::new();
        for (label, category) in lists.entries() {
            if label.trim().is_empty() {
                return Err(anyhow!("category lists must not contain empty labels"));
            }
            if let Some(existing) = entries.insert(label.clone(), category) {
                if existing != category {
                    return Err(anyhow!(
                        "label '{}' is listed as both {} and {}",
                        label,
                        existing,
                        category
                    ));
                }
            }
        }
        Ok(Self { entries })
    }

    pub fn category_of(&self, label: &str) -> Option<Category> {
        self.entries.get(label).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for CategoryTable {
    fn default() -> Self {
        let entries = CategoryLists::default()
            .entries()
            .map(|(label, category)| (label.clone(), category))
            .collect();
        Self { entries }
    }
}
