//! Text rendering of bucket contents.

use crate::category::Category;

/// Replaces `_` in labels when shown to people.
pub const DISPLAY_SEPARATOR: &str = " ";

/// Display form of a label: `plastic_bottle` → `plastic bottle`.
///
/// Only ever applied for presentation; lookups and set comparisons use
/// the raw label.
pub fn normalize(label: &str) -> String {
    label.replace('_', DISPLAY_SEPARATOR)
}

/// A bucket's presentation text, tagged with its category for styling.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderedBlock {
    pub category: Category,
    pub style_tag: &'static str,
    pub text: String,
}

/// Bulleted block for already-normalized labels. `None` when there is nothing to show.
pub fn render_block(category: Category, labels: &[String]) -> Option<RenderedBlock> {
    if labels.is_empty() {
        return None;
    }
    Some(RenderedBlock {
        category,
        style_tag: category.style_tag(),
        text: format!("{}\n\n- {}", category.heading(), labels.join("\n- ")),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_replaces_underscores() {
        assert_eq!(normalize("plastic_bottle"), "plastic bottle");
        assert_eq!(normalize("chemical_plastic_gallon"), "chemical plastic gallon");
        assert_eq!(normalize("can"), "can");
    }

    #[test]
    fn normalize_is_idempotent() {
        for label in ["plastic_bottle", "a__b", "_edge_", "", "already spaced"] {
            let once = normalize(label);
            assert_eq!(normalize(&once), once);
        }
    }

    #[test]
    fn renders_bulleted_block() {
        let block = render_block(
            Category::Recyclable,
            &["can".to_string(), "plastic bottle".to_string()],
        )
        .unwrap();
        assert_eq!(block.style_tag, "recyclable");
        assert_eq!(block.text, "Recyclable items:\n\n- can\n- plastic bottle");
    }

    #[test]
    fn empty_bucket_renders_nothing() {
        assert!(render_block(Category::Hazardous, &[]).is_none());
    }
}
