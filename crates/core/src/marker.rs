//! Indexed marginal markers.

use crate::color::Color;
use crate::error::AnnotationError;
use crate::geometry::UnitRect;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Unique identifier for a marker, stable across sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MarkerId(pub Uuid);

impl MarkerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MarkerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MarkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for MarkerId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Closed set of marker categories. Each maps to exactly one badge color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Note,
    Question,
    Issue,
    Idea,
    Reference,
}

impl Category {
    pub const ALL: [Category; 5] =
        [Category::Note, Category::Question, Category::Issue, Category::Idea, Category::Reference];

    pub fn color(self) -> Color {
        match self {
            Category::Note => Color::BLUE,
            Category::Question => Color::AMBER,
            Category::Issue => Color::RED,
            Category::Idea => Color::GREEN,
            Category::Reference => Color::PURPLE,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Category::Note => "note",
            Category::Question => "question",
            Category::Issue => "issue",
            Category::Idea => "idea",
            Category::Reference => "reference",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|category| category.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                let names: Vec<_> = Category::ALL.iter().map(|c| c.name()).collect();
                format!("unknown category {s:?} (expected one of: {})", names.join(", "))
            })
    }
}

pub(crate) fn now_unix() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

/// User input for a new marker, usually a confirmed selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerDraft {
    pub page_number: u32,
    pub index_number: u32,
    pub anchor_region: UnitRect,
    pub trigger_text: Option<String>,
    pub label: String,
    pub category: Category,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    pub id: MarkerId,
    /// 1-based page number.
    pub page_number: u32,
    /// Positive, unique among the markers of a page.
    pub index_number: u32,
    pub anchor_region: UnitRect,
    #[serde(default)]
    pub trigger_text: Option<String>,
    pub label: String,
    pub category: Category,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Marker {
    pub fn from_draft(draft: MarkerDraft) -> Self {
        let now = now_unix();
        Self {
            id: MarkerId::new(),
            page_number: draft.page_number,
            index_number: draft.index_number,
            anchor_region: draft.anchor_region,
            trigger_text: draft.trigger_text,
            label: draft.label,
            category: draft.category,
            created_at: now,
            updated_at: now,
        }
    }

    /// Update the modification timestamp.
    pub fn touch(&mut self) {
        self.updated_at = now_unix().max(self.created_at);
    }

    pub fn color(&self) -> Color {
        self.category.color()
    }
}

/// Check `candidate` against the markers already stored on its page.
///
/// `existing` may contain `candidate` itself (an edit); it does not collide
/// with its own index.
pub fn validate_marker(existing: &[Marker], candidate: &Marker) -> Result<(), AnnotationError> {
    if candidate.index_number < 1 {
        return Err(AnnotationError::InvalidIndex(candidate.index_number));
    }

    if candidate.page_number < 1 {
        return Err(AnnotationError::InvalidPage(candidate.page_number));
    }

    if !candidate.anchor_region.is_within_unit_square() {
        return Err(AnnotationError::InvalidRegion(candidate.anchor_region));
    }

    let collides = existing.iter().any(|other| {
        other.id != candidate.id
            && other.page_number == candidate.page_number
            && other.index_number == candidate.index_number
    });
    if collides {
        return Err(AnnotationError::DuplicateIndex {
            page_number: candidate.page_number,
            index_number: candidate.index_number,
        });
    }

    Ok(())
}

/// Smallest positive index not used on the page.
pub fn next_free_index(existing: &[Marker], page_number: u32) -> u32 {
    let mut used: Vec<u32> = existing
        .iter()
        .filter(|marker| marker.page_number == page_number)
        .map(|marker| marker.index_number)
        .collect();
    used.sort_unstable();
    used.dedup();

    let mut next = 1;
    for index in used {
        if index == next {
            next += 1;
        } else if index > next {
            break;
        }
    }
    next
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(page_number: u32, index_number: u32) -> MarkerDraft {
        MarkerDraft {
            page_number,
            index_number,
            anchor_region: UnitRect::new(0.1, 0.1, 0.2, 0.05),
            trigger_text: None,
            label: "check this".into(),
            category: Category::Note,
        }
    }

    #[test]
    fn test_every_category_has_distinct_color() {
        let mut colors: Vec<_> = Category::ALL.iter().map(|c| c.color()).collect();
        colors.dedup();
        assert_eq!(colors.len(), Category::ALL.len());
    }

    #[test]
    fn test_category_parses_case_insensitively() {
        assert_eq!("Question".parse::<Category>(), Ok(Category::Question));
        assert!("todo".parse::<Category>().is_err());
    }

    #[test]
    fn test_duplicate_index_on_same_page_is_rejected() {
        let first = Marker::from_draft(draft(2, 1));
        let second = Marker::from_draft(draft(2, 1));

        let err = validate_marker(&[first], &second).expect_err("index 1 is taken on page 2");
        assert!(matches!(
            err,
            AnnotationError::DuplicateIndex { page_number: 2, index_number: 1 }
        ));
    }

    #[test]
    fn test_same_index_on_other_page_is_fine() {
        let first = Marker::from_draft(draft(2, 1));
        let other_page = Marker::from_draft(draft(3, 1));

        assert!(validate_marker(&[first], &other_page).is_ok());
    }

    #[test]
    fn test_editing_keeps_own_index() {
        let mut marker = Marker::from_draft(draft(1, 4));
        let existing = vec![marker.clone()];
        marker.label = "renamed".into();

        assert!(validate_marker(&existing, &marker).is_ok());
    }

    #[test]
    fn test_zero_index_is_invalid() {
        let marker = Marker::from_draft(draft(1, 0));
        assert!(matches!(validate_marker(&[], &marker), Err(AnnotationError::InvalidIndex(0))));
    }

    #[test]
    fn test_region_outside_unit_square_is_invalid() {
        let mut marker = Marker::from_draft(draft(1, 1));
        marker.anchor_region = UnitRect::new(0.9, 0.1, 0.5, 0.1);
        assert!(matches!(validate_marker(&[], &marker), Err(AnnotationError::InvalidRegion(_))));
    }

    #[test]
    fn test_next_free_index_fills_gaps() {
        let markers = vec![
            Marker::from_draft(draft(1, 1)),
            Marker::from_draft(draft(1, 2)),
            Marker::from_draft(draft(1, 4)),
            Marker::from_draft(draft(2, 3)),
        ];
        assert_eq!(next_free_index(&markers, 1), 3);
        assert_eq!(next_free_index(&markers, 2), 1);
        assert_eq!(next_free_index(&markers, 5), 1);
    }

    #[test]
    fn test_marker_serializes_flat_fields() {
        let marker = Marker::from_draft(draft(2, 7));
        let value = serde_json::to_value(&marker).expect("serialize");

        assert_eq!(value["page_number"], 2);
        assert_eq!(value["index_number"], 7);
        assert_eq!(value["category"], "note");
        assert_eq!(value["id"], marker.id.to_string());
    }
}
