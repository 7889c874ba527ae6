//! Positioned text on a rendered page.

use crate::geometry::ScreenRect;
use inkmark_render::TextSpan;
use serde::{Deserialize, Serialize};

/// A run of text placed on the raster, in screen pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextFragment {
    pub text: String,
    pub rect: ScreenRect,
}

impl TextFragment {
    pub fn new(text: impl Into<String>, rect: ScreenRect) -> Self {
        Self { text: text.into(), rect }
    }
}

impl From<&TextSpan> for TextFragment {
    fn from(span: &TextSpan) -> Self {
        Self {
            text: span.text.clone(),
            rect: ScreenRect::new(
                f64::from(span.x),
                f64::from(span.y),
                f64::from(span.width),
                f64::from(span.height),
            ),
        }
    }
}

/// Text of every fragment touching `region`, in fragment order.
///
/// Fragments are joined with a single space. A fragment starting at the same
/// screen position as one already taken is skipped, since some producers emit
/// overlapping duplicates for bold or shadowed text. Returns `None` when no
/// fragment intersects.
pub fn text_in_region(fragments: &[TextFragment], region: &ScreenRect) -> Option<String> {
    let mut seen: Vec<(f64, f64)> = Vec::new();
    let mut parts: Vec<&str> = Vec::new();

    for fragment in fragments.iter().filter(|f| f.rect.intersects(region)) {
        let origin = (fragment.rect.x, fragment.rect.y);
        if seen.contains(&origin) {
            continue;
        }
        seen.push(origin);

        let text = fragment.text.trim();
        if !text.is_empty() {
            parts.push(text);
        }
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line() -> Vec<TextFragment> {
        vec![
            TextFragment::new("Enter", ScreenRect::new(10.0, 10.0, 40.0, 12.0)),
            TextFragment::new("stage", ScreenRect::new(55.0, 10.0, 40.0, 12.0)),
            TextFragment::new("left", ScreenRect::new(100.0, 10.0, 30.0, 12.0)),
            TextFragment::new("Exit", ScreenRect::new(10.0, 40.0, 30.0, 12.0)),
        ]
    }

    #[test]
    fn test_partial_overlap_counts() {
        let region = ScreenRect::new(52.0, 15.0, 60.0, 2.0);
        assert_eq!(text_in_region(&line(), &region).as_deref(), Some("stage left"));
    }

    #[test]
    fn test_fragment_order_is_kept() {
        let mut fragments = line();
        fragments.swap(0, 1);
        let region = ScreenRect::new(0.0, 0.0, 200.0, 30.0);
        assert_eq!(text_in_region(&fragments, &region).as_deref(), Some("stage Enter left"));
    }

    #[test]
    fn test_duplicates_at_same_position_are_dropped() {
        let mut fragments = line();
        fragments.insert(1, TextFragment::new("Enter", ScreenRect::new(10.0, 10.0, 40.0, 12.0)));
        let region = ScreenRect::new(0.0, 0.0, 52.0, 30.0);
        assert_eq!(text_in_region(&fragments, &region).as_deref(), Some("Enter"));
    }

    #[test]
    fn test_no_overlap_is_none() {
        let region = ScreenRect::new(300.0, 300.0, 10.0, 10.0);
        assert_eq!(text_in_region(&line(), &region), None);
        assert_eq!(text_in_region(&[], &region), None);
    }

    #[test]
    fn test_from_span() {
        let span = TextSpan { text: "cue".into(), x: 1.5, y: 2.0, width: 3.0, height: 4.0 };
        let fragment = TextFragment::from(&span);
        assert_eq!(fragment.rect, ScreenRect::new(1.5, 2.0, 3.0, 4.0));
    }
}
