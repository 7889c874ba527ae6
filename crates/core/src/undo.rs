//! Per-page undo history for ink strokes.

use crate::ink::StrokeId;

/// LIFO list of strokes drawn on the displayed page. There is no redo.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UndoStack {
    page_number: Option<u32>,
    entries: Vec<StrokeId>,
}

impl UndoStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page_number(&self) -> Option<u32> {
        self.page_number
    }

    /// Drop the history and scope the stack to `page_number`.
    pub fn reset_for_page(&mut self, page_number: u32) {
        self.entries.clear();
        self.page_number = Some(page_number);
    }

    pub fn push(&mut self, stroke: StrokeId) {
        self.entries.push(stroke);
    }

    pub fn pop(&mut self) -> Option<StrokeId> {
        self.entries.pop()
    }

    /// Forget a stroke that was deleted by other means. Returns whether it
    /// was on the stack.
    pub fn remove(&mut self, stroke: StrokeId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| *entry != stroke);
        self.entries.len() != before
    }

    pub fn peek(&self) -> Option<StrokeId> {
        self.entries.last().copied()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
