//! Recording display for session tests.
//!
//! `RecordingDisplay` keeps every call in order so tests can assert on how
//! often the session rendered and what it rendered.

use super::{CompletionStyle, Display};

/// One call made on the display.
#[derive(Debug, Clone, PartialEq)]
pub enum DisplayCall {
    Placeholder(String),
    Update(String),
    Complete(CompletionStyle),
    SetScroll(f32),
}

/// Test double for [`Display`].
#[derive(Debug)]
pub struct RecordingDisplay {
    pub calls: Vec<DisplayCall>,
    active: bool,
    scroll_ratio: f32,
    /// Go inactive after this many updates.
    close_after: Option<usize>,
}

impl Default for RecordingDisplay {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingDisplay {
    pub fn new() -> Self {
        Self {
            calls: Vec::new(),
            active: false,
            scroll_ratio: 1.0,
            close_after: None,
        }
    }

    /// Simulate the viewer closing once `n` updates have been shown.
    pub fn close_after(mut self, n: usize) -> Self {
        self.close_after = Some(n);
        self
    }

    /// Start with the viewer scrolled away from the bottom.
    pub fn scrolled_to(mut self, ratio: f32) -> Self {
        self.scroll_ratio = ratio;
        self
    }

    pub fn updates(&self) -> Vec<&str> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                DisplayCall::Update(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn update_count(&self) -> usize {
        self.updates().len()
    }

    /// The text currently shown.
    pub fn text(&self) -> Option<&str> {
        self.updates().last().copied()
    }

    pub fn placeholder(&self) -> Option<&str> {
        self.calls.iter().find_map(|call| match call {
            DisplayCall::Placeholder(header) => Some(header.as_str()),
            _ => None,
        })
    }

    pub fn completion(&self) -> Option<CompletionStyle> {
        self.calls.iter().find_map(|call| match call {
            DisplayCall::Complete(style) => Some(*style),
            _ => None,
        })
    }

    pub fn completions(&self) -> usize {
        self.calls
            .iter()
            .filter(|call| matches!(call, DisplayCall::Complete(_)))
            .count()
    }
}

impl Display for RecordingDisplay {
    fn show_placeholder(&mut self, header: &str) {
        self.active = true;
        self.calls.push(DisplayCall::Placeholder(header.to_string()));
    }

    fn update_streaming_content(&mut self, markdown: &str) {
        self.calls.push(DisplayCall::Update(markdown.to_string()));
        if self.close_after == Some(self.update_count()) {
            self.active = false;
        }
    }

    fn signal_stream_complete(&mut self, style: CompletionStyle) {
        self.calls.push(DisplayCall::Complete(style));
        self.active = false;
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn scroll_ratio(&self) -> f32 {
        self.scroll_ratio
    }

    fn set_scroll_ratio(&mut self, ratio: f32) {
        self.scroll_ratio = ratio;
        self.calls.push(DisplayCall::SetScroll(ratio));
    }
}
