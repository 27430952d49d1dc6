//! Whole-file text snapshots.

/// The full content of a file at one moment, with its line delimiter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextBlock {
    text: String,
    eol: String,
}

impl TextBlock {
    #[must_use]
    pub fn new(text: impl Into<String>, eol: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            eol: eol.into(),
        }
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn eol(&self) -> &str {
        &self.eol
    }

    /// The content split on the delimiter.
    ///
    /// A file ending with a delimiter does not produce a trailing empty line;
    /// an empty file has no lines.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        if self.eol.is_empty() {
            return vec![self.text.clone()];
        }
        let mut lines: Vec<String> = self.text.split(self.eol.as_str()).map(str::to_string).collect();
        if lines.last().is_some_and(String::is_empty) {
            lines.pop();
        }
        lines
    }
}
