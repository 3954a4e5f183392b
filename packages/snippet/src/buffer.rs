//! The editor surface a snippet session drives.
//!
//! Positions are byte offsets into the buffer's UTF-8 text and always fall
//! on character boundaries.

/// The part of a text buffer the snippet engine needs.
pub trait TextBuffer {
    /// Cursor position.
    fn pos(&self) -> usize;
    fn set_pos(&mut self, pos: usize);

    fn select(&mut self, start: usize, end: usize);
    fn remove_all_selections(&mut self);
    fn is_selected(&self) -> bool;

    /// Inserts `text` at `pos` and returns its length. A cursor after `pos`
    /// moves with the text.
    fn insert(&mut self, pos: usize, text: &str) -> usize;

    /// Removes `start..end`. A cursor inside the range moves to `start`.
    fn delete(&mut self, start: usize, end: usize);

    fn text(&self, start: usize, end: usize) -> String;

    /// Leading whitespace of the line containing `pos`.
    fn line_indent(&self, pos: usize) -> String;

    /// What one level of indentation inserts: a tab, or some spaces.
    fn indent_unit(&self) -> String;

    /// Breaks the line at the cursor, carrying its indentation over, and
    /// leaves the cursor after the new indent.
    fn insert_newline(&mut self) -> usize {
        let pos = self.pos();
        let text = format!("\n{}", self.line_indent(pos));
        let len = self.insert(pos, &text);
        self.set_pos(pos + len);
        len
    }
}

/// A [`TextBuffer`] over an owned string.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StringBuffer {
    text: String,
    pos: usize,
    selection: Option<(usize, usize)>,
    indent_unit: String,
}

impl StringBuffer {
    /// A buffer holding `text` with the cursor at its end, indenting with
    /// tabs.
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        StringBuffer {
            pos: text.len(),
            text,
            selection: None,
            indent_unit: "\t".to_owned(),
        }
    }

    pub fn with_indent_unit(mut self, unit: impl Into<String>) -> Self {
        self.indent_unit = unit.into();
        self
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn selection(&self) -> Option<(usize, usize)> {
        self.selection
    }

    pub fn selected_text(&self) -> Option<&str> {
        self.selection.map(|(start, end)| &self.text[start..end])
    }
}

impl TextBuffer for StringBuffer {
    fn pos(&self) -> usize {
        self.pos
    }

    fn set_pos(&mut self, pos: usize) {
        self.pos = pos.min(self.text.len());
    }

    fn select(&mut self, start: usize, end: usize) {
        self.selection = Some((start, end));
    }

    fn remove_all_selections(&mut self) {
        self.selection = None;
    }

    fn is_selected(&self) -> bool {
        self.selection.is_some()
    }

    fn insert(&mut self, pos: usize, text: &str) -> usize {
        self.text.insert_str(pos, text);
        if pos < self.pos {
            self.pos += text.len();
        }
        text.len()
    }

    fn delete(&mut self, start: usize, end: usize) {
        self.text.replace_range(start..end, "");
        if self.pos >= end {
            self.pos -= end - start;
        } else if self.pos > start {
            self.pos = start;
        }
    }

    fn text(&self, start: usize, end: usize) -> String {
        self.text[start..end].to_owned()
    }

    fn line_indent(&self, pos: usize) -> String {
        let line_start = self.text[..pos].rfind('\n').map_or(0, |nl| nl + 1);
        self.text[line_start..]
            .chars()
            .take_while(|c| *c == ' ' || *c == '\t')
            .collect()
    }

    fn indent_unit(&self) -> String {
        self.indent_unit.clone()
    }
}
