//! Query input line
//!
//! The caret is a character index so it can be handed straight to the
//! mention engine. History browsing walks the session's recent queries.

/// Single-line query editor
#[derive(Debug, Default, Clone)]
pub struct QueryInput {
    text: String,
    /// Caret position in characters
    caret: usize,
    /// Index into the history while browsing (None = editing new input)
    history_index: Option<usize>,
    /// Draft saved when browsing starts
    saved_input: String,
}

impl QueryInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn caret(&self) -> usize {
        self.caret
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    fn char_count(&self) -> usize {
        self.text.chars().count()
    }

    fn byte_offset(&self, caret: usize) -> usize {
        self.text
            .char_indices()
            .nth(caret)
            .map(|(i, _)| i)
            .unwrap_or(self.text.len())
    }

    pub fn insert_char(&mut self, c: char) {
        let at = self.byte_offset(self.caret);
        self.text.insert(at, c);
        self.caret += 1;
        self.history_index = None;
    }

    pub fn insert_str(&mut self, s: &str) {
        let at = self.byte_offset(self.caret);
        // Pasted newlines would split the query
        let clean: String = s.chars().map(|c| if c == '\n' { ' ' } else { c }).collect();
        self.text.insert_str(at, &clean);
        self.caret += clean.chars().count();
        self.history_index = None;
    }

    /// Backspace
    pub fn delete_char_before(&mut self) {
        if self.caret == 0 {
            return;
        }
        let at = self.byte_offset(self.caret - 1);
        self.text.remove(at);
        self.caret -= 1;
        self.history_index = None;
    }

    pub fn delete_char_at(&mut self) {
        if self.caret < self.char_count() {
            let at = self.byte_offset(self.caret);
            self.text.remove(at);
            self.history_index = None;
        }
    }

    /// Ctrl+W
    pub fn delete_word_before(&mut self) {
        if self.caret == 0 {
            return;
        }
        let end = self.byte_offset(self.caret);
        let trimmed = self.text[..end].trim_end();
        let start = trimmed
            .rfind(char::is_whitespace)
            .map(|i| i + 1)
            .unwrap_or(0);
        let removed = self.text[start..end].chars().count();
        self.text.drain(start..end);
        self.caret -= removed;
        self.history_index = None;
    }

    pub fn move_left(&mut self) {
        self.caret = self.caret.saturating_sub(1);
    }

    pub fn move_right(&mut self) {
        self.caret = (self.caret + 1).min(self.char_count());
    }

    pub fn move_to_start(&mut self) {
        self.caret = 0;
    }

    pub fn move_to_end(&mut self) {
        self.caret = self.char_count();
    }

    /// Replace the whole text and move the caret to `caret`
    pub fn set(&mut self, text: impl Into<String>, caret: usize) {
        self.text = text.into();
        self.caret = caret.min(self.char_count());
        self.history_index = None;
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
        self.caret = self.char_count();
        self.history_index = None;
    }

    /// Take the text out, leaving the input empty
    pub fn take(&mut self) -> String {
        self.caret = 0;
        self.history_index = None;
        self.saved_input.clear();
        std::mem::take(&mut self.text)
    }

    /// Up arrow: step back through `history` (oldest first)
    pub fn history_previous(&mut self, history: &[String]) {
        if history.is_empty() {
            return;
        }
        let index = match self.history_index {
            None => {
                self.saved_input = std::mem::take(&mut self.text);
                history.len() - 1
            }
            Some(0) => 0,
            Some(i) => (i - 1).min(history.len() - 1),
        };
        self.history_index = Some(index);
        self.text = history[index].clone();
        self.caret = self.char_count();
    }

    /// Down arrow: step forward, restoring the draft past the newest entry
    pub fn history_next(&mut self, history: &[String]) {
        let Some(index) = self.history_index else {
            return;
        };
        if index + 1 >= history.len() {
            self.history_index = None;
            self.text = std::mem::take(&mut self.saved_input);
        } else {
            self.history_index = Some(index + 1);
            self.text = history[index + 1].clone();
        }
        self.caret = self.char_count();
    }

    pub fn is_browsing_history(&self) -> bool {
        self.history_index.is_some()
    }
}
