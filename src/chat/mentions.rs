//! `@mention` suggestions for the query input
//!
//! Typing `@` followed by part of a product title opens a filtered list of
//! products. Up/Down move the highlight, Enter replaces the partial mention
//! with the full title, Escape closes the list.
//!
//! Caret positions are character indices into the input text.

use crate::api::Product;

/// Keys the suggestion list reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MentionKey {
    Up,
    Down,
    Enter,
    Escape,
}

/// Result of offering a key to the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MentionOutcome {
    /// Panel hidden or key not applicable; the input handles the key itself
    Ignored,
    /// Highlight moved
    Moved,
    /// Panel closed, text untouched
    Dismissed,
    /// A product was inserted; replace the input with `text` and move the
    /// caret to `caret`
    Inserted { text: String, caret: usize },
}

/// Live-filtered product suggestions
#[derive(Debug, Default, Clone)]
pub struct MentionEngine {
    /// Product catalog
    products: Vec<Product>,
    /// Indices into `products` matching the current token
    filtered: Vec<usize>,
    /// Highlighted index into `filtered`
    selected: usize,
    visible: bool,
    /// Token typed after `@`
    token: String,
}

impl MentionEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the catalog, re-filtering against the current token
    pub fn set_products(&mut self, products: Vec<Product>) {
        self.products = products;
        self.refilter();
        if self.products.is_empty() {
            self.hide();
        }
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    /// Re-evaluate the trailing `@token` after every edit
    pub fn on_text_change(&mut self, text: &str, caret: usize) {
        match trailing_mention(text, caret) {
            Some(token) if !self.products.is_empty() => {
                self.token = token.to_lowercase();
                self.refilter();
                self.selected = 0;
                self.visible = true;
            }
            _ => self.hide(),
        }
    }

    fn refilter(&mut self) {
        self.filtered = self
            .products
            .iter()
            .enumerate()
            .filter(|(_, p)| p.title.to_lowercase().contains(&self.token))
            .map(|(idx, _)| idx)
            .collect();
        if self.selected >= self.filtered.len() {
            self.selected = 0;
        }
    }

    /// Offer a key press; only consumed while the panel is open
    pub fn handle_key(&mut self, key: MentionKey, text: &str, caret: usize) -> MentionOutcome {
        if !self.visible {
            return MentionOutcome::Ignored;
        }

        match key {
            MentionKey::Down => {
                if self.selected + 1 < self.filtered.len() {
                    self.selected += 1;
                }
                MentionOutcome::Moved
            }
            MentionKey::Up => {
                self.selected = self.selected.saturating_sub(1);
                MentionOutcome::Moved
            }
            MentionKey::Escape => {
                self.hide();
                MentionOutcome::Dismissed
            }
            MentionKey::Enter => {
                let Some(title) = self.selected_product().map(|p| p.title.clone()) else {
                    return MentionOutcome::Ignored;
                };
                self.hide();
                match insert_mention(text, caret, &title) {
                    Some((text, caret)) => MentionOutcome::Inserted { text, caret },
                    None => MentionOutcome::Dismissed,
                }
            }
        }
    }

    pub fn hide(&mut self) {
        self.visible = false;
        self.selected = 0;
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn selected_index(&self) -> usize {
        self.selected
    }

    pub fn selected_product(&self) -> Option<&Product> {
        self.filtered
            .get(self.selected)
            .and_then(|&idx| self.products.get(idx))
    }

    /// Products matching the current token, in catalog order
    pub fn suggestions(&self) -> impl Iterator<Item = &Product> {
        self.filtered.iter().filter_map(|&idx| self.products.get(idx))
    }

    pub fn len(&self) -> usize {
        self.filtered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filtered.is_empty()
    }
}

/// Byte offset of the character at `char_idx` (clamped to the end)
fn byte_offset(text: &str, char_idx: usize) -> usize {
    text.char_indices()
        .nth(char_idx)
        .map(|(offset, _)| offset)
        .unwrap_or(text.len())
}

/// The `@token` ending at the caret, without the `@`
///
/// Matches `@[^\s]*$` against the text before the caret.
pub fn trailing_mention(text: &str, caret: usize) -> Option<&str> {
    let before = &text[..byte_offset(text, caret)];
    let at = before.rfind('@')?;
    let token = &before[at + 1..];
    if token.chars().any(char::is_whitespace) {
        None
    } else {
        Some(token)
    }
}

/// Replace the partial mention before the caret with `@<title> `
///
/// Text after the caret is kept as-is. Returns the new text and the caret
/// position just past the inserted trailing space, or `None` when there is no
/// `@` before the caret.
pub fn insert_mention(text: &str, caret: usize, title: &str) -> Option<(String, usize)> {
    let caret_byte = byte_offset(text, caret);
    let (before, after) = text.split_at(caret_byte);
    let at_byte = before.rfind('@')?;
    let at_char = before[..at_byte].chars().count();

    let mut new_text = String::with_capacity(text.len() + title.len() + 2);
    new_text.push_str(&before[..at_byte]);
    new_text.push('@');
    new_text.push_str(title);
    new_text.push(' ');
    new_text.push_str(after);

    Some((new_text, at_char + title.chars().count() + 2))
}
