//! Copying answers out of the chat screen
//!
//! The system clipboard is tried first through arboard. Over SSH or on a
//! headless box there is none, so the text is written as an OSC 52 escape
//! and the local terminal sets its own clipboard.
//!
//! Format: `\x1b]52;c;BASE64_DATA\x07`

use std::io::{self, Write};

/// Where copied text ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyTarget {
    System,
    /// Handed to the terminal as OSC 52; it may or may not honour it
    Terminal,
}

/// Destination for text copied from the chat screen
pub trait ClipboardSink {
    fn copy_text(&mut self, text: &str) -> io::Result<CopyTarget>;
}

/// arboard with an OSC 52 fallback on stdout
///
/// The arboard handle is kept open; on X11 the copied text is served by it
/// and disappears when it is dropped.
#[derive(Default)]
pub struct SystemClipboard {
    native: Option<arboard::Clipboard>,
}

impl SystemClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    fn copy_native(&mut self, text: &str) -> Result<(), arboard::Error> {
        if self.native.is_none() {
            self.native = Some(arboard::Clipboard::new()?);
        }
        match self.native.as_mut() {
            Some(clipboard) => clipboard.set_text(text),
            None => Err(arboard::Error::ClipboardNotSupported),
        }
    }
}

impl ClipboardSink for SystemClipboard {
    fn copy_text(&mut self, text: &str) -> io::Result<CopyTarget> {
        match self.copy_native(text) {
            Ok(()) => Ok(CopyTarget::System),
            Err(e) => {
                tracing::debug!("System clipboard unavailable ({}), using OSC 52", e);
                self.native = None;
                write_osc52(&mut io::stdout(), text)?;
                Ok(CopyTarget::Terminal)
            }
        }
    }
}

/// Escape sequence that asks the terminal to set its clipboard
pub fn osc52_sequence(text: &str) -> String {
    format!("\x1b]52;c;{}\x07", base64_encode(text.as_bytes()))
}

fn write_osc52(out: &mut impl Write, text: &str) -> io::Result<()> {
    out.write_all(osc52_sequence(text).as_bytes())?;
    out.flush()
}

fn base64_encode(bytes: &[u8]) -> String {
    const ALPHABET: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

    let mut encoded = String::with_capacity(bytes.len().div_ceil(3) * 4);
    for chunk in bytes.chunks(3) {
        let b0 = chunk[0] as u32;
        let b1 = chunk.get(1).copied().unwrap_or(0) as u32;
        let b2 = chunk.get(2).copied().unwrap_or(0) as u32;
        let n = (b0 << 16) | (b1 << 8) | b2;

        encoded.push(ALPHABET[((n >> 18) & 0x3F) as usize] as char);
        encoded.push(ALPHABET[((n >> 12) & 0x3F) as usize] as char);
        encoded.push(if chunk.len() > 1 {
            ALPHABET[((n >> 6) & 0x3F) as usize] as char
        } else {
            '='
        });
        encoded.push(if chunk.len() > 2 {
            ALPHABET[(n & 0x3F) as usize] as char
        } else {
            '='
        });
    }
    encoded
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base64_padding() {
        assert_eq!(base64_encode(b""), "");
        assert_eq!(base64_encode(b"M"), "TQ==");
        assert_eq!(base64_encode(b"Ma"), "TWE=");
        assert_eq!(base64_encode(b"Man"), "TWFu");
        assert_eq!(base64_encode("Annex A ✓".as_bytes()), "QW5uZXggQSDinJM=");
    }

    #[test]
    fn test_osc52_written_and_flushed() {
        let mut out = Vec::new();
        write_osc52(&mut out, "Class IIb").unwrap();
        assert_eq!(out, b"\x1b]52;c;Q2xhc3MgSUli\x07");
    }
}
