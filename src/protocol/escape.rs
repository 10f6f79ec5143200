//! Wire codec
//!
//! Escaping and unescaping of the reserved character set used inside
//! command parameters and response values.
//!
//! ## Escape Table
//!
//! ```text
//! ┌───────────┬────────┐   ┌───────────┬────────┐
//! │ Character │ Escape │   │ Character │ Escape │
//! ├───────────┼────────┤   ├───────────┼────────┤
//! │ \         │ \\     │   │ FF  (0x0C)│ \f     │
//! │ /         │ \/     │   │ LF  (0x0A)│ \n     │
//! │ space     │ \s     │   │ CR  (0x0D)│ \r     │
//! │ |         │ \p     │   │ TAB (0x09)│ \t     │
//! │ BEL (0x07)│ \a     │   │ VT  (0x0B)│ \v     │
//! │ BS  (0x08)│ \b     │   │           │        │
//! └───────────┴────────┘   └───────────┴────────┘
//! ```
//!
//! Both directions are total: any input string maps to an output string.
//! Decoding leaves unrecognized backslash sequences (and a trailing lone
//! backslash) in place rather than failing, since the protocol does not
//! specify them.

use std::borrow::Cow;

/// Reserved characters and their two-character escape sequences.
///
/// Backslash leads the table: a sequential-replacement encoder must escape
/// it before any other entry to avoid re-escaping freshly inserted markers.
/// The single-pass encoder below is ordering-independent, but the table
/// keeps the canonical order for documentation and tests.
pub const ESCAPE_TABLE: &[(char, &str)] = &[
    ('\\', "\\\\"),
    ('/', "\\/"),
    (' ', "\\s"),
    ('|', "\\p"),
    ('\u{0007}', "\\a"),
    ('\u{0008}', "\\b"),
    ('\u{000C}', "\\f"),
    ('\n', "\\n"),
    ('\r', "\\r"),
    ('\t', "\\t"),
    ('\u{000B}', "\\v"),
];

/// Escape sequence for a reserved character, if it is one
fn escape_for(ch: char) -> Option<&'static str> {
    ESCAPE_TABLE
        .iter()
        .find(|(original, _)| *original == ch)
        .map(|(_, escaped)| *escaped)
}

/// Original character for an escape marker (the letter after `\`)
fn unescape_marker(marker: char) -> Option<char> {
    match marker {
        '\\' => Some('\\'),
        '/' => Some('/'),
        's' => Some(' '),
        'p' => Some('|'),
        'a' => Some('\u{0007}'),
        'b' => Some('\u{0008}'),
        'f' => Some('\u{000C}'),
        'n' => Some('\n'),
        'r' => Some('\r'),
        't' => Some('\t'),
        'v' => Some('\u{000B}'),
        _ => None,
    }
}

/// Escape every reserved character in `text`
///
/// Returns the input unchanged (borrowed) when nothing needs escaping.
pub fn encode(text: &str) -> Cow<'_, str> {
    if !text.chars().any(|ch| escape_for(ch).is_some()) {
        return Cow::Borrowed(text);
    }

    let mut out = String::with_capacity(text.len() + 8);
    for ch in text.chars() {
        match escape_for(ch) {
            Some(escaped) => out.push_str(escaped),
            None => out.push(ch),
        }
    }

    Cow::Owned(out)
}

/// Replace every recognized escape sequence in `text` with its character
///
/// The exact inverse of [`encode`] for well-formed protocol text.
/// Unrecognized sequences pass through verbatim.
pub fn decode(text: &str) -> Cow<'_, str> {
    if !text.contains('\\') {
        return Cow::Borrowed(text);
    }

    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();

    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }

        match chars.next() {
            Some(marker) => match unescape_marker(marker) {
                Some(original) => out.push(original),
                None => {
                    // Not a protocol escape, keep both characters
                    out.push('\\');
                    out.push(marker);
                }
            },
            // Trailing lone backslash
            None => out.push('\\'),
        }
    }

    Cow::Owned(out)
}
