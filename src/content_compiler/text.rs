// Display Text Preparation
//
// Converts display strings into the engine's symbol alphabet ahead of
// compression: word wrapping, character mapping and LONGTEXT chunking.

use std::collections::HashMap;

use crate::content_compiler::error::CompilerError;

pub const SYMBOL_TERMINATOR: u8 = 0;
/// Reserved for an upper-case shift; never emitted.
pub const SYMBOL_UPPERCASE: u8 = 1;
pub const SYMBOL_NEWLINE: u8 = 2;

const PUNCTUATION: &str = " 0123456789;:.,-!?'\"";

lazy_static! {
    pub static ref SYMBOL_MAP: HashMap<char, u8> = {
        let mut m = HashMap::new();
        for (i, c) in ('a'..='z').enumerate() {
            m.insert(c, i as u8 + 3);
        }
        for (i, c) in ('A'..='Z').enumerate() {
            m.insert(c, i as u8 + 3 + 26);
        }
        for (i, c) in PUNCTUATION.chars().enumerate() {
            m.insert(c, i as u8 + 3 + 52);
        }
        m
    };
}

/// Simple word wrap: lines are padded with trailing spaces to exactly
/// `line_length` when the next word would overflow them. A word longer than
/// a line is padded out to the next line boundary. The last line is left
/// unpadded. Words are never split.
pub fn wrap_text(text: &str, line_length: usize) -> String {
    let mut result = String::new();
    let mut row = String::new();

    for word in text.split_whitespace() {
        let row_len = row.chars().count() + word.chars().count() + 1;
        if row.is_empty() {
            row = word.to_string();
        } else if row_len > line_length {
            let pad = (line_length - row.chars().count() % line_length) % line_length;
            result.push_str(&row);
            result.extend(std::iter::repeat(' ').take(pad));
            row = word.to_string();
        } else {
            row.push(' ');
            row.push_str(word);
        }
    }
    result.push_str(&row);
    result
}

/// Convert one display string into symbols, terminator included.
///
/// `prewrapped` text (LONGTEXT chunks) is used as-is; everything else is
/// word wrapped first.
pub fn encode_text(
    key: &str,
    text: &str,
    prewrapped: bool,
    line_length: usize,
) -> Result<Vec<u8>, CompilerError> {
    let wrapped;
    let source = if prewrapped {
        text
    } else {
        wrapped = wrap_text(text, line_length);
        wrapped.as_str()
    };

    let mut symbols = Vec::with_capacity(source.len() + 1);
    for ch in source.chars() {
        if ch == '\\' {
            symbols.push(SYMBOL_NEWLINE);
            continue;
        }
        match SYMBOL_MAP.get(&ch) {
            Some(&symbol) => symbols.push(symbol),
            None => return Err(CompilerError::UnsupportedCharacter(ch, key.to_string())),
        }
    }
    if symbols.is_empty() {
        symbols.push(SYMBOL_MAP[&' ']);
    }
    symbols.push(SYMBOL_TERMINATOR);
    Ok(symbols)
}

/// Split a long passage into prewrapped chunks of at most `chunk_length`
/// characters. Chunks are cut on wrapped-line boundaries when `chunk_length`
/// is a multiple of the line length, so no word is split.
pub fn split_long_text(text: &str, line_length: usize, chunk_length: usize) -> Vec<String> {
    let wrapped: Vec<char> = wrap_text(text, line_length).chars().collect();
    let mut chunks = Vec::new();

    let mut rest = &wrapped[..];
    while rest.len() > chunk_length {
        let (head, tail) = rest.split_at(chunk_length);
        chunks.push(head.iter().collect::<String>().trim().to_string());
        rest = tail;
    }
    if !rest.is_empty() {
        chunks.push(rest.iter().collect::<String>().trim().to_string());
    }
    chunks
}

/// Name given to chunk `index` of a LONGTEXT key.
pub fn chunk_key(key: &str, index: usize) -> String {
    format!("{}_PT{}", key, index)
}
