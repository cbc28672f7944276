//! Script line handling: continuation merging and word splitting.
//!
//! Supports:
//! - Continuation: a raw line ending in `\` is joined with the next one
//! - Quoting: `'literal'`, `"with \" escapes"`, and `\x` outside quotes
//! - Pipes: an unquoted `|` is its own token, with or without spaces
//! - Comments: an unquoted `#` at the start of a word ends the line

use crate::error::{Result, ShellError};

/// Marker that joins a raw line with the one after it.
pub const CONTINUATION: char = '\\';

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Word(String),
    Pipe,
}

impl From<&str> for Token {
    fn from(value: &str) -> Self {
        Token::Word(value.to_string())
    }
}

impl From<String> for Token {
    fn from(value: String) -> Self {
        Token::Word(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum QuoteMode {
    None,
    Single,
    Double,
}

/// Split script text into logical lines.
///
/// Order is preserved and nothing is dropped; a continuation on the last
/// line still yields a final logical line.
pub fn assemble_lines(script: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut pending: Option<String> = None;

    for raw in script.split('\n') {
        let raw = raw.strip_suffix('\r').unwrap_or(raw);
        let mut current = pending.take().unwrap_or_default();
        match raw.strip_suffix(CONTINUATION) {
            Some(head) => {
                current.push_str(head);
                pending = Some(current);
            }
            None => {
                current.push_str(raw);
                lines.push(current);
            }
        }
    }

    if let Some(dangling) = pending {
        lines.push(dangling);
    }

    lines
}

/// Split an expanded command line into words and pipe tokens.
pub fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut buf = String::new();
    // A word has started even if `buf` is still empty (e.g. `""`).
    let mut in_word = false;
    let mut mode = QuoteMode::None;
    let mut chars = input.chars().peekable();

    fn finish_word(tokens: &mut Vec<Token>, buf: &mut String, in_word: &mut bool) {
        if *in_word {
            tokens.push(Token::Word(std::mem::take(buf)));
            *in_word = false;
        }
    }

    while let Some(ch) = chars.next() {
        match mode {
            QuoteMode::Single => {
                if ch == '\'' {
                    mode = QuoteMode::None;
                } else {
                    buf.push(ch);
                }
            }
            QuoteMode::Double => match ch {
                '"' => mode = QuoteMode::None,
                '\\' => match chars.peek().copied() {
                    Some(next @ ('"' | '\\' | '$' | '`')) => {
                        buf.push(next);
                        chars.next();
                    }
                    _ => buf.push(ch),
                },
                c => buf.push(c),
            },
            QuoteMode::None => match ch {
                '\'' => {
                    mode = QuoteMode::Single;
                    in_word = true;
                }
                '"' => {
                    mode = QuoteMode::Double;
                    in_word = true;
                }
                '\\' => match chars.next() {
                    Some(next) => {
                        buf.push(next);
                        in_word = true;
                    }
                    None => return Err(ShellError::Syntax("dangling escape at end of line".into())),
                },
                '|' => {
                    finish_word(&mut tokens, &mut buf, &mut in_word);
                    tokens.push(Token::Pipe);
                }
                '#' if !in_word => break,
                c if c.is_whitespace() => finish_word(&mut tokens, &mut buf, &mut in_word),
                c => {
                    buf.push(c);
                    in_word = true;
                }
            },
        }
    }

    match mode {
        QuoteMode::Single => return Err(ShellError::Syntax("unterminated single quote".into())),
        QuoteMode::Double => return Err(ShellError::Syntax("unterminated double quote".into())),
        QuoteMode::None => {}
    }

    finish_word(&mut tokens, &mut buf, &mut in_word);
    Ok(tokens)
}

/// Flatten tokens into an argv, rendering pipes as `|`.
pub fn into_words(tokens: Vec<Token>) -> Vec<String> {
    tokens
        .into_iter()
        .map(|t| match t {
            Token::Word(w) => w,
            Token::Pipe => "|".to_string(),
        })
        .collect()
}
