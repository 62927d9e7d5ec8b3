//! Conservative SQL text scanning.
//!
//! The validator and the binder must never look inside string literals,
//! quoted identifiers or comments. [`mask`] blanks those regions out while
//! preserving every byte offset, so downstream scans operate on the masked
//! text and splice the original.

/// Replace the contents of string literals (`'...'` with `''` escapes),
/// quoted identifiers (`"..."`), line comments (`-- ...`) and block comments
/// (`/* ... */`) with spaces. The result has the same length as the input.
pub fn mask(sql: &str) -> String {
    #[derive(PartialEq)]
    enum State {
        Code,
        SingleQuote,
        DoubleQuote,
        LineComment,
        BlockComment,
    }

    let bytes: Vec<char> = sql.chars().collect();
    let mut out: Vec<char> = Vec::with_capacity(bytes.len());
    let mut state = State::Code;
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        let next = bytes.get(i + 1).copied();
        match state {
            State::Code => match c {
                '\'' => {
                    state = State::SingleQuote;
                    out.push(' ');
                }
                '"' => {
                    state = State::DoubleQuote;
                    out.push(' ');
                }
                '-' if next == Some('-') => {
                    state = State::LineComment;
                    out.push(' ');
                    out.push(' ');
                    i += 1;
                }
                '/' if next == Some('*') => {
                    state = State::BlockComment;
                    out.push(' ');
                    out.push(' ');
                    i += 1;
                }
                _ => out.push(c),
            },
            State::SingleQuote => {
                if c == '\'' {
                    if next == Some('\'') {
                        // Escaped quote stays inside the literal.
                        out.push(' ');
                        out.push(' ');
                        i += 1;
                    } else {
                        state = State::Code;
                        out.push(' ');
                    }
                } else {
                    out.push(' ');
                }
            }
            State::DoubleQuote => {
                if c == '"' {
                    state = State::Code;
                }
                out.push(' ');
            }
            State::LineComment => {
                if c == '\n' {
                    state = State::Code;
                    out.push('\n');
                } else {
                    out.push(' ');
                }
            }
            State::BlockComment => {
                if c == '*' && next == Some('/') {
                    state = State::Code;
                    out.push(' ');
                    out.push(' ');
                    i += 1;
                } else {
                    out.push(' ');
                }
            }
        }
        i += 1;
    }

    out.into_iter().collect()
}

/// Uppercase identifier-like tokens of the masked text.
pub fn keywords(masked: &str) -> Vec<String> {
    masked
        .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .filter(|t| !t.is_empty())
        .map(|t| t.to_ascii_uppercase())
        .collect()
}
