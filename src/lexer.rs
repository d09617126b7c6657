//! # bar|beat lexer
//!
//! Tokenizes raw bar|beat source into a flat stream of lexical tokens with
//! position info, stripping whitespace and comments as it goes (the parser
//! never sees either — the grammar only uses them as separators between
//! elements).
//!
//! The lexer is pitch-aware: an uppercase note letter greedily consumes an
//! immediately following accidental (`#` or `b`) as part of one
//! [`LexToken::PitchLetter`] token. A `#` that does *not* directly follow a
//! note letter starts a line comment instead, resolving the one ambiguity
//! in the grammar between the sharp accidental and the `#`-comment marker.

use crate::error::NotationError;

/// A pitch accidental captured at the lexical level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accidental {
    None,
    Sharp,
    Flat,
}

/// Raw lexical tokens. The parser assembles these into the grammar's
/// higher-level [`crate::parser::Token`] elements.
#[derive(Debug, Clone, PartialEq)]
pub enum LexToken {
    /// An uppercase note letter `A`..`G`, with an optional fused accidental.
    PitchLetter { name: char, accidental: Accidental },
    /// A run of lowercase ASCII letters: `v`, `t`, `p`, `x`, or `clear`.
    Letters(String),
    Int(u64),
    Decimal(f64),
    Pipe,
    At,
    Equals,
    Dash,
    Plus,
    Slash,
}

/// A token with its position in the source.
#[derive(Debug, Clone, PartialEq)]
pub struct LocatedToken {
    pub token: LexToken,
    pub offset: usize,
    pub line: usize,
    pub column: usize,
}

/// Lexer for bar|beat source.
pub struct Lexer<'a> {
    input: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.char_indices().peekable(),
            line: 1,
            column: 1,
        }
    }

    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().map(|&(_, c)| c)
    }

    fn advance(&mut self) -> Option<(usize, char)> {
        let (offset, c) = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some((offset, c))
    }

    fn skip_line_comment(&mut self) {
        while let Some(c) = self.peek_char() {
            if c == '\n' {
                break;
            }
            self.advance();
        }
    }

    fn skip_block_comment(&mut self, start_line: usize, start_column: usize) -> Result<(), NotationError> {
        loop {
            match self.advance() {
                None => {
                    return Err(NotationError::SyntaxError {
                        offset: self.input.len(),
                        line: start_line,
                        column: start_column,
                        message: "unterminated block comment".to_string(),
                    })
                }
                Some((_, '*')) if self.peek_char() == Some('/') => {
                    self.advance();
                    return Ok(());
                }
                Some(_) => {}
            }
        }
    }

    fn consume_digits(&mut self) -> String {
        let mut s = String::new();
        while let Some(c) = self.peek_char() {
            if c.is_ascii_digit() {
                s.push(c);
                self.advance();
            } else {
                break;
            }
        }
        s
    }

    /// Tokenize the full input, returning located tokens with comments and
    /// whitespace already stripped.
    pub fn tokenize(&mut self) -> Result<Vec<LocatedToken>, NotationError> {
        let mut tokens = Vec::new();

        loop {
            let (line, column) = (self.line, self.column);
            let offset = match self.chars.peek() {
                Some(&(o, _)) => o,
                None => break,
            };
            let c = self.peek_char().unwrap();

            if c.is_whitespace() {
                self.advance();
                continue;
            }

            // Comments: "//", "/*...*/", or a bare "#" not fused to a pitch letter.
            if c == '/' {
                let rest = &self.input[offset..];
                if rest.starts_with("//") {
                    self.advance();
                    self.advance();
                    self.skip_line_comment();
                    continue;
                }
                if rest.starts_with("/*") {
                    self.advance();
                    self.advance();
                    self.skip_block_comment(line, column)?;
                    continue;
                }
                self.advance();
                tokens.push(LocatedToken { token: LexToken::Slash, offset, line, column });
                continue;
            }
            if c == '#' {
                self.advance();
                self.skip_line_comment();
                continue;
            }

            if c.is_ascii_uppercase() && ('A'..='G').contains(&c) {
                self.advance();
                let accidental = match self.peek_char() {
                    Some('#') => {
                        self.advance();
                        Accidental::Sharp
                    }
                    Some('b') => {
                        self.advance();
                        Accidental::Flat
                    }
                    _ => Accidental::None,
                };
                tokens.push(LocatedToken {
                    token: LexToken::PitchLetter { name: c, accidental },
                    offset,
                    line,
                    column,
                });
                continue;
            }

            if c.is_ascii_lowercase() {
                let mut s = String::new();
                while let Some(c) = self.peek_char() {
                    if c.is_ascii_lowercase() {
                        s.push(c);
                        self.advance();
                    } else {
                        break;
                    }
                }
                tokens.push(LocatedToken { token: LexToken::Letters(s), offset, line, column });
                continue;
            }

            if c.is_ascii_digit() {
                let whole = self.consume_digits();
                if self.peek_char() == Some('.') {
                    // Only treat '.' as a decimal point if followed by a digit.
                    let mut after_dot = self.chars.clone();
                    after_dot.next();
                    let has_frac_digit = matches!(after_dot.peek(), Some((_, d)) if d.is_ascii_digit());
                    if has_frac_digit {
                        self.advance(); // consume '.'
                        let frac = self.consume_digits();
                        let text = format!("{}.{}", whole, frac);
                        let value: f64 = text.parse().map_err(|_| NotationError::SyntaxError {
                            offset,
                            line,
                            column,
                            message: format!("invalid decimal number '{}'", text),
                        })?;
                        tokens.push(LocatedToken { token: LexToken::Decimal(value), offset, line, column });
                        continue;
                    }
                }
                let value: u64 = whole.parse().map_err(|_| NotationError::SyntaxError {
                    offset,
                    line,
                    column,
                    message: format!("invalid integer '{}'", whole),
                })?;
                tokens.push(LocatedToken { token: LexToken::Int(value), offset, line, column });
                continue;
            }

            let single = match c {
                '|' => LexToken::Pipe,
                '@' => LexToken::At,
                '=' => LexToken::Equals,
                '-' => LexToken::Dash,
                '+' => LexToken::Plus,
                _ => {
                    return Err(NotationError::SyntaxError {
                        offset,
                        line,
                        column,
                        message: format!("unexpected character '{}'", c),
                    })
                }
            };
            self.advance();
            tokens.push(LocatedToken { token: single, offset, line, column });
        }

        Ok(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<LexToken> {
        Lexer::new(src).tokenize().unwrap().into_iter().map(|t| t.token).collect()
    }

    #[test]
    fn lexes_plain_pitch() {
        assert_eq!(
            kinds("C3"),
            vec![LexToken::PitchLetter { name: 'C', accidental: Accidental::None }, LexToken::Int(3)]
        );
    }

    #[test]
    fn lexes_sharp_fused_to_letter() {
        assert_eq!(
            kinds("F#1"),
            vec![LexToken::PitchLetter { name: 'F', accidental: Accidental::Sharp }, LexToken::Int(1)]
        );
    }

    #[test]
    fn lexes_flat_fused_to_letter() {
        assert_eq!(
            kinds("Gb1"),
            vec![LexToken::PitchLetter { name: 'G', accidental: Accidental::Flat }, LexToken::Int(1)]
        );
    }

    #[test]
    fn lexes_negative_octave() {
        assert_eq!(
            kinds("C-2"),
            vec![
                LexToken::PitchLetter { name: 'C', accidental: Accidental::None },
                LexToken::Dash,
                LexToken::Int(2)
            ]
        );
    }

    #[test]
    fn lexes_velocity_range() {
        assert_eq!(
            kinds("v90-100"),
            vec![LexToken::Letters("v".to_string()), LexToken::Int(90), LexToken::Dash, LexToken::Int(100)]
        );
    }

    #[test]
    fn lexes_time_with_repeat() {
        assert_eq!(
            kinds("1|1x8@0.5"),
            vec![
                LexToken::Int(1),
                LexToken::Pipe,
                LexToken::Int(1),
                LexToken::Letters("x".to_string()),
                LexToken::Int(8),
                LexToken::At,
                LexToken::Decimal(0.5),
            ]
        );
    }

    #[test]
    fn strips_line_and_block_comments() {
        assert_eq!(
            kinds("C3 // trailing\nD4 # also trailing\nE5 /* block */ F6"),
            vec![
                LexToken::PitchLetter { name: 'C', accidental: Accidental::None },
                LexToken::Int(3),
                LexToken::PitchLetter { name: 'D', accidental: Accidental::None },
                LexToken::Int(4),
                LexToken::PitchLetter { name: 'E', accidental: Accidental::None },
                LexToken::Int(5),
                LexToken::PitchLetter { name: 'F', accidental: Accidental::None },
                LexToken::Int(6),
            ]
        );
    }

    #[test]
    fn bare_hash_not_after_pitch_is_a_comment() {
        assert_eq!(kinds("# full line comment\nC3"), kinds("C3"));
    }

    #[test]
    fn mixed_number_fraction_tokens() {
        assert_eq!(
            kinds("t1+1/3"),
            vec![
                LexToken::Letters("t".to_string()),
                LexToken::Int(1),
                LexToken::Plus,
                LexToken::Int(1),
                LexToken::Slash,
                LexToken::Int(3),
            ]
        );
    }

    #[test]
    fn bar_copy_range_tokens() {
        assert_eq!(
            kinds("@2-4=1-2"),
            vec![
                LexToken::At,
                LexToken::Int(2),
                LexToken::Dash,
                LexToken::Int(4),
                LexToken::Equals,
                LexToken::Int(1),
                LexToken::Dash,
                LexToken::Int(2),
            ]
        );
    }
}
