//! Lexer for one line of modulation-expression source.
//!
//! Structurally parallel to [`crate::lexer`]: pitch letters fuse an
//! immediately following accidental exactly as the bar|beat lexer does, so
//! `pitchRange` (`C3-C5`) lexes the same way a bar|beat `pitch` token
//! does. Unlike the bar|beat lexer, a letter run starting with a
//! *lowercase* letter is captured whole (including embedded uppercase,
//! e.g. `velocityDeviation`) as one [`ModToken::Ident`], since this
//! grammar's identifiers are camelCase, not single-letter keywords.

use crate::error::NotationError;
use crate::lexer::Accidental;

#[derive(Debug, Clone, PartialEq)]
pub enum ModToken {
    PitchLetter { name: char, accidental: Accidental },
    Ident(String),
    Int(u64),
    Decimal(f64),
    Pipe,
    Dash,
    Plus,
    PlusEquals,
    Equals,
    Star,
    Slash,
    Dot,
    LParen,
    RParen,
    Comma,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocatedModToken {
    pub token: ModToken,
    pub column: usize,
}

pub struct ModLexer<'a> {
    input: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    line: usize,
    column: usize,
}

impl<'a> ModLexer<'a> {
    pub fn new(input: &'a str, line: usize) -> Self {
        Self { input, chars: input.char_indices().peekable(), line, column: 1 }
    }

    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().map(|&(_, c)| c)
    }

    fn advance(&mut self) -> Option<(usize, char)> {
        let (offset, c) = self.chars.next()?;
        self.column += 1;
        Some((offset, c))
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

    fn error_at(&self, column: usize, message: impl Into<String>) -> NotationError {
        NotationError::SyntaxError { offset: 0, line: self.line, column, message: message.into() }
    }

    pub fn tokenize(&mut self) -> Result<Vec<LocatedModToken>, NotationError> {
        let mut tokens = Vec::new();

        loop {
            let column = self.column;
            let c = match self.peek_char() {
                Some(c) => c,
                None => break,
            };

            if c.is_whitespace() {
                self.advance();
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
                tokens.push(LocatedModToken { token: ModToken::PitchLetter { name: c, accidental }, column });
                continue;
            }

            if c.is_ascii_alphabetic() {
                let mut s = String::new();
                while let Some(c) = self.peek_char() {
                    if c.is_ascii_alphanumeric() {
                        s.push(c);
                        self.advance();
                    } else {
                        break;
                    }
                }
                tokens.push(LocatedModToken { token: ModToken::Ident(s), column });
                continue;
            }

            if c.is_ascii_digit() {
                let whole = self.consume_digits();
                if self.peek_char() == Some('.') {
                    let mut after_dot = self.chars.clone();
                    after_dot.next();
                    let has_frac_digit = matches!(after_dot.peek(), Some((_, d)) if d.is_ascii_digit());
                    if has_frac_digit {
                        self.advance();
                        let frac = self.consume_digits();
                        let text = format!("{}.{}", whole, frac);
                        let value: f64 = text
                            .parse()
                            .map_err(|_| self.error_at(column, format!("invalid decimal number '{}'", text)))?;
                        tokens.push(LocatedModToken { token: ModToken::Decimal(value), column });
                        continue;
                    }
                }
                let value: u64 =
                    whole.parse().map_err(|_| self.error_at(column, format!("invalid integer '{}'", whole)))?;
                tokens.push(LocatedModToken { token: ModToken::Int(value), column });
                continue;
            }

            if c == '+' {
                self.advance();
                if self.peek_char() == Some('=') {
                    self.advance();
                    tokens.push(LocatedModToken { token: ModToken::PlusEquals, column });
                } else {
                    tokens.push(LocatedModToken { token: ModToken::Plus, column });
                }
                continue;
            }

            let single = match c {
                '|' => ModToken::Pipe,
                '-' => ModToken::Dash,
                '=' => ModToken::Equals,
                '*' => ModToken::Star,
                '/' => ModToken::Slash,
                '.' => ModToken::Dot,
                '(' => ModToken::LParen,
                ')' => ModToken::RParen,
                ',' => ModToken::Comma,
                _ => return Err(self.error_at(column, format!("unexpected character '{}'", c))),
            };
            self.advance();
            tokens.push(LocatedModToken { token: single, column });
        }

        let _ = self.input;
        Ok(tokens)
    }
}
