//! # bar|beat parser
//!
//! Recursive-descent parser over [`crate::lexer::Lexer`] output, producing
//! a flat [`TokenStream`] — `Vec<Token>` — per `element` in the grammar:
//!
//! ```text
//! program      := (_ | COMMENT)* (element ((WS | COMMENT)+ element)*)? _?
//! element      := bar_copy | clear | time | pitch | velocity | duration | probability
//! pitch        := pitchClass signedInt
//! velocity     := "v" uint "-" uint | "v" uint
//! duration     := "t" mixedNumber
//! probability  := "p" unsignedFloat
//! time         := (positiveInt "|")? beat
//! beat         := mixedNumber ("x" positiveInt ("@" mixedNumber)?)?
//! bar_copy     := "@" (positiveInt ("-" positiveInt)?) "=" (positiveInt ("-" positiveInt)?)?
//! clear        := "@clear"
//! ```
//!
//! Range validation (pitch/velocity/probability bounds) is deliberately
//! *not* performed here — the grammar admits any numeric literal, and the
//! interpreter is where those numbers first acquire musical meaning.
//! `Token::Pitch` therefore carries a signed `i16` rather than a `u8`, and
//! velocity/probability values are carried as `u32`/`f64` with no clamping.

use crate::error::NotationError;
use crate::lexer::{Accidental, LexToken, Lexer, LocatedToken};

/// A single bar number, or an inclusive range of bar numbers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BarOrRange {
    Single(u32),
    Range(u32, u32),
}

impl BarOrRange {
    pub fn start(&self) -> u32 {
        match self {
            BarOrRange::Single(b) => *b,
            BarOrRange::Range(a, _) => *a,
        }
    }

    pub fn end(&self) -> u32 {
        match self {
            BarOrRange::Single(b) => *b,
            BarOrRange::Range(_, b) => *b,
        }
    }
}

/// A time-position beat value: a scalar beat, or a repeat pattern expanding
/// to several consecutive beats.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Beat {
    Scalar(f64),
    RepeatPattern { start: f64, times: u32, step: Option<f64> },
}

/// One element of the parsed bar|beat token stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Token {
    TimePosition { bar: Option<u32>, beat: Beat },
    Pitch { pitch: i16 },
    Velocity { value: u32 },
    VelocityRange { min: u32, max: u32 },
    Duration { value: f64 },
    Probability { value: f64 },
    /// `@DEST=SRC`, `@DEST_START-DEST_END=SRC`,
    /// `@DEST_START-DEST_END=SRC_START-SRC_END`, or any of those with `SRC`
    /// omitted (defaults to the current bar at interpretation time). One
    /// generalized variant covering the grammar's dest-single/range ×
    /// source-single/range/omitted cases — see DESIGN.md.
    BarCopy { destination: BarOrRange, source: Option<BarOrRange> },
    ClearBuffer,
}

/// A grammar-level [`Token`] tagged with its source position, so the
/// interpreter can build a [`NotationError::OutOfRange`] with `line`/
/// `column` when a pitch, velocity, or probability value turns out to be
/// out of range — a check the parser itself never performs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionedToken {
    pub token: Token,
    pub offset: usize,
    pub line: usize,
    pub column: usize,
}

pub type TokenStream = Vec<PositionedToken>;

pub struct Parser {
    tokens: Vec<LocatedToken>,
    pos: usize,
}

impl Parser {
    /// Lex and parse a full bar|beat program into a flat token stream.
    pub fn parse(source: &str) -> Result<TokenStream, NotationError> {
        let tokens = Lexer::new(source).tokenize()?;
        let mut parser = Parser { tokens, pos: 0 };
        parser.parse_program()
    }

    fn peek(&self) -> Option<&LexToken> {
        self.tokens.get(self.pos).map(|t| &t.token)
    }

    fn peek_at(&self, offset: usize) -> Option<&LexToken> {
        self.tokens.get(self.pos + offset).map(|t| &t.token)
    }

    fn bump(&mut self) -> LexToken {
        let t = self.tokens[self.pos].token.clone();
        self.pos += 1;
        t
    }

    fn error(&self, message: impl Into<String>) -> NotationError {
        let (offset, line, column) = match self.tokens.get(self.pos) {
            Some(t) => (t.offset, t.line, t.column),
            None => {
                let last = self.tokens.last();
                (
                    last.map(|t| t.offset + 1).unwrap_or(0),
                    last.map(|t| t.line).unwrap_or(1),
                    last.map(|t| t.column + 1).unwrap_or(1),
                )
            }
        };
        NotationError::SyntaxError { offset, line, column, message: message.into() }
    }

    fn expect_int(&mut self) -> Result<u64, NotationError> {
        match self.peek() {
            Some(LexToken::Int(n)) => {
                let n = *n;
                self.bump();
                Ok(n)
            }
            _ => Err(self.error("expected a number")),
        }
    }

    fn parse_program(&mut self) -> Result<TokenStream, NotationError> {
        let mut stream = Vec::new();
        while self.pos < self.tokens.len() {
            let start = &self.tokens[self.pos];
            let (offset, line, column) = (start.offset, start.line, start.column);
            let token = self.parse_element()?;
            stream.push(PositionedToken { token, offset, line, column });
        }
        Ok(stream)
    }

    fn parse_element(&mut self) -> Result<Token, NotationError> {
        match self.peek().cloned() {
            Some(LexToken::At) => self.parse_at_element(),
            Some(LexToken::PitchLetter { .. }) => self.parse_pitch(),
            Some(LexToken::Letters(word)) => match word.as_str() {
                "v" => self.parse_velocity(),
                "t" => self.parse_duration(),
                "p" => self.parse_probability(),
                other => Err(self.error(format!("unexpected identifier '{}'", other))),
            },
            Some(LexToken::Int(_)) | Some(LexToken::Pipe) => self.parse_time(),
            Some(other) => Err(self.error(format!("unexpected token {:?}", other))),
            None => Err(self.error("unexpected end of input")),
        }
    }

    // --- pitch ----------------------------------------------------------

    fn parse_pitch(&mut self) -> Result<Token, NotationError> {
        let (name, accidental) = match self.bump() {
            LexToken::PitchLetter { name, accidental } => (name, accidental),
            _ => unreachable!(),
        };
        validate_pitch_class(name, accidental).map_err(|msg| self.error(msg))?;
        let octave = self.parse_signed_int()?;
        let pitch = pitch_class_to_pitch(name, accidental, octave);
        Ok(Token::Pitch { pitch })
    }

    fn parse_signed_int(&mut self) -> Result<i32, NotationError> {
        let negative = matches!(self.peek(), Some(LexToken::Dash));
        if negative {
            self.bump();
        }
        let n = self.expect_int()? as i32;
        Ok(if negative { -n } else { n })
    }

    // --- velocity ---------------------------------------------------------

    fn parse_velocity(&mut self) -> Result<Token, NotationError> {
        self.bump(); // "v"
        let first = self.expect_int()? as u32;
        if matches!(self.peek(), Some(LexToken::Dash)) {
            self.bump();
            let second = self.expect_int()? as u32;
            Ok(Token::VelocityRange { min: first, max: second })
        } else {
            Ok(Token::Velocity { value: first })
        }
    }

    // --- duration / probability --------------------------------------------

    fn parse_duration(&mut self) -> Result<Token, NotationError> {
        self.bump(); // "t"
        let value = self.parse_mixed_number()?;
        Ok(Token::Duration { value })
    }

    fn parse_probability(&mut self) -> Result<Token, NotationError> {
        self.bump(); // "p"
        let value = self.parse_unsigned_float()?;
        Ok(Token::Probability { value })
    }

    fn parse_unsigned_float(&mut self) -> Result<f64, NotationError> {
        match self.bump() {
            LexToken::Decimal(v) => Ok(v),
            LexToken::Int(v) => Ok(v as f64),
            _ => Err(self.error("expected a number")),
        }
    }

    /// `mixedNumber := decimal | Int ("/" Int)? | Int "+" Int "/" Int`
    fn parse_mixed_number(&mut self) -> Result<f64, NotationError> {
        match self.peek().cloned() {
            Some(LexToken::Decimal(v)) => {
                self.bump();
                Ok(v)
            }
            Some(LexToken::Int(whole)) => {
                self.bump();
                if matches!(self.peek(), Some(LexToken::Plus)) {
                    self.bump();
                    let num = self.expect_int()?;
                    if !matches!(self.peek(), Some(LexToken::Slash)) {
                        return Err(self.error("expected '/' in mixed-number fraction"));
                    }
                    self.bump();
                    let den = self.expect_int()?;
                    if den == 0 {
                        return Err(self.error("fraction denominator cannot be zero"));
                    }
                    Ok(whole as f64 + num as f64 / den as f64)
                } else if matches!(self.peek(), Some(LexToken::Slash)) {
                    self.bump();
                    let den = self.expect_int()?;
                    if den == 0 {
                        return Err(self.error("fraction denominator cannot be zero"));
                    }
                    Ok(whole as f64 / den as f64)
                } else {
                    Ok(whole as f64)
                }
            }
            _ => Err(self.error("expected a number")),
        }
    }

    // --- time position ------------------------------------------------------

    fn parse_time(&mut self) -> Result<Token, NotationError> {
        let bar = if matches!(self.peek(), Some(LexToken::Int(_))) && matches!(self.peek_at(1), Some(LexToken::Pipe)) {
            let n = self.expect_int()? as u32;
            self.bump(); // '|'
            Some(n)
        } else if matches!(self.peek(), Some(LexToken::Pipe)) {
            self.bump();
            None
        } else {
            return Err(self.error("expected a time position"));
        };

        let start = self.parse_mixed_number()?;
        let beat = if matches!(self.peek(), Some(LexToken::Letters(w)) if w == "x") {
            self.bump(); // "x"
            let times = self.expect_int()? as u32;
            let step = if matches!(self.peek(), Some(LexToken::At)) {
                self.bump();
                Some(self.parse_mixed_number()?)
            } else {
                None
            };
            Beat::RepeatPattern { start, times, step }
        } else {
            Beat::Scalar(start)
        };

        Ok(Token::TimePosition { bar, beat })
    }

    // --- bar copy / clear ----------------------------------------------------

    fn parse_at_element(&mut self) -> Result<Token, NotationError> {
        self.bump(); // '@'
        if matches!(self.peek(), Some(LexToken::Letters(w)) if w == "clear") {
            self.bump();
            return Ok(Token::ClearBuffer);
        }
        let destination = self.parse_bar_or_range()?;
        if !matches!(self.peek(), Some(LexToken::Equals)) {
            return Err(self.error("expected '=' in bar copy"));
        }
        self.bump(); // '='
        let source = if self.at_bar_or_range_start() {
            Some(self.parse_bar_or_range()?)
        } else {
            None
        };
        Ok(Token::BarCopy { destination, source })
    }

    fn at_bar_or_range_start(&self) -> bool {
        matches!(self.peek(), Some(LexToken::Int(_)))
    }

    fn parse_bar_or_range(&mut self) -> Result<BarOrRange, NotationError> {
        let first = self.expect_int()? as u32;
        if matches!(self.peek(), Some(LexToken::Dash)) {
            self.bump();
            let second = self.expect_int()? as u32;
            if second < first {
                let (_, line, column) = match self.tokens.get(self.pos) {
                    Some(t) => (t.offset, t.line, t.column),
                    None => {
                        let last = self.tokens.last();
                        (
                            last.map(|t| t.offset + 1).unwrap_or(0),
                            last.map(|t| t.line).unwrap_or(1),
                            last.map(|t| t.column + 1).unwrap_or(1),
                        )
                    }
                };
                return Err(NotationError::MalformedBarCopy {
                    message: "bar range end must not precede its start".to_string(),
                    line,
                    column,
                });
            }
            Ok(BarOrRange::Range(first, second))
        } else {
            Ok(BarOrRange::Single(first))
        }
    }
}

/// Reject the enharmonic spellings the grammar's `pitchClass` production
/// omits: `B#`, `Cb`, `E#`, `Fb` (no black key exists between B/C or E/F).
pub(crate) fn validate_pitch_class(name: char, accidental: Accidental) -> Result<(), String> {
    let rejected = matches!(
        (name, accidental),
        ('B', Accidental::Sharp) | ('C', Accidental::Flat) | ('E', Accidental::Sharp) | ('F', Accidental::Flat)
    );
    if rejected {
        Err(format!("'{}{}' is not a valid pitch name", name, accidental_suffix(accidental)))
    } else {
        Ok(())
    }
}

fn accidental_suffix(accidental: Accidental) -> &'static str {
    match accidental {
        Accidental::None => "",
        Accidental::Sharp => "#",
        Accidental::Flat => "b",
    }
}

/// Semitone offset from C within an octave, for each natural note name.
fn natural_offset(name: char) -> i32 {
    match name {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => unreachable!("lexer only produces A..G pitch letters"),
    }
}

/// MIDI pitch number for a pitch-class + octave. Octave 0 is MIDI 24, so
/// `C-2 == 0`, `C3 == 60`, `G8 == 127`. May fall outside `[0, 127]`; the
/// interpreter validates and reports `NotationError::OutOfRange`.
pub(crate) fn pitch_class_to_pitch(name: char, accidental: Accidental, octave: i32) -> i16 {
    let accidental_offset = match accidental {
        Accidental::None => 0,
        Accidental::Sharp => 1,
        Accidental::Flat => -1,
    };
    let value = (octave + 2) * 12 + natural_offset(name) + accidental_offset;
    value as i16
}

/// Parse a bar|beat source string. Convenience wrapper around [`Parser::parse`].
pub fn parse(source: &str) -> Result<TokenStream, NotationError> {
    Parser::parse(source)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(source: &str) -> Vec<Token> {
        parse(source).unwrap().into_iter().map(|p| p.token).collect()
    }

    #[test]
    fn pitch_boundaries() {
        assert_eq!(pitch_class_to_pitch('C', Accidental::None, -2), 0);
        assert_eq!(pitch_class_to_pitch('C', Accidental::None, 3), 60);
        assert_eq!(pitch_class_to_pitch('G', Accidental::None, 8), 127);
    }

    #[test]
    fn rejects_enharmonic_spellings_with_no_black_key() {
        assert!(validate_pitch_class('B', Accidental::Sharp).is_err());
        assert!(validate_pitch_class('C', Accidental::Flat).is_err());
        assert!(validate_pitch_class('E', Accidental::Sharp).is_err());
        assert!(validate_pitch_class('F', Accidental::Flat).is_err());
        assert!(validate_pitch_class('C', Accidental::Sharp).is_ok());
        assert!(validate_pitch_class('D', Accidental::Flat).is_ok());
    }

    #[test]
    fn parses_chord_then_time_position() {
        let tokens = toks("C3 E3 G3 1|1");
        assert_eq!(
            tokens,
            vec![
                Token::Pitch { pitch: 60 },
                Token::Pitch { pitch: 64 },
                Token::Pitch { pitch: 67 },
                Token::TimePosition { bar: Some(1), beat: Beat::Scalar(1.0) },
            ]
        );
    }

    #[test]
    fn parses_implicit_bar_time_position() {
        let tokens = toks("|2");
        assert_eq!(tokens, vec![Token::TimePosition { bar: None, beat: Beat::Scalar(2.0) }]);
    }

    #[test]
    fn parses_velocity_single_and_range() {
        assert_eq!(toks("v90"), vec![Token::Velocity { value: 90 }]);
        assert_eq!(toks("v90-110"), vec![Token::VelocityRange { min: 90, max: 110 }]);
    }

    #[test]
    fn parses_duration_mixed_numbers() {
        assert_eq!(toks("t2"), vec![Token::Duration { value: 2.0 }]);
        assert_eq!(toks("t1.5"), vec![Token::Duration { value: 1.5 }]);
        assert_eq!(toks("t1/3")[0], Token::Duration { value: 1.0 / 3.0 });
        assert_eq!(toks("t1+1/3")[0], Token::Duration { value: 4.0 / 3.0 });
    }

    #[test]
    fn parses_probability() {
        assert_eq!(toks("p0.5"), vec![Token::Probability { value: 0.5 }]);
        assert_eq!(toks("p1"), vec![Token::Probability { value: 1.0 }]);
    }

    #[test]
    fn parses_repeat_pattern_with_explicit_step() {
        let tokens = toks("1|1x8@0.5");
        assert_eq!(
            tokens,
            vec![Token::TimePosition {
                bar: Some(1),
                beat: Beat::RepeatPattern { start: 1.0, times: 8, step: Some(0.5) }
            }]
        );
    }

    #[test]
    fn parses_repeat_pattern_with_default_step() {
        let tokens = toks("1|1x8");
        assert_eq!(
            tokens,
            vec![Token::TimePosition { bar: Some(1), beat: Beat::RepeatPattern { start: 1.0, times: 8, step: None } }]
        );
    }

    #[test]
    fn parses_bar_copy_single_to_single() {
        assert_eq!(
            toks("@2=1"),
            vec![Token::BarCopy { destination: BarOrRange::Single(2), source: Some(BarOrRange::Single(1)) }]
        );
    }

    #[test]
    fn parses_bar_copy_with_omitted_source() {
        assert_eq!(toks("@2="), vec![Token::BarCopy { destination: BarOrRange::Single(2), source: None }]);
    }

    #[test]
    fn parses_bar_copy_range_tiling() {
        assert_eq!(
            toks("@2-4=1"),
            vec![Token::BarCopy { destination: BarOrRange::Range(2, 4), source: Some(BarOrRange::Single(1)) }]
        );
        assert_eq!(
            toks("@3-6=1-2"),
            vec![Token::BarCopy { destination: BarOrRange::Range(3, 6), source: Some(BarOrRange::Range(1, 2)) }]
        );
    }

    #[test]
    fn parses_clear() {
        assert_eq!(toks("@clear"), vec![Token::ClearBuffer]);
    }

    #[test]
    fn inverted_bar_copy_range_is_malformed() {
        let err = parse("@4-2=1").unwrap_err();
        assert!(matches!(err, NotationError::MalformedBarCopy { .. }));
    }

    #[test]
    fn whitespace_and_comments_are_transparent() {
        let a = toks("C3   1|1");
        let b = toks("C3 // a chord\n1|1 # trailing\n");
        assert_eq!(a, b);
    }

    #[test]
    fn syntax_error_reports_position() {
        let err = parse("v90 & bad").unwrap_err();
        match err {
            NotationError::SyntaxError { line, column, .. } => {
                assert_eq!(line, 1);
                assert_eq!(column, 5);
            }
            other => panic!("expected SyntaxError, got {:?}", other),
        }
    }
}
