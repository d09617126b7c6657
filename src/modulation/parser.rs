//! # Modulation-expression parser
//!
//! Recursive-descent over [`super::lexer::ModLexer`] output, one line at a
//! time:
//!
//! ```text
//! assign     := pitchRange? timeRange? IDENT ("+=" | "=") expression
//! pitchRange := pitch "-" pitch
//! timeRange  := bar "|" beat "-" bar "|" beat
//! expression := term (("+" | "-") term)*
//! term       := factor (("*" | "/") factor)*
//! factor     := "-" factor | number | period | "note" "." IDENT
//!             | IDENT "(" (expression ("," expression)*)? ")" | "(" expression ")"
//! period     := mixedNumber ("|" mixedNumber)? "t"
//! ```
//!
//! A line whose filters (`pitchRange`/`timeRange`) are present but whose
//! trailing assignment is absent is a no-op (`Ok(None)`), matching the
//! core's blank-line leniency. Persistence of a filter across *later*
//! lines that omit it is handled by [`super::eval`], not here: this parser
//! only ever reports the filter a line explicitly wrote.

use crate::error::NotationError;
use crate::parser::{pitch_class_to_pitch, validate_pitch_class};

use super::lexer::{LocatedModToken, ModLexer, ModToken};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parameter {
    Velocity,
    Timing,
    Duration,
    Probability,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Add,
    Set,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variable {
    Pitch,
    Start,
    Velocity,
    VelocityDeviation,
    Duration,
    Probability,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprNode {
    Number(f64),
    Variable(Variable),
    /// A literal period, e.g. `1|0t`: `bars` full bars plus `beats`
    /// musical beats, resolved to musical beats by the evaluator as
    /// `bars * num + beats`.
    Period { bars: u32, beats: f64 },
    BinOp { op: BinOp, left: Box<ExprNode>, right: Box<ExprNode> },
    Call { name: String, args: Vec<ExprNode> },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeRange {
    pub start_bar: u32,
    pub start_beat: f64,
    pub end_bar: u32,
    pub end_beat: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModulationAssignment {
    pub parameter: Parameter,
    pub operator: Operator,
    pub expression: ExprNode,
    pub pitch_range: Option<(u8, u8)>,
    pub time_range: Option<TimeRange>,
}

/// Parse a full modulation source: one assignment (or no-op) per line.
pub fn parse(source: &str) -> Result<Vec<ModulationAssignment>, NotationError> {
    let mut assignments = Vec::new();
    for (idx, raw_line) in source.lines().enumerate() {
        let line_no = idx + 1;
        if raw_line.trim().is_empty() {
            continue;
        }
        let tokens = ModLexer::new(raw_line, line_no).tokenize()?;
        if tokens.is_empty() {
            continue;
        }
        let mut parser = LineParser { tokens, pos: 0, line: line_no };
        if let Some(assignment) = parser.parse_line()? {
            assignments.push(assignment);
        }
    }
    Ok(assignments)
}

struct LineParser {
    tokens: Vec<LocatedModToken>,
    pos: usize,
    line: usize,
}

impl LineParser {
    fn peek(&self) -> Option<&ModToken> {
        self.tokens.get(self.pos).map(|t| &t.token)
    }

    fn peek_at(&self, offset: usize) -> Option<&ModToken> {
        self.tokens.get(self.pos + offset).map(|t| &t.token)
    }

    fn bump(&mut self) -> ModToken {
        let t = self.tokens[self.pos].token.clone();
        self.pos += 1;
        t
    }

    fn column(&self) -> usize {
        self.tokens.get(self.pos).or_else(|| self.tokens.last()).map(|t| t.column).unwrap_or(1)
    }

    fn error(&self, message: impl Into<String>) -> NotationError {
        NotationError::SyntaxError { offset: 0, line: self.line, column: self.column(), message: message.into() }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn parse_line(&mut self) -> Result<Option<ModulationAssignment>, NotationError> {
        let pitch_range = self.parse_pitch_range()?;
        let time_range = self.parse_time_range()?;

        if self.at_end() {
            return Ok(None);
        }

        let parameter = self.parse_parameter()?;
        let operator = match self.peek() {
            Some(ModToken::PlusEquals) => {
                self.bump();
                Operator::Add
            }
            Some(ModToken::Equals) => {
                self.bump();
                Operator::Set
            }
            _ => return Err(self.error("expected '=' or '+=' after parameter name")),
        };
        let expression = self.parse_expression()?;
        if !self.at_end() {
            return Err(self.error("unexpected trailing tokens after expression"));
        }

        Ok(Some(ModulationAssignment { parameter, operator, expression, pitch_range, time_range }))
    }

    fn parse_parameter(&mut self) -> Result<Parameter, NotationError> {
        match self.bump() {
            ModToken::Ident(name) => match name.as_str() {
                "velocity" => Ok(Parameter::Velocity),
                "timing" => Ok(Parameter::Timing),
                "duration" => Ok(Parameter::Duration),
                "probability" => Ok(Parameter::Probability),
                other => Err(self.error(format!("'{}' is not a modulatable parameter", other))),
            },
            other => Err(self.error(format!("expected a parameter name, found {:?}", other))),
        }
    }

    fn parse_pitch_range(&mut self) -> Result<Option<(u8, u8)>, NotationError> {
        if !matches!(self.peek(), Some(ModToken::PitchLetter { .. })) {
            return Ok(None);
        }
        let start = self.parse_pitch()?;
        if !matches!(self.peek(), Some(ModToken::Dash)) {
            return Err(self.error("expected '-' in pitch range"));
        }
        self.bump();
        let end = self.parse_pitch()?;
        Ok(Some((start, end)))
    }

    fn parse_pitch(&mut self) -> Result<u8, NotationError> {
        let (name, accidental) = match self.bump() {
            ModToken::PitchLetter { name, accidental } => (name, accidental),
            _ => unreachable!("caller checked PitchLetter"),
        };
        validate_pitch_class(name, accidental).map_err(|msg| self.error(msg))?;
        let negative = matches!(self.peek(), Some(ModToken::Dash));
        if negative {
            self.bump();
        }
        let octave = match self.bump() {
            ModToken::Int(n) => n as i32,
            _ => return Err(self.error("expected an octave number after pitch letter")),
        };
        let octave = if negative { -octave } else { octave };
        let pitch = pitch_class_to_pitch(name, accidental, octave);
        if !(0..=127).contains(&pitch) {
            return Err(self.error(format!("pitch '{}{}{}' is out of MIDI range", name, accidental_str(accidental), octave)));
        }
        Ok(pitch as u8)
    }

    /// A `timeRange` always starts `Int Pipe`; a bare `Int` at this
    /// position without a following `Pipe` is not a time range (it would
    /// be ambiguous with a numeric expression, but expressions never
    /// appear in prefix position, so this lookahead is unambiguous).
    fn parse_time_range(&mut self) -> Result<Option<TimeRange>, NotationError> {
        if !(matches!(self.peek(), Some(ModToken::Int(_))) && matches!(self.peek_at(1), Some(ModToken::Pipe))) {
            return Ok(None);
        }
        let (start_bar, start_beat) = self.parse_bar_beat()?;
        if !matches!(self.peek(), Some(ModToken::Dash)) {
            return Err(self.error("expected '-' in time range"));
        }
        self.bump();
        let (end_bar, end_beat) = self.parse_bar_beat()?;
        Ok(Some(TimeRange { start_bar, start_beat, end_bar, end_beat }))
    }

    fn parse_bar_beat(&mut self) -> Result<(u32, f64), NotationError> {
        let bar = match self.bump() {
            ModToken::Int(n) => n as u32,
            _ => return Err(self.error("expected a bar number")),
        };
        if !matches!(self.peek(), Some(ModToken::Pipe)) {
            return Err(self.error("expected '|' after bar number"));
        }
        self.bump();
        let beat = self.parse_mixed_number()?;
        Ok((bar, beat))
    }

    // --- expression grammar -------------------------------------------------

    fn parse_expression(&mut self) -> Result<ExprNode, NotationError> {
        let mut node = self.parse_term()?;
        loop {
            let op = match self.peek() {
                Some(ModToken::Plus) => BinOp::Add,
                Some(ModToken::Dash) => BinOp::Sub,
                _ => break,
            };
            self.bump();
            let right = self.parse_term()?;
            node = ExprNode::BinOp { op, left: Box::new(node), right: Box::new(right) };
        }
        Ok(node)
    }

    fn parse_term(&mut self) -> Result<ExprNode, NotationError> {
        let mut node = self.parse_factor()?;
        loop {
            let op = match self.peek() {
                Some(ModToken::Star) => BinOp::Mul,
                Some(ModToken::Slash) => BinOp::Div,
                _ => break,
            };
            self.bump();
            let right = self.parse_factor()?;
            node = ExprNode::BinOp { op, left: Box::new(node), right: Box::new(right) };
        }
        Ok(node)
    }

    fn parse_factor(&mut self) -> Result<ExprNode, NotationError> {
        if matches!(self.peek(), Some(ModToken::Dash)) {
            self.bump();
            let operand = self.parse_factor()?;
            return Ok(ExprNode::BinOp { op: BinOp::Sub, left: Box::new(ExprNode::Number(0.0)), right: Box::new(operand) });
        }

        if matches!(self.peek(), Some(ModToken::LParen)) {
            self.bump();
            let inner = self.parse_expression()?;
            if !matches!(self.peek(), Some(ModToken::RParen)) {
                return Err(self.error("expected ')'"));
            }
            self.bump();
            return Ok(inner);
        }

        if matches!(self.peek(), Some(ModToken::Int(_)) | Some(ModToken::Decimal(_))) {
            return self.parse_number_or_period();
        }

        match self.peek().cloned() {
            Some(ModToken::Ident(name)) if name == "note" => {
                self.bump();
                if !matches!(self.peek(), Some(ModToken::Dot)) {
                    return Err(self.error("expected '.' after 'note'"));
                }
                self.bump();
                let field = match self.bump() {
                    ModToken::Ident(field) => field,
                    other => return Err(self.error(format!("expected a field name after 'note.', found {:?}", other))),
                };
                let variable = match field.as_str() {
                    "pitch" => Variable::Pitch,
                    "start" => Variable::Start,
                    "velocity" => Variable::Velocity,
                    "velocityDeviation" => Variable::VelocityDeviation,
                    "duration" => Variable::Duration,
                    "probability" => Variable::Probability,
                    other => return Err(NotationError::UnknownIdentifier { name: format!("note.{}", other) }),
                };
                Ok(ExprNode::Variable(variable))
            }
            Some(ModToken::Ident(name)) => {
                self.bump();
                if matches!(self.peek(), Some(ModToken::LParen)) {
                    self.bump();
                    let mut args = Vec::new();
                    if !matches!(self.peek(), Some(ModToken::RParen)) {
                        args.push(self.parse_expression()?);
                        while matches!(self.peek(), Some(ModToken::Comma)) {
                            self.bump();
                            args.push(self.parse_expression()?);
                        }
                    }
                    if !matches!(self.peek(), Some(ModToken::RParen)) {
                        return Err(self.error("expected ')' after call arguments"));
                    }
                    self.bump();
                    Ok(ExprNode::Call { name, args })
                } else {
                    Err(NotationError::UnknownIdentifier { name })
                }
            }
            other => Err(self.error(format!("unexpected token in expression: {:?}", other))),
        }
    }

    /// Parses a leading `mixedNumber`, then decides whether it continues
    /// into a `period` (`("|" mixedNumber)? "t"`) or stands alone as a
    /// plain `Number`.
    fn parse_number_or_period(&mut self) -> Result<ExprNode, NotationError> {
        let first = self.parse_mixed_number()?;

        if matches!(self.peek(), Some(ModToken::Pipe)) {
            self.bump();
            let beats = self.parse_mixed_number()?;
            if !matches!(self.peek(), Some(ModToken::Ident(t)) if t == "t") {
                return Err(self.error("expected 't' to close a bar|beat period literal"));
            }
            self.bump();
            return Ok(ExprNode::Period { bars: first as u32, beats });
        }

        if matches!(self.peek(), Some(ModToken::Ident(t)) if t == "t") {
            self.bump();
            return Ok(ExprNode::Period { bars: 0, beats: first });
        }

        Ok(ExprNode::Number(first))
    }

    /// `mixedNumber := decimal | Int ("/" Int)? | Int "+" Int "/" Int`
    fn parse_mixed_number(&mut self) -> Result<f64, NotationError> {
        match self.peek().cloned() {
            Some(ModToken::Decimal(v)) => {
                self.bump();
                Ok(v)
            }
            Some(ModToken::Int(whole)) => {
                self.bump();
                if matches!(self.peek(), Some(ModToken::Plus)) {
                    self.bump();
                    let num = self.expect_int()?;
                    if !matches!(self.peek(), Some(ModToken::Slash)) {
                        return Err(self.error("expected '/' in mixed-number fraction"));
                    }
                    self.bump();
                    let den = self.expect_int()?;
                    if den == 0 {
                        return Err(self.error("fraction denominator cannot be zero"));
                    }
                    Ok(whole as f64 + num as f64 / den as f64)
                } else if matches!(self.peek(), Some(ModToken::Slash)) {
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

    fn expect_int(&mut self) -> Result<u64, NotationError> {
        match self.peek() {
            Some(ModToken::Int(n)) => {
                let n = *n;
                self.bump();
                Ok(n)
            }
            _ => Err(self.error("expected a number")),
        }
    }
}

fn accidental_str(accidental: crate::lexer::Accidental) -> &'static str {
    match accidental {
        crate::lexer::Accidental::None => "",
        crate::lexer::Accidental::Sharp => "#",
        crate::lexer::Accidental::Flat => "b",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_velocity_assignment() {
        let assignments = parse("velocity += 10").unwrap();
        assert_eq!(assignments.len(), 1);
        let a = &assignments[0];
        assert_eq!(a.parameter, Parameter::Velocity);
        assert_eq!(a.operator, Operator::Add);
        assert_eq!(a.expression, ExprNode::Number(10.0));
        assert_eq!(a.pitch_range, None);
        assert_eq!(a.time_range, None);
    }

    #[test]
    fn parses_pitch_range_prefix() {
        let assignments = parse("C3-C5 velocity = 127").unwrap();
        assert_eq!(assignments[0].pitch_range, Some((60, 84)));
    }

    #[test]
    fn parses_time_range_prefix() {
        let assignments = parse("1|1-2|4 timing += 0.1").unwrap();
        assert_eq!(
            assignments[0].time_range,
            Some(TimeRange { start_bar: 1, start_beat: 1.0, end_bar: 2, end_beat: 4.0 })
        );
    }

    #[test]
    fn blank_and_filter_only_lines_are_no_ops() {
        let assignments = parse("\nC3-C5\nvelocity = 1\n").unwrap();
        assert_eq!(assignments.len(), 1);
    }

    #[test]
    fn parses_note_dot_velocity_and_binary_expression() {
        let assignments = parse("velocity = note.velocity + 10").unwrap();
        assert_eq!(
            assignments[0].expression,
            ExprNode::BinOp {
                op: BinOp::Add,
                left: Box::new(ExprNode::Variable(Variable::Velocity)),
                right: Box::new(ExprNode::Number(10.0)),
            }
        );
    }

    #[test]
    fn parses_function_call_with_period_argument() {
        let assignments = parse("velocity += 20*cos(1|0t)").unwrap();
        match &assignments[0].expression {
            ExprNode::BinOp { op: BinOp::Mul, left, right } => {
                assert_eq!(**left, ExprNode::Number(20.0));
                assert_eq!(**right, ExprNode::Call {
                    name: "cos".to_string(),
                    args: vec![ExprNode::Period { bars: 1, beats: 0.0 }],
                });
            }
            other => panic!("expected multiplication, got {:?}", other),
        }
    }

    #[test]
    fn parses_unary_minus_and_parens() {
        let assignments = parse("velocity = -(note.velocity - 5)").unwrap();
        match &assignments[0].expression {
            ExprNode::BinOp { op: BinOp::Sub, left, right } => {
                assert_eq!(**left, ExprNode::Number(0.0));
                match &**right {
                    ExprNode::BinOp { op: BinOp::Sub, .. } => {}
                    other => panic!("expected inner subtraction, got {:?}", other),
                }
            }
            other => panic!("expected negation, got {:?}", other),
        }
    }

    #[test]
    fn unknown_bare_identifier_is_fatal() {
        let err = parse("velocity = bogus").unwrap_err();
        assert!(matches!(err, NotationError::UnknownIdentifier { name } if name == "bogus"));
    }

    #[test]
    fn unknown_note_field_is_fatal() {
        let err = parse("velocity = note.bogus").unwrap_err();
        assert!(matches!(err, NotationError::UnknownIdentifier { name } if name == "note.bogus"));
    }
}
