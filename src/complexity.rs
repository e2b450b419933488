//! Complexity label parsing and canonical comparison.
//!
//! Labels are products of power-law and logarithmic terms in the problem
//! size `n` and process count `p`, e.g. `p^(1/4) * log2(p)^(1)` or
//! `n^(3/2)`. Each label is parsed into a [`ComplexityExpr`]: an ordered set
//! of `(base, exponent)` factors with exact rational exponents. Two labels
//! match iff their canonical forms are identical.
//!
//! LLM output is frequently malformed, so [`compare`] never fails: anything
//! that does not parse is simply a non-match.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors produced while parsing a complexity label
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Empty complexity expression")]
    Empty,

    #[error("Unexpected character '{found}' at offset {offset}")]
    UnexpectedChar { found: char, offset: usize },

    #[error("Unexpected end of expression")]
    UnexpectedEnd,

    #[error("Unknown base term: {0}")]
    UnknownBase(String),

    #[error("Invalid exponent: {0}")]
    InvalidExponent(String),

    #[error("Trailing input after expression: {0}")]
    TrailingInput(String),
}

// ============================================================================
// Rational exponents
// ============================================================================

/// Exact rational number, always stored reduced with a positive denominator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rational {
    num: i64,
    den: i64,
}

const fn gcd(mut a: i64, mut b: i64) -> i64 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a.abs()
}

impl Rational {
    /// Zero
    pub const ZERO: Self = Self { num: 0, den: 1 };
    /// One
    pub const ONE: Self = Self { num: 1, den: 1 };

    /// Create a reduced rational. Returns `None` for a zero denominator.
    #[must_use]
    pub const fn new(num: i64, den: i64) -> Option<Self> {
        if den == 0 || num == i64::MIN || den == i64::MIN {
            return None;
        }
        let g = gcd(num, den);
        let (mut num, mut den) = (num / g, den / g);
        if den < 0 {
            num = -num;
            den = -den;
        }
        Some(Self { num, den })
    }

    /// Integer rational
    #[must_use]
    pub const fn integer(value: i64) -> Self {
        Self { num: value, den: 1 }
    }

    /// Numerator of the reduced form
    #[must_use]
    pub const fn numer(&self) -> i64 {
        self.num
    }

    /// Denominator of the reduced form (always positive)
    #[must_use]
    pub const fn denom(&self) -> i64 {
        self.den
    }

    /// Whether this is zero
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.num == 0
    }

    /// Checked addition, `None` on overflow
    #[must_use]
    pub fn checked_add(self, other: Self) -> Option<Self> {
        let num = self
            .num
            .checked_mul(other.den)?
            .checked_add(other.num.checked_mul(self.den)?)?;
        let den = self.den.checked_mul(other.den)?;
        Self::new(num, den)
    }

    /// Parse a plain decimal literal (`2`, `1.5`, `-0.25`) exactly
    fn from_decimal(text: &str) -> Option<Self> {
        let (negative, digits) = match text.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, text.strip_prefix('+').unwrap_or(text)),
        };
        let (int_part, frac_part) = digits.split_once('.').unwrap_or((digits, ""));
        if int_part.is_empty() && frac_part.is_empty() {
            return None;
        }
        if !int_part.chars().chain(frac_part.chars()).all(|c| c.is_ascii_digit()) {
            return None;
        }
        let frac_part = frac_part.trim_end_matches('0');

        let scale = 10_i64.checked_pow(u32::try_from(frac_part.len()).ok()?)?;
        let whole: i64 = if int_part.is_empty() { 0 } else { int_part.parse().ok()? };
        let frac: i64 = if frac_part.is_empty() { 0 } else { frac_part.parse().ok()? };
        let num = whole.checked_mul(scale)?.checked_add(frac)?;
        Self::new(if negative { -num } else { num }, scale)
    }
}

impl Ord for Rational {
    fn cmp(&self, other: &Self) -> Ordering {
        // Denominators are positive, so cross-multiplication preserves order
        (i128::from(self.num) * i128::from(other.den))
            .cmp(&(i128::from(other.num) * i128::from(self.den)))
    }
}

impl PartialOrd for Rational {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.den == 1 {
            write!(f, "{}", self.num)
        } else {
            write!(f, "{}/{}", self.num, self.den)
        }
    }
}

// ============================================================================
// Canonical expression
// ============================================================================

/// Base term of a complexity factor, in canonical display order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Base {
    /// Problem size
    N,
    /// Number of processes
    P,
    /// Base-2 logarithm of the number of processes
    Log2P,
}

impl Base {
    /// Textual form of the base
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::N => "n",
            Self::P => "p",
            Self::Log2P => "log2(p)",
        }
    }
}

impl fmt::Display for Base {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical product of `(base, exponent)` factors
///
/// Repeated bases are merged by summing exponents and zero exponents are
/// dropped, so structurally equal expressions compare equal with `==`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ComplexityExpr {
    factors: BTreeMap<Base, Rational>,
}

impl ComplexityExpr {
    /// The constant expression (empty product)
    #[must_use]
    pub fn constant() -> Self {
        Self::default()
    }

    /// Whether this is the constant expression
    #[must_use]
    pub fn is_constant(&self) -> bool {
        self.factors.is_empty()
    }

    /// Exponent of `base`, zero if absent
    #[must_use]
    pub fn exponent(&self, base: Base) -> Rational {
        self.factors.get(&base).copied().unwrap_or(Rational::ZERO)
    }

    /// Factors in canonical base order
    pub fn factors(&self) -> impl Iterator<Item = (Base, Rational)> + '_ {
        self.factors.iter().map(|(b, e)| (*b, *e))
    }

    fn multiply(&mut self, base: Base, exponent: Rational) -> Result<(), ParseError> {
        let current = self.exponent(base);
        let merged = current
            .checked_add(exponent)
            .ok_or_else(|| ParseError::InvalidExponent(format!("{current} + {exponent}")))?;
        if merged.is_zero() {
            self.factors.remove(&base);
        } else {
            self.factors.insert(base, merged);
        }
        Ok(())
    }
}

impl fmt::Display for ComplexityExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.factors.is_empty() {
            return f.write_str("constant");
        }
        for (i, (base, exponent)) in self.factors().enumerate() {
            if i > 0 {
                f.write_str(" * ")?;
            }
            write!(f, "{base}^({exponent})")?;
        }
        Ok(())
    }
}

impl FromStr for ComplexityExpr {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Err(ParseError::Empty);
        }
        Parser::new(s).parse_expression()
    }
}

/// Parse a label into its canonical form
///
/// # Errors
///
/// Returns a [`ParseError`] describing the first malformed token.
pub fn parse(label: &str) -> Result<ComplexityExpr, ParseError> {
    label.parse()
}

/// Compare a predicted label against ground truth on canonical forms.
///
/// Returns false if either side fails to parse.
#[must_use]
pub fn compare(predicted: &str, ground_truth: &str) -> bool {
    match (parse(predicted), parse(ground_truth)) {
        (Ok(pred), Ok(truth)) => pred == truth,
        (pred, truth) => {
            tracing::trace!(
                predicted,
                ground_truth,
                predicted_ok = pred.is_ok(),
                ground_truth_ok = truth.is_ok(),
                "Label failed to parse, treating as mismatch"
            );
            false
        }
    }
}

// ============================================================================
// Recursive-descent parser; whitespace is allowed between tokens only
// ============================================================================

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    const fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn skip_ws(&mut self) {
        let trimmed = self.rest().trim_start();
        self.pos = self.input.len() - trimmed.len();
    }

    /// Next non-whitespace character
    fn peek(&mut self) -> Option<char> {
        self.skip_ws();
        self.rest().chars().next()
    }

    fn eat(&mut self, prefix: &str) -> bool {
        self.skip_ws();
        if self.rest().starts_with(prefix) {
            self.pos += prefix.len();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, c: char) -> Result<(), ParseError> {
        match self.peek() {
            Some(found) if found == c => {
                self.pos += c.len_utf8();
                Ok(())
            }
            Some(found) => Err(ParseError::UnexpectedChar {
                found,
                offset: self.pos,
            }),
            None => Err(ParseError::UnexpectedEnd),
        }
    }

    fn parse_expression(&mut self) -> Result<ComplexityExpr, ParseError> {
        let wrapped = self.eat("O");
        if wrapped {
            self.expect('(')?;
        }
        let expr = self.parse_product()?;
        if wrapped {
            self.expect(')')?;
        }
        self.skip_ws();
        if !self.rest().is_empty() {
            return Err(ParseError::TrailingInput(self.rest().to_string()));
        }
        Ok(expr)
    }

    fn parse_product(&mut self) -> Result<ComplexityExpr, ParseError> {
        let mut expr = ComplexityExpr::constant();
        loop {
            self.parse_factor(&mut expr)?;
            if !self.eat("*") {
                return Ok(expr);
            }
        }
    }

    fn parse_factor(&mut self, expr: &mut ComplexityExpr) -> Result<(), ParseError> {
        if self.eat("constant") {
            return Ok(());
        }
        let bare_one = self.peek() == Some('1')
            && !self.rest()[1..].starts_with(|c: char| c.is_ascii_digit() || c == '.');
        if bare_one {
            self.pos += 1;
            return Ok(());
        }

        let base = self.parse_base()?;
        let exponent = if self.eat("^") {
            self.parse_exponent()?
        } else {
            Rational::ONE
        };
        expr.multiply(base, exponent)
    }

    /// A base, optionally wrapped in one pair of parentheses
    fn parse_base(&mut self) -> Result<Base, ParseError> {
        if self.eat("(") {
            let base = self.parse_bare_base()?;
            self.expect(')')?;
            return Ok(base);
        }
        self.parse_bare_base()
    }

    fn parse_bare_base(&mut self) -> Result<Base, ParseError> {
        if self.eat("log2") {
            return if self.eat("(") && self.eat("p") && self.eat(")") {
                Ok(Base::Log2P)
            } else {
                Err(ParseError::UnknownBase("log2".to_string()))
            };
        }
        match self.peek() {
            Some('n') => {
                self.pos += 1;
                Ok(Base::N)
            }
            Some('p') => {
                self.pos += 1;
                Ok(Base::P)
            }
            Some(_) => {
                let word: String = self
                    .rest()
                    .chars()
                    .take_while(|c| c.is_alphanumeric() || *c == '(' || *c == ')')
                    .collect();
                Err(ParseError::UnknownBase(word))
            }
            None => Err(ParseError::UnexpectedEnd),
        }
    }

    fn parse_exponent(&mut self) -> Result<Rational, ParseError> {
        if self.eat("(") {
            let numerator = self.parse_number()?;
            let value = if self.eat("/") {
                let denominator = self.parse_number()?;
                if denominator.is_zero() {
                    return Err(ParseError::InvalidExponent("division by zero".to_string()));
                }
                divide(numerator, denominator)?
            } else {
                numerator
            };
            self.expect(')')?;
            Ok(value)
        } else {
            self.parse_number()
        }
    }

    fn parse_number(&mut self) -> Result<Rational, ParseError> {
        self.skip_ws();
        let rest = self.rest();
        let len = rest
            .char_indices()
            .take_while(|&(i, c)| c.is_ascii_digit() || c == '.' || (i == 0 && (c == '-' || c == '+')))
            .map(|(i, c)| i + c.len_utf8())
            .last()
            .unwrap_or(0);
        if len == 0 {
            return match self.peek() {
                Some(found) => Err(ParseError::UnexpectedChar {
                    found,
                    offset: self.pos,
                }),
                None => Err(ParseError::UnexpectedEnd),
            };
        }
        let text = &rest[..len];
        let value =
            Rational::from_decimal(text).ok_or_else(|| ParseError::InvalidExponent(text.to_string()))?;
        self.pos += len;
        Ok(value)
    }
}

fn divide(a: Rational, b: Rational) -> Result<Rational, ParseError> {
    let overflow = || ParseError::InvalidExponent(format!("{a} / {b}"));
    let num = a.numer().checked_mul(b.denom()).ok_or_else(overflow)?;
    let den = a.denom().checked_mul(b.numer()).ok_or_else(overflow)?;
    Rational::new(num, den).ok_or_else(overflow)
}

// ============================================================================
// Free-text extraction
// ============================================================================

/// Prefixes LLMs commonly put before the label, matched case-insensitively
const ANSWER_PREFIXES: &[&str] = &[
    "the time complexity is",
    "time complexity is",
    "time complexity:",
    "the complexity is",
    "complexity is",
    "complexity:",
    "final label:",
    "answer:",
];

/// Pull the label out of a raw LLM answer.
///
/// Each line is stripped of code fences, backticks, quotes, markdown
/// emphasis, a known answer prefix and a trailing period. The last cleaned
/// line that parses as a label wins, so an answer followed by an explanation
/// still matches; otherwise the last non-empty line is returned unvalidated.
#[must_use]
pub fn extract_label(raw: &str) -> String {
    let mut candidates = raw
        .lines()
        .rev()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with("```"))
        .map(clean_line)
        .filter(|l| !l.is_empty())
        .peekable();

    let fallback = candidates.peek().cloned().unwrap_or_default();
    candidates
        .find(|l| parse(l).is_ok())
        .unwrap_or(fallback)
}

/// Quotes, backticks, markdown emphasis and surrounding whitespace
fn is_wrapper(c: char) -> bool {
    matches!(c, '`' | '"' | '\'' | '*') || c.is_whitespace()
}

fn clean_line(line: &str) -> String {
    let mut text = line.trim_matches(is_wrapper);

    for prefix in ANSWER_PREFIXES {
        if text.len() >= prefix.len()
            && text.is_char_boundary(prefix.len())
            && text[..prefix.len()].eq_ignore_ascii_case(prefix)
        {
            text = text[prefix.len()..].trim();
            break;
        }
    }

    text.trim_matches(is_wrapper)
        .trim_end_matches('.')
        .trim_matches(is_wrapper)
        .to_string()
}
