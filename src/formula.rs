//! Formula evaluation engine.
//!
//! Formulas are arithmetic expressions over row names, e.g. `"principal *
//! rate / 12"`. Evaluation resolves names against the rows of the local table
//! plus every other table on the canvas, substitutes their numeric values,
//! and computes the result with standard operator precedence.
//!
//! The engine is a plain tokenizer plus recursive-descent evaluator: row
//! names are matched as whole identifier tokens against a symbol table, so a
//! short name can never match inside a longer one, and no dynamic code
//! execution is involved anywhere.
//!
//! The public entry point [`evaluate_formula`] never fails outward: any
//! failure evaluates to `0.0` and is reported on the log. Callers that need
//! to distinguish "genuinely zero" from "failed" use
//! [`evaluate_formula_checked`].

use crate::types::{Row, RowValue, Table};
use std::collections::HashMap;
use thiserror::Error;

/// Why a formula failed to evaluate.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormulaError {
    /// The formula names something no row provides
    #[error("unresolved reference `{0}`")]
    UnresolvedReference(String),
    /// The formula contains a character outside the arithmetic alphabet
    #[error("invalid character `{0}` in expression")]
    InvalidExpression(char),
    /// The token stream does not form a well-formed expression
    #[error("syntax error: {0}")]
    Syntax(String),
    /// Evaluation produced infinity or NaN
    #[error("expression is not a finite number")]
    NonFinite,
}

/// One lexical unit of a formula.
#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
}

/// Splits a formula into tokens.
///
/// Identifiers start with any alphabetic character (any alphabet) or an
/// underscore and continue with alphanumerics and underscores. Everything
/// outside digits, identifiers, whitespace, and `+ - * / ( ) .` is rejected.
fn tokenize(formula: &str) -> Result<Vec<Token>, FormulaError> {
    let mut tokens = Vec::new();
    let mut chars = formula.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else if c.is_ascii_digit() || c == '.' {
            let mut literal = String::new();
            while let Some(&d) = chars.peek() {
                if d.is_ascii_digit() || d == '.' {
                    literal.push(d);
                    chars.next();
                } else {
                    break;
                }
            }
            let value = literal
                .parse::<f64>()
                .map_err(|_| FormulaError::Syntax(format!("bad number literal `{literal}`")))?;
            tokens.push(Token::Number(value));
        } else if c.is_alphabetic() || c == '_' {
            let mut name = String::new();
            while let Some(&d) = chars.peek() {
                if d.is_alphanumeric() || d == '_' {
                    name.push(d);
                    chars.next();
                } else {
                    break;
                }
            }
            tokens.push(Token::Ident(name));
        } else {
            let token = match c {
                '+' => Token::Plus,
                '-' => Token::Minus,
                '*' => Token::Star,
                '/' => Token::Slash,
                '(' => Token::LParen,
                ')' => Token::RParen,
                other => return Err(FormulaError::InvalidExpression(other)),
            };
            tokens.push(token);
            chars.next();
        }
    }

    Ok(tokens)
}

/// Numeric coercion for a row standing in a formula's variable pool.
///
/// Formula rows contribute their raw stored value, never their computed
/// `result`, so chained formulas cannot read stale or circular outputs.
/// Text parses strictly as a number, defaulting to 0.0; date instants
/// coerce to 0.0.
pub fn coerce_numeric(row: &Row) -> f64 {
    match &row.value {
        RowValue::Number(n) => *n,
        RowValue::Text(s) => s.trim().parse().unwrap_or(0.0),
        RowValue::Instant(_) => 0.0,
    }
}

/// Builds the name→value symbol table from the local rows plus every row of
/// every supplied table.
///
/// Longest names sort first and the first candidate per distinct name wins,
/// so a local row shadows a same-named row of another table.
fn build_symbols(local_rows: &[Row], all_tables: &[Table]) -> HashMap<String, f64> {
    let mut candidates: Vec<&Row> = local_rows
        .iter()
        .chain(all_tables.iter().flat_map(|t| t.data.iter()))
        .collect();
    candidates.sort_by_key(|row| std::cmp::Reverse(row.name.chars().count()));

    let mut symbols = HashMap::new();
    for row in candidates {
        if row.name.is_empty() {
            continue;
        }
        symbols
            .entry(row.name.clone())
            .or_insert_with(|| coerce_numeric(row));
    }
    symbols
}

/// Recursive-descent evaluator over a token stream.
struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    symbols: &'a HashMap<String, f64>,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Token], symbols: &'a HashMap<String, f64>) -> Self {
        Self {
            tokens,
            pos: 0,
            symbols,
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    /// Parses the whole stream as one expression.
    fn parse(&mut self) -> Result<f64, FormulaError> {
        let value = self.expression()?;
        if self.pos != self.tokens.len() {
            return Err(FormulaError::Syntax("unexpected trailing input".to_string()));
        }
        Ok(value)
    }

    /// expression := term (("+" | "-") term)*
    fn expression(&mut self) -> Result<f64, FormulaError> {
        let mut value = self.term()?;
        while let Some(op) = self.peek() {
            match op {
                Token::Plus => {
                    self.advance();
                    value += self.term()?;
                }
                Token::Minus => {
                    self.advance();
                    value -= self.term()?;
                }
                _ => break,
            }
        }
        Ok(value)
    }

    /// term := factor (("*" | "/") factor)*
    fn term(&mut self) -> Result<f64, FormulaError> {
        let mut value = self.factor()?;
        while let Some(op) = self.peek() {
            match op {
                Token::Star => {
                    self.advance();
                    value *= self.factor()?;
                }
                Token::Slash => {
                    self.advance();
                    // Division by zero follows IEEE-754; the final
                    // finiteness check clamps the outcome.
                    value /= self.factor()?;
                }
                _ => break,
            }
        }
        Ok(value)
    }

    /// factor := number | identifier | "(" expression ")" | ("+" | "-") factor
    fn factor(&mut self) -> Result<f64, FormulaError> {
        match self.advance() {
            Some(Token::Number(n)) => Ok(n),
            Some(Token::Ident(name)) => match self.symbols.get(&name) {
                Some(value) => Ok(*value),
                None => Err(FormulaError::UnresolvedReference(name)),
            },
            Some(Token::LParen) => {
                let value = self.expression()?;
                match self.advance() {
                    Some(Token::RParen) => Ok(value),
                    _ => Err(FormulaError::Syntax("missing closing parenthesis".to_string())),
                }
            }
            Some(Token::Minus) => Ok(-self.factor()?),
            Some(Token::Plus) => self.factor(),
            Some(other) => Err(FormulaError::Syntax(format!("unexpected token {other:?}"))),
            None => Err(FormulaError::Syntax("unexpected end of expression".to_string())),
        }
    }
}

/// Evaluates a formula against the given rows, reporting failures.
///
/// This is the diagnostic channel behind [`evaluate_formula`]; tests and the
/// dialog's validity markers use it to distinguish a genuine zero from a
/// failed evaluation.
pub fn evaluate_formula_checked(
    formula: &str,
    local_rows: &[Row],
    all_tables: &[Table],
) -> Result<f64, FormulaError> {
    let tokens = tokenize(formula.trim())?;
    if tokens.is_empty() {
        return Err(FormulaError::Syntax("empty formula".to_string()));
    }
    let symbols = build_symbols(local_rows, all_tables);
    let value = Parser::new(&tokens, &symbols).parse()?;
    if !value.is_finite() {
        return Err(FormulaError::NonFinite);
    }
    Ok(value)
}

/// Evaluates a formula against the given rows.
///
/// Never fails outward: any failure condition evaluates to `0.0`. Unresolved
/// references and invalid characters are logged as warnings, malformed
/// expressions as errors, matching the editor's fail-silent policy — a bad
/// formula must never block the diagram.
pub fn evaluate_formula(formula: &str, local_rows: &[Row], all_tables: &[Table]) -> f64 {
    match evaluate_formula_checked(formula, local_rows, all_tables) {
        Ok(value) => value,
        Err(err @ FormulaError::Syntax(_)) => {
            log::error!("formula `{formula}` failed: {err}");
            0.0
        }
        Err(err) => {
            log::warn!("formula `{formula}` failed: {err}");
            0.0
        }
    }
}
