//! LP Engine.
//!
//! The solver pipeline talks to the engine through plain text: the
//! formulated problem goes in, a status with per-column values comes out.
//! [`SimplexEngine`] parses that text and solves it with `minilp`.
//!
//! # Format
//!
//! ```text
//! MINIMIZE
//!  obj: + 2 x0 + 1 x1
//! SUBJECT TO
//!  c0: + 1 x0 + 1 x1 >= 10
//! BOUNDS
//!  0 <= x0 <= 8
//!  x1 >= 0
//! END
//! ```
//!
//! Tokens are separated by whitespace. Lines starting with `\` are
//! comments. Variables default to `[0, +inf)`.

use std::collections::{BTreeMap, HashMap};

use minilp::{LinearExpr, OptimizationDirection, Problem, Variable};
use serde::Serialize;
use thiserror::Error;

use crate::context::Comparison;

const FEASIBILITY_TOLERANCE: f64 = 1e-9;

/// Outcome of one LP solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LpStatus {
    Optimal,
    Infeasible,
    Unbounded,
}

/// Status, objective value and column values of a solve.
///
/// `columns` is empty unless the status is [`LpStatus::Optimal`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LpResult {
    pub status: LpStatus,
    pub objective_value: f64,
    pub columns: BTreeMap<String, f64>,
}

impl LpResult {
    fn without_solution(status: LpStatus) -> Self {
        Self {
            status,
            objective_value: 0.0,
            columns: BTreeMap::new(),
        }
    }
}

/// The engine rejected the problem text.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("malformed problem at line {line}: {message}")]
    Malformed { line: usize, message: String },
}

/// A stateless LP solver: problem text in, solution out.
pub trait LpEngine {
    fn solve(&self, problem: &str) -> Result<LpResult, EngineError>;
}

/// Dense simplex engine backed by `minilp`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimplexEngine;

impl LpEngine for SimplexEngine {
    fn solve(&self, problem: &str) -> Result<LpResult, EngineError> {
        Ok(parse_problem(problem)?.solve())
    }
}

/// One parsed constraint row over column indices.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub name: Option<String>,
    pub terms: Vec<(usize, f64)>,
    pub op: Comparison,
    pub rhs: f64,
}

/// A parsed linear program.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearProgram {
    pub maximize: bool,
    /// Column names in order of first appearance
    pub columns: Vec<String>,
    /// Objective coefficient per column
    pub objective: Vec<f64>,
    pub rows: Vec<Row>,
    /// `(lower, upper)` per column
    pub bounds: Vec<(f64, f64)>,
    lookup: HashMap<String, usize>,
}

impl LinearProgram {
    fn new() -> Self {
        Self {
            maximize: false,
            columns: Vec::new(),
            objective: Vec::new(),
            rows: Vec::new(),
            bounds: Vec::new(),
            lookup: HashMap::new(),
        }
    }

    fn column(&mut self, name: &str) -> usize {
        if let Some(&index) = self.lookup.get(name) {
            return index;
        }
        let index = self.columns.len();
        self.columns.push(name.to_string());
        self.objective.push(0.0);
        self.bounds.push((0.0, f64::INFINITY));
        self.lookup.insert(name.to_string(), index);
        index
    }

    // Resolves names to columns, merging repeated columns.
    fn resolve(&mut self, terms: Vec<(String, f64)>) -> Vec<(usize, f64)> {
        let mut merged: BTreeMap<usize, f64> = BTreeMap::new();
        for (name, coef) in terms {
            *merged.entry(self.column(&name)).or_insert(0.0) += coef;
        }
        merged.into_iter().filter(|&(_, coef)| coef != 0.0).collect()
    }

    /// Solves the program.
    pub fn solve(&self) -> LpResult {
        if self.bounds.iter().any(|&(lo, hi)| lo > hi) {
            return LpResult::without_solution(LpStatus::Infeasible);
        }
        let trivially_violated = self
            .rows
            .iter()
            .filter(|row| row.terms.is_empty())
            .any(|row| !holds(0.0, row.op, row.rhs));
        if trivially_violated {
            return LpResult::without_solution(LpStatus::Infeasible);
        }
        if self.columns.is_empty() {
            return LpResult::without_solution(LpStatus::Optimal);
        }

        let direction = if self.maximize {
            OptimizationDirection::Maximize
        } else {
            OptimizationDirection::Minimize
        };
        let mut problem = Problem::new(direction);
        let vars: Vec<Variable> = self
            .objective
            .iter()
            .zip(&self.bounds)
            .map(|(&coef, &bounds)| problem.add_var(coef, bounds))
            .collect();

        for row in self.rows.iter().filter(|row| !row.terms.is_empty()) {
            let mut expr = LinearExpr::empty();
            for &(column, coef) in &row.terms {
                expr.add(vars[column], coef);
            }
            let op = match row.op {
                Comparison::Eq => minilp::ComparisonOp::Eq,
                Comparison::Le => minilp::ComparisonOp::Le,
                Comparison::Ge => minilp::ComparisonOp::Ge,
            };
            problem.add_constraint(expr, op, row.rhs);
        }

        match problem.solve() {
            Ok(solution) => LpResult {
                status: LpStatus::Optimal,
                objective_value: solution.objective(),
                columns: self
                    .columns
                    .iter()
                    .zip(&vars)
                    .map(|(name, &var)| (name.clone(), solution[var]))
                    .collect(),
            },
            Err(minilp::Error::Unbounded) => LpResult::without_solution(LpStatus::Unbounded),
            Err(_) => LpResult::without_solution(LpStatus::Infeasible),
        }
    }
}

fn holds(lhs: f64, op: Comparison, rhs: f64) -> bool {
    match op {
        Comparison::Eq => (lhs - rhs).abs() <= FEASIBILITY_TOLERANCE,
        Comparison::Le => lhs <= rhs + FEASIBILITY_TOLERANCE,
        Comparison::Ge => lhs >= rhs - FEASIBILITY_TOLERANCE,
    }
}

// ============================================================================
// Parser
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Start,
    Objective,
    Constraints,
    Bounds,
    End,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Sign(f64),
    Number(f64),
    Name(String),
    Op(Comparison),
}

/// Parses the problem text.
///
/// # Errors
///
/// [`EngineError::Malformed`] naming the first offending line.
pub fn parse_problem(text: &str) -> Result<LinearProgram, EngineError> {
    let mut program = LinearProgram::new();
    let mut section = Section::Start;

    for (number, raw) in text.lines().enumerate() {
        let line = number + 1;
        let content = raw.trim();
        if content.is_empty() || content.starts_with('\\') {
            continue;
        }
        let malformed = |message: String| EngineError::Malformed { line, message };

        if let Some(next) = header(content) {
            if section == Section::End {
                return Err(malformed("section header after END".to_string()));
            }
            match next {
                Section::Objective => program.maximize = content.to_ascii_uppercase().starts_with("MAX"),
                Section::End => {}
                _ if section == Section::Start => {
                    return Err(malformed("problem must start with an objective section".to_string()));
                }
                _ => {}
            }
            section = next;
            continue;
        }

        let tokens = strip_label(content)
            .split_whitespace()
            .map(classify)
            .collect::<Result<Vec<_>, String>>()
            .map_err(malformed)?;
        if tokens.is_empty() {
            continue;
        }

        match section {
            Section::Start => return Err(malformed("expected MINIMIZE or MAXIMIZE".to_string())),
            Section::End => return Err(malformed("content after END".to_string())),
            Section::Objective => {
                let terms = expression(&tokens).map_err(malformed)?;
                for (column, coef) in program.resolve(terms) {
                    program.objective[column] += coef;
                }
            }
            Section::Constraints => {
                let name = label(content);
                let (terms, op, rhs) = constraint(&tokens).map_err(malformed)?;
                let terms = program.resolve(terms);
                program.rows.push(Row { name, terms, op, rhs });
            }
            Section::Bounds => {
                let (name, lower, upper) = bound(&tokens).map_err(malformed)?;
                let column = program.column(&name);
                let current = &mut program.bounds[column];
                if let Some(lower) = lower {
                    current.0 = lower;
                }
                if let Some(upper) = upper {
                    current.1 = upper;
                }
            }
        }
    }

    Ok(program)
}

fn header(line: &str) -> Option<Section> {
    let upper = line.to_ascii_uppercase();
    let words: Vec<&str> = upper.split_whitespace().collect();
    match words.as_slice() {
        ["MINIMIZE" | "MINIMISE" | "MIN" | "MAXIMIZE" | "MAXIMISE" | "MAX"] => Some(Section::Objective),
        ["SUBJECT", "TO"] | ["ST"] | ["S.T."] => Some(Section::Constraints),
        ["BOUNDS"] => Some(Section::Bounds),
        ["END"] => Some(Section::End),
        _ => None,
    }
}

fn label(line: &str) -> Option<String> {
    let first = line.split_whitespace().next()?;
    first.strip_suffix(':').map(str::to_string)
}

fn strip_label(line: &str) -> &str {
    match line.split_whitespace().next() {
        Some(first) if first.ends_with(':') => line.trim_start()[first.len()..].trim_start(),
        _ => line,
    }
}

fn classify(token: &str) -> Result<Token, String> {
    match token {
        "+" => return Ok(Token::Sign(1.0)),
        "-" => return Ok(Token::Sign(-1.0)),
        "=" | "==" => return Ok(Token::Op(Comparison::Eq)),
        "<=" | "=<" | "<" => return Ok(Token::Op(Comparison::Le)),
        ">=" | "=>" | ">" => return Ok(Token::Op(Comparison::Ge)),
        _ => {}
    }

    let unsigned = token.strip_prefix(['+', '-']).unwrap_or(token);
    let negative = token.starts_with('-');
    if unsigned.eq_ignore_ascii_case("inf") || unsigned.eq_ignore_ascii_case("infinity") {
        let value = if negative { f64::NEG_INFINITY } else { f64::INFINITY };
        return Ok(Token::Number(value));
    }

    let first = unsigned.chars().next().unwrap_or(' ');
    if first.is_ascii_digit() || first == '.' {
        let value: f64 = token.parse().map_err(|_| format!("invalid number '{}'", token))?;
        if value.is_nan() {
            return Err(format!("invalid number '{}'", token));
        }
        return Ok(Token::Number(value));
    }
    if unsigned.len() == token.len() && (first.is_ascii_alphabetic() || first == '_') {
        return Ok(Token::Name(token.to_string()));
    }
    Err(format!("unexpected token '{}'", token))
}

// `[sign] [coef] name` terms; constants are rejected.
fn expression(tokens: &[Token]) -> Result<Vec<(String, f64)>, String> {
    let mut terms = Vec::new();
    let mut sign = 1.0;
    let mut pending_sign = false;
    let mut coef: Option<f64> = None;

    for token in tokens {
        match token {
            Token::Sign(s) => {
                if coef.is_some() {
                    return Err("dangling constant in expression".to_string());
                }
                sign *= s;
                pending_sign = true;
            }
            Token::Number(n) => {
                if coef.is_some() {
                    return Err("two consecutive numbers in expression".to_string());
                }
                if !n.is_finite() {
                    return Err("coefficient must be finite".to_string());
                }
                coef = Some(*n);
            }
            Token::Name(name) => {
                terms.push((name.clone(), sign * coef.unwrap_or(1.0)));
                sign = 1.0;
                pending_sign = false;
                coef = None;
            }
            Token::Op(op) => return Err(format!("unexpected '{}' in expression", op.symbol())),
        }
    }
    if coef.is_some() {
        return Err("dangling constant in expression".to_string());
    }
    if pending_sign {
        return Err("dangling sign at end of expression".to_string());
    }
    Ok(terms)
}

// `[sign] number`
fn constant(tokens: &[Token]) -> Result<f64, String> {
    let (last, signs) = tokens.split_last().ok_or("missing constant")?;
    let mut sign = 1.0;
    for token in signs {
        match token {
            Token::Sign(s) => sign *= s,
            other => return Err(format!("unexpected token {:?} before constant", other)),
        }
    }
    match last {
        Token::Number(n) => Ok(sign * n),
        other => Err(format!("expected a number, got {:?}", other)),
    }
}

fn constraint(tokens: &[Token]) -> Result<(Vec<(String, f64)>, Comparison, f64), String> {
    let mut ops = tokens.iter().enumerate().filter_map(|(i, t)| match t {
        Token::Op(op) => Some((i, *op)),
        _ => None,
    });
    let (position, op) = ops.next().ok_or("constraint has no comparison operator")?;
    if ops.next().is_some() {
        return Err("constraint has more than one comparison operator".to_string());
    }
    let terms = expression(&tokens[..position])?;
    let rhs = constant(&tokens[position + 1..])?;
    if !rhs.is_finite() {
        return Err("right-hand side must be finite".to_string());
    }
    Ok((terms, op, rhs))
}

#[derive(Debug, Clone, PartialEq)]
enum BoundItem {
    Value(f64),
    Name(String),
    Op(Comparison),
}

// Returns the column with its new lower and/or upper bound.
fn bound(tokens: &[Token]) -> Result<(String, Option<f64>, Option<f64>), String> {
    let mut items = Vec::new();
    let mut sign = 1.0;
    for token in tokens {
        match token {
            Token::Sign(s) => {
                sign *= s;
                continue;
            }
            Token::Number(n) => items.push(BoundItem::Value(sign * n)),
            Token::Name(name) => items.push(BoundItem::Name(name.clone())),
            Token::Op(op) => items.push(BoundItem::Op(*op)),
        }
        sign = 1.0;
    }

    use BoundItem::{Name, Op, Value};
    use Comparison::{Eq, Ge, Le};
    let bound = match items.as_slice() {
        [Name(x), Name(free)] if free.eq_ignore_ascii_case("free") => {
            (x.clone(), Some(f64::NEG_INFINITY), Some(f64::INFINITY))
        }
        [Value(lo), Op(Le), Name(x), Op(Le), Value(hi)] => (x.clone(), Some(*lo), Some(*hi)),
        [Value(hi), Op(Ge), Name(x), Op(Ge), Value(lo)] => (x.clone(), Some(*lo), Some(*hi)),
        [Name(x), Op(Le), Value(hi)] | [Value(hi), Op(Ge), Name(x)] => (x.clone(), None, Some(*hi)),
        [Name(x), Op(Ge), Value(lo)] | [Value(lo), Op(Le), Name(x)] => (x.clone(), Some(*lo), None),
        [Name(x), Op(Eq), Value(v)] | [Value(v), Op(Eq), Name(x)] => (x.clone(), Some(*v), Some(*v)),
        _ => return Err("unrecognized bound".to_string()),
    };
    Ok(bound)
}
