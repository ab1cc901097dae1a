/// Variable table — a built-in evaluator backed by a flat map of game variables.
///
/// Conditions are boolean expressions over variables and literals:
/// `gold >= 10 and not met_innkeeper`, `mood == "angry" or (x < 3)`.
/// Scripts are `;`-separated assignments: `met_innkeeper = true; gold -= 2`.
/// Missing variables are nil: falsy, equal only to other nil values.
///
/// Three names are reserved: `thisID` is the entry being evaluated,
/// `dialogTable` is the active conversation id, and `dialog.N.SimStatus`
/// reads the status of entry `N` in the active conversation.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

use crate::core::evaluator::{
    DialogueEvaluator, EffectError, EvalContext, EvaluationError, SimStatus,
};
use crate::schema::entry::{ConversationId, EntryId, EntryRef};

/// A dynamic value stored in the variable table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Bool(bool),
    Number(f64),
    String(String),
}

impl Value {
    fn is_truthy(&self) -> bool {
        match self {
            Self::Bool(b) => *b,
            Self::Number(n) => *n != 0.0,
            Self::String(s) => !s.is_empty(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{}", b),
            Self::Number(n) => write!(f, "{}", n),
            Self::String(s) => write!(f, "\"{}\"", s),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

/// The built-in evaluator: variables plus per-entry sim status.
#[derive(Debug, Clone, Default)]
pub struct VariableTable {
    variables: FxHashMap<String, Value>,
    sim_status: FxHashMap<EntryRef, SimStatus>,
    dialog_table: Option<ConversationId>,
    this_entry: Option<EntryRef>,
}

impl VariableTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse initial variables from a RON map, e.g. `{"gold": Number(5.0)}`.
    pub fn parse_ron(input: &str) -> Result<Self, ron::error::SpannedError> {
        let raw: HashMap<String, Value> = ron::from_str(input)?;
        let mut table = Self::new();
        table.variables.extend(raw);
        Ok(table)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.variables.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.variables.remove(name)
    }

    /// Variables sorted by name.
    pub fn variables(&self) -> Vec<(&str, &Value)> {
        let mut vars: Vec<(&str, &Value)> =
            self.variables.iter().map(|(k, v)| (k.as_str(), v)).collect();
        vars.sort_by(|a, b| a.0.cmp(b.0));
        vars
    }

    pub fn dialog_table(&self) -> Option<ConversationId> {
        self.dialog_table
    }

    /// Evaluate an expression to its value without the dialogue context.
    pub fn evaluate(&self, expression: &str) -> Result<Option<Value>, String> {
        let tokens = tokenize(expression)?;
        let mut parser = Parser::new(&tokens);
        let expr = parser.parse_expression()?;
        parser.expect_end()?;
        self.eval(&expr)
    }

    fn lookup(&self, name: &str) -> Option<Value> {
        match name {
            "thisID" => self.this_entry.map(|e| Value::Number(e.entry.0 as f64)),
            "dialogTable" => self.dialog_table.map(|c| Value::Number(c.0 as f64)),
            _ => {
                if let Some(status) = self.dialog_status(name) {
                    return Some(Value::String(status_name(status).to_string()));
                }
                self.variables.get(name).cloned()
            }
        }
    }

    fn dialog_status(&self, name: &str) -> Option<SimStatus> {
        let rest = name.strip_prefix("dialog.")?;
        let id = rest.strip_suffix(".SimStatus")?.parse::<u32>().ok()?;
        let conversation = self.dialog_table?;
        Some(self.sim_status(EntryRef {
            conversation,
            entry: EntryId(id),
        }))
    }

    fn eval(&self, expr: &Expr) -> Result<Option<Value>, String> {
        Ok(match expr {
            Expr::Literal(v) => Some(v.clone()),
            Expr::Var(name) => self.lookup(name),
            Expr::Not(inner) => Some(Value::Bool(!truthy(&self.eval(inner)?))),
            Expr::And(lhs, rhs) => {
                Some(Value::Bool(truthy(&self.eval(lhs)?) && truthy(&self.eval(rhs)?)))
            }
            Expr::Or(lhs, rhs) => {
                Some(Value::Bool(truthy(&self.eval(lhs)?) || truthy(&self.eval(rhs)?)))
            }
            Expr::Compare(op, lhs, rhs) => {
                let l = self.eval(lhs)?;
                let r = self.eval(rhs)?;
                Some(Value::Bool(compare(*op, &l, &r)?))
            }
        })
    }

    fn run_statement(&mut self, statement: &[Token]) -> Result<(), String> {
        let (name, op) = match statement {
            [Token::Ident(name), Token::Assign(op), ..] => (name.clone(), *op),
            _ => return Err("expected '<name> = <value>'".to_string()),
        };
        if name == "thisID" || name == "dialogTable" {
            return Err(format!("'{}' is read-only", name));
        }

        let mut parser = Parser::new(&statement[2..]);
        let expr = parser.parse_expression()?;
        parser.expect_end()?;
        let value = self
            .eval(&expr)?
            .ok_or_else(|| "cannot assign nil".to_string())?;

        let new_value = match op {
            AssignOp::Set => value,
            AssignOp::Add | AssignOp::Sub => {
                let current = match self.variables.get(&name) {
                    None => 0.0,
                    Some(Value::Number(n)) => *n,
                    Some(other) => return Err(format!("'{}' is not a number: {}", name, other)),
                };
                let delta = match value {
                    Value::Number(n) => n,
                    other => return Err(format!("expected a number, found {}", other)),
                };
                Value::Number(if op == AssignOp::Add {
                    current + delta
                } else {
                    current - delta
                })
            }
        };
        self.variables.insert(name, new_value);
        Ok(())
    }
}

impl DialogueEvaluator for VariableTable {
    fn evaluate_condition(
        &mut self,
        expression: &str,
        context: &EvalContext,
    ) -> Result<bool, EvaluationError> {
        self.this_entry = Some(context.this_entry);
        self.evaluate(expression)
            .map(|v| truthy(&v))
            .map_err(|message| EvaluationError::new(expression, message))
    }

    fn run_effect(&mut self, script: &str, context: &EvalContext) -> Result<(), EffectError> {
        self.this_entry = Some(context.this_entry);
        let tokens = tokenize(script).map_err(|m| EffectError::new(script, m))?;
        for statement in tokens.split(|t| *t == Token::Semicolon) {
            if statement.is_empty() {
                continue;
            }
            self.run_statement(statement)
                .map_err(|m| EffectError::new(script, m))?;
        }
        Ok(())
    }

    fn set_dialog_table(&mut self, conversation: ConversationId) {
        self.dialog_table = Some(conversation);
    }

    fn clear_dialog_table(&mut self) {
        self.dialog_table = None;
    }

    fn mark_displayed(&mut self, entry: EntryRef) {
        self.sim_status.insert(entry, SimStatus::WasDisplayed);
    }

    fn mark_offered(&mut self, entry: EntryRef) {
        let status = self.sim_status.entry(entry).or_default();
        if *status != SimStatus::WasDisplayed {
            *status = SimStatus::WasOffered;
        }
    }

    fn sim_status(&self, entry: EntryRef) -> SimStatus {
        self.sim_status.get(&entry).copied().unwrap_or_default()
    }
}

fn status_name(status: SimStatus) -> &'static str {
    match status {
        SimStatus::Untouched => "Untouched",
        SimStatus::WasOffered => "WasOffered",
        SimStatus::WasDisplayed => "WasDisplayed",
    }
}

fn truthy(value: &Option<Value>) -> bool {
    value.as_ref().map(Value::is_truthy).unwrap_or(false)
}

fn compare(op: CmpOp, lhs: &Option<Value>, rhs: &Option<Value>) -> Result<bool, String> {
    let test: fn(Ordering) -> bool = match op {
        CmpOp::Eq => return Ok(lhs == rhs),
        CmpOp::Ne => return Ok(lhs != rhs),
        CmpOp::Lt => Ordering::is_lt,
        CmpOp::Le => Ordering::is_le,
        CmpOp::Gt => Ordering::is_gt,
        CmpOp::Ge => Ordering::is_ge,
    };
    let ordering = match (lhs, rhs) {
        (Some(Value::Number(a)), Some(Value::Number(b))) => a.partial_cmp(b),
        (Some(Value::String(a)), Some(Value::String(b))) => Some(a.cmp(b)),
        _ => return Err(format!("cannot order {:?} and {:?}", lhs, rhs)),
    };
    ordering
        .map(test)
        .ok_or_else(|| "cannot order NaN".to_string())
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum AssignOp {
    Set,
    Add,
    Sub,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Number(f64),
    Str(String),
    Cmp(CmpOp),
    Assign(AssignOp),
    Not,
    And,
    Or,
    LParen,
    RParen,
    Semicolon,
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Literal(Value),
    Var(String),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Compare(CmpOp, Box<Expr>, Box<Expr>),
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let chars: Vec<char> = input.chars().collect();
    let len = chars.len();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < len {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        match c {
            _ if c.is_whitespace() => {
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            ';' => {
                tokens.push(Token::Semicolon);
                i += 1;
            }
            '=' if next == Some('=') => {
                tokens.push(Token::Cmp(CmpOp::Eq));
                i += 2;
            }
            '=' => {
                tokens.push(Token::Assign(AssignOp::Set));
                i += 1;
            }
            '!' | '~' if next == Some('=') => {
                tokens.push(Token::Cmp(CmpOp::Ne));
                i += 2;
            }
            '!' => {
                tokens.push(Token::Not);
                i += 1;
            }
            '<' if next == Some('=') => {
                tokens.push(Token::Cmp(CmpOp::Le));
                i += 2;
            }
            '<' => {
                tokens.push(Token::Cmp(CmpOp::Lt));
                i += 1;
            }
            '>' if next == Some('=') => {
                tokens.push(Token::Cmp(CmpOp::Ge));
                i += 2;
            }
            '>' => {
                tokens.push(Token::Cmp(CmpOp::Gt));
                i += 1;
            }
            '+' if next == Some('=') => {
                tokens.push(Token::Assign(AssignOp::Add));
                i += 2;
            }
            '-' if next == Some('=') => {
                tokens.push(Token::Assign(AssignOp::Sub));
                i += 2;
            }
            '&' if next == Some('&') => {
                tokens.push(Token::And);
                i += 2;
            }
            '|' if next == Some('|') => {
                tokens.push(Token::Or);
                i += 2;
            }
            '"' => {
                let start = i + 1;
                let mut end = start;
                while end < len && chars[end] != '"' {
                    end += 1;
                }
                if end == len {
                    return Err("unterminated string".to_string());
                }
                tokens.push(Token::Str(chars[start..end].iter().collect()));
                i = end + 1;
            }
            _ if c.is_ascii_digit() || (c == '-' && next.is_some_and(|n| n.is_ascii_digit())) => {
                let start = i;
                i += 1;
                while i < len && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let n = text
                    .parse::<f64>()
                    .map_err(|_| format!("invalid number '{}'", text))?;
                tokens.push(Token::Number(n));
            }
            _ if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < len && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '.') {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                tokens.push(match word.as_str() {
                    "and" => Token::And,
                    "or" => Token::Or,
                    "not" => Token::Not,
                    _ => Token::Ident(word),
                });
            }
            _ => return Err(format!("unexpected character '{}'", c)),
        }
    }

    Ok(tokens)
}

struct Parser<'t> {
    tokens: &'t [Token],
    pos: usize,
}

impl<'t> Parser<'t> {
    fn new(tokens: &'t [Token]) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<&Token> {
        let token = self.tokens.get(self.pos);
        self.pos += 1;
        token
    }

    fn expect_end(&self) -> Result<(), String> {
        match self.peek() {
            None => Ok(()),
            Some(t) => Err(format!("unexpected {:?}", t)),
        }
    }

    fn parse_expression(&mut self) -> Result<Expr, String> {
        let mut lhs = self.parse_and()?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            let rhs = self.parse_and()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, String> {
        let mut lhs = self.parse_unary()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            let rhs = self.parse_unary()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, String> {
        if self.peek() == Some(&Token::Not) {
            self.pos += 1;
            return Ok(Expr::Not(Box::new(self.parse_unary()?)));
        }
        let lhs = self.parse_operand()?;
        if let Some(Token::Cmp(op)) = self.peek() {
            let op = *op;
            self.pos += 1;
            let rhs = self.parse_operand()?;
            return Ok(Expr::Compare(op, Box::new(lhs), Box::new(rhs)));
        }
        Ok(lhs)
    }

    fn parse_operand(&mut self) -> Result<Expr, String> {
        match self.advance() {
            Some(Token::LParen) => {
                let inner = self.parse_expression()?;
                match self.advance() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err("expected ')'".to_string()),
                }
            }
            Some(Token::Number(n)) => Ok(Expr::Literal(Value::Number(*n))),
            Some(Token::Str(s)) => Ok(Expr::Literal(Value::String(s.clone()))),
            Some(Token::Ident(name)) => Ok(match name.as_str() {
                "true" => Expr::Literal(Value::Bool(true)),
                "false" => Expr::Literal(Value::Bool(false)),
                _ => Expr::Var(name.clone()),
            }),
            Some(t) => Err(format!("unexpected {:?}", t)),
            None => Err("unexpected end of expression".to_string()),
        }
    }
}
