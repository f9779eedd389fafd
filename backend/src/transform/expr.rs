//! Sandboxed expression language for `callback` transformations.
//!
//! Expressions are parsed into a small AST and evaluated by a tree walker
//! that only sees the current value and record. There is no access to the
//! host environment, files or processes.
//!
//! ```text
//! value * 1.2
//! upper(first_name) + " " + upper(last_name)
//! record.stock > 0 ? "in stock" : "sold out"
//! function(value, record) { return value || "N/A"; }
//! ```
//!
//! | Syntax | Meaning |
//! |--------|---------|
//! | `value`, `value.a.b` | extracted value (or a path inside it) |
//! | `record`, `record.a.b`, `a.b` | the record (or one of its fields) |
//! | `+ - * / %` | arithmetic, `+` concatenates when a side is a string |
//! | `== != === !== < <= > >=` | loose / strict comparison |
//! | `&& \|\| !` `c ? a : b` | logic (operands are returned, JS style) |

use serde_json::Value;

use super::extract::extract_value;
use super::operations::format_number;
use super::predicate::{loose_compare, loose_eq};
use super::value::{is_empty_value, number_value, numeric_value, string_form, truthy};
use crate::error::{ExpressionError, ExpressionResult};

/// Longest accepted expression source, in bytes.
pub const MAX_SOURCE_LEN: usize = 2048;

/// Deepest accepted nesting of parentheses, unary operators and branches.
pub const MAX_DEPTH: usize = 64;

/// Names callable from expressions.
pub const FUNCTIONS: &[&str] = &[
    "upper", "lower", "trim", "len", "concat", "substr", "replace", "contains", "starts_with",
    "ends_with", "round", "floor", "ceil", "abs", "min", "max", "number", "string", "coalesce",
    "field",
];

// =============================================================================
// Lexer
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Str(String),
    Ident(String),
    Op(&'static str),
    LParen,
    RParen,
    Comma,
    Question,
    Colon,
}

const OPERATORS: &[&str] = &[
    "===", "!==", "==", "!=", "<=", ">=", "&&", "||", "<", ">", "+", "-", "*", "/", "%", "!",
];

fn syntax(position: usize, message: impl Into<String>) -> ExpressionError {
    ExpressionError::Syntax {
        position,
        message: message.into(),
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn tokenize(source: &str) -> ExpressionResult<Vec<(usize, Token)>> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < chars.len() {
        let c = chars[pos];
        let start = pos;

        if c.is_whitespace() {
            pos += 1;
            continue;
        }

        if c.is_ascii_digit() || (c == '.' && chars.get(pos + 1).is_some_and(|n| n.is_ascii_digit())) {
            while pos < chars.len() && (chars[pos].is_ascii_digit() || chars[pos] == '.') {
                pos += 1;
            }
            if pos < chars.len() && matches!(chars[pos], 'e' | 'E') {
                let mut look = pos + 1;
                if look < chars.len() && matches!(chars[look], '+' | '-') {
                    look += 1;
                }
                if look < chars.len() && chars[look].is_ascii_digit() {
                    pos = look;
                    while pos < chars.len() && chars[pos].is_ascii_digit() {
                        pos += 1;
                    }
                }
            }
            let text: String = chars[start..pos].iter().collect();
            let number = text
                .parse::<f64>()
                .map_err(|_| syntax(start, format!("invalid number '{}'", text)))?;
            tokens.push((start, Token::Number(number)));
            continue;
        }

        if c == '"' || c == '\'' {
            pos += 1;
            let mut text = String::new();
            loop {
                let Some(&ch) = chars.get(pos) else {
                    return Err(syntax(start, "unterminated string"));
                };
                pos += 1;
                match ch {
                    '\\' => {
                        let escaped = chars
                            .get(pos)
                            .copied()
                            .ok_or_else(|| syntax(start, "unterminated string"))?;
                        pos += 1;
                        text.push(match escaped {
                            'n' => '\n',
                            't' => '\t',
                            'r' => '\r',
                            other => other,
                        });
                    }
                    q if q == c => break,
                    other => text.push(other),
                }
            }
            tokens.push((start, Token::Str(text)));
            continue;
        }

        if is_ident_start(c) {
            pos += 1;
            while pos < chars.len() && is_ident_char(chars[pos]) {
                pos += 1;
            }
            // dotted paths are one identifier: record.user.name
            while pos + 1 < chars.len() && chars[pos] == '.' && is_ident_char(chars[pos + 1]) {
                pos += 1;
                while pos < chars.len() && is_ident_char(chars[pos]) {
                    pos += 1;
                }
            }
            let text: String = chars[start..pos].iter().collect();
            let text = text.strip_prefix('$').unwrap_or(&text).to_string();
            if text.is_empty() {
                return Err(syntax(start, "expected identifier after '$'"));
            }
            tokens.push((start, Token::Ident(text)));
            continue;
        }

        let punct = match c {
            '(' => Some(Token::LParen),
            ')' => Some(Token::RParen),
            ',' => Some(Token::Comma),
            '?' => Some(Token::Question),
            ':' => Some(Token::Colon),
            _ => None,
        };
        if let Some(token) = punct {
            tokens.push((start, token));
            pos += 1;
            continue;
        }

        let rest: String = chars[pos..chars.len().min(pos + 3)].iter().collect();
        match OPERATORS.iter().find(|op| rest.starts_with(**op)) {
            Some(&op) => {
                tokens.push((start, Token::Op(op)));
                pos += op.chars().count();
            }
            None => return Err(syntax(start, format!("unexpected character '{}'", c))),
        }
    }

    Ok(tokens)
}

// =============================================================================
// Parser
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    StrictEq,
    StrictNe,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Literal(Value),
    Value,
    ValuePath(String),
    Record,
    Field(String),
    Not(Box<Expr>),
    Neg(Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Ternary(Box<Expr>, Box<Expr>, Box<Expr>),
    Call(String, Vec<Expr>),
}

struct Parser {
    tokens: Vec<(usize, Token)>,
    pos: usize,
    depth: usize,
    end: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn position(&self) -> usize {
        self.tokens.get(self.pos).map(|(p, _)| *p).unwrap_or(self.end)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(_, t)| t.clone());
        self.pos += 1;
        token
    }

    fn eat_op(&mut self, ops: &[&'static str]) -> Option<&'static str> {
        match self.peek() {
            Some(Token::Op(op)) if ops.contains(op) => {
                let op = *op;
                self.pos += 1;
                Some(op)
            }
            _ => None,
        }
    }

    fn expect(&mut self, expected: Token, what: &str) -> ExpressionResult<()> {
        if self.peek() == Some(&expected) {
            self.pos += 1;
            Ok(())
        } else {
            Err(syntax(self.position(), format!("expected {}", what)))
        }
    }

    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> ExpressionResult<T>) -> ExpressionResult<T> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(ExpressionError::TooComplex(format!(
                "nesting deeper than {}",
                MAX_DEPTH
            )));
        }
        let result = f(self);
        self.depth -= 1;
        result
    }

    fn expression(&mut self) -> ExpressionResult<Expr> {
        self.nested(|p| p.ternary())
    }

    fn ternary(&mut self) -> ExpressionResult<Expr> {
        let condition = self.or()?;
        if self.peek() != Some(&Token::Question) {
            return Ok(condition);
        }
        self.pos += 1;
        let then = self.expression()?;
        self.expect(Token::Colon, "':' in conditional expression")?;
        let otherwise = self.expression()?;
        Ok(Expr::Ternary(Box::new(condition), Box::new(then), Box::new(otherwise)))
    }

    fn or(&mut self) -> ExpressionResult<Expr> {
        let mut left = self.and()?;
        while self.eat_op(&["||"]).is_some() {
            let right = self.and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and(&mut self) -> ExpressionResult<Expr> {
        let mut left = self.equality()?;
        while self.eat_op(&["&&"]).is_some() {
            let right = self.equality()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn binary_level(
        &mut self,
        ops: &[&'static str],
        next: fn(&mut Self) -> ExpressionResult<Expr>,
    ) -> ExpressionResult<Expr> {
        let mut left = next(self)?;
        while let Some(op) = self.eat_op(ops) {
            let right = next(self)?;
            let op = match op {
                "+" => BinOp::Add,
                "-" => BinOp::Sub,
                "*" => BinOp::Mul,
                "/" => BinOp::Div,
                "%" => BinOp::Rem,
                "==" => BinOp::Eq,
                "!=" => BinOp::Ne,
                "===" => BinOp::StrictEq,
                "!==" => BinOp::StrictNe,
                "<" => BinOp::Lt,
                "<=" => BinOp::Le,
                ">" => BinOp::Gt,
                _ => BinOp::Ge,
            };
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn equality(&mut self) -> ExpressionResult<Expr> {
        self.binary_level(&["===", "!==", "==", "!="], Self::comparison)
    }

    fn comparison(&mut self) -> ExpressionResult<Expr> {
        self.binary_level(&["<=", ">=", "<", ">"], Self::additive)
    }

    fn additive(&mut self) -> ExpressionResult<Expr> {
        self.binary_level(&["+", "-"], Self::multiplicative)
    }

    fn multiplicative(&mut self) -> ExpressionResult<Expr> {
        self.binary_level(&["*", "/", "%"], Self::unary)
    }

    fn unary(&mut self) -> ExpressionResult<Expr> {
        if self.eat_op(&["!"]).is_some() {
            return self.nested(|p| p.unary()).map(|e| Expr::Not(Box::new(e)));
        }
        if self.eat_op(&["-"]).is_some() {
            return self.nested(|p| p.unary()).map(|e| Expr::Neg(Box::new(e)));
        }
        self.primary()
    }

    fn primary(&mut self) -> ExpressionResult<Expr> {
        let position = self.position();
        match self.advance() {
            Some(Token::Number(n)) => Ok(Expr::Literal(number_value(n))),
            Some(Token::Str(s)) => Ok(Expr::Literal(Value::String(s))),
            Some(Token::LParen) => {
                let inner = self.expression()?;
                self.expect(Token::RParen, "')'")?;
                Ok(inner)
            }
            Some(Token::Ident(name)) => {
                if self.peek() == Some(&Token::LParen) {
                    self.pos += 1;
                    let args = self.arguments()?;
                    return Ok(Expr::Call(name, args));
                }
                Ok(resolve_identifier(name))
            }
            Some(other) => Err(syntax(position, format!("unexpected token {:?}", other))),
            None => Err(syntax(position, "unexpected end of expression")),
        }
    }

    fn arguments(&mut self) -> ExpressionResult<Vec<Expr>> {
        let mut args = Vec::new();
        if self.peek() == Some(&Token::RParen) {
            self.pos += 1;
            return Ok(args);
        }
        loop {
            args.push(self.expression()?);
            match self.advance() {
                Some(Token::Comma) => continue,
                Some(Token::RParen) => return Ok(args),
                _ => return Err(syntax(self.position(), "expected ',' or ')' in argument list")),
            }
        }
    }
}

fn resolve_identifier(name: String) -> Expr {
    match name.as_str() {
        "true" => Expr::Literal(Value::Bool(true)),
        "false" => Expr::Literal(Value::Bool(false)),
        "null" => Expr::Literal(Value::Null),
        "value" => Expr::Value,
        "record" | "data" => Expr::Record,
        _ => {
            if let Some(path) = name.strip_prefix("value.") {
                Expr::ValuePath(path.to_string())
            } else if let Some(path) = name
                .strip_prefix("record.")
                .or_else(|| name.strip_prefix("data."))
            {
                Expr::Field(path.to_string())
            } else {
                Expr::Field(name)
            }
        }
    }
}

// =============================================================================
// Public API
// =============================================================================

/// A parsed expression, ready to evaluate against many records.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    root: Expr,
}

impl Expression {
    /// Parse expression source.
    pub fn parse(source: &str) -> ExpressionResult<Self> {
        if source.len() > MAX_SOURCE_LEN {
            return Err(ExpressionError::TooComplex(format!(
                "source longer than {} bytes",
                MAX_SOURCE_LEN
            )));
        }
        let tokens = tokenize(source)?;
        if tokens.is_empty() {
            return Err(syntax(0, "empty expression"));
        }
        let mut parser = Parser {
            tokens,
            pos: 0,
            depth: 0,
            end: source.chars().count(),
        };
        let root = parser.expression()?;
        if parser.pos < parser.tokens.len() {
            return Err(syntax(parser.position(), "unexpected trailing input"));
        }
        Ok(Self { root })
    }

    /// Evaluate against a value and the record it came from.
    pub fn evaluate(&self, value: &Value, record: &Value) -> ExpressionResult<Value> {
        eval(&self.root, &Scope { value, record })
    }
}

/// Strip a `function(value, record) { return ...; }` wrapper down to its expression.
///
/// Only a leading `function` or `return` keyword is treated as a wrapper;
/// anything else is already an expression.
pub fn callback_body(source: &str) -> &str {
    let mut body = source.trim();
    if let Some(rest) = strip_keyword(body, "function") {
        body = match (rest.find('{'), rest.rfind('}')) {
            (Some(open), Some(close)) if open < close => rest[open + 1..close].trim(),
            _ => rest,
        };
    }
    if let Some(rest) = strip_keyword(body, "return") {
        body = rest;
    }
    body.trim()
        .trim_end_matches(|c: char| c == ';' || c.is_whitespace())
}

fn strip_keyword<'a>(source: &'a str, keyword: &str) -> Option<&'a str> {
    let rest = source.strip_prefix(keyword)?;
    match rest.chars().next() {
        Some(c) if is_ident_char(c) => None,
        _ => Some(rest),
    }
}

/// Parse and evaluate a callback source for one cell.
pub fn evaluate_callback(
    source: &str,
    value: Option<&Value>,
    record: &Value,
) -> ExpressionResult<Value> {
    let expression = Expression::parse(callback_body(source))?;
    expression.evaluate(value.unwrap_or(&Value::Null), record)
}

// =============================================================================
// Evaluator
// =============================================================================

struct Scope<'a> {
    value: &'a Value,
    record: &'a Value,
}

fn eval(expr: &Expr, scope: &Scope) -> ExpressionResult<Value> {
    match expr {
        Expr::Literal(v) => Ok(v.clone()),
        Expr::Value => Ok(scope.value.clone()),
        Expr::ValuePath(path) => Ok(lookup(scope.value, path)),
        Expr::Record => Ok(scope.record.clone()),
        Expr::Field(path) => Ok(lookup(scope.record, path)),
        Expr::Not(inner) => Ok(Value::Bool(!truthy(&eval(inner, scope)?))),
        Expr::Neg(inner) => {
            let n = to_number(&eval(inner, scope)?, "-")?;
            Ok(number_value(-n))
        }
        Expr::And(left, right) => {
            let l = eval(left, scope)?;
            if !truthy(&l) {
                return Ok(l);
            }
            eval(right, scope)
        }
        Expr::Or(left, right) => {
            let l = eval(left, scope)?;
            if truthy(&l) {
                return Ok(l);
            }
            eval(right, scope)
        }
        Expr::Ternary(condition, then, otherwise) => {
            if truthy(&eval(condition, scope)?) {
                eval(then, scope)
            } else {
                eval(otherwise, scope)
            }
        }
        Expr::Binary(op, left, right) => {
            let l = eval(left, scope)?;
            let r = eval(right, scope)?;
            binary(*op, &l, &r)
        }
        Expr::Call(name, args) => {
            let values = args
                .iter()
                .map(|arg| eval(arg, scope))
                .collect::<ExpressionResult<Vec<_>>>()?;
            call(name, values, scope)
        }
    }
}

fn lookup(source: &Value, path: &str) -> Value {
    extract_value(source, path).cloned().unwrap_or(Value::Null)
}

fn to_number(value: &Value, op: &str) -> ExpressionResult<f64> {
    match value {
        Value::Null => Ok(0.0),
        Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        other => numeric_value(other).ok_or_else(|| {
            ExpressionError::Type(format!("'{}' needs a number, got {}", op, other))
        }),
    }
}

fn strict_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

fn binary(op: BinOp, l: &Value, r: &Value) -> ExpressionResult<Value> {
    use std::cmp::Ordering::*;

    let compare = |wanted: &[std::cmp::Ordering]| {
        Value::Bool(loose_compare(l, r).is_some_and(|ord| wanted.contains(&ord)))
    };

    Ok(match op {
        BinOp::Add if l.is_string() || r.is_string() => {
            Value::String(format!("{}{}", string_form(l), string_form(r)))
        }
        BinOp::Add => number_value(to_number(l, "+")? + to_number(r, "+")?),
        BinOp::Sub => number_value(to_number(l, "-")? - to_number(r, "-")?),
        BinOp::Mul => number_value(to_number(l, "*")? * to_number(r, "*")?),
        BinOp::Div => {
            let divisor = to_number(r, "/")?;
            if divisor == 0.0 {
                return Err(ExpressionError::DivisionByZero);
            }
            number_value(to_number(l, "/")? / divisor)
        }
        BinOp::Rem => {
            let divisor = to_number(r, "%")?;
            if divisor == 0.0 {
                return Err(ExpressionError::DivisionByZero);
            }
            number_value(to_number(l, "%")? % divisor)
        }
        BinOp::Eq => Value::Bool(loose_eq(l, r)),
        BinOp::Ne => Value::Bool(!loose_eq(l, r)),
        BinOp::StrictEq => Value::Bool(strict_eq(l, r)),
        BinOp::StrictNe => Value::Bool(!strict_eq(l, r)),
        BinOp::Lt => compare(&[Less]),
        BinOp::Le => compare(&[Less, Equal]),
        BinOp::Gt => compare(&[Greater]),
        BinOp::Ge => compare(&[Greater, Equal]),
    })
}

fn arity(name: &str, args: &[Value], min: usize, max: Option<usize>) -> ExpressionResult<()> {
    let ok = args.len() >= min && max.is_none_or(|m| args.len() <= m);
    if ok {
        return Ok(());
    }
    let expected = match max {
        Some(m) if m == min => min.to_string(),
        Some(m) => format!("{}-{}", min, m),
        None => format!("at least {}", min),
    };
    Err(ExpressionError::Arity {
        name: name.to_string(),
        expected,
        got: args.len(),
    })
}

fn round_half_away(n: f64, decimals: usize) -> f64 {
    format_number(n, decimals, ".", "").parse().unwrap_or(n)
}

fn call(name: &str, args: Vec<Value>, scope: &Scope) -> ExpressionResult<Value> {
    let text = |i: usize| string_form(&args[i]);

    match name {
        "upper" => {
            arity(name, &args, 1, Some(1))?;
            Ok(Value::String(text(0).to_uppercase()))
        }
        "lower" => {
            arity(name, &args, 1, Some(1))?;
            Ok(Value::String(text(0).to_lowercase()))
        }
        "trim" => {
            arity(name, &args, 1, Some(1))?;
            Ok(Value::String(text(0).trim().to_string()))
        }
        "len" => {
            arity(name, &args, 1, Some(1))?;
            let len = match &args[0] {
                Value::Array(a) => a.len(),
                Value::Object(o) => o.len(),
                other => string_form(other).chars().count(),
            };
            Ok(Value::Number(len.into()))
        }
        "concat" => Ok(Value::String(args.iter().map(string_form).collect())),
        "substr" => {
            arity(name, &args, 2, Some(3))?;
            let chars: Vec<char> = text(0).chars().collect();
            let total = chars.len() as i64;
            // `as i64` saturates and maps NaN to 0; keep every bound within 0..=total
            let start = to_number(&args[1], name)? as i64;
            let start = if start < 0 {
                total.saturating_add(start).max(0)
            } else {
                start.min(total)
            };
            let end = match args.get(2) {
                Some(len) => {
                    let len = (to_number(len, name)? as i64).clamp(0, total);
                    start.saturating_add(len).min(total)
                }
                None => total,
            };
            Ok(Value::String(chars[start as usize..end as usize].iter().collect()))
        }
        "replace" => {
            arity(name, &args, 3, Some(3))?;
            let search = text(1);
            if search.is_empty() {
                return Ok(Value::String(text(0)));
            }
            Ok(Value::String(text(0).replace(&search, &text(2))))
        }
        "contains" => {
            arity(name, &args, 2, Some(2))?;
            Ok(Value::Bool(text(0).contains(&text(1))))
        }
        "starts_with" => {
            arity(name, &args, 2, Some(2))?;
            Ok(Value::Bool(text(0).starts_with(&text(1))))
        }
        "ends_with" => {
            arity(name, &args, 2, Some(2))?;
            Ok(Value::Bool(text(0).ends_with(&text(1))))
        }
        "round" => {
            arity(name, &args, 1, Some(2))?;
            let decimals = match args.get(1) {
                Some(d) => (to_number(d, name)?.max(0.0) as usize).min(15),
                None => 0,
            };
            Ok(number_value(round_half_away(to_number(&args[0], name)?, decimals)))
        }
        "floor" => {
            arity(name, &args, 1, Some(1))?;
            Ok(number_value(to_number(&args[0], name)?.floor()))
        }
        "ceil" => {
            arity(name, &args, 1, Some(1))?;
            Ok(number_value(to_number(&args[0], name)?.ceil()))
        }
        "abs" => {
            arity(name, &args, 1, Some(1))?;
            Ok(number_value(to_number(&args[0], name)?.abs()))
        }
        "min" | "max" => {
            arity(name, &args, 1, None)?;
            let numbers = args
                .iter()
                .map(|a| to_number(a, name))
                .collect::<ExpressionResult<Vec<f64>>>()?;
            let pick = if name == "min" { f64::min } else { f64::max };
            let result = numbers[1..].iter().fold(numbers[0], |acc, n| pick(acc, *n));
            Ok(number_value(result))
        }
        "number" => {
            arity(name, &args, 1, Some(1))?;
            Ok(numeric_value(&args[0]).map(number_value).unwrap_or(Value::Null))
        }
        "string" => {
            arity(name, &args, 1, Some(1))?;
            Ok(Value::String(text(0)))
        }
        "coalesce" => {
            arity(name, &args, 1, None)?;
            Ok(args
                .iter()
                .find(|a| !is_empty_value(Some(*a)))
                .cloned()
                .unwrap_or(Value::Null))
        }
        "field" => {
            arity(name, &args, 1, Some(1))?;
            Ok(lookup(scope.record, &text(0)))
        }
        _ => Err(ExpressionError::UnknownFunction(name.to_string())),
    }
}
