use std::collections::HashMap;
use std::fmt;

/// One row of a parametric line-cost table: the smallest line class whose
/// `breakpoint_mw` meets the requested load costs `cost_per_km` and carries
/// the class tag used for substation lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct CostRow {
    pub breakpoint_mw: f64,
    pub cost_per_km: f64,
    pub tag: String,
}

#[derive(Debug)]
pub enum ExpressionError {
    UnexpectedChar(char),
    UnexpectedToken(String),
    UnexpectedEnd,
    UnknownName(String),
    MissingTag(String),
    BadEntry(String),
}

impl fmt::Display for ExpressionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpressionError::UnexpectedChar(c) => write!(f, "Unexpected character '{}'", c),
            ExpressionError::UnexpectedToken(t) => write!(f, "Unexpected token '{}'", t),
            ExpressionError::UnexpectedEnd => write!(f, "Unexpected end of expression"),
            ExpressionError::UnknownName(n) => write!(f, "Unknown price tag '{}'", n),
            ExpressionError::MissingTag(e) => write!(f, "Entry '{}' names no price tag", e),
            ExpressionError::BadEntry(e) => write!(f, "Malformed table entry '{}'", e),
        }
    }
}

impl std::error::Error for ExpressionError {}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Num(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
    Comma,
    Eq,
}

/// Identifiers may begin with digits ("132kV"), so a run of digits followed
/// by a letter continues as an identifier rather than closing a number.
fn tokenize(input: &str) -> Result<Vec<Token>, ExpressionError> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' => i += 1,
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '/' => {
                tokens.push(Token::Slash);
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
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '=' => {
                tokens.push(Token::Eq);
                i += 1;
            }
            _ if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                if i < chars.len() && (chars[i].is_alphabetic() || chars[i] == '_') {
                    while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                        i += 1;
                    }
                    tokens.push(Token::Ident(chars[start..i].iter().collect()));
                } else {
                    let text: String = chars[start..i].iter().collect();
                    let value = text
                        .parse()
                        .map_err(|_| ExpressionError::UnexpectedToken(text))?;
                    tokens.push(Token::Num(value));
                }
            }
            _ if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            other => return Err(ExpressionError::UnexpectedChar(other)),
        }
    }
    Ok(tokens)
}

/// Evaluation result: a numeric value plus the last price tag the
/// expression touched, which becomes the row's line-class tag.
#[derive(Debug, Clone)]
struct Val {
    value: f64,
    tag: Option<String>,
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    prices: &'a HashMap<String, f64>,
    var: Option<(&'a str, f64)>,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Result<&Token, ExpressionError> {
        let token = self.tokens.get(self.pos).ok_or(ExpressionError::UnexpectedEnd)?;
        self.pos += 1;
        Ok(token)
    }

    fn expr(&mut self) -> Result<Val, ExpressionError> {
        let mut left = self.term()?;
        while let Some(op) = self.peek().cloned() {
            match op {
                Token::Plus | Token::Minus => {
                    self.pos += 1;
                    let right = self.term()?;
                    left.value = match op {
                        Token::Plus => left.value + right.value,
                        _ => left.value - right.value,
                    };
                    if right.tag.is_some() {
                        left.tag = right.tag;
                    }
                }
                _ => break,
            }
        }
        Ok(left)
    }

    fn term(&mut self) -> Result<Val, ExpressionError> {
        let mut left = self.factor()?;
        while let Some(op) = self.peek().cloned() {
            match op {
                Token::Star | Token::Slash => {
                    self.pos += 1;
                    let right = self.factor()?;
                    left.value = match op {
                        Token::Star => left.value * right.value,
                        _ => left.value / right.value,
                    };
                    if right.tag.is_some() {
                        left.tag = right.tag;
                    }
                }
                _ => break,
            }
        }
        Ok(left)
    }

    fn factor(&mut self) -> Result<Val, ExpressionError> {
        match self.next()?.clone() {
            Token::Num(value) => Ok(Val { value, tag: None }),
            Token::Minus => {
                let inner = self.factor()?;
                Ok(Val {
                    value: -inner.value,
                    tag: inner.tag,
                })
            }
            Token::LParen => {
                let inner = self.expr()?;
                match self.next()? {
                    Token::RParen => Ok(inner),
                    other => Err(ExpressionError::UnexpectedToken(format!("{:?}", other))),
                }
            }
            Token::Ident(name) => {
                if let Some((var, value)) = self.var {
                    if name == var {
                        return Ok(Val { value, tag: None });
                    }
                }
                let price = self
                    .prices
                    .get(&name)
                    .copied()
                    .ok_or_else(|| ExpressionError::UnknownName(name.clone()))?;
                Ok(Val {
                    value: price,
                    tag: Some(name),
                })
            }
            other => Err(ExpressionError::UnexpectedToken(format!("{:?}", other))),
        }
    }
}

fn evaluate(
    expr: &str,
    prices: &HashMap<String, f64>,
    var: Option<(&str, f64)>,
) -> Result<Val, ExpressionError> {
    let tokens = tokenize(expr)?;
    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
        prices,
        var,
    };
    let val = parser.expr()?;
    if parser.pos != tokens.len() {
        return Err(ExpressionError::UnexpectedToken(format!(
            "{:?}",
            tokens[parser.pos]
        )));
    }
    Ok(val)
}

/// Split a table string into entries at top-level commas, leaving commas
/// inside `for(...)` untouched.
fn split_entries(spec: &str) -> Vec<String> {
    let mut entries = Vec::new();
    let mut depth = 0usize;
    let mut current = String::new();
    for c in spec.chars() {
        match c {
            '(' => {
                depth += 1;
                current.push(c);
            }
            ')' => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            ',' if depth == 0 => {
                entries.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(c),
        }
    }
    if !current.trim().is_empty() {
        entries.push(current.trim().to_string());
    }
    entries
}

/// Build a cost table from entries of the form `capacity = coeff * TAG`,
/// with `for(i=lo,hi, i * TAG)` expanding into one row per circuit count.
/// The breakpoint of an expanded row is `i` times the breakpoint the tag's
/// plain row declared, so the table must declare a class before looping
/// over it.
pub fn parse_cost_table(
    spec: &str,
    prices: &HashMap<String, f64>,
) -> Result<Vec<CostRow>, ExpressionError> {
    let mut rows: Vec<CostRow> = Vec::new();
    let mut tag_breakpoints: HashMap<String, f64> = HashMap::new();

    for entry in split_entries(spec) {
        if let Some(body) = entry
            .strip_prefix("for")
            .map(str::trim_start)
            .and_then(|rest| rest.strip_prefix('('))
            .and_then(|rest| rest.strip_suffix(')'))
        {
            // for(i=lo,hi,expr)
            let mut parts = split_entries(body).into_iter();
            let head = parts.next().ok_or_else(|| ExpressionError::BadEntry(entry.clone()))?;
            let hi_text = parts.next().ok_or_else(|| ExpressionError::BadEntry(entry.clone()))?;
            let body_expr = parts.collect::<Vec<_>>().join(",");
            let (var, lo_text) = head
                .split_once('=')
                .ok_or_else(|| ExpressionError::BadEntry(entry.clone()))?;
            let var = var.trim();
            let lo: i64 = lo_text
                .trim()
                .parse()
                .map_err(|_| ExpressionError::BadEntry(entry.clone()))?;
            let hi: i64 = hi_text
                .trim()
                .parse()
                .map_err(|_| ExpressionError::BadEntry(entry.clone()))?;

            for i in lo..=hi {
                let val = evaluate(&body_expr, prices, Some((var, i as f64)))?;
                let tag = val
                    .tag
                    .ok_or_else(|| ExpressionError::MissingTag(entry.clone()))?;
                let base = tag_breakpoints
                    .get(&tag)
                    .copied()
                    .ok_or_else(|| ExpressionError::UnknownName(tag.clone()))?;
                rows.push(CostRow {
                    breakpoint_mw: base * i as f64,
                    cost_per_km: val.value,
                    tag,
                });
            }
        } else {
            let (breakpoint_text, expr) = entry
                .split_once('=')
                .ok_or_else(|| ExpressionError::BadEntry(entry.clone()))?;
            let breakpoint_mw: f64 = breakpoint_text
                .trim()
                .parse()
                .map_err(|_| ExpressionError::BadEntry(entry.clone()))?;
            let val = evaluate(expr, prices, None)?;
            let tag = val
                .tag
                .ok_or_else(|| ExpressionError::MissingTag(entry.clone()))?;
            tag_breakpoints.entry(tag.clone()).or_insert(breakpoint_mw);
            rows.push(CostRow {
                breakpoint_mw,
                cost_per_km: val.value,
                tag,
            });
        }
    }

    rows.sort_by(|a, b| a.breakpoint_mw.total_cmp(&b.breakpoint_mw));
    Ok(rows)
}

/// Parse a `tag=price` list into the price map the table expressions
/// resolve against. Prices accept K/M suffixes.
pub fn parse_price_list(spec: &str) -> Result<HashMap<String, f64>, ExpressionError> {
    let mut prices = HashMap::new();
    for entry in split_entries(spec) {
        let (tag, price_text) = entry
            .split_once('=')
            .ok_or_else(|| ExpressionError::BadEntry(entry.clone()))?;
        let price_text = price_text.trim();
        let (digits, scale) = match price_text.chars().last() {
            Some('K') | Some('k') => (&price_text[..price_text.len() - 1], 1e3),
            Some('M') | Some('m') => (&price_text[..price_text.len() - 1], 1e6),
            _ => (price_text, 1.0),
        };
        let price: f64 = digits
            .trim()
            .parse()
            .map_err(|_| ExpressionError::BadEntry(entry.clone()))?;
        prices.insert(tag.trim().to_string(), price * scale);
    }
    Ok(prices)
}
