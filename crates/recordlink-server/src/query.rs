//! Read-only SQL subset over the record tables.
//!
//! Supported shape:
//!
//! ```text
//! SELECT * | col [, col ...]
//! FROM table [[AS] alias]
//! [WHERE predicate [AND predicate ...]]
//! [ORDER BY col [ASC | DESC] [, ...]] [;]
//! ```
//!
//! Identifiers may be bracketed (`[Printed]`) and qualified by the table
//! name or alias (`T0.DocEntry`). A predicate compares a column with a
//! string, a number, `CURRENT_DATE` or `CAST(CURRENT_TIMESTAMP AS DATE)`,
//! or tests it with `IS [NOT] NULL`. Keywords and column names match
//! case-insensitively.

use std::cmp::Ordering;

use recordlink_proto::{RecordData, RecordType, Value};

use crate::error::QueryError;
use crate::store::{known_columns, Store};

/// Comparison operator of a predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// `=`
    Eq,
    /// `<>` or `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

impl CompareOp {
    fn holds(self, ordering: Ordering) -> bool {
        match self {
            CompareOp::Eq => ordering == Ordering::Equal,
            CompareOp::Ne => ordering != Ordering::Equal,
            CompareOp::Lt => ordering == Ordering::Less,
            CompareOp::Le => ordering != Ordering::Greater,
            CompareOp::Gt => ordering == Ordering::Greater,
            CompareOp::Ge => ordering != Ordering::Less,
        }
    }
}

/// Right-hand side of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// A literal value.
    Literal(Value),
    /// The server's current date, evaluated at execution.
    CurrentDate,
}

/// One `WHERE` condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// `column op operand`
    Compare {
        /// Column name.
        column: String,
        /// Operator.
        op: CompareOp,
        /// Right-hand side.
        operand: Operand,
    },
    /// `column IS [NOT] NULL`
    IsNull {
        /// Column name.
        column: String,
        /// `IS NOT NULL` when set.
        negated: bool,
    },
}

/// Columns to project.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    /// `*`
    All,
    /// Named columns in select-list order.
    Columns(Vec<String>),
}

/// A parsed query.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    /// Projected columns.
    pub selection: Selection,
    /// Table name as written.
    pub table: String,
    /// Table alias, if any.
    pub alias: Option<String>,
    /// Conjunction of conditions.
    pub predicates: Vec<Predicate>,
    /// Sort keys: column and descending flag.
    pub order_by: Vec<(String, bool)>,
}

/// A materialised query result.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultSet {
    /// Column names in select-list order.
    pub columns: Vec<String>,
    /// Rows of values in column order.
    pub rows: Vec<Vec<Value>>,
}

/// Parse and run a query against the store.
pub fn run(text: &str, store: &Store) -> Result<ResultSet, QueryError> {
    execute(&parse(text)?, store)
}

/// Parse query text.
pub fn parse(text: &str) -> Result<Query, QueryError> {
    let mut parser = Parser {
        tokens: tokenize(text)?,
        pos: 0,
    };
    parser.query()
}

/// Run a parsed query against the store.
pub fn execute(query: &Query, store: &Store) -> Result<ResultSet, QueryError> {
    let record_type = RecordType::from_table(&query.table)
        .ok_or_else(|| QueryError::UnknownTable(query.table.clone()))?;
    let rows: Vec<&RecordData> = store.rows(record_type).collect();
    let resolve = |name: &str| resolve_column(record_type, &rows, name);

    let columns = match &query.selection {
        Selection::All => all_columns(record_type, &rows),
        Selection::Columns(names) => names
            .iter()
            .map(|name| resolve(name.as_str()))
            .collect::<Result<Vec<_>, _>>()?,
    };

    let today = Value::date(chrono::Local::now().date_naive());
    let mut tests = Vec::with_capacity(query.predicates.len());
    for predicate in &query.predicates {
        tests.push(match predicate {
            Predicate::Compare { column, op, operand } => {
                let operand = match operand {
                    Operand::Literal(value) => value.clone(),
                    Operand::CurrentDate => today.clone(),
                };
                (resolve(column.as_str())?, *op, operand)
            }
            Predicate::IsNull { column, negated } => {
                let op = if *negated { CompareOp::Ne } else { CompareOp::Eq };
                (resolve(column.as_str())?, op, Value::Null)
            }
        });
    }

    let mut selected: Vec<&RecordData> = rows
        .iter()
        .copied()
        .filter(|row| {
            tests.iter().all(|(column, op, operand)| {
                matches(row.field(column).unwrap_or(&Value::Null), *op, operand)
            })
        })
        .collect();

    let order: Vec<(String, bool)> = query
        .order_by
        .iter()
        .map(|(name, descending)| Ok((resolve(name.as_str())?, *descending)))
        .collect::<Result<_, QueryError>>()?;
    if !order.is_empty() {
        selected.sort_by(|a, b| {
            for (column, descending) in &order {
                let ordering = sort_order(
                    a.field(column).unwrap_or(&Value::Null),
                    b.field(column).unwrap_or(&Value::Null),
                );
                let ordering = if *descending { ordering.reverse() } else { ordering };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        });
    }

    let rows = selected
        .into_iter()
        .map(|row| {
            columns
                .iter()
                .map(|column| row.field(column).cloned().unwrap_or(Value::Null))
                .collect()
        })
        .collect();

    Ok(ResultSet { columns, rows })
}

fn matches(value: &Value, op: CompareOp, operand: &Value) -> bool {
    if operand.is_null() {
        return match op {
            CompareOp::Eq => value.is_null(),
            _ => !value.is_null(),
        };
    }
    value.compare(operand).is_some_and(|ordering| op.holds(ordering))
}

/// Nulls sort first; incomparable values keep their order.
fn sort_order(a: &Value, b: &Value) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => a.compare(b).unwrap_or(Ordering::Equal),
    }
}

fn resolve_column(record_type: RecordType, rows: &[&RecordData], name: &str) -> Result<String, QueryError> {
    if let Some(known) = known_columns(record_type)
        .iter()
        .find(|c| c.eq_ignore_ascii_case(name))
    {
        return Ok(known.to_string());
    }
    rows.iter()
        .flat_map(|row| row.fields.iter())
        .find(|f| f.field.eq_ignore_ascii_case(name))
        .map(|f| f.field.clone())
        .ok_or_else(|| QueryError::UnknownColumn(name.to_string()))
}

fn all_columns(record_type: RecordType, rows: &[&RecordData]) -> Vec<String> {
    let mut columns: Vec<String> = known_columns(record_type)
        .iter()
        .map(|c| c.to_string())
        .collect();
    for field in rows.iter().flat_map(|row| row.fields.iter()) {
        if !columns.iter().any(|c| c.eq_ignore_ascii_case(&field.field)) {
            columns.push(field.field.clone());
        }
    }
    columns
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word(String),
    Bracketed(String),
    Text(String),
    Number(Value),
    Comma,
    Dot,
    Star,
    LParen,
    RParen,
    Semicolon,
    Op(CompareOp),
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Word(w) => format!("'{}'", w),
            Token::Bracketed(w) => format!("'[{}]'", w),
            Token::Text(t) => format!("string '{}'", t),
            Token::Number(n) => format!("number {}", n),
            Token::Comma => "','".into(),
            Token::Dot => "'.'".into(),
            Token::Star => "'*'".into(),
            Token::LParen => "'('".into(),
            Token::RParen => "')'".into(),
            Token::Semicolon => "';'".into(),
            Token::Op(op) => format!("operator {:?}", op),
        }
    }
}

const RESERVED: &[&str] = &[
    "SELECT", "FROM", "WHERE", "AND", "OR", "ORDER", "BY", "ASC", "DESC", "AS", "IS", "NOT", "NULL",
    "JOIN", "GROUP",
];

fn syntax(message: impl Into<String>) -> QueryError {
    QueryError::Syntax(message.into())
}

fn tokenize(text: &str) -> Result<Vec<Token>, QueryError> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            ',' | '.' | '*' | '(' | ')' | ';' | '=' => {
                chars.next();
                tokens.push(match c {
                    ',' => Token::Comma,
                    '.' => Token::Dot,
                    '*' => Token::Star,
                    '(' => Token::LParen,
                    ')' => Token::RParen,
                    ';' => Token::Semicolon,
                    _ => Token::Op(CompareOp::Eq),
                });
            }
            '<' => {
                chars.next();
                let op = match chars.peek() {
                    Some('=') => CompareOp::Le,
                    Some('>') => CompareOp::Ne,
                    _ => CompareOp::Lt,
                };
                if op != CompareOp::Lt {
                    chars.next();
                }
                tokens.push(Token::Op(op));
            }
            '>' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::Op(CompareOp::Ge));
                } else {
                    tokens.push(Token::Op(CompareOp::Gt));
                }
            }
            '!' => {
                chars.next();
                if chars.next() != Some('=') {
                    return Err(syntax("expected '=' after '!'"));
                }
                tokens.push(Token::Op(CompareOp::Ne));
            }
            '[' => {
                chars.next();
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some(']') => break,
                        Some(c) => name.push(c),
                        None => return Err(syntax("unclosed '['")),
                    }
                }
                tokens.push(Token::Bracketed(name));
            }
            '\'' => {
                chars.next();
                let mut text = String::new();
                loop {
                    match chars.next() {
                        Some('\'') if chars.peek() == Some(&'\'') => {
                            chars.next();
                            text.push('\'');
                        }
                        Some('\'') => break,
                        Some(c) => text.push(c),
                        None => return Err(syntax("unterminated string literal")),
                    }
                }
                tokens.push(Token::Text(text));
            }
            c if c.is_ascii_digit() || c == '-' => {
                let mut number = String::new();
                number.push(c);
                chars.next();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() || d == '.' {
                        number.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Number(parse_number(&number)?));
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut word = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_alphanumeric() || d == '_' {
                        word.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Word(word));
            }
            other => return Err(syntax(format!("unexpected character '{}'", other))),
        }
    }
    Ok(tokens)
}

fn parse_number(text: &str) -> Result<Value, QueryError> {
    let invalid = || syntax(format!("invalid number '{}'", text));
    if text.contains('.') {
        return text.parse::<f64>().map(Value::Float64).map_err(|_| invalid());
    }
    let n = text.parse::<i64>().map_err(|_| invalid())?;
    Ok(i32::try_from(n).map(Value::Int32).unwrap_or(Value::Int64(n)))
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

/// Column reference before qualifier checking.
struct ColumnRef {
    qualifier: Option<String>,
    name: String,
}

/// Predicate body before its column is bound.
enum Condition {
    Compare(CompareOp, Operand),
    IsNull(bool),
}

impl Parser {
    fn query(&mut self) -> Result<Query, QueryError> {
        self.expect_keyword("SELECT")?;

        let selection = if self.eat(&Token::Star) {
            None
        } else {
            let mut columns = vec![self.column()?];
            while self.eat(&Token::Comma) {
                columns.push(self.column()?);
            }
            Some(columns)
        };

        self.expect_keyword("FROM")?;
        let table = self.identifier()?;
        let bare_alias = matches!(
            self.peek(),
            Some(Token::Word(w)) if !is_reserved(w)
        ) || matches!(self.peek(), Some(Token::Bracketed(_)));
        let alias = if self.keyword("AS") || bare_alias {
            Some(self.identifier()?)
        } else {
            None
        };

        let mut conditions = Vec::new();
        if self.keyword("WHERE") {
            conditions.push(self.predicate()?);
            while self.keyword("AND") {
                conditions.push(self.predicate()?);
            }
        }

        let mut order = Vec::new();
        if self.keyword("ORDER") {
            self.expect_keyword("BY")?;
            loop {
                let column = self.column()?;
                let descending = if self.keyword("DESC") {
                    true
                } else {
                    self.keyword("ASC");
                    false
                };
                order.push((column, descending));
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
        }

        self.eat(&Token::Semicolon);
        if let Some(token) = self.peek() {
            return Err(syntax(format!("unexpected {}", token.describe())));
        }

        let bind = |column: ColumnRef| -> Result<String, QueryError> {
            match &column.qualifier {
                None => Ok(column.name),
                Some(q)
                    if q.eq_ignore_ascii_case(&table)
                        || alias.as_ref().is_some_and(|a| q.eq_ignore_ascii_case(a)) =>
                {
                    Ok(column.name)
                }
                Some(q) => Err(syntax(format!(
                    "the multi-part identifier '{}.{}' could not be bound",
                    q, column.name
                ))),
            }
        };

        let selection = match selection {
            None => Selection::All,
            Some(columns) => Selection::Columns(
                columns.into_iter().map(&bind).collect::<Result<_, _>>()?,
            ),
        };
        let predicates = conditions
            .into_iter()
            .map(|(column, condition)| {
                let column = bind(column)?;
                Ok(match condition {
                    Condition::Compare(op, operand) => Predicate::Compare { column, op, operand },
                    Condition::IsNull(negated) => Predicate::IsNull { column, negated },
                })
            })
            .collect::<Result<_, QueryError>>()?;
        let order_by = order
            .into_iter()
            .map(|(column, descending)| Ok((bind(column)?, descending)))
            .collect::<Result<_, QueryError>>()?;

        Ok(Query {
            selection,
            table,
            alias,
            predicates,
            order_by,
        })
    }

    fn predicate(&mut self) -> Result<(ColumnRef, Condition), QueryError> {
        let column = self.column()?;

        if self.keyword("IS") {
            let negated = self.keyword("NOT");
            self.expect_keyword("NULL")?;
            return Ok((column, Condition::IsNull(negated)));
        }

        let op = match self.next() {
            Some(Token::Op(op)) => op,
            Some(other) => return Err(syntax(format!("expected comparison operator, found {}", other.describe()))),
            None => return Err(syntax("expected comparison operator, found end of query")),
        };
        let operand = self.operand()?;
        Ok((column, Condition::Compare(op, operand)))
    }

    fn operand(&mut self) -> Result<Operand, QueryError> {
        match self.next() {
            Some(Token::Text(text)) => Ok(Operand::Literal(Value::String(text))),
            Some(Token::Number(number)) => Ok(Operand::Literal(number)),
            Some(Token::Word(w)) if w.eq_ignore_ascii_case("CURRENT_DATE") => Ok(Operand::CurrentDate),
            Some(Token::Word(w)) if w.eq_ignore_ascii_case("CAST") => {
                // CAST(CURRENT_TIMESTAMP AS DATE)
                self.expect(&Token::LParen)?;
                self.expect_keyword("CURRENT_TIMESTAMP")?;
                self.expect_keyword("AS")?;
                self.expect_keyword("DATE")?;
                self.expect(&Token::RParen)?;
                Ok(Operand::CurrentDate)
            }
            Some(other) => Err(syntax(format!("expected a value, found {}", other.describe()))),
            None => Err(syntax("expected a value, found end of query")),
        }
    }

    fn column(&mut self) -> Result<ColumnRef, QueryError> {
        let first = self.identifier()?;
        if self.eat(&Token::Dot) {
            let name = self.identifier()?;
            Ok(ColumnRef {
                qualifier: Some(first),
                name,
            })
        } else {
            Ok(ColumnRef {
                qualifier: None,
                name: first,
            })
        }
    }

    fn identifier(&mut self) -> Result<String, QueryError> {
        match self.next() {
            Some(Token::Word(w)) if !is_reserved(&w) => Ok(w),
            Some(Token::Bracketed(name)) => Ok(name),
            Some(other) => Err(syntax(format!("expected identifier, found {}", other.describe()))),
            None => Err(syntax("expected identifier, found end of query")),
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token) -> Result<(), QueryError> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(self.unexpected(&token.describe()))
        }
    }

    fn keyword(&mut self, keyword: &str) -> bool {
        let found = matches!(self.peek(), Some(Token::Word(w)) if w.eq_ignore_ascii_case(keyword));
        if found {
            self.pos += 1;
        }
        found
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<(), QueryError> {
        if self.keyword(keyword) {
            Ok(())
        } else {
            Err(self.unexpected(keyword))
        }
    }

    fn unexpected(&self, wanted: &str) -> QueryError {
        match self.peek() {
            Some(token) => syntax(format!("expected {}, found {}", wanted, token.describe())),
            None => syntax(format!("expected {}, found end of query", wanted)),
        }
    }
}

fn is_reserved(word: &str) -> bool {
    RESERVED.iter().any(|r| r.eq_ignore_ascii_case(word))
}
