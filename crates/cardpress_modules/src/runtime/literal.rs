//! In-process runtime for declarative module bodies.
//!
//! Card sources are data, not programs: declarations of object and array
//! literals that reference imported values. This runtime evaluates exactly
//! that subset while parsing, without building a syntax tree. Anything
//! outside it (calls, operators, functions, classes) is a syntax error, so
//! a body that needs a real engine fails loudly instead of producing a
//! partial record.
//!
//! `undefined` is modelled as `None`; object properties holding it are
//! omitted and array slots holding it become `null`, as in JSON output.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde_json::{Map, Number, Value};
use tracing::trace;

use super::lexer::{tokenize, LexError, Template, Token, TokenKind};
use super::ModuleRuntime;
use crate::error::ExtractionError;
use crate::graph::{ModuleGraph, ModuleId};

/// Largest integer a JS number represents exactly.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

#[derive(Debug, Default, Clone, Copy)]
pub struct LiteralRuntime;

impl LiteralRuntime {
    pub fn new() -> Self {
        Self
    }

    /// Evaluate one body with `bindings` in scope.
    pub fn evaluate_body(
        &self,
        path: &Path,
        body: &str,
        bindings: Vec<(String, Value)>,
    ) -> Result<Value, ExtractionError> {
        let scope = bindings
            .into_iter()
            .map(|(name, value)| (name, Some(value)))
            .collect();
        let mut interpreter = Interpreter::new(path, body, 0, scope)?;
        Ok(interpreter.run()?.unwrap_or(Value::Null))
    }
}

impl ModuleRuntime for LiteralRuntime {
    fn evaluate(
        &mut self,
        graph: &ModuleGraph,
        pending: &[ModuleId],
        resolved: &HashMap<ModuleId, Value>,
    ) -> Result<Vec<Value>, ExtractionError> {
        let mut local: HashMap<ModuleId, Value> = HashMap::with_capacity(pending.len());
        let mut results = Vec::with_capacity(pending.len());

        for &id in pending {
            let module = graph.get(id);
            let mut bindings = Vec::with_capacity(module.params.len());
            for (name, dep) in module.params.iter().zip(&module.deps) {
                let value = local
                    .get(dep)
                    .or_else(|| resolved.get(dep))
                    .cloned()
                    .ok_or_else(|| ExtractionError::Evaluation {
                        path: module.path.clone(),
                        message: format!("dependency '{name}' was not evaluated first"),
                    })?;
                bindings.push((name.clone(), value));
            }

            trace!(path = %module.path.display(), "evaluating module in process");
            let value = self.evaluate_body(&module.path, &module.body, bindings)?;
            local.insert(id, value.clone());
            results.push(value);
        }
        Ok(results)
    }
}

type Scope = HashMap<String, Option<Value>>;

struct Interpreter {
    path: PathBuf,
    tokens: Vec<Token>,
    pos: usize,
    scope: Scope,
}

impl Interpreter {
    fn new(path: &Path, source: &str, base: usize, scope: Scope) -> Result<Self, ExtractionError> {
        let tokens = tokenize(source, base).map_err(|e: LexError| ExtractionError::Syntax {
            path: path.to_path_buf(),
            offset: e.offset,
            message: e.message,
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            tokens,
            pos: 0,
            scope,
        })
    }

    // ------------------------------------------------------------------
    // Token helpers
    // ------------------------------------------------------------------

    fn peek(&self) -> &TokenKind {
        &self.tokens[self.pos].kind
    }

    fn peek_ahead(&self, n: usize) -> &TokenKind {
        let idx = (self.pos + n).min(self.tokens.len() - 1);
        &self.tokens[idx].kind
    }

    fn advance(&mut self) -> TokenKind {
        let kind = self.tokens[self.pos].kind.clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        kind
    }

    fn at_punct(&self, c: char) -> bool {
        matches!(self.peek(), TokenKind::Punct(p) if *p == c)
    }

    fn eat_punct(&mut self, c: char) -> bool {
        if self.at_punct(c) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, c: char) -> Result<(), ExtractionError> {
        if self.eat_punct(c) {
            Ok(())
        } else {
            Err(self.syntax(format!("expected '{c}'")))
        }
    }

    fn syntax(&self, message: impl Into<String>) -> ExtractionError {
        ExtractionError::Syntax {
            path: self.path.clone(),
            offset: self.tokens[self.pos].offset,
            message: message.into(),
        }
    }

    fn runtime(&self, message: impl Into<String>) -> ExtractionError {
        ExtractionError::Evaluation {
            path: self.path.clone(),
            message: message.into(),
        }
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    /// Run statements until `return` or end of body.
    fn run(&mut self) -> Result<Option<Value>, ExtractionError> {
        loop {
            match self.peek().clone() {
                TokenKind::Eof => return Ok(None),
                TokenKind::Punct(';') => {
                    self.advance();
                }
                TokenKind::Ident(word) => match word.as_str() {
                    "const" | "let" | "var" => self.declaration()?,
                    "return" => {
                        self.advance();
                        if matches!(self.peek(), TokenKind::Eof | TokenKind::Punct(';' | '}')) {
                            return Ok(None);
                        }
                        return self.expression();
                    }
                    "export" => {
                        self.advance();
                        if !matches!(self.peek(), TokenKind::Ident(w) if matches!(w.as_str(), "const" | "let" | "var"))
                        {
                            return Err(self.syntax("only declarations may be exported"));
                        }
                    }
                    "function" | "class" | "if" | "for" | "while" | "switch" | "import" | "type"
                    | "interface" | "enum" | "namespace" => {
                        return Err(self.syntax(format!("'{word}' statements are not supported")));
                    }
                    _ => {
                        self.expression()?;
                        self.end_statement()?;
                    }
                },
                _ => {
                    self.expression()?;
                    self.end_statement()?;
                }
            }
        }
    }

    fn end_statement(&mut self) -> Result<(), ExtractionError> {
        if self.eat_punct(';') || matches!(self.peek(), TokenKind::Eof) || self.at_statement_start() {
            Ok(())
        } else {
            Err(self.syntax("unexpected token after expression"))
        }
    }

    fn at_statement_start(&self) -> bool {
        matches!(self.peek(), TokenKind::Ident(w)
            if matches!(w.as_str(), "const" | "let" | "var" | "return" | "export"))
    }

    fn declaration(&mut self) -> Result<(), ExtractionError> {
        self.advance();
        loop {
            let name = match self.advance() {
                TokenKind::Ident(name) => name,
                _ => return Err(self.syntax("destructuring declarations are not supported")),
            };
            if self.at_punct(':') {
                self.advance();
                self.skip_type(&['='])?;
            }
            let value = if self.eat_punct('=') {
                self.expression()?
            } else {
                None
            };
            self.scope.insert(name, value);
            if !self.eat_punct(',') {
                break;
            }
        }
        self.end_statement()
    }

    /// Skip a type expression up to a delimiter at depth zero.
    fn skip_type(&mut self, stop: &[char]) -> Result<(), ExtractionError> {
        let mut depth = 0usize;
        let mut consumed = false;
        loop {
            let token = &self.tokens[self.pos];
            match &token.kind {
                TokenKind::Eof => return Ok(()),
                TokenKind::Punct(c)
                    if depth == 0 && (stop.contains(c) || matches!(c, ',' | ';' | '}' | ']' | ')')) =>
                {
                    return Ok(())
                }
                TokenKind::Punct('<' | '(' | '[' | '{') => depth += 1,
                TokenKind::Punct('>' | ')' | ']' | '}') => depth = depth.saturating_sub(1),
                TokenKind::Ident(_) if depth == 0 && consumed && token.line_break_before => {
                    if self.at_statement_start() {
                        return Ok(());
                    }
                }
                _ => {}
            }
            consumed = true;
            self.advance();
        }
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn expression(&mut self) -> Result<Option<Value>, ExtractionError> {
        let value = self.unary()?;
        while matches!(self.peek(), TokenKind::Ident(w) if w == "as" || w == "satisfies") {
            self.advance();
            self.skip_type(&[])?;
        }
        if self.at_punct('=') && matches!(self.peek_ahead(1), TokenKind::Punct('>')) {
            return Err(self.syntax("arrow functions are not supported"));
        }
        if let TokenKind::Punct(op) = self.peek() {
            if matches!(op, '+' | '-' | '*' | '/' | '%' | '?' | '|' | '&' | '<' | '>' | '=') {
                return Err(self.syntax(format!("operator '{op}' is not supported")));
            }
        }
        Ok(value)
    }

    fn unary(&mut self) -> Result<Option<Value>, ExtractionError> {
        if self.eat_punct('-') {
            let operand = self.unary()?;
            return match operand {
                Some(Value::Number(n)) => Ok(Some(negate(&n))),
                _ => Err(self.runtime("unary '-' applied to a non-number")),
            };
        }
        if self.eat_punct('+') {
            let operand = self.unary()?;
            return match operand {
                Some(Value::Number(n)) => Ok(Some(Value::Number(n))),
                _ => Err(self.runtime("unary '+' applied to a non-number")),
            };
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Result<Option<Value>, ExtractionError> {
        let mut value = self.primary()?;
        let mut short_circuited = false;
        loop {
            match self.peek() {
                TokenKind::Punct('.') => {
                    self.advance();
                    let name = self.property_name()?;
                    if !short_circuited {
                        value = self.member(value, &name, false)?;
                    }
                }
                TokenKind::OptionalDot => {
                    self.advance();
                    let key = if self.eat_punct('[') {
                        let key = self.expression()?;
                        self.expect_punct(']')?;
                        key_string(key.as_ref())
                    } else {
                        self.property_name()?
                    };
                    if !short_circuited {
                        if value.as_ref().map_or(true, Value::is_null) {
                            short_circuited = true;
                            value = None;
                        } else {
                            value = self.member(value, &key, true)?;
                        }
                    }
                }
                TokenKind::Punct('[') => {
                    self.advance();
                    let key = self.expression()?;
                    self.expect_punct(']')?;
                    if !short_circuited {
                        value = self.member(value, &key_string(key.as_ref()), false)?;
                    }
                }
                // TS non-null assertion.
                TokenKind::Punct('!') if !matches!(self.peek_ahead(1), TokenKind::Punct('=')) => {
                    self.advance();
                }
                TokenKind::Punct('(') => {
                    return Err(self.syntax("function calls are not supported"));
                }
                _ => return Ok(value),
            }
        }
    }

    fn property_name(&mut self) -> Result<String, ExtractionError> {
        match self.advance() {
            TokenKind::Ident(name) => Ok(name),
            _ => Err(self.syntax("expected property name")),
        }
    }

    fn member(&self, target: Option<Value>, key: &str, optional: bool) -> Result<Option<Value>, ExtractionError> {
        match target {
            Some(Value::Object(mut map)) => Ok(map.remove(key)),
            Some(Value::Array(items)) => {
                if key == "length" {
                    return Ok(Some(Value::from(items.len())));
                }
                Ok(key.parse::<usize>().ok().and_then(|i| items.into_iter().nth(i)))
            }
            Some(Value::String(s)) => {
                if key == "length" {
                    return Ok(Some(Value::from(s.encode_utf16().count())));
                }
                Ok(key
                    .parse::<usize>()
                    .ok()
                    .and_then(|i| s.chars().nth(i))
                    .map(|c| Value::String(c.to_string())))
            }
            Some(Value::Null) if !optional => {
                Err(self.runtime(format!("cannot read property '{key}' of null")))
            }
            None if !optional => Err(self.runtime(format!("cannot read property '{key}' of undefined"))),
            _ => Ok(None),
        }
    }

    fn primary(&mut self) -> Result<Option<Value>, ExtractionError> {
        match self.advance() {
            TokenKind::Number(n) => Ok(Some(number_value(n))),
            TokenKind::Str(s) => Ok(Some(Value::String(s))),
            TokenKind::Template(template) => self.template(template).map(|s| Some(Value::String(s))),
            TokenKind::Punct('{') => self.object().map(Some),
            TokenKind::Punct('[') => self.array().map(Some),
            TokenKind::Punct('(') => {
                let value = self.expression()?;
                self.expect_punct(')')?;
                Ok(value)
            }
            TokenKind::Ident(word) => match word.as_str() {
                "true" => Ok(Some(Value::Bool(true))),
                "false" => Ok(Some(Value::Bool(false))),
                "null" => Ok(Some(Value::Null)),
                "undefined" => Ok(None),
                "NaN" | "Infinity" => Ok(Some(Value::Null)),
                "new" | "function" | "class" | "typeof" | "void" | "delete" | "await" => {
                    Err(self.syntax(format!("'{word}' is not supported")))
                }
                _ if self.at_punct('(') => Err(self.syntax("function calls are not supported")),
                _ => match self.scope.get(&word) {
                    Some(value) => Ok(value.clone()),
                    None => Err(self.runtime(format!("{word} is not defined"))),
                },
            },
            other => {
                self.pos = self.pos.saturating_sub(1);
                Err(self.syntax(format!("unexpected token {other:?}")))
            }
        }
    }

    fn object(&mut self) -> Result<Value, ExtractionError> {
        let mut map = Map::new();
        while !self.eat_punct('}') {
            if matches!(self.peek(), TokenKind::Spread) {
                self.advance();
                match self.expression()? {
                    Some(Value::Object(other)) => {
                        for (k, v) in other {
                            map.insert(k, v);
                        }
                    }
                    Some(Value::Array(items)) => {
                        for (i, v) in items.into_iter().enumerate() {
                            map.insert(i.to_string(), v);
                        }
                    }
                    Some(Value::String(s)) => {
                        for (i, c) in s.chars().enumerate() {
                            map.insert(i.to_string(), Value::String(c.to_string()));
                        }
                    }
                    _ => {}
                }
            } else {
                let (key, shorthand) = match self.advance() {
                    TokenKind::Ident(name) => (name, true),
                    TokenKind::Str(s) => (s, false),
                    TokenKind::Number(n) => (key_string(Some(&number_value(n))), false),
                    TokenKind::Punct('[') => {
                        let key = self.expression()?;
                        self.expect_punct(']')?;
                        (key_string(key.as_ref()), false)
                    }
                    _ => return Err(self.syntax("expected property key")),
                };
                let value = if self.eat_punct(':') {
                    self.expression()?
                } else if shorthand && (self.at_punct(',') || self.at_punct('}')) {
                    match self.scope.get(&key) {
                        Some(value) => value.clone(),
                        None => return Err(self.runtime(format!("{key} is not defined"))),
                    }
                } else {
                    return Err(self.syntax("methods and accessors are not supported"));
                };
                match value {
                    Some(value) => {
                        map.insert(key, value);
                    }
                    None => {
                        map.shift_remove(&key);
                    }
                }
            }
            if !self.eat_punct(',') {
                self.expect_punct('}')?;
                break;
            }
        }
        Ok(Value::Object(js_key_order(map)))
    }

    fn array(&mut self) -> Result<Value, ExtractionError> {
        let mut items = Vec::new();
        loop {
            if self.eat_punct(']') {
                break;
            }
            if self.at_punct(',') {
                // Elision.
                self.advance();
                items.push(Value::Null);
                continue;
            }
            if matches!(self.peek(), TokenKind::Spread) {
                self.advance();
                match self.expression()? {
                    Some(Value::Array(other)) => items.extend(other),
                    Some(Value::String(s)) => items.extend(s.chars().map(|c| Value::String(c.to_string()))),
                    _ => return Err(self.runtime("spread of a non-iterable value")),
                }
            } else {
                items.push(self.expression()?.unwrap_or(Value::Null));
            }
            if !self.eat_punct(',') {
                self.expect_punct(']')?;
                break;
            }
        }
        Ok(Value::Array(items))
    }

    fn template(&mut self, template: Template) -> Result<String, ExtractionError> {
        let mut out = String::new();
        let mut quasis = template.quasis.into_iter();
        if let Some(first) = quasis.next() {
            out.push_str(&first);
        }
        for ((offset, source), quasi) in template.exprs.into_iter().zip(quasis) {
            let mut nested = Interpreter::new(&self.path, &source, offset, self.scope.clone())?;
            let value = nested.expression()?;
            if !matches!(nested.peek(), TokenKind::Eof) {
                return Err(nested.syntax("unexpected token in template substitution"));
            }
            out.push_str(&display_js(value.as_ref()));
            out.push_str(&quasi);
        }
        Ok(out)
    }
}

/// JSON number for a JS number: integral values within the safe range are
/// integers, non-finite values are `null`.
fn number_value(n: f64) -> Value {
    if n.is_finite() && n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
        Value::from(n as i64)
    } else {
        Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
    }
}

fn negate(n: &Number) -> Value {
    match n.as_i64() {
        Some(i) => Value::from(-i),
        None => number_value(-n.as_f64().unwrap_or(f64::NAN)),
    }
}

/// Property key for a computed or numeric key.
fn key_string(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        other => display_js(other),
    }
}

/// String conversion as in template literals.
fn display_js(value: Option<&Value>) -> String {
    match value {
        None => "undefined".to_string(),
        Some(Value::Null) => "null".to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Number(n)) => match n.as_i64() {
            Some(i) => i.to_string(),
            None => n.as_f64().map(|f| f.to_string()).unwrap_or_default(),
        },
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| match v {
                Value::Null => String::new(),
                other => display_js(Some(other)),
            })
            .collect::<Vec<_>>()
            .join(","),
        Some(Value::Object(_)) => "[object Object]".to_string(),
    }
}

/// Objects list integer-like keys first, ascending, then the rest in
/// insertion order.
fn js_key_order(map: Map<String, Value>) -> Map<String, Value> {
    let is_index = |k: &str| {
        k.parse::<u32>()
            .is_ok_and(|i| i != u32::MAX && i.to_string() == k)
    };
    if !map.keys().any(|k| is_index(k)) {
        return map;
    }
    let (mut indexed, named): (Vec<_>, Vec<_>) = map.into_iter().partition(|(k, _)| is_index(k));
    indexed.sort_by_key(|(k, _)| k.parse::<u32>().unwrap_or(u32::MAX));
    indexed.into_iter().chain(named).collect()
}
