//! Tokenizer for the data subset understood by the literal runtime.

use crate::escape::unescape_js;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind {
    Ident(String),
    Str(String),
    Number(f64),
    Template(Template),
    /// `...`
    Spread,
    /// `?.`
    OptionalDot,
    Punct(char),
    Eof,
}

/// A template literal split into cooked text and raw substitutions.
///
/// `quasis.len() == exprs.len() + 1`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Template {
    pub quasis: Vec<String>,
    /// Substitution source text with its byte offset in the module body.
    pub exprs: Vec<(usize, String)>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub kind: TokenKind,
    pub offset: usize,
    /// A line terminator separates this token from the previous one.
    pub line_break_before: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LexError {
    pub offset: usize,
    pub message: String,
}

impl LexError {
    fn new(offset: usize, message: impl Into<String>) -> Self {
        Self {
            offset,
            message: message.into(),
        }
    }
}

/// Tokenize `source`; offsets are shifted by `base`.
pub(crate) fn tokenize(source: &str, base: usize) -> Result<Vec<Token>, LexError> {
    let mut lexer = Lexer {
        src: source,
        pos: 0,
        base,
    };
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token()?;
        let done = token.kind == TokenKind::Eof;
        tokens.push(token);
        if done {
            return Ok(tokens);
        }
    }
}

struct Lexer<'a> {
    src: &'a str,
    pos: usize,
    base: usize,
}

impl Lexer<'_> {
    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn peek_at(&self, n: usize) -> Option<char> {
        self.src[self.pos..].chars().nth(n)
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn error(&self, at: usize, message: impl Into<String>) -> LexError {
        LexError::new(self.base + at, message)
    }

    fn skip_trivia(&mut self) -> Result<(), LexError> {
        loop {
            match (self.peek(), self.peek_at(1)) {
                (Some(c), _) if c.is_whitespace() || c == '\u{FEFF}' => {
                    self.bump();
                }
                (Some('/'), Some('/')) => {
                    while let Some(c) = self.peek() {
                        if matches!(c, '\n' | '\r' | '\u{2028}' | '\u{2029}') {
                            break;
                        }
                        self.bump();
                    }
                }
                (Some('/'), Some('*')) => {
                    let start = self.pos;
                    match self.src[self.pos + 2..].find("*/") {
                        Some(end) => self.pos += 2 + end + 2,
                        None => return Err(self.error(start, "unterminated block comment")),
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn next_token(&mut self) -> Result<Token, LexError> {
        let trivia_start = self.pos;
        self.skip_trivia()?;
        let line_break_before =
            self.src[trivia_start..self.pos].contains(['\n', '\r', '\u{2028}', '\u{2029}']);
        let start = self.pos;
        let offset = self.base + start;
        let token = move |kind| Token {
            kind,
            offset,
            line_break_before,
        };

        let Some(ch) = self.peek() else {
            return Ok(token(TokenKind::Eof));
        };

        let kind = if is_ident_start(ch) {
            while self.peek().is_some_and(is_ident_continue) {
                self.bump();
            }
            TokenKind::Ident(self.src[start..self.pos].to_string())
        } else if ch.is_ascii_digit() || (ch == '.' && self.peek_at(1).is_some_and(|c| c.is_ascii_digit())) {
            TokenKind::Number(self.number()?)
        } else if ch == '\'' || ch == '"' {
            TokenKind::Str(self.string(ch)?)
        } else if ch == '`' {
            TokenKind::Template(self.template()?)
        } else if self.src[self.pos..].starts_with("...") {
            self.pos += 3;
            TokenKind::Spread
        } else if ch == '?' && self.peek_at(1) == Some('.') && !self.peek_at(2).is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 2;
            TokenKind::OptionalDot
        } else {
            self.bump();
            TokenKind::Punct(ch)
        };
        Ok(token(kind))
    }

    fn number(&mut self) -> Result<f64, LexError> {
        let start = self.pos;
        let radix = match (self.peek(), self.peek_at(1)) {
            (Some('0'), Some('x' | 'X')) => 16,
            (Some('0'), Some('o' | 'O')) => 8,
            (Some('0'), Some('b' | 'B')) => 2,
            _ => 10,
        };

        if radix != 10 {
            self.pos += 2;
            let digits_start = self.pos;
            while self.peek().is_some_and(|c| c.is_ascii_alphanumeric() || c == '_') {
                self.bump();
            }
            let digits: String = self.src[digits_start..self.pos].chars().filter(|c| *c != '_').collect();
            let value = u64::from_str_radix(&digits, radix)
                .map_err(|_| self.error(start, "malformed numeric literal"))?;
            return Ok(value as f64);
        }

        while self.peek().is_some_and(|c| c.is_ascii_digit() || c == '_') {
            self.bump();
        }
        if self.peek() == Some('.') {
            self.bump();
            while self.peek().is_some_and(|c| c.is_ascii_digit() || c == '_') {
                self.bump();
            }
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            self.bump();
            if matches!(self.peek(), Some('+' | '-')) {
                self.bump();
            }
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.bump();
            }
        }
        if self.peek() == Some('n') {
            return Err(self.error(start, "BigInt literals are not supported"));
        }
        if self.peek().is_some_and(is_ident_start) {
            return Err(self.error(start, "identifier directly after numeric literal"));
        }

        let text: String = self.src[start..self.pos].chars().filter(|c| *c != '_').collect();
        text.parse::<f64>()
            .map_err(|_| self.error(start, "malformed numeric literal"))
    }

    fn string(&mut self, quote: char) -> Result<String, LexError> {
        let start = self.pos;
        self.bump();
        let body_start = self.pos;
        loop {
            match self.bump() {
                Some('\\') => {
                    if self.bump() == Some('\r') && self.peek() == Some('\n') {
                        self.bump();
                    }
                }
                Some(c) if c == quote => break,
                Some('\n' | '\r') | None => {
                    return Err(self.error(start, "unterminated string literal"));
                }
                Some(_) => {}
            }
        }
        let raw = &self.src[body_start..self.pos - 1];
        unescape_js(raw).map_err(|message| self.error(start, message))
    }

    fn template(&mut self) -> Result<Template, LexError> {
        let start = self.pos;
        self.bump();
        let mut quasis = Vec::new();
        let mut exprs = Vec::new();
        let mut chunk_start = self.pos;
        loop {
            match self.peek() {
                None => return Err(self.error(start, "unterminated template literal")),
                Some('\\') => {
                    self.bump();
                    self.bump();
                }
                Some('`') => {
                    quasis.push(self.cook(chunk_start, self.pos, start)?);
                    self.bump();
                    return Ok(Template { quasis, exprs });
                }
                Some('$') if self.peek_at(1) == Some('{') => {
                    quasis.push(self.cook(chunk_start, self.pos, start)?);
                    self.pos += 2;
                    let expr_start = self.pos;
                    self.skip_substitution(start)?;
                    exprs.push((
                        self.base + expr_start,
                        self.src[expr_start..self.pos].to_string(),
                    ));
                    self.bump();
                    chunk_start = self.pos;
                }
                Some(_) => {
                    self.bump();
                }
            }
        }
    }

    /// Advance to the `}` closing a `${` substitution.
    fn skip_substitution(&mut self, template_start: usize) -> Result<(), LexError> {
        let mut depth = 0usize;
        loop {
            match self.peek() {
                None => return Err(self.error(template_start, "unterminated template substitution")),
                Some('}') if depth == 0 => return Ok(()),
                Some('}') => depth -= 1,
                Some('{') => depth += 1,
                Some(q @ ('\'' | '"')) => {
                    self.string(q)?;
                    continue;
                }
                Some('`') => {
                    self.template()?;
                    continue;
                }
                Some(_) => {}
            }
            self.bump();
        }
    }

    fn cook(&self, from: usize, to: usize, template_start: usize) -> Result<String, LexError> {
        let raw = self.src[from..to].replace("\r\n", "\n");
        unescape_js(&raw).map_err(|message| self.error(template_start, message))
    }
}

fn is_ident_start(c: char) -> bool {
    c == '_' || c == '$' || c.is_alphabetic()
}

fn is_ident_continue(c: char) -> bool {
    c == '_' || c == '$' || c.is_alphanumeric() || c == '\u{200C}' || c == '\u{200D}'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source, 0)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_punctuation_and_comments() {
        assert_eq!(
            kinds("{ ...a, // note\n b?.c /* x */ }"),
            vec![
                TokenKind::Punct('{'),
                TokenKind::Spread,
                TokenKind::Ident("a".into()),
                TokenKind::Punct(','),
                TokenKind::Ident("b".into()),
                TokenKind::OptionalDot,
                TokenKind::Ident("c".into()),
                TokenKind::Punct('}'),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_numeric_literals() {
        assert_eq!(
            kinds("10 1.5 .5 1e3 0x1F 1_000"),
            vec![
                TokenKind::Number(10.0),
                TokenKind::Number(1.5),
                TokenKind::Number(0.5),
                TokenKind::Number(1000.0),
                TokenKind::Number(31.0),
                TokenKind::Number(1000.0),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_strings_are_unescaped() {
        assert_eq!(
            kinds(r#"'Pokémon' "a\"b""#),
            vec![
                TokenKind::Str("Pokémon".into()),
                TokenKind::Str("a\"b".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_template_substitutions_are_split() {
        let tokens = tokenize("`${set.id}-${ { a: 1 }.a }!`", 0).unwrap();
        let TokenKind::Template(template) = &tokens[0].kind else {
            panic!("expected template");
        };
        assert_eq!(template.quasis, vec!["", "-", "!"]);
        assert_eq!(template.exprs[0], (3, "set.id".to_string()));
        assert_eq!(template.exprs[1].1, " { a: 1 }.a ");
    }

    #[test]
    fn test_unterminated_string_is_error() {
        let err = tokenize("'abc", 7).unwrap_err();
        assert_eq!(err.offset, 7);
    }
}
