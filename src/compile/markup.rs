//! Parses the markup inside a tag, e.g. the `user.name | upcase` in
//! `{{ user.name | upcase }}`.

use std::fmt;

use crate::types::ast::{BaseExpr, Comparison, Condition, Expr, FilterCall, Member, Op, Var};
use crate::types::span::Span;
use crate::{Error, Result, Value};

/// A token within tag markup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tk {
    /// An identifier or keyword, e.g. `product`, `and`, `contains`
    Ident,
    /// A single or double quoted string.
    String,
    /// An integer or float literal, e.g. `-3`, `1.5`
    Number,
    /// `.`
    Dot,
    /// `..`
    DotDot,
    /// `|`
    Pipe,
    /// `:`
    Colon,
    /// `,`
    Comma,
    /// `=`
    Equals,
    /// A comparison operator, e.g. `==`, `<>`, `>=`
    Cmp,
    /// `[`
    LBracket,
    /// `]`
    RBracket,
    /// `(`
    LParen,
    /// `)`
    RParen,
}

/// A parser over the markup of a single tag.
pub struct Parser<'a> {
    source: &'a str,
    tokens: Vec<(Tk, Span)>,
    pos: usize,
    /// The span of the whole markup.
    span: Span,
}

impl<'a> Parser<'a> {
    /// Tokenizes the markup in `source[span]`.
    pub fn new(source: &'a str, span: Span) -> Result<Self> {
        Ok(Self {
            source,
            tokens: tokenize(source, span)?,
            pos: 0,
            span,
        })
    }

    /// Parses an expression with any filters, e.g. `a.b | append: "c"`.
    pub fn parse_expr(&mut self) -> Result<Expr> {
        let start = self.pos;
        let base = self.parse_base()?;
        let mut filters = Vec::new();
        while self.eat(Tk::Pipe) {
            filters.push(self.parse_filter()?);
        }
        Ok(Expr {
            base,
            filters,
            span: self.span_from(start),
        })
    }

    fn parse_filter(&mut self) -> Result<FilterCall> {
        let start = self.pos;
        let (name, _) = self.parse_ident()?;
        let mut args = Vec::new();
        let mut kwargs = Vec::new();
        if self.eat(Tk::Colon) {
            loop {
                if self.is_next_pair(Tk::Ident, Tk::Colon) {
                    let (key, _) = self.parse_ident()?;
                    self.expect(Tk::Colon)?;
                    kwargs.push((key, self.parse_base()?));
                } else {
                    args.push(self.parse_base()?);
                }
                if !self.eat(Tk::Comma) {
                    break;
                }
            }
        }
        Ok(FilterCall {
            name,
            args,
            kwargs,
            span: self.span_from(start),
        })
    }

    /// Parses a value without filters: a literal, a variable path or a range.
    pub fn parse_base(&mut self) -> Result<BaseExpr> {
        let source = self.source;
        let (tk, span) = self.parse("expression")?;
        match tk {
            Tk::String => Ok(BaseExpr::Literal(Value::String(self.string(span)))),
            Tk::Number => self.parse_number(span).map(BaseExpr::Literal),
            Tk::LParen => {
                let start = self.parse_base()?;
                self.expect(Tk::DotDot)?;
                let end = self.parse_base()?;
                self.expect(Tk::RParen)?;
                Ok(BaseExpr::Range(Box::new(start), Box::new(end)))
            }
            Tk::LBracket => {
                let index = self.parse_base()?;
                let end = self.expect(Tk::RBracket)?;
                self.parse_var(Member::Index(index), span.combine(end))
            }
            Tk::Ident => match &source[span] {
                "true" => Ok(BaseExpr::Literal(Value::Bool(true))),
                "false" => Ok(BaseExpr::Literal(Value::Bool(false))),
                "nil" | "null" => Ok(BaseExpr::Literal(Value::None)),
                "empty" => Ok(BaseExpr::Empty),
                "blank" => Ok(BaseExpr::Blank),
                name => self.parse_var(Member::Key(name.to_owned()), span),
            },
            tk => Err(self.err_unexpected_token("expression", tk, span)),
        }
    }

    fn parse_var(&mut self, first: Member, mut span: Span) -> Result<BaseExpr> {
        let mut path = vec![first];
        loop {
            if self.eat(Tk::Dot) {
                let (tk, sp) = self.parse("identifier")?;
                let member = match tk {
                    Tk::Ident => Member::Key(self.source[sp].to_owned()),
                    Tk::Number => Member::Index(BaseExpr::Literal(self.parse_number(sp)?)),
                    tk => return Err(self.err_unexpected_token("identifier", tk, sp)),
                };
                path.push(member);
                span = span.combine(sp);
            } else if self.eat(Tk::LBracket) {
                let index = self.parse_base()?;
                let end = self.expect(Tk::RBracket)?;
                path.push(Member::Index(index));
                span = span.combine(end);
            } else {
                break;
            }
        }
        Ok(BaseExpr::Var(Var { path, span }))
    }

    /// Parses a condition, e.g. `a == 1 or b contains "x"`.
    ///
    /// `and` and `or` have equal precedence and group from left to right.
    pub fn parse_condition(&mut self) -> Result<Condition> {
        let mut cond = Condition::Test(self.parse_comparison()?);
        loop {
            if self.eat_word("and") {
                let rhs = Condition::Test(self.parse_comparison()?);
                cond = Condition::And(Box::new(cond), Box::new(rhs));
            } else if self.eat_word("or") {
                let rhs = Condition::Test(self.parse_comparison()?);
                cond = Condition::Or(Box::new(cond), Box::new(rhs));
            } else {
                return Ok(cond);
            }
        }
    }

    fn parse_comparison(&mut self) -> Result<Comparison> {
        let lhs = self.parse_base()?;
        let op = match self.peek() {
            Some((Tk::Cmp, span)) => {
                self.pos += 1;
                Op::from_str(&self.source[span])
                    .ok_or_else(|| self.err_unexpected_token("operator", Tk::Cmp, span))?
            }
            Some((Tk::Ident, span)) if &self.source[span] == "contains" => {
                self.pos += 1;
                Op::Contains
            }
            _ => return Ok(Comparison { lhs, rhs: None }),
        };
        let rhs = self.parse_base()?;
        Ok(Comparison {
            lhs,
            rhs: Some((op, rhs)),
        })
    }

    /// Parses comma separated `key: value` pairs until the end of the markup.
    pub fn parse_kwargs(&mut self) -> Result<Vec<(String, BaseExpr)>> {
        let mut kwargs = Vec::new();
        loop {
            self.eat(Tk::Comma);
            if self.is_eof() {
                return Ok(kwargs);
            }
            let (key, _) = self.parse_ident()?;
            self.expect(Tk::Colon)?;
            kwargs.push((key, self.parse_base()?));
        }
    }

    fn parse_number(&self, span: Span) -> Result<Value> {
        let raw = &self.source[span];
        if !raw.contains('.') {
            if let Ok(i) = raw.parse::<i64>() {
                return Ok(Value::Integer(i));
            }
        }
        raw.parse::<f64>()
            .map(Value::Float)
            .map_err(|_| Error::syntax("invalid number", self.source, span))
    }

    pub fn parse_ident(&mut self) -> Result<(String, Span)> {
        match self.parse("identifier")? {
            (Tk::Ident, span) => Ok((self.source[span].to_owned(), span)),
            (tk, span) => Err(self.err_unexpected_token("identifier", tk, span)),
        }
    }

    /// Parses an identifier or a quoted string, e.g. the name of a capture.
    pub fn parse_name(&mut self) -> Result<(String, Span)> {
        match self.parse("name")? {
            (Tk::Ident, span) => Ok((self.source[span].to_owned(), span)),
            (Tk::String, span) => Ok((self.string(span), span)),
            (tk, span) => Err(self.err_unexpected_token("name", tk, span)),
        }
    }

    /// Fails unless all tokens have been consumed.
    pub fn finish(&self) -> Result<()> {
        match self.peek() {
            None => Ok(()),
            Some((tk, span)) => Err(self.err_unexpected_token("end of tag", tk, span)),
        }
    }

    pub fn expect(&mut self, exp: Tk) -> Result<Span> {
        match self.parse(exp)? {
            (tk, span) if tk == exp => Ok(span),
            (tk, span) => Err(self.err_unexpected_token(exp, tk, span)),
        }
    }

    pub fn expect_word(&mut self, word: &str) -> Result<Span> {
        let exp = format!("`{word}`");
        match self.parse(&exp)? {
            (Tk::Ident, span) if &self.source[span] == word => Ok(span),
            (tk, span) => Err(self.err_unexpected_token(exp, tk, span)),
        }
    }

    /// Consumes the next token if it is `tk`.
    pub fn eat(&mut self, tk: Tk) -> bool {
        let is_next = self.is_next(tk);
        if is_next {
            self.pos += 1;
        }
        is_next
    }

    /// Consumes the next token if it is the keyword `word`.
    pub fn eat_word(&mut self, word: &str) -> bool {
        let is_next = self.is_next_word(word);
        if is_next {
            self.pos += 1;
        }
        is_next
    }

    pub fn is_next(&self, tk: Tk) -> bool {
        matches!(self.peek(), Some((t, _)) if t == tk)
    }

    pub fn is_next_word(&self, word: &str) -> bool {
        matches!(self.peek(), Some((Tk::Ident, span)) if &self.source[span] == word)
    }

    /// Whether the next two tokens are `a` followed by `b`.
    pub fn is_next_pair(&self, a: Tk, b: Tk) -> bool {
        matches!(
            (self.tokens.get(self.pos), self.tokens.get(self.pos + 1)),
            (Some((x, _)), Some((y, _))) if *x == a && *y == b
        )
    }

    pub fn is_eof(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    pub fn peek(&self) -> Option<(Tk, Span)> {
        self.tokens.get(self.pos).copied()
    }

    /// Returns the index of the next token.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Returns the source span covered by the tokens consumed since `start`.
    pub fn span_from(&self, start: usize) -> Span {
        match (self.tokens.get(start), self.pos.checked_sub(1).and_then(|i| self.tokens.get(i))) {
            (Some((_, m)), Some((_, n))) if start < self.pos => m.combine(*n),
            _ => Span::from(self.span.n..self.span.n),
        }
    }

    fn parse(&mut self, exp: impl fmt::Display) -> Result<(Tk, Span)> {
        match self.peek() {
            Some(next) => {
                self.pos += 1;
                Ok(next)
            }
            None => Err(self.err_unexpected_eof(exp)),
        }
    }

    fn string(&self, span: Span) -> String {
        self.source[span.m + 1..span.n - 1].to_owned()
    }

    fn err_unexpected_eof(&self, exp: impl fmt::Display) -> Error {
        let msg = format!("expected {exp}, found end of tag");
        Error::syntax(msg, self.source, self.span.n..self.span.n)
    }

    fn err_unexpected_token(&self, exp: impl fmt::Display, got: Tk, span: Span) -> Error {
        let msg = format!("expected {exp}, found {got}");
        Error::syntax(msg, self.source, span)
    }
}

impl Tk {
    const fn human(&self) -> &'static str {
        match self {
            Tk::Ident => "identifier",
            Tk::String => "string",
            Tk::Number => "number",
            Tk::Dot => "`.`",
            Tk::DotDot => "`..`",
            Tk::Pipe => "`|`",
            Tk::Colon => "`:`",
            Tk::Comma => "`,`",
            Tk::Equals => "`=`",
            Tk::Cmp => "operator",
            Tk::LBracket => "`[`",
            Tk::RBracket => "`]`",
            Tk::LParen => "`(`",
            Tk::RParen => "`)`",
        }
    }
}

impl fmt::Display for Tk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.human())
    }
}

fn tokenize(source: &str, span: Span) -> Result<Vec<(Tk, Span)>> {
    let mut tokens = Vec::new();
    let mut i = span.m;

    while let Some(c) = source[i..span.n].chars().next() {
        let rest = &source[i..span.n];
        let next = rest[c.len_utf8()..].chars().next();

        let (tk, len) = match (c, next) {
            (c, _) if c.is_whitespace() => {
                i += c.len_utf8();
                continue;
            }
            ('.', Some('.')) => (Tk::DotDot, 2),
            ('.', _) => (Tk::Dot, 1),
            ('|', _) => (Tk::Pipe, 1),
            (':', _) => (Tk::Colon, 1),
            (',', _) => (Tk::Comma, 1),
            ('[', _) => (Tk::LBracket, 1),
            (']', _) => (Tk::RBracket, 1),
            ('(', _) => (Tk::LParen, 1),
            (')', _) => (Tk::RParen, 1),
            ('=', Some('=')) | ('!', Some('=')) | ('<', Some('=' | '>')) | ('>', Some('=')) => {
                (Tk::Cmp, 2)
            }
            ('<' | '>', _) => (Tk::Cmp, 1),
            ('=', _) => (Tk::Equals, 1),
            ('"' | '\'', _) => match rest[1..].find(c) {
                Some(n) => (Tk::String, n + 2),
                None => {
                    return Err(Error::syntax("unclosed string", source, i..span.n));
                }
            },
            ('-', Some(d)) if d.is_ascii_digit() => (Tk::Number, 1 + number_len(&rest[1..])),
            (d, _) if d.is_ascii_digit() => (Tk::Number, number_len(rest)),
            (c, _) if is_ident_start(c) => (Tk::Ident, ident_len(rest)),
            (c, _) => {
                let msg = format!("unexpected character `{c}`");
                return Err(Error::syntax(msg, source, i..i + c.len_utf8()));
            }
        };

        tokens.push((tk, Span::from(i..i + len)));
        i += len;
    }

    Ok(tokens)
}

fn number_len(s: &str) -> usize {
    let digits = |s: &str| s.bytes().take_while(u8::is_ascii_digit).count();
    let int = digits(s);
    match s[int..].strip_prefix('.') {
        Some(frac) if frac.starts_with(|c: char| c.is_ascii_digit()) => int + 1 + digits(frac),
        _ => int,
    }
}

fn ident_len(s: &str) -> usize {
    let len = s
        .char_indices()
        .find(|&(_, c)| !(is_ident_continue(c) || c == '-'))
        .map_or(s.len(), |(i, _)| i);
    if s[len..].starts_with('?') {
        len + 1
    } else {
        len
    }
}

#[cfg(feature = "unicode")]
fn is_ident_start(c: char) -> bool {
    c == '_' || unicode_ident::is_xid_start(c)
}

#[cfg(feature = "unicode")]
fn is_ident_continue(c: char) -> bool {
    unicode_ident::is_xid_continue(c)
}

#[cfg(not(feature = "unicode"))]
fn is_ident_start(c: char) -> bool {
    c == '_' || c.is_ascii_alphabetic()
}

#[cfg(not(feature = "unicode"))]
fn is_ident_continue(c: char) -> bool {
    c == '_' || c.is_ascii_alphanumeric()
}
