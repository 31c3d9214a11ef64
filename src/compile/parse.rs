use std::mem;

use crate::compile::lex::{self, Token};
use crate::compile::markup;
use crate::tags::{TagKind, TagParser, TagRegistry};
use crate::types::ast::{CustomNode, Expr, Node};
use crate::types::span::Span;
use crate::{Error, Result};

/// The head of a tag: its name and the markup that follows the name.
#[derive(Debug, Clone)]
pub struct TagHead {
    pub name: String,
    pub markup: Span,
    pub span: Span,
}

/// A parser that builds the node tree of a template.
///
/// Parsing is recursive descent driven by the tags themselves: the parser
/// looks up each tag in the [`TagRegistry`] and hands over the shared token
/// cursor, and a block tag consumes its own body through
/// [`parse_body`][Parser::parse_body] up to its closing tag.
pub struct Parser<'a> {
    /// The preprocessed template source.
    source: &'a str,

    /// A cursor over the tokens.
    tokens: TokenStream,

    registry: &'a TagRegistry,

    /// Whether any parsed tag renders another template.
    has_includes: bool,
}

struct TokenStream {
    tokens: Vec<Token>,
    pos: usize,
}

impl<'a> Parser<'a> {
    /// Construct a new parser.
    pub fn new(source: &'a str, registry: &'a TagRegistry) -> Result<Self> {
        Ok(Self {
            source,
            tokens: TokenStream::new(lex::tokenize(source)?),
            registry,
            has_includes: false,
        })
    }

    /// Parses the whole template, returning its nodes and whether it includes
    /// other templates.
    pub fn parse_document(mut self) -> Result<(Vec<Node>, bool)> {
        let (nodes, _) = self.parse_nodes(None, &[])?;
        Ok((nodes, self.has_includes))
    }

    /// Parses the body of the block tag `open` up to the first tag named in
    /// `delims`, returning the body and the tag that ended it.
    ///
    /// `delims` holds the closing tag and any intermediate tags the block
    /// understands, e.g. `["endif", "elsif", "else"]`. Any other tag is
    /// parsed as a nested tag.
    pub fn parse_body(&mut self, open: &TagHead, delims: &[&str]) -> Result<(Vec<Node>, TagHead)> {
        let (nodes, close) = self.parse_nodes(Some(open), delims)?;
        let close = close.ok_or_else(|| self.err_never_closed(open))?;
        Ok((nodes, close))
    }

    fn parse_nodes(
        &mut self,
        open: Option<&TagHead>,
        delims: &[&str],
    ) -> Result<(Vec<Node>, Option<TagHead>)> {
        let source = self.source;
        let mut nodes = Vec::new();

        while let Some(token) = self.tokens.next() {
            match token {
                Token::Raw(span) => nodes.push(Node::Raw(span)),

                Token::Output { markup, .. } => {
                    if let Some(expr) = self.parse_output(markup)? {
                        nodes.push(Node::Output(expr));
                    }
                }

                Token::Tag { name, markup, span } => {
                    let head = TagHead {
                        name: source[name].to_owned(),
                        markup,
                        span,
                    };
                    if delims.contains(&head.name.as_str()) {
                        return Ok((nodes, Some(head)));
                    }
                    if let Some(node) = self.parse_tag(head)? {
                        nodes.push(node);
                    }
                }

                Token::EndTag { name, span } => {
                    let name = &source[name];
                    if !delims.contains(&name) {
                        return Err(self.err(format!("unexpected tag '{name}'"), span));
                    }
                    let head = TagHead {
                        name: name.to_owned(),
                        markup: Span::from(span.n..span.n),
                        span,
                    };
                    return Ok((nodes, Some(head)));
                }
            }
        }

        match open {
            Some(open) => Err(self.err_never_closed(open)),
            None => Ok((nodes, None)),
        }
    }

    fn parse_output(&self, markup: Span) -> Result<Option<Expr>> {
        if markup.is_empty() {
            return Ok(None);
        }
        let mut parser = markup::Parser::new(self.source, markup)?;
        let expr = parser.parse_expr()?;
        parser.finish()?;
        Ok(Some(expr))
    }

    fn parse_tag(&mut self, head: TagHead) -> Result<Option<Node>> {
        let registry = self.registry;
        match registry.get(&head.name) {
            Some(TagKind::Builtin(parse)) => parse(self, head),
            Some(TagKind::Custom(factory)) => {
                let name = head.name.clone();
                let span = head.span;
                let tag = factory.parse(&mut TagParser::new(self, head))?;
                Ok(Some(Node::Custom(CustomNode { name, tag, span })))
            }
            None => Err(self.err(format!("unknown tag '{}'", head.name), head.span)),
        }
    }

    /// Parses the lines of a `{% liquid %}` tag with the same tag registry.
    pub fn parse_lines(&mut self, head: &TagHead) -> Result<Vec<Node>> {
        let tokens = lex::tokenize_lines(self.source, head.markup)?;
        let outer = mem::replace(&mut self.tokens, TokenStream::new(tokens));
        let result = self.parse_nodes(None, &[]);
        self.tokens = outer;
        Ok(result?.0)
    }

    /// Returns a parser over the markup of the given tag.
    pub fn markup(&self, head: &TagHead) -> Result<markup::Parser<'a>> {
        markup::Parser::new(self.source, head.markup)
    }

    /// Records that the template renders another template.
    pub fn mark_includes(&mut self) {
        self.has_includes = true;
    }

    pub fn source(&self) -> &'a str {
        self.source
    }

    pub fn err(&self, msg: impl Into<String>, span: impl Into<Span>) -> Error {
        Error::syntax(msg, self.source, span)
    }

    fn err_never_closed(&self, open: &TagHead) -> Error {
        self.err(format!("tag '{}' was never closed", open.name), open.span)
    }
}

impl TokenStream {
    fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).copied();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }
}
