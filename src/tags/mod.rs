//! Tags and the registry that maps tag names to their parsers.
//!
//! Every tag, builtin or custom, is looked up by name in a [`TagRegistry`]
//! owned by the [`Engine`][crate::Engine]. Custom tags implement
//! [`TagFactory`] to parse their markup and optional body, and [`Tag`] to
//! render.

mod control;
mod include;
mod misc;

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::compile::{self, Parser, TagHead, Tk};
use crate::render::{Flow, Renderer};
use crate::types::ast::{Expr, Node};
use crate::{Context, Error, Result, Value};

pub(crate) type ParseFn = fn(&mut Parser<'_>, TagHead) -> Result<Option<Node>>;

#[derive(Clone)]
pub(crate) enum TagKind {
    Builtin(ParseFn),
    Custom(Arc<dyn TagFactory>),
}

/// Maps tag names to the code that parses them.
///
/// Intermediate tags such as `else`, `elsif` and `when` are not registered;
/// they are recognized by the block tag that is currently open.
#[derive(Clone)]
pub struct TagRegistry {
    tags: HashMap<String, TagKind>,
    /// Process-unique ids of the registered custom tags.
    stamps: HashMap<String, u64>,
    fingerprint: String,
}

static NEXT_STAMP: AtomicU64 = AtomicU64::new(1);

/// Parses a custom tag.
///
/// This trait is also implemented for closures with the same signature as
/// [`TagFactory::parse`].
///
/// ```
/// use liquet::{Body, Engine, Tag, TagFactory, TagParser, TagRender};
///
/// struct Shout(Body);
///
/// impl Tag for Shout {
///     fn render(&self, r: &mut TagRender<'_>) -> liquet::Result<()> {
///         let s = r.render_body_to_string(&self.0)?;
///         r.write_str(&s.to_uppercase());
///         Ok(())
///     }
/// }
///
/// struct ShoutFactory;
///
/// impl TagFactory for ShoutFactory {
///     fn parse(&self, t: &mut TagParser<'_, '_>) -> liquet::Result<Box<dyn Tag>> {
///         Ok(Box::new(Shout(t.body()?)))
///     }
/// }
///
/// let mut engine = Engine::new();
/// engine.add_tag("shout", ShoutFactory);
/// let result = engine.compile("{% shout %}hi {{ name }}{% endshout %}")?
///     .render(serde_json::json!({ "name": "there" }))?;
/// assert_eq!(result, "HI THERE");
/// # Ok::<(), liquet::Error>(())
/// ```
pub trait TagFactory: Send + Sync {
    fn parse(&self, tag: &mut TagParser<'_, '_>) -> Result<Box<dyn Tag>>;
}

/// A parsed custom tag.
pub trait Tag: Send + Sync {
    fn render(&self, r: &mut TagRender<'_>) -> Result<()>;
}

/// Gives a [`TagFactory`] access to the tag markup and the token stream.
pub struct TagParser<'p, 'a> {
    parser: &'p mut Parser<'a>,
    head: TagHead,
}

/// A compiled expression, e.g. `product.title | upcase`.
#[derive(Debug, Clone)]
pub struct Expression(Expr);

/// The parsed body of a custom block tag.
#[derive(Debug)]
pub struct Body(Vec<Node>);

/// Gives a [`Tag`] access to the render context and the output.
pub struct TagRender<'a> {
    pub(crate) renderer: Renderer<'a>,
    pub(crate) ctx: &'a mut Context,
    pub(crate) out: &'a mut String,
    pub(crate) flow: Flow,
}

impl Default for TagRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TagRegistry {
    /// Returns a registry containing all builtin tags.
    pub fn new() -> Self {
        let builtins: [(&str, ParseFn); 22] = [
            ("assign", misc::parse_assign),
            ("capture", misc::parse_capture),
            ("increment", misc::parse_counter),
            ("decrement", misc::parse_counter),
            ("cycle", misc::parse_cycle),
            ("echo", misc::parse_echo),
            ("raw", misc::parse_raw),
            ("liquid", misc::parse_liquid),
            ("schema", misc::parse_schema),
            ("stylesheet", misc::parse_wrapped),
            ("javascript", misc::parse_wrapped),
            ("style", misc::parse_wrapped),
            ("if", control::parse_if),
            ("unless", control::parse_unless),
            ("case", control::parse_case),
            ("for", control::parse_for),
            ("break", control::parse_break),
            ("continue", control::parse_continue),
            ("include", include::parse_include),
            ("render", include::parse_render),
            ("section", include::parse_section),
            ("sections", include::parse_sections),
        ];
        let tags = builtins
            .into_iter()
            .map(|(name, f)| (name.to_owned(), TagKind::Builtin(f)))
            .collect();
        Self::with_tags(tags)
    }

    /// Returns a registry without any tags.
    pub fn empty() -> Self {
        Self::with_tags(HashMap::new())
    }

    fn with_tags(tags: HashMap<String, TagKind>) -> Self {
        let mut registry = Self {
            tags,
            stamps: HashMap::new(),
            fingerprint: String::new(),
        };
        registry.refresh();
        registry
    }

    /// Registers a custom tag, replacing any tag with the same name.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: TagFactory + 'static,
    {
        let name = name.into();
        let stamp = NEXT_STAMP.fetch_add(1, Ordering::Relaxed);
        self.stamps.insert(name.clone(), stamp);
        self.tags.insert(name, TagKind::Custom(Arc::new(factory)));
        self.refresh();
    }

    /// Removes a tag, returning whether it was registered.
    pub fn remove(&mut self, name: &str) -> bool {
        self.stamps.remove(name);
        let removed = self.tags.remove(name).is_some();
        self.refresh();
        removed
    }

    /// Identifies the set of registered tags.
    ///
    /// Two registries with the same builtin tags and the same custom tag
    /// registrations share a fingerprint. Documents parsed with one registry
    /// are only reused for another with the same fingerprint.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    fn refresh(&mut self) {
        let mut names: Vec<_> = self.tags.keys().collect();
        names.sort();
        let mut text = String::new();
        for name in names {
            text.push_str(name);
            if let Some(stamp) = self.stamps.get(name) {
                text.push('#');
                text.push_str(&stamp.to_string());
            }
            text.push(';');
        }
        self.fingerprint = compile::hash(&text)[..16].to_owned();
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tags.contains_key(name)
    }

    pub(crate) fn get(&self, name: &str) -> Option<&TagKind> {
        self.tags.get(name)
    }
}

impl fmt::Debug for TagRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.tags.keys().collect();
        names.sort();
        f.debug_struct("TagRegistry").field("tags", &names).finish()
    }
}

impl<F> TagFactory for F
where
    F: Fn(&mut TagParser<'_, '_>) -> Result<Box<dyn Tag>> + Send + Sync,
{
    fn parse(&self, tag: &mut TagParser<'_, '_>) -> Result<Box<dyn Tag>> {
        self(tag)
    }
}

impl<'p, 'a> TagParser<'p, 'a> {
    pub(crate) fn new(parser: &'p mut Parser<'a>, head: TagHead) -> Self {
        Self { parser, head }
    }

    /// The name of the tag.
    pub fn name(&self) -> &str {
        &self.head.name
    }

    /// The markup following the tag name.
    pub fn markup(&self) -> &str {
        &self.parser.source()[self.head.markup]
    }

    /// Parses the whole markup as an expression.
    pub fn expression(&self) -> Result<Expression> {
        let mut markup = self.parser.markup(&self.head)?;
        let expr = markup.parse_expr()?;
        markup.finish()?;
        Ok(Expression(expr))
    }

    /// Parses the markup as `name = expression`, the form `assign` uses.
    pub fn assignment(&self) -> Result<(String, Expression)> {
        let mut markup = self.parser.markup(&self.head)?;
        let (name, _) = markup.parse_ident()?;
        markup.expect(Tk::Equals)?;
        let expr = markup.parse_expr()?;
        markup.finish()?;
        Ok((name, Expression(expr)))
    }

    /// Parses the body of the tag up to `{% end<name> %}`.
    pub fn body(&mut self) -> Result<Body> {
        let end = format!("end{}", self.head.name);
        let (nodes, _) = self.parser.parse_body(&self.head, &[end.as_str()])?;
        Ok(Body(nodes))
    }

    /// Returns a syntax error pointing at this tag.
    pub fn error(&self, msg: impl Into<String>) -> Error {
        self.parser.err(msg, self.head.span)
    }
}

impl TagRender<'_> {
    pub fn context(&mut self) -> &mut Context {
        self.ctx
    }

    pub fn write_str(&mut self, s: &str) {
        self.out.push_str(s);
    }

    /// Evaluates an expression against the current context.
    pub fn eval(&self, expr: &Expression) -> Value {
        self.renderer.eval_expr(&expr.0, self.ctx)
    }

    /// Renders a body to the output.
    ///
    /// A `break` or `continue` inside the body is passed on to the enclosing
    /// loop once this tag returns.
    pub fn render_body(&mut self, body: &Body) -> Result<()> {
        if self.flow == Flow::Normal {
            self.flow = self.renderer.render_nodes(&body.0, self.ctx, self.out)?;
        }
        Ok(())
    }

    /// Renders a body to a new string instead of the output.
    ///
    /// Like [`render_body`][Self::render_body], a `break` or `continue`
    /// inside the body is passed on to the enclosing loop.
    pub fn render_body_to_string(&mut self, body: &Body) -> Result<String> {
        let mut buf = String::new();
        if self.flow == Flow::Normal {
            self.flow = self.renderer.render_nodes(&body.0, self.ctx, &mut buf)?;
        }
        Ok(buf)
    }
}
