use std::borrow::Cow;
use std::fmt::Write;

use tracing::warn;

use crate::render::core::{Flow, Renderer};
use crate::render::iter::LoopState;
use crate::types::ast::{Include, IncludeKind};
use crate::types::document::Document;
use crate::{Context, Error, ErrorKind, Map, Mode, Result, Value};

impl Renderer<'_> {
    /// Renders an `include` or `render` tag.
    ///
    /// A missing template does not abort the render, see
    /// [`recover`][Renderer::recover].
    pub(crate) fn render_include(
        &self,
        include: &Include,
        ctx: &mut Context,
        out: &mut String,
    ) -> Result<Flow> {
        let name = self.eval_base(&include.name, ctx).to_string();
        match self.try_include(include, &name, ctx, out) {
            Ok(flow) => Ok(flow),
            Err(err) => {
                self.recover(err, out)?;
                Ok(Flow::Normal)
            }
        }
    }

    /// Handles an error raised by a nested template.
    ///
    /// Missing resources are logged and replaced by an HTML comment in
    /// development mode, or by nothing in production mode. Any other error is
    /// returned.
    pub(crate) fn recover(&self, err: Error, out: &mut String) -> Result<()> {
        if err.kind() != ErrorKind::MissingResource {
            return Err(err);
        }
        warn!(error = %err, "failed to render nested template");
        if self.engine.mode == Mode::Development {
            write!(out, "<!-- Liquid error: {} -->", comment_safe(err.message()))?;
        }
        Ok(())
    }

    fn try_include(
        &self,
        include: &Include,
        name: &str,
        ctx: &mut Context,
        out: &mut String,
    ) -> Result<Flow> {
        let document = self.engine.resolve(name, include.kind)?;

        // Evaluate the bindings in the caller's scope.
        let with = include.with.as_ref().map(|w| self.eval_base(w, ctx));
        let args: Map<String, Value> = include
            .args
            .iter()
            .map(|(k, v)| (k.clone(), self.eval_base(v, ctx)))
            .collect();
        let alias = match &include.alias {
            Some(alias) => alias.as_str(),
            None => basename(name),
        };

        self.enter(name, ctx)
            .map_err(|err| err.with_span(self.source, include.span))?;
        let child = Renderer::new(self.engine, document.source());
        let bind = Binding {
            document: &document,
            alias,
            with,
            iterate: include.iterate,
            kind: include.kind,
        };
        let result = match include.kind {
            IncludeKind::Include => ctx.scoped(args, |ctx| child.render_bound(&bind, ctx, out)),
            IncludeKind::Render => ctx
                .isolated(args, |ctx| child.render_bound(&bind, ctx, out))
                .map(|_| Flow::Normal),
        };
        ctx.registers_mut().includes.pop();
        result.map_err(|err| err.with_template_name(name))
    }

    /// Records that the named template is being rendered, failing on a cycle
    /// or when nesting too deep.
    pub(crate) fn enter(&self, name: &str, ctx: &mut Context) -> Result<()> {
        let stack = &ctx.registers().includes;
        if stack.iter().any(|n| n == name) {
            return Err(Error::structural(format!("cyclic include of '{name}'")));
        }
        let max = self.engine.max_include_depth;
        if stack.len() >= max {
            return Err(Error::structural(format!(
                "reached the max include depth ({max})"
            )));
        }
        ctx.registers_mut().includes.push(name.to_owned());
        Ok(())
    }

    fn render_bound(&self, bind: &Binding<'_>, ctx: &mut Context, out: &mut String) -> Result<Flow> {
        let nodes = &bind.document.nodes;
        match &bind.with {
            Some(Value::List(items)) if bind.iterate => {
                let name = format!("{}-{}", bind.alias, bind.document.hash());
                for (index0, item) in items.iter().enumerate() {
                    ctx.set(bind.alias, item.clone());
                    if bind.kind == IncludeKind::Render {
                        let state = LoopState {
                            name: &name,
                            index0,
                            length: items.len(),
                        };
                        ctx.set("forloop", state.to_value(&Value::None));
                    }
                    if self.render_nodes(nodes, ctx, out)? == Flow::Break
                        && bind.kind == IncludeKind::Include
                    {
                        return Ok(Flow::Break);
                    }
                }
                Ok(Flow::Normal)
            }
            Some(value) => {
                ctx.set(bind.alias, value.clone());
                self.render_nodes(nodes, ctx, out)
            }
            None => self.render_nodes(nodes, ctx, out),
        }
    }
}

struct Binding<'a> {
    document: &'a Document,
    alias: &'a str,
    with: Option<Value>,
    iterate: bool,
    kind: IncludeKind,
}

/// The default variable name for a `with`/`for` value, e.g. `card` for
/// `product/card`.
fn basename(name: &str) -> &str {
    let name = name.rsplit('/').next().unwrap_or(name);
    name.strip_suffix(".liquid").unwrap_or(name)
}

/// Separates consecutive dashes so the text cannot close an HTML comment.
fn comment_safe(msg: &str) -> Cow<'_, str> {
    if !msg.contains("--") {
        return Cow::Borrowed(msg);
    }
    let mut out = String::with_capacity(msg.len() + 4);
    let mut dash = false;
    for c in msg.chars() {
        if c == '-' && dash {
            out.push(' ');
        }
        dash = c == '-';
        out.push(c);
    }
    Cow::Owned(out)
}
