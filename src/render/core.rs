use std::fmt::Write;

use crate::tags::TagRender;
use crate::types::ast::Node;
use crate::{Context, Engine, Map, Result};

/// Interprets the nodes of one template source.
///
/// A renderer is cheap to copy, a new one is created for every nested
/// template since spans always refer to the source they were parsed from.
#[derive(Clone, Copy)]
pub struct Renderer<'a> {
    pub(crate) engine: &'a Engine,
    pub(crate) source: &'a str,
}

/// How control leaves a sequence of nodes.
///
/// `Break` and `Continue` unwind to the nearest enclosing `for` loop, which
/// consumes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Normal,
    Break,
    Continue,
}

impl<'a> Renderer<'a> {
    pub(crate) fn new(engine: &'a Engine, source: &'a str) -> Self {
        Self { engine, source }
    }

    pub(crate) fn render_nodes(
        &self,
        nodes: &[Node],
        ctx: &mut Context,
        out: &mut String,
    ) -> Result<Flow> {
        for node in nodes {
            let flow = self.render_node(node, ctx, out)?;
            if flow != Flow::Normal {
                return Ok(flow);
            }
        }
        Ok(Flow::Normal)
    }

    fn render_node(&self, node: &Node, ctx: &mut Context, out: &mut String) -> Result<Flow> {
        match node {
            Node::Raw(span) => out.push_str(&self.source[*span]),

            Node::Output(expr) => {
                let value = self.eval_expr(expr, ctx);
                write!(out, "{value}")?;
            }

            Node::Assign { name, value } => {
                let value = self.eval_expr(value, ctx);
                ctx.assign(name.as_str(), value);
            }

            Node::Capture { name, body } => {
                let mut buf = String::new();
                let flow = ctx.scoped(Map::new(), |ctx| self.render_nodes(body, ctx, &mut buf))?;
                ctx.assign(name.as_str(), buf);
                return Ok(flow);
            }

            Node::Counter { name, increment } => {
                let counter = ctx.registers_mut().counters.entry(name.clone()).or_insert(0);
                if *increment {
                    write!(out, "{counter}")?;
                    *counter += 1;
                } else {
                    *counter -= 1;
                    write!(out, "{counter}")?;
                }
            }

            Node::Cond { branches, otherwise } => {
                for branch in branches {
                    if self.eval_cond(&branch.cond, ctx) != branch.negate {
                        return self.render_nodes(&branch.body, ctx, out);
                    }
                }
                if let Some(body) = otherwise {
                    return self.render_nodes(body, ctx, out);
                }
            }

            Node::Case {
                subject,
                whens,
                otherwise,
            } => {
                let subject = self.eval_expr(subject, ctx);
                for when in whens {
                    if when.values.iter().any(|v| self.eval_base(v, ctx) == subject) {
                        return self.render_nodes(&when.body, ctx, out);
                    }
                }
                if let Some(body) = otherwise {
                    return self.render_nodes(body, ctx, out);
                }
            }

            Node::For(for_loop) => return self.render_for(for_loop, ctx, out),

            Node::Break => return Ok(Flow::Break),

            Node::Continue => return Ok(Flow::Continue),

            Node::Cycle { group, key, values } => {
                if values.is_empty() {
                    return Ok(Flow::Normal);
                }
                let key = match group {
                    Some(group) => self.eval_base(group, ctx).to_string(),
                    None => key.clone(),
                };
                let pos = ctx.registers_mut().cycles.entry(key).or_insert(0);
                let i = *pos % values.len();
                *pos = i + 1;
                let value = self.eval_base(&values[i], ctx);
                write!(out, "{value}")?;
            }

            Node::Include(include) => return self.render_include(include, ctx, out),

            Node::Section { name, .. } => {
                let name = self.eval_base(name, ctx).to_string();
                let data = self.section_settings(&name);
                if let Err(err) = self.render_section(&name, &name, data.as_ref(), None, ctx, out) {
                    self.recover(err, out)?;
                }
            }

            Node::Sections { group, .. } => {
                let group = self.eval_base(group, ctx).to_string();
                if let Err(err) = self.render_section_group(&group, ctx, out) {
                    self.recover(err, out)?;
                }
            }

            Node::Wrap { open, close, body } => {
                out.push_str(open);
                let flow = self.render_nodes(body, ctx, out)?;
                out.push_str(close);
                return Ok(flow);
            }

            Node::Block(nodes) => return self.render_nodes(nodes, ctx, out),

            Node::Custom(node) => {
                let depth = ctx.depth();
                let mut r = TagRender {
                    renderer: *self,
                    ctx: &mut *ctx,
                    out: &mut *out,
                    flow: Flow::Normal,
                };
                let result = node.tag.render(&mut r);
                let flow = r.flow;
                // A failing tag may leave scopes behind.
                ctx.truncate(depth);
                result.map_err(|err| err.with_span(self.source, node.span))?;
                return Ok(flow);
            }
        }
        Ok(Flow::Normal)
    }
}
