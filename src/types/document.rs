use std::fmt;

use crate::types::ast::{BaseExpr, Node};
use crate::Value;

/// A parsed template.
///
/// Documents are immutable once built and are shared between renders through
/// an [`Arc`][std::sync::Arc], including through the
/// [`TemplateCache`][crate::TemplateCache].
pub struct Document {
    pub(crate) source: String,
    pub(crate) nodes: Vec<Node>,
    pub(crate) has_includes: bool,
    pub(crate) hash: String,
}

impl Document {
    /// The preprocessed template source.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Whether any node renders another template, i.e. `include`, `render`,
    /// `section` or `sections`.
    ///
    /// Such documents are never written to the template cache.
    pub fn has_includes(&self) -> bool {
        self.has_includes
    }

    /// The hex encoded SHA-256 of the preprocessed source.
    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// Returns the names of the templates this document statically includes.
    pub fn includes(&self) -> Vec<String> {
        let mut names = Vec::new();
        collect_includes(&self.nodes, &mut names);
        names
    }
}

fn collect_includes(nodes: &[Node], names: &mut Vec<String>) {
    for node in nodes {
        match node {
            Node::Include(include) => {
                if let BaseExpr::Literal(Value::String(name)) = &include.name {
                    names.push(name.clone());
                }
            }
            Node::Capture { body, .. } | Node::Wrap { body, .. } | Node::Block(body) => {
                collect_includes(body, names)
            }
            Node::Cond {
                branches,
                otherwise,
            } => {
                for branch in branches {
                    collect_includes(&branch.body, names);
                }
                if let Some(body) = otherwise {
                    collect_includes(body, names);
                }
            }
            Node::Case {
                whens, otherwise, ..
            } => {
                for when in whens {
                    collect_includes(&when.body, names);
                }
                if let Some(body) = otherwise {
                    collect_includes(body, names);
                }
            }
            Node::For(f) => {
                collect_includes(&f.body, names);
                if let Some(body) = &f.otherwise {
                    collect_includes(body, names);
                }
            }
            _ => {}
        }
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("hash", &self.hash)
            .field("has_includes", &self.has_includes)
            .field("nodes", &self.nodes.len())
            .finish()
    }
}
