//! The parsed tree of a Liquid template.

use std::fmt;

use crate::tags::Tag;
use crate::types::span::Span;
use crate::Value;

/// A node in a [`Document`][crate::Document] or in the body of a block tag.
#[derive(Debug)]
pub enum Node {
    /// Raw template text.
    Raw(Span),

    /// `{{ expr }}` or `{% echo expr %}`
    Output(Expr),

    /// `{% assign name = expr %}`
    Assign { name: String, value: Expr },

    /// `{% capture name %} ... {% endcapture %}`
    Capture { name: String, body: Vec<Node> },

    /// `{% increment name %}` or `{% decrement name %}`
    Counter { name: String, increment: bool },

    /// `{% if %}` and `{% unless %}` with any `elsif` and `else` clauses.
    Cond {
        branches: Vec<Branch>,
        otherwise: Option<Vec<Node>>,
    },

    /// `{% case subject %}{% when a, b %} ... {% else %} ... {% endcase %}`
    Case {
        subject: Expr,
        whens: Vec<When>,
        otherwise: Option<Vec<Node>>,
    },

    For(Box<ForLoop>),

    Break,

    Continue,

    /// `{% cycle 'group': 'a', 'b' %}`
    Cycle {
        group: Option<BaseExpr>,
        key: String,
        values: Vec<BaseExpr>,
    },

    /// `{% include %}` or `{% render %}`
    Include(Box<Include>),

    /// `{% section 'name' %}`
    Section { name: BaseExpr, span: Span },

    /// `{% sections 'group' %}`
    Sections { group: BaseExpr, span: Span },

    /// A body wrapped in a fixed HTML element, e.g. `{% stylesheet %}`.
    Wrap {
        open: &'static str,
        close: &'static str,
        body: Vec<Node>,
    },

    /// A flat sequence of nodes, e.g. the lines of a `{% liquid %}` tag.
    Block(Vec<Node>),

    /// A tag registered by the user.
    Custom(CustomNode),
}

/// One `if`, `elsif` or `unless` clause.
#[derive(Debug)]
pub struct Branch {
    pub cond: Condition,
    /// Set for the leading clause of an `unless` tag.
    pub negate: bool,
    pub body: Vec<Node>,
}

#[derive(Debug)]
pub struct When {
    pub values: Vec<BaseExpr>,
    pub body: Vec<Node>,
}

#[derive(Debug)]
pub struct ForLoop {
    pub var: String,
    pub iterable: BaseExpr,
    pub limit: Option<BaseExpr>,
    pub offset: Option<Offset>,
    pub reversed: bool,
    pub body: Vec<Node>,
    pub otherwise: Option<Vec<Node>>,
    /// `{var}-{collection}`, the key under which `offset: continue` stores
    /// the position reached.
    pub name: String,
}

#[derive(Debug)]
pub enum Offset {
    Continue,
    Expr(BaseExpr),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncludeKind {
    /// Shares the caller's scope; assignments leak back to the caller.
    Include,
    /// Renders behind a scope boundary; assignments stay local.
    Render,
}

#[derive(Debug)]
pub struct Include {
    pub kind: IncludeKind,
    pub name: BaseExpr,
    /// The `with` or `for` value.
    pub with: Option<BaseExpr>,
    /// Whether `for` was used, i.e. render once per item of `with`.
    pub iterate: bool,
    pub alias: Option<String>,
    pub args: Vec<(String, BaseExpr)>,
    pub span: Span,
}

pub struct CustomNode {
    pub name: String,
    pub tag: Box<dyn Tag>,
    pub span: Span,
}

/// A value followed by any number of filters, e.g. `a.b | append: "c"`.
#[derive(Debug, Clone)]
pub struct Expr {
    pub base: BaseExpr,
    pub filters: Vec<FilterCall>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct FilterCall {
    pub name: String,
    pub args: Vec<BaseExpr>,
    pub kwargs: Vec<(String, BaseExpr)>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum BaseExpr {
    Var(Var),
    Literal(Value),
    /// `(start..end)`
    Range(Box<BaseExpr>, Box<BaseExpr>),
    /// The `empty` keyword.
    Empty,
    /// The `blank` keyword.
    Blank,
}

/// A variable path, e.g. `product.images[0].src`.
#[derive(Debug, Clone)]
pub struct Var {
    pub path: Vec<Member>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum Member {
    Key(String),
    Index(BaseExpr),
}

#[derive(Debug, Clone)]
pub enum Condition {
    Test(Comparison),
    And(Box<Condition>, Box<Condition>),
    Or(Box<Condition>, Box<Condition>),
}

#[derive(Debug, Clone)]
pub struct Comparison {
    pub lhs: BaseExpr,
    pub rhs: Option<(Op, BaseExpr)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    Contains,
}

impl Op {
    pub(crate) fn from_str(s: &str) -> Option<Self> {
        let op = match s {
            "==" => Self::Eq,
            "!=" | "<>" => Self::Ne,
            "<" => Self::Lt,
            ">" => Self::Gt,
            "<=" => Self::Le,
            ">=" => Self::Ge,
            "contains" => Self::Contains,
            _ => return None,
        };
        Some(op)
    }
}

impl fmt::Debug for CustomNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomNode")
            .field("name", &self.name)
            .field("span", &self.span)
            .finish_non_exhaustive()
    }
}
