use crate::compile::{Parser, TagHead, Tk};
use crate::types::ast::{BaseExpr, Include, IncludeKind, Node};
use crate::{Result, Value};

pub fn parse_include(p: &mut Parser<'_>, head: TagHead) -> Result<Option<Node>> {
    parse_template(p, head, IncludeKind::Include)
}

pub fn parse_render(p: &mut Parser<'_>, head: TagHead) -> Result<Option<Node>> {
    parse_template(p, head, IncludeKind::Render)
}

/// Parses `include name with value`, `render 'name' for items as item` and
/// any trailing `key: value` arguments.
fn parse_template(p: &mut Parser<'_>, head: TagHead, kind: IncludeKind) -> Result<Option<Node>> {
    let source = p.source();
    let mut markup = p.markup(&head)?;

    let name = match kind {
        // `render` only accepts a literal name so that the template can be
        // resolved without a context.
        IncludeKind::Render => {
            let span = markup.expect(Tk::String)?;
            BaseExpr::Literal(Value::String(source[span.m + 1..span.n - 1].to_owned()))
        }
        IncludeKind::Include => markup.parse_base()?,
    };

    let mut with = None;
    let mut iterate = false;
    if !markup.is_next_pair(Tk::Ident, Tk::Colon) {
        if markup.eat_word("with") {
            with = Some(markup.parse_base()?);
        } else if markup.eat_word("for") {
            with = Some(markup.parse_base()?);
            iterate = true;
        }
    }
    let alias = if markup.eat_word("as") {
        Some(markup.parse_ident()?.0)
    } else {
        None
    };
    let args = markup.parse_kwargs()?;

    p.mark_includes();
    Ok(Some(Node::Include(Box::new(Include {
        kind,
        name,
        with,
        iterate,
        alias,
        args,
        span: head.span,
    }))))
}

pub fn parse_section(p: &mut Parser<'_>, head: TagHead) -> Result<Option<Node>> {
    let mut markup = p.markup(&head)?;
    let name = markup.parse_base()?;
    markup.finish()?;
    p.mark_includes();
    Ok(Some(Node::Section {
        name,
        span: head.span,
    }))
}

pub fn parse_sections(p: &mut Parser<'_>, head: TagHead) -> Result<Option<Node>> {
    let mut markup = p.markup(&head)?;
    let group = markup.parse_base()?;
    markup.finish()?;
    p.mark_includes();
    Ok(Some(Node::Sections {
        group,
        span: head.span,
    }))
}
