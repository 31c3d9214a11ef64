use crate::compile::{Parser, TagHead, Tk};
use crate::types::ast::Node;
use crate::Result;

/// Parses `assign name = expr`.
pub fn parse_assign(p: &mut Parser<'_>, head: TagHead) -> Result<Option<Node>> {
    let mut markup = p.markup(&head)?;
    let (name, _) = markup.parse_ident()?;
    markup.expect(Tk::Equals)?;
    let value = markup.parse_expr()?;
    markup.finish()?;
    Ok(Some(Node::Assign { name, value }))
}

pub fn parse_capture(p: &mut Parser<'_>, head: TagHead) -> Result<Option<Node>> {
    let mut markup = p.markup(&head)?;
    let (name, _) = markup.parse_name()?;
    markup.finish()?;
    let (body, _) = p.parse_body(&head, &["endcapture"])?;
    Ok(Some(Node::Capture { name, body }))
}

/// Parses both `increment` and `decrement`.
pub fn parse_counter(p: &mut Parser<'_>, head: TagHead) -> Result<Option<Node>> {
    let mut markup = p.markup(&head)?;
    let (name, _) = markup.parse_ident()?;
    markup.finish()?;
    Ok(Some(Node::Counter {
        name,
        increment: head.name == "increment",
    }))
}

/// Parses `cycle 'a', 'b'` and the grouped form `cycle 'group': 'a', 'b'`.
pub fn parse_cycle(p: &mut Parser<'_>, head: TagHead) -> Result<Option<Node>> {
    let source = p.source();
    let mut markup = p.markup(&head)?;

    let first_pos = markup.position();
    let first = markup.parse_base()?;
    let (group, start, mut values) = if markup.eat(Tk::Colon) {
        let start = markup.position();
        (Some(first), start, vec![markup.parse_base()?])
    } else {
        (None, first_pos, vec![first])
    };
    while markup.eat(Tk::Comma) {
        values.push(markup.parse_base()?);
    }
    markup.finish()?;

    // Ungrouped cycles with the same values share a position.
    let key = source[markup.span_from(start)].to_owned();
    Ok(Some(Node::Cycle { group, key, values }))
}

pub fn parse_echo(p: &mut Parser<'_>, head: TagHead) -> Result<Option<Node>> {
    let mut markup = p.markup(&head)?;
    let expr = markup.parse_expr()?;
    markup.finish()?;
    Ok(Some(Node::Output(expr)))
}

pub fn parse_raw(p: &mut Parser<'_>, head: TagHead) -> Result<Option<Node>> {
    let (body, _) = p.parse_body(&head, &["endraw"])?;
    Ok(Some(Node::Block(body)))
}

pub fn parse_liquid(p: &mut Parser<'_>, head: TagHead) -> Result<Option<Node>> {
    Ok(Some(Node::Block(p.parse_lines(&head)?)))
}

/// The schema is read from the section source when the section renders, the
/// tag itself renders nothing.
pub fn parse_schema(p: &mut Parser<'_>, head: TagHead) -> Result<Option<Node>> {
    p.parse_body(&head, &["endschema"])?;
    Ok(None)
}

/// Parses `stylesheet`, `javascript` and `style`.
pub fn parse_wrapped(p: &mut Parser<'_>, head: TagHead) -> Result<Option<Node>> {
    let end = format!("end{}", head.name);
    let (body, _) = p.parse_body(&head, &[end.as_str()])?;
    let (open, close) = match head.name.as_str() {
        "javascript" => ("<script>", "</script>"),
        "style" => ("<style data-shopify>", "</style>"),
        _ => ("<style>", "</style>"),
    };
    Ok(Some(Node::Wrap { open, close, body }))
}
