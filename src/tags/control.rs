use crate::compile::{Parser, TagHead, Tk};
use crate::types::ast::{BaseExpr, Branch, ForLoop, Node, Offset, When};
use crate::Result;

pub fn parse_if(p: &mut Parser<'_>, head: TagHead) -> Result<Option<Node>> {
    parse_cond(p, head, "endif", false)
}

pub fn parse_unless(p: &mut Parser<'_>, head: TagHead) -> Result<Option<Node>> {
    parse_cond(p, head, "endunless", true)
}

/// Parses an `if` or `unless` tag along with its `elsif` and `else` clauses.
fn parse_cond(p: &mut Parser<'_>, open: TagHead, end: &str, negate: bool) -> Result<Option<Node>> {
    let mut branches = Vec::new();
    let mut clause = open.clone();
    loop {
        let mut markup = p.markup(&clause)?;
        let cond = markup.parse_condition()?;
        markup.finish()?;

        let (body, close) = p.parse_body(&open, &[end, "elsif", "else"])?;
        branches.push(Branch {
            cond,
            negate: negate && branches.is_empty(),
            body,
        });

        match close.name.as_str() {
            "elsif" => clause = close,
            "else" => {
                let (otherwise, _) = p.parse_body(&open, &[end])?;
                return Ok(Some(Node::Cond {
                    branches,
                    otherwise: Some(otherwise),
                }));
            }
            _ => {
                return Ok(Some(Node::Cond {
                    branches,
                    otherwise: None,
                }))
            }
        }
    }
}

pub fn parse_case(p: &mut Parser<'_>, head: TagHead) -> Result<Option<Node>> {
    let mut markup = p.markup(&head)?;
    let subject = markup.parse_expr()?;
    markup.finish()?;

    let delims = ["endcase", "when", "else"];

    // Anything between `case` and the first `when` is never rendered.
    let (_, mut close) = p.parse_body(&head, &delims)?;

    let mut whens = Vec::new();
    loop {
        match close.name.as_str() {
            "when" => {
                let values = parse_when(p, &close)?;
                let (body, next) = p.parse_body(&head, &delims)?;
                whens.push(When { values, body });
                close = next;
            }
            "else" => {
                let (otherwise, _) = p.parse_body(&head, &["endcase"])?;
                return Ok(Some(Node::Case {
                    subject,
                    whens,
                    otherwise: Some(otherwise),
                }));
            }
            _ => {
                return Ok(Some(Node::Case {
                    subject,
                    whens,
                    otherwise: None,
                }))
            }
        }
    }
}

/// Parses `when a, b or c`.
fn parse_when(p: &Parser<'_>, head: &TagHead) -> Result<Vec<BaseExpr>> {
    let mut markup = p.markup(head)?;
    let mut values = vec![markup.parse_base()?];
    while markup.eat(Tk::Comma) || markup.eat_word("or") {
        values.push(markup.parse_base()?);
    }
    markup.finish()?;
    Ok(values)
}

/// Parses `for var in collection` with any `limit:`, `offset:` and
/// `reversed` attributes.
pub fn parse_for(p: &mut Parser<'_>, head: TagHead) -> Result<Option<Node>> {
    let source = p.source();
    let mut markup = p.markup(&head)?;

    let (var, _) = markup.parse_ident()?;
    markup.expect_word("in")?;
    let start = markup.position();
    let iterable = markup.parse_base()?;
    let name = format!("{var}-{}", &source[markup.span_from(start)]);

    let mut limit = None;
    let mut offset = None;
    let mut reversed = false;
    loop {
        markup.eat(Tk::Comma);
        if markup.is_eof() {
            break;
        }
        if markup.eat_word("reversed") {
            reversed = true;
            continue;
        }
        let (attr, span) = markup.parse_ident()?;
        markup.expect(Tk::Colon)?;
        match attr.as_str() {
            "limit" => limit = Some(markup.parse_base()?),
            "offset" if markup.eat_word("continue") => offset = Some(Offset::Continue),
            "offset" => offset = Some(Offset::Expr(markup.parse_base()?)),
            _ => return Err(p.err(format!("unknown loop attribute '{attr}'"), span)),
        }
    }

    let (body, close) = p.parse_body(&head, &["endfor", "else"])?;
    let otherwise = match close.name.as_str() {
        "else" => Some(p.parse_body(&head, &["endfor"])?.0),
        _ => None,
    };

    Ok(Some(Node::For(Box::new(ForLoop {
        var,
        iterable,
        limit,
        offset,
        reversed,
        body,
        otherwise,
        name,
    }))))
}

pub fn parse_break(p: &mut Parser<'_>, head: TagHead) -> Result<Option<Node>> {
    p.markup(&head)?.finish()?;
    Ok(Some(Node::Break))
}

pub fn parse_continue(p: &mut Parser<'_>, head: TagHead) -> Result<Option<Node>> {
    p.markup(&head)?.finish()?;
    Ok(Some(Node::Continue))
}
