mod context;
mod core;
mod include;
mod iter;
mod section;
mod value;

use std::io;

pub use crate::render::context::{Context, Registers};
pub(crate) use crate::render::core::{Flow, Renderer};
pub(crate) use crate::render::value::lookup_key;
use crate::types::document::Document;
use crate::{Engine, Result};

/// Renders a document to a string.
///
/// A `break` or `continue` outside of any loop just ends the render.
pub(crate) fn template(engine: &Engine, document: &Document, ctx: &mut Context) -> Result<String> {
    let mut out = String::with_capacity(document.source().len());
    Renderer::new(engine, document.source()).render_nodes(&document.nodes, ctx, &mut out)?;
    Ok(out)
}

pub(crate) fn template_to<W>(
    engine: &Engine,
    document: &Document,
    mut writer: W,
    ctx: &mut Context,
) -> Result<()>
where
    W: io::Write,
{
    let out = template(engine, document, ctx)?;
    writer.write_all(out.as_bytes())?;
    writer.flush()?;
    Ok(())
}

/// Renders one section with explicit data, outside of any template.
pub(crate) fn section(
    engine: &Engine,
    name: &str,
    data: &crate::Value,
    ctx: &mut Context,
) -> Result<String> {
    let mut out = String::new();
    Renderer::new(engine, "").render_section(name, name, Some(data), None, ctx, &mut out)?;
    Ok(out)
}
