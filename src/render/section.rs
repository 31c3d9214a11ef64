use std::fmt::Write;
use std::mem;

use tracing::warn;

use crate::render::core::Renderer;
use crate::schema;
use crate::{Context, Map, Result, Value};

const SETTINGS_DATA: &str = "config/settings_data.json";

impl Renderer<'_> {
    /// Renders a section into `out`, wrapped in its container element.
    ///
    /// The section renders in a fresh context that only sees the caller's
    /// globals plus `section` and `section_schema`. Registers are shared with
    /// the caller.
    pub(crate) fn render_section(
        &self,
        id: &str,
        kind: &str,
        data: Option<&Value>,
        group: Option<&str>,
        ctx: &mut Context,
        out: &mut String,
    ) -> Result<()> {
        let engine = self.engine;
        let path = engine.paths.section(kind);
        let source = engine.read(&path)?;
        let schema = schema::extract_schema(&source);
        let document = engine.load(&source)?;
        let section = build_section(id, kind, data, schema.as_ref());

        let mut child = Context::with_globals(ctx.globals().clone());
        child.globals_mut().insert("section".into(), section);
        child
            .globals_mut()
            .insert("section_schema".into(), schema.unwrap_or_default());

        self.enter(&path, ctx)?;
        mem::swap(child.registers_mut(), ctx.registers_mut());
        let mut buf = String::new();
        let result = Renderer::new(engine, document.source()).render_nodes(
            &document.nodes,
            &mut child,
            &mut buf,
        );
        mem::swap(child.registers_mut(), ctx.registers_mut());
        ctx.registers_mut().includes.pop();
        result.map_err(|err| err.with_template_name(path))?;

        write!(out, "<div id=\"shopify-section-{id}\" class=\"shopify-section")?;
        if let Some(group) = group {
            write!(out, " shopify-section-group-{group}")?;
        }
        write!(out, "\">{buf}</div>")?;
        Ok(())
    }

    /// Renders every enabled section of a section group, in order.
    pub(crate) fn render_section_group(
        &self,
        group: &str,
        ctx: &mut Context,
        out: &mut String,
    ) -> Result<()> {
        let path = self.engine.paths.section_group(group);
        let source = self.engine.read(&path)?;
        let json = match serde_json::from_str::<serde_json::Value>(&source) {
            Ok(json) => Value::from(json),
            Err(err) => {
                warn!(path = %path, error = %err, "invalid section group");
                return Ok(());
            }
        };

        let Some(sections) = json.get("sections").and_then(Value::as_map) else {
            return Ok(());
        };
        let order: Vec<String> = match json.get("order").and_then(Value::as_list) {
            Some(order) => order.iter().map(Value::to_string).collect(),
            None => sections.keys().cloned().collect(),
        };

        for id in order {
            let Some(data) = sections.get(&id) else {
                continue;
            };
            if data.get("disabled").map_or(false, Value::is_truthy) {
                continue;
            }
            let Some(kind) = data.get("type").and_then(Value::as_str) else {
                continue;
            };
            let id = format!("sections--{group}__{id}");
            if let Err(err) = self.render_section(&id, kind, Some(data), Some(group), ctx, out) {
                self.recover(err, out)?;
            }
        }
        Ok(())
    }

    /// Returns the data for a statically rendered section from the theme
    /// settings, if there is any.
    pub(crate) fn section_settings(&self, name: &str) -> Option<Value> {
        let source = self.engine.read(SETTINGS_DATA).ok()?;
        let data = match serde_json::from_str::<serde_json::Value>(&source) {
            Ok(json) => Value::from(json),
            Err(err) => {
                warn!(path = SETTINGS_DATA, error = %err, "invalid settings data");
                return None;
            }
        };
        let current = match data.get("current")? {
            // The current settings may name one of the presets.
            Value::String(preset) => data.get("presets")?.get(preset)?,
            current => current,
        };
        current.get("sections")?.get(name).cloned()
    }
}

/// Builds the `section` object: the section data with schema defaults
/// applied and blocks listed in order.
fn build_section(id: &str, kind: &str, data: Option<&Value>, schema: Option<&Value>) -> Value {
    let empty = Map::new();
    let data = data.and_then(Value::as_map).unwrap_or(&empty);

    let mut settings = data
        .get("settings")
        .and_then(Value::as_map)
        .cloned()
        .unwrap_or_default();
    if let Some(schema) = schema {
        schema::apply_defaults(schema, &mut settings);
    }

    let block_data = data.get("blocks").and_then(Value::as_map);
    let block_order: Vec<String> = match data.get("block_order").and_then(Value::as_list) {
        Some(order) => order.iter().map(Value::to_string).collect(),
        None => block_data
            .map(|blocks| blocks.keys().cloned().collect())
            .unwrap_or_default(),
    };

    let blocks: Vec<Value> = block_order
        .iter()
        .filter_map(|block_id| {
            let mut block = block_data?.get(block_id)?.as_map()?.clone();
            if block.get("disabled").map_or(false, Value::is_truthy) {
                return None;
            }
            let mut block_settings = block
                .get("settings")
                .and_then(Value::as_map)
                .cloned()
                .unwrap_or_default();
            if let (Some(schema), Some(kind)) = (schema, block.get("type").and_then(Value::as_str)) {
                schema::apply_block_defaults(schema, kind, &mut block_settings);
            }
            block.insert("settings".into(), Value::Map(block_settings));
            block.insert("id".into(), block_id.as_str().into());
            block.insert(
                "shopify_attributes".into(),
                format!("data-shopify-editor-block=\"{block_id}\"").into(),
            );
            Some(Value::Map(block))
        })
        .collect();

    let mut section = Map::new();
    section.insert("id".into(), id.into());
    section.insert("type".into(), kind.into());
    section.insert("settings".into(), Value::Map(settings));
    section.insert("blocks".into(), Value::List(blocks));
    section.insert("block_order".into(), block_order.into());
    Value::Map(section)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_section_applies_defaults_and_orders_blocks() {
        let schema = Value::from(serde_json::json!({
            "settings": [{ "id": "title", "default": "Hello" }],
            "blocks": [{ "type": "slide", "settings": [{ "id": "speed", "default": 3 }] }]
        }));
        let data = Value::from(serde_json::json!({
            "settings": { "color": "blue" },
            "blocks": {
                "b1": { "type": "slide", "settings": { "speed": 5 } },
                "b2": { "type": "slide" }
            },
            "block_order": ["b2", "b1"]
        }));
        let section = build_section("hero", "hero", Some(&data), Some(&schema));

        assert_eq!(section.get("id"), Some(&Value::from("hero")));
        let settings = section.get("settings").unwrap();
        assert_eq!(settings.get("title"), Some(&Value::from("Hello")));
        assert_eq!(settings.get("color"), Some(&Value::from("blue")));

        let blocks = section.get("blocks").and_then(Value::as_list).unwrap();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].get("id"), Some(&Value::from("b2")));
        assert_eq!(
            blocks[0].get("settings").and_then(|s| s.get("speed")),
            Some(&Value::Integer(3))
        );
        assert_eq!(
            blocks[1].get("settings").and_then(|s| s.get("speed")),
            Some(&Value::Integer(5))
        );
        assert_eq!(
            blocks[1].get("shopify_attributes"),
            Some(&Value::from("data-shopify-editor-block=\"b1\""))
        );
    }

    #[test]
    fn build_section_without_data() {
        let section = build_section("footer", "footer", None, None);
        assert_eq!(section.get("blocks"), Some(&Value::List(Vec::new())));
        assert_eq!(section.get("settings"), Some(&Value::Map(Map::new())));
    }
}
