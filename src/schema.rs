//! Section schemas and their setting defaults.
//!
//! A section declares its settings in JSON between `{% schema %}` and
//! `{% endschema %}`. Each declared setting with an `id` and a `default`
//! provides a value for sections that do not set it explicitly.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

use crate::{Map, Value};

static SCHEMA: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)\{%-?\s*schema\s*-?%\}(.*?)\{%-?\s*endschema\s*-?%\}").unwrap()
});

static COMMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)\{%-?\s*comment\s*-?%\}.*?\{%-?\s*endcomment\s*-?%\}|\{%-?\s*#.*?-?%\}")
        .unwrap()
});

/// Extracts and decodes the schema of a section source.
///
/// Returns `None` if there is no schema or if it is not valid JSON; the
/// latter is logged. When a source contains more than one schema the first
/// one is used.
pub fn extract_schema(source: &str) -> Option<Value> {
    let mut found = SCHEMA.captures_iter(source);
    let body = found.next()?.get(1)?.as_str();
    if found.next().is_some() {
        warn!("section has more than one schema, using the first");
    }
    let body = COMMENT.replace_all(body, "");
    match serde_json::from_str::<serde_json::Value>(&body) {
        Ok(json) => Some(Value::from(json)),
        Err(err) => {
            warn!(error = %err, "invalid schema JSON");
            None
        }
    }
}

/// Fills in the section setting defaults that `settings` does not already
/// have a value for.
pub fn apply_defaults(schema: &Value, settings: &mut Map<String, Value>) {
    if let Some(decls) = schema.get("settings").and_then(Value::as_list) {
        fill(decls, settings);
    }
}

/// Fills in the setting defaults of the given block type.
pub fn apply_block_defaults(schema: &Value, block_type: &str, settings: &mut Map<String, Value>) {
    let decls = schema
        .get("blocks")
        .and_then(Value::as_list)
        .and_then(|blocks| {
            blocks
                .iter()
                .find(|b| b.get("type").and_then(Value::as_str) == Some(block_type))
        })
        .and_then(|block| block.get("settings"))
        .and_then(Value::as_list);
    if let Some(decls) = decls {
        fill(decls, settings);
    }
}

fn fill(decls: &[Value], settings: &mut Map<String, Value>) {
    for decl in decls {
        let id = decl.get("id").and_then(Value::as_str);
        if let (Some(id), Some(default)) = (id, decl.get("default")) {
            settings
                .entry(id.to_owned())
                .or_insert_with(|| default.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_schema_basic() {
        let source = r#"<h1>{{ section.settings.title }}</h1>
{% schema %}
  { "name": "Hero", "settings": [{ "id": "title", "type": "text" }] }
{% endschema %}"#;
        let schema = extract_schema(source).unwrap();
        assert_eq!(schema.get("name"), Some(&Value::from("Hero")));
    }

    #[test]
    fn extract_schema_strips_comments() {
        let source = r#"{%- schema -%}
{% comment %}settings for the hero{% endcomment %}
{ "name": "Hero" }
{%- endschema -%}"#;
        let schema = extract_schema(source).unwrap();
        assert_eq!(schema.get("name"), Some(&Value::from("Hero")));
    }

    #[test]
    fn extract_schema_invalid_json() {
        assert_eq!(extract_schema("{% schema %}{ nope {% endschema %}"), None);
        assert_eq!(extract_schema("no schema here"), None);
    }

    #[test]
    fn apply_defaults_explicit_wins() {
        let schema = Value::from(serde_json::json!({
            "settings": [
                { "id": "color", "default": "red" },
                { "id": "size", "default": 2 },
                { "id": "label" },
                { "type": "header", "content": "Layout" }
            ]
        }));
        let mut settings = Map::new();
        settings.insert("color".to_owned(), Value::from("blue"));
        apply_defaults(&schema, &mut settings);

        assert_eq!(settings.get("color"), Some(&Value::from("blue")));
        assert_eq!(settings.get("size"), Some(&Value::Integer(2)));
        assert_eq!(settings.get("label"), None);
    }

    #[test]
    fn apply_block_defaults_by_type() {
        let schema = Value::from(serde_json::json!({
            "blocks": [
                { "type": "text", "settings": [{ "id": "body", "default": "Lorem" }] },
                { "type": "image", "settings": [{ "id": "width", "default": 100 }] }
            ]
        }));
        let mut settings = Map::new();
        apply_block_defaults(&schema, "image", &mut settings);
        assert_eq!(settings.get("width"), Some(&Value::Integer(100)));
        assert_eq!(settings.get("body"), None);
    }
}
