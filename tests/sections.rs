use liquet::{Engine, MemoryReader, Mode};
use serde_json::json;

const HERO: &str = r#"<h1>{{ section.settings.title }}</h1>
{%- schema %}
{
  "name": "Hero",
  "settings": [
    { "id": "title", "type": "text", "default": "Welcome" },
    { "id": "color", "type": "color", "default": "red" }
  ]
}
{% endschema %}"#;

const SLIDES: &str = r#"{% for block in section.blocks %}{{ block.id }}={{ block.settings.speed }};{% endfor %}
{%- schema %}
{
  "blocks": [
    { "type": "slide", "settings": [{ "id": "speed", "default": 3 }] }
  ]
}
{% endschema %}"#;

fn reader() -> MemoryReader {
    MemoryReader::new()
        .with("sections/hero.liquid", HERO)
        .with("sections/slides.liquid", SLIDES)
        .with("sections/color.liquid", "{{ section.settings.color }}")
        .with("sections/globals.liquid", "{{ shop }}")
}

fn engine(reader: MemoryReader) -> Engine {
    let mut engine = Engine::new();
    engine.set_reader(reader);
    engine
}

#[test]
fn section_uses_schema_defaults() {
    let result = engine(reader())
        .compile("{% section 'hero' %}")
        .unwrap()
        .render(json!({}))
        .unwrap();
    assert_eq!(
        result,
        r#"<div id="shopify-section-hero" class="shopify-section"><h1>Welcome</h1></div>"#
    );
}

#[test]
fn section_reads_settings_data() {
    let reader = reader().with(
        "config/settings_data.json",
        r#"{ "current": { "sections": { "hero": { "settings": { "title": "Hi" } } } } }"#,
    );
    let result = engine(reader)
        .compile("{% section 'hero' %}")
        .unwrap()
        .render(json!({}))
        .unwrap();
    assert_eq!(
        result,
        r#"<div id="shopify-section-hero" class="shopify-section"><h1>Hi</h1></div>"#
    );
}

#[test]
fn section_sees_render_globals() {
    let result = engine(reader())
        .compile("{% section 'globals' %}")
        .unwrap()
        .render(json!({ "shop": "Shop" }))
        .unwrap();
    assert_eq!(
        result,
        r#"<div id="shopify-section-globals" class="shopify-section">Shop</div>"#
    );
}

#[test]
fn render_section_with_data() {
    let result = engine(reader())
        .render_section("hero", json!({ "settings": { "title": "Sale" } }))
        .unwrap();
    assert_eq!(
        result,
        r#"<div id="shopify-section-hero" class="shopify-section"><h1>Sale</h1></div>"#
    );
}

#[test]
fn render_section_blocks_in_order_with_defaults() {
    let data = json!({
        "blocks": {
            "b1": { "type": "slide", "settings": { "speed": 5 } },
            "b2": { "type": "slide" }
        },
        "block_order": ["b2", "b1"]
    });
    let result = engine(reader()).render_section("slides", data).unwrap();
    assert_eq!(
        result,
        r#"<div id="shopify-section-slides" class="shopify-section">b2=3;b1=5;</div>"#
    );
}

#[test]
fn render_section_explicit_setting_wins() {
    let engine = engine(reader().with(
        "sections/color.liquid",
        r#"{{ section.settings.color }}{% schema %}{ "settings": [{ "id": "color", "default": "red" }] }{% endschema %}"#,
    ));
    let result = engine
        .render_section("color", json!({ "settings": { "color": "blue" } }))
        .unwrap();
    assert_eq!(
        result,
        r#"<div id="shopify-section-color" class="shopify-section">blue</div>"#
    );
}

#[test]
fn sections_group_in_order() {
    let group = r#"{
        "sections": {
            "a": { "type": "color", "settings": { "color": "green" } },
            "b": { "type": "color", "disabled": true },
            "c": { "type": "color", "settings": { "color": "pink" } }
        },
        "order": ["c", "b", "a"]
    }"#;
    let result = engine(reader().with("sections/header-group.json", group))
        .compile("{% sections 'header-group' %}")
        .unwrap()
        .render(json!({}))
        .unwrap();
    assert_eq!(
        result,
        concat!(
            r#"<div id="shopify-section-sections--header-group__c" class="shopify-section shopify-section-group-header-group">pink</div>"#,
            r#"<div id="shopify-section-sections--header-group__a" class="shopify-section shopify-section-group-header-group">green</div>"#,
        )
    );
}

#[test]
fn sections_group_invalid_json_renders_nothing() {
    let result = engine(reader().with("sections/footer-group.json", "{ nope"))
        .compile("[{% sections 'footer-group' %}]")
        .unwrap()
        .render(json!({}))
        .unwrap();
    assert_eq!(result, "[]");
}

#[test]
fn missing_section() {
    let source = "[{% section 'nope' %}]";
    let result = engine(reader())
        .compile(source)
        .unwrap()
        .render(json!({}))
        .unwrap();
    assert_eq!(
        result,
        "[<!-- Liquid error: template file 'sections/nope.liquid' not found -->]"
    );

    let mut engine = engine(reader());
    engine.set_mode(Mode::Production);
    let result = engine.compile(source).unwrap().render(json!({})).unwrap();
    assert_eq!(result, "[]");
}
