mod helpers;

use liquet::{Context, Engine, ErrorKind, Mode, Value};
use serde_json::json;

use crate::helpers::Writer;

#[test]
fn render_output_scalars() {
    let result = Engine::new()
        .compile("{{ b }} {{ i }} {{ f }} {{ s }} [{{ missing }}]")
        .unwrap()
        .render(json!({ "b": true, "i": 123, "f": 1.5, "s": "dolor" }))
        .unwrap();
    assert_eq!(result, "true 123 1.5 dolor []");
}

#[test]
fn render_output_whole_float() {
    let result = Engine::new()
        .compile("{{ f }}")
        .unwrap()
        .render(json!({ "f": 2.0 }))
        .unwrap();
    assert_eq!(result, "2.0");
}

#[test]
fn render_output_map_as_json() {
    let result = Engine::new()
        .compile("{{ m }}")
        .unwrap()
        .render(json!({ "m": { "a": 1 } }))
        .unwrap();
    assert_eq!(result, r#"{"a":1}"#);
}

#[test]
fn render_member_access() {
    let result = Engine::new()
        .compile("{{ p.title }} {{ p.tags[1] }} {{ p.tags[-1] }} {{ p['title'] }} {{ p.tags[k] }}")
        .unwrap()
        .render(json!({ "p": { "title": "Hat", "tags": ["a", "b", "c"] }, "k": 0 }))
        .unwrap();
    assert_eq!(result, "Hat b c Hat a");
}

#[test]
fn render_size_first_last() {
    let result = Engine::new()
        .compile("{{ l.size }} {{ l.first }} {{ l.last }} {{ s.size }}")
        .unwrap()
        .render(json!({ "l": [1, 2, 3], "s": "abcd" }))
        .unwrap();
    assert_eq!(result, "3 1 3 4");
}

#[test]
fn render_map_key_shadows_size() {
    let result = Engine::new()
        .compile("{{ m.size }}")
        .unwrap()
        .render(json!({ "m": { "size": "XL" } }))
        .unwrap();
    assert_eq!(result, "XL");
}

#[test]
fn render_range() {
    let result = Engine::new()
        .compile("{% for i in (1..n) %}{{ i }}{% endfor %}")
        .unwrap()
        .render(json!({ "n": 4 }))
        .unwrap();
    assert_eq!(result, "1234");
}

#[test]
fn render_whitespace_control() {
    let result = Engine::new()
        .compile("a  {%- if true -%}  b  {%- endif %}\n{{- 'c' }}")
        .unwrap()
        .render(json!({}))
        .unwrap();
    assert_eq!(result, "abc");
}

#[test]
fn render_raw_and_comment() {
    let result = Engine::new()
        .compile("{% raw %}{{ x }}{% endraw %}{% comment %}{{ x }}{% endcomment %}{% # note %}.")
        .unwrap()
        .render(json!({ "x": 1 }))
        .unwrap();
    assert_eq!(result, "{{ x }}.");
}

#[test]
fn render_assign_and_capture() {
    let result = Engine::new()
        .compile("{% assign n = 1 %}{% capture greeting %}hello {{ n }}{% endcapture %}{{ greeting }}")
        .unwrap()
        .render(json!({}))
        .unwrap();
    assert_eq!(result, "hello 1");
}

#[test]
fn render_assign_outlives_block() {
    let result = Engine::new()
        .compile("{% for i in (1..2) %}{% assign last = i %}{% endfor %}{{ last }}")
        .unwrap()
        .render(json!({}))
        .unwrap();
    assert_eq!(result, "2");
}

#[test]
fn render_counters_are_separate_from_variables() {
    let result = Engine::new()
        .compile("{% increment c %}{% increment c %}{% decrement d %}{{ c }}")
        .unwrap()
        .render(json!({ "c": "x" }))
        .unwrap();
    assert_eq!(result, "01-1x");
}

#[test]
fn render_cycle() {
    let result = Engine::new()
        .compile("{% for i in (1..4) %}{% cycle 'a', 'b', 'c' %}{% endfor %}|{% cycle 'g': 1, 2 %}{% cycle 'g': 1, 2 %}")
        .unwrap()
        .render(json!({}))
        .unwrap();
    assert_eq!(result, "abca|12");
}

#[test]
fn render_echo_and_liquid() {
    let source = "{% liquid\n  assign x = 'hi' | upcase\n  if x\n    echo x\n  endif\n%}";
    let result = Engine::new()
        .compile(source)
        .unwrap()
        .render(json!({}))
        .unwrap();
    assert_eq!(result, "HI");
}

#[test]
fn render_wrapped_assets() {
    let result = Engine::new()
        .compile("{% stylesheet %}a{}{% endstylesheet %}{% javascript %}f(){% endjavascript %}")
        .unwrap()
        .render(json!({}))
        .unwrap();
    assert_eq!(result, "<style>a{}</style><script>f()</script>");
}

#[test]
fn render_schema_renders_nothing() {
    let result = Engine::new()
        .compile(r#"a{% schema %}{ "name": "x" }{% endschema %}b"#)
        .unwrap()
        .render(json!({}))
        .unwrap();
    assert_eq!(result, "ab");
}

#[test]
fn render_named_template() {
    let mut engine = Engine::new();
    engine.add_template("hello", "Hello {{ name }}!").unwrap();
    let result = engine
        .get_template("hello")
        .unwrap()
        .render(json!({ "name": "John" }))
        .unwrap();
    assert_eq!(result, "Hello John!");
}

#[test]
fn render_with_keeps_assignments() {
    let engine = Engine::new();
    let mut ctx = Context::new();
    ctx.set("a", 1);
    let result = engine
        .compile("{% assign b = a | plus: 1 %}{{ b }}")
        .unwrap()
        .render_with(&mut ctx)
        .unwrap();
    assert_eq!(result, "2");
    assert_eq!(ctx.get("b"), Value::Integer(2));
}

#[test]
fn render_structured_data() {
    #[derive(serde::Serialize)]
    struct Data {
        product: Product,
    }

    #[derive(serde::Serialize)]
    struct Product {
        title: String,
        price: u32,
    }

    let data = Data {
        product: Product {
            title: "Hat".into(),
            price: 10,
        },
    };
    let result = Engine::new()
        .compile("{{ product.title }}: {{ product.price }}")
        .unwrap()
        .render(&data)
        .unwrap();
    assert_eq!(result, "Hat: 10");
}

#[test]
fn render_to_writer() {
    let mut w = Writer::new();
    Engine::new()
        .compile("{{ a }}")
        .unwrap()
        .render_to_writer(&mut w, json!({ "a": "b" }))
        .unwrap();
    assert_eq!(w.into_string(), "b");
}

#[test]
fn render_to_writer_err() {
    let err = Engine::new()
        .compile("{{ a }}")
        .unwrap()
        .render_to_writer(Writer::with_max(0), json!({ "a": "b" }))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);
    assert_eq!(err.message(), "sink closed");
}

#[test]
fn render_err_data_not_a_map() {
    let err = Engine::new()
        .compile("{{ a }}")
        .unwrap()
        .render(json!([1, 2]))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Data);
    assert_eq!(err.message(), "expected map for render data, found list");
}

#[test]
fn render_mode_default_is_development() {
    assert_eq!(Mode::default(), Mode::Development);
}
