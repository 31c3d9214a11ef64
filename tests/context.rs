use liquet::{
    Body, Context, Engine, Error, ErrorKind, Expression, Map, Tag, TagFactory, TagParser,
    TagRender, Value,
};
use serde_json::json;

/// `{% with name = expr %}...{% endwith %}`, a scoped variable.
struct With {
    name: String,
    value: Expression,
    body: Body,
}

struct WithFactory;

impl TagFactory for WithFactory {
    fn parse(&self, t: &mut TagParser<'_, '_>) -> liquet::Result<Box<dyn Tag>> {
        let (name, value) = t
            .assignment()
            .map_err(|_| t.error("expected 'name = value'"))?;
        Ok(Box::new(With {
            name,
            value,
            body: t.body()?,
        }))
    }
}

impl Tag for With {
    fn render(&self, r: &mut TagRender<'_>) -> liquet::Result<()> {
        let value = r.eval(&self.value);
        let mut scope = Map::new();
        scope.insert(self.name.clone(), value);
        r.context().push(scope);
        r.render_body(&self.body)?;
        r.context().pop()
    }
}

/// `{% shout %}...{% endshout %}`, renders its body in upper case.
struct Shout(Body);

impl Tag for Shout {
    fn render(&self, r: &mut TagRender<'_>) -> liquet::Result<()> {
        let s = r.render_body_to_string(&self.0)?;
        r.write_str(&s.to_uppercase());
        Ok(())
    }
}

struct ShoutFactory;

impl TagFactory for ShoutFactory {
    fn parse(&self, t: &mut TagParser<'_, '_>) -> liquet::Result<Box<dyn Tag>> {
        Ok(Box::new(Shout(t.body()?)))
    }
}

/// Pushes a scope and fails without popping it.
struct Leaky;

impl Tag for Leaky {
    fn render(&self, r: &mut TagRender<'_>) -> liquet::Result<()> {
        r.context().push(Map::new());
        r.context().set("leaked", true);
        Err(Error::custom(ErrorKind::Data, "leaky tag failed"))
    }
}

struct LeakyFactory;

impl TagFactory for LeakyFactory {
    fn parse(&self, _: &mut TagParser<'_, '_>) -> liquet::Result<Box<dyn Tag>> {
        Ok(Box::new(Leaky))
    }
}

/// Counts renders in the registers.
struct Visits;

impl Tag for Visits {
    fn render(&self, r: &mut TagRender<'_>) -> liquet::Result<()> {
        let n = r.context().registers().get("visits").and_then(Value::as_i64).unwrap_or(0) + 1;
        r.context().registers_mut().insert("visits", n);
        r.write_str(&n.to_string());
        Ok(())
    }
}

struct VisitsFactory;

impl TagFactory for VisitsFactory {
    fn parse(&self, _: &mut TagParser<'_, '_>) -> liquet::Result<Box<dyn Tag>> {
        Ok(Box::new(Visits))
    }
}

#[test]
fn custom_block_tag_scopes_variable() {
    let mut engine = Engine::new();
    engine.add_tag("with", WithFactory);
    let result = engine
        .compile("{% with x = 'a' | upcase %}[{{ x }}]{% endwith %}[{{ x }}]")
        .unwrap()
        .render(json!({}))
        .unwrap();
    assert_eq!(result, "[A][]");
}

#[test]
fn custom_tag_parse_error() {
    let mut engine = Engine::new();
    engine.add_tag("with", WithFactory);
    let err = engine.compile("{% with x %}{% endwith %}").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Syntax);
    assert_eq!(err.message(), "expected 'name = value'");
}

#[test]
fn custom_tag_break_reaches_loop() {
    let mut engine = Engine::new();
    engine.add_tag("with", WithFactory);
    let result = engine
        .compile("{% for i in (1..3) %}{% with j = i %}{{ j }}{% if j == 2 %}{% break %}{% endif %}{% endwith %}{% endfor %}")
        .unwrap()
        .render(json!({}))
        .unwrap();
    assert_eq!(result, "12");
}

#[test]
fn custom_tag_break_from_string_body() {
    let mut engine = Engine::new();
    engine.add_tag("shout", ShoutFactory);
    let result = engine
        .compile("{% for i in (1..3) %}{% shout %}{{ i }}a{% if i == 2 %}{% break %}{% endif %}b{% endshout %};{% endfor %}")
        .unwrap()
        .render(json!({}))
        .unwrap();
    assert_eq!(result, "1AB;2A");
}

#[test]
fn scope_depth_restored_after_failing_tag() {
    let mut engine = Engine::new();
    engine.add_tag("leaky", LeakyFactory);
    let mut ctx = Context::new();
    let err = engine
        .compile("{% for i in (1..2) %}{% leaky %}{% endfor %}")
        .unwrap()
        .render_with(&mut ctx)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Data);
    assert_eq!(err.message(), "leaky tag failed");
    assert_eq!(ctx.depth(), 1);
    assert_eq!(ctx.get("leaked"), Value::None);
}

#[test]
fn registers_persist_across_renders() {
    let mut engine = Engine::new();
    engine.add_tag("visits", VisitsFactory);
    let template = engine.compile("{% visits %}").unwrap();
    let mut ctx = Context::new();
    assert_eq!(template.render_with(&mut ctx).unwrap(), "1");
    assert_eq!(template.render_with(&mut ctx).unwrap(), "2");
    assert_eq!(ctx.registers().get("visits"), Some(&Value::Integer(2)));
}

#[test]
fn counters_live_in_registers() {
    let engine = Engine::new();
    let mut ctx = Context::new();
    engine
        .compile("{% increment hits %}{% increment hits %}")
        .unwrap()
        .render_with(&mut ctx)
        .unwrap();
    assert_eq!(ctx.registers().counter("hits"), 2);
    assert_eq!(ctx.get("hits"), Value::None);
}

#[test]
fn offset_continue_across_renders() {
    let engine = Engine::new();
    let template = engine
        .compile("{% for i in items limit: 2 offset: continue %}{{ i }}{% endfor %}")
        .unwrap();
    let mut ctx = Context::from_value(Value::from(json!({ "items": [1, 2, 3] }))).unwrap();
    assert_eq!(template.render_with(&mut ctx).unwrap(), "12");
    assert_eq!(template.render_with(&mut ctx).unwrap(), "3");
    assert_eq!(ctx.registers().loop_offset("i-items"), Some(3));
}

#[test]
fn context_get_paths() {
    let ctx = Context::from_value(Value::from(json!({
        "product": { "images": [{ "src": "a.png" }, { "src": "b.png" }] }
    })))
    .unwrap();
    assert_eq!(ctx.get("product.images.1.src"), Value::from("b.png"));
    assert_eq!(ctx.get("product.images.size"), Value::Integer(2));
    assert_eq!(ctx.get("product.nope.src"), Value::None);
}

#[test]
fn context_pop_underflow() {
    let mut ctx = Context::new();
    ctx.push(Map::new());
    ctx.pop().unwrap();
    let err = ctx.pop().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Structural);
    assert_eq!(err.message(), "context underflow");
}

#[test]
fn context_assign_stops_at_boundary() {
    let mut ctx = Context::new();
    ctx.push_boundary(Map::new());
    ctx.push(Map::new());
    ctx.assign("x", 1);
    ctx.pop().unwrap();
    assert_eq!(ctx.get("x"), Value::Integer(1));
    ctx.pop().unwrap();
    assert_eq!(ctx.get("x"), Value::None);
}
