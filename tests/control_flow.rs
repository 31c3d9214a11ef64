use liquet::Engine;
use serde_json::json;

fn render(source: &str, data: serde_json::Value) -> String {
    Engine::new().compile(source).unwrap().render(data).unwrap()
}

#[test]
fn if_elsif_else() {
    let source = "{% if n > 2 %}big{% elsif n == 2 %}two{% else %}small{% endif %}";
    assert_eq!(render(source, json!({ "n": 3 })), "big");
    assert_eq!(render(source, json!({ "n": 2 })), "two");
    assert_eq!(render(source, json!({ "n": 1 })), "small");
}

#[test]
fn if_and_or() {
    let source = "{% if a and b or c %}yes{% else %}no{% endif %}";
    assert_eq!(render(source, json!({ "a": true, "b": false, "c": true })), "yes");
    assert_eq!(render(source, json!({ "a": true, "b": false, "c": false })), "no");
}

#[test]
fn if_truthiness() {
    let source = "{% if v %}t{% else %}f{% endif %}";
    assert_eq!(render(source, json!({ "v": 0 })), "t");
    assert_eq!(render(source, json!({ "v": "" })), "t");
    assert_eq!(render(source, json!({ "v": false })), "f");
    assert_eq!(render(source, json!({})), "f");
}

#[test]
fn if_contains() {
    let source = "{% if tags contains 'sale' %}sale{% endif %}{% if title contains 'at' %}!{% endif %}";
    assert_eq!(
        render(source, json!({ "tags": ["new", "sale"], "title": "Hat" })),
        "sale!"
    );
}

#[test]
fn if_empty_and_blank() {
    let source = "{% if a == empty %}e{% endif %}{% if b == blank %}b{% endif %}{% if c != empty %}c{% endif %}";
    assert_eq!(render(source, json!({ "a": [], "b": "  ", "c": "x" })), "ebc");
}

#[test]
fn unless_negates_first_branch_only() {
    let source = "{% unless n > 1 %}small{% elsif n > 5 %}huge{% else %}big{% endunless %}";
    assert_eq!(render(source, json!({ "n": 0 })), "small");
    assert_eq!(render(source, json!({ "n": 9 })), "huge");
    assert_eq!(render(source, json!({ "n": 3 })), "big");
}

#[test]
fn case_when() {
    let source = "{% case x %}{% when 'a', 'b' %}A{% when 'c' or 'd' %}C{% else %}?{% endcase %}";
    assert_eq!(render(source, json!({ "x": "a" })), "A");
    assert_eq!(render(source, json!({ "x": "b" })), "A");
    assert_eq!(render(source, json!({ "x": "d" })), "C");
    assert_eq!(render(source, json!({ "x": "z" })), "?");
}

#[test]
fn case_first_match_only() {
    let source = "{% case x %}{% when 1 %}A{% when 1 %}B{% endcase %}";
    assert_eq!(render(source, json!({ "x": 1 })), "A");
}

#[test]
fn for_break() {
    let source = "{% for i in (1..5) %}{% if i == 3 %}{% break %}{% endif %}{{ i }}{% endfor %}";
    assert_eq!(render(source, json!({})), "12");
}

#[test]
fn for_continue() {
    let source = "{% for i in (1..5) %}{% if i == 3 %}{% continue %}{% endif %}{{ i }}{% endfor %}";
    assert_eq!(render(source, json!({})), "1245");
}

#[test]
fn for_break_only_leaves_inner_loop() {
    let source = "{% for i in (1..2) %}{% for j in (1..3) %}{% if j == 2 %}{% break %}{% endif %}{{ i }}{{ j }} {% endfor %}{% endfor %}";
    assert_eq!(render(source, json!({})), "11 21 ");
}

#[test]
fn for_else() {
    let source = "{% for i in items %}{{ i }}{% else %}none{% endfor %}";
    assert_eq!(render(source, json!({ "items": [] })), "none");
    assert_eq!(render(source, json!({})), "none");
}

#[test]
fn for_limit_offset_reversed() {
    let source = "{% for i in items limit: 2 offset: 1 %}{{ i }}{% endfor %}|{% for i in items reversed %}{{ i }}{% endfor %}";
    assert_eq!(render(source, json!({ "items": [1, 2, 3, 4] })), "23|4321");
}

#[test]
fn for_offset_continue() {
    let source = "{% for i in items limit: 2 %}{{ i }}{% endfor %}|{% for i in items offset: continue limit: 2 %}{{ i }}{% endfor %}|{% for i in items offset: continue %}{{ i }}{% endfor %}";
    assert_eq!(render(source, json!({ "items": [0, 1, 2, 3, 4] })), "01|23|4");
}

#[test]
fn for_forloop() {
    let source = "{% for i in items %}{{ forloop.index }}/{{ forloop.rindex0 }}{% if forloop.first %}F{% endif %}{% if forloop.last %}L{% endif %} {% endfor %}";
    assert_eq!(render(source, json!({ "items": ["a", "b", "c"] })), "1/2F 2/1 3/0L ");
}

#[test]
fn for_forloop_index0_and_length() {
    let source = "{% for i in items %}{{ forloop.index0 }}/{{ forloop.length }} {% endfor %}";
    assert_eq!(render(source, json!({ "items": ["a", "b", "c"] })), "0/3 1/3 2/3 ");
}

#[test]
fn for_forloop_length_after_limit() {
    let source = "{% for i in (1..10) offset: 2 limit: 3 %}{{ i }}:{{ forloop.index0 }}/{{ forloop.length }} {% endfor %}";
    assert_eq!(render(source, json!({})), "3:0/3 4:1/3 5:2/3 ");
}

#[test]
fn for_parentloop() {
    let source = "{% for i in (1..2) %}{% for j in (1..2) %}{{ forloop.parentloop.index }}{{ forloop.index }} {% endfor %}{% endfor %}";
    assert_eq!(render(source, json!({})), "11 12 21 22 ");
}

#[test]
fn for_parent() {
    let source = "{% for i in (1..2) %}{% for j in (1..3) %}{{ forloop.parent.index }}.{{ forloop.index }}/{{ forloop.parent.length }} {% endfor %}{% endfor %}";
    assert_eq!(render(source, json!({})), "1.1/2 1.2/2 1.3/2 2.1/2 2.2/2 2.3/2 ");
}

#[test]
fn for_range_is_not_built_up_front() {
    let data = json!({ "n": 10_000_000_000_i64 });
    assert_eq!(render("{% for i in (1..n) limit: 1 %}{{ i }}{% endfor %}", data.clone()), "1");
    assert_eq!(
        render("{% for i in (1..n) offset: 3 limit: 2 reversed %}{{ i }}{% endfor %}", data.clone()),
        "54"
    );
    assert_eq!(render("{% for i in (n..n) %}{{ i }}{% endfor %}", data), "10000000000");
}

#[test]
fn range_outside_loop_is_capped() {
    assert_eq!(render("{{ (1..4) | join: ',' }}", json!({})), "1,2,3,4");
    assert_eq!(render("{{ (1..n) | size }}", json!({ "n": 10_000_000_000_i64 })), "0");
}

#[test]
fn for_over_map_yields_pairs() {
    let source = "{% for pair in m %}{{ pair[0] }}={{ pair[1] }};{% endfor %}";
    assert_eq!(render(source, json!({ "m": { "a": 1, "b": 2 } })), "a=1;b=2;");
}

#[test]
fn for_loop_variable_does_not_leak() {
    let source = "{% for i in (1..2) %}{% endfor %}[{{ i }}][{{ forloop }}]";
    assert_eq!(render(source, json!({})), "[][]");
}
