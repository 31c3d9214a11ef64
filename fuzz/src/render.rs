#![no_main]

use std::collections::BTreeMap;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use serde::Serialize;

#[derive(Debug, Serialize, Arbitrary)]
#[serde(untagged)]
enum Value {
    None,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

fuzz_target!(|data: (&str, Vec<(&str, &str)>, BTreeMap<String, Value>)| {
    let (root, snippets, globals) = data;
    let mut reader = liquet::MemoryReader::new();
    for (name, source) in snippets {
        reader.insert(format!("snippets/{name}.liquid"), source);
    }
    let mut engine = liquet::Engine::new();
    engine.set_reader(reader).set_max_include_depth(8);
    if let Ok(template) = engine.compile(root) {
        let _ = template.render(&globals);
    }
});
