//! Builtin filters.

use std::cmp::Ordering;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::render::lookup_key;
use crate::{Engine, Error, Map, Result, Value};

static HTML: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<script.*?</script>|<style.*?</style>|<!--.*?-->|<[^>]*>").unwrap()
});

/// Registers every builtin filter on the engine.
pub(crate) fn register(engine: &mut Engine) {
    engine.add_filter("upcase", upcase);
    engine.add_filter("downcase", downcase);
    engine.add_filter("capitalize", capitalize);
    engine.add_filter("append", append);
    engine.add_filter("prepend", prepend);
    engine.add_filter("replace", replace);
    engine.add_filter("replace_first", replace_first);
    engine.add_filter("remove", remove);
    engine.add_filter("remove_first", remove_first);
    engine.add_filter("strip", strip);
    engine.add_filter("lstrip", lstrip);
    engine.add_filter("rstrip", rstrip);
    engine.add_filter("strip_newlines", strip_newlines);
    engine.add_filter("newline_to_br", newline_to_br);
    engine.add_filter("strip_html", strip_html);
    engine.add_filter("escape", escape);
    engine.add_filter("truncate", truncate);
    engine.add_filter("truncatewords", truncatewords);
    engine.add_filter("split", split);
    engine.add_filter("join", join);
    engine.add_filter("first", first);
    engine.add_filter("last", last);
    engine.add_filter("size", size);
    engine.add_filter("reverse", reverse);
    engine.add_filter("sort", sort);
    engine.add_filter("uniq", uniq);
    engine.add_filter("compact", compact);
    engine.add_filter("concat", concat);
    engine.add_filter("map", map);
    engine.add_filter("where", where_);
    engine.add_filter("slice", slice);
    engine.add_filter("default", default);
    engine.add_filter("plus", plus);
    engine.add_filter("minus", minus);
    engine.add_filter("times", times);
    engine.add_filter("divided_by", divided_by);
    engine.add_filter("modulo", modulo);
    engine.add_filter("abs", abs);
    engine.add_filter("ceil", ceil);
    engine.add_filter("floor", floor);
    engine.add_filter("round", round);
    engine.add_filter("at_least", at_least);
    engine.add_filter("at_most", at_most);
    engine.add_filter("json", json);
}

////////////////////////////////////////////////////////////////////////////////
// Strings
////////////////////////////////////////////////////////////////////////////////

fn upcase(s: String) -> String {
    s.to_uppercase()
}

fn downcase(s: String) -> String {
    s.to_lowercase()
}

/// Uppercases the first character and lowercases the rest.
fn capitalize(s: String) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => s,
    }
}

fn append(s: String, suffix: String) -> String {
    s + &suffix
}

fn prepend(s: String, prefix: String) -> String {
    prefix + &s
}

fn replace(s: String, from: String, to: Option<String>) -> String {
    s.replace(&from, to.as_deref().unwrap_or(""))
}

fn replace_first(s: String, from: String, to: Option<String>) -> String {
    s.replacen(&from, to.as_deref().unwrap_or(""), 1)
}

fn remove(s: String, pat: String) -> String {
    s.replace(&pat, "")
}

fn remove_first(s: String, pat: String) -> String {
    s.replacen(&pat, "", 1)
}

fn strip(s: String) -> String {
    s.trim().to_owned()
}

fn lstrip(s: String) -> String {
    s.trim_start().to_owned()
}

fn rstrip(s: String) -> String {
    s.trim_end().to_owned()
}

fn strip_newlines(s: String) -> String {
    s.replace(['\r', '\n'], "")
}

fn newline_to_br(s: String) -> String {
    s.replace("\r\n", "\n").replace('\n', "<br />\n")
}

/// Removes tags along with the contents of `script` and `style` elements.
fn strip_html(s: String) -> String {
    HTML.replace_all(&s, "").into_owned()
}

fn escape(s: String) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// Shortens a string to `len` characters, the ellipsis included.
fn truncate(s: String, len: Option<i64>, ellipsis: Option<String>) -> String {
    let len = len.unwrap_or(50).max(0) as usize;
    let ellipsis = ellipsis.unwrap_or_else(|| "...".to_owned());
    if s.chars().count() <= len {
        return s;
    }
    let keep = len.saturating_sub(ellipsis.chars().count());
    s.chars().take(keep).chain(ellipsis.chars()).collect()
}

fn truncatewords(s: String, words: Option<i64>, ellipsis: Option<String>) -> String {
    let words = words.unwrap_or(15).max(1) as usize;
    let parts: Vec<&str> = s.split_whitespace().collect();
    if parts.len() <= words {
        return s;
    }
    parts[..words].join(" ") + ellipsis.as_deref().unwrap_or("...")
}

/// Splits on a separator, an empty separator splits into characters.
fn split(s: String, sep: String) -> Vec<Value> {
    let mut parts: Vec<Value> = if sep.is_empty() {
        s.chars().map(|c| Value::String(c.into())).collect()
    } else {
        s.split(sep.as_str()).map(Value::from).collect()
    };
    while matches!(parts.last(), Some(Value::String(p)) if p.is_empty()) {
        parts.pop();
    }
    parts
}

fn join(list: Vec<Value>, sep: Option<String>) -> String {
    let sep = sep.as_deref().unwrap_or(" ");
    let mut out = String::new();
    for (i, v) in list.iter().enumerate() {
        if i > 0 {
            out.push_str(sep);
        }
        out.push_str(&v.to_string());
    }
    out
}

////////////////////////////////////////////////////////////////////////////////
// Lists
////////////////////////////////////////////////////////////////////////////////

fn first(value: Value) -> Option<Value> {
    match value {
        Value::List(list) => list.into_iter().next(),
        Value::String(s) => s.chars().next().map(|c| Value::String(c.into())),
        _ => None,
    }
}

fn last(value: Value) -> Option<Value> {
    match value {
        Value::List(list) => list.into_iter().next_back(),
        Value::String(s) => s.chars().next_back().map(|c| Value::String(c.into())),
        _ => None,
    }
}

fn size(value: Value) -> i64 {
    match value {
        Value::String(s) => s.chars().count() as i64,
        Value::List(l) => l.len() as i64,
        Value::Map(m) => m.len() as i64,
        _ => 0,
    }
}

fn reverse(value: Value) -> Value {
    match value {
        Value::List(list) => Value::List(list.into_iter().rev().collect()),
        Value::String(s) => Value::String(s.chars().rev().collect()),
        value => value,
    }
}

/// Sorts a list, by a property of each item when a key is given.
fn sort(mut list: Vec<Value>, key: Option<String>) -> Vec<Value> {
    match key {
        Some(key) => list.sort_by(|a, b| order(&lookup_key(a, &key), &lookup_key(b, &key))),
        None => list.sort_by(order),
    }
    list
}

/// Orders values by type first, then within the type: booleans, numbers,
/// strings, lists, maps and finally `nil`.
fn order(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::Integer(a), Value::Integer(b)) => a.cmp(b),
        (Value::Integer(a), Value::Float(b)) => order_int_float(*a, *b),
        (Value::Float(a), Value::Integer(b)) => order_int_float(*b, *a).reverse(),
        (Value::Float(a), Value::Float(b)) => order_floats(*a, *b),
        (Value::String(a), Value::String(b)) => a.cmp(b),
        (Value::List(a), Value::List(b)) => a
            .iter()
            .zip(b)
            .map(|(a, b)| order(a, b))
            .find(|o| o.is_ne())
            .unwrap_or_else(|| a.len().cmp(&b.len())),
        (a, b) => rank(a).cmp(&rank(b)),
    }
}

fn rank(value: &Value) -> u8 {
    match value {
        Value::Bool(_) => 0,
        Value::Integer(_) | Value::Float(_) => 1,
        Value::String(_) => 2,
        Value::List(_) => 3,
        Value::Map(_) => 4,
        Value::None => 5,
    }
}

/// NaN sorts after every other number.
fn order_floats(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}

/// Compares an integer with a float exactly, without rounding the integer.
fn order_int_float(i: i64, f: f64) -> Ordering {
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    if f.is_nan() || f >= LIMIT {
        return Ordering::Less;
    }
    if f < -LIMIT {
        return Ordering::Greater;
    }
    let whole = f.trunc();
    match i.cmp(&(whole as i64)) {
        Ordering::Equal => 0.0_f64.partial_cmp(&(f - whole)).unwrap_or(Ordering::Equal),
        o => o,
    }
}

fn uniq(list: Vec<Value>) -> Vec<Value> {
    let mut out: Vec<Value> = Vec::with_capacity(list.len());
    for v in list {
        if !out.contains(&v) {
            out.push(v);
        }
    }
    out
}

fn compact(list: Vec<Value>, key: Option<String>) -> Vec<Value> {
    list.into_iter()
        .filter(|v| match &key {
            Some(key) => !matches!(*lookup_key(v, key), Value::None),
            None => !matches!(v, Value::None),
        })
        .collect()
}

fn concat(mut list: Vec<Value>, other: Vec<Value>) -> Vec<Value> {
    list.extend(other);
    list
}

/// Plucks a property from each item.
fn map(list: Vec<Value>, key: String) -> Vec<Value> {
    list.iter().map(|v| lookup_key(v, &key).into_owned()).collect()
}

/// Keeps the items whose property equals the value, or is truthy when no
/// value is given.
fn where_(list: Vec<Value>, key: String, value: Option<Value>) -> Vec<Value> {
    list.into_iter()
        .filter(|item| {
            let prop = lookup_key(item, &key);
            match &value {
                Some(value) => *prop == *value,
                None => prop.is_truthy(),
            }
        })
        .collect()
}

/// Takes `len` characters or items starting at `start`, which counts from the
/// end when negative.
fn slice(value: Value, start: i64, len: Option<i64>) -> Value {
    let len = len.unwrap_or(1).max(0) as usize;
    let bounds = |count: usize| -> Option<usize> {
        let start = if start < 0 { count as i64 + start } else { start };
        (0..count as i64).contains(&start).then_some(start as usize)
    };
    match value {
        Value::String(s) => match bounds(s.chars().count()) {
            Some(i) => Value::String(s.chars().skip(i).take(len).collect()),
            None => Value::String(String::new()),
        },
        Value::List(list) => match bounds(list.len()) {
            Some(i) => Value::List(list.into_iter().skip(i).take(len).collect()),
            None => Value::List(Vec::new()),
        },
        _ => Value::None,
    }
}

/// Returns the fallback for `nil`, `false` and empty values. `false` is kept
/// when called with `allow_false: true`.
fn default(value: Value, fallback: Value, opts: Option<Map<String, Value>>) -> Value {
    let allow_false = opts
        .as_ref()
        .and_then(|o| o.get("allow_false"))
        .map_or(false, Value::is_truthy);
    match value {
        Value::Bool(false) if allow_false => value,
        v if !v.is_truthy() || v.is_empty() => fallback,
        v => v,
    }
}

fn json(value: Value) -> String {
    value.to_json()
}

////////////////////////////////////////////////////////////////////////////////
// Math
////////////////////////////////////////////////////////////////////////////////

#[derive(Debug, Clone, Copy, PartialEq)]
enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    /// Non numeric values count as zero.
    fn from_value(v: &Value) -> Self {
        match v {
            Value::Integer(i) => Number::Int(*i),
            Value::Float(f) => Number::Float(*f),
            Value::String(s) => {
                let s = s.trim();
                s.parse()
                    .map(Number::Int)
                    .or_else(|_| s.parse().map(Number::Float))
                    .unwrap_or(Number::Int(0))
            }
            _ => Number::Int(0),
        }
    }

    fn to_f64(self) -> f64 {
        match self {
            Number::Int(i) => i as f64,
            Number::Float(f) => f,
        }
    }

    fn is_zero(self) -> bool {
        self.to_f64() == 0.0
    }
}

impl From<Number> for Value {
    fn from(n: Number) -> Self {
        match n {
            Number::Int(i) => Value::Integer(i),
            Number::Float(f) => Value::Float(f),
        }
    }
}

fn arith(
    a: &Value,
    b: &Value,
    int: fn(i64, i64) -> Option<i64>,
    float: fn(f64, f64) -> f64,
) -> Value {
    let (a, b) = (Number::from_value(a), Number::from_value(b));
    if let (Number::Int(x), Number::Int(y)) = (a, b) {
        if let Some(r) = int(x, y) {
            return Value::Integer(r);
        }
    }
    Value::Float(float(a.to_f64(), b.to_f64()))
}

fn plus(a: Value, b: Value) -> Value {
    arith(&a, &b, i64::checked_add, |x, y| x + y)
}

fn minus(a: Value, b: Value) -> Value {
    arith(&a, &b, i64::checked_sub, |x, y| x - y)
}

fn times(a: Value, b: Value) -> Value {
    arith(&a, &b, i64::checked_mul, |x, y| x * y)
}

/// Integer division floors, as in Ruby.
fn divided_by(a: Value, b: Value) -> Result<Value> {
    if Number::from_value(&b).is_zero() {
        return Err(Error::data("divided by 0"));
    }
    Ok(arith(
        &a,
        &b,
        |x, y| {
            let q = x.checked_div(y)?;
            Some(if x % y != 0 && (x < 0) != (y < 0) { q - 1 } else { q })
        },
        |x, y| x / y,
    ))
}

/// The remainder takes the sign of the divisor, as in Ruby.
fn modulo(a: Value, b: Value) -> Result<Value> {
    if Number::from_value(&b).is_zero() {
        return Err(Error::data("divided by 0"));
    }
    Ok(arith(
        &a,
        &b,
        |x, y| {
            let r = x.checked_rem(y)?;
            Some(if r != 0 && (r < 0) != (y < 0) { r + y } else { r })
        },
        |x, y| {
            let r = x % y;
            if r != 0.0 && (r < 0.0) != (y < 0.0) {
                r + y
            } else {
                r
            }
        },
    ))
}

fn abs(value: Value) -> Value {
    match Number::from_value(&value) {
        Number::Int(i) => Value::Integer(i.saturating_abs()),
        Number::Float(f) => Value::Float(f.abs()),
    }
}

fn ceil(value: Value) -> i64 {
    Number::from_value(&value).to_f64().ceil() as i64
}

fn floor(value: Value) -> i64 {
    Number::from_value(&value).to_f64().floor() as i64
}

fn round(value: Value, digits: Option<i64>) -> Value {
    let n = Number::from_value(&value).to_f64();
    match digits.unwrap_or(0) {
        d if d <= 0 => Value::Integer(n.round() as i64),
        d => {
            let factor = 10f64.powi(d.min(15) as i32);
            Value::Float((n * factor).round() / factor)
        }
    }
}

fn at_least(value: Value, min: Value) -> Value {
    let (a, b) = (Number::from_value(&value), Number::from_value(&min));
    let n = if a.to_f64() < b.to_f64() { b } else { a };
    n.into()
}

fn at_most(value: Value, max: Value) -> Value {
    let (a, b) = (Number::from_value(&value), Number::from_value(&max));
    let n = if a.to_f64() > b.to_f64() { b } else { a };
    n.into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(items: &[&str]) -> Vec<Value> {
        items.iter().map(|s| Value::from(*s)).collect()
    }

    #[test]
    fn truncate_counts_ellipsis() {
        assert_eq!(truncate("Ground control".into(), Some(8), None), "Groun...");
        assert_eq!(truncate("short".into(), Some(8), None), "short");
        assert_eq!(truncate("Ground".into(), Some(3), Some("".into())), "Gro");
    }

    #[test]
    fn truncatewords_default_ellipsis() {
        assert_eq!(
            truncatewords("one two three four".into(), Some(2), None),
            "one two..."
        );
    }

    #[test]
    fn split_drops_trailing_empty() {
        assert_eq!(split("a,b,,".into(), ",".into()), list(&["a", "b"]));
        assert_eq!(split("ab".into(), "".into()), list(&["a", "b"]));
    }

    #[test]
    fn strip_html_removes_scripts() {
        assert_eq!(
            strip_html("<p>Hi<script>x()</script> <b>there</b></p>".into()),
            "Hi there"
        );
    }

    #[test]
    fn divided_by_floors() {
        assert_eq!(divided_by(7.into(), 2.into()).unwrap(), Value::Integer(3));
        assert_eq!(divided_by((-7).into(), 2.into()).unwrap(), Value::Integer(-4));
        assert_eq!(divided_by(7.into(), 2.0.into()).unwrap(), Value::Float(3.5));
        assert!(divided_by(1.into(), 0.into()).is_err());
    }

    #[test]
    fn modulo_sign_of_divisor() {
        assert_eq!(modulo((-7).into(), 3.into()).unwrap(), Value::Integer(2));
        assert_eq!(modulo(7.into(), (-3).into()).unwrap(), Value::Integer(-2));
    }

    #[test]
    fn plus_numeric_strings() {
        assert_eq!(plus("2".into(), 3.into()), Value::Integer(5));
        assert_eq!(plus("1.5".into(), 1.into()), Value::Float(2.5));
    }

    #[test]
    fn slice_negative_start() {
        assert_eq!(slice("hello".into(), -3, Some(2)), Value::from("ll"));
        assert_eq!(
            slice(Value::from(list(&["a", "b", "c"])), 1, None),
            Value::from(list(&["b"]))
        );
    }

    #[test]
    fn default_allow_false() {
        let opts: Map<String, Value> = [("allow_false".to_owned(), Value::Bool(true))].into();
        assert_eq!(default(Value::Bool(false), "x".into(), None), Value::from("x"));
        assert_eq!(default(Value::Bool(false), "x".into(), Some(opts)), Value::Bool(false));
        assert_eq!(default("".into(), "x".into(), None), Value::from("x"));
    }

    #[test]
    fn sort_nil_last() {
        let sorted = sort(vec![Value::None, 3.into(), 1.into()], None);
        assert_eq!(sorted, vec![Value::Integer(1), Value::Integer(3), Value::None]);
    }

    #[test]
    fn sort_mixed_types() {
        let items: Vec<Value> = (0..64)
            .map(|i| match i % 4 {
                0 => Value::Integer(64 - i),
                1 => Value::from(format!("s{}", 64 - i)),
                2 => Value::Float(f64::from(i as i32) / 2.0),
                _ => Value::None,
            })
            .collect();
        let sorted = sort(items, None);
        assert_eq!(sorted.len(), 64);
        let ranks: Vec<u8> = sorted.iter().map(rank).collect();
        assert!(ranks.windows(2).all(|w| w[0] <= w[1]));
        assert!(sorted.windows(2).all(|w| order(&w[0], &w[1]).is_le()));
        assert_eq!(sorted[0], Value::Float(1.0));
        assert_eq!(sorted[63], Value::None);
    }

    #[test]
    fn sort_integers_against_floats() {
        let items = vec![2.5.into(), 2.into(), (-1.5).into(), (-1).into(), f64::NAN.into()];
        let sorted = sort(items, None);
        assert_eq!(
            &sorted[..4],
            &[
                Value::Float(-1.5),
                Value::Integer(-1),
                Value::Integer(2),
                Value::Float(2.5)
            ]
        );
        assert!(matches!(sorted[4], Value::Float(f) if f.is_nan()));
    }

    #[test]
    fn capitalize_lowers_rest() {
        assert_eq!(capitalize("hELLO world".into()), "Hello world");
    }
}
