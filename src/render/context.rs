use std::collections::HashMap;

use crate::render::value::{lookup_index, lookup_key};
use crate::{Error, Map, Result, Value};

/// The variables visible to a render, kept as a stack of scopes.
///
/// Lookups search from the innermost scope outwards. Writes with
/// [`set`][Context::set] go to the innermost scope, while
/// [`assign`][Context::assign] writes to the nearest template boundary, which
/// is how `{% assign %}` outlives the block it appears in.
///
/// The base scope holds the render globals and can never be popped.
#[derive(Debug, Clone)]
pub struct Context {
    scopes: Vec<Scope>,
    registers: Registers,
}

#[derive(Debug, Clone, Default)]
struct Scope {
    vars: Map<String, Value>,
    /// Set for the base scope and for the scope of each `render`ed template.
    boundary: bool,
}

/// State shared by every scope of a render and by the renders of any nested
/// templates.
///
/// Unlike variables, registers are never pushed or popped.
#[derive(Debug, Clone, Default)]
pub struct Registers {
    /// The position each `offset: continue` loop reached, keyed by loop name.
    pub(crate) offsets: HashMap<String, usize>,
    /// `increment` and `decrement` counters.
    pub(crate) counters: HashMap<String, i64>,
    /// The next position of each `cycle` group.
    pub(crate) cycles: HashMap<String, usize>,
    /// The names of the templates currently being rendered, outermost first.
    pub(crate) includes: Vec<String>,
    values: Map<String, Value>,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    /// Returns a context with an empty base scope.
    pub fn new() -> Self {
        Self::with_globals(Map::new())
    }

    /// Returns a context with the given variables in its base scope.
    pub fn with_globals(globals: Map<String, Value>) -> Self {
        Self {
            scopes: vec![Scope {
                vars: globals,
                boundary: true,
            }],
            registers: Registers::default(),
        }
    }

    /// Returns a context with the given map as its base scope.
    ///
    /// `nil` is treated as an empty map, any other non-map value is an error.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Map(globals) => Ok(Self::with_globals(globals)),
            Value::None => Ok(Self::new()),
            value => Err(Error::data(format!(
                "expected map for render data, found {}",
                value.human()
            ))),
        }
    }

    /// Returns the number of scopes, including the base scope.
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Pushes a new scope seeded with the given variables.
    pub fn push(&mut self, initial: Map<String, Value>) {
        self.scopes.push(Scope {
            vars: initial,
            boundary: false,
        });
    }

    /// Pushes a new scope that `assign` will not write through.
    pub fn push_boundary(&mut self, initial: Map<String, Value>) {
        self.scopes.push(Scope {
            vars: initial,
            boundary: true,
        });
    }

    /// Discards the innermost scope.
    ///
    /// Fails if only the base scope is left, which means a push and a pop
    /// were mismatched.
    pub fn pop(&mut self) -> Result<()> {
        if self.scopes.len() <= 1 {
            return Err(Error::structural("context underflow"));
        }
        self.scopes.pop();
        Ok(())
    }

    /// Runs `f` with a new scope pushed.
    ///
    /// The scope, and any scope `f` pushed without popping, is discarded when
    /// `f` returns, whether it succeeded or not.
    pub fn scoped<T, F>(&mut self, initial: Map<String, Value>, f: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        let depth = self.depth();
        self.push(initial);
        let result = f(self);
        self.truncate(depth);
        result
    }

    /// Like [`scoped`][Context::scoped] but the new scope is a boundary.
    pub fn isolated<T, F>(&mut self, initial: Map<String, Value>, f: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        let depth = self.depth();
        self.push_boundary(initial);
        let result = f(self);
        self.truncate(depth);
        result
    }

    /// Discards scopes until only `depth` are left.
    pub(crate) fn truncate(&mut self, depth: usize) {
        self.scopes.truncate(depth.max(1));
    }

    /// Looks up a variable by name, innermost scope first.
    pub fn find(&self, name: &str) -> Option<&Value> {
        self.scopes.iter().rev().find_map(|scope| scope.vars.get(name))
    }

    /// Resolves a dotted path such as `product.images.0.src`.
    ///
    /// Any missing segment resolves to `nil`.
    pub fn get(&self, path: &str) -> Value {
        let mut segments = path.split('.');
        let Some(mut value) = segments.next().and_then(|name| self.find(name)).cloned() else {
            return Value::None;
        };
        for segment in segments {
            value = match segment.parse::<i64>() {
                Ok(i) => lookup_index(&value, &Value::Integer(i)).into_owned(),
                Err(_) => lookup_key(&value, segment).into_owned(),
            };
        }
        value
    }

    /// Sets a variable in the innermost scope.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.vars.insert(name.into(), value.into());
        }
    }

    /// Sets a variable in the nearest boundary scope.
    pub fn assign(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let i = self.scopes.iter().rposition(|s| s.boundary).unwrap_or(0);
        self.scopes[i].vars.insert(name.into(), value.into());
    }

    /// Returns the variables of the base scope.
    pub fn globals(&self) -> &Map<String, Value> {
        &self.scopes[0].vars
    }

    pub fn globals_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.scopes[0].vars
    }

    pub fn registers(&self) -> &Registers {
        &self.registers
    }

    pub fn registers_mut(&mut self) -> &mut Registers {
        &mut self.registers
    }
}

impl Registers {
    /// Returns a value stored by a custom tag.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.values.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    /// Returns where the next `offset: continue` run of the named loop
    /// starts.
    pub fn loop_offset(&self, name: &str) -> Option<usize> {
        self.offsets.get(name).copied()
    }

    /// Returns the current value of an `increment`/`decrement` counter.
    pub fn counter(&self, name: &str) -> i64 {
        self.counters.get(name).copied().unwrap_or(0)
    }

    /// Returns the names of the templates currently being rendered.
    pub fn include_stack(&self) -> &[String] {
        &self.includes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn context_find_innermost_first() {
        let mut ctx = Context::with_globals(map(&[("a", 1.into()), ("b", 2.into())]));
        ctx.push(map(&[("a", 3.into())]));
        assert_eq!(ctx.find("a"), Some(&Value::Integer(3)));
        assert_eq!(ctx.find("b"), Some(&Value::Integer(2)));
        assert_eq!(ctx.find("c"), None);
        ctx.pop().unwrap();
        assert_eq!(ctx.find("a"), Some(&Value::Integer(1)));
    }

    #[test]
    fn context_pop_underflow() {
        let mut ctx = Context::new();
        let err = ctx.pop().unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Structural);
        assert_eq!(err.message(), "context underflow");
    }

    #[test]
    fn context_set_writes_innermost() {
        let mut ctx = Context::new();
        ctx.push(Map::new());
        ctx.set("x", "inner");
        ctx.pop().unwrap();
        assert_eq!(ctx.find("x"), None);
    }

    #[test]
    fn context_assign_writes_through_to_boundary() {
        let mut ctx = Context::new();
        ctx.push(Map::new());
        ctx.push(Map::new());
        ctx.assign("x", 1);
        ctx.truncate(1);
        assert_eq!(ctx.find("x"), Some(&Value::Integer(1)));

        ctx.push_boundary(Map::new());
        ctx.assign("y", 2);
        ctx.pop().unwrap();
        assert_eq!(ctx.find("y"), None);
    }

    #[test]
    fn context_get_dotted_path() {
        let value = Value::from(serde_json::json!({
            "product": { "images": [{ "src": "a.png" }, { "src": "b.png" }] }
        }));
        let ctx = Context::from_value(value).unwrap();
        assert_eq!(ctx.get("product.images.1.src"), Value::from("b.png"));
        assert_eq!(ctx.get("product.images.size"), Value::Integer(2));
        assert_eq!(ctx.get("product.missing.src"), Value::None);
        assert_eq!(ctx.get("missing"), Value::None);
    }

    #[test]
    fn context_scoped_releases_on_error() {
        let mut ctx = Context::new();
        let result: Result<()> = ctx.scoped(Map::new(), |ctx| {
            ctx.push(Map::new());
            ctx.push(Map::new());
            Err(Error::data("boom"))
        });
        assert!(result.is_err());
        assert_eq!(ctx.depth(), 1);
    }

    #[test]
    fn context_from_value_rejects_scalars() {
        let err = Context::from_value(Value::Integer(1)).unwrap_err();
        assert_eq!(err.message(), "expected map for render data, found integer");
    }
}
