use std::borrow::Cow;
use std::cmp::Ordering;

use tracing::debug;

use crate::render::core::Renderer;
use crate::types::ast::{BaseExpr, Comparison, Condition, Expr, FilterCall, Member, Op, Var};
use crate::{Context, Map, Value};

/// The longest range that is turned into a list outside of a `for` loop.
const MAX_RANGE_LEN: i128 = 100_000;

impl Renderer<'_> {
    /// Evaluates an expression and applies its filters.
    ///
    /// Filters never abort a render: an unknown filter passes the value
    /// through and a failing filter produces `nil`.
    pub(crate) fn eval_expr(&self, expr: &Expr, ctx: &Context) -> Value {
        let mut value = self.eval_base(&expr.base, ctx);
        for call in &expr.filters {
            value = self.apply_filter(call, value, ctx);
        }
        value
    }

    fn apply_filter(&self, call: &FilterCall, value: Value, ctx: &Context) -> Value {
        let Some(filter) = self.engine.filters.get(&call.name) else {
            debug!(filter = %call.name, "unknown filter");
            return value;
        };

        let mut args: Vec<Value> = call.args.iter().map(|a| self.eval_base(a, ctx)).collect();
        if !call.kwargs.is_empty() {
            let kwargs: Map<String, Value> = call
                .kwargs
                .iter()
                .map(|(k, v)| (k.clone(), self.eval_base(v, ctx)))
                .collect();
            args.push(Value::Map(kwargs));
        }

        match filter(value, args) {
            Ok(value) => value,
            Err(err) => {
                debug!(filter = %call.name, error = %err, "filter failed");
                Value::None
            }
        }
    }

    pub(crate) fn eval_base(&self, base: &BaseExpr, ctx: &Context) -> Value {
        match base {
            BaseExpr::Var(var) => self.eval_var(var, ctx).into_owned(),
            BaseExpr::Literal(value) => value.clone(),
            BaseExpr::Range(start, end) => match self.eval_bounds(start, end, ctx) {
                Some((m, n)) if i128::from(n) - i128::from(m) < MAX_RANGE_LEN => {
                    (m..=n).collect()
                }
                Some((m, n)) => {
                    debug!(start = m, end = n, "range too long to build a list");
                    Value::List(Vec::new())
                }
                None => Value::List(Vec::new()),
            },
            BaseExpr::Empty | BaseExpr::Blank => Value::String(String::new()),
        }
    }

    /// Evaluates the bounds of `(start..end)`, `None` when either bound is
    /// not a number or the range is empty.
    pub(crate) fn eval_bounds(
        &self,
        start: &BaseExpr,
        end: &BaseExpr,
        ctx: &Context,
    ) -> Option<(i64, i64)> {
        let m = self.eval_base(start, ctx).as_i64()?;
        let n = self.eval_base(end, ctx).as_i64()?;
        (m <= n).then_some((m, n))
    }

    fn eval_var<'c>(&self, var: &Var, ctx: &'c Context) -> Cow<'c, Value> {
        let mut path = var.path.iter();
        let first = match path.next() {
            Some(Member::Key(name)) => ctx.find(name),
            // `[expr]` looks up the variable named by the expression.
            Some(Member::Index(index)) => ctx.find(&self.eval_base(index, ctx).to_string()),
            None => None,
        };
        let Some(first) = first else {
            return Cow::Owned(Value::None);
        };

        let mut value = Cow::Borrowed(first);
        for member in path {
            value = match member {
                Member::Key(key) => project(value, |v| lookup_key(v, key)),
                Member::Index(index) => {
                    let index = self.eval_base(index, ctx);
                    project(value, |v| lookup_index(v, &index))
                }
            };
        }
        value
    }

    pub(crate) fn eval_cond(&self, cond: &Condition, ctx: &Context) -> bool {
        match cond {
            Condition::Test(cmp) => self.eval_comparison(cmp, ctx),
            Condition::And(lhs, rhs) => self.eval_cond(lhs, ctx) && self.eval_cond(rhs, ctx),
            Condition::Or(lhs, rhs) => self.eval_cond(lhs, ctx) || self.eval_cond(rhs, ctx),
        }
    }

    fn eval_comparison(&self, cmp: &Comparison, ctx: &Context) -> bool {
        let Some((op, rhs)) = &cmp.rhs else {
            return self.eval_base(&cmp.lhs, ctx).is_truthy();
        };

        // `x == empty` and `x == blank` test `x` rather than compare it.
        if matches!(op, Op::Eq | Op::Ne) {
            let test = match (keyword(&cmp.lhs), keyword(rhs)) {
                (_, Some(test)) => Some((test, &cmp.lhs)),
                (Some(test), None) => Some((test, rhs)),
                (None, None) => None,
            };
            if let Some((test, other)) = test {
                return test(&self.eval_base(other, ctx)) == (*op == Op::Eq);
            }
        }

        let lhs = self.eval_base(&cmp.lhs, ctx);
        let rhs = self.eval_base(rhs, ctx);
        compare(&lhs, *op, &rhs)
    }
}

fn keyword(base: &BaseExpr) -> Option<fn(&Value) -> bool> {
    match base {
        BaseExpr::Empty => Some(Value::is_empty as fn(&Value) -> bool),
        BaseExpr::Blank => Some(Value::is_blank as fn(&Value) -> bool),
        _ => None,
    }
}

/// Applies a lookup to a value that is either borrowed from the context or
/// already owned, only cloning the result in the owned case.
fn project<'c, F>(value: Cow<'c, Value>, f: F) -> Cow<'c, Value>
where
    F: for<'v> Fn(&'v Value) -> Cow<'v, Value>,
{
    match value {
        Cow::Borrowed(v) => f(v),
        Cow::Owned(v) => Cow::Owned(f(&v).into_owned()),
    }
}

/// Looks up a map key, or one of the `size`, `first` and `last` shortcuts.
pub(crate) fn lookup_key<'a>(value: &'a Value, key: &str) -> Cow<'a, Value> {
    if let Value::Map(map) = value {
        if let Some(v) = map.get(key) {
            return Cow::Borrowed(v);
        }
    }
    match (value, key) {
        (Value::List(list), "size") => Cow::Owned(list.len().into()),
        (Value::Map(map), "size") => Cow::Owned(map.len().into()),
        (Value::String(s), "size") => Cow::Owned(s.chars().count().into()),
        (Value::List(list), "first") => list.first().map_or(nil(), Cow::Borrowed),
        (Value::List(list), "last") => list.last().map_or(nil(), Cow::Borrowed),
        (Value::String(s), "first") => s.chars().next().map_or(nil(), |c| Cow::Owned(c.to_string().into())),
        (Value::String(s), "last") => s.chars().last().map_or(nil(), |c| Cow::Owned(c.to_string().into())),
        _ => nil(),
    }
}

/// Looks up a list index, negative indices counting from the end, or a map
/// key given as a string.
pub(crate) fn lookup_index<'a>(value: &'a Value, index: &Value) -> Cow<'a, Value> {
    match (value, index) {
        (Value::List(list), Value::Integer(i)) => {
            let i = if *i < 0 { list.len() as i64 + i } else { *i };
            usize::try_from(i)
                .ok()
                .and_then(|i| list.get(i))
                .map_or(nil(), Cow::Borrowed)
        }
        (_, Value::String(key)) => lookup_key(value, key),
        (Value::Map(map), index) => map.get(&index.to_string()).map_or(nil(), Cow::Borrowed),
        _ => nil(),
    }
}

fn nil<'a>() -> Cow<'a, Value> {
    Cow::Owned(Value::None)
}

pub(crate) fn compare(lhs: &Value, op: Op, rhs: &Value) -> bool {
    match op {
        Op::Eq => lhs == rhs,
        Op::Ne => lhs != rhs,
        Op::Contains => contains(lhs, rhs),
        Op::Lt => cmp(lhs, rhs) == Some(Ordering::Less),
        Op::Gt => cmp(lhs, rhs) == Some(Ordering::Greater),
        Op::Le => matches!(cmp(lhs, rhs), Some(Ordering::Less | Ordering::Equal)),
        Op::Ge => matches!(cmp(lhs, rhs), Some(Ordering::Greater | Ordering::Equal)),
    }
}

/// Orders numbers numerically and strings lexicographically, other
/// combinations are unordered.
fn cmp(lhs: &Value, rhs: &Value) -> Option<Ordering> {
    match (lhs, rhs) {
        (Value::Integer(a), Value::Integer(b)) => Some(a.cmp(b)),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Integer(_) | Value::Float(_), Value::Integer(_) | Value::Float(_)) => {
            lhs.as_f64()?.partial_cmp(&rhs.as_f64()?)
        }
        _ => None,
    }
}

fn contains(haystack: &Value, needle: &Value) -> bool {
    match haystack {
        Value::String(s) => match needle {
            Value::None => false,
            needle => s.contains(&needle.to_string()),
        },
        Value::List(list) => list.contains(needle),
        Value::Map(map) => needle.as_str().map_or(false, |k| map.contains_key(k)),
        _ => false,
    }
}
