use crate::render::core::{Flow, Renderer};
use crate::types::ast::{BaseExpr, ForLoop, Offset};
use crate::{Context, Map, Result, Value};

/// The position of a loop iteration, exposed to templates as `forloop`.
pub(crate) struct LoopState<'a> {
    pub name: &'a str,
    pub index0: usize,
    pub length: usize,
}

impl LoopState<'_> {
    /// Builds the `forloop` map, `parent` being the enclosing loop's
    /// `forloop` at the time this loop started.
    pub fn to_value(&self, parent: &Value) -> Value {
        let mut map = Map::new();
        map.insert("name".into(), self.name.into());
        map.insert("length".into(), self.length.into());
        map.insert("index".into(), (self.index0 + 1).into());
        map.insert("index0".into(), self.index0.into());
        map.insert("rindex".into(), (self.length - self.index0).into());
        map.insert("rindex0".into(), (self.length - self.index0 - 1).into());
        map.insert("first".into(), (self.index0 == 0).into());
        map.insert("last".into(), (self.index0 + 1 == self.length).into());
        map.insert("parent".into(), parent.clone());
        map.insert("parentloop".into(), parent.clone());
        Value::Map(map)
    }
}

impl Renderer<'_> {
    pub(crate) fn render_for(
        &self,
        l: &ForLoop,
        ctx: &mut Context,
        out: &mut String,
    ) -> Result<Flow> {
        let from = match &l.offset {
            Some(Offset::Continue) => ctx.registers().loop_offset(&l.name).unwrap_or(0),
            Some(Offset::Expr(offset)) => to_count(&self.eval_base(offset, ctx)),
            None => 0,
        };
        let limit = match &l.limit {
            Some(limit) => to_count(&self.eval_base(limit, ctx)),
            None => usize::MAX,
        };

        let (items, length) = match &l.iterable {
            BaseExpr::Range(start, end) => {
                let window = self
                    .eval_bounds(start, end, ctx)
                    .and_then(|(m, n)| range_window(m, n, from, limit));
                match window {
                    Some((first, last)) => {
                        let length = usize::try_from(i128::from(last) - i128::from(first) + 1)
                            .unwrap_or(usize::MAX);
                        let range = (first..=last).map(Value::Integer);
                        (ordered(range, l.reversed), length)
                    }
                    None => (ordered(std::iter::empty(), false), 0),
                }
            }
            iterable => {
                let items: Vec<Value> = into_items(self.eval_base(iterable, ctx))
                    .into_iter()
                    .skip(from)
                    .take(limit)
                    .collect();
                let length = items.len();
                (ordered(items.into_iter(), l.reversed), length)
            }
        };
        ctx.registers_mut()
            .offsets
            .insert(l.name.clone(), from.saturating_add(length));

        if length == 0 {
            return match &l.otherwise {
                Some(body) => self.render_nodes(body, ctx, out),
                None => Ok(Flow::Normal),
            };
        }

        let parent = ctx.find("forloop").cloned().unwrap_or_default();
        ctx.scoped(Map::new(), |ctx| {
            for (index0, item) in items.enumerate() {
                let state = LoopState {
                    name: &l.name,
                    index0,
                    length,
                };
                ctx.set(l.var.as_str(), item);
                ctx.set("forloop", state.to_value(&parent));
                if self.render_nodes(&l.body, ctx, out)? == Flow::Break {
                    break;
                }
            }
            Ok(Flow::Normal)
        })
    }
}

/// Lists iterate their items, maps iterate `[key, value]` pairs and any
/// other non-empty value is a single item.
pub(crate) fn into_items(value: Value) -> Vec<Value> {
    match value {
        Value::List(list) => list,
        Value::Map(map) => map
            .into_iter()
            .map(|(k, v)| Value::List(vec![Value::String(k), v]))
            .collect(),
        Value::None => Vec::new(),
        Value::String(s) if s.is_empty() => Vec::new(),
        value => vec![value],
    }
}

fn ordered<I>(items: I, reversed: bool) -> Box<dyn Iterator<Item = Value>>
where
    I: DoubleEndedIterator<Item = Value> + 'static,
{
    if reversed {
        Box::new(items.rev())
    } else {
        Box::new(items)
    }
}

/// Applies `offset` and `limit` to `m..=n` without building the items,
/// returning the bounds that remain.
fn range_window(m: i64, n: i64, from: usize, limit: usize) -> Option<(i64, i64)> {
    let first = i128::from(m) + from as i128;
    if first > i128::from(n) || limit == 0 {
        return None;
    }
    let last = i128::from(n).min(first + limit as i128 - 1);
    Some((first as i64, last as i64))
}

fn to_count(value: &Value) -> usize {
    value
        .as_i64()
        .and_then(|n| usize::try_from(n).ok())
        .unwrap_or(0)
}
