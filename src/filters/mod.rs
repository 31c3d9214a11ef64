mod args;
#[cfg(feature = "builtins")]
pub(crate) mod builtins;

use crate::{Error, Result, Value};

/// A filter as stored by the engine: the piped value and the evaluated
/// arguments, with any `key: value` arguments collected into a trailing map.
pub type FilterFn = dyn Fn(Value, Vec<Value>) -> Result<Value> + Send + Sync + 'static;

pub(crate) fn new<F, R, A>(f: F) -> Box<FilterFn>
where
    F: Filter<R, A> + Send + Sync + 'static,
    R: FilterReturn,
    A: FilterArgs,
{
    Box::new(move |value: Value, args: Vec<Value>| -> Result<Value> {
        let args = A::from_args(value, args)?;
        let result = Filter::filter(&f, args);
        FilterReturn::to_value(result)
    })
}

/// Represents any filter function.
///
/// This trait is used by the [`Engine::add_filter`][crate::Engine::add_filter]
/// method to abstract over a variety of function and closure types. The first
/// argument to a filter function always receives the piped value. It can then
/// have up to four more arguments. Arguments are checked when the filter is
/// applied; a filter that is given the wrong number or type of arguments
/// produces `nil`.
///
/// [`Filter`] is implemented for functions that return any of the following
/// types.
///
/// - `R` where `R` implements `Into<Value>`
/// - `Option<R>` where `R` implements `Into<Value>`
/// - `Result<R>` where `R` implements `Into<Value>`
///
/// [`Filter`] is implemented for functions that take any of the following
/// types as arguments.
/// - [`bool`], tested for truthiness
/// - [`i64`] and [`f64`], also accepting numeric strings
/// - [`String`], also accepting numbers and booleans
/// - [`Vec<Value>`]
/// - [`Map<String, Value>`][crate::Map]
/// - [`Value`]
/// - [`Option<T>`] of any of the above, for trailing optional arguments
///
/// ## Examples
///
/// ```rust
/// use liquet::{Engine, Value};
///
/// let mut engine = Engine::new();
/// engine.add_filter("shout", shout);
/// engine.add_filter("pluck", pluck);
///
/// fn shout(s: String, suffix: Option<String>) -> String {
///     s.to_uppercase() + suffix.as_deref().unwrap_or("!")
/// }
///
/// fn pluck(list: Vec<Value>, key: String) -> Vec<Value> {
///     list.iter().filter_map(|v| v.get(&key).cloned()).collect()
/// }
///
/// let result = engine
///     .compile("{{ 'hi' | shout }} {{ 'hi' | shout: '?' }}")?
///     .render(serde_json::json!({}))?;
/// assert_eq!(result, "HI! HI?");
/// # Ok::<(), liquet::Error>(())
/// ```
pub trait Filter<R, A>
where
    A: FilterArgs,
{
    #[doc(hidden)]
    fn filter(&self, args: A) -> R;
}

pub trait FilterArgs: Sized {
    #[doc(hidden)]
    fn from_args(value: Value, args: Vec<Value>) -> Result<Self>;
}

pub trait FilterArg: Sized {
    #[doc(hidden)]
    fn from_value(v: Value) -> args::Result<Self>;

    /// The value of an argument that was not passed, if it is optional.
    #[doc(hidden)]
    fn missing() -> Option<Self> {
        None
    }
}

pub trait FilterReturn {
    #[doc(hidden)]
    fn to_value(self) -> Result<Value>;
}

////////////////////////////////////////////////////////////////////////////////
// Filter and FilterArgs
////////////////////////////////////////////////////////////////////////////////

macro_rules! impl_filter {
    ($($arg:ident $var:ident)*) => {
        impl<Func, R, V, $($arg,)*> Filter<R, (V, $($arg,)*)> for Func
        where
            Func: Fn(V, $($arg,)*) -> R,
            R: FilterReturn,
            V: FilterArg,
            $($arg: FilterArg,)*
        {
            #[doc(hidden)]
            fn filter(&self, (v, $($var,)*): (V, $($arg,)*)) -> R {
                self(v, $($var,)*)
            }
        }

        impl<V, $($arg,)*> FilterArgs for (V, $($arg,)*)
        where
            V: FilterArg,
            $($arg: FilterArg,)*
        {
            #[allow(unused_mut, unused_variables)]
            fn from_args(value: Value, args: Vec<Value>) -> Result<Self> {
                let params: &[&str] = &[$(stringify!($var)),*];
                check_args(params.len(), args.len())?;
                let mut args = args.into_iter();
                let v = V::from_value(value).map_err(|e| e.into_error("value"))?;
                $(
                    let $var = match args.next() {
                        Some(arg) => $arg::from_value(arg).map_err(|e| e.into_error("argument"))?,
                        None => $arg::missing().ok_or_else(|| err_missing(params.len()))?,
                    };
                )*
                Ok((v, $($var,)*))
            }
        }
    };
}

impl_filter! {}
impl_filter! { A a }
impl_filter! { A a B b }
impl_filter! { A a B b C c }
impl_filter! { A a B b C c D d }

fn check_args(exp: usize, got: usize) -> Result<()> {
    if got <= exp {
        Ok(())
    } else {
        Err(Error::data(format!(
            "filter expected at most {exp} arguments, found {got}"
        )))
    }
}

fn err_missing(exp: usize) -> Error {
    Error::data(format!("filter expected {exp} arguments"))
}

////////////////////////////////////////////////////////////////////////////////
// FilterReturn
////////////////////////////////////////////////////////////////////////////////

impl<T> FilterReturn for T
where
    T: Into<Value>,
{
    fn to_value(self) -> Result<Value> {
        Ok(self.into())
    }
}

impl<T> FilterReturn for Option<T>
where
    T: Into<Value>,
{
    fn to_value(self) -> Result<Value> {
        match self {
            Some(r) => Ok(r.into()),
            None => Ok(Value::None),
        }
    }
}

impl<T> FilterReturn for Result<T>
where
    T: Into<Value>,
{
    fn to_value(self) -> Result<Value> {
        self.map(Into::into)
    }
}
