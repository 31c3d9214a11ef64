use crate::filters::FilterArg;
use crate::{Map, Value};

pub type Result<T> = std::result::Result<T, Error>;

pub enum Error {
    /// When there is a type mismatch.
    Type(
        /// Expected
        &'static str,
        /// Got
        &'static str,
    ),
}

impl Error {
    /// Converts into a render error, `what` being "value" for the piped value
    /// and "argument" for any other argument.
    pub(crate) fn into_error(self, what: &str) -> crate::Error {
        match self {
            Error::Type(exp, got) => {
                crate::Error::data(format!("filter expected {exp} {what}, found {got}"))
            }
        }
    }
}

impl FilterArg for bool {
    fn from_value(v: Value) -> Result<Self> {
        Ok(v.is_truthy())
    }
}

impl FilterArg for i64 {
    fn from_value(v: Value) -> Result<Self> {
        match v {
            Value::None => Ok(0),
            v => v.as_i64().ok_or_else(|| Error::Type("integer", v.human())),
        }
    }
}

impl FilterArg for f64 {
    fn from_value(v: Value) -> Result<Self> {
        match v {
            Value::None => Ok(0.0),
            v => v.as_f64().ok_or_else(|| Error::Type("float", v.human())),
        }
    }
}

impl FilterArg for String {
    fn from_value(v: Value) -> Result<Self> {
        match v {
            Value::String(s) => Ok(s),
            Value::None => Ok(String::new()),
            v @ (Value::Bool(_) | Value::Integer(_) | Value::Float(_)) => Ok(v.to_string()),
            v => Err(Error::Type("string", v.human())),
        }
    }
}

impl FilterArg for Vec<Value> {
    fn from_value(v: Value) -> Result<Self> {
        match v {
            Value::List(l) => Ok(l),
            Value::None => Ok(Vec::new()),
            v => Err(Error::Type("list", v.human())),
        }
    }
}

impl FilterArg for Map<String, Value> {
    fn from_value(v: Value) -> Result<Self> {
        match v {
            Value::Map(m) => Ok(m),
            v => Err(Error::Type("map", v.human())),
        }
    }
}

impl FilterArg for Value {
    fn from_value(v: Value) -> Result<Self> {
        Ok(v)
    }
}

impl<T> FilterArg for Option<T>
where
    T: FilterArg,
{
    fn from_value(v: Value) -> Result<Self> {
        match v {
            Value::None => Ok(None),
            v => T::from_value(v).map(Some),
        }
    }

    fn missing() -> Option<Self> {
        Some(None)
    }
}
