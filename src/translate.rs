//! Translation lookup for the `t` filter.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tracing::debug;

use crate::filters::FilterFn;
use crate::{Error, Map, Result, Value};

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*([\w.-]+)\s*\}\}").unwrap());

/// Looks up translated strings.
pub trait Translate: Send + Sync {
    /// Returns the translation of `key` with `params` interpolated, or `None`
    /// if there is no translation.
    fn translate(&self, key: &str, params: &Map<String, Value>) -> Option<String>;
}

/// Translations loaded from a locale file, e.g. `locales/en.default.json`.
///
/// Keys are dotted paths into the nested map. A translation that is a map of
/// plural forms is resolved with the `count` parameter, and `{{ name }}`
/// placeholders are replaced by the parameter of the same name.
#[derive(Debug, Clone, Default)]
pub struct Translations {
    root: Value,
}

impl Translations {
    pub fn new(root: impl Into<Value>) -> Self {
        Self { root: root.into() }
    }

    /// Parses a JSON locale file.
    pub fn from_json(source: &str) -> Result<Self> {
        let json: serde_json::Value = serde_json::from_str(source)
            .map_err(|err| Error::data(format!("invalid translations: {err}")))?;
        Ok(Self::new(json))
    }
}

impl Translate for Translations {
    fn translate(&self, key: &str, params: &Map<String, Value>) -> Option<String> {
        let mut value = &self.root;
        for segment in key.split('.') {
            value = value.get(segment)?;
        }
        if let (Value::Map(forms), Some(count)) = (value, params.get("count")) {
            let form = match count.as_f64() {
                Some(n) if n == 0.0 && forms.contains_key("zero") => "zero",
                Some(n) if n == 1.0 => "one",
                _ => "other",
            };
            value = forms.get(form).or_else(|| forms.get("other"))?;
        }
        Some(interpolate(value.as_str()?, params))
    }
}

fn interpolate(text: &str, params: &Map<String, Value>) -> String {
    PLACEHOLDER
        .replace_all(text, |caps: &Captures<'_>| {
            params
                .get(&caps[1])
                .map(Value::to_string)
                .unwrap_or_default()
        })
        .into_owned()
}

/// Returns the `t` filter, which falls back to the key itself when there is
/// no translation.
pub(crate) fn filter(translator: Option<Arc<dyn Translate>>) -> Box<FilterFn> {
    Box::new(move |value: Value, args: Vec<Value>| -> Result<Value> {
        let key = value.to_string();
        let params = match args.into_iter().last() {
            Some(Value::Map(params)) => params,
            _ => Map::new(),
        };
        let translated = translator
            .as_deref()
            .and_then(|t| t.translate(&key, &params));
        match translated {
            Some(s) => Ok(Value::String(s)),
            None => {
                debug!(key = %key, "missing translation");
                Ok(Value::String(key))
            }
        }
    })
}
