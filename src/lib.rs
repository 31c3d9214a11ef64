//! A Liquid template interpreter for Shopify-style themes.
//!
//! # Features
//!
//! ### Syntax
//!
//! - Outputs with filters: `{{ product.title | upcase }}`
//! - Conditionals: `{% if product.available %} ... {% endif %}`, `unless` and
//!   `case`
//! - Loops: `{% for item in cart.items limit: 3 %} ... {% endfor %}` with
//!   `break`, `continue` and `forloop`
//! - Variables: `assign`, `capture`, `increment`, `decrement` and `cycle`
//! - Nested templates: `{% render 'card' with product %}` and
//!   `{% include 'header' %}`
//! - Theme sections: `{% section 'hero' %}` and `{% sections 'header-group' %}`
//!   with defaults taken from the `{% schema %}` block
//!
//! ### Engine
//!
//! - Custom tags and filters
//! - Render to a [`String`] or any [`std::io::Write`] implementor
//! - Render using any [`serde`] serializable values
//! - Parsed templates are cached by content hash
//! - Missing snippets never abort a page render
//!
//! # Getting started
//!
//! Your entry point is the [`Engine`] struct. The engine stores the tag and
//! filter registries, the file reader used to find snippets and sections, and
//! any named templates. Construct one engine per render session.
//!
//! ```
//! let engine = liquet::Engine::new();
//! ```
//!
//! Next, [`.add_template`][Engine::add_template] is used to compile and store a
//! template in the engine.
//!
//! ```
//! # let mut engine = liquet::Engine::new();
//! engine.add_template("hello", "Hello {{ user.name }}!")?;
//! # Ok::<(), liquet::Error>(())
//! ```
//!
//! Finally, the template is rendered by fetching it using
//! [`.get_template`][Engine::get_template] and calling
//! [`.render`][TemplateRef::render].
//!
//! ```
//! # let mut engine = liquet::Engine::new();
//! # engine.add_template("hello", "Hello {{ user.name }}!")?;
//! let template = engine.get_template("hello").unwrap();
//! let result = template.render(serde_json::json!({ "user": { "name": "John Smith" } }))?;
//! assert_eq!(result, "Hello John Smith!");
//! # Ok::<(), liquet::Error>(())
//! ```
//!
//! If you don't need to store the compiled template then you can also use the
//! [`.compile`][Engine::compile] function to return the template directly.
//!
//! ```
//! # let engine = liquet::Engine::new();
//! let template = engine.compile("Hello {{ user.name }}!")?;
//! let result = template.render(serde_json::json!({ "user": { "name": "John Smith" } }))?;
//! assert_eq!(result, "Hello John Smith!");
//! # Ok::<(), liquet::Error>(())
//! ```
//!
//! # Examples
//!
//! ### Render using structured data
//!
//! ```
//! #[derive(serde::Serialize)]
//! struct Data { user: User }
//!
//! #[derive(serde::Serialize)]
//! struct User { name: String }
//!
//! let data = Data { user: User { name: "John Smith".into() } };
//!
//! let result = liquet::Engine::new()
//!     .compile("Hello {{ user.name }}")?
//!     .render(&data)?;
//!
//! assert_eq!(result, "Hello John Smith");
//! # Ok::<(), liquet::Error>(())
//! ```
//!
//! ### Render snippets from a theme
//!
//! Snippets and sections are read through a [`FileReader`]. Use
//! [`DirReader`] for a theme directory or [`MemoryReader`] for templates held
//! in memory.
//!
//! ```
//! use liquet::{Engine, MemoryReader};
//!
//! let mut engine = Engine::new();
//! engine.set_reader(
//!     MemoryReader::new().with("snippets/price.liquid", "${{ price | divided_by: 100 }}"),
//! );
//!
//! let result = engine
//!     .compile("{% render 'price', price: 1500 %}")?
//!     .render(serde_json::json!({}))?;
//!
//! assert_eq!(result, "$15");
//! # Ok::<(), liquet::Error>(())
//! ```
//!
//! ### Transform data using filters
//!
//! ```
//! let mut engine = liquet::Engine::new();
//! engine.add_filter("reverse_words", |s: String| {
//!     s.split(' ').rev().collect::<Vec<_>>().join(" ")
//! });
//!
//! let result = engine
//!     .compile("{{ value | reverse_words }}")?
//!     .render(serde_json::json!({ "value": "world hello" }))?;
//!
//! assert_eq!(result, "hello world");
//! # Ok::<(), liquet::Error>(())
//! ```
//!
//! See the [`Filter`] trait documentation for more information on filters and
//! the [`TagFactory`] trait for custom tags.
//!
//! # Logging
//!
//! Diagnostics such as missing snippets, invalid schema JSON and cache hits are
//! emitted through [`tracing`](https://docs.rs/tracing). No subscriber is
//! installed by this crate.

pub mod cache;
pub mod compile;
mod error;
mod filters;
pub mod loader;
mod render;
pub mod schema;
mod tags;
pub mod translate;
mod types;
mod value;

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::io;
use std::sync::Arc;

use tracing::{debug, trace};

pub use crate::cache::{MemoryCache, NoCache, TemplateCache};
pub use crate::error::{Error, ErrorKind};
pub use crate::filters::{Filter, FilterArg, FilterArgs, FilterFn, FilterReturn};
pub use crate::loader::{DirReader, FileReader, MemoryReader, PathConvention};
pub use crate::render::{Context, Registers};
pub use crate::tags::{Body, Expression, Tag, TagFactory, TagParser, TagRegistry, TagRender};
pub use crate::translate::{Translate, Translations};
pub use crate::types::document::Document;
pub use crate::value::{to_value, List, Map, Value};

use crate::types::ast::IncludeKind;

/// A type alias for results in this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// How errors in nested templates are surfaced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Mode {
    /// A missing snippet or section renders as an HTML comment describing the
    /// error.
    #[default]
    Development,
    /// A missing snippet or section renders as nothing.
    Production,
}

/// The compilation and rendering engine.
///
/// An engine is one render session: it owns the tag and filter registries,
/// the file reader, the document cache and the named templates.
pub struct Engine {
    tags: TagRegistry,
    pub(crate) filters: BTreeMap<String, Box<FilterFn>>,
    templates: HashMap<String, Arc<Document>>,
    reader: Option<Box<dyn FileReader>>,
    cache: Box<dyn TemplateCache>,
    pub(crate) mode: Mode,
    pub(crate) max_include_depth: usize,
    pub(crate) paths: PathConvention,
}

/// A compiled template.
pub struct Template<'engine> {
    engine: &'engine Engine,
    document: Arc<Document>,
}

/// A reference to a compiled template in an [`Engine`].
#[derive(Clone, Copy)]
pub struct TemplateRef<'engine> {
    engine: &'engine Engine,
    name: &'engine str,
    document: &'engine Document,
}

impl Default for Engine {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// Construct a new engine with the builtin tags and filters.
    pub fn new() -> Self {
        let mut engine = Self {
            tags: TagRegistry::new(),
            filters: BTreeMap::new(),
            templates: HashMap::new(),
            reader: None,
            cache: Box::new(MemoryCache::new()),
            mode: Mode::default(),
            max_include_depth: 64,
            paths: PathConvention::default(),
        };
        #[cfg(feature = "builtins")]
        filters::builtins::register(&mut engine);
        engine.filters.insert("t".into(), translate::filter(None));
        engine
    }

    /// Add a custom tag to the engine, replacing any tag with the same name.
    ///
    /// See [`TagFactory`] for an example.
    #[inline]
    pub fn add_tag<F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: TagFactory + 'static,
    {
        self.tags.register(name, factory);
        self
    }

    /// Returns the tag registry.
    #[inline]
    pub fn tags(&self) -> &TagRegistry {
        &self.tags
    }

    /// Returns the tag registry for modification.
    #[inline]
    pub fn tags_mut(&mut self) -> &mut TagRegistry {
        &mut self.tags
    }

    /// Add a new filter to the engine, replacing any filter with the same
    /// name.
    ///
    /// See [`Filter`] for the accepted function types.
    #[inline]
    pub fn add_filter<F, R, A>(&mut self, name: impl Into<String>, f: F) -> &mut Self
    where
        F: Filter<R, A> + Send + Sync + 'static,
        R: FilterReturn,
        A: FilterArgs,
    {
        self.filters.insert(name.into(), filters::new(f));
        self
    }

    /// Add a filter that receives the piped value and the raw argument list,
    /// with any `key: value` arguments collected into a trailing map.
    #[inline]
    pub fn add_raw_filter<F>(&mut self, name: impl Into<String>, f: F) -> &mut Self
    where
        F: Fn(Value, Vec<Value>) -> Result<Value> + Send + Sync + 'static,
    {
        self.filters.insert(name.into(), Box::new(f));
        self
    }

    /// Removes a filter, returning whether it was registered.
    #[inline]
    pub fn remove_filter(&mut self, name: &str) -> bool {
        self.filters.remove(name).is_some()
    }

    /// Set the file reader used to find snippets, sections and section
    /// groups.
    #[inline]
    pub fn set_reader<R>(&mut self, reader: R) -> &mut Self
    where
        R: FileReader + 'static,
    {
        self.reader = Some(Box::new(reader));
        self
    }

    /// Set the document cache, [`MemoryCache`] by default.
    #[inline]
    pub fn set_cache<C>(&mut self, cache: C) -> &mut Self
    where
        C: TemplateCache + 'static,
    {
        self.cache = Box::new(cache);
        self
    }

    /// Set the translation lookup used by the `t` filter.
    #[inline]
    pub fn set_translator<T>(&mut self, translator: T) -> &mut Self
    where
        T: Translate + 'static,
    {
        let filter = translate::filter(Some(Arc::new(translator)));
        self.filters.insert("t".into(), filter);
        self
    }

    /// Set whether missing resources render an inline comment or nothing.
    #[inline]
    pub fn set_mode(&mut self, mode: Mode) -> &mut Self {
        self.mode = mode;
        self
    }

    /// Set the maximum nesting of `include`, `render` and `section`.
    #[inline]
    pub fn set_max_include_depth(&mut self, depth: usize) -> &mut Self {
        self.max_include_depth = depth;
        self
    }

    /// Set how template names map to file paths.
    #[inline]
    pub fn set_paths(&mut self, paths: PathConvention) -> &mut Self {
        self.paths = paths;
        self
    }

    /// Add a template to the engine.
    ///
    /// The template is compiled and stored under the given name. Named
    /// templates are found by `include` and `render` before the file reader
    /// is consulted.
    pub fn add_template(&mut self, name: impl Into<String>, source: &str) -> Result<()> {
        let name = name.into();
        let document = self
            .load(source)
            .map_err(|err| err.with_template_name(name.as_str()))?;
        self.templates.insert(name, document);
        Ok(())
    }

    /// Lookup a template by name.
    #[inline]
    pub fn get_template(&self, name: &str) -> Option<TemplateRef<'_>> {
        self.templates
            .get_key_value(name)
            .map(|(name, document)| TemplateRef {
                engine: self,
                name,
                document,
            })
    }

    /// Compile a template.
    ///
    /// The template will not be stored in the engine.
    pub fn compile(&self, source: &str) -> Result<Template<'_>> {
        let document = self.load(source)?;
        Ok(Template {
            engine: self,
            document,
        })
    }

    /// Parses a template source through the document cache.
    ///
    /// The source is preprocessed and hashed first, the cache key being the
    /// hash together with the [`TagRegistry::fingerprint`]. Documents that
    /// render other templates are never written to the cache.
    pub fn load(&self, source: &str) -> Result<Arc<Document>> {
        let source = compile::preprocess(source);
        // Parsing depends on the registered tags as well as the source.
        let key = format!("{}-{}", compile::hash(&source), self.tags.fingerprint());
        if let Some(document) = self.cache.read(&key) {
            debug!(key = %key, "template cache hit");
            return Ok(document);
        }
        debug!(key = %key, "template cache miss");
        let document = Arc::new(compile::parse_preprocessed(
            source.into_owned(),
            &self.tags,
        )?);
        if !document.has_includes() && !self.cache.exists(&key) {
            self.cache.write(&key, document.clone());
        }
        Ok(document)
    }

    /// Render a single section with explicit data, e.g. `{ "settings": ... }`.
    ///
    /// The section is read from the sections directory and wrapped in its
    /// container element like `{% section %}` would.
    pub fn render_section<S>(&self, name: &str, data: S) -> Result<String>
    where
        S: serde::Serialize,
    {
        let data = to_value(data)?;
        render::section(self, name, &data, &mut Context::new())
    }

    /// Finds the document for an `include` or `render` of the given name.
    pub(crate) fn resolve(&self, name: &str, kind: IncludeKind) -> Result<Arc<Document>> {
        if let Some(document) = self.templates.get(name) {
            trace!(name = %name, "resolved named template");
            return Ok(document.clone());
        }
        let candidates = match kind {
            IncludeKind::Render => vec![self.paths.snippet(name)],
            IncludeKind::Include => self.paths.include_candidates(name),
        };
        for path in candidates {
            match self.read(&path) {
                Ok(source) => {
                    trace!(name = %name, path = %path, "resolved template file");
                    return self
                        .load(&source)
                        .map_err(|err| err.with_template_name(path));
                }
                Err(err) if err.kind() == ErrorKind::MissingResource => continue,
                Err(err) => return Err(err),
            }
        }
        Err(Error::missing(format!("template '{name}' not found")))
    }

    /// Reads a file through the configured reader.
    pub(crate) fn read(&self, path: &str) -> Result<String> {
        match &self.reader {
            Some(reader) => reader.read_template_file(path),
            None => Err(Error::missing(format!(
                "template file '{path}' not found, no file reader is set"
            ))),
        }
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut templates: Vec<_> = self.templates.keys().collect();
        templates.sort();
        f.debug_struct("Engine")
            .field("tags", &self.tags)
            .field("filters", &self.filters.keys())
            .field("templates", &templates)
            .field("mode", &self.mode)
            .field("max_include_depth", &self.max_include_depth)
            .field("paths", &self.paths)
            .finish_non_exhaustive()
    }
}

impl<'engine> Template<'engine> {
    /// Render the template to a string using the provided value.
    #[inline]
    pub fn render<S>(&self, data: S) -> Result<String>
    where
        S: serde::Serialize,
    {
        let mut ctx = Context::from_value(to_value(data)?)?;
        self.render_with(&mut ctx)
    }

    /// Render the template using an existing context.
    ///
    /// Assignments made by the template remain in the context afterwards.
    #[inline]
    pub fn render_with(&self, ctx: &mut Context) -> Result<String> {
        render::template(self.engine, &self.document, ctx)
    }

    /// Render the template to a writer using the provided value.
    #[inline]
    pub fn render_to_writer<W, S>(&self, writer: W, data: S) -> Result<()>
    where
        W: io::Write,
        S: serde::Serialize,
    {
        let mut ctx = Context::from_value(to_value(data)?)?;
        render::template_to(self.engine, &self.document, writer, &mut ctx)
    }

    /// Returns the preprocessed template source.
    #[inline]
    pub fn source(&self) -> &str {
        self.document.source()
    }

    /// Returns the parsed document.
    #[inline]
    pub fn document(&self) -> &Arc<Document> {
        &self.document
    }
}

impl fmt::Debug for Template<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Template")
            .field("document", &self.document)
            .finish_non_exhaustive()
    }
}

impl<'engine> TemplateRef<'engine> {
    /// Render the template to a string using the provided value.
    #[inline]
    pub fn render<S>(&self, data: S) -> Result<String>
    where
        S: serde::Serialize,
    {
        let mut ctx = Context::from_value(to_value(data)?)?;
        self.render_with(&mut ctx)
    }

    /// Render the template using an existing context.
    #[inline]
    pub fn render_with(&self, ctx: &mut Context) -> Result<String> {
        render::template(self.engine, self.document, ctx)
            .map_err(|err| err.with_template_name(self.name))
    }

    /// Render the template to a writer using the provided value.
    #[inline]
    pub fn render_to_writer<W, S>(&self, writer: W, data: S) -> Result<()>
    where
        W: io::Write,
        S: serde::Serialize,
    {
        let mut ctx = Context::from_value(to_value(data)?)?;
        render::template_to(self.engine, self.document, writer, &mut ctx)
            .map_err(|err| err.with_template_name(self.name))
    }

    /// Returns the preprocessed template source.
    #[inline]
    pub fn source(&self) -> &'engine str {
        self.document.source()
    }

    /// Returns the name the template was added under.
    #[inline]
    pub fn name(&self) -> &'engine str {
        self.name
    }
}

impl fmt::Debug for TemplateRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateRef")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
