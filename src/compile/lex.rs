use crate::types::span::Span;
use crate::{Error, Result};

/// Tags whose body is emitted as a single raw token and never tokenized.
const VERBATIM_TAGS: &[&str] = &["raw", "schema", "stylesheet", "javascript"];

/// The unit yielded by the lexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    /// Raw template text.
    Raw(Span),
    /// An output tag, e.g. `{{ user.name }}`
    Output {
        /// The expression between the delimiters.
        markup: Span,
        /// The whole tag including delimiters.
        span: Span,
    },
    /// A tag, e.g. `{% if user.enabled %}`
    Tag {
        name: Span,
        markup: Span,
        span: Span,
    },
    /// A closing tag, e.g. `{% endif %}`
    EndTag { name: Span, span: Span },
}

/// A lexer that splits the template source into raw text and tags.
///
/// Whitespace control is resolved here: a `-` just inside a delimiter, e.g.
/// `{%-` or `-}}`, trims the adjacent raw text so the parser never sees it.
struct Lexer<'source> {
    /// The original template source.
    source: &'source str,

    /// A cursor over the template source.
    cursor: usize,

    /// Whether to left trim the next raw token.
    left_trim: bool,

    tokens: Vec<Token>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delim {
    /// `{{ ... }}`
    Output,
    /// `{% ... %}`
    Tag,
}

/// The location of a single `{{ ... }}` or `{% ... %}`.
#[derive(Debug, Clone, Copy)]
struct Region {
    /// The whole tag including delimiters.
    span: Span,
    /// Everything between the delimiters and whitespace control markers.
    inner: Span,
    left_trim: bool,
    right_trim: bool,
}

/// Tokenizes a template source.
pub fn tokenize(source: &str) -> Result<Vec<Token>> {
    Lexer {
        source,
        cursor: 0,
        left_trim: false,
        tokens: Vec::new(),
    }
    .tokenize()
}

/// Tokenizes the body of a `{% liquid %}` tag, where every non-empty line is
/// a tag without delimiters.
pub fn tokenize_lines(source: &str, markup: Span) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut comment_depth = 0usize;
    let mut offset = markup.m;

    for line in source[markup].split('\n') {
        let m = offset;
        offset += line.len() + 1;

        let span = trimmed(source, Span::from(m..m + line.len()));
        if span.is_empty() || source[span].starts_with('#') {
            continue;
        }
        let (name, rest) = split_name(source, span);

        match (&source[name], comment_depth) {
            ("comment", _) => comment_depth += 1,
            ("endcomment", 1..) => comment_depth -= 1,
            (_, 1..) => {}
            (n, _) if is_end_tag(n) => tokens.push(Token::EndTag { name, span }),
            _ => tokens.push(Token::Tag {
                name,
                markup: rest,
                span,
            }),
        }
    }

    if comment_depth > 0 {
        return Err(Error::syntax(
            "tag 'comment' was never closed",
            source,
            markup,
        ));
    }
    Ok(tokens)
}

impl<'source> Lexer<'source> {
    fn tokenize(mut self) -> Result<Vec<Token>> {
        while let Some((j, delim)) = find_begin(self.source, self.cursor) {
            let region = self.region(j, delim)?;
            self.push_raw(self.cursor, j, region.left_trim);
            self.cursor = region.span.n;
            self.left_trim = region.right_trim;

            match delim {
                Delim::Output => {
                    let markup = trimmed(self.source, region.inner);
                    self.tokens.push(Token::Output {
                        markup,
                        span: region.span,
                    });
                }
                Delim::Tag => self.lex_tag(region)?,
            }
        }
        self.push_raw(self.cursor, self.source.len(), false);
        Ok(self.tokens)
    }

    fn lex_tag(&mut self, region: Region) -> Result<()> {
        let source = self.source;
        let inner = trimmed(source, region.inner);
        if inner.is_empty() {
            return Err(self.err("expected tag name", region.span));
        }

        // An inline comment, e.g. `{% # note %}`
        if source[inner].starts_with('#') {
            return Ok(());
        }

        let (name, markup) = split_name(source, inner);
        let name_str = &source[name];

        if name_str == "comment" {
            return self.skip_block(name_str, region);
        }

        if is_end_tag(name_str) {
            self.tokens.push(Token::EndTag {
                name,
                span: region.span,
            });
            return Ok(());
        }

        self.tokens.push(Token::Tag {
            name,
            markup,
            span: region.span,
        });

        if VERBATIM_TAGS.contains(&name_str) {
            self.lex_verbatim(name_str, region)?;
        }
        Ok(())
    }

    /// Emits the body of a verbatim tag as one raw token followed by its
    /// closing tag.
    fn lex_verbatim(&mut self, name: &str, open: Region) -> Result<()> {
        let (close, close_name) = match find_end_tag(self.source, name, open.span.n, false) {
            Some(found) => found,
            None => return Err(self.err_never_closed(name, open.span)),
        };
        self.push_raw(open.span.n, close.span.m, close.left_trim);
        self.tokens.push(Token::EndTag {
            name: close_name,
            span: close.span,
        });
        self.cursor = close.span.n;
        self.left_trim = close.right_trim;
        Ok(())
    }

    /// Skips everything up to the matching closing tag, honouring nesting.
    fn skip_block(&mut self, name: &str, open: Region) -> Result<()> {
        match find_end_tag(self.source, name, open.span.n, true) {
            Some((close, _)) => {
                self.cursor = close.span.n;
                self.left_trim = close.right_trim;
                Ok(())
            }
            None => Err(self.err_never_closed(name, open.span)),
        }
    }

    fn push_raw(&mut self, mut i: usize, mut j: usize, right_trim: bool) {
        if right_trim {
            j = i + self.source[i..j].trim_end().len();
        }
        if self.left_trim {
            self.left_trim = false;
            let s = &self.source[i..j];
            i += s.len() - s.trim_start().len();
        }
        if i < j {
            self.tokens.push(Token::Raw(Span::from(i..j)));
        }
    }

    fn region(&self, j: usize, delim: Delim) -> Result<Region> {
        region_at(self.source, j, delim).ok_or_else(|| self.err("unclosed tag", j..j + 2))
    }

    fn err(&self, msg: &str, span: impl Into<Span>) -> Error {
        Error::syntax(msg, self.source, span)
    }

    fn err_never_closed(&self, name: &str, span: Span) -> Error {
        self.err(&format!("tag '{name}' was never closed"), span)
    }
}

/// Finds the next begin delimiter at or after `i`.
fn find_begin(source: &str, mut i: usize) -> Option<(usize, Delim)> {
    while let Some(off) = source[i..].find('{') {
        let j = i + off;
        match source.as_bytes().get(j + 1) {
            Some(b'{') => return Some((j, Delim::Output)),
            Some(b'%') => return Some((j, Delim::Tag)),
            _ => i = j + 1,
        }
    }
    None
}

/// Locates the tag starting at `j`. Returns `None` if the tag is not closed
/// before the end of the source or before another tag begins.
fn region_at(source: &str, j: usize, delim: Delim) -> Option<Region> {
    let end = match delim {
        Delim::Output => "}}",
        Delim::Tag => "%}",
    };

    let mut m = j + 2;
    let left_trim = source[m..].starts_with('-');
    if left_trim {
        m += 1;
    }

    let k = m + source[m..].find(end)?;
    if find_begin(&source[..k], m).is_some() {
        return None;
    }

    let right_trim = k > m && source[..k].ends_with('-');
    let n = if right_trim { k - 1 } else { k };

    Some(Region {
        span: Span::from(j..k + end.len()),
        inner: Span::from(m..n),
        left_trim,
        right_trim,
    })
}

/// Finds the closing `{% end<name> %}` tag after `i`.
fn find_end_tag(source: &str, name: &str, mut i: usize, nestable: bool) -> Option<(Region, Span)> {
    let mut depth = 0usize;
    while let Some(j) = source[i..].find("{%").map(|off| i + off) {
        let region = match region_at(source, j, Delim::Tag) {
            Some(region) => region,
            None => {
                i = j + 2;
                continue;
            }
        };
        let (word, _) = split_name(source, trimmed(source, region.inner));
        let word_str = &source[word];

        if nestable && word_str == name {
            depth += 1;
        } else if word_str.strip_prefix("end") == Some(name) {
            if depth == 0 {
                return Some((region, word));
            }
            depth -= 1;
        }
        i = region.span.n;
    }
    None
}

/// Splits tag contents into the tag name and the remaining markup.
fn split_name(source: &str, span: Span) -> (Span, Span) {
    let s = &source[span];
    let len = s.find(char::is_whitespace).unwrap_or(s.len());
    let name = Span::from(span.m..span.m + len);
    let markup = trimmed(source, Span::from(span.m + len..span.n));
    (name, markup)
}

fn trimmed(source: &str, span: Span) -> Span {
    let s = &source[span];
    let m = span.m + (s.len() - s.trim_start().len());
    let n = m + s.trim().len();
    Span::from(m..n)
}

fn is_end_tag(name: &str) -> bool {
    name.len() > 3 && name.starts_with("end")
}
