//! Command-line argument types.

use std::path::PathBuf;
use std::str::FromStr;

use fewshot_vision::CategorySpec;

/// A category and the directory holding its examples: `id[:emblem]=DIR`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryArg {
    pub spec: CategorySpec,
    pub dir: PathBuf,
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum CategoryArgError {
    #[error("expected id[:emblem]=DIR, got {0:?}")]
    MissingDir(String),

    #[error("category id is empty in {0:?}")]
    EmptyId(String),
}

impl FromStr for CategoryArg {
    type Err = CategoryArgError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (label, dir) = s
            .split_once('=')
            .filter(|(_, dir)| !dir.is_empty())
            .ok_or_else(|| CategoryArgError::MissingDir(s.to_string()))?;

        let (id, emblem) = match label.split_once(':') {
            Some((id, emblem)) => (id.trim(), emblem.trim()),
            None => (label.trim(), ""),
        };
        if id.is_empty() {
            return Err(CategoryArgError::EmptyId(s.to_string()));
        }

        Ok(Self {
            spec: CategorySpec::new(id, display_name(id), emblem),
            dir: PathBuf::from(dir),
        })
    }
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[error("unterminated {0} quote")]
pub struct UnterminatedQuote(pub char);

/// Split a REPL argument line into words.
///
/// Words are separated by whitespace. `'...'` and `"..."` group text with
/// spaces, and a backslash escapes the next character outside single quotes.
pub fn split_words(line: &str) -> Result<Vec<String>, UnterminatedQuote> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quote: Option<char> = None;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some('\''), c) => current.push(c),
            (_, '\\') => {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
                in_word = true;
            }
            (Some(_), c) => current.push(c),
            (None, '\'' | '"') => {
                quote = Some(c);
                in_word = true;
            }
            (None, c) if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            (None, c) => {
                current.push(c);
                in_word = true;
            }
        }
    }

    if let Some(q) = quote {
        return Err(UnterminatedQuote(q));
    }
    if in_word {
        words.push(current);
    }
    Ok(words)
}

/// Backslash-escape the characters [`split_words`] treats specially.
pub fn escape_word(word: &str) -> String {
    let mut escaped = String::with_capacity(word.len());
    for c in word.chars() {
        if c == ' ' || c == '\\' || c == '\'' || c == '"' {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// `"golden-retriever"` -> `"Golden retriever"`.
pub fn display_name(id: &str) -> String {
    let spaced = id.replace(['-', '_'], " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
