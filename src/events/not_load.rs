//! Skip list for collections and fields.

use glob::Pattern;

/// Exact-or-glob skip list.
///
/// A name is skipped when it equals one of the patterns verbatim or matches it as a glob
/// (`HLT*`, `Soft?`, `L1[a-z]*`). Patterns that do not parse as globs still match exactly.
#[derive(Debug, Clone, Default)]
pub struct NotLoad {
    patterns: Vec<(String, Option<Pattern>)>,
}

impl NotLoad {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let patterns = patterns
            .into_iter()
            .map(|p| {
                let p = p.into();
                let compiled = Pattern::new(&p).ok();
                (p, compiled)
            })
            .collect();
        Self { patterns }
    }

    /// `true` if `name` should not be loaded.
    pub fn skips(&self, name: &str) -> bool {
        self.patterns.iter().any(|(raw, glob)| {
            raw == name || glob.as_ref().is_some_and(|g| g.matches(name))
        })
    }

    /// `true` if every field of collection `collection` is skipped as a whole.
    pub fn skips_collection(&self, collection: &str) -> bool {
        self.skips(collection)
    }

    /// `true` if the single field `<collection>_<field>` is skipped.
    pub fn skips_field(&self, collection: &str, field: &str) -> bool {
        self.skips(&format!("{collection}_{field}"))
    }

    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(|(raw, _)| raw.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}
