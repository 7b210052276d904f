//! Static table of well-known import prefixes that bypass the index.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::types::{BuildgenError, ImportSpec, Label};

/// An import prefix that always resolves to a fixed external target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Redirect {
    /// Restrict to one language. `None` applies to every language.
    pub lang: Option<String>,
    pub prefix: String,
    pub target: Label,
}

impl Redirect {
    pub fn new(lang: Option<&str>, prefix: impl Into<String>, target: Label) -> Self {
        Self {
            lang: lang.map(str::to_string),
            prefix: prefix.into(),
            target,
        }
    }

    fn matches(&self, spec: &ImportSpec) -> bool {
        self.lang.as_deref().map_or(true, |lang| lang == spec.lang)
            && spec.imp.starts_with(&self.prefix)
    }
}

/// Parses `prefix=label` or `lang:prefix=label`.
impl FromStr for Redirect {
    type Err = BuildgenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (lhs, target) = s
            .split_once('=')
            .ok_or_else(|| BuildgenError::InvalidLabel(format!("expected prefix=label: {}", s)))?;
        let target: Label = target.trim().parse()?;
        if target.relative {
            return Err(BuildgenError::InvalidLabel(format!(
                "redirect target must be absolute: {}",
                target
            )));
        }

        let (lang, prefix) = match lhs.split_once(':') {
            Some((lang, prefix)) => (Some(lang.trim()), prefix.trim()),
            None => (None, lhs.trim()),
        };
        if prefix.is_empty() {
            return Err(BuildgenError::InvalidLabel(format!("empty redirect prefix: {}", s)));
        }

        Ok(Redirect::new(lang, prefix, target))
    }
}

/// Redirect table consulted before the index. The longest matching prefix wins.
#[derive(Debug, Clone, Default)]
pub struct RedirectTable {
    entries: Vec<Redirect>,
}

impl RedirectTable {
    pub fn new(entries: Vec<Redirect>) -> Self {
        Self { entries }
    }

    /// Build a table from `(lang, prefix, label)` triples known at build time.
    pub fn from_static(entries: &[(&str, &str, &str)]) -> crate::Result<Self> {
        let entries = entries
            .iter()
            .map(|(lang, prefix, target)| Ok(Redirect::new(Some(lang), *prefix, target.parse()?)))
            .collect::<crate::Result<Vec<_>>>()?;
        Ok(Self { entries })
    }

    pub fn extend(&mut self, entries: impl IntoIterator<Item = Redirect>) {
        self.entries.extend(entries);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Redirect> {
        self.entries.iter()
    }

    pub fn find(&self, spec: &ImportSpec) -> Option<&Label> {
        self.entries
            .iter()
            .filter(|r| r.matches(spec))
            .max_by_key(|r| r.prefix.len())
            .map(|r| &r.target)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
