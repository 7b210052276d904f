//! Maps a symbolic import to one build target.
//!
//! Resolution order:
//! 1. Well-known redirects (never present in the local index)
//! 2. Exact index lookup: one owner wins, several owners are ambiguous,
//!    the requester itself is elided
//! 3. Conventional guess from the import's directory, elided when it names
//!    the requester and refused when it would not be a well-formed label

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::index::ImportIndex;
use super::redirect::RedirectTable;
use crate::types::{ImportSpec, Label};

/// A successful resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Resolution {
    /// Exactly one indexed rule provides the import.
    Indexed { label: Label },
    /// Matched a well-known prefix.
    Redirected { label: Label },
    /// Nothing indexed; label derived by convention and may not exist.
    Guessed { label: Label },
    /// The requester provides the import itself.
    SelfReference,
}

impl Resolution {
    /// The dependency to record, if any.
    pub fn label(&self) -> Option<&Label> {
        match self {
            Resolution::Indexed { label }
            | Resolution::Redirected { label }
            | Resolution::Guessed { label } => Some(label),
            Resolution::SelfReference => None,
        }
    }

    pub fn is_verified(&self) -> bool {
        !matches!(self, Resolution::Guessed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ResolveError {
    #[error(
        "multiple rules ({}) may be imported with {import} from {from}",
        join_labels(.candidates)
    )]
    Ambiguous {
        import: ImportSpec,
        from: Label,
        candidates: Vec<Label>,
    },
    #[error("no rule provides {import} from {from} and no label can be derived from it")]
    NotFound { import: ImportSpec, from: Label },
}

fn join_labels(labels: &[Label]) -> String {
    labels
        .iter()
        .map(|l| l.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// An import together with how it resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedImport {
    pub import: ImportSpec,
    pub result: Result<Resolution, ResolveError>,
}

/// Resolves imports against a frozen [`ImportIndex`]. Cheap to share across threads.
#[derive(Debug, Clone)]
pub struct Resolver {
    index: Arc<ImportIndex>,
    redirects: RedirectTable,
    suffixes: HashMap<String, String>,
}

impl Resolver {
    pub fn new(index: Arc<ImportIndex>, redirects: RedirectTable) -> Self {
        Self {
            index,
            redirects,
            suffixes: HashMap::new(),
        }
    }

    /// Override the rule name suffix used for guesses in `lang`.
    pub fn with_suffix(mut self, lang: impl Into<String>, suffix: impl Into<String>) -> Self {
        self.suffixes.insert(lang.into(), suffix.into());
        self
    }

    pub fn resolve(&self, spec: &ImportSpec, from: &Label) -> Result<Resolution, ResolveError> {
        if let Some(label) = self.redirects.find(spec) {
            return Ok(Resolution::Redirected {
                label: label.clone(),
            });
        }

        match self.index.lookup(spec) {
            [] => match guess_label(&spec.imp, self.suffix(&spec.lang)) {
                Some(label) if label.pkg == from.pkg && label.name == from.name => {
                    Ok(Resolution::SelfReference)
                }
                Some(label) => Ok(Resolution::Guessed { label }),
                None => Err(ResolveError::NotFound {
                    import: spec.clone(),
                    from: from.clone(),
                }),
            },
            [owner] if owner == from => Ok(Resolution::SelfReference),
            [owner] => Ok(Resolution::Indexed {
                label: owner.clone(),
            }),
            candidates => Err(ResolveError::Ambiguous {
                import: spec.clone(),
                from: from.clone(),
                candidates: candidates.to_vec(),
            }),
        }
    }

    /// Resolve every import of one requester, logging anything that will not
    /// become a dependency.
    pub fn resolve_all(&self, specs: &[ImportSpec], from: &Label) -> Vec<ResolvedImport> {
        specs
            .iter()
            .map(|spec| {
                let result = self.resolve(spec, from);
                match &result {
                    Err(e) => tracing::warn!(import = %spec, from = %from, "{}", e),
                    Ok(Resolution::Guessed { label }) => tracing::debug!(
                        import = %spec,
                        from = %from,
                        guess = %label,
                        "No indexed rule, using conventional label"
                    ),
                    Ok(_) => {}
                }
                ResolvedImport {
                    import: spec.clone(),
                    result,
                }
            })
            .collect()
    }

    fn suffix<'a>(&'a self, lang: &'a str) -> &'a str {
        self.suffixes.get(lang).map(String::as_str).unwrap_or(lang)
    }
}

/// Conventional rule name for a package: `<last segment>_<suffix>`, or `root_<suffix>`.
pub fn rule_name(rel: &str, suffix: &str) -> String {
    let base = rel.rsplit('/').find(|s| !s.is_empty()).unwrap_or("root");
    format!("{}_{}", base, suffix)
}

/// Guess the label of the rule providing `imp` from its directory.
///
/// `None` when the directory cannot be a package, e.g. `node:fs/promises`.
pub fn guess_label(imp: &str, suffix: &str) -> Option<Label> {
    let pkg = imp
        .rsplit_once('/')
        .map(|(dir, _)| dir.trim_matches('/'))
        .unwrap_or("");
    let label = Label::new("", pkg, rule_name(pkg, suffix));
    label.is_well_formed().then_some(label)
}
