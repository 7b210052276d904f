use serde::{Deserialize, Serialize};

/// A symbolic reference declared by a source file, scoped to a language.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ImportSpec {
    pub lang: String,
    pub imp: String,
}

impl ImportSpec {
    pub fn new(lang: impl Into<String>, imp: impl Into<String>) -> Self {
        Self {
            lang: lang.into(),
            imp: imp.into(),
        }
    }
}

impl std::fmt::Display for ImportSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.imp, self.lang)
    }
}
