//! Import index built once per run, then frozen for concurrent lookups.

use std::collections::HashMap;

use crate::types::{ImportSpec, Label};

/// Mutable build phase of the index. Call [`ImportIndexBuilder::finish`] before resolving.
#[derive(Debug, Default)]
pub struct ImportIndexBuilder {
    by_import: HashMap<ImportSpec, Vec<Label>>,
    entries: usize,
}

impl ImportIndexBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `owner` as a provider of `spec`.
    ///
    /// Distinct owners of the same import are all kept; ambiguity is reported
    /// at resolution time. Registering the same pair twice is a no-op.
    pub fn add(&mut self, spec: ImportSpec, owner: &Label) {
        let owners = self.by_import.entry(spec).or_default();
        if owners.contains(owner) {
            return;
        }
        owners.push(owner.clone());
        self.entries += 1;
    }

    /// Register every import a rule provides.
    pub fn add_rule(&mut self, specs: impl IntoIterator<Item = ImportSpec>, owner: &Label) {
        for spec in specs {
            self.add(spec, owner);
        }
    }

    pub fn finish(self) -> ImportIndex {
        tracing::debug!(
            imports = self.by_import.len(),
            entries = self.entries,
            "Import index frozen"
        );
        ImportIndex {
            by_import: self.by_import,
            entries: self.entries,
        }
    }
}

/// Read-only import index. Share it behind an `Arc`.
#[derive(Debug, Default)]
pub struct ImportIndex {
    by_import: HashMap<ImportSpec, Vec<Label>>,
    entries: usize,
}

impl ImportIndex {
    /// All owners of `spec`, in insertion order.
    pub fn lookup(&self, spec: &ImportSpec) -> &[Label] {
        self.by_import.get(spec).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Total number of (import, owner) entries.
    pub fn len(&self) -> usize {
        self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries == 0
    }

    /// Number of distinct imports.
    pub fn import_count(&self) -> usize {
        self.by_import.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(imp: &str) -> ImportSpec {
        ImportSpec::new("typescript", imp)
    }

    #[test]
    fn test_lookup_preserves_insertion_order() {
        let mut builder = ImportIndexBuilder::new();
        let b = Label::new("", "foo", "b");
        let a = Label::new("", "foo", "a");
        builder.add(ts("foo/foo.ts"), &b);
        builder.add(ts("foo/foo.ts"), &a);

        let index = builder.finish();
        assert_eq!(index.lookup(&ts("foo/foo.ts")), &[b, a]);
        assert_eq!(index.len(), 2);
        assert_eq!(index.import_count(), 1);
    }

    #[test]
    fn test_duplicate_pair_is_ignored() {
        let mut builder = ImportIndexBuilder::new();
        let owner = Label::new("", "foo", "a");
        builder.add(ts("foo/foo.ts"), &owner);
        builder.add(ts("foo/foo.ts"), &owner);

        let index = builder.finish();
        assert_eq!(index.lookup(&ts("foo/foo.ts")).len(), 1);
    }

    #[test]
    fn test_lookup_is_language_scoped() {
        let mut builder = ImportIndexBuilder::new();
        builder.add(ts("foo/foo.ts"), &Label::new("", "foo", "a"));

        let index = builder.finish();
        assert!(index
            .lookup(&ImportSpec::new("proto", "foo/foo.ts"))
            .is_empty());
        assert!(index.lookup(&ts("missing.ts")).is_empty());
    }

    #[test]
    fn test_add_rule() {
        let mut builder = ImportIndexBuilder::new();
        let owner = Label::new("", "foo", "foo_typescript");
        builder.add_rule(vec![ts("foo/a.ts"), ts("foo/b.ts")], &owner);

        let index = builder.finish();
        assert_eq!(index.len(), 2);
        assert_eq!(index.lookup(&ts("foo/b.ts")), &[owner]);
    }

    #[test]
    fn test_empty_index() {
        let index = ImportIndexBuilder::new().finish();
        assert!(index.is_empty());
    }
}
