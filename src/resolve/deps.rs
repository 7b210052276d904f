//! Writing resolved imports back onto a rule.

use serde::Serialize;
use serde_json::Value;

use super::resolver::{Resolution, ResolveError, ResolvedImport};
use crate::types::{GeneratedRule, Label, DEPS_ATTR};

/// Counts of resolution outcomes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResolveStats {
    pub indexed: u32,
    pub redirected: u32,
    pub guessed: u32,
    pub self_refs: u32,
    pub ambiguous: u32,
    /// No owner and no derivable label.
    pub unresolved: u32,
}

impl ResolveStats {
    pub fn record(&mut self, result: &Result<Resolution, ResolveError>) {
        match result {
            Ok(Resolution::Indexed { .. }) => self.indexed += 1,
            Ok(Resolution::Redirected { .. }) => self.redirected += 1,
            Ok(Resolution::Guessed { .. }) => self.guessed += 1,
            Ok(Resolution::SelfReference) => self.self_refs += 1,
            Err(ResolveError::Ambiguous { .. }) => self.ambiguous += 1,
            Err(ResolveError::NotFound { .. }) => self.unresolved += 1,
        }
    }

    pub fn from_resolved(resolved: &[ResolvedImport]) -> Self {
        let mut stats = Self::default();
        for r in resolved {
            stats.record(&r.result);
        }
        stats
    }

    pub fn merge(&mut self, other: &ResolveStats) {
        self.indexed += other.indexed;
        self.redirected += other.redirected;
        self.guessed += other.guessed;
        self.self_refs += other.self_refs;
        self.ambiguous += other.ambiguous;
        self.unresolved += other.unresolved;
    }

    /// Outcomes that produced a dependency edge.
    pub fn deps(&self) -> u32 {
        self.indexed + self.redirected + self.guessed
    }
}

/// Replace the rule's `deps` with the labels from `resolved`.
///
/// Labels are rendered relative to `from` and de-duplicated in order. The
/// attribute is removed entirely when nothing resolved to a dependency.
pub fn apply_resolutions(
    mut rule: GeneratedRule,
    resolved: &[ResolvedImport],
    from: &Label,
) -> GeneratedRule {
    rule.del_attr(DEPS_ATTR);

    let mut deps: Vec<String> = Vec::with_capacity(resolved.len());
    for r in resolved {
        let Ok(resolution) = &r.result else {
            continue;
        };
        let Some(label) = resolution.label() else {
            continue;
        };
        let rendered = label.rel(&from.repo, &from.pkg).to_string();
        if !deps.contains(&rendered) {
            deps.push(rendered);
        }
    }

    if !deps.is_empty() {
        rule.set_attr(
            DEPS_ATTR,
            Value::Array(deps.into_iter().map(Value::String).collect()),
        );
    }
    rule
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ImportSpec;
    use serde_json::json;

    fn resolved(imp: &str, result: Result<Resolution, ResolveError>) -> ResolvedImport {
        ResolvedImport {
            import: ImportSpec::new("typescript", imp),
            result,
        }
    }

    #[test]
    fn test_apply_replaces_existing_deps() {
        let from = Label::new("", "test", "dep_typescript");
        let rule = GeneratedRule::new("ts_library", "dep_typescript")
            .with_attr(DEPS_ATTR, json!(["//stale:dep"]));

        let out = apply_resolutions(
            rule,
            &[
                resolved(
                    "foo/foo.ts",
                    Ok(Resolution::Indexed {
                        label: Label::new("", "foo", "foo_typescript"),
                    }),
                ),
                resolved(
                    "test/local.ts",
                    Ok(Resolution::Indexed {
                        label: Label::new("", "test", "local_typescript"),
                    }),
                ),
            ],
            &from,
        );

        assert_eq!(out.deps(), vec!["//foo:foo_typescript", ":local_typescript"]);
    }

    #[test]
    fn test_apply_omits_self_and_ambiguous() {
        let from = Label::new("", "test", "dep_typescript");
        let rule = GeneratedRule::new("ts_library", "dep_typescript")
            .with_attr(DEPS_ATTR, json!(["//stale:dep"]));

        let out = apply_resolutions(
            rule,
            &[
                resolved("test/foo.ts", Ok(Resolution::SelfReference)),
                resolved(
                    "foo/foo.ts",
                    Err(ResolveError::Ambiguous {
                        import: ImportSpec::new("typescript", "foo/foo.ts"),
                        from: from.clone(),
                        candidates: vec![Label::new("", "foo", "a"), Label::new("", "foo", "b")],
                    }),
                ),
            ],
            &from,
        );

        assert!(out.attr(DEPS_ATTR).is_none());
    }

    #[test]
    fn test_apply_dedupes() {
        let from = Label::new("", "test", "dep");
        let guess = Label::new("", "foo/bar", "bar_typescript");
        let out = apply_resolutions(
            GeneratedRule::new("ts_library", "dep"),
            &[
                resolved("foo/bar/a.ts", Ok(Resolution::Guessed { label: guess.clone() })),
                resolved("foo/bar/b.ts", Ok(Resolution::Guessed { label: guess })),
            ],
            &from,
        );
        assert_eq!(out.deps(), vec!["//foo/bar:bar_typescript"]);
    }

    #[test]
    fn test_stats() {
        let list = vec![
            resolved("a", Ok(Resolution::SelfReference)),
            resolved(
                "b",
                Ok(Resolution::Guessed {
                    label: Label::new("", "", "root_typescript"),
                }),
            ),
            resolved(
                "c",
                Ok(Resolution::Redirected {
                    label: Label::new("ext", "", "x"),
                }),
            ),
            resolved(
                "node:fs/promises",
                Err(ResolveError::NotFound {
                    import: ImportSpec::new("typescript", "node:fs/promises"),
                    from: Label::new("", "app", "app_typescript"),
                }),
            ),
        ];
        let mut stats = ResolveStats::from_resolved(&list);
        assert_eq!(stats.self_refs, 1);
        assert_eq!(stats.unresolved, 1);
        assert_eq!(stats.deps(), 2);

        stats.merge(&ResolveStats {
            ambiguous: 2,
            ..Default::default()
        });
        assert_eq!(stats.ambiguous, 2);
    }
}
