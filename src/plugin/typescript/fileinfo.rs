use std::collections::BTreeSet;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

/// Imports found in a single `.ts` file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileInfo {
    pub name: String,
    /// Sorted, de-duplicated module specifiers as written in the source.
    pub imports: Vec<String>,
}

static IMPORT_RE: OnceLock<Regex> = OnceLock::new();

fn import_re() -> &'static Regex {
    IMPORT_RE.get_or_init(|| {
        Regex::new(r#"(?m)^\s*(?:import|export)\s+(?:type\s+)?(?:[\w*{}\s,$]+?\s+from\s+)?["']([^"'\n]+)["']"#)
            .expect("import regex is valid")
    })
}

pub fn is_typescript_file(name: &str) -> bool {
    name.ends_with(".ts") || name.ends_with(".tsx")
}

/// Extract module specifiers from `import` / `export ... from` statements.
pub fn extract_imports(content: &str) -> Vec<String> {
    let imports: BTreeSet<String> = import_re()
        .captures_iter(content)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .collect();
    imports.into_iter().collect()
}

pub async fn read_file_info(dir: &Path, name: &str) -> FileInfo {
    let path = dir.join(name);
    let imports = match tokio::fs::read_to_string(&path).await {
        Ok(content) => extract_imports(&content),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Error reading typescript file");
            Vec::new()
        }
    };
    FileInfo {
        name: name.to_string(),
        imports,
    }
}

/// Turn a specifier into a repository-relative import.
///
/// Relative specifiers are joined with `rel` and get a `.ts` extension unless
/// they already end in `.ts` or `.tsx`, so dotted module names like
/// `./app.component` still name a source file. Anything else is returned
/// unchanged.
pub fn normalize_import(rel: &str, imp: &str) -> String {
    if !(imp.starts_with("./") || imp.starts_with("../")) {
        return imp.to_string();
    }

    let mut parts: Vec<&str> = rel.split('/').filter(|s| !s.is_empty()).collect();
    for segment in imp.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            s => parts.push(s),
        }
    }

    let mut joined = parts.join("/");
    if !(joined.ends_with(".ts") || joined.ends_with(".tsx")) {
        joined.push_str(".ts");
    }
    joined
}
