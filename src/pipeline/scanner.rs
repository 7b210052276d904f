use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use ignore::WalkBuilder;

use crate::types::{GenerateArgs, GeneratedRule};

pub const IGNORE_FILE: &str = ".buildgenignore";

/// One directory of the repository, as seen by rule generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageDir {
    pub dir: PathBuf,
    pub rel: String,
    pub regular_files: Vec<String>,
    pub subdirs: Vec<String>,
}

impl PackageDir {
    fn new(dir: &Path, rel: String) -> Self {
        Self {
            dir: dir.to_path_buf(),
            rel,
            regular_files: Vec::new(),
            subdirs: Vec::new(),
        }
    }

    pub fn to_args(&self, other_rules: Vec<GeneratedRule>) -> GenerateArgs {
        GenerateArgs {
            dir: self.dir.clone(),
            rel: self.rel.clone(),
            regular_files: self.regular_files.clone(),
            subdirs: self.subdirs.clone(),
            other_rules,
        }
    }
}

/// Walk `root`, honouring `.gitignore` and `.buildgenignore`, and list every
/// directory sorted by relative path.
pub fn scan_packages(root: &Path) -> crate::Result<Vec<PackageDir>> {
    let walker = WalkBuilder::new(root)
        .hidden(true)
        .git_ignore(true)
        .add_custom_ignore_filename(IGNORE_FILE)
        .build();

    let mut dirs: BTreeMap<String, PackageDir> = BTreeMap::new();
    dirs.insert(String::new(), PackageDir::new(root, String::new()));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(error = %e, "Skipping unreadable entry");
                continue;
            }
        };
        let path = entry.path();
        let Ok(relpath) = path.strip_prefix(root) else {
            continue;
        };
        let rel = slash_path(relpath);
        if rel.is_empty() {
            continue;
        }
        let Some(file_type) = entry.file_type() else {
            continue;
        };

        let (parent, base) = match rel.rsplit_once('/') {
            Some((parent, base)) => (parent.to_string(), base.to_string()),
            None => (String::new(), rel.clone()),
        };
        let parent_dir = path.parent().unwrap_or(root);
        let parent_entry = dirs
            .entry(parent.clone())
            .or_insert_with(|| PackageDir::new(parent_dir, parent));

        if file_type.is_dir() {
            parent_entry.subdirs.push(base);
            dirs.entry(rel.clone())
                .or_insert_with(|| PackageDir::new(path, rel));
        } else if file_type.is_file() {
            parent_entry.regular_files.push(base);
        }
    }

    let mut packages: Vec<PackageDir> = dirs.into_values().collect();
    for pkg in &mut packages {
        pkg.regular_files.sort();
        pkg.subdirs.sort();
    }

    tracing::debug!(root = %root.display(), packages = packages.len(), "Scanned repository");
    Ok(packages)
}

fn slash_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
