use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::error::BuildgenError;

/// A build target reference such as `@repo//pkg/path:name`.
///
/// The default value is the "no label" sentinel; check it with [`Label::is_empty`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label {
    pub repo: String,
    pub pkg: String,
    pub name: String,
    /// Rendered as `:name` only. Produced by [`Label::rel`].
    pub relative: bool,
}

impl Label {
    pub fn new(repo: impl Into<String>, pkg: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            repo: repo.into(),
            pkg: pkg.into(),
            name: name.into(),
            relative: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_empty()
    }

    /// True if the rendered form parses back to this exact label.
    pub fn is_well_formed(&self) -> bool {
        !self.is_empty()
            && matches!(self.to_string().parse::<Label>(), Ok(parsed) if parsed == *self)
    }

    /// Render this label as seen from `repo` / `pkg`.
    pub fn rel(&self, repo: &str, pkg: &str) -> Label {
        if self.relative || self.repo != repo {
            return self.clone();
        }
        if self.pkg == pkg {
            return Label {
                repo: String::new(),
                pkg: String::new(),
                name: self.name.clone(),
                relative: true,
            };
        }
        Label {
            repo: String::new(),
            pkg: self.pkg.clone(),
            name: self.name.clone(),
            relative: false,
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.relative {
            return write!(f, ":{}", self.name);
        }
        if !self.repo.is_empty() {
            write!(f, "@{}", self.repo)?;
        }
        write!(f, "//{}:{}", self.pkg, self.name)
    }
}

impl FromStr for Label {
    type Err = BuildgenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || BuildgenError::InvalidLabel(s.to_string());

        if let Some(name) = s.strip_prefix(':') {
            if name.is_empty() || name.contains(['/', ':']) {
                return Err(invalid());
            }
            return Ok(Label {
                repo: String::new(),
                pkg: String::new(),
                name: name.to_string(),
                relative: true,
            });
        }

        let (repo, rest) = match s.strip_prefix('@') {
            Some(qualified) => qualified.split_once("//").ok_or_else(invalid)?,
            None => ("", s.strip_prefix("//").ok_or_else(invalid)?),
        };
        let (pkg, name) = match rest.split_once(':') {
            Some((pkg, name)) => (pkg, name.to_string()),
            None => {
                let base = rest.rsplit('/').next().unwrap_or(rest);
                let name = if base.is_empty() { repo } else { base };
                (rest, name.to_string())
            }
        };

        if name.is_empty() || name.contains(':') || pkg.starts_with('/') || pkg.ends_with('/') {
            return Err(invalid());
        }

        Ok(Label::new(repo, pkg, name))
    }
}

impl Serialize for Label {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Label {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(Label::new("", "foo/bar", "baz").to_string(), "//foo/bar:baz");
        assert_eq!(Label::new("", "", "root_typescript").to_string(), "//:root_typescript");
        assert_eq!(
            Label::new("com_google_protobuf", "", "any_proto").to_string(),
            "@com_google_protobuf//:any_proto"
        );
    }

    #[test]
    fn test_parse() {
        assert_eq!("//foo:bar".parse::<Label>().unwrap(), Label::new("", "foo", "bar"));
        assert_eq!("//foo/bar".parse::<Label>().unwrap(), Label::new("", "foo/bar", "bar"));
        assert_eq!(
            "@ext//pkg:t".parse::<Label>().unwrap(),
            Label::new("ext", "pkg", "t")
        );
        assert_eq!("@ext//".parse::<Label>().unwrap(), Label::new("ext", "", "ext"));

        let local: Label = ":t".parse().unwrap();
        assert!(local.relative);
        assert_eq!(local.to_string(), ":t");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("foo:bar".parse::<Label>().is_err());
        assert!("//foo:".parse::<Label>().is_err());
        assert!("//foo/:bar".parse::<Label>().is_err());
        assert!(":".parse::<Label>().is_err());
        assert!("@repo".parse::<Label>().is_err());
    }

    #[test]
    fn test_rel() {
        let label = Label::new("", "foo", "foo_typescript");
        assert_eq!(label.rel("", "foo").to_string(), ":foo_typescript");
        assert_eq!(label.rel("", "other").to_string(), "//foo:foo_typescript");

        let external = Label::new("ext", "", "any");
        assert_eq!(external.rel("", "foo").to_string(), "@ext//:any");
        assert_eq!(external.rel("ext", "pkg").to_string(), "//:any");
    }

    #[test]
    fn test_default_is_empty() {
        assert!(Label::default().is_empty());
        assert!(!Label::new("", "", "x").is_empty());
    }

    #[test]
    fn test_serde_as_string() {
        let label = Label::new("", "foo", "bar");
        let json = serde_json::to_string(&label).unwrap();
        assert_eq!(json, "\"//foo:bar\"");
        let back: Label = serde_json::from_str(&json).unwrap();
        assert_eq!(back, label);
    }

    #[test]
    fn test_well_formed() {
        assert!(Label::new("", "foo", "bar").is_well_formed());
        assert!(Label::new("ext", "", "any").is_well_formed());
        assert!(Label::new("", "foo", "bar").rel("", "foo").is_well_formed());
        assert!(!Label::new("", "node:fs", "node:fs_typescript").is_well_formed());
        assert!(!Label::new("", "/abs", "x").is_well_formed());
        assert!(!Label::default().is_well_formed());
    }
}
