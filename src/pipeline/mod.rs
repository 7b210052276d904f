mod runner;
mod scanner;

pub use runner::{OwnedRule, PackageRules, Pipeline, RunReport};
pub use scanner::{scan_packages, PackageDir, IGNORE_FILE};
