mod analyzer;
pub mod remote;
pub mod typescript;

pub use analyzer::Analyzer;
pub use remote::RemoteAnalyzer;
pub use typescript::TypeScriptAnalyzer;
