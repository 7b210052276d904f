pub mod error;
pub mod import;
pub mod label;
pub mod rule;

pub use error::{BuildgenError, CloseReason, Result};
pub use import::ImportSpec;
pub use label::Label;
pub use rule::{GenerateArgs, GeneratedRule, KindInfo, DEPS_ATTR};
