pub mod deps;
pub mod index;
pub mod redirect;
pub mod resolver;

pub use deps::{apply_resolutions, ResolveStats};
pub use index::{ImportIndex, ImportIndexBuilder};
pub use redirect::{Redirect, RedirectTable};
pub use resolver::{guess_label, rule_name, Resolution, ResolveError, ResolvedImport, Resolver};
