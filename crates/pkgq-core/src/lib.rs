pub mod cache;
pub mod descriptor;
pub mod error;
pub mod eval;
pub mod merge;
pub mod paths;
pub mod predicate;
pub mod preferences;
pub mod resolver;
pub mod settings;
pub mod tree;

pub use descriptor::{Descriptor, DescriptorDoc};
pub use error::{DescriptorError, ResolveError};
pub use eval::{CatalogRef, EvalError, EvalOptions, Evaluator, LockedCatalog, NodeHandle};
pub use merge::merge_by_glob_path;
pub use paths::*;
pub use predicate::Predicate;
pub use preferences::Preferences;
pub use resolver::{ResolvedMatch, Resolver};
pub use settings::{ResolverSettings, Settings};
