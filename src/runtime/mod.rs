pub mod build;
pub mod context;
pub mod error;
pub mod types;
pub mod validation;
pub mod value;

pub use context::{Mode, TypeContext, WarningSink};
pub use types::TypeRef;
