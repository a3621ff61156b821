pub mod description;
pub mod metadata;
pub mod package;

pub use description::*;
pub use metadata::*;
pub use package::*;
