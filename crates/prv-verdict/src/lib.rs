pub mod engine;
pub mod rule;
pub mod types;

pub use engine::*;
pub use rule::*;
pub use types::*;
