pub mod contract;
pub mod types;

pub use types::*;
