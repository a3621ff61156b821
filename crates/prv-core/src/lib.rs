pub mod errors;
pub mod ids;
pub mod model;
pub mod report;
pub mod types;

pub use errors::*;
pub use ids::*;
pub use model::*;
pub use report::*;
pub use types::*;
