pub mod docker;
pub mod recipe;

use std::time::Duration;

use prv_core::{BuildError, ExecutionOutcome, ImageRef, RunError, TestMode, WorkingCheckout};

pub use docker::*;
pub use recipe::*;

/// Builds the checkout's recipe into an image under a fixed logical tag.
pub trait ImageBuilder: Send + Sync {
    fn build(&self, checkout: &WorkingCheckout) -> Result<ImageRef, BuildError>;
}

/// Runs the problem's test entry point inside a disposable container.
pub trait TestExecutor: Send + Sync {
    fn run(&self, image: &ImageRef, mode: TestMode, timeout: Duration) -> Result<ExecutionOutcome, RunError>;
}
