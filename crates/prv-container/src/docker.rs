use std::time::Duration;

use prv_core::{BuildError, ContainerName, ExecutionOutcome, ImageRef, RunError, TestMode, WorkingCheckout};
use prv_exec::{run_bounded, CommandSpec, ExecError};
use tracing::{info, warn};

use crate::recipe::BuildRecipe;
use crate::{ImageBuilder, TestExecutor};

/// Exit code `docker run` uses when the daemon or the run itself failed.
/// Every other code, 126 and 127 included, belongs to the entry point.
const DOCKER_FAILURE_CODE: i32 = 125;

const REMOVE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone, Debug)]
pub struct DockerImageBuilder {
    pub program: String,
    pub tag: String,
    pub accepted_base_image: String,
    pub recipe_file: String,
    pub timeout: Duration,
}

impl DockerImageBuilder {
    pub fn new(program: impl Into<String>, tag: impl Into<String>, accepted_base_image: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            tag: tag.into(),
            accepted_base_image: accepted_base_image.into(),
            recipe_file: "Dockerfile".to_string(),
            timeout: Duration::from_secs(300),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl ImageBuilder for DockerImageBuilder {
    fn build(&self, checkout: &WorkingCheckout) -> Result<ImageRef, BuildError> {
        let recipe = BuildRecipe::read(&checkout.root().join(&self.recipe_file))?;
        recipe.ensure_base_image(&self.accepted_base_image)?;

        info!(tag = %self.tag, root = %checkout.root().display(), "building image");
        let spec = CommandSpec::new(&self.program)
            .args(["build", "-t", self.tag.as_str(), "-f", self.recipe_file.as_str(), "."])
            .current_dir(checkout.root());
        let out = match run_bounded(&spec, self.timeout) {
            Ok(out) => out,
            Err(ExecError::TimedOut(t)) => return Err(BuildError::TimedOut(t)),
            Err(e) => return Err(BuildError::BuildFailed { log: e.to_string() }),
        };
        if !out.success() {
            warn!(tag = %self.tag, exit_code = ?out.exit_code, "image build failed");
            return Err(BuildError::BuildFailed { log: out.combined() });
        }
        Ok(ImageRef(self.tag.clone()))
    }
}

#[derive(Clone, Debug)]
pub struct DockerTestExecutor {
    pub program: String,
    pub entrypoint: String,
    pub network: String,
}

impl DockerTestExecutor {
    pub fn new(program: impl Into<String>, entrypoint: impl Into<String>) -> Self {
        Self { program: program.into(), entrypoint: entrypoint.into(), network: "none".to_string() }
    }

    fn remove_container(&self, name: &ContainerName) {
        let spec = CommandSpec::new(&self.program).args(["rm", "-f", name.as_str()]);
        if let Err(e) = run_bounded(&spec, REMOVE_TIMEOUT) {
            warn!(container = %name, error = %e, "could not remove timed-out container");
        }
    }
}

impl TestExecutor for DockerTestExecutor {
    fn run(&self, image: &ImageRef, mode: TestMode, timeout: Duration) -> Result<ExecutionOutcome, RunError> {
        let name = ContainerName::new();
        let spec = CommandSpec::new(&self.program)
            .args(["run", "--rm", "--name", name.as_str()])
            .arg(format!("--network={}", self.network))
            .args([image.as_str(), self.entrypoint.as_str(), mode.as_arg()]);

        info!(image = image.as_str(), mode = mode.as_arg(), container = %name, "running tests");
        match run_bounded(&spec, timeout) {
            Ok(out) if out.exit_code == Some(DOCKER_FAILURE_CODE) => {
                Err(RunError::Launch { reason: format!("exit {:?}: {}", out.exit_code, out.combined()) })
            }
            Ok(out) => Ok(ExecutionOutcome { exit_code: out.exit_code, output: out.combined(), elapsed: out.elapsed }),
            Err(ExecError::TimedOut(t)) => {
                self.remove_container(&name);
                Err(RunError::TimedOut(t))
            }
            Err(e) => Err(RunError::Launch { reason: e.to_string() }),
        }
    }
}
