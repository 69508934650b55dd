//! The extraction stage contract.

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::pipe_output::PipeOutput;

/// A named unit of extraction work.
///
/// Implementors provide [`Pipe::produce`]; callers go through [`Pipe::run`],
/// which checks the output contract before handing the tables on. A pipe never
/// touches the graph store.
pub trait Pipe {
    /// Stage-specific input, usually borrowing tables of an upstream output.
    type Input<'a>;

    /// Stage name, as used in graph requests (e.g. `"medGen"`).
    fn name(&self) -> &str;

    /// Name of the stage whose output this stage consumes, if any.
    fn depends_on(&self) -> Option<&str>;

    /// Produce this stage's node tables.
    fn produce(&self, input: Self::Input<'_>) -> Result<PipeOutput>;

    /// Produce and validate the output.
    fn run(&self, input: Self::Input<'_>) -> Result<PipeOutput> {
        debug!("Running pipe '{}'", self.name());
        let output = self.produce(input)?;
        if output.pipe() != self.name() {
            return Err(Error::ContractViolation(format!(
                "pipe '{}' returned output labelled '{}'",
                self.name(),
                output.pipe()
            )));
        }
        info!(
            "Pipe '{}' produced {} node tables",
            self.name(),
            output.len()
        );
        Ok(output)
    }
}
