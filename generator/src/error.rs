// error.rs — Error types for validation, generation, and the CLI driver
//
// Generation is all-or-nothing: any error aborts the run before output is
// written, so no variant carries partial results.

use std::path::PathBuf;

use thiserror::Error;

use crate::id::{MachineId, NodeRef, StateId};

/// Structural problems in the input controller.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("{context} references missing {node}")]
    Dangling { node: NodeRef, context: String },

    #[error("state {state} is listed by state machines {first} and {second}")]
    SharedState {
        state: StateId,
        first: MachineId,
        second: MachineId,
    },

    #[error("state machine {machine} is nested under both {first} and {second}")]
    SharedMachine {
        machine: MachineId,
        first: MachineId,
        second: MachineId,
    },

    #[error("state machine {machine} is nested inside itself")]
    NestingCycle { machine: MachineId },

    #[error("state machine {owner} lists transitions from source {from} more than once")]
    DuplicateMachineTransitions { owner: MachineId, from: MachineId },
}

impl ModelError {
    pub(crate) fn dangling(node: NodeRef, context: String) -> Self {
        ModelError::Dangling { node, context }
    }
}

/// Invariant violations detected while emitting code.
#[derive(Debug, Error)]
pub enum GenError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("reference to {node}, which was never assigned a name")]
    Unallocated { node: NodeRef },

    #[error("could not canonicalize controller: {0}")]
    Canonicalize(#[source] serde_json::Error),
}

/// Failures in the command-line driver.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}: invalid controller JSON: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Generate(#[from] GenError),

    #[error("could not encode output: {0}")]
    Encode(#[source] serde_json::Error),
}

impl CliError {
    /// Exit status: 2 for unreadable input or unwritable output, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Io { .. } | CliError::Json { .. } => 2,
            CliError::Generate(_) | CliError::Encode(_) => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::StateId;

    #[test]
    fn display_unallocated() {
        let e = GenError::Unallocated {
            node: NodeRef::State(StateId(4)),
        };
        assert_eq!(
            e.to_string(),
            "reference to state #4, which was never assigned a name"
        );
    }

    #[test]
    fn model_errors_exit_with_one() {
        let e = CliError::from(GenError::from(ModelError::NestingCycle {
            machine: MachineId(1),
        }));
        assert_eq!(e.exit_code(), 1);
        assert_eq!(
            e.to_string(),
            "state machine #1 is nested inside itself"
        );
    }
}
