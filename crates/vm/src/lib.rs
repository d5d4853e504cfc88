// Path: crates/vm/src/lib.rs
//! The contract execution seam and the built-in metered stack machine.
//!
//! The kernel talks to *a* VM through [`Vm`]; the interpreter in
//! [`machine`] is the reference implementation. Alternative engines plug
//! in behind the same trait.

pub mod machine;

use thiserror::Error;

/// Faults a VM run can end in. `Reverted` is the one recoverable halt: the
/// caller keeps the gas charge and receives the revert payload.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum VmError {
    /// Execution halted via REVERT.
    #[error("execution reverted")]
    Reverted {
        /// The revert payload.
        data: Vec<u8>,
        /// Gas consumed up to and including the revert.
        gas_used: u64,
    },
    /// The gas budget ran out.
    #[error("out of gas (budget {gas_limit})")]
    OutOfGas {
        /// The exhausted budget.
        gas_limit: u64,
    },
    /// An undefined opcode was hit.
    #[error("invalid opcode 0x{0:02x}")]
    InvalidOpcode(u8),
    /// A stack pop on an empty stack.
    #[error("stack underflow at pc {0}")]
    StackUnderflow(usize),
    /// The stack grew past its limit.
    #[error("stack overflow at pc {0}")]
    StackOverflow(usize),
    /// A jump to a non-JUMPDEST target.
    #[error("invalid jump destination {0}")]
    BadJumpDestination(usize),
    /// A memory access outside addressable bounds.
    #[error("memory access out of bounds at pc {0}")]
    MemoryOutOfBounds(usize),
    /// A host (storage) operation failed.
    #[error("host error: {0}")]
    Host(String),
}

impl VmError {
    /// Whether the fault is a revert (recoverable) rather than a hard halt.
    pub fn is_revert(&self) -> bool {
        matches!(self, VmError::Reverted { .. })
    }
}

/// Storage access handed to the VM for the duration of one call.
pub trait CallState {
    /// Reads a storage cell of the executing contract.
    fn get_storage(&self, key: &[u8]) -> Result<Vec<u8>, VmError>;
    /// Writes a storage cell of the executing contract. An empty value
    /// clears the cell.
    fn set_storage(&mut self, key: &[u8], value: &[u8]) -> Result<(), VmError>;
}

/// Parameters of one VM invocation.
#[derive(Debug, Clone)]
pub struct CallParams {
    /// The calling account.
    pub caller: [u8; 20],
    /// The account whose storage is in scope.
    pub callee: [u8; 20],
    /// Call input data.
    pub input: Vec<u8>,
    /// Value transferred with the call.
    pub value: u64,
    /// Gas budget.
    pub gas_limit: u64,
}

/// A successful VM run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VmOutput {
    /// Data returned by the code.
    pub return_data: Vec<u8>,
    /// Gas consumed and to be charged.
    pub gas_used: u64,
}

/// A pluggable contract execution engine.
pub trait Vm: Send + Sync {
    /// Runs `code` under `params` against `state`.
    fn execute(
        &self,
        state: &mut dyn CallState,
        code: &[u8],
        params: &CallParams,
    ) -> Result<VmOutput, VmError>;
}
