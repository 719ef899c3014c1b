//! Instruction-level debugger core: drives a CPU emulation engine with user-defined
//! memory regions, register loading, breakpoints, single-stepping, exception
//! decoding, and disassembly.

/// Error taxonomy and classification.
pub mod error;
pub use error::{
    ArchError, DebuggerError, DisassemblyError, EngineError, ErrorClass, RegionError,
    RegisterError,
};

mod literal;

/// Register definitions, values, and per-architecture tables.
pub mod register;
pub use register::{
    DisplayFormat, EngineRegister, Flag, RegisterDefinition, RegisterTable, RegisterValue,
};

/// Decoded CPU exceptions.
pub mod exception;
pub use exception::Exception;

/// Architecture abstraction and the ARM definition.
pub mod arch;
pub use arch::{
    Arch, Architecture, Arm, ArmTrap, Cpsr, Endianness, Processor, ProcessorMode,
};

/// User-defined memory regions.
pub mod memory;
pub use memory::{MemRegion, MemRegionSet, Permissions, CODE_REGION};

/// Address breakpoints.
pub mod breakpoint;
pub use breakpoint::{Breakpoint, BreakpointId, BreakpointSet, BreakpointState};

/// Emulation engine trait seam.
pub mod engine;
pub use engine::{Engine, HookContext, Protection};

/// Execution hooks invoked by the engine.
pub mod hooks;
pub use hooks::{ExecutionHooks, StopReason};

/// Disassembly trait seam and row type.
pub mod disasm;
pub use disasm::{Disassembler, DisassemblyRow};

/// Session configuration.
pub mod config;
pub use config::DebuggerConfig;

/// Debugger controller.
pub mod debugger;
pub use debugger::{Debugger, RunOutcome, RunState};

/// Library-backed engine and disassembler implementations.
pub mod backend;

#[cfg(test)]
use proptest as _;
#[cfg(test)]
use rstest as _;
#[cfg(test)]
use tempfile as _;
