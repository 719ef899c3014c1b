//! Emulation engine seam.
//!
//! The debugger drives any CPU emulator that can map memory, access registers, run
//! between two addresses, and call back before each instruction and on each interrupt.

use bitflags::bitflags;

use crate::arch::{Processor, ProcessorMode};
use crate::error::EngineError;
use crate::hooks::ExecutionHooks;
use crate::memory::Permissions;
use crate::register::EngineRegister;

bitflags! {
    /// Page protection passed to [`Engine::mem_map`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Protection: u32 {
        /// Readable.
        const READ = 1;
        /// Writable.
        const WRITE = 2;
        /// Executable.
        const EXEC = 4;
    }
}

impl From<Permissions> for Protection {
    fn from(permissions: Permissions) -> Self {
        let mut protection = Self::empty();
        protection.set(Self::READ, permissions.read);
        protection.set(Self::WRITE, permissions.write);
        protection.set(Self::EXEC, permissions.execute);
        protection
    }
}

/// Engine operations that are legal from inside an execution hook.
pub trait HookContext {
    /// Reads a register.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] if the engine rejects the register id.
    fn reg_read(&self, register: EngineRegister) -> Result<u64, EngineError>;

    /// Reads `len` bytes starting at `address`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] if any byte is unmapped or unreadable.
    fn mem_read(&self, address: u64, len: usize) -> Result<Vec<u8>, EngineError>;

    /// Requests that the current run stop before the next instruction.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] if the engine cannot honor the request.
    fn stop(&mut self) -> Result<(), EngineError>;
}

/// CPU emulation engine driven by the debugger.
pub trait Engine: HookContext {
    /// Creates an engine instance for `processor` starting in `mode`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] if the engine does not support the combination.
    fn open(processor: Processor, mode: ProcessorMode) -> Result<Self, EngineError>
    where
        Self: Sized;

    /// Maps `size` bytes at `base` with `protection`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] for overlapping, misaligned, or otherwise invalid mappings.
    fn mem_map(&mut self, base: u64, size: u64, protection: Protection)
        -> Result<(), EngineError>;

    /// Unmaps `size` bytes at `base`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] if the range is not mapped.
    fn mem_unmap(&mut self, base: u64, size: u64) -> Result<(), EngineError>;

    /// Writes `data` starting at `address`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] if any byte is unmapped.
    fn mem_write(&mut self, address: u64, data: &[u8]) -> Result<(), EngineError>;

    /// Writes a register.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] if the engine rejects the register id.
    fn reg_write(&mut self, register: EngineRegister, value: u64) -> Result<(), EngineError>;

    /// Arranges for [`ExecutionHooks::on_instruction`] to be called before every
    /// instruction in `code_begin..=code_end`, and [`ExecutionHooks::on_interrupt`] on
    /// every interrupt.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] if the hooks cannot be registered.
    fn install_hooks(&mut self, code_begin: u64, code_end: u64) -> Result<(), EngineError>;

    /// Runs from `begin` until execution reaches `until`, a hook requests a stop, or an
    /// unrecoverable engine error occurs. Blocks until the run ends.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] for faults the engine could not deliver to the interrupt
    /// hook, such as fetches from unmapped memory.
    fn start(
        &mut self,
        begin: u64,
        until: u64,
        hooks: &mut ExecutionHooks,
    ) -> Result<(), EngineError>;
}
