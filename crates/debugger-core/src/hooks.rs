//! Per-instruction and per-interrupt callbacks run by the engine during execution.

use std::mem;

use crate::arch::{Arch, Architecture};
use crate::breakpoint::BreakpointSet;
use crate::engine::HookContext;
use crate::error::DebuggerError;
use crate::exception::Exception;
use crate::register::{RegisterDefinition, RegisterValue};

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum StopReason {
    /// An armed breakpoint was reached; the instruction there has not executed.
    Breakpoint {
        /// Breakpoint address.
        address: u64,
    },
    /// The CPU raised an exception.
    Exception {
        /// Engine interrupt number.
        number: u32,
    },
    /// The requested number of instructions executed.
    InstructionCount,
    /// Execution left the code region or reached its end.
    EndOfCode,
}

/// Execution-time state shared between the debugger and the engine's hooks.
///
/// Engines hand themselves to [`ExecutionHooks::on_instruction`] and
/// [`ExecutionHooks::on_interrupt`] as a [`HookContext`]. Once a stop has been
/// requested, further callbacks in the same run are ignored.
#[derive(Debug, Default)]
pub struct ExecutionHooks {
    arch: Architecture,
    breakpoints: BreakpointSet,
    remaining: Option<u64>,
    executed: u64,
    snapshot: Vec<RegisterValue>,
    exception: Exception,
    stop: Option<StopReason>,
    failure: Option<DebuggerError>,
}

/// Everything a finished run left behind.
#[derive(Debug)]
pub(crate) struct HookReport {
    pub(crate) stop: Option<StopReason>,
    pub(crate) executed: u64,
    pub(crate) snapshot: Vec<RegisterValue>,
    pub(crate) exception: Exception,
    pub(crate) failure: Option<DebuggerError>,
}

impl ExecutionHooks {
    /// Creates hooks for `arch` with no breakpoints.
    #[must_use]
    pub fn new(arch: Architecture) -> Self {
        Self {
            arch,
            ..Self::default()
        }
    }

    /// Breakpoints checked before every instruction.
    #[must_use]
    pub const fn breakpoints(&self) -> &BreakpointSet {
        &self.breakpoints
    }

    /// Mutable access to the breakpoints.
    pub fn breakpoints_mut(&mut self) -> &mut BreakpointSet {
        &mut self.breakpoints
    }

    /// Stop requested during the current run, if any.
    #[must_use]
    pub const fn stop_reason(&self) -> Option<StopReason> {
        self.stop
    }

    /// Instructions allowed to proceed during the current run.
    #[must_use]
    pub const fn executed(&self) -> u64 {
        self.executed
    }

    /// Clears per-run state. `limit` is the number of instructions to execute, or
    /// `None` to run until something else stops execution.
    pub(crate) fn begin(&mut self, limit: Option<u64>) {
        self.remaining = limit;
        self.executed = 0;
        self.snapshot.clear();
        self.exception = Exception::none();
        self.stop = None;
        self.failure = None;
    }

    /// Takes the results of the finished run.
    pub(crate) fn finish(&mut self) -> HookReport {
        self.remaining = None;
        HookReport {
            stop: self.stop.take(),
            executed: mem::take(&mut self.executed),
            snapshot: mem::take(&mut self.snapshot),
            exception: mem::take(&mut self.exception),
            failure: self.failure.take(),
        }
    }

    /// Called by the engine before the instruction at `address` executes.
    ///
    /// Stops the run, after snapshotting every register, if an armed breakpoint is at
    /// `address` or the instruction budget is spent.
    pub fn on_instruction(&mut self, ctx: &mut dyn HookContext, address: u64, size: u32) {
        if self.stop.is_some() {
            return;
        }

        let triggered = self.breakpoints.process(address);
        if !triggered && self.remaining != Some(0) {
            if let Some(remaining) = self.remaining.as_mut() {
                *remaining -= 1;
            }
            self.executed += 1;
            return;
        }

        let reason = if triggered {
            log::debug!("breakpoint hit at 0x{address:08x}");
            StopReason::Breakpoint { address }
        } else {
            log::trace!("instruction budget spent at 0x{address:08x} ({size} bytes)");
            StopReason::InstructionCount
        };
        self.stop = Some(reason);

        // Stopping from inside the hook clobbers some registers on the way out of the
        // engine; the snapshot is written back once the run returns.
        match read_registers(ctx, self.arch.registers()) {
            Ok(registers) => self.snapshot = registers,
            Err(err) => self.fail(err),
        }
        if let Err(source) = ctx.stop() {
            self.fail(DebuggerError::Hook {
                stage: "stop request",
                source,
            });
        }
    }

    /// Called by the engine when the CPU raises interrupt `number`.
    ///
    /// Stops the run and decodes the exception from the registers and the instruction
    /// bytes at the program counter.
    pub fn on_interrupt(&mut self, ctx: &mut dyn HookContext, number: u32) {
        if matches!(self.stop, Some(StopReason::Exception { .. })) {
            return;
        }
        self.stop = Some(StopReason::Exception { number });
        if let Err(source) = ctx.stop() {
            self.fail(DebuggerError::Hook {
                stage: "stop request",
                source,
            });
        }

        match self.decode_interrupt(ctx, number) {
            Ok(exception) => {
                log::debug!("exception at 0x{:08x}: {exception}", exception.pc());
                self.exception = exception;
            }
            Err(err) => self.fail(err),
        }
    }

    fn decode_interrupt(
        &self,
        ctx: &dyn HookContext,
        number: u32,
    ) -> Result<Exception, DebuggerError> {
        let registers = read_registers(ctx, self.arch.registers())?;
        let pc = registers
            .iter()
            .find(|register| register.is_program_counter())
            .map_or(0, RegisterValue::value);
        let instruction = self.read_instruction(ctx, pc, &registers)?;
        log::trace!("decoding interrupt {number} at 0x{pc:08x}");
        self.arch
            .decode_exception(number, &registers, &instruction)
            .map_err(DebuggerError::from)
    }

    /// Reads the longest encoding at `pc`, or only the current mode's shortest one
    /// when the longer read runs off mapped memory.
    fn read_instruction(
        &self,
        ctx: &dyn HookContext,
        pc: u64,
        registers: &[RegisterValue],
    ) -> Result<Vec<u8>, DebuggerError> {
        let len = self.arch.max_instruction_length();
        let source = match ctx.mem_read(pc, len) {
            Ok(instruction) => return Ok(instruction),
            Err(source) => source,
        };
        let short = self.arch.instruction_length(self.arch.current_mode(registers)?);
        if short < len {
            if let Ok(instruction) = ctx.mem_read(pc, short) {
                return Ok(instruction);
            }
        }
        Err(DebuggerError::MemoryRead {
            address: pc,
            len,
            source,
        })
    }

    fn fail(&mut self, err: DebuggerError) {
        log::error!("execution hook failed: {err}");
        if self.failure.is_none() {
            self.failure = Some(err);
        }
    }
}

/// Reads every register in `definitions`, in order.
///
/// # Errors
///
/// Returns [`DebuggerError::RegisterRead`] naming the first register the engine rejects.
pub(crate) fn read_registers(
    ctx: &dyn HookContext,
    definitions: &'static [RegisterDefinition],
) -> Result<Vec<RegisterValue>, DebuggerError> {
    definitions
        .iter()
        .map(|definition| {
            ctx.reg_read(definition.engine_id)
                .map(|value| RegisterValue::new(definition, value))
                .map_err(|source| DebuggerError::RegisterRead {
                    register: definition.name,
                    source,
                })
        })
        .collect()
}
