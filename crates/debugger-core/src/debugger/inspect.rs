use std::ops::Range;

use regex::Regex;

use crate::arch::{Arch, Architecture, Endianness, ProcessorMode};
use crate::breakpoint::{Breakpoint, BreakpointId};
use crate::config::DebuggerConfig;
use crate::debugger::Debugger;
use crate::disasm::{Disassembler, DisassemblyRow};
use crate::engine::Engine;
use crate::error::DebuggerError;
use crate::hooks;
use crate::memory::MemRegion;
use crate::register::{RegisterDefinition, RegisterValue};

impl<E: Engine, D: Disassembler> Debugger<E, D> {
    /// Target architecture.
    #[must_use]
    pub const fn arch(&self) -> Architecture {
        self.config.arch()
    }

    /// Configuration the session was booted from.
    #[must_use]
    pub const fn config(&self) -> &DebuggerConfig {
        &self.config
    }

    /// Underlying engine.
    #[must_use]
    pub const fn engine(&self) -> &E {
        &self.engine
    }

    /// Mutable access to the underlying engine. Changes made here bypass the
    /// debugger's bookkeeping.
    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    /// Reads one register.
    ///
    /// # Errors
    ///
    /// Returns [`DebuggerError::RegisterRead`] if the engine rejects the read.
    pub fn read_register(
        &self,
        definition: &'static RegisterDefinition,
    ) -> Result<RegisterValue, DebuggerError> {
        self.read_raw(definition)
    }

    /// Reads one register by name or alias.
    ///
    /// # Errors
    ///
    /// Returns [`DebuggerError`] for unknown names or engine failures.
    pub fn read_register_by_name(&self, name: &str) -> Result<RegisterValue, DebuggerError> {
        let definition = self.arch().register(name)?;
        self.read_raw(definition)
    }

    /// Reads every register in architecture order.
    ///
    /// # Errors
    ///
    /// Returns [`DebuggerError::RegisterRead`] for the first register the engine rejects.
    pub fn read_registers(&self) -> Result<Vec<RegisterValue>, DebuggerError> {
        hooks::read_registers(&self.engine, self.arch().registers())
    }

    /// Writes one register.
    ///
    /// Program counter writes are adjusted for the current instruction-set mode.
    ///
    /// # Errors
    ///
    /// Returns [`DebuggerError`] if the engine rejects the write or the mode cannot be
    /// determined.
    pub fn write_register(&mut self, value: RegisterValue) -> Result<(), DebuggerError> {
        let raw = if value.is_program_counter() {
            let registers = self.read_registers()?;
            self.arch()
                .current_program_counter(value.value(), &registers)?
        } else {
            value.value()
        };
        self.write_raw(value.definition(), raw)
    }

    /// Writes one register by name or alias; the value is masked to the register width.
    ///
    /// # Errors
    ///
    /// Returns [`DebuggerError`] for unknown names or engine failures.
    pub fn write_register_by_name(&mut self, name: &str, value: u64) -> Result<(), DebuggerError> {
        let definition = self.arch().register(name)?;
        self.write_register(RegisterValue::new(definition, value))
    }

    /// Writes several registers; the program counter, if present, is written last.
    ///
    /// # Errors
    ///
    /// Returns the first failure; earlier writes stay applied.
    pub fn write_registers(&mut self, values: &[RegisterValue]) -> Result<(), DebuggerError> {
        for value in values.iter().filter(|v| !v.is_program_counter()) {
            self.write_register(*value)?;
        }
        for value in values.iter().filter(|v| v.is_program_counter()) {
            self.write_register(*value)?;
        }
        Ok(())
    }

    /// Reads `len` bytes of emulated memory.
    ///
    /// # Errors
    ///
    /// Returns [`DebuggerError::MemoryRead`] if any byte is unmapped.
    pub fn read_memory(&self, address: u64, len: usize) -> Result<Vec<u8>, DebuggerError> {
        self.engine
            .mem_read(address, len)
            .map_err(|source| DebuggerError::MemoryRead {
                address,
                len,
                source,
            })
    }

    /// Writes bytes into emulated memory.
    ///
    /// # Errors
    ///
    /// Returns [`DebuggerError::MemoryWrite`] if any byte is unmapped.
    pub fn write_memory(&mut self, address: u64, data: &[u8]) -> Result<(), DebuggerError> {
        self.engine
            .mem_write(address, data)
            .map_err(|source| DebuggerError::MemoryWrite {
                address,
                len: data.len(),
                source,
            })
    }

    /// Program counter adjusted for the current mode, i.e. the address execution
    /// resumes from.
    ///
    /// # Errors
    ///
    /// Returns [`DebuggerError`] if registers cannot be read.
    pub fn pc(&self) -> Result<u64, DebuggerError> {
        let registers = self.read_registers()?;
        let pc = self.program_counter_in(&registers);
        Ok(self.arch().current_program_counter(pc, &registers)?)
    }

    /// Current data endianness.
    ///
    /// # Errors
    ///
    /// Returns [`DebuggerError`] if registers cannot be read.
    pub fn endianness(&self) -> Result<Endianness, DebuggerError> {
        let registers = self.read_registers()?;
        Ok(self.arch().endianness(&registers)?)
    }

    /// Current instruction-set mode.
    ///
    /// # Errors
    ///
    /// Returns [`DebuggerError`] if registers cannot be read.
    pub fn current_mode(&self) -> Result<ProcessorMode, DebuggerError> {
        let registers = self.read_registers()?;
        Ok(self.arch().current_mode(&registers)?)
    }

    /// Disassembles up to `count` instructions starting at the program counter.
    ///
    /// # Errors
    ///
    /// Returns [`DebuggerError`] if memory cannot be read or the disassembler fails.
    pub fn disassemble(&mut self, count: usize) -> Result<Vec<DisassemblyRow>, DebuggerError> {
        let registers = self.read_registers()?;
        let pc = self.program_counter_in(&registers);
        self.disassemble_at(pc, count)
    }

    /// Disassembles up to `count` instructions starting at `address`.
    ///
    /// The read is clipped to the end of the region containing `address`.
    ///
    /// # Errors
    ///
    /// Returns [`DebuggerError::Unmapped`] if `address` is outside every mapped region,
    /// or memory and disassembler failures.
    pub fn disassemble_at(
        &mut self,
        address: u64,
        count: usize,
    ) -> Result<Vec<DisassemblyRow>, DebuggerError> {
        if count == 0 {
            return Ok(Vec::new());
        }
        let available = self
            .mapped
            .containing(address)
            .map(|region| region.end() - address)
            .ok_or(DebuggerError::Unmapped(address))?;
        let wanted = count.saturating_mul(self.arch().max_instruction_length());
        let len = usize::try_from(available).map_or(wanted, |available| wanted.min(available));

        let bytes = self.read_memory(address, len)?;
        let mode = self.current_mode()?;
        self.disassembler
            .disassemble(mode, &bytes, address, count)
            .map_err(DebuggerError::Disassembly)
    }

    /// Mapped regions in ascending base order.
    #[must_use]
    pub fn mapped_regions(&self) -> Vec<&MemRegion> {
        self.mapped.sorted_by_base()
    }

    /// Adds an armed breakpoint at `address`.
    pub fn set_breakpoint(&mut self, address: u64) -> Breakpoint {
        let breakpoint = self.hooks.breakpoints_mut().add(address);
        log::debug!("{breakpoint}");
        breakpoint
    }

    /// Removes a breakpoint by id.
    pub fn remove_breakpoint(&mut self, id: BreakpointId) -> Option<Breakpoint> {
        self.hooks.breakpoints_mut().remove(id)
    }

    /// Removes every breakpoint at `address`, returning how many were removed.
    pub fn remove_breakpoints_at(&mut self, address: u64) -> usize {
        self.hooks.breakpoints_mut().remove_all_at(address)
    }

    /// Removes every breakpoint. Ids are not reused.
    pub fn remove_all_breakpoints(&mut self) {
        self.hooks.breakpoints_mut().remove_all();
    }

    /// All breakpoints in ascending id order.
    #[must_use]
    pub fn breakpoints(&self) -> Vec<Breakpoint> {
        self.hooks.breakpoints().get()
    }

    /// Breakpoints at `address` in ascending id order.
    #[must_use]
    pub fn breakpoints_at(&self, address: u64) -> Vec<Breakpoint> {
        self.hooks.breakpoints().get_at(address)
    }

    /// Re-enables a breakpoint. Returns `false` for unknown ids.
    pub fn enable_breakpoint(&mut self, id: BreakpointId) -> bool {
        self.hooks.breakpoints_mut().enable(id)
    }

    /// Disables a breakpoint. Returns `false` for unknown ids.
    pub fn disable_breakpoint(&mut self, id: BreakpointId) -> bool {
        self.hooks.breakpoints_mut().disable(id)
    }

    /// Clears a breakpoint's hit count and re-arms it. Returns `false` for unknown ids.
    pub fn reset_breakpoint(&mut self, id: BreakpointId) -> bool {
        self.hooks.breakpoints_mut().reset(id)
    }

    /// Compiled expression matching any whole register name or alias, case-insensitively.
    #[must_use]
    pub const fn register_regex(&self) -> &Regex {
        &self.register_regex
    }

    /// Source of [`Debugger::register_regex`].
    #[must_use]
    pub fn register_pattern(&self) -> &str {
        self.register_regex.as_str()
    }

    /// Byte ranges of [`Debugger::register_regex`] matches in `text`.
    #[must_use]
    pub fn find_register_names(&self, text: &str) -> Vec<Range<usize>> {
        self.register_regex
            .find_iter(text)
            .map(|m| m.range())
            .collect()
    }

    fn program_counter_in(&self, registers: &[RegisterValue]) -> u64 {
        let pc = self.arch().program_counter();
        registers
            .iter()
            .find(|register| register.name() == pc.name)
            .map_or(0, RegisterValue::value)
    }
}
