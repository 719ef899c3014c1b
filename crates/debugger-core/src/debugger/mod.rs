//! Debugger controller: owns one engine session and mediates every operation on it.

mod execution;
mod inspect;

pub use execution::{RunOutcome, RunState};

use regex::Regex;

use crate::arch::{Arch, Architecture};
use crate::config::DebuggerConfig;
use crate::disasm::Disassembler;
use crate::engine::Engine;
use crate::error::{DebuggerError, EngineError, RegionError};
use crate::hooks::ExecutionHooks;
use crate::memory::{MemRegion, MemRegionSet};
use crate::register::{RegisterDefinition, RegisterValue};

/// Interactive debugger over an emulation engine `E` and a disassembler `D`.
///
/// The debugger keeps its set of mapped regions in lockstep with the engine's
/// mappings. Breakpoints live in the execution hooks and survive [`Debugger::reset`].
#[derive(Debug)]
pub struct Debugger<E, D> {
    config: DebuggerConfig,
    engine: E,
    disassembler: D,
    mapped: MemRegionSet,
    hooks: ExecutionHooks,
    state: RunState,
    register_regex: Regex,
}

/// Freshly opened engine session with the configured regions and registers applied.
struct Session<E, D> {
    engine: E,
    disassembler: D,
    mapped: MemRegionSet,
}

impl<E: Engine, D: Disassembler> Debugger<E, D> {
    /// Validates `config`, opens the engine and disassembler, maps every region, loads
    /// the initial registers, and installs the execution hooks.
    ///
    /// The program counter defaults to the base of the `code` region.
    ///
    /// # Errors
    ///
    /// Returns [`DebuggerError`] if the configuration is invalid or any engine step
    /// fails. Nothing stays open on failure.
    pub fn new(config: DebuggerConfig) -> Result<Self, DebuggerError> {
        config.validate()?;
        let register_regex = config.arch().register_regex()?;
        let session = boot(config.arch(), config.regions(), config.registers())?;
        log::info!(
            "debugger ready: {} with {} regions",
            config.arch(),
            session.mapped.len()
        );
        Ok(Self {
            hooks: ExecutionHooks::new(config.arch()),
            config,
            engine: session.engine,
            disassembler: session.disassembler,
            mapped: session.mapped,
            state: RunState::Idle,
            register_regex,
        })
    }

    /// Maps and seeds a new region.
    ///
    /// # Errors
    ///
    /// Returns [`DebuggerError`] if the region is invalid, its name is taken, its input
    /// file cannot be loaded, or the engine rejects the mapping.
    pub fn map(&mut self, region: MemRegion) -> Result<(), DebuggerError> {
        map_region(&mut self.engine, &mut self.mapped, region)
    }

    /// Flushes a region to its output file, if any, then unmaps it.
    ///
    /// # Errors
    ///
    /// Returns [`RegionError::NotFound`] for unknown names, the flush failure, or the
    /// engine's unmap failure. A failed flush does not prevent the unmap. When both
    /// fail, the flush error is returned, the unmap error is logged, and the region
    /// stays mapped.
    pub fn unmap(&mut self, name: &str) -> Result<(), DebuggerError> {
        unmap_region(&mut self.engine, &mut self.mapped, name)
    }

    /// Restarts the session from the initial registers.
    ///
    /// With `keep_mappings`, the currently mapped regions are re-created and reseeded
    /// from their input files in a fresh engine. Without it, every region is flushed
    /// and unmapped first, and the session is rebuilt from the configured regions.
    /// Breakpoints are kept either way.
    ///
    /// # Errors
    ///
    /// Returns [`DebuggerError`] if booting the new session fails, otherwise the first
    /// flush or unmap failure. A release failure does not stop the new session from
    /// booting. A failed boot keeps the current engine and whatever regions it still maps.
    pub fn reset(&mut self, keep_mappings: bool) -> Result<(), DebuggerError> {
        let arch = self.config.arch();
        let (session, released) = if keep_mappings {
            (boot(arch, &self.mapped, self.config.registers())?, Ok(()))
        } else {
            let released = self.unmap_all();
            (boot(arch, self.config.regions(), self.config.registers())?, released)
        };
        self.engine = session.engine;
        self.disassembler = session.disassembler;
        self.mapped = session.mapped;
        self.state = RunState::Idle;
        log::info!("debugger reset (keep mappings: {keep_mappings})");
        released
    }

    /// Flushes and unmaps every region, then releases the engine.
    ///
    /// Every region is attempted even if an earlier one fails.
    ///
    /// # Errors
    ///
    /// Returns the first flush or unmap failure.
    pub fn close(mut self) -> Result<(), DebuggerError> {
        self.unmap_all()
    }

    fn unmap_all(&mut self) -> Result<(), DebuggerError> {
        let mut first_error = None;
        for name in self.mapped.names() {
            if let Err(err) = unmap_region(&mut self.engine, &mut self.mapped, &name) {
                log::warn!("failed to release region {name}: {err}");
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn write_raw(
        &mut self,
        definition: &'static RegisterDefinition,
        value: u64,
    ) -> Result<(), DebuggerError> {
        write_register_raw(&mut self.engine, definition, value)
    }

    fn read_raw(
        &self,
        definition: &'static RegisterDefinition,
    ) -> Result<RegisterValue, DebuggerError> {
        self.engine
            .reg_read(definition.engine_id)
            .map(|value| RegisterValue::new(definition, value))
            .map_err(|source| DebuggerError::RegisterRead {
                register: definition.name,
                source,
            })
    }
}

fn boot<E: Engine, D: Disassembler>(
    arch: Architecture,
    regions: &MemRegionSet,
    registers: &[RegisterValue],
) -> Result<Session<E, D>, DebuggerError> {
    let mut engine =
        E::open(arch.processor(), arch.initial_mode()).map_err(DebuggerError::Open)?;
    let disassembler = D::open(arch.processor(), arch.initial_mode())
        .map_err(DebuggerError::OpenDisassembler)?;

    let mut mapped = MemRegionSet::new();
    for region in regions.sorted_by_base() {
        map_region(&mut engine, &mut mapped, region.clone())?;
    }
    let (code_base, code_last) = mapped
        .code()
        .map(|code| (code.base(), code.last()))
        .ok_or(DebuggerError::MissingCodeRegion)?;

    let mut pc_loaded = false;
    for register in registers {
        let value = if register.is_program_counter() {
            pc_loaded = true;
            arch.initial_program_counter(register.value())
        } else {
            register.value()
        };
        write_register_raw(&mut engine, register.definition(), value)?;
    }
    if !pc_loaded {
        let pc = arch.initial_program_counter(code_base);
        write_register_raw(&mut engine, arch.program_counter(), pc)?;
    }

    engine
        .install_hooks(code_base, code_last)
        .map_err(DebuggerError::InstallHooks)?;
    Ok(Session {
        engine,
        disassembler,
        mapped,
    })
}

fn map_region<E: Engine>(
    engine: &mut E,
    mapped: &mut MemRegionSet,
    region: MemRegion,
) -> Result<(), DebuggerError> {
    region.validate()?;
    if mapped.contains(region.name()) {
        return Err(RegionError::DuplicateName(region.name().to_owned()).into());
    }
    let data = region.load_input()?;

    engine
        .mem_map(region.base(), region.size(), region.permissions().into())
        .map_err(|source| DebuggerError::Map {
            name: region.name().to_owned(),
            source,
        })?;
    if !data.is_empty() {
        if let Err(source) = engine.mem_write(region.base(), &data) {
            if let Err(err) = engine.mem_unmap(region.base(), region.size()) {
                log::warn!("rollback of region {} failed: {err}", region.name());
            }
            return Err(DebuggerError::MemoryWrite {
                address: region.base(),
                len: data.len(),
                source,
            });
        }
    }

    log::debug!("mapped {region}");
    mapped.add(region)?;
    Ok(())
}

fn unmap_region<E: Engine>(
    engine: &mut E,
    mapped: &mut MemRegionSet,
    name: &str,
) -> Result<(), DebuggerError> {
    let region = mapped.get(name)?.clone();

    let flushed = flush_region(engine, &region);
    if let Err(err) = &flushed {
        log::warn!("flush of region {name} failed: {err}");
    }
    if let Err(source) = engine.mem_unmap(region.base(), region.size()) {
        let err = DebuggerError::Unmap {
            name: name.to_owned(),
            source,
        };
        return match flushed {
            Ok(()) => Err(err),
            Err(flush_err) => {
                log::warn!("{err}");
                Err(flush_err)
            }
        };
    }
    mapped.remove(name);
    log::debug!("unmapped {region}");
    flushed
}

fn flush_region<E: Engine>(engine: &E, region: &MemRegion) -> Result<(), DebuggerError> {
    if region.output_file().is_none() {
        return Ok(());
    }
    let len = usize::try_from(region.size()).map_err(|_| DebuggerError::MemoryRead {
        address: region.base(),
        len: usize::MAX,
        source: EngineError::new("region is larger than host memory"),
    })?;
    let data = engine
        .mem_read(region.base(), len)
        .map_err(|source| DebuggerError::MemoryRead {
            address: region.base(),
            len,
            source,
        })?;
    region.write_output(&data)?;
    Ok(())
}

fn write_register_raw<E: Engine>(
    engine: &mut E,
    definition: &'static RegisterDefinition,
    value: u64,
) -> Result<(), DebuggerError> {
    engine
        .reg_write(definition.engine_id, value & definition.mask)
        .map_err(|source| DebuggerError::RegisterWrite {
            register: definition.name,
            source,
        })
}
