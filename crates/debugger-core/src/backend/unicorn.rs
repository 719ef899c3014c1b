use std::fmt;
use std::mem;

use unicorn_engine::unicorn_const::{uc_error, Arch as UcArch, Mode, Permission};
use unicorn_engine::Unicorn;

use crate::arch::{Processor, ProcessorMode};
use crate::engine::{Engine, HookContext, Protection};
use crate::error::EngineError;
use crate::hooks::ExecutionHooks;
use crate::register::EngineRegister;

fn engine_error(operation: &str, err: uc_error) -> EngineError {
    EngineError::new(format!("{operation}: {err:?}"))
}

fn host_len(size: u64) -> Result<usize, EngineError> {
    usize::try_from(size).map_err(|_| EngineError::new("size exceeds host address width"))
}

/// Unicorn engine instance.
///
/// The execution hooks travel inside the engine's user data while a run is in
/// progress, so the registered callbacks can reach them.
pub struct UnicornEngine {
    uc: Unicorn<'static, ExecutionHooks>,
}

impl fmt::Debug for UnicornEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnicornEngine").finish_non_exhaustive()
    }
}

/// [`HookContext`] view of the engine handed to the hooks from inside a callback.
struct CallbackContext<'a, 'b> {
    uc: &'a mut Unicorn<'b, ExecutionHooks>,
}

impl HookContext for CallbackContext<'_, '_> {
    fn reg_read(&self, register: EngineRegister) -> Result<u64, EngineError> {
        self.uc
            .reg_read(register.0)
            .map_err(|err| engine_error("reg_read", err))
    }

    fn mem_read(&self, address: u64, len: usize) -> Result<Vec<u8>, EngineError> {
        self.uc
            .mem_read_as_vec(address, len)
            .map_err(|err| engine_error("mem_read", err))
    }

    fn stop(&mut self) -> Result<(), EngineError> {
        self.uc
            .emu_stop()
            .map_err(|err| engine_error("emu_stop", err))
    }
}

impl HookContext for UnicornEngine {
    fn reg_read(&self, register: EngineRegister) -> Result<u64, EngineError> {
        self.uc
            .reg_read(register.0)
            .map_err(|err| engine_error("reg_read", err))
    }

    fn mem_read(&self, address: u64, len: usize) -> Result<Vec<u8>, EngineError> {
        self.uc
            .mem_read_as_vec(address, len)
            .map_err(|err| engine_error("mem_read", err))
    }

    fn stop(&mut self) -> Result<(), EngineError> {
        self.uc
            .emu_stop()
            .map_err(|err| engine_error("emu_stop", err))
    }
}

impl Engine for UnicornEngine {
    fn open(processor: Processor, mode: ProcessorMode) -> Result<Self, EngineError> {
        let (arch, mode) = match (processor, mode) {
            (Processor::Arm, ProcessorMode::Arm) => (UcArch::ARM, Mode::ARM),
            (Processor::Arm, ProcessorMode::Thumb) => (UcArch::ARM, Mode::THUMB),
        };
        let uc = Unicorn::new_with_data(arch, mode, ExecutionHooks::default())
            .map_err(|err| engine_error("open", err))?;
        Ok(Self { uc })
    }

    fn mem_map(
        &mut self,
        base: u64,
        size: u64,
        protection: Protection,
    ) -> Result<(), EngineError> {
        let mut perms = Permission::NONE;
        perms.set(Permission::READ, protection.contains(Protection::READ));
        perms.set(Permission::WRITE, protection.contains(Protection::WRITE));
        perms.set(Permission::EXEC, protection.contains(Protection::EXEC));
        self.uc
            .mem_map(base, host_len(size)?, perms)
            .map_err(|err| engine_error("mem_map", err))
    }

    fn mem_unmap(&mut self, base: u64, size: u64) -> Result<(), EngineError> {
        self.uc
            .mem_unmap(base, host_len(size)?)
            .map_err(|err| engine_error("mem_unmap", err))
    }

    fn mem_write(&mut self, address: u64, data: &[u8]) -> Result<(), EngineError> {
        self.uc
            .mem_write(address, data)
            .map_err(|err| engine_error("mem_write", err))
    }

    fn reg_write(&mut self, register: EngineRegister, value: u64) -> Result<(), EngineError> {
        self.uc
            .reg_write(register.0, value)
            .map_err(|err| engine_error("reg_write", err))
    }

    fn install_hooks(&mut self, code_begin: u64, code_end: u64) -> Result<(), EngineError> {
        self.uc
            .add_code_hook(code_begin, code_end, |uc, address, size| {
                let mut hooks = mem::take(uc.get_data_mut());
                hooks.on_instruction(&mut CallbackContext { uc: &mut *uc }, address, size);
                *uc.get_data_mut() = hooks;
            })
            .map_err(|err| engine_error("add_code_hook", err))?;
        self.uc
            .add_intr_hook(|uc, number| {
                let mut hooks = mem::take(uc.get_data_mut());
                hooks.on_interrupt(&mut CallbackContext { uc: &mut *uc }, number);
                *uc.get_data_mut() = hooks;
            })
            .map_err(|err| engine_error("add_intr_hook", err))?;
        Ok(())
    }

    fn start(
        &mut self,
        begin: u64,
        until: u64,
        hooks: &mut ExecutionHooks,
    ) -> Result<(), EngineError> {
        mem::swap(self.uc.get_data_mut(), hooks);
        let result = self.uc.emu_start(begin, until, 0, 0);
        mem::swap(self.uc.get_data_mut(), hooks);
        result.map_err(|err| engine_error("emu_start", err))
    }
}
