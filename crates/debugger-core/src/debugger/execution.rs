use crate::arch::Arch;
use crate::debugger::Debugger;
use crate::disasm::Disassembler;
use crate::engine::Engine;
use crate::error::DebuggerError;
use crate::exception::Exception;
use crate::hooks::StopReason;
use crate::register::RegisterValue;

/// Coarse debugger execution state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum RunState {
    /// Booted or reset; nothing has run yet.
    #[default]
    Idle,
    /// Inside a blocking engine run.
    Running,
    /// The last run ended for the given reason.
    Stopped(StopReason),
}

/// Result of one `step` or `resume` call.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct RunOutcome {
    /// Why execution stopped.
    pub stop: StopReason,
    /// Exception raised during the run, or [`Exception::none`].
    pub exception: Exception,
    /// Instructions allowed to start during the run.
    pub executed: u64,
    /// Program counter after the run, as read from the engine.
    pub pc: u64,
}

impl<E: Engine, D: Disassembler> Debugger<E, D> {
    /// Executes exactly `count` instructions unless a breakpoint, exception, or the end
    /// of the code region intervenes first.
    ///
    /// # Errors
    ///
    /// Returns [`DebuggerError::InvalidStepCount`] for `count == 0`, and engine or hook
    /// failures raised during the run.
    pub fn step(&mut self, count: u64) -> Result<RunOutcome, DebuggerError> {
        if count == 0 {
            return Err(DebuggerError::InvalidStepCount);
        }
        self.run(Some(count))
    }

    /// Runs until a breakpoint, exception, or the end of the code region.
    ///
    /// # Errors
    ///
    /// Returns engine or hook failures raised during the run.
    pub fn resume(&mut self) -> Result<RunOutcome, DebuggerError> {
        self.run(None)
    }

    /// Current execution state.
    #[must_use]
    pub const fn run_state(&self) -> RunState {
        self.state
    }

    fn run(&mut self, limit: Option<u64>) -> Result<RunOutcome, DebuggerError> {
        let until = self
            .mapped
            .code()
            .map(|code| code.end())
            .ok_or(DebuggerError::MissingCodeRegion)?;
        let begin = self.pc()?;
        log::debug!("run from 0x{begin:08x} until 0x{until:08x} (limit {limit:?})");

        self.hooks.begin(limit);
        self.state = RunState::Running;
        let result = self.engine.start(begin, until, &mut self.hooks);
        let report = self.hooks.finish();

        if let Err(source) = result {
            self.state = RunState::Idle;
            return Err(DebuggerError::Run(source));
        }
        if !report.snapshot.is_empty() {
            self.restore_snapshot(&report.snapshot)?;
        }
        if let Some(failure) = report.failure {
            self.state = RunState::Idle;
            return Err(failure);
        }

        let stop = report.stop.unwrap_or(StopReason::EndOfCode);
        self.state = RunState::Stopped(stop);
        let pc = self.read_raw(self.config.arch().program_counter())?.value();
        log::debug!("stopped at 0x{pc:08x}: {stop:?}");
        Ok(RunOutcome {
            stop,
            exception: report.exception,
            executed: report.executed,
            pc,
        })
    }

    /// Writes back registers captured inside the code hook.
    ///
    /// The program counter goes last so its mode bit reflects the restored status
    /// register.
    fn restore_snapshot(&mut self, snapshot: &[RegisterValue]) -> Result<(), DebuggerError> {
        for register in snapshot.iter().filter(|r| !r.is_program_counter()) {
            self.write_raw(register.definition(), register.value())?;
        }
        if let Some(pc) = snapshot.iter().find(|r| r.is_program_counter()) {
            let adjusted = self
                .config
                .arch()
                .current_program_counter(pc.value(), snapshot)?;
            self.write_raw(pc.definition(), adjusted)?;
        }
        Ok(())
    }
}
