use std::fmt;

use capstone::arch::arm::ArchMode;
use capstone::prelude::*;

use crate::arch::{Processor, ProcessorMode};
use crate::disasm::{Disassembler, DisassemblyRow};
use crate::error::DisassemblyError;

fn disassembly_error(operation: &str, err: &capstone::Error) -> DisassemblyError {
    DisassemblyError::new(format!("{operation}: {err}"))
}

const fn arch_mode(mode: ProcessorMode) -> ArchMode {
    match mode {
        ProcessorMode::Arm => ArchMode::Arm,
        ProcessorMode::Thumb => ArchMode::Thumb,
    }
}

/// Capstone disassembler with data skipping enabled, so undecodable bytes become
/// `.byte` rows instead of ending the listing.
pub struct CapstoneDisassembler {
    cs: Capstone,
    mode: ProcessorMode,
}

impl fmt::Debug for CapstoneDisassembler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapstoneDisassembler")
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

impl Disassembler for CapstoneDisassembler {
    fn open(processor: Processor, mode: ProcessorMode) -> Result<Self, DisassemblyError> {
        let Processor::Arm = processor;
        let mut cs = Capstone::new()
            .arm()
            .mode(arch_mode(mode))
            .build()
            .map_err(|err| disassembly_error("open", &err))?;
        cs.set_skipdata(true)
            .map_err(|err| disassembly_error("skipdata", &err))?;
        Ok(Self { cs, mode })
    }

    fn disassemble(
        &mut self,
        mode: ProcessorMode,
        bytes: &[u8],
        address: u64,
        count: usize,
    ) -> Result<Vec<DisassemblyRow>, DisassemblyError> {
        if mode != self.mode {
            self.cs
                .set_mode(arch_mode(mode).into())
                .map_err(|err| disassembly_error("set_mode", &err))?;
            self.mode = mode;
        }
        let instructions = self
            .cs
            .disasm_count(bytes, address, count)
            .map_err(|err| disassembly_error("disasm", &err))?;
        Ok(instructions
            .iter()
            .map(|insn| DisassemblyRow {
                address: insn.address(),
                bytes: insn.bytes().to_vec(),
                mnemonic: insn.mnemonic().unwrap_or_default().to_owned(),
                operands: insn.op_str().unwrap_or_default().to_owned(),
            })
            .collect())
    }
}
