//! Instruction disassembly seam and row type.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::arch::{Processor, ProcessorMode};
use crate::error::DisassemblyError;

/// A single disassembled instruction row.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DisassemblyRow {
    /// Address of the first instruction byte.
    pub address: u64,
    /// Raw instruction bytes in memory order.
    pub bytes: Vec<u8>,
    /// Instruction mnemonic, e.g. `mov`.
    pub mnemonic: String,
    /// Formatted operands, e.g. `r0, #1`.
    pub operands: String,
}

impl DisassemblyRow {
    /// Raw bytes as contiguous lowercase hex.
    #[must_use]
    pub fn opcode_hex(&self) -> String {
        self.bytes.iter().map(|byte| format!("{byte:02x}")).collect()
    }

    /// Instruction length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns `true` for a row with no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Display for DisassemblyRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "0x{:08x}: {:<8} {:<7} {}",
            self.address,
            self.opcode_hex(),
            self.mnemonic,
            self.operands
        )
    }
}

/// Instruction disassembler backend.
pub trait Disassembler {
    /// Creates a disassembler for `processor` starting in `mode`.
    ///
    /// # Errors
    ///
    /// Returns [`DisassemblyError`] if the backend does not support the combination.
    fn open(processor: Processor, mode: ProcessorMode) -> Result<Self, DisassemblyError>
    where
        Self: Sized;

    /// Disassembles up to `count` instructions from `bytes`, which were read at
    /// `address`, decoding in `mode`.
    ///
    /// Undecodable bytes are skipped or emitted as data rows rather than ending the
    /// listing early.
    ///
    /// # Errors
    ///
    /// Returns [`DisassemblyError`] if the backend fails outright.
    fn disassemble(
        &mut self,
        mode: ProcessorMode,
        bytes: &[u8],
        address: u64,
        count: usize,
    ) -> Result<Vec<DisassemblyRow>, DisassemblyError>;
}
