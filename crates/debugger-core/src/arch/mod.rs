//! Architecture abstraction: register tables, program-counter conventions, and
//! exception decoding for each supported CPU family.

use std::fmt;
use std::ops::Range;
use std::str::FromStr;

use regex::Regex;

use crate::error::{ArchError, RegisterError};
use crate::exception::Exception;
use crate::register::{RegisterDefinition, RegisterTable, RegisterValue};

/// ARM (A32/T32) architecture definition.
pub mod arm;
pub use arm::{Arm, ArmTrap, Cpsr};

/// CPU family understood by the emulation engine and disassembler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Processor {
    /// 32-bit ARM.
    Arm,
}

/// Instruction-set mode within a processor family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum ProcessorMode {
    /// 32-bit ARM instructions.
    Arm,
    /// 16/32-bit Thumb instructions.
    Thumb,
}

/// Data byte order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Endianness {
    /// Most significant byte first.
    Big,
    /// Least significant byte first.
    Little,
}

impl fmt::Display for Endianness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Big => "big",
            Self::Little => "little",
        })
    }
}

/// Behavior a CPU family provides to the debugger.
///
/// Register-derived queries take a full register snapshot so that implementations stay
/// pure and testable without an engine.
pub trait Arch {
    /// Engine/disassembler CPU family.
    fn processor(&self) -> Processor;

    /// Instruction-set mode selected at construction.
    fn initial_mode(&self) -> ProcessorMode;

    /// Register definitions in architecture order.
    fn register_table(&self) -> RegisterTable;

    /// The program counter definition.
    fn program_counter(&self) -> &'static RegisterDefinition;

    /// Longest instruction encoding in bytes.
    fn max_instruction_length(&self) -> usize;

    /// Shortest instruction encoding in bytes for `mode`.
    fn instruction_length(&self, mode: ProcessorMode) -> usize;

    /// Adjusts a configured start address for the initial mode.
    fn initial_program_counter(&self, pc: u64) -> u64;

    /// Adjusts `pc` for the mode encoded in `registers`, as needed when writing the
    /// program counter back to the engine.
    ///
    /// # Errors
    ///
    /// Returns [`ArchError::MissingRegister`] if a required status register is absent.
    fn current_program_counter(
        &self,
        pc: u64,
        registers: &[RegisterValue],
    ) -> Result<u64, ArchError>;

    /// Instruction-set mode encoded in `registers`.
    ///
    /// # Errors
    ///
    /// Returns [`ArchError::MissingRegister`] if a required status register is absent.
    fn current_mode(&self, registers: &[RegisterValue]) -> Result<ProcessorMode, ArchError>;

    /// Data endianness encoded in `registers`.
    ///
    /// # Errors
    ///
    /// Returns [`ArchError::MissingRegister`] if a required status register is absent.
    fn endianness(&self, registers: &[RegisterValue]) -> Result<Endianness, ArchError>;

    /// Decodes an engine interrupt into an [`Exception`].
    ///
    /// `instruction` holds up to [`Arch::max_instruction_length`] bytes read at the
    /// faulting program counter.
    ///
    /// # Errors
    ///
    /// Returns [`ArchError`] if the snapshot lacks required registers or too few
    /// instruction bytes are supplied.
    fn decode_exception(
        &self,
        number: u32,
        registers: &[RegisterValue],
        instruction: &[u8],
    ) -> Result<Exception, ArchError>;

    /// Register definitions in architecture order.
    fn registers(&self) -> &'static [RegisterDefinition] {
        self.register_table().definitions()
    }

    /// Looks up a register by name or alias.
    ///
    /// # Errors
    ///
    /// Returns [`RegisterError::UnknownRegister`] if nothing matches.
    fn register(&self, name: &str) -> Result<&'static RegisterDefinition, RegisterError> {
        self.register_table().lookup(name)
    }

    /// Parses a `name=value` register assignment.
    ///
    /// # Errors
    ///
    /// Returns [`RegisterError`] for malformed input.
    fn parse_register(&self, assignment: &str) -> Result<RegisterValue, RegisterError> {
        self.register_table().parse(assignment)
    }

    /// Parses a list of register assignments, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// Returns the first [`RegisterError`] encountered.
    fn parse_registers(&self, assignments: &[&str]) -> Result<Vec<RegisterValue>, RegisterError> {
        self.register_table().parse_all(assignments.iter().copied())
    }

    /// Regular-expression source matching any register name or alias.
    fn register_pattern(&self) -> String {
        self.register_table().pattern()
    }

    /// Compiled [`Arch::register_pattern`].
    ///
    /// # Errors
    ///
    /// Returns [`RegisterError::InvalidPattern`] if the expression does not compile.
    fn register_regex(&self) -> Result<Regex, RegisterError> {
        self.register_table().regex()
    }

    /// Byte ranges of [`Arch::register_pattern`] matches in `text`.
    ///
    /// # Errors
    ///
    /// Returns [`RegisterError::InvalidPattern`] if the expression does not compile.
    fn find_register_names(&self, text: &str) -> Result<Vec<Range<usize>>, RegisterError> {
        self.register_table().find_names(text)
    }
}

/// Supported architectures, selected by an `arch[:mode]` string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Architecture {
    /// 32-bit ARM in the given initial mode.
    Arm(Arm),
}

impl Architecture {
    /// Builds an architecture from `arch[:mode]`, e.g. `arm`, `arm:arm`, `arm:thumb`.
    ///
    /// Matching is case-insensitive.
    ///
    /// # Errors
    ///
    /// Returns [`ArchError::UnsupportedArchitecture`] for unknown families and
    /// [`ArchError::InvalidMode`] for unknown modes.
    pub fn new(spec: &str) -> Result<Self, ArchError> {
        let spec = spec.trim().to_ascii_lowercase();
        let (family, mode) = spec.split_once(':').unwrap_or((spec.as_str(), ""));
        match family {
            "arm" => Ok(Self::Arm(Arm::new(mode)?)),
            _ => Err(ArchError::UnsupportedArchitecture(spec.clone())),
        }
    }

    fn inner(&self) -> &dyn Arch {
        match self {
            Self::Arm(arm) => arm,
        }
    }
}

impl Default for Architecture {
    fn default() -> Self {
        Self::Arm(Arm::default())
    }
}

impl FromStr for Architecture {
    type Err = ArchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Arm(arm) => write!(f, "{arm}"),
        }
    }
}

impl Arch for Architecture {
    fn processor(&self) -> Processor {
        self.inner().processor()
    }

    fn initial_mode(&self) -> ProcessorMode {
        self.inner().initial_mode()
    }

    fn register_table(&self) -> RegisterTable {
        self.inner().register_table()
    }

    fn program_counter(&self) -> &'static RegisterDefinition {
        self.inner().program_counter()
    }

    fn max_instruction_length(&self) -> usize {
        self.inner().max_instruction_length()
    }

    fn instruction_length(&self, mode: ProcessorMode) -> usize {
        self.inner().instruction_length(mode)
    }

    fn initial_program_counter(&self, pc: u64) -> u64 {
        self.inner().initial_program_counter(pc)
    }

    fn current_program_counter(
        &self,
        pc: u64,
        registers: &[RegisterValue],
    ) -> Result<u64, ArchError> {
        self.inner().current_program_counter(pc, registers)
    }

    fn current_mode(&self, registers: &[RegisterValue]) -> Result<ProcessorMode, ArchError> {
        self.inner().current_mode(registers)
    }

    fn endianness(&self, registers: &[RegisterValue]) -> Result<Endianness, ArchError> {
        self.inner().endianness(registers)
    }

    fn decode_exception(
        &self,
        number: u32,
        registers: &[RegisterValue],
        instruction: &[u8],
    ) -> Result<Exception, ArchError> {
        self.inner().decode_exception(number, registers, instruction)
    }
}
