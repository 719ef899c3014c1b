use std::fmt;

use bitflags::bitflags;

use crate::arch::{Arch, Endianness, Processor, ProcessorMode};
use crate::error::ArchError;
use crate::exception::Exception;
use crate::register::{
    find_value, DisplayFormat, EngineRegister, Flag, RegisterDefinition, RegisterTable,
    RegisterValue,
};

bitflags! {
    /// Current Program Status Register bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Cpsr: u32 {
        /// Negative result.
        const N = 1 << 31;
        /// Zero result.
        const Z = 1 << 30;
        /// Carry out.
        const C = 1 << 29;
        /// Signed overflow.
        const V = 1 << 28;
        /// Saturation.
        const Q = 1 << 27;
        /// Jazelle state.
        const J = 1 << 24;
        /// SIMD greater-than-or-equal lanes.
        const GE = 0xf << 16;
        /// Big-endian data accesses.
        const E = 1 << 9;
        /// Asynchronous abort disable.
        const A = 1 << 8;
        /// IRQ disable.
        const I = 1 << 7;
        /// FIQ disable.
        const F = 1 << 6;
        /// Thumb state.
        const T = 1 << 5;
        /// Processor mode field.
        const MODE = 0x1f;
    }
}

impl Cpsr {
    /// Interprets a register value as CPSR bits; bits above 31 are ignored.
    #[must_use]
    pub fn from_register(value: u64) -> Self {
        Self::from_bits_retain(u32::try_from(value & u64::from(u32::MAX)).unwrap_or(0))
    }
}

const WORD_MASK: u64 = 0xffff_ffff;
const WORD_FORMAT: DisplayFormat = DisplayFormat::Hex { digits: 8 };
const BIT: DisplayFormat = DisplayFormat::Decimal;

const CPSR_FLAGS: [Flag; 13] = [
    Flag::new("N", "Negative: 1 = result was negative, 0 = result was positive", 31, 1, BIT),
    Flag::new("Z", "Zero: 1 = result was 0, 0 = nonzero result", 30, 1, BIT),
    Flag::new("C", "Carry: 1 = carry in last operation, 0 = no carry", 29, 1, BIT),
    Flag::new("V", "Overflow: 1 = overflow in last operation, 0 = no overflow", 28, 1, BIT),
    Flag::new("Q", "Underflow: 1 = underflow (saturation) occurred, 0 = no underflow", 27, 1, BIT),
    Flag::new("J", "Jazelle: 1 = Jazelle state, 0 = ARM/Thumb", 24, 1, BIT),
    Flag::new(
        "GE",
        "Greater Than or Equal (SIMD): per-lane results of the last SIMD add/subtract",
        16,
        4,
        DisplayFormat::Hex { digits: 0 },
    ),
    Flag::new("E", "Data Endianness: 1 = big, 0 = little", 9, 1, BIT),
    Flag::new("A", "Abort: 1 = asynchronous aborts disabled, 0 = enabled", 8, 1, BIT),
    Flag::new("I", "IRQ Disable: 1 = IRQs disabled, 0 = IRQs enabled", 7, 1, BIT),
    Flag::new("F", "FIQ Disable: 1 = FIQs disabled, 0 = FIQs enabled", 6, 1, BIT),
    Flag::new("T", "Thumb State: 1 = Thumb state, 0 = ARM state", 5, 1, BIT),
    Flag::new(
        "M",
        "Mode: 0x10 = User, 0x11 = FIQ, 0x12 = IRQ, 0x13 = Supervisor, 0x17 = Abort, \
         0x1b = Undefined, 0x1f = System",
        0,
        5,
        DisplayFormat::Hex { digits: 2 },
    ),
];

// Engine register identifiers follow the unicorn ARM numbering.
const fn word(
    name: &'static str,
    aliases: &'static [&'static str],
    engine_id: i32,
) -> RegisterDefinition {
    RegisterDefinition {
        name,
        aliases,
        mask: WORD_MASK,
        format: WORD_FORMAT,
        engine_id: EngineRegister(engine_id),
        is_program_counter: false,
        flags: &[],
    }
}

const ARM_REGISTER_DEFS: [RegisterDefinition; 17] = [
    word("r0", &["a1"], 66),
    word("r1", &["a2"], 67),
    word("r2", &["a3"], 68),
    word("r3", &["a4"], 69),
    word("r4", &["v1"], 70),
    word("r5", &["v2"], 71),
    word("r6", &["v3"], 72),
    word("r7", &["v4"], 73),
    word("r8", &["v5"], 74),
    word("r9", &["v6", "sb"], 75),
    word("r10", &["v7", "sl"], 76),
    word("r11", &["v8", "fp"], 77),
    word("r12", &["ip"], 78),
    word("sp", &["r13"], 12),
    word("lr", &["r14"], 10),
    RegisterDefinition {
        is_program_counter: true,
        ..word("pc", &["r15"], 11)
    },
    RegisterDefinition {
        flags: &CPSR_FLAGS,
        ..word("cpsr", &["r16"], 3)
    },
];

static ARM_REGISTERS: [RegisterDefinition; 17] = ARM_REGISTER_DEFS;

const PC_INDEX: usize = 15;
const CPSR_NAME: &str = "cpsr";
const PC_NAME: &str = "pc";

const _: () = assert_register_layout();

const fn assert_register_layout() {
    let mut index = 0;
    let mut program_counters = 0;
    while index < ARM_REGISTER_DEFS.len() {
        let definition = &ARM_REGISTER_DEFS[index];
        if definition.is_program_counter {
            program_counters += 1;
            assert!(index == PC_INDEX, "pc must sit at index 15");
        }
        let mut flag = 0;
        while flag < definition.flags.len() {
            assert!(
                definition.flags[flag].is_well_formed(definition.mask),
                "flag masks must be contiguous and inside the register mask"
            );
            flag += 1;
        }
        index += 1;
    }
    assert!(program_counters == 1, "exactly one program counter");
}

/// ARM exception numbers reported by the emulation engine's interrupt hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u32)]
pub enum ArmTrap {
    /// Undefined instruction.
    UndefinedInstruction = 1,
    /// `SVC`/`SWI`.
    SoftwareInterrupt = 2,
    /// Instruction fetch abort.
    PrefetchAbort = 3,
    /// Data access abort.
    DataAbort = 4,
    /// Normal interrupt.
    Irq = 5,
    /// Fast interrupt.
    Fiq = 6,
    /// `BKPT`.
    Breakpoint = 7,
    /// Emulator-internal v7-M exception exit.
    ExceptionExit = 8,
    /// Emulator interception of the kernel commpage.
    KernelTrap = 9,
    /// Emulator interception of `STREX`.
    Strex = 10,
    /// `HVC`.
    HypervisorCall = 11,
    /// Hypervisor trap.
    HypervisorTrap = 12,
    /// `SMC`.
    SecureMonitorCall = 13,
    /// Virtual IRQ.
    VirtualIrq = 14,
    /// Virtual FIQ.
    VirtualFiq = 15,
}

impl ArmTrap {
    /// Converts the trap to the engine's interrupt number.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self as u32
    }

    /// Converts an engine interrupt number back into a trap.
    #[must_use]
    pub const fn from_u32(number: u32) -> Option<Self> {
        match number {
            1 => Some(Self::UndefinedInstruction),
            2 => Some(Self::SoftwareInterrupt),
            3 => Some(Self::PrefetchAbort),
            4 => Some(Self::DataAbort),
            5 => Some(Self::Irq),
            6 => Some(Self::Fiq),
            7 => Some(Self::Breakpoint),
            8 => Some(Self::ExceptionExit),
            9 => Some(Self::KernelTrap),
            10 => Some(Self::Strex),
            11 => Some(Self::HypervisorCall),
            12 => Some(Self::HypervisorTrap),
            13 => Some(Self::SecureMonitorCall),
            14 => Some(Self::VirtualIrq),
            15 => Some(Self::VirtualFiq),
            _ => None,
        }
    }

    /// Fixed human-readable description.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::UndefinedInstruction => "Undefined Instruction",
            Self::SoftwareInterrupt => "Software Interrupt",
            Self::PrefetchAbort => "Prefetch Abort",
            Self::DataAbort => "Data Abort",
            Self::Irq => "IRQ",
            Self::Fiq => "FIQ",
            Self::Breakpoint => "Breakpoint",
            Self::ExceptionExit => "Emulator v7M exception exit",
            Self::KernelTrap => "Emulator interception of kernel commpage",
            Self::Strex => "Emulator interception of strex",
            Self::HypervisorCall => "Hypervisor Call",
            Self::HypervisorTrap => "Hypervisor Trap",
            Self::SecureMonitorCall => "Secure Monitor Call",
            Self::VirtualIrq => "Virtual IRQ",
            Self::VirtualFiq => "Virtual FIQ",
        }
    }
}

/// Extracts the 16-bit immediate of an A32 `BKPT` (`imm12` in bits 19:8, `imm4` in 3:0).
#[must_use]
pub fn arm_bkpt_immediate(instruction: [u8; 4]) -> u16 {
    let word = u32::from_le_bytes(instruction);
    u16::try_from(((word >> 4) & 0xfff0) | (word & 0xf)).unwrap_or(0)
}

/// 32-bit ARM architecture with a selected initial mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Arm {
    thumb: bool,
}

impl Arm {
    /// Creates an ARM architecture for `mode`: empty or `arm` for A32, `thumb` or
    /// `thumb2` for T32.
    ///
    /// # Errors
    ///
    /// Returns [`ArchError::InvalidMode`] for any other mode string.
    pub fn new(mode: &str) -> Result<Self, ArchError> {
        match mode.trim().to_ascii_lowercase().as_str() {
            "" | "arm" => Ok(Self { thumb: false }),
            "thumb" | "thumb2" => Ok(Self { thumb: true }),
            other => Err(ArchError::InvalidMode {
                arch: "arm",
                mode: other.to_owned(),
            }),
        }
    }

    /// Creates an ARM architecture starting in `mode`.
    #[must_use]
    pub const fn with_mode(mode: ProcessorMode) -> Self {
        Self {
            thumb: matches!(mode, ProcessorMode::Thumb),
        }
    }

    fn cpsr(registers: &[RegisterValue]) -> Result<Cpsr, ArchError> {
        find_value(registers, CPSR_NAME)
            .map(|cpsr| Cpsr::from_register(cpsr.value()))
            .ok_or(ArchError::MissingRegister(CPSR_NAME))
    }
}

impl fmt::Display for Arm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.thumb { "arm:thumb" } else { "arm:arm" })
    }
}

impl Arch for Arm {
    fn processor(&self) -> Processor {
        Processor::Arm
    }

    fn initial_mode(&self) -> ProcessorMode {
        if self.thumb {
            ProcessorMode::Thumb
        } else {
            ProcessorMode::Arm
        }
    }

    fn register_table(&self) -> RegisterTable {
        RegisterTable::new(&ARM_REGISTERS)
    }

    fn program_counter(&self) -> &'static RegisterDefinition {
        &ARM_REGISTERS[PC_INDEX]
    }

    fn max_instruction_length(&self) -> usize {
        4
    }

    fn instruction_length(&self, mode: ProcessorMode) -> usize {
        match mode {
            ProcessorMode::Arm => 4,
            ProcessorMode::Thumb => 2,
        }
    }

    fn initial_program_counter(&self, pc: u64) -> u64 {
        if self.thumb {
            pc | 1
        } else {
            pc
        }
    }

    fn current_program_counter(
        &self,
        pc: u64,
        registers: &[RegisterValue],
    ) -> Result<u64, ArchError> {
        if Self::cpsr(registers)?.contains(Cpsr::T) {
            Ok(pc | 1)
        } else {
            Ok(pc)
        }
    }

    fn current_mode(&self, registers: &[RegisterValue]) -> Result<ProcessorMode, ArchError> {
        if Self::cpsr(registers)?.contains(Cpsr::T) {
            Ok(ProcessorMode::Thumb)
        } else {
            Ok(ProcessorMode::Arm)
        }
    }

    fn endianness(&self, registers: &[RegisterValue]) -> Result<Endianness, ArchError> {
        if Self::cpsr(registers)?.contains(Cpsr::E) {
            Ok(Endianness::Big)
        } else {
            Ok(Endianness::Little)
        }
    }

    fn decode_exception(
        &self,
        number: u32,
        registers: &[RegisterValue],
        instruction: &[u8],
    ) -> Result<Exception, ArchError> {
        let mode = self.current_mode(registers)?;
        let thumb = mode == ProcessorMode::Thumb;
        let needed = self.instruction_length(mode);
        if instruction.len() < needed {
            return Err(ArchError::InstructionTooShort {
                needed,
                actual: instruction.len(),
            });
        }
        let pc = find_value(registers, PC_NAME)
            .ok_or(ArchError::MissingRegister(PC_NAME))?
            .value();

        let description = match ArmTrap::from_u32(number) {
            Some(ArmTrap::Breakpoint) => {
                let immediate = if thumb {
                    u16::from(instruction[0])
                } else {
                    arm_bkpt_immediate([
                        instruction[0],
                        instruction[1],
                        instruction[2],
                        instruction[3],
                    ])
                };
                format!(
                    "{} #0x{immediate:04x} ({immediate})",
                    ArmTrap::Breakpoint.description()
                )
            }
            Some(trap) => trap.description().to_owned(),
            None => format!("Unknown exception ({number}) occurred at pc=0x{pc:08x}"),
        };
        Ok(Exception::new(number, pc, description))
    }
}
