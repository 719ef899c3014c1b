//! Scripted ARM-subset engine and disassembler used by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use debugger_core::{
    Arch, Architecture, Debugger, DebuggerConfig, Disassembler, DisassemblyError,
    DisassemblyRow, Engine, EngineError, EngineRegister, ExecutionHooks, HookContext,
    MemRegion, Permissions, Processor, ProcessorMode, Protection,
};

pub const CODE_BASE: u64 = 0x1000;
pub const CODE_SIZE: u64 = 0x1000;

pub const NOP: u32 = 0xe320_f000;
pub const UDF: u32 = 0xe7f0_00f0;
pub const THUMB_NOP: u16 = 0xbf00;

pub const CPSR_T: u64 = 1 << 5;
pub const CPSR_E: u64 = 1 << 9;
const RESET_CPSR: u64 = 0x0000_01d3;

const ID_CPSR: i32 = 3;
const ID_LR: i32 = 10;
const ID_PC: i32 = 11;
const ID_SP: i32 = 12;
const ID_R0: i32 = 66;

/// `bkpt #imm`
pub const fn bkpt(imm: u16) -> u32 {
    let imm = imm as u32;
    0xe120_0070 | ((imm & 0xfff0) << 4) | (imm & 0xf)
}

/// `svc #imm`
pub const fn svc(imm: u32) -> u32 {
    0xef00_0000 | (imm & 0x00ff_ffff)
}

/// `mov rd, #imm8`
pub const fn mov(rd: u32, imm: u8) -> u32 {
    0xe3a0_0000 | (rd << 12) | imm as u32
}

/// `add rd, rn, #imm8`
pub const fn add(rd: u32, rn: u32, imm: u8) -> u32 {
    0xe280_0000 | (rn << 16) | (rd << 12) | imm as u32
}

/// `str rd, [rn]`
pub const fn str_word(rd: u32, rn: u32) -> u32 {
    0xe580_0000 | (rn << 16) | (rd << 12)
}

/// `b` to `offset` instructions relative to the branch.
pub const fn branch(offset: i32) -> u32 {
    0xea00_0000 | ((offset - 2) as u32 & 0x00ff_ffff)
}

/// `bx rm`
pub const fn bx(rm: u32) -> u32 {
    0xe12f_ff10 | rm
}

/// Thumb `bkpt #imm`
pub const fn thumb_bkpt(imm: u8) -> u16 {
    0xbe00 | imm as u16
}

/// Thumb `movs rd, #imm8`
pub const fn thumb_movs(rd: u16, imm: u8) -> u16 {
    0x2000 | (rd << 8) | imm as u16
}

pub fn arm_program(words: &[u32]) -> Vec<u8> {
    words.iter().flat_map(|word| word.to_le_bytes()).collect()
}

pub fn thumb_program(halfwords: &[u16]) -> Vec<u8> {
    halfwords.iter().flat_map(|half| half.to_le_bytes()).collect()
}

const fn register_id(number: u32) -> i32 {
    match number {
        13 => ID_SP,
        14 => ID_LR,
        15 => ID_PC,
        n => ID_R0 + n as i32,
    }
}

#[derive(Debug, Clone)]
struct Mapping {
    base: u64,
    size: u64,
    protection: Protection,
    data: Vec<u8>,
}

impl Mapping {
    fn contains(&self, address: u64) -> bool {
        address >= self.base && address < self.base + self.size
    }
}

enum Effect {
    Next,
    Jump(u64),
    Interrupt { number: u32, advance: bool },
}

/// Minimal ARM/Thumb interpreter with unicorn-like register and hook behavior.
///
/// Writing the program counter with bit 0 set selects Thumb state and stores the
/// address with bit 0 cleared. Stopping from inside the code hook leaves the engine
/// with a cleared Thumb bit and an advanced program counter.
#[derive(Debug)]
pub struct MockEngine {
    mode: ProcessorMode,
    mappings: Vec<Mapping>,
    registers: HashMap<i32, u64>,
    code_hook: Option<(u64, u64)>,
    interrupt_hook: bool,
    stop_requested: bool,
    pub clobber_on_stop: bool,
    pub failing_register_write: Option<EngineRegister>,
    pub failing_unmap: Option<u64>,
    pub starts: Vec<u64>,
}

impl MockEngine {
    fn cpsr(&self) -> u64 {
        self.registers.get(&ID_CPSR).copied().unwrap_or(0)
    }

    fn pc(&self) -> u64 {
        self.registers.get(&ID_PC).copied().unwrap_or(0)
    }

    fn set_pc(&mut self, value: u64) {
        let cpsr = if value & 1 == 1 {
            self.cpsr() | CPSR_T
        } else {
            self.cpsr() & !CPSR_T
        };
        self.registers.insert(ID_CPSR, cpsr);
        self.registers.insert(ID_PC, value & !1);
    }

    fn reg(&self, number: u32) -> u64 {
        self.registers
            .get(&register_id(number))
            .copied()
            .unwrap_or(0)
    }

    fn set_reg(&mut self, number: u32, value: u64) {
        self.registers
            .insert(register_id(number), value & 0xffff_ffff);
    }

    fn mapping(&self, address: u64, len: usize) -> Option<usize> {
        let last = address + len.max(1) as u64 - 1;
        self.mappings
            .iter()
            .position(|m| m.contains(address) && m.contains(last))
    }

    fn fetch(&self, address: u64, len: usize) -> Result<Vec<u8>, EngineError> {
        let index = self
            .mapping(address, len)
            .ok_or_else(|| EngineError::new(format!("fetch from unmapped 0x{address:x}")))?;
        let mapping = &self.mappings[index];
        if !mapping.protection.contains(Protection::EXEC) {
            return Err(EngineError::new(format!("fetch from non-exec 0x{address:x}")));
        }
        let offset = (address - mapping.base) as usize;
        Ok(mapping.data[offset..offset + len].to_vec())
    }

    fn execute_arm(&mut self, word: u32) -> Result<Effect, EngineError> {
        let pc = self.pc();
        if word == NOP || word == 0xe1a0_0000 {
            return Ok(Effect::Next);
        }
        if word & 0xfff0_00f0 == 0xe120_0070 {
            return Ok(Effect::Interrupt {
                number: 7,
                advance: false,
            });
        }
        if word & 0xff00_0000 == 0xef00_0000 {
            return Ok(Effect::Interrupt {
                number: 2,
                advance: true,
            });
        }
        if word & 0xfff0_f000 == 0xe3a0_0000 {
            self.set_reg((word >> 12) & 0xf, u64::from(word & 0xff));
            return Ok(Effect::Next);
        }
        if word & 0xfff0_0000 == 0xe280_0000 {
            let value = self.reg((word >> 16) & 0xf) + u64::from(word & 0xff);
            self.set_reg((word >> 12) & 0xf, value);
            return Ok(Effect::Next);
        }
        if word & 0xfff0_0fff == 0xe580_0000 {
            let value = self.reg((word >> 12) & 0xf) as u32;
            let address = self.reg((word >> 16) & 0xf);
            self.mem_write(address, &value.to_le_bytes())?;
            return Ok(Effect::Next);
        }
        if word & 0xff00_0000 == 0xea00_0000 {
            let offset = (((word & 0x00ff_ffff) << 8) as i32 >> 6) as i64;
            return Ok(Effect::Jump((pc as i64 + 8 + offset) as u64));
        }
        if word & 0xffff_fff0 == 0xe12f_ff10 {
            return Ok(Effect::Jump(self.reg(word & 0xf)));
        }
        Ok(Effect::Interrupt {
            number: 1,
            advance: false,
        })
    }

    fn execute_thumb(&mut self, half: u16) -> Effect {
        if half == THUMB_NOP {
            return Effect::Next;
        }
        if half & 0xff00 == 0xbe00 {
            return Effect::Interrupt {
                number: 7,
                advance: false,
            };
        }
        if half & 0xff00 == 0xdf00 {
            return Effect::Interrupt {
                number: 2,
                advance: true,
            };
        }
        if half & 0xf800 == 0x2000 {
            self.set_reg(u32::from((half >> 8) & 7), u64::from(half & 0xff));
            return Effect::Next;
        }
        Effect::Interrupt {
            number: 1,
            advance: false,
        }
    }
}

impl HookContext for MockEngine {
    fn reg_read(&self, register: EngineRegister) -> Result<u64, EngineError> {
        Ok(self.registers.get(&register.0).copied().unwrap_or(0))
    }

    fn mem_read(&self, address: u64, len: usize) -> Result<Vec<u8>, EngineError> {
        let index = self
            .mapping(address, len)
            .ok_or_else(|| EngineError::new(format!("read from unmapped 0x{address:x}")))?;
        let mapping = &self.mappings[index];
        let offset = (address - mapping.base) as usize;
        Ok(mapping.data[offset..offset + len].to_vec())
    }

    fn stop(&mut self) -> Result<(), EngineError> {
        self.stop_requested = true;
        Ok(())
    }
}

impl Engine for MockEngine {
    fn open(processor: Processor, mode: ProcessorMode) -> Result<Self, EngineError> {
        assert_eq!(processor, Processor::Arm);
        let cpsr = match mode {
            ProcessorMode::Arm => RESET_CPSR,
            ProcessorMode::Thumb => RESET_CPSR | CPSR_T,
        };
        Ok(Self {
            mode,
            mappings: Vec::new(),
            registers: HashMap::from([(ID_CPSR, cpsr)]),
            code_hook: None,
            interrupt_hook: false,
            stop_requested: false,
            clobber_on_stop: true,
            failing_register_write: None,
            failing_unmap: None,
            starts: Vec::new(),
        })
    }

    fn mem_map(&mut self, base: u64, size: u64, protection: Protection) -> Result<(), EngineError> {
        if size == 0 {
            return Err(EngineError::new("UC_ERR_ARG"));
        }
        let overlaps = self
            .mappings
            .iter()
            .any(|m| base < m.base + m.size && m.base < base + size);
        if overlaps {
            return Err(EngineError::new("UC_ERR_MAP"));
        }
        self.mappings.push(Mapping {
            base,
            size,
            protection,
            data: vec![0; size as usize],
        });
        Ok(())
    }

    fn mem_unmap(&mut self, base: u64, size: u64) -> Result<(), EngineError> {
        if self.failing_unmap == Some(base) {
            return Err(EngineError::new("UC_ERR_NOMEM"));
        }
        let index = self
            .mappings
            .iter()
            .position(|m| m.base == base && m.size == size)
            .ok_or_else(|| EngineError::new("UC_ERR_NOMEM"))?;
        self.mappings.remove(index);
        Ok(())
    }

    fn mem_write(&mut self, address: u64, data: &[u8]) -> Result<(), EngineError> {
        let index = self
            .mapping(address, data.len())
            .ok_or_else(|| EngineError::new(format!("write to unmapped 0x{address:x}")))?;
        let mapping = &mut self.mappings[index];
        let offset = (address - mapping.base) as usize;
        mapping.data[offset..offset + data.len()].copy_from_slice(data);
        Ok(())
    }

    fn reg_write(&mut self, register: EngineRegister, value: u64) -> Result<(), EngineError> {
        if self.failing_register_write == Some(register) {
            return Err(EngineError::new("UC_ERR_ARG"));
        }
        if register.0 == ID_PC {
            self.set_pc(value);
        } else {
            self.registers.insert(register.0, value);
        }
        Ok(())
    }

    fn install_hooks(&mut self, code_begin: u64, code_end: u64) -> Result<(), EngineError> {
        self.code_hook = Some((code_begin, code_end));
        self.interrupt_hook = true;
        Ok(())
    }

    fn start(
        &mut self,
        begin: u64,
        until: u64,
        hooks: &mut ExecutionHooks,
    ) -> Result<(), EngineError> {
        self.starts.push(begin);
        self.stop_requested = false;
        self.set_pc(begin);

        for _ in 0..10_000 {
            let pc = self.pc();
            if pc == until {
                return Ok(());
            }
            let thumb = self.cpsr() & CPSR_T != 0;
            let size: usize = if thumb { 2 } else { 4 };
            let bytes = self.fetch(pc, size)?;

            if self
                .code_hook
                .is_some_and(|(first, last)| pc >= first && pc <= last)
            {
                hooks.on_instruction(self, pc, size as u32);
                if self.stop_requested {
                    if self.clobber_on_stop {
                        let cpsr = self.cpsr() & !CPSR_T;
                        self.registers.insert(ID_CPSR, cpsr);
                        self.registers.insert(ID_PC, pc + size as u64);
                    }
                    return Ok(());
                }
            }

            let effect = if thumb {
                self.execute_thumb(u16::from_le_bytes([bytes[0], bytes[1]]))
            } else {
                self.execute_arm(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))?
            };
            match effect {
                Effect::Next => {
                    self.registers.insert(ID_PC, pc + size as u64);
                }
                Effect::Jump(target) => self.set_pc(target),
                Effect::Interrupt { number, advance } => {
                    if advance {
                        self.registers.insert(ID_PC, pc + size as u64);
                    }
                    if !self.interrupt_hook {
                        return Err(EngineError::new("UC_ERR_EXCEPTION"));
                    }
                    hooks.on_interrupt(self, number);
                    if self.stop_requested {
                        return Ok(());
                    }
                }
            }
        }
        Err(EngineError::new("runaway execution"))
    }
}

/// Fixed-width disassembler that names the handful of encodings the mock executes.
#[derive(Debug)]
pub struct MockDisassembler {
    mode: ProcessorMode,
}

impl Disassembler for MockDisassembler {
    fn open(_processor: Processor, mode: ProcessorMode) -> Result<Self, DisassemblyError> {
        Ok(Self { mode })
    }

    fn disassemble(
        &mut self,
        mode: ProcessorMode,
        bytes: &[u8],
        address: u64,
        count: usize,
    ) -> Result<Vec<DisassemblyRow>, DisassemblyError> {
        self.mode = mode;
        let width = match mode {
            ProcessorMode::Arm => 4,
            ProcessorMode::Thumb => 2,
        };
        Ok(bytes
            .chunks_exact(width)
            .take(count)
            .enumerate()
            .map(|(index, chunk)| {
                let (mnemonic, operands) = match (mode, chunk) {
                    (ProcessorMode::Arm, [a, b, c, d]) => {
                        let word = u32::from_le_bytes([*a, *b, *c, *d]);
                        if word == NOP {
                            ("nop".to_owned(), String::new())
                        } else if word & 0xfff0_00f0 == 0xe120_0070 {
                            ("bkpt".to_owned(), format!("#0x{:x}", ((word >> 4) & 0xfff0) | (word & 0xf)))
                        } else {
                            (".word".to_owned(), format!("0x{word:08x}"))
                        }
                    }
                    (_, [lo, hi]) => {
                        let half = u16::from_le_bytes([*lo, *hi]);
                        if half == THUMB_NOP {
                            ("nop".to_owned(), String::new())
                        } else {
                            (".short".to_owned(), format!("0x{half:04x}"))
                        }
                    }
                    _ => (".byte".to_owned(), String::new()),
                };
                DisassemblyRow {
                    address: address + (index * width) as u64,
                    bytes: chunk.to_vec(),
                    mnemonic,
                    operands,
                }
            })
            .collect())
    }
}

pub type TestDebugger = Debugger<MockEngine, MockDisassembler>;

pub fn write_file(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, bytes).expect("write fixture file");
    path
}

pub fn code_region(path: &Path) -> MemRegion {
    MemRegion::new("code", CODE_BASE, CODE_SIZE, "rx".parse().expect("rx"))
        .with_input_file(path)
}

pub fn config_for(dir: &Path, arch: &str, program: &[u8]) -> DebuggerConfig {
    let path = write_file(dir, "code.bin", program);
    let arch = Architecture::new(arch).expect("supported architecture");
    DebuggerConfig::new(arch)
        .with_region(code_region(&path))
        .expect("unique code region")
        .with_region(MemRegion::new("stack", 0x8000, 0x1000, Permissions {
            execute: false,
            ..Permissions::ALL
        }))
        .expect("unique stack region")
}

/// Boots an ARM-mode debugger over `words` loaded at [`CODE_BASE`].
pub fn arm_debugger(dir: &Path, words: &[u32]) -> TestDebugger {
    Debugger::new(config_for(dir, "arm", &arm_program(words))).expect("debugger boots")
}

/// Boots a Thumb-mode debugger over `halfwords` loaded at [`CODE_BASE`].
pub fn thumb_debugger(dir: &Path, halfwords: &[u16]) -> TestDebugger {
    Debugger::new(config_for(dir, "arm:thumb", &thumb_program(halfwords)))
        .expect("debugger boots")
}

pub fn reg(debugger: &TestDebugger, name: &str) -> u64 {
    debugger
        .read_register_by_name(name)
        .expect("register readable")
        .value()
}

pub fn pc_register(debugger: &TestDebugger) -> EngineRegister {
    debugger.arch().program_counter().engine_id
}
