use std::io;
use std::num::ParseIntError;
use std::path::PathBuf;

use thiserror::Error;

/// Error classes used to decide how a caller should react to a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum ErrorClass {
    /// Bad region, register, or architecture specification.
    Configuration,
    /// The emulation engine, disassembler, or host filesystem rejected an operation.
    Engine,
    /// A controller invariant was violated; indicates a bug rather than user error.
    Internal,
}

/// Failures while looking up, parsing, or editing register values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegisterError {
    /// No register or alias with this name exists.
    #[error("\"{0}\" is not a valid register name")]
    UnknownRegister(String),
    /// Assignment text is not of the form `name=value`.
    #[error("\"{0}\" is not a valid register assignment")]
    MalformedAssignment(String),
    /// Value literal is neither decimal nor `0x`-prefixed hex, or overflows 64 bits.
    #[error("invalid register value \"{text}\": {source}")]
    InvalidValue {
        /// Literal as written by the operator.
        text: String,
        /// Underlying integer parse failure.
        source: ParseIntError,
    },
    /// Register has no flag field with this name.
    #[error("register {register} has no flag named \"{flag}\"")]
    UnknownFlag {
        /// Primary name of the register that was searched.
        register: &'static str,
        /// Flag name as requested.
        flag: String,
    },
    /// The register-name expression built from a table did not compile.
    #[error("register name pattern does not compile: {0}")]
    InvalidPattern(String),
}

/// Failures while parsing, validating, loading, or flushing memory regions.
#[derive(Debug, Error)]
pub enum RegionError {
    /// Specification did not have between 3 and 6 `:`-separated fields.
    #[error("\"{0}\" is not of the form name:base:size[:perms[:input[:output]]]")]
    FieldCount(String),
    /// Region name is empty.
    #[error("memory region name cannot be blank")]
    EmptyName,
    /// Base address literal could not be parsed.
    #[error("invalid memory region base address: {0}")]
    InvalidBase(String),
    /// Size literal could not be parsed.
    #[error("invalid memory region size: {0}")]
    InvalidSize(String),
    /// Region has a size of zero.
    #[error("zero-length mappings are not permitted (region \"{0}\")")]
    ZeroSize(String),
    /// `base + size` does not fit in the 64-bit address space.
    #[error("0x{base:08x}:0x{size:08x} exceeds address space limits")]
    AddressOverflow {
        /// Requested base address.
        base: u64,
        /// Requested size in bytes.
        size: u64,
    },
    /// Permission string contains characters other than `r`, `w`, `x`.
    #[error("invalid permissions string: {0}")]
    InvalidPermissions(String),
    /// Named input file does not exist.
    #[error("input file {} for region \"{name}\" does not exist", .path.display())]
    MissingInputFile {
        /// Region the file belongs to.
        name: String,
        /// Path as configured.
        path: PathBuf,
    },
    /// The `code` region lacks the execute permission.
    #[error("the \"code\" region must be executable")]
    CodeNotExecutable,
    /// The `code` region has no input file to load program bytes from.
    #[error("the \"code\" region requires an input file")]
    CodeWithoutInput,
    /// A region with this name is already present.
    #[error("a region named \"{0}\" already exists")]
    DuplicateName(String),
    /// No region with this name is present.
    #[error("memory region \"{0}\" does not exist")]
    NotFound(String),
    /// Input file holds more bytes than the region can store.
    #[error(
        "input file {} ({len} bytes) does not fit region \"{name}\" ({size} bytes)",
        .path.display()
    )]
    InputTooLarge {
        /// Region the file belongs to.
        name: String,
        /// Path as configured.
        path: PathBuf,
        /// File length in bytes.
        len: u64,
        /// Region size in bytes.
        size: u64,
    },
    /// Input file exists but could not be read.
    #[error("failed to read input file {} for region \"{name}\": {source}", .path.display())]
    ReadInput {
        /// Region the file belongs to.
        name: String,
        /// Path as configured.
        path: PathBuf,
        /// Underlying I/O failure.
        source: io::Error,
    },
    /// Region contents could not be written to the output file.
    #[error("failed to write output file {} for region \"{name}\": {source}", .path.display())]
    WriteOutput {
        /// Region the file belongs to.
        name: String,
        /// Path as configured.
        path: PathBuf,
        /// Underlying I/O failure.
        source: io::Error,
    },
}

impl RegionError {
    /// Returns the error class for this region failure.
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::ReadInput { .. } | Self::WriteOutput { .. } => ErrorClass::Engine,
            _ => ErrorClass::Configuration,
        }
    }
}

/// Failures raised by architecture definitions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArchError {
    /// Architecture family is not supported.
    #[error("unsupported architecture: {0}")]
    UnsupportedArchitecture(String),
    /// Architecture family exists but the requested mode does not.
    #[error("invalid {arch} mode specified (\"{mode}\")")]
    InvalidMode {
        /// Architecture family name.
        arch: &'static str,
        /// Mode as requested.
        mode: String,
    },
    /// A register required to derive state was missing from the snapshot.
    #[error("register {0} is missing from the supplied register snapshot")]
    MissingRegister(&'static str),
    /// Too few raw instruction bytes were supplied for exception decoding.
    #[error("exception decoding needs {needed} instruction bytes, got {actual}")]
    InstructionTooShort {
        /// Minimum byte count for the current instruction set.
        needed: usize,
        /// Byte count actually supplied.
        actual: usize,
    },
}

impl ArchError {
    /// Returns the error class for this architecture failure.
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::UnsupportedArchitecture(_) | Self::InvalidMode { .. } => {
                ErrorClass::Configuration
            }
            Self::MissingRegister(_) | Self::InstructionTooShort { .. } => ErrorClass::Internal,
        }
    }
}

/// Opaque failure reported by an emulation engine backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct EngineError {
    message: String,
}

impl EngineError {
    /// Creates an engine error from a backend-provided message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the backend-provided message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Opaque failure reported by a disassembler backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct DisassemblyError {
    message: String,
}

impl DisassemblyError {
    /// Creates a disassembly error from a backend-provided message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Top-level error returned by debugger controller operations.
#[derive(Debug, Error)]
pub enum DebuggerError {
    /// Register lookup or parse failure.
    #[error(transparent)]
    Register(#[from] RegisterError),
    /// Memory region specification, validation, or file failure.
    #[error(transparent)]
    Region(#[from] RegionError),
    /// Architecture selection or derivation failure.
    #[error(transparent)]
    Arch(#[from] ArchError),
    /// Configuration has no region named `code`.
    #[error("a memory mapped region named \"code\" must be provided")]
    MissingCodeRegion,
    /// `step` was asked to execute zero instructions.
    #[error("step count must be at least 1")]
    InvalidStepCount,
    /// Emulation engine could not be created.
    #[error("failed to open emulation engine: {0}")]
    Open(#[source] EngineError),
    /// Disassembler could not be created.
    #[error("failed to open disassembler: {0}")]
    OpenDisassembler(#[source] DisassemblyError),
    /// Per-instruction or per-interrupt hooks could not be installed.
    #[error("failed to install execution hooks: {0}")]
    InstallHooks(#[source] EngineError),
    /// Engine refused to map a region.
    #[error("failed to map region \"{name}\": {source}")]
    Map {
        /// Region name.
        name: String,
        /// Engine failure.
        source: EngineError,
    },
    /// Engine refused to unmap a region.
    #[error("failed to unmap region \"{name}\": {source}")]
    Unmap {
        /// Region name.
        name: String,
        /// Engine failure.
        source: EngineError,
    },
    /// Engine refused a register read.
    #[error("failed to read register {register}: {source}")]
    RegisterRead {
        /// Primary register name.
        register: &'static str,
        /// Engine failure.
        source: EngineError,
    },
    /// Engine refused a register write.
    #[error("failed to write register {register}: {source}")]
    RegisterWrite {
        /// Primary register name.
        register: &'static str,
        /// Engine failure.
        source: EngineError,
    },
    /// Engine refused a memory read.
    #[error("failed to read {len} bytes at 0x{address:08x}: {source}")]
    MemoryRead {
        /// First address read.
        address: u64,
        /// Number of bytes requested.
        len: usize,
        /// Engine failure.
        source: EngineError,
    },
    /// Engine refused a memory write.
    #[error("failed to write {len} bytes at 0x{address:08x}: {source}")]
    MemoryWrite {
        /// First address written.
        address: u64,
        /// Number of bytes supplied.
        len: usize,
        /// Engine failure.
        source: EngineError,
    },
    /// Address does not fall inside any mapped region.
    #[error("address 0x{0:08x} is not inside a mapped region")]
    Unmapped(u64),
    /// The blocking start call itself failed.
    #[error("emulation stopped with an engine error: {0}")]
    Run(#[source] EngineError),
    /// An engine call made from inside an execution hook failed.
    #[error("{stage} failed inside an execution hook: {source}")]
    Hook {
        /// What the hook was doing.
        stage: &'static str,
        /// Engine failure.
        source: EngineError,
    },
    /// Disassembler backend failure.
    #[error("disassembly failed: {0}")]
    Disassembly(#[source] DisassemblyError),
}

impl DebuggerError {
    /// Returns the error class for this failure.
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::Register(RegisterError::InvalidPattern(_)) | Self::Hook { .. } => {
                ErrorClass::Internal
            }
            Self::Register(_) | Self::MissingCodeRegion | Self::InvalidStepCount => {
                ErrorClass::Configuration
            }
            Self::Region(err) => err.class(),
            Self::Arch(err) => err.class(),
            Self::Open(_)
            | Self::OpenDisassembler(_)
            | Self::InstallHooks(_)
            | Self::Map { .. }
            | Self::Unmap { .. }
            | Self::RegisterRead { .. }
            | Self::RegisterWrite { .. }
            | Self::MemoryRead { .. }
            | Self::MemoryWrite { .. }
            | Self::Unmapped(_)
            | Self::Run(_)
            | Self::Disassembly(_) => ErrorClass::Engine,
        }
    }
}
