//! Bindings to concrete emulation and disassembly libraries.

/// Capstone-backed [`crate::disasm::Disassembler`].
#[cfg(feature = "capstone")]
pub mod capstone;
/// Unicorn-backed [`crate::engine::Engine`].
#[cfg(feature = "unicorn")]
pub mod unicorn;

#[cfg(feature = "capstone")]
pub use self::capstone::CapstoneDisassembler;
#[cfg(feature = "unicorn")]
pub use self::unicorn::UnicornEngine;
