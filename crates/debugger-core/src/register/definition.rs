/// Opaque register identifier understood by the emulation engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct EngineRegister(pub i32);

/// How a register or flag value is rendered for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum DisplayFormat {
    /// `0x`-prefixed lowercase hex, zero-padded to `digits` digits.
    Hex {
        /// Minimum digit count; `0` disables padding.
        digits: u8,
    },
    /// Plain decimal.
    Decimal,
}

impl DisplayFormat {
    /// Renders `value` in this format.
    #[must_use]
    pub fn render(self, value: u64) -> String {
        match self {
            Self::Hex { digits } => format!("0x{value:0width$x}", width = usize::from(digits)),
            Self::Decimal => value.to_string(),
        }
    }
}

/// Contiguous bit-field inside a register, e.g. a condition flag or mode field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Flag {
    /// Short flag name, e.g. `N` or `GE`.
    pub name: &'static str,
    /// Human-readable explanation of the field's values.
    pub description: &'static str,
    /// Field mask in register position.
    pub mask: u64,
    /// Bit position of the field's least significant bit.
    pub lsb: u32,
    /// Display format for the extracted field value.
    pub format: DisplayFormat,
}

impl Flag {
    /// Builds a flag covering `width` bits starting at `lsb`.
    #[must_use]
    pub const fn new(
        name: &'static str,
        description: &'static str,
        lsb: u32,
        width: u32,
        format: DisplayFormat,
    ) -> Self {
        let field = if width >= u64::BITS {
            u64::MAX
        } else {
            (1 << width) - 1
        };
        Self {
            name,
            description,
            mask: field << lsb,
            lsb,
            format,
        }
    }

    /// Extracts this field from a full register value.
    #[must_use]
    pub const fn extract(&self, register_value: u64) -> u64 {
        (register_value & self.mask) >> self.lsb
    }

    /// Returns `register_value` with this field replaced by `field_value`.
    ///
    /// Bits of `field_value` that do not fit the field are discarded.
    #[must_use]
    pub const fn insert(&self, register_value: u64, field_value: u64) -> u64 {
        (register_value & !self.mask) | ((field_value << self.lsb) & self.mask)
    }

    /// Returns `true` when the mask is non-empty, contiguous, starts at `lsb`,
    /// and lies within `register_mask`.
    #[must_use]
    pub const fn is_well_formed(&self, register_mask: u64) -> bool {
        if self.mask == 0 || self.mask.trailing_zeros() != self.lsb {
            return false;
        }
        let shifted = self.mask >> self.lsb;
        shifted & shifted.wrapping_add(1) == 0 && self.mask & !register_mask == 0
    }
}

/// Immutable description of one architectural register.
#[derive(Debug, PartialEq, Eq)]
pub struct RegisterDefinition {
    /// Primary, lowercase register name.
    pub name: &'static str,
    /// Alternative names accepted on lookup.
    pub aliases: &'static [&'static str],
    /// Mask of bits the register can hold.
    pub mask: u64,
    /// Display format for the full value.
    pub format: DisplayFormat,
    /// Engine-side identifier.
    pub engine_id: EngineRegister,
    /// Whether this is the architecture's program counter.
    pub is_program_counter: bool,
    /// Named bit-fields inside the register.
    pub flags: &'static [Flag],
}

impl RegisterDefinition {
    /// Returns `true` if `name` is this register's name or one of its aliases,
    /// compared case-insensitively.
    #[must_use]
    pub fn matches(&self, name: &str) -> bool {
        self.names().any(|candidate| candidate.eq_ignore_ascii_case(name))
    }

    /// Iterates the primary name followed by all aliases.
    pub fn names(&self) -> impl Iterator<Item = &'static str> {
        std::iter::once(self.name).chain(self.aliases.iter().copied())
    }

    /// Looks up a flag by case-insensitive name.
    #[must_use]
    pub fn flag(&self, name: &str) -> Option<&'static Flag> {
        self.flags
            .iter()
            .find(|flag| flag.name.eq_ignore_ascii_case(name))
    }
}
