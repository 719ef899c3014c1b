use std::ops::Range;

use regex::Regex;

use crate::error::RegisterError;
use crate::literal::parse_u64;
use crate::register::definition::RegisterDefinition;
use crate::register::value::RegisterValue;

/// Ordered, immutable set of register definitions for one architecture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterTable {
    definitions: &'static [RegisterDefinition],
}

impl RegisterTable {
    /// Wraps a static definition slice.
    #[must_use]
    pub const fn new(definitions: &'static [RegisterDefinition]) -> Self {
        Self { definitions }
    }

    /// Returns all definitions in architecture order.
    #[must_use]
    pub const fn definitions(&self) -> &'static [RegisterDefinition] {
        self.definitions
    }

    /// Returns the number of registers.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Returns `true` if the table holds no registers.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Looks up a register by name or alias, case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns [`RegisterError::UnknownRegister`] if nothing matches.
    pub fn lookup(&self, name: &str) -> Result<&'static RegisterDefinition, RegisterError> {
        let name = name.trim();
        self.definitions
            .iter()
            .find(|definition| definition.matches(name))
            .ok_or_else(|| RegisterError::UnknownRegister(name.to_owned()))
    }

    /// Returns the program counter definition, if the table has one.
    #[must_use]
    pub fn program_counter(&self) -> Option<&'static RegisterDefinition> {
        self.definitions
            .iter()
            .find(|definition| definition.is_program_counter)
    }

    /// Parses a `name=value` assignment.
    ///
    /// Surrounding whitespace is ignored. The value may be decimal or `0x` hex and is
    /// masked to the register width.
    ///
    /// # Errors
    ///
    /// Returns [`RegisterError`] for a malformed assignment, unknown register name, or
    /// unparsable value.
    pub fn parse(&self, assignment: &str) -> Result<RegisterValue, RegisterError> {
        let trimmed = assignment.trim();
        let mut parts = trimmed.split('=');
        let (Some(name), Some(literal), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(RegisterError::MalformedAssignment(trimmed.to_owned()));
        };

        let definition = self.lookup(name)?;
        let literal = literal.trim();
        let value = parse_u64(literal).map_err(|source| RegisterError::InvalidValue {
            text: literal.to_owned(),
            source,
        })?;
        Ok(RegisterValue::new(definition, value))
    }

    /// Parses every assignment, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// Returns the first [`RegisterError`] encountered.
    pub fn parse_all<'a, I>(&self, assignments: I) -> Result<Vec<RegisterValue>, RegisterError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        assignments
            .into_iter()
            .map(|assignment| self.parse(assignment))
            .collect()
    }

    /// Returns a case-insensitive regular-expression source matching any whole register
    /// name or alias.
    ///
    /// Longer names are listed first so that `r10` is preferred over `r1`.
    #[must_use]
    pub fn pattern(&self) -> String {
        let mut names: Vec<&str> = self
            .definitions
            .iter()
            .flat_map(RegisterDefinition::names)
            .collect();
        names.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        names.dedup();
        let names: Vec<String> = names.into_iter().map(regex::escape).collect();
        format!(r"(?i)\b({})\b", names.join("|"))
    }

    /// Compiles [`RegisterTable::pattern`].
    ///
    /// # Errors
    ///
    /// Returns [`RegisterError::InvalidPattern`] if the expression does not compile.
    pub fn regex(&self) -> Result<Regex, RegisterError> {
        Regex::new(&self.pattern()).map_err(|err| RegisterError::InvalidPattern(err.to_string()))
    }

    /// Finds every match of [`RegisterTable::pattern`] in `text`, as ascending byte
    /// ranges.
    ///
    /// # Errors
    ///
    /// Returns [`RegisterError::InvalidPattern`] if the expression does not compile.
    pub fn find_names(&self, text: &str) -> Result<Vec<Range<usize>>, RegisterError> {
        let names = self.regex()?;
        Ok(names.find_iter(text).map(|m| m.range()).collect())
    }
}
