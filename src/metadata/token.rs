//! Metadata tokens addressing rows of the module arena.

use std::fmt;
use std::hash::{Hash, Hasher};

/// A metadata token representing a reference to a table entry of a [`crate::metadata::module::Module`].
///
/// Tokens consist of a 32-bit value where:
/// - The high byte (bits 24-31) indicates the table type
/// - The low 24 bits (bits 0-23) indicate the 1-based row index within that table
///
/// Tokens are the stable handles of the module arena. They stay valid for the lifetime
/// of the module, since rows are only ever appended.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Token(pub u32);

impl Token {
    /// Table id of `TypeRef` rows
    pub const TYPE_REF: u8 = 0x01;
    /// Table id of `TypeDef` rows
    pub const TYPE_DEF: u8 = 0x02;
    /// Table id of `Field` rows
    pub const FIELD: u8 = 0x04;
    /// Table id of `MethodDef` rows
    pub const METHOD_DEF: u8 = 0x06;
    /// Table id of `MemberRef` rows
    pub const MEMBER_REF: u8 = 0x0A;
    /// Table id of `TypeSpec` rows
    pub const TYPE_SPEC: u8 = 0x1B;
    /// Table id of `MethodSpec` rows
    pub const METHOD_SPEC: u8 = 0x2B;

    /// Creates a new token from a raw 32-bit value
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Token(value)
    }

    /// Creates a token from a table id and a 1-based row
    #[must_use]
    pub const fn from_parts(table: u8, row: u32) -> Self {
        Token(((table as u32) << 24) | (row & 0x00FF_FFFF))
    }

    /// Returns the raw token value
    #[must_use]
    pub fn value(&self) -> u32 {
        self.0
    }

    /// Extracts the table type from the token (high byte)
    #[must_use]
    pub fn table(&self) -> u8 {
        (self.0 >> 24) as u8
    }

    /// Extracts the row index from the token (low 24 bits)
    #[must_use]
    pub fn row(&self) -> u32 {
        self.0 & 0x00FF_FFFF
    }

    /// Returns the zero-based arena index of this token, if it is not a null row
    #[must_use]
    pub fn index(&self) -> Option<usize> {
        match self.row() {
            0 => None,
            row => Some(row as usize - 1),
        }
    }

    /// Returns true if this is a null token (value 0)
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.0 == 0
    }

    /// Returns true if the token belongs to the given table
    #[must_use]
    pub fn is_table(&self, table: u8) -> bool {
        self.table() == table
    }
}

impl From<u32> for Token {
    fn from(value: u32) -> Self {
        Token(value)
    }
}

impl From<Token> for u32 {
    fn from(token: Token) -> Self {
        token.0
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Token(0x{:08x}, table: 0x{:02x}, row: {})",
            self.0,
            self.table(),
            self.row()
        )
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

impl Hash for Token {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}
