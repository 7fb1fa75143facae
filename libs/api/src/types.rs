use serde::Deserialize;

use crate::error::IngestError;

// ════════════════════════════════════════════════════════════════
//  Field Kind
// ════════════════════════════════════════════════════════════════

/// Logical type tag of one incoming field, as declared by the producer
/// ahead of the row data. The byte values are the wire encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FieldKind {
    Bool = 0,
    Byte = 1,
    Char = 2,
    Short = 3,
    Int = 4,
    Timestamp = 5,
    Long = 6,
    Float = 7,
    Double = 8,
    Str = 9,
    Vector = 10,
}

impl FieldKind {
    pub fn from_byte(b: u8) -> Result<Self, IngestError> {
        match b {
            0 => Ok(FieldKind::Bool),
            1 => Ok(FieldKind::Byte),
            2 => Ok(FieldKind::Char),
            3 => Ok(FieldKind::Short),
            4 => Ok(FieldKind::Int),
            5 => Ok(FieldKind::Timestamp),
            6 => Ok(FieldKind::Long),
            7 => Ok(FieldKind::Float),
            8 => Ok(FieldKind::Double),
            9 => Ok(FieldKind::Str),
            10 => Ok(FieldKind::Vector),
            other => Err(IngestError::protocol(format!("unknown field type tag: {other}"))),
        }
    }

    pub fn as_byte(self) -> u8 {
        self as u8
    }

    /// Storage kind of the physical column(s) this field maps to.
    /// Every expanded column of a vector field is numeric.
    pub fn storage(self) -> StorageKind {
        match self {
            FieldKind::Str => StorageKind::Str,
            _ => StorageKind::Num,
        }
    }
}

impl std::fmt::Display for FieldKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldKind::Bool => write!(f, "bool"),
            FieldKind::Byte => write!(f, "byte"),
            FieldKind::Char => write!(f, "char"),
            FieldKind::Short => write!(f, "short"),
            FieldKind::Int => write!(f, "int"),
            FieldKind::Timestamp => write!(f, "timestamp"),
            FieldKind::Long => write!(f, "long"),
            FieldKind::Float => write!(f, "float"),
            FieldKind::Double => write!(f, "double"),
            FieldKind::Str => write!(f, "string"),
            FieldKind::Vector => write!(f, "vector"),
        }
    }
}

// ════════════════════════════════════════════════════════════════
//  Storage Kind
// ════════════════════════════════════════════════════════════════

/// Physical type of one destination column in the chunk store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StorageKind {
    Num = 0,
    Str = 1,
}

impl StorageKind {
    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

impl std::fmt::Display for StorageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageKind::Num => write!(f, "num"),
            StorageKind::Str => write!(f, "str"),
        }
    }
}

// ════════════════════════════════════════════════════════════════
//  Request Kind
// ════════════════════════════════════════════════════════════════

/// The three session commands. The byte value doubles as the
/// acknowledgment echoed back after the command completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RequestKind {
    BeginFrame = 1,
    WriteChunk = 2,
    FinalizeFrame = 3,
}

impl RequestKind {
    pub fn from_byte(b: u8) -> Result<Self, IngestError> {
        match b {
            1 => Ok(RequestKind::BeginFrame),
            2 => Ok(RequestKind::WriteChunk),
            3 => Ok(RequestKind::FinalizeFrame),
            other => Err(IngestError::protocol(format!("unknown request code: {other}"))),
        }
    }

    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

impl std::fmt::Display for RequestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestKind::BeginFrame => write!(f, "begin_frame"),
            RequestKind::WriteChunk => write!(f, "write_chunk"),
            RequestKind::FinalizeFrame => write!(f, "finalize_frame"),
        }
    }
}

// ════════════════════════════════════════════════════════════════
//  Limits
// ════════════════════════════════════════════════════════════════

/// Guards applied to every length-prefixed payload the reader accepts.
/// Exceeding either is a protocol violation.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Maximum bytes per string.
    pub max_string: usize,
    /// Maximum elements per array.
    pub max_array: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_string: 1 << 20,
            max_array: 1 << 22,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_kind_round_trips_through_bytes() {
        for b in 0u8..=10 {
            let kind = FieldKind::from_byte(b).unwrap();
            assert_eq!(kind.as_byte(), b);
        }
        assert!(FieldKind::from_byte(11).is_err());
        assert!(FieldKind::from_byte(255).is_err());
    }

    #[test]
    fn only_string_fields_store_as_str() {
        for b in 0u8..=10 {
            let kind = FieldKind::from_byte(b).unwrap();
            if kind == FieldKind::Str {
                assert_eq!(kind.storage(), StorageKind::Str);
            } else {
                assert_eq!(kind.storage(), StorageKind::Num);
            }
        }
    }

    #[test]
    fn request_kind_rejects_unknown_codes() {
        assert!(RequestKind::from_byte(0).is_err());
        assert_eq!(RequestKind::from_byte(2).unwrap(), RequestKind::WriteChunk);
        assert!(RequestKind::from_byte(4).is_err());
    }
}
