use crate::error::FormatError;
use crate::package::index::ResourceKey;
use std::fmt;

/// Generic typed value used by inspection tools to read and write fields.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentValue {
    Bool(bool),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    I16(i16),
    I32(i32),
    F32(f32),
    String(String),
    Key(ResourceKey),
    Bytes(Vec<u8>),
    List(Vec<ContentValue>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldInfo {
    pub name: &'static str,
    pub writable: bool,
}

impl FieldInfo {
    pub const fn rw(name: &'static str) -> Self {
        Self { name, writable: true }
    }

    pub const fn ro(name: &'static str) -> Self {
        Self { name, writable: false }
    }
}

impl ContentValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            ContentValue::Bool(_) => "bool",
            ContentValue::U8(_) => "u8",
            ContentValue::U16(_) => "u16",
            ContentValue::U32(_) => "u32",
            ContentValue::U64(_) => "u64",
            ContentValue::I16(_) => "i16",
            ContentValue::I32(_) => "i32",
            ContentValue::F32(_) => "f32",
            ContentValue::String(_) => "string",
            ContentValue::Key(_) => "key",
            ContentValue::Bytes(_) => "bytes",
            ContentValue::List(_) => "list",
        }
    }

    fn mismatch(&self, expected: &str) -> FormatError {
        FormatError::invalid(format!("expected a {} value, got {}", expected, self.type_name()))
    }
}

macro_rules! content_value_conversions {
    ($($variant:ident => $ty:ty, $name:literal;)*) => {
        $(
            impl From<$ty> for ContentValue {
                fn from(v: $ty) -> Self {
                    ContentValue::$variant(v)
                }
            }

            impl TryFrom<ContentValue> for $ty {
                type Error = FormatError;

                fn try_from(v: ContentValue) -> Result<Self, Self::Error> {
                    match v {
                        ContentValue::$variant(inner) => Ok(inner),
                        other => Err(other.mismatch($name)),
                    }
                }
            }
        )*
    };
}

content_value_conversions! {
    Bool => bool, "bool";
    U8 => u8, "u8";
    U16 => u16, "u16";
    U32 => u32, "u32";
    U64 => u64, "u64";
    I16 => i16, "i16";
    I32 => i32, "i32";
    F32 => f32, "f32";
    String => String, "string";
    Key => ResourceKey, "key";
    Bytes => Vec<u8>, "bytes";
}

impl From<&str> for ContentValue {
    fn from(v: &str) -> Self {
        ContentValue::String(v.to_string())
    }
}

impl fmt::Display for ContentValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentValue::Bool(v) => write!(f, "{}", v),
            ContentValue::U8(v) => write!(f, "0x{:02X}", v),
            ContentValue::U16(v) => write!(f, "0x{:04X}", v),
            ContentValue::U32(v) => write!(f, "0x{:08X}", v),
            ContentValue::U64(v) => write!(f, "0x{:016X}", v),
            ContentValue::I16(v) => write!(f, "{}", v),
            ContentValue::I32(v) => write!(f, "{}", v),
            ContentValue::F32(v) => write!(f, "{}", v),
            ContentValue::String(v) => write!(f, "{:?}", v),
            ContentValue::Key(v) => write!(f, "{}", v),
            ContentValue::Bytes(v) => write!(f, "<{} bytes>", v.len()),
            ContentValue::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
        }
    }
}
