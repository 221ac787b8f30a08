//! Struct-format mini-language for fixed-width binary layouts.
//!
//! A format string is an optional endianness marker (`>` big, `<` little)
//! followed by one or more single-character type codes:
//!
//! | Code | Type  | Code | Type  |
//! |------|-------|------|-------|
//! | `B`  | `u8`  | `b`  | `i8`  |
//! | `H`  | `u16` | `h`  | `i16` |
//! | `I`  | `u32` | `i`  | `i32` |
//! | `Q`  | `u64` | `q`  | `i64` |
//! | `f`  | `f32` | `d`  | `f64` |
//!
//! When no marker is present the cursor's current endianness applies; the
//! cursor canonicalizes formats before use so a stored format tag is always
//! self-describing. Pack followed by unpack reproduces the original values
//! exactly, and vice versa for already-encoded bytes.

use crate::error::{Error, Result};
use serde::Serialize;

/// Marker character for big-endian formats
pub const ENDIAN_BIG: char = '>';

/// Marker character for little-endian formats
pub const ENDIAN_LITTLE: char = '<';

/// Byte order applied to multi-byte fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endian {
    /// Most significant byte first
    #[default]
    Big,
    /// Least significant byte first
    Little,
}

impl Endian {
    /// Returns the format-string marker for this byte order
    pub fn marker(self) -> char {
        match self {
            Endian::Big => ENDIAN_BIG,
            Endian::Little => ENDIAN_LITTLE,
        }
    }
}

impl TryFrom<char> for Endian {
    type Error = Error;

    fn try_from(value: char) -> Result<Self> {
        match value {
            ENDIAN_BIG => Ok(Endian::Big),
            ENDIAN_LITTLE => Ok(Endian::Little),
            other => Err(Error::InvalidEndian(other)),
        }
    }
}

/// Single fixed-width field type code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldCode {
    /// Unsigned 8-bit (`B`)
    U8,
    /// Signed 8-bit (`b`)
    I8,
    /// Unsigned 16-bit (`H`)
    U16,
    /// Signed 16-bit (`h`)
    I16,
    /// Unsigned 32-bit (`I`)
    U32,
    /// Signed 32-bit (`i`)
    I32,
    /// Unsigned 64-bit (`Q`)
    U64,
    /// Signed 64-bit (`q`)
    I64,
    /// 32-bit float (`f`)
    F32,
    /// 64-bit float (`d`)
    F64,
}

impl FieldCode {
    /// Maps a type-code character to a field code
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'B' => Some(FieldCode::U8),
            'b' => Some(FieldCode::I8),
            'H' => Some(FieldCode::U16),
            'h' => Some(FieldCode::I16),
            'I' => Some(FieldCode::U32),
            'i' => Some(FieldCode::I32),
            'Q' => Some(FieldCode::U64),
            'q' => Some(FieldCode::I64),
            'f' => Some(FieldCode::F32),
            'd' => Some(FieldCode::F64),
            _ => None,
        }
    }

    /// Returns the type-code character for this field
    pub fn as_char(self) -> char {
        match self {
            FieldCode::U8 => 'B',
            FieldCode::I8 => 'b',
            FieldCode::U16 => 'H',
            FieldCode::I16 => 'h',
            FieldCode::U32 => 'I',
            FieldCode::I32 => 'i',
            FieldCode::U64 => 'Q',
            FieldCode::I64 => 'q',
            FieldCode::F32 => 'f',
            FieldCode::F64 => 'd',
        }
    }

    /// Encoded width of this field in bytes
    pub fn size(self) -> usize {
        match self {
            FieldCode::U8 | FieldCode::I8 => 1,
            FieldCode::U16 | FieldCode::I16 => 2,
            FieldCode::U32 | FieldCode::I32 | FieldCode::F32 => 4,
            FieldCode::U64 | FieldCode::I64 | FieldCode::F64 => 8,
        }
    }
}

/// A parsed format string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Format {
    /// Explicit byte-order marker, if the string carried one
    pub endian: Option<Endian>,
    /// Field codes in declaration order
    pub fields: Vec<FieldCode>,
}

impl Format {
    /// Parses a format string.
    ///
    /// Fails with [`Error::BadFormat`] on an empty field list or an unknown
    /// type code.
    pub fn parse(fmt: &str) -> Result<Self> {
        let mut chars = fmt.chars().peekable();
        let endian = match chars.peek() {
            Some(&c) if c == ENDIAN_BIG || c == ENDIAN_LITTLE => {
                chars.next();
                Some(Endian::try_from(c)?)
            }
            _ => None,
        };

        let mut fields = Vec::new();
        for c in chars {
            match FieldCode::from_char(c) {
                Some(code) => fields.push(code),
                None => {
                    return Err(Error::bad_format(
                        fmt,
                        format!("unknown type code '{}'", c),
                    ));
                }
            }
        }

        if fields.is_empty() {
            return Err(Error::bad_format(fmt, "no type codes"));
        }

        Ok(Self { endian, fields })
    }

    /// Total encoded size of all fields in bytes
    pub fn byte_size(&self) -> usize {
        self.fields.iter().map(|f| f.size()).sum()
    }

    /// Byte order in effect, falling back to `default` when unmarked
    pub fn resolved_endian(&self, default: Endian) -> Endian {
        self.endian.unwrap_or(default)
    }

    /// Renders the format with an explicit marker, resolving an unmarked
    /// string against `default`
    pub fn canonical(&self, default: Endian) -> String {
        let mut s = String::with_capacity(self.fields.len() + 1);
        s.push(self.resolved_endian(default).marker());
        s.extend(self.fields.iter().map(|f| f.as_char()));
        s
    }
}

/// Computes the encoded size of a format string in bytes
pub fn size_of(fmt: &str) -> Result<usize> {
    Ok(Format::parse(fmt)?.byte_size())
}

/// A single decoded field value
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    /// Unsigned 8-bit
    U8(u8),
    /// Signed 8-bit
    I8(i8),
    /// Unsigned 16-bit
    U16(u16),
    /// Signed 16-bit
    I16(i16),
    /// Unsigned 32-bit
    U32(u32),
    /// Signed 32-bit
    I32(i32),
    /// Unsigned 64-bit
    U64(u64),
    /// Signed 64-bit
    I64(i64),
    /// 32-bit float
    F32(f32),
    /// 64-bit float
    F64(f64),
}

impl Value {
    /// The field code this value encodes as
    pub fn code(self) -> FieldCode {
        match self {
            Value::U8(_) => FieldCode::U8,
            Value::I8(_) => FieldCode::I8,
            Value::U16(_) => FieldCode::U16,
            Value::I16(_) => FieldCode::I16,
            Value::U32(_) => FieldCode::U32,
            Value::I32(_) => FieldCode::I32,
            Value::U64(_) => FieldCode::U64,
            Value::I64(_) => FieldCode::I64,
            Value::F32(_) => FieldCode::F32,
            Value::F64(_) => FieldCode::F64,
        }
    }

    /// Widens any unsigned variant to `u64`
    pub fn as_u64(self) -> Option<u64> {
        match self {
            Value::U8(v) => Some(v as u64),
            Value::U16(v) => Some(v as u64),
            Value::U32(v) => Some(v as u64),
            Value::U64(v) => Some(v),
            _ => None,
        }
    }

    /// Widens any signed variant to `i64`
    pub fn as_i64(self) -> Option<i64> {
        match self {
            Value::I8(v) => Some(v as i64),
            Value::I16(v) => Some(v as i64),
            Value::I32(v) => Some(v as i64),
            Value::I64(v) => Some(v),
            _ => None,
        }
    }

    /// Widens either float variant to `f64`
    pub fn as_f64(self) -> Option<f64> {
        match self {
            Value::F32(v) => Some(v as f64),
            Value::F64(v) => Some(v),
            _ => None,
        }
    }
}

macro_rules! value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(impl From<$ty> for Value {
            fn from(v: $ty) -> Self {
                Value::$variant(v)
            }
        })*
    };
}

value_from! {
    u8 => U8, i8 => I8, u16 => U16, i16 => I16,
    u32 => U32, i32 => I32, u64 => U64, i64 => I64,
    f32 => F32, f64 => F64,
}

fn put(buf: &mut Vec<u8>, endian: Endian, value: Value) {
    macro_rules! emit {
        ($v:expr) => {
            match endian {
                Endian::Big => buf.extend_from_slice(&$v.to_be_bytes()),
                Endian::Little => buf.extend_from_slice(&$v.to_le_bytes()),
            }
        };
    }
    match value {
        Value::U8(v) => emit!(v),
        Value::I8(v) => emit!(v),
        Value::U16(v) => emit!(v),
        Value::I16(v) => emit!(v),
        Value::U32(v) => emit!(v),
        Value::I32(v) => emit!(v),
        Value::U64(v) => emit!(v),
        Value::I64(v) => emit!(v),
        Value::F32(v) => emit!(v),
        Value::F64(v) => emit!(v),
    }
}

fn take(data: &[u8], endian: Endian, code: FieldCode) -> Value {
    macro_rules! get {
        ($ty:ty, $variant:ident) => {{
            let mut raw = [0u8; std::mem::size_of::<$ty>()];
            raw.copy_from_slice(data);
            match endian {
                Endian::Big => Value::$variant(<$ty>::from_be_bytes(raw)),
                Endian::Little => Value::$variant(<$ty>::from_le_bytes(raw)),
            }
        }};
    }
    match code {
        FieldCode::U8 => get!(u8, U8),
        FieldCode::I8 => get!(i8, I8),
        FieldCode::U16 => get!(u16, U16),
        FieldCode::I16 => get!(i16, I16),
        FieldCode::U32 => get!(u32, U32),
        FieldCode::I32 => get!(i32, I32),
        FieldCode::U64 => get!(u64, U64),
        FieldCode::I64 => get!(i64, I64),
        FieldCode::F32 => get!(f32, F32),
        FieldCode::F64 => get!(f64, F64),
    }
}

/// Encodes `values` according to `fmt`, using `default` byte order when the
/// format carries no marker.
///
/// Fails with [`Error::BadFormat`] when the value count or a value's type
/// does not match the format.
pub fn pack(fmt: &str, default: Endian, values: &[Value]) -> Result<Vec<u8>> {
    let format = Format::parse(fmt)?;
    if values.len() != format.fields.len() {
        return Err(Error::bad_format(
            fmt,
            format!(
                "format has {} fields but {} values were supplied",
                format.fields.len(),
                values.len()
            ),
        ));
    }

    let endian = format.resolved_endian(default);
    let mut buf = Vec::with_capacity(format.byte_size());
    for (i, (&value, &code)) in values.iter().zip(&format.fields).enumerate() {
        if value.code() != code {
            return Err(Error::bad_format(
                fmt,
                format!(
                    "value {} is '{}' but format expects '{}'",
                    i,
                    value.code().as_char(),
                    code.as_char()
                ),
            ));
        }
        put(&mut buf, endian, value);
    }
    Ok(buf)
}

/// Decodes `data` according to `fmt`, using `default` byte order when the
/// format carries no marker.
///
/// `data` must be exactly the format's encoded size.
pub fn unpack(fmt: &str, default: Endian, data: &[u8]) -> Result<Vec<Value>> {
    let format = Format::parse(fmt)?;
    if data.len() != format.byte_size() {
        return Err(Error::bad_format(
            fmt,
            format!(
                "format is {} bytes but {} bytes were supplied",
                format.byte_size(),
                data.len()
            ),
        ));
    }

    let endian = format.resolved_endian(default);
    let mut values = Vec::with_capacity(format.fields.len());
    let mut offset = 0;
    for &code in &format.fields {
        values.push(take(&data[offset..offset + code.size()], endian, code));
        offset += code.size();
    }
    Ok(values)
}
