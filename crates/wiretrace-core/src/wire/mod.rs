//! Seekable byte cursor with interception hooks.
//!
//! [`Wire`] owns a seekable byte buffer (in-memory and growable, or an
//! externally supplied stream handle) and exposes positioned read/write/peek
//! primitives, an explicit position save/restore stack, endianness-aware
//! fixed-width integer helpers, and a struct-format pack/unpack layer.
//!
//! ## Interception
//!
//! Every primitive operation runs its arguments through a pre-hook pipeline
//! before touching the buffer and its result through a post-hook pipeline
//! after, even when no hooks are installed (identity pass-through). The
//! structure tracker is built entirely on this seam; see
//! [`StructureReader`](crate::StructureReader).
//!
//! ## Example
//!
//! ```
//! use wiretrace_core::{Endian, Wire};
//!
//! let mut wire = Wire::from_bytes(b"test\x12\x34".to_vec());
//! wire.set_endian(Endian::Big);
//! assert_eq!(wire.read_exact(4)?, b"test");
//! assert_eq!(wire.read_u16()?, 0x1234);
//! # Ok::<(), wiretrace_core::Error>(())
//! ```

pub mod fmt;
mod hooks;

use crate::error::{Error, Result};
use std::io::{Cursor, Read, Seek, SeekFrom, Write};
use tracing::trace;

pub use fmt::{Endian, FieldCode, Format, Value, ENDIAN_BIG, ENDIAN_LITTLE};
pub use hooks::{BytesFn, FmtFn, Hook, HookCtx, SizeFn};

use hooks::HookRegistry;

/// Externally supplied storage for a [`Wire`]
pub trait Stream: Read + Write + Seek {}

impl<T: Read + Write + Seek> Stream for T {}

enum Storage {
    /// Owned, growable in-memory buffer
    Memory(Cursor<Vec<u8>>),
    /// Externally owned readable/seekable handle
    Stream(Box<dyn Stream>),
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Storage::Memory(c) => f
                .debug_tuple("Memory")
                .field(&c.get_ref().len())
                .finish(),
            Storage::Stream(_) => f.debug_tuple("Stream").finish(),
        }
    }
}

impl Storage {
    fn inner(&mut self) -> &mut dyn Stream {
        match self {
            Storage::Memory(c) => c,
            Storage::Stream(s) => s.as_mut(),
        }
    }
}

/// Seekable byte cursor with pluggable pre/post interception hooks
#[derive(Debug)]
pub struct Wire {
    storage: Storage,
    pos_stack: Vec<u64>,
    endian: Endian,
    hooks: HookRegistry,
}

impl Default for Wire {
    fn default() -> Self {
        Self::new()
    }
}

impl Wire {
    /// Creates an empty, growable cursor (for writing)
    pub fn new() -> Self {
        Self::from_bytes(Vec::new())
    }

    /// Creates a cursor over an owned in-memory byte blob
    pub fn from_bytes(data: impl Into<Vec<u8>>) -> Self {
        Self {
            storage: Storage::Memory(Cursor::new(data.into())),
            pos_stack: Vec::new(),
            endian: Endian::default(),
            hooks: HookRegistry::default(),
        }
    }

    /// Creates a cursor over an externally owned stream handle
    pub fn from_stream(stream: Box<dyn Stream>) -> Self {
        Self {
            storage: Storage::Stream(stream),
            pos_stack: Vec::new(),
            endian: Endian::default(),
            hooks: HookRegistry::default(),
        }
    }

    /// Registers a hook; every subsequent call to the matching operation
    /// passes through it in registration order
    pub fn install_hook(&mut self, hook: Hook) {
        trace!(?hook, "installing hook");
        self.hooks.install(hook);
    }

    /// Byte order applied by the fixed-width helpers and unmarked formats
    pub fn endian(&self) -> Endian {
        self.endian
    }

    /// Sets the byte order for fixed-width helpers and unmarked formats.
    /// Raw `read`/`write` are unaffected.
    pub fn set_endian(&mut self, endian: Endian) {
        self.endian = endian;
    }

    /// Current byte offset from the start of the buffer
    pub fn position(&mut self) -> Result<u64> {
        match &mut self.storage {
            Storage::Memory(c) => Ok(c.position()),
            Storage::Stream(s) => Ok(s.stream_position()?),
        }
    }

    /// Seeks to an absolute byte offset.
    ///
    /// For in-memory storage the target must lie within `[0, length]`;
    /// growing happens only through `write`.
    pub fn seek_to(&mut self, pos: u64) -> Result<()> {
        if let Storage::Memory(c) = &self.storage {
            let len = c.get_ref().len() as u64;
            if pos > len {
                return Err(Error::SeekOutOfRange { pos, len });
            }
        }
        self.storage.inner().seek(SeekFrom::Start(pos))?;
        Ok(())
    }

    /// Seeks back to offset 0
    pub fn rewind(&mut self) -> Result<()> {
        self.seek_to(0)
    }

    /// Seeks to the end of the buffer
    pub fn seek_end(&mut self) -> Result<()> {
        self.storage.inner().seek(SeekFrom::End(0))?;
        Ok(())
    }

    /// Saves the current offset onto the position stack
    pub fn push_position(&mut self) -> Result<()> {
        let pos = self.position()?;
        self.pos_stack.push(pos);
        Ok(())
    }

    /// Pops exactly one saved offset and seeks back to it.
    ///
    /// Save/restore pairs must nest; popping with no matching save is a
    /// programmer error and fails with [`Error::StructuralMisuse`].
    pub fn pop_position(&mut self) -> Result<()> {
        let pos = self
            .pos_stack
            .pop()
            .ok_or_else(|| Error::structural_misuse("position stack underflow"))?;
        self.storage.inner().seek(SeekFrom::Start(pos))?;
        Ok(())
    }

    /// Distance from the current position to the end of the buffer.
    /// Leaves the position unchanged.
    pub fn bytes_available(&mut self) -> Result<u64> {
        let here = self.position()?;
        self.push_position()?;
        self.seek_end()?;
        let end = self.position()?;
        self.pop_position()?;
        Ok(end.saturating_sub(here))
    }

    /// Snapshot of the entire underlying buffer, position unchanged
    pub fn dump(&mut self) -> Result<Vec<u8>> {
        match &mut self.storage {
            Storage::Memory(c) => Ok(c.get_ref().clone()),
            Storage::Stream(s) => {
                let here = s.stream_position()?;
                s.seek(SeekFrom::Start(0))?;
                let mut buf = Vec::new();
                let read = s.read_to_end(&mut buf);
                s.seek(SeekFrom::Start(here))?;
                read?;
                Ok(buf)
            }
        }
    }

    fn raw_read(&mut self, n: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; n];
        let mut filled = 0;
        while filled < n {
            let got = self.storage.inner().read(&mut buf[filled..])?;
            if got == 0 {
                break;
            }
            filled += got;
        }
        buf.truncate(filled);
        Ok(buf)
    }

    /// Consumes up to `n` bytes from the current position, advancing by the
    /// bytes actually produced
    pub fn read(&mut self, n: usize) -> Result<Vec<u8>> {
        let ctx = HookCtx {
            position: self.position()?,
        };
        let n = self.hooks.pre_read(&ctx, n);
        let value = self.raw_read(n)?;
        Ok(self.hooks.post_read(&ctx, value))
    }

    /// Consumes exactly `n` bytes, failing with [`Error::ShortRead`] when
    /// fewer are available
    pub fn read_exact(&mut self, n: usize) -> Result<Vec<u8>> {
        let offset = self.position()?;
        let bytes = self.read(n)?;
        if bytes.len() != n {
            return Err(Error::short_read(offset, n, bytes.len()));
        }
        Ok(bytes)
    }

    fn peek_at_position(&mut self, n: usize) -> Result<Vec<u8>> {
        let ctx = HookCtx {
            position: self.position()?,
        };
        let n = self.hooks.pre_peek(&ctx, n);
        let value = self.raw_read(n)?;
        Ok(self.hooks.post_peek(&ctx, value))
    }

    /// Reads up to `n` bytes without moving the cursor (save/restore pair)
    pub fn peek(&mut self, n: usize) -> Result<Vec<u8>> {
        self.push_position()?;
        let result = self.peek_at_position(n);
        let restored = self.pop_position();
        let bytes = result?;
        restored?;
        Ok(bytes)
    }

    /// Reads exactly `n` bytes without moving the cursor, failing with
    /// [`Error::ShortRead`] when fewer are available
    pub fn peek_exact(&mut self, n: usize) -> Result<Vec<u8>> {
        let offset = self.position()?;
        let bytes = self.peek(n)?;
        if bytes.len() != n {
            return Err(Error::short_read(offset, n, bytes.len()));
        }
        Ok(bytes)
    }

    /// Writes bytes at the current position (overwriting, growing at the
    /// end), advancing the cursor. Returns the count written.
    pub fn write(&mut self, bytes: &[u8]) -> Result<usize> {
        let ctx = HookCtx {
            position: self.position()?,
        };
        let bytes = self.hooks.pre_write(&ctx, bytes.to_vec());
        self.storage.inner().write_all(&bytes)?;
        Ok(self.hooks.post_write(&ctx, bytes.len()))
    }

    /// Writes bytes given as a hex string (whitespace ignored)
    pub fn write_hex(&mut self, hex_str: &str) -> Result<usize> {
        let compact: String = hex_str.chars().filter(|c| !c.is_whitespace()).collect();
        let bytes = hex::decode(&compact)
            .map_err(|e| Error::bad_format(hex_str, format!("invalid hex string: {}", e)))?;
        self.write(&bytes)
    }

    /// Canonicalizes `fmt` against the cursor endianness and runs it through
    /// the fmt-read hook pipeline
    fn begin_fmt_read(&mut self, fmt: &str) -> Result<Format> {
        let canonical = Format::parse(fmt)?.canonical(self.endian);
        let ctx = HookCtx {
            position: self.position()?,
        };
        let rewritten = self.hooks.fmt_read(&ctx, canonical);
        Format::parse(&rewritten)
    }

    /// Reads and unpacks one formatted record, returning its fields in order
    pub fn read_fmt(&mut self, fmt: &str) -> Result<Vec<Value>> {
        let format = self.begin_fmt_read(fmt)?;
        let canonical = format.canonical(self.endian);
        let bytes = self.read_exact(format.byte_size())?;
        fmt::unpack(&canonical, self.endian, &bytes)
    }

    /// Reads a formatted record that describes exactly one field
    pub fn read_fmt_single(&mut self, fmt: &str) -> Result<Value> {
        let mut values = self.read_fmt(fmt)?;
        if values.len() != 1 {
            return Err(Error::bad_format(
                fmt,
                format!("expected a single field, format describes {}", values.len()),
            ));
        }
        Ok(values.remove(0))
    }

    /// Reads a formatted record and maps its fields onto `names` in order.
    ///
    /// `names` may be longer than the format; it must not be shorter.
    pub fn read_fmt_into(&mut self, fmt: &str, names: &[&str]) -> Result<Vec<(String, Value)>> {
        let values = self.read_fmt(fmt)?;
        if values.len() > names.len() {
            return Err(Error::bad_format(
                fmt,
                format!(
                    "format describes {} fields but only {} names were supplied",
                    values.len(),
                    names.len()
                ),
            ));
        }
        Ok(names
            .iter()
            .zip(values)
            .map(|(name, value)| (name.to_string(), value))
            .collect())
    }

    /// Unpacks one formatted record without moving the cursor.
    /// Peeks bypass the fmt-read hook pipeline.
    pub fn peek_fmt(&mut self, fmt: &str) -> Result<Vec<Value>> {
        let format = Format::parse(fmt)?;
        let canonical = format.canonical(self.endian);
        let bytes = self.peek_exact(format.byte_size())?;
        fmt::unpack(&canonical, self.endian, &bytes)
    }

    /// Peeks a formatted record that describes exactly one field
    pub fn peek_fmt_single(&mut self, fmt: &str) -> Result<Value> {
        let mut values = self.peek_fmt(fmt)?;
        if values.len() != 1 {
            return Err(Error::bad_format(
                fmt,
                format!("expected a single field, format describes {}", values.len()),
            ));
        }
        Ok(values.remove(0))
    }

    /// Packs `values` according to `fmt` and writes the encoding.
    /// Returns the count written.
    pub fn write_fmt(&mut self, fmt: &str, values: &[Value]) -> Result<usize> {
        let canonical = Format::parse(fmt)?.canonical(self.endian);
        let ctx = HookCtx {
            position: self.position()?,
        };
        let rewritten = self.hooks.fmt_write(&ctx, canonical);
        let bytes = fmt::pack(&rewritten, self.endian, values)?;
        self.write(&bytes)
    }

    /// Reads one byte without moving the cursor
    pub fn peek_u8(&mut self) -> Result<u8> {
        match self.peek_fmt_single("B")? {
            Value::U8(v) => Ok(v),
            other => Err(Error::bad_format("B", format!("unexpected value {:?}", other))),
        }
    }
}

macro_rules! impl_fixed_width {
    ($($read:ident / $write:ident : $code:literal => $variant:ident as $ty:ty),* $(,)?) => {
        impl Wire {
            $(
                #[doc = concat!("Reads one `", stringify!($ty), "` using the cursor endianness")]
                pub fn $read(&mut self) -> Result<$ty> {
                    match self.read_fmt_single($code)? {
                        Value::$variant(v) => Ok(v),
                        other => Err(Error::bad_format(
                            $code,
                            format!("unexpected value {:?}", other),
                        )),
                    }
                }

                #[doc = concat!("Writes one `", stringify!($ty), "` using the cursor endianness")]
                pub fn $write(&mut self, value: $ty) -> Result<usize> {
                    self.write_fmt($code, &[Value::$variant(value)])
                }
            )*
        }
    };
}

impl_fixed_width! {
    read_u8 / write_u8 : "B" => U8 as u8,
    read_i8 / write_i8 : "b" => I8 as i8,
    read_u16 / write_u16 : "H" => U16 as u16,
    read_i16 / write_i16 : "h" => I16 as i16,
    read_u32 / write_u32 : "I" => U32 as u32,
    read_i32 / write_i32 : "i" => I32 as i32,
    read_u64 / write_u64 : "Q" => U64 as u64,
    read_i64 / write_i64 : "q" => I64 as i64,
    read_f32 / write_f32 : "f" => F32 as f32,
    read_f64 / write_f64 : "d" => F64 as f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn test_read_exact_returns_prefix_and_advances() {
        let data = b"hello world".to_vec();
        for n in 0..=data.len() {
            let mut wire = Wire::from_bytes(data.clone());
            assert_eq!(wire.read_exact(n).unwrap(), &data[..n]);
            assert_eq!(wire.position().unwrap(), n as u64);
        }
    }

    #[test]
    fn test_read_exact_short() {
        let mut wire = Wire::from_bytes(b"abc".to_vec());
        let err = wire.read_exact(5).unwrap_err();
        assert!(matches!(
            err,
            Error::ShortRead {
                offset: 0,
                wanted: 5,
                got: 3
            }
        ));
    }

    #[test]
    fn test_read_up_to_is_lenient() {
        let mut wire = Wire::from_bytes(b"ab".to_vec());
        assert_eq!(wire.read(10).unwrap(), b"ab");
        assert_eq!(wire.read(10).unwrap(), b"");
    }

    #[test]
    fn test_peek_is_position_idempotent() {
        let mut wire = Wire::from_bytes(b"abcdef".to_vec());
        wire.read_exact(2).unwrap();
        for _ in 0..3 {
            assert_eq!(wire.peek_exact(3).unwrap(), b"cde");
            assert_eq!(wire.position().unwrap(), 2);
        }
    }

    #[test]
    fn test_peek_exact_short_restores_position() {
        let mut wire = Wire::from_bytes(b"ab".to_vec());
        assert!(wire.peek_exact(5).is_err());
        assert_eq!(wire.position().unwrap(), 0);
    }

    #[test]
    fn test_position_stack_nesting() {
        let mut wire = Wire::from_bytes(b"abcdef".to_vec());
        wire.read_exact(1).unwrap();
        wire.push_position().unwrap();
        wire.read_exact(3).unwrap();
        wire.push_position().unwrap();
        wire.seek_to(0).unwrap();
        wire.pop_position().unwrap();
        assert_eq!(wire.position().unwrap(), 4);
        wire.pop_position().unwrap();
        assert_eq!(wire.position().unwrap(), 1);
    }

    #[test]
    fn test_pop_position_underflow() {
        let mut wire = Wire::new();
        assert!(matches!(
            wire.pop_position().unwrap_err(),
            Error::StructuralMisuse(_)
        ));
    }

    #[test]
    fn test_seek_out_of_range() {
        let mut wire = Wire::from_bytes(b"abcd".to_vec());
        assert!(wire.seek_to(4).is_ok());
        assert!(matches!(
            wire.seek_to(5).unwrap_err(),
            Error::SeekOutOfRange { pos: 5, len: 4 }
        ));
    }

    #[test]
    fn test_bytes_available() {
        let mut wire = Wire::from_bytes(b"abcdef".to_vec());
        wire.read_exact(2).unwrap();
        assert_eq!(wire.bytes_available().unwrap(), 4);
        assert_eq!(wire.position().unwrap(), 2);
    }

    #[test]
    fn test_write_then_read_back() {
        let mut wire = Wire::new();
        wire.set_endian(Endian::Big);
        wire.write(b"test").unwrap();
        wire.write_u16(0x1234).unwrap();
        wire.write_fmt("I", &[Value::U32(0x31337)]).unwrap();

        let dump = wire.dump().unwrap();
        let mut wire = Wire::from_bytes(dump);
        wire.set_endian(Endian::Big);
        assert_eq!(wire.read_exact(4).unwrap(), b"test");
        assert_eq!(wire.read_u16().unwrap(), 0x1234);
        assert_eq!(wire.read_fmt_single("I").unwrap(), Value::U32(0x31337));
    }

    #[test]
    fn test_write_overwrites_in_place() {
        let mut wire = Wire::from_bytes(b"aaaa".to_vec());
        wire.seek_to(1).unwrap();
        wire.write(b"XY").unwrap();
        assert_eq!(wire.dump().unwrap(), b"aXYa");
    }

    #[test]
    fn test_write_hex_ignores_whitespace() {
        let mut wire = Wire::new();
        wire.write_hex("12 34  ab").unwrap();
        assert_eq!(wire.dump().unwrap(), vec![0x12, 0x34, 0xAB]);
        assert!(wire.write_hex("zz").is_err());
    }

    #[test]
    fn test_scenario_test_bytes() {
        // 74 65 73 74 12 34 37 13 03 00
        let mut wire = Wire::from_bytes(b"test\x12\x34\x37\x13\x03\x00".to_vec());
        wire.set_endian(Endian::Big);
        assert_eq!(wire.read_exact(4).unwrap(), b"test");
        assert_eq!(wire.read_u16().unwrap(), 0x1234);
        // the trailing dword is little-endian on the wire
        assert_eq!(wire.read_fmt_single("<I").unwrap(), Value::U32(0x0003_1337));
        assert_eq!(wire.bytes_available().unwrap(), 0);
    }

    #[test]
    fn test_endian_affects_only_unmarked_formats() {
        let mut wire = Wire::from_bytes(vec![0x12, 0x34, 0x12, 0x34]);
        wire.set_endian(Endian::Little);
        assert_eq!(wire.read_u16().unwrap(), 0x3412);
        assert_eq!(wire.read_fmt_single(">H").unwrap(), Value::U16(0x1234));
    }

    #[test]
    fn test_read_fmt_into() {
        let mut wire = Wire::from_bytes(vec![0x01, 0x00, 0x02]);
        wire.set_endian(Endian::Big);
        let fields = wire.read_fmt_into("BH", &["tag", "len"]).unwrap();
        assert_eq!(
            fields,
            vec![
                ("tag".to_string(), Value::U8(1)),
                ("len".to_string(), Value::U16(2)),
            ]
        );

        let mut wire = Wire::from_bytes(vec![0x01, 0x02]);
        assert!(wire.read_fmt_into("BB", &["only_one"]).is_err());
    }

    #[test]
    fn test_pre_read_hook_rewrites_count() {
        let mut wire = Wire::from_bytes(b"abcdef".to_vec());
        wire.install_hook(Hook::PreRead(Box::new(|_, n| n * 2)));
        assert_eq!(wire.read(2).unwrap(), b"abcd");
    }

    #[test]
    fn test_post_read_hook_sees_bytes() {
        let seen = Rc::new(Cell::new(0usize));
        let seen2 = Rc::clone(&seen);
        let mut wire = Wire::from_bytes(b"abcd".to_vec());
        wire.install_hook(Hook::PostRead(Box::new(move |ctx, b| {
            assert_eq!(ctx.position, 0);
            seen2.set(b.len());
            b
        })));
        wire.read_exact(3).unwrap();
        assert_eq!(seen.get(), 3);
    }

    #[test]
    fn test_peek_does_not_trigger_read_hooks() {
        let calls = Rc::new(Cell::new(0u32));
        let calls2 = Rc::clone(&calls);
        let mut wire = Wire::from_bytes(b"abcd".to_vec());
        wire.install_hook(Hook::PreRead(Box::new(move |_, n| {
            calls2.set(calls2.get() + 1);
            n
        })));
        wire.peek_exact(2).unwrap();
        assert_eq!(calls.get(), 0);
        wire.read_exact(2).unwrap();
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_fmt_hook_sees_canonical_format() {
        let seen = Rc::new(std::cell::RefCell::new(String::new()));
        let seen2 = Rc::clone(&seen);
        let mut wire = Wire::from_bytes(vec![0x12, 0x34]);
        wire.set_endian(Endian::Big);
        wire.install_hook(Hook::FmtRead(Box::new(move |_, f| {
            *seen2.borrow_mut() = f.clone();
            f
        })));
        wire.read_u16().unwrap();
        assert_eq!(seen.borrow().as_str(), ">H");
    }

    #[test]
    fn test_stream_backed_wire() {
        let backing = Cursor::new(b"stream data".to_vec());
        let mut wire = Wire::from_stream(Box::new(backing));
        assert_eq!(wire.read_exact(6).unwrap(), b"stream");
        assert_eq!(wire.bytes_available().unwrap(), 5);
        assert_eq!(wire.dump().unwrap(), b"stream data");
        assert_eq!(wire.position().unwrap(), 6);
    }
}
