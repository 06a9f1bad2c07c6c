#![allow(dead_code)] // each integration test binary uses a different subset

//! Hand-authored protocol byte streams for integration tests.
//!
//! The scanner's whole point is that the platform serializer is never
//! needed, so fixtures are assembled directly from the wire grammar: a
//! builder appends records byte-for-byte and the tests track the handle
//! numbers the scanner will assign.

use serialscan::wire::{self, flag, tag};

/// Base wire handle, re-exported for readable handle math in tests.
pub const BASE: u32 = wire::BASE_WIRE_HANDLE;

/// Encode a string as Java modified UTF-8.
pub fn modified_utf8(s: &str) -> Vec<u8> {
    let mut out = Vec::new();
    for unit in s.encode_utf16() {
        match unit {
            0x0000 => out.extend_from_slice(&[0xC0, 0x80]),
            0x0001..=0x007F => out.push(unit as u8),
            0x0080..=0x07FF => {
                out.push(0xC0 | (unit >> 6) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
            _ => {
                out.push(0xE0 | (unit >> 12) as u8);
                out.push(0x80 | ((unit >> 6) & 0x3F) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
        }
    }
    out
}

/// One declared field in a fixture class descriptor.
pub enum FieldSpec<'a> {
    /// `(wire type code, field name)`
    Prim(u8, &'a str),
    /// `(field name, declared class name)` — the class name is written as a
    /// fresh string record and therefore consumes a handle.
    Ref(&'a str, &'a str),
}

/// Appends protocol records to a buffer, starting from the stream header.
pub struct StreamBuilder {
    buf: Vec<u8>,
}

impl Default for StreamBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamBuilder {
    pub fn new() -> Self {
        let mut buf = Vec::new();
        buf.extend_from_slice(&wire::STREAM_MAGIC.to_be_bytes());
        buf.extend_from_slice(&wire::STREAM_VERSION.to_be_bytes());
        Self { buf }
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }

    pub fn raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    pub fn u8(&mut self, v: u8) -> &mut Self {
        self.buf.push(v);
        self
    }

    pub fn u16(&mut self, v: u16) -> &mut Self {
        self.raw(&v.to_be_bytes())
    }

    pub fn i32(&mut self, v: i32) -> &mut Self {
        self.raw(&v.to_be_bytes())
    }

    pub fn i64(&mut self, v: i64) -> &mut Self {
        self.raw(&v.to_be_bytes())
    }

    pub fn f32(&mut self, v: f32) -> &mut Self {
        self.raw(&v.to_be_bytes())
    }

    pub fn f64(&mut self, v: f64) -> &mut Self {
        self.raw(&v.to_be_bytes())
    }

    /// Length-prefixed modified UTF-8, as used inside descriptors.
    pub fn utf(&mut self, s: &str) -> &mut Self {
        let encoded = modified_utf8(s);
        self.u16(encoded.len() as u16);
        self.raw(&encoded)
    }

    /// A short string record. Consumes one handle.
    pub fn string(&mut self, s: &str) -> &mut Self {
        self.u8(tag::STRING);
        self.utf(s)
    }

    /// A long string record (8-byte length). Consumes one handle.
    pub fn long_string(&mut self, s: &str) -> &mut Self {
        let encoded = modified_utf8(s);
        self.u8(tag::LONG_STRING);
        self.i64(encoded.len() as i64);
        self.raw(&encoded)
    }

    pub fn null(&mut self) -> &mut Self {
        self.u8(tag::NULL)
    }

    pub fn reset(&mut self) -> &mut Self {
        self.u8(tag::RESET)
    }

    pub fn reference(&mut self, handle: u32) -> &mut Self {
        self.u8(tag::REFERENCE);
        self.i32(handle as i32)
    }

    pub fn block_short(&mut self, data: &[u8]) -> &mut Self {
        self.u8(tag::BLOCK_DATA);
        self.u8(data.len() as u8);
        self.raw(data)
    }

    pub fn block_long(&mut self, data: &[u8]) -> &mut Self {
        self.u8(tag::BLOCK_DATA_LONG);
        self.i32(data.len() as i32);
        self.raw(data)
    }

    /// A full plain class descriptor up to and including its field list and
    /// (empty) class annotation. Consumes one handle for the descriptor
    /// itself plus one per `FieldSpec::Ref` class-name string. The caller
    /// writes the superclass position next (`null()`, `reference(..)`, or
    /// another `class_desc(..)`).
    pub fn class_desc(&mut self, name: &str, suid: i64, flags: u8, fields: &[FieldSpec<'_>]) -> &mut Self {
        self.u8(tag::CLASS_DESC);
        self.utf(name);
        self.i64(suid);
        self.u8(flags);
        self.u16(fields.len() as u16);
        for field in fields {
            match field {
                FieldSpec::Prim(code, field_name) => {
                    self.u8(*code);
                    self.utf(field_name);
                }
                FieldSpec::Ref(field_name, class_name) => {
                    self.u8(if class_name.starts_with('[') { b'[' } else { b'L' });
                    self.utf(field_name);
                    self.string(class_name);
                }
            }
        }
        self.u8(tag::END_BLOCK_DATA)
    }

    /// Object record header: tag plus a fresh class descriptor with no
    /// superclass. Field values follow in declaration order.
    pub fn object(&mut self, name: &str, flags: u8, fields: &[FieldSpec<'_>]) -> &mut Self {
        self.u8(tag::OBJECT);
        self.class_desc(name, 1, flags, fields);
        self.null()
    }

    /// Array record header for a fresh array class with no superclass;
    /// element values follow.
    pub fn array_header(&mut self, name: &str, len: i32) -> &mut Self {
        self.u8(tag::ARRAY);
        self.class_desc(name, 1, flag::SERIALIZABLE, &[]);
        self.null();
        self.i32(len)
    }

    /// Enum constant record: a fresh enum class descriptor (with the
    /// platform enum superclass), then the constant name as a fresh string.
    pub fn enum_constant(&mut self, class_name: &str, constant: &str) -> &mut Self {
        let enum_flags = flag::SERIALIZABLE | flag::ENUM;
        self.u8(tag::ENUM);
        self.class_desc(class_name, 0, enum_flags, &[]);
        self.class_desc("java.lang.Enum", 0, enum_flags, &[]);
        self.null();
        self.string(constant)
    }
}
