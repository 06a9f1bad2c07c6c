//! Wire-format constants for the Java object serialization protocol.
//!
//! Every serial stream starts with [`STREAM_MAGIC`] and [`STREAM_VERSION`],
//! followed by a sequence of records that each begin with one of the
//! [`tag`] bytes. Back-reference handles count up from
//! [`BASE_WIRE_HANDLE`], one per registered entity or class descriptor.
//!
//! These constants are public so that tooling (and test fixtures) can
//! assemble or recognize protocol bytes without duplicating them.

/// First two bytes of every serial stream.
pub const STREAM_MAGIC: u16 = 0xAC_ED;

/// Protocol version written after the magic.
pub const STREAM_VERSION: u16 = 5;

/// Wire handles are numbered from this base, one per registered item.
pub const BASE_WIRE_HANDLE: u32 = 0x7E_0000;

/// Record tag bytes.
pub mod tag {
    /// Absent reference.
    pub const NULL: u8 = 0x70;
    /// Back-reference to a previously registered item (4-byte handle).
    pub const REFERENCE: u8 = 0x71;
    /// Plain class descriptor.
    pub const CLASS_DESC: u8 = 0x72;
    /// General object record.
    pub const OBJECT: u8 = 0x73;
    /// Short string (2-byte length).
    pub const STRING: u8 = 0x74;
    /// Array record.
    pub const ARRAY: u8 = 0x75;
    /// Class descriptor used as a value (class literal).
    pub const CLASS: u8 = 0x76;
    /// Short raw data block (1-byte length).
    pub const BLOCK_DATA: u8 = 0x77;
    /// Sentinel ending an annotation block.
    pub const END_BLOCK_DATA: u8 = 0x78;
    /// Clears the handle table.
    pub const RESET: u8 = 0x79;
    /// Long raw data block (4-byte length).
    pub const BLOCK_DATA_LONG: u8 = 0x7A;
    /// Marker for a write aborted by the serializing side.
    pub const EXCEPTION: u8 = 0x7B;
    /// Long string (8-byte length).
    pub const LONG_STRING: u8 = 0x7C;
    /// Dynamic-proxy class descriptor.
    pub const PROXY_CLASS_DESC: u8 = 0x7D;
    /// Enumeration constant.
    pub const ENUM: u8 = 0x7E;
}

/// Per-class flag bits carried by class descriptors.
pub mod flag {
    /// The class defines a custom write method; an annotation block follows
    /// its declared fields.
    pub const WRITE_METHOD: u8 = 0x01;
    /// Declared fields are written in order.
    pub const SERIALIZABLE: u8 = 0x02;
    /// Object content is entirely class-defined.
    pub const EXTERNALIZABLE: u8 = 0x04;
    /// Externalizable content uses block-data framing.
    pub const BLOCK_DATA: u8 = 0x08;
    /// The class is an enumeration type.
    pub const ENUM: u8 = 0x10;
}
