//! Protokoll-Konstanten des Java-Object-Serialization-Wire-Formats.
//!
//! Tag-Bytes, Flag-Bits, Stream-Magic/Version, Handle-Basis und die
//! maximale Chunk-Groesse. Werte stammen aus `java.io.ObjectStreamConstants`
//! (Java Object Serialization Specification §6.4).

/// Stream-Magic (`STREAM_MAGIC`), die ersten zwei Header-Bytes.
pub const STREAM_MAGIC: u16 = 0xACED;
/// Protokoll-Version (`STREAM_VERSION`), die naechsten zwei Header-Bytes.
pub const STREAM_VERSION: u16 = 5;

/// Kleinster gueltiger Record-Tag-Wert (inklusive).
pub const TC_BASE: u8 = 0x70;

pub const TC_NULL: u8 = 0x70;
pub const TC_REFERENCE: u8 = 0x71;
pub const TC_CLASSDESC: u8 = 0x72;
pub const TC_OBJECT: u8 = 0x73;
pub const TC_STRING: u8 = 0x74;
pub const TC_ARRAY: u8 = 0x75;
pub const TC_CLASS: u8 = 0x76;
pub const TC_BLOCKDATA: u8 = 0x77;
pub const TC_ENDBLOCKDATA: u8 = 0x78;
pub const TC_RESET: u8 = 0x79;
pub const TC_BLOCKDATALONG: u8 = 0x7A;
pub const TC_EXCEPTION: u8 = 0x7B;
pub const TC_LONGSTRING: u8 = 0x7C;
pub const TC_PROXYCLASSDESC: u8 = 0x7D;
pub const TC_ENUM: u8 = 0x7E;

/// Groesster gueltiger Record-Tag-Wert (inklusive).
pub const TC_MAX: u8 = 0x7E;

/// Erster Wire-Handle; Tabellenindizes werden als `BASE_WIRE_HANDLE + index`
/// kodiert, um sie von den kleinen Sentinel-Tags zu unterscheiden.
pub const BASE_WIRE_HANDLE: u32 = 0x7E0000;

// Klassen-Deskriptor-Flags (`SC_*`).
pub const SC_WRITE_METHOD: u8 = 0x01;
pub const SC_BLOCK_DATA: u8 = 0x08;
pub const SC_SERIALIZABLE: u8 = 0x02;
pub const SC_EXTERNALIZABLE: u8 = 0x04;
pub const SC_ENUM: u8 = 0x10;

/// Maximale Nutzlast eines Block-Data-Chunks (Java `MAX_BLOCK_SIZE`).
pub const MAX_BLOCK_SIZE: usize = 1024;
