//! Wire-Stream-Baukasten fuer Integrationstests.

use jodec::constants::{
    BASE_WIRE_HANDLE, STREAM_MAGIC, STREAM_VERSION, TC_BLOCKDATA, TC_CLASSDESC, TC_ENDBLOCKDATA,
    TC_NULL, TC_REFERENCE, TC_STRING,
};
use jodec::mutf8;

/// Ein Feld fuer [`Wire::desc_plain`].
pub enum WireField {
    /// Primitive: Typcode + Name.
    Prim(u8, &'static str),
    /// Referenz: Typcode (`L`/`[`) + Name + Signatur als String-Record.
    Ref(u8, &'static str, &'static str),
}

pub struct Wire {
    buf: Vec<u8>,
}

impl Wire {
    /// Beginnt einen Stream mit gueltigem Header.
    pub fn new() -> Self {
        let mut buf = Vec::new();
        buf.extend_from_slice(&STREAM_MAGIC.to_be_bytes());
        buf.extend_from_slice(&STREAM_VERSION.to_be_bytes());
        Self { buf }
    }

    pub fn u8(mut self, v: u8) -> Self {
        self.buf.push(v);
        self
    }

    pub fn i32(mut self, v: i32) -> Self {
        self.buf.extend_from_slice(&v.to_be_bytes());
        self
    }

    pub fn i64(mut self, v: i64) -> Self {
        self.buf.extend_from_slice(&v.to_be_bytes());
        self
    }

    pub fn utf(mut self, s: &str) -> Self {
        let body = mutf8::encode(s);
        self.buf
            .extend_from_slice(&u16::try_from(body.len()).unwrap().to_be_bytes());
        self.buf.extend_from_slice(&body);
        self
    }

    pub fn null(self) -> Self {
        self.u8(TC_NULL)
    }

    pub fn string(self, s: &str) -> Self {
        self.u8(TC_STRING).utf(s)
    }

    pub fn reference(mut self, handle: usize) -> Self {
        self.buf.push(TC_REFERENCE);
        let wire = BASE_WIRE_HANDLE + u32::try_from(handle).unwrap();
        self.buf.extend_from_slice(&wire.to_be_bytes());
        self
    }

    pub fn block(mut self, payload: &[u8]) -> Self {
        self.buf.push(TC_BLOCKDATA);
        self.buf.push(u8::try_from(payload.len()).unwrap());
        self.buf.extend_from_slice(payload);
        self
    }

    pub fn end_block(self) -> Self {
        self.u8(TC_ENDBLOCKDATA)
    }

    /// Plain Descriptor inklusive leerer Annotation; die Super-Position
    /// schliesst der Aufrufer an.
    pub fn desc_plain(mut self, name: &str, suid: i64, flags: u8, fields: &[WireField]) -> Self {
        self = self.u8(TC_CLASSDESC).utf(name).i64(suid).u8(flags);
        self.buf
            .extend_from_slice(&u16::try_from(fields.len()).unwrap().to_be_bytes());
        for field in fields {
            self = match field {
                WireField::Prim(code, fname) => self.u8(*code).utf(fname),
                WireField::Ref(code, fname, sig) => self.u8(*code).utf(fname).string(sig),
            };
        }
        self.end_block()
    }

    pub fn build(self) -> Vec<u8> {
        self.buf
    }
}
