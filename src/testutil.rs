//! Test-only wire stream builder.
//!
//! Baut Byte-Streams im Serialisierungsformat von Hand zusammen, damit
//! Decoder-Tests ohne Writer auskommen. Bewusst minimal: wer Handles
//! oder Annotationen braucht, schreibt sie explizit.

use crate::constants::{
    BASE_WIRE_HANDLE, STREAM_MAGIC, STREAM_VERSION, TC_BLOCKDATA, TC_BLOCKDATALONG, TC_CLASSDESC,
    TC_ENDBLOCKDATA, TC_NULL, TC_REFERENCE, TC_STRING,
};
use crate::mutf8;

/// Ein Feld fuer [`StreamBuilder::desc_plain`].
pub(crate) enum TestField {
    /// Primitive: Typcode + Name.
    Prim(u8, &'static str),
    /// Referenz: Typcode (`L`/`[`) + Name + Signatur als String-Record.
    Ref(u8, &'static str, &'static str),
}

pub(crate) struct StreamBuilder {
    buf: Vec<u8>,
}

impl StreamBuilder {
    /// Beginnt einen Stream mit gueltigem Header.
    pub(crate) fn new() -> Self {
        let mut buf = Vec::new();
        buf.extend_from_slice(&STREAM_MAGIC.to_be_bytes());
        buf.extend_from_slice(&STREAM_VERSION.to_be_bytes());
        Self { buf }
    }

    /// Beginnt ohne Header (fuer Header-Fehlertests).
    pub(crate) fn bare() -> Self {
        Self { buf: Vec::new() }
    }

    pub(crate) fn raw(mut self, bytes: &[u8]) -> Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    pub(crate) fn u8(mut self, v: u8) -> Self {
        self.buf.push(v);
        self
    }

    pub(crate) fn i32(mut self, v: i32) -> Self {
        self.buf.extend_from_slice(&v.to_be_bytes());
        self
    }

    pub(crate) fn i64(mut self, v: i64) -> Self {
        self.buf.extend_from_slice(&v.to_be_bytes());
        self
    }

    /// Laengenpraefixierter modified-UTF-8 String (Kurzform).
    pub(crate) fn utf(mut self, s: &str) -> Self {
        let body = mutf8::encode(s);
        self.buf
            .extend_from_slice(&u16::try_from(body.len()).unwrap().to_be_bytes());
        self.buf.extend_from_slice(&body);
        self
    }

    pub(crate) fn null(self) -> Self {
        self.u8(TC_NULL)
    }

    /// String-Record (vergibt beim Decoden ein Handle).
    pub(crate) fn string(self, s: &str) -> Self {
        self.u8(TC_STRING).utf(s)
    }

    /// Rueckwaerts-Referenz auf ein Handle.
    pub(crate) fn reference(mut self, handle: usize) -> Self {
        self.buf.push(TC_REFERENCE);
        let wire = BASE_WIRE_HANDLE + u32::try_from(handle).unwrap();
        self.buf.extend_from_slice(&wire.to_be_bytes());
        self
    }

    /// Kurzer Block-Chunk.
    pub(crate) fn block(mut self, payload: &[u8]) -> Self {
        self.buf.push(TC_BLOCKDATA);
        self.buf.push(u8::try_from(payload.len()).unwrap());
        self.buf.extend_from_slice(payload);
        self
    }

    /// Langer Block-Chunk.
    pub(crate) fn block_long(mut self, payload: &[u8]) -> Self {
        self.buf.push(TC_BLOCKDATALONG);
        self.buf
            .extend_from_slice(&u32::try_from(payload.len()).unwrap().to_be_bytes());
        self.buf.extend_from_slice(payload);
        self
    }

    pub(crate) fn end_block(self) -> Self {
        self.u8(TC_ENDBLOCKDATA)
    }

    /// Plain Descriptor bis einschliesslich leerer Annotation; die
    /// Superklassen-Position muss der Aufrufer anschliessen (z.B.
    /// [`null`](Self::null)).
    pub(crate) fn desc_plain(
        mut self,
        name: &str,
        suid: i64,
        flags: u8,
        fields: &[TestField],
    ) -> Self {
        self = self.u8(TC_CLASSDESC).utf(name).i64(suid).u8(flags);
        self.buf
            .extend_from_slice(&u16::try_from(fields.len()).unwrap().to_be_bytes());
        for field in fields {
            self = match field {
                TestField::Prim(code, fname) => self.u8(*code).utf(fname),
                TestField::Ref(code, fname, sig) => self.u8(*code).utf(fname).string(sig),
            };
        }
        // Leere Klassen-Annotation
        self.end_block()
    }

    pub(crate) fn build(self) -> Vec<u8> {
        self.buf
    }
}
