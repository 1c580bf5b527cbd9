//! Byte-stream framing: raw tag reads and block data reassembly
//! (Protocol 6.2, 6.4.1).
//!
//! [`BlockInput`] stellt zwei Sichten auf dieselbe Byte-Quelle bereit:
//!
//! - **Tag-Modus** (Default): Bytes werden unveraendert geliefert, mit
//!   Ein-Byte-Lookahead fuer das Record-Dispatching.
//! - **Block-Modus**: Die Quelle besteht aus laengenpraefixierten Chunks
//!   (`0x77` + u8-Laenge oder `0x7A` + u32-Laenge), die transparent zu
//!   einer flachen Bytefolge zusammengesetzt werden. Ein gueltiges
//!   Nicht-Chunk-Tag beim Nachladen beendet die Chunk-Folge als
//!   End-of-Data-Signal, kein Fehler.
//!
//! Der Moduswechsel ist explizit und idempotent. Wer den Block-Modus mit
//! ungelesenen gepufferten Bytes verlaesst, hat einen Programmierfehler
//! begangen; das schlaegt sofort fehl (Panic), nicht erst beim naechsten
//! Read.

use std::io::Read;

use crate::constants::{
    MAX_BLOCK_SIZE, TC_BASE, TC_BLOCKDATA, TC_BLOCKDATALONG, TC_MAX, TC_RESET,
};
use crate::mutf8;
use crate::{Error, Result};

/// One-byte pushback over an opaque sequential byte source.
pub struct PeekReader<R> {
    inp: R,
    peekb: Option<u8>,
}

impl<R: Read> PeekReader<R> {
    /// Erstellt einen neuen `PeekReader`.
    pub fn new(inp: R) -> Self {
        Self { inp, peekb: None }
    }

    /// Liest genau ein Byte aus der Quelle (ohne Pushback-Puffer).
    fn fetch(&mut self) -> Result<Option<u8>> {
        let mut b = [0u8; 1];
        loop {
            match self.inp.read(&mut b) {
                Ok(0) => return Ok(None),
                Ok(_) => return Ok(Some(b[0])),
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Returns the next byte without consuming it, `None` at EOF.
    pub fn peek(&mut self) -> Result<Option<u8>> {
        if self.peekb.is_none() {
            self.peekb = self.fetch()?;
        }
        Ok(self.peekb)
    }

    /// Returns and consumes the next byte, `None` at EOF.
    pub fn read(&mut self) -> Result<Option<u8>> {
        match self.peekb.take() {
            Some(b) => Ok(Some(b)),
            None => self.fetch(),
        }
    }

    /// Reads up to `b.len()` bytes; `0` signals EOF.
    pub fn read_into(&mut self, b: &mut [u8]) -> Result<usize> {
        if b.is_empty() {
            return Ok(0);
        }
        let mut off = 0;
        if let Some(p) = self.peekb.take() {
            b[0] = p;
            off = 1;
        }
        loop {
            match self.inp.read(&mut b[off..]) {
                Ok(n) => return Ok(off + n),
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Reads exactly `b.len()` bytes or fails with `PrematureEndOfStream`.
    pub fn read_exact(&mut self, b: &mut [u8]) -> Result<()> {
        let mut off = 0;
        while off < b.len() {
            let n = self.read_into(&mut b[off..])?;
            if n == 0 {
                return Err(Error::PrematureEndOfStream);
            }
            off += n;
        }
        Ok(())
    }
}

/// Dual-mode framer over a byte source (Protocol 6.4.1 block data).
///
/// Eine Instanz gehoert zu genau einer Decode-Quelle und ist nicht
/// thread-sicher; Modusflag und Chunk-Puffer sind unsynchronisierter
/// Zustand.
pub struct BlockInput<R> {
    inp: PeekReader<R>,
    /// Block-Modus aktiv?
    blkmode: bool,
    /// Puffer fuer den aktuellen Chunk-Ausschnitt.
    buf: Box<[u8; MAX_BLOCK_SIZE]>,
    /// Leseposition in `buf`.
    pos: usize,
    /// Ende der gueltigen Bytes in `buf`; `None` = End-of-Data erreicht.
    end: Option<usize>,
    /// Bytes des aktuellen Chunks, die noch nicht in `buf` geladen wurden.
    unread: usize,
    /// Latch: Custom-Daten des aktuellen Objekts sind aufgebraucht.
    default_data_end: bool,
}

impl<R: Read> BlockInput<R> {
    /// Erstellt einen Framer im Tag-Modus.
    pub fn new(inp: R) -> Self {
        Self {
            inp: PeekReader::new(inp),
            blkmode: false,
            buf: Box::new([0u8; MAX_BLOCK_SIZE]),
            pos: 0,
            end: Some(0),
            unread: 0,
            default_data_end: false,
        }
    }

    /// Switches the framing mode, returning the prior mode.
    ///
    /// Der Wechsel in den bereits aktiven Modus ist ein No-op. Beim
    /// Eintritt wird der Chunk-Puffer zurueckgesetzt.
    ///
    /// # Panics
    ///
    /// Beim Verlassen des Block-Modus mit ungelesenen gepufferten Bytes —
    /// das ist ein Protokollfehler des Aufrufers, kein Datenfehler.
    pub fn set_block_mode(&mut self, newmode: bool) -> bool {
        if self.blkmode == newmode {
            return self.blkmode;
        }
        if newmode {
            self.pos = 0;
            self.end = Some(0);
            self.unread = 0;
        } else if let Some(end) = self.end
            && self.pos < end
        {
            panic!("unread block data");
        }
        self.blkmode = newmode;
        !newmode
    }

    /// Aktueller Framing-Modus.
    pub fn block_mode(&self) -> bool {
        self.blkmode
    }

    /// Stellt einen Modus auf dem Fehlerpfad wieder her. Ist der Modus
    /// bereits aktiv, bleibt der Zustand (inklusive gepufferter
    /// Chunk-Bytes) unangetastet; bei einem echten Wechsel wird der
    /// Puffer verworfen statt die Unread-Invariante zu pruefen — die
    /// Session ist an diesem Punkt bereits am Scheitern, der Framer muss
    /// nur in einem definierten Zustand zurueckbleiben.
    pub(crate) fn force_block_mode(&mut self, mode: bool) {
        if self.blkmode == mode {
            return;
        }
        self.pos = 0;
        self.end = Some(0);
        self.unread = 0;
        self.blkmode = mode;
    }

    pub(crate) fn set_default_data_end(&mut self, v: bool) {
        self.default_data_end = v;
    }

    pub(crate) fn default_data_end(&self) -> bool {
        self.default_data_end
    }

    /// Liest den naechsten Chunk-Header.
    ///
    /// `Ok(Some(len))` fuer einen Chunk, `Ok(None)` als End-of-Data-Signal
    /// (gueltiges Nicht-Chunk-Tag oder EOF an der Chunk-Grenze).
    fn read_block_header(&mut self) -> Result<Option<usize>> {
        if self.default_data_end {
            return Ok(None);
        }
        let Some(tc) = self.inp.peek()? else {
            // EOF genau an der Chunk-Grenze: reguläres Ende der Folge
            return Ok(None);
        };
        match tc {
            TC_BLOCKDATA => {
                self.inp.read()?;
                let len = self.inp.read()?.ok_or(Error::TruncatedBlockHeader)?;
                Ok(Some(usize::from(len)))
            }
            TC_BLOCKDATALONG => {
                self.inp.read()?;
                let mut lb = [0u8; 4];
                self.inp.read_exact(&mut lb).map_err(|e| match e {
                    Error::PrematureEndOfStream => Error::TruncatedBlockHeader,
                    other => other,
                })?;
                let len = i32::from_be_bytes(lb);
                if len < 0 {
                    return Err(Error::IllegalBlockLength(len));
                }
                Ok(Some(len as usize))
            }
            TC_RESET => Err(Error::UnexpectedReset),
            t if (TC_BASE..=TC_MAX).contains(&t) => Ok(None),
            t => Err(Error::InvalidTypeCode(t)),
        }
    }

    /// Laedt den Puffer nach: restliche Chunk-Bytes oder naechster Header.
    /// Nach einem Fehler ist der Block-Zustand geleert.
    fn refill(&mut self) -> Result<()> {
        let r = self.refill_inner();
        if r.is_err() {
            self.pos = 0;
            self.end = None;
            self.unread = 0;
        }
        r
    }

    fn refill_inner(&mut self) -> Result<()> {
        loop {
            self.pos = 0;
            if self.unread > 0 {
                let want = self.unread.min(MAX_BLOCK_SIZE);
                let n = self.inp.read_into(&mut self.buf[..want])?;
                if n == 0 {
                    // EOF mitten im angekuendigten Chunk
                    return Err(Error::TruncatedBlockData);
                }
                self.end = Some(n);
                self.unread -= n;
            } else {
                match self.read_block_header()? {
                    Some(len) => {
                        self.end = Some(0);
                        self.unread = len;
                    }
                    None => {
                        self.end = None;
                        self.unread = 0;
                        return Ok(());
                    }
                }
            }
            // Chunks der Laenge 0 ueberspringen
            if self.end != Some(self.pos) {
                return Ok(());
            }
        }
    }

    /// Returns the next byte without consuming it; `None` signals EOF in
    /// tag mode or end-of-data in block mode.
    pub fn peek(&mut self) -> Result<Option<u8>> {
        if !self.blkmode {
            return self.inp.peek();
        }
        if Some(self.pos) == self.end {
            self.refill()?;
        }
        match self.end {
            Some(_) => Ok(Some(self.buf[self.pos])),
            None => Ok(None),
        }
    }

    /// Wie [`peek`](Self::peek), aber EOF/End-of-Data ist ein Fehler.
    pub fn peek_u8(&mut self) -> Result<u8> {
        self.peek()?.ok_or(Error::PrematureEndOfStream)
    }

    /// Returns and consumes the next byte; `None` at EOF/end-of-data.
    pub fn read(&mut self) -> Result<Option<u8>> {
        if !self.blkmode {
            return self.inp.read();
        }
        if Some(self.pos) == self.end {
            self.refill()?;
        }
        match self.end {
            Some(_) => {
                let b = self.buf[self.pos];
                self.pos += 1;
                Ok(Some(b))
            }
            None => Ok(None),
        }
    }

    /// Reads up to `b.len()` bytes; `0` signals EOF/end-of-data.
    pub fn read_into(&mut self, b: &mut [u8]) -> Result<usize> {
        if b.is_empty() {
            return Ok(0);
        }
        if !self.blkmode {
            return self.inp.read_into(b);
        }
        if Some(self.pos) == self.end {
            self.refill()?;
        }
        let Some(end) = self.end else {
            return Ok(0);
        };
        let n = b.len().min(end - self.pos);
        b[..n].copy_from_slice(&self.buf[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }

    /// Reads exactly `b.len()` bytes or fails with `PrematureEndOfStream`.
    pub fn read_exact(&mut self, b: &mut [u8]) -> Result<()> {
        let mut off = 0;
        while off < b.len() {
            let n = self.read_into(&mut b[off..])?;
            if n == 0 {
                return Err(Error::PrematureEndOfStream);
            }
            off += n;
        }
        Ok(())
    }

    /// Skips up to `len` bytes, returning the number actually skipped.
    pub fn skip(&mut self, len: u64) -> Result<u64> {
        let mut remain = len;
        let mut scratch = [0u8; 256];
        while remain > 0 {
            let want = remain.min(scratch.len() as u64) as usize;
            let n = self.read_into(&mut scratch[..want])?;
            if n == 0 {
                break;
            }
            remain -= n as u64;
        }
        Ok(len - remain)
    }

    /// Verwirft alle restlichen Chunks der aktuellen Folge bis zum
    /// End-of-Data-Signal.
    ///
    /// # Panics
    ///
    /// Ausserhalb des Block-Modus (Programmierfehler).
    pub fn skip_block_data(&mut self) -> Result<()> {
        assert!(self.blkmode, "not in block data mode");
        while self.end.is_some() {
            self.refill()?;
        }
        Ok(())
    }

    /// Noch verfuegbare Bytes der aktuellen Chunk-Folge (gepuffert plus
    /// angekuendigt), `0` nach dem End-of-Data-Signal.
    ///
    /// # Panics
    ///
    /// Ausserhalb des Block-Modus (Programmierfehler).
    pub fn current_block_remaining(&self) -> usize {
        assert!(self.blkmode, "not in block data mode");
        match self.end {
            Some(end) => end - self.pos + self.unread,
            None => 0,
        }
    }

    // === Primitive reads (big-endian, Protocol 6.2) ===

    /// Liest ein Byte; EOF/End-of-Data ist ein Fehler.
    pub fn read_u8(&mut self) -> Result<u8> {
        self.read()?.ok_or(Error::PrematureEndOfStream)
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(self.read_u8()? as i8)
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        let mut b = [0u8; 2];
        self.read_exact(&mut b)?;
        Ok(u16::from_be_bytes(b))
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        Ok(self.read_u16()? as i16)
    }

    /// Ein UTF-16-Code-Unit (`char` des Originals).
    pub fn read_char_code(&mut self) -> Result<u16> {
        self.read_u16()
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        let mut b = [0u8; 4];
        self.read_exact(&mut b)?;
        Ok(i32::from_be_bytes(b))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(self.read_i32()? as u32)
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        let mut b = [0u8; 8];
        self.read_exact(&mut b)?;
        Ok(i64::from_be_bytes(b))
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(f32::from_bits(self.read_i32()? as u32))
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        Ok(f64::from_bits(self.read_i64()? as u64))
    }

    // === Strings (Protocol 6.2 readUTF / 6.4.1 newString) ===

    /// Short form: u16 byte length + modified-UTF-8 body.
    pub fn read_utf(&mut self, max: Option<u64>) -> Result<String> {
        let len = u64::from(self.read_u16()?);
        self.read_utf_body(len, max)
    }

    /// Long form: i64 byte length + modified-UTF-8 body.
    ///
    /// Negative Laengen liest das Original als leeren Body; das wird
    /// uebernommen.
    pub fn read_long_utf(&mut self, max: Option<u64>) -> Result<String> {
        let len = self.read_i64()?;
        let len = u64::try_from(len).unwrap_or(0);
        self.read_utf_body(len, max)
    }

    fn read_utf_body(&mut self, len: u64, max: Option<u64>) -> Result<String> {
        if let Some(max) = max
            && len > max
        {
            return Err(Error::StringLengthExceeded { length: len, max });
        }
        // Kein Vorab-Allozieren der vollen (evtl. manipulierten) Laenge
        let mut body = Vec::with_capacity(len.min(64 * 1024) as usize);
        let mut chunk = [0u8; MAX_BLOCK_SIZE];
        let mut remain = len;
        while remain > 0 {
            let want = remain.min(MAX_BLOCK_SIZE as u64) as usize;
            self.read_exact(&mut chunk[..want])?;
            body.extend_from_slice(&chunk[..want]);
            remain -= want as u64;
        }
        mutf8::decode(&body)
    }

    // === Bulk typed reads for primitive array runs (Protocol 6.4.1) ===

    fn read_prim_run<T>(
        &mut self,
        len: usize,
        width: usize,
        mut decode_one: impl FnMut(&[u8]) -> T,
    ) -> Result<Vec<T>> {
        let mut out = Vec::with_capacity(len.min(MAX_BLOCK_SIZE));
        let mut scratch = [0u8; MAX_BLOCK_SIZE];
        let mut remain = len;
        while remain > 0 {
            let n = remain.min(MAX_BLOCK_SIZE / width);
            self.read_exact(&mut scratch[..n * width])?;
            for i in 0..n {
                out.push(decode_one(&scratch[i * width..(i + 1) * width]));
            }
            remain -= n;
        }
        Ok(out)
    }

    pub fn read_bools(&mut self, len: usize) -> Result<Vec<bool>> {
        self.read_prim_run(len, 1, |b| b[0] != 0)
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<Vec<i8>> {
        self.read_prim_run(len, 1, |b| b[0] as i8)
    }

    pub fn read_chars(&mut self, len: usize) -> Result<Vec<u16>> {
        self.read_prim_run(len, 2, |b| u16::from_be_bytes([b[0], b[1]]))
    }

    pub fn read_shorts(&mut self, len: usize) -> Result<Vec<i16>> {
        self.read_prim_run(len, 2, |b| i16::from_be_bytes([b[0], b[1]]))
    }

    pub fn read_ints(&mut self, len: usize) -> Result<Vec<i32>> {
        self.read_prim_run(len, 4, |b| i32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_longs(&mut self, len: usize) -> Result<Vec<i64>> {
        self.read_prim_run(len, 8, |b| {
            i64::from_be_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]])
        })
    }

    pub fn read_floats(&mut self, len: usize) -> Result<Vec<f32>> {
        self.read_prim_run(len, 4, |b| {
            f32::from_bits(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
        })
    }

    pub fn read_doubles(&mut self, len: usize) -> Result<Vec<f64>> {
        self.read_prim_run(len, 8, |b| {
            f64::from_bits(u64::from_be_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{TC_ENDBLOCKDATA, TC_NULL};

    fn block_input(data: &[u8]) -> BlockInput<&[u8]> {
        BlockInput::new(data)
    }

    // === PeekReader ===

    #[test]
    fn peek_does_not_consume() {
        let mut r = PeekReader::new(&[1u8, 2][..]);
        assert_eq!(r.peek().unwrap(), Some(1));
        assert_eq!(r.peek().unwrap(), Some(1));
        assert_eq!(r.read().unwrap(), Some(1));
        assert_eq!(r.read().unwrap(), Some(2));
        assert_eq!(r.read().unwrap(), None);
    }

    #[test]
    fn read_into_honors_pushback() {
        let mut r = PeekReader::new(&[1u8, 2, 3][..]);
        assert_eq!(r.peek().unwrap(), Some(1));
        let mut b = [0u8; 3];
        assert_eq!(r.read_into(&mut b).unwrap(), 3);
        assert_eq!(b, [1, 2, 3]);
    }

    // === Tag-Modus ===

    #[test]
    fn tag_mode_passes_bytes_through() {
        let mut bin = block_input(&[0xAB, 0xCD]);
        assert!(!bin.block_mode());
        assert_eq!(bin.read_u8().unwrap(), 0xAB);
        assert_eq!(bin.read_u8().unwrap(), 0xCD);
        assert_eq!(bin.read().unwrap(), None);
    }

    #[test]
    fn primitives_big_endian() {
        let mut bin = block_input(&[
            0x01, 0x02, // u16
            0xFF, 0xFF, 0xFF, 0xFE, // i32 = -2
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x2A, // i64 = 42
            0x40, 0x49, 0x0F, 0xDB, // f32 ~ pi
        ]);
        assert_eq!(bin.read_u16().unwrap(), 0x0102);
        assert_eq!(bin.read_i32().unwrap(), -2);
        assert_eq!(bin.read_i64().unwrap(), 42);
        assert!((bin.read_f32().unwrap() - std::f32::consts::PI).abs() < 1e-6);
    }

    /// Abschneiden mitten in einem Primitive ist ein Strukturfehler, nie
    /// ein stiller Wert.
    #[test]
    fn truncated_primitive_fails() {
        let mut bin = block_input(&[0x00, 0x01, 0x02]);
        assert_eq!(bin.read_i32().unwrap_err(), Error::PrematureEndOfStream);
    }

    // === Moduswechsel ===

    /// Wechsel in den aktiven Modus ist ein No-op und liefert den Modus.
    #[test]
    fn mode_switch_idempotent() {
        let mut bin = block_input(&[]);
        assert!(!bin.set_block_mode(false));
        assert!(!bin.set_block_mode(true)); // vorher: Tag-Modus
        assert!(bin.set_block_mode(true)); // No-op
        assert!(bin.set_block_mode(false)); // vorher: Block-Modus
    }

    #[test]
    #[should_panic(expected = "unread block data")]
    fn leaving_block_mode_with_unread_bytes_panics() {
        // Chunk mit 2 Bytes, nur 1 gelesen
        let mut bin = block_input(&[TC_BLOCKDATA, 2, 0xAA, 0xBB]);
        bin.set_block_mode(true);
        assert_eq!(bin.read_u8().unwrap(), 0xAA);
        bin.set_block_mode(false);
    }

    // === Block-Modus: Chunk-Reassembly (Protocol 6.4.1) ===

    /// Kurzer Chunk: 0x77 + u8-Laenge + Payload.
    #[test]
    fn short_chunk() {
        let mut bin = block_input(&[TC_BLOCKDATA, 3, 1, 2, 3, TC_ENDBLOCKDATA]);
        bin.set_block_mode(true);
        let mut b = [0u8; 3];
        bin.read_exact(&mut b).unwrap();
        assert_eq!(b, [1, 2, 3]);
        // Nicht-Chunk-Tag beendet die Folge als End-of-Data, kein Fehler
        assert_eq!(bin.read().unwrap(), None);
    }

    /// Langer Chunk: 0x7A + u32-Laenge (big-endian) + Payload.
    #[test]
    fn long_chunk() {
        let data = [TC_BLOCKDATALONG, 0, 0, 0, 2, 0xAA, 0xBB, TC_NULL];
        let mut bin = block_input(&data);
        bin.set_block_mode(true);
        let mut b = [0u8; 2];
        bin.read_exact(&mut b).unwrap();
        assert_eq!(b, [0xAA, 0xBB]);
        assert_eq!(bin.read().unwrap(), None);
    }

    /// Mehrere Chunks werden zu einer flachen Folge zusammengesetzt.
    #[test]
    fn chunk_boundaries_are_hidden() {
        let mut bin = block_input(&[
            TC_BLOCKDATA,
            2,
            1,
            2,
            TC_BLOCKDATA,
            3,
            3,
            4,
            5,
            TC_ENDBLOCKDATA,
        ]);
        bin.set_block_mode(true);
        let mut b = [0u8; 5];
        bin.read_exact(&mut b).unwrap();
        assert_eq!(b, [1, 2, 3, 4, 5]);
        assert_eq!(bin.read().unwrap(), None);
    }

    /// Chunks der Laenge 0 sind erlaubt und unsichtbar.
    #[test]
    fn zero_length_chunks_skipped() {
        let mut bin = block_input(&[
            TC_BLOCKDATA,
            0,
            TC_BLOCKDATA,
            0,
            TC_BLOCKDATA,
            1,
            7,
            TC_ENDBLOCKDATA,
        ]);
        bin.set_block_mode(true);
        assert_eq!(bin.read_u8().unwrap(), 7);
    }

    /// Primitive duerfen Chunk-Grenzen ueberspannen.
    #[test]
    fn primitive_across_chunk_boundary() {
        let mut bin = block_input(&[TC_BLOCKDATA, 2, 0x12, 0x34, TC_BLOCKDATA, 2, 0x56, 0x78]);
        bin.set_block_mode(true);
        assert_eq!(bin.read_i32().unwrap(), 0x1234_5678);
    }

    /// Negative Laenge im langen Chunk-Header ist ein Strukturfehler.
    #[test]
    fn negative_long_chunk_length_rejected() {
        let mut bin = block_input(&[TC_BLOCKDATALONG, 0x80, 0, 0, 1]);
        bin.set_block_mode(true);
        assert_eq!(
            bin.read().unwrap_err(),
            Error::IllegalBlockLength(i32::from_be_bytes([0x80, 0, 0, 1]))
        );
    }

    /// Byte ausserhalb des Tag-Bereichs beim Nachladen ist ein Fehler.
    #[test]
    fn invalid_tag_during_refill_rejected() {
        let mut bin = block_input(&[TC_BLOCKDATA, 1, 9, 0x42]);
        bin.set_block_mode(true);
        assert_eq!(bin.read_u8().unwrap(), 9);
        assert_eq!(bin.read().unwrap_err(), Error::InvalidTypeCode(0x42));
    }

    /// Reset-Record mitten in einer Chunk-Folge ist ein Strukturfehler.
    #[test]
    fn reset_during_refill_rejected() {
        let mut bin = block_input(&[TC_BLOCKDATA, 1, 9, TC_RESET]);
        bin.set_block_mode(true);
        assert_eq!(bin.read_u8().unwrap(), 9);
        assert_eq!(bin.read().unwrap_err(), Error::UnexpectedReset);
    }

    /// EOF mitten im angekuendigten Chunk ist ein Strukturfehler.
    #[test]
    fn truncated_chunk_rejected() {
        let mut bin = block_input(&[TC_BLOCKDATA, 4, 1, 2]);
        bin.set_block_mode(true);
        let mut b = [0u8; 4];
        assert_eq!(bin.read_exact(&mut b).unwrap_err(), Error::TruncatedBlockData);
    }

    /// EOF mitten im Chunk-Header ist ein Strukturfehler.
    #[test]
    fn truncated_chunk_header_rejected() {
        let mut bin = block_input(&[TC_BLOCKDATALONG, 0, 0]);
        bin.set_block_mode(true);
        assert_eq!(bin.read().unwrap_err(), Error::TruncatedBlockHeader);
    }

    /// EOF genau an der Chunk-Grenze ist ein End-of-Data-Signal.
    #[test]
    fn eof_at_chunk_boundary_is_end_of_data() {
        let mut bin = block_input(&[TC_BLOCKDATA, 1, 5]);
        bin.set_block_mode(true);
        assert_eq!(bin.read_u8().unwrap(), 5);
        assert_eq!(bin.read().unwrap(), None);
    }

    #[test]
    fn current_block_remaining_counts_buffered_and_announced() {
        let mut bin = block_input(&[TC_BLOCKDATA, 4, 1, 2, 3, 4, TC_ENDBLOCKDATA]);
        bin.set_block_mode(true);
        assert_eq!(bin.read_u8().unwrap(), 1);
        assert_eq!(bin.current_block_remaining(), 3);
    }

    #[test]
    fn skip_block_data_discards_rest_of_sequence() {
        let mut bin = block_input(&[
            TC_BLOCKDATA,
            2,
            1,
            2,
            TC_BLOCKDATA,
            2,
            3,
            4,
            TC_ENDBLOCKDATA,
            0xEE,
        ]);
        bin.set_block_mode(true);
        assert_eq!(bin.read_u8().unwrap(), 1);
        bin.skip_block_data().unwrap();
        assert_eq!(bin.current_block_remaining(), 0);
        bin.set_block_mode(false);
        // End-Marker und Folge-Byte sind unangetastet
        assert_eq!(bin.read_u8().unwrap(), TC_ENDBLOCKDATA);
        assert_eq!(bin.read_u8().unwrap(), 0xEE);
    }

    // === Strings ===

    #[test]
    fn read_utf_short_form() {
        let mut data = vec![0x00, 0x05];
        data.extend_from_slice(b"hello");
        let mut bin = block_input(&data);
        assert_eq!(bin.read_utf(None).unwrap(), "hello");
    }

    #[test]
    fn read_long_utf() {
        let mut data = vec![0, 0, 0, 0, 0, 0, 0, 3];
        data.extend_from_slice(b"abc");
        let mut bin = block_input(&data);
        assert_eq!(bin.read_long_utf(None).unwrap(), "abc");
    }

    /// Negative Long-Laenge liest das Original als leeren String.
    #[test]
    fn read_long_utf_negative_length_is_empty() {
        let data = [0xFF; 8];
        let mut bin = block_input(&data);
        assert_eq!(bin.read_long_utf(None).unwrap(), "");
    }

    #[test]
    fn read_utf_respects_limit() {
        let mut data = vec![0x00, 0x05];
        data.extend_from_slice(b"hello");
        let mut bin = block_input(&data);
        assert_eq!(
            bin.read_utf(Some(4)).unwrap_err(),
            Error::StringLengthExceeded { length: 5, max: 4 }
        );
    }

    #[test]
    fn read_utf_truncated_body_fails() {
        let mut bin = block_input(&[0x00, 0x05, b'h', b'i']);
        assert_eq!(bin.read_utf(None).unwrap_err(), Error::PrematureEndOfStream);
    }

    // === Bulk reads ===

    #[test]
    fn bulk_ints() {
        let mut data = Vec::new();
        for v in [1i32, -1, 0x7FFF_FFFF] {
            data.extend_from_slice(&v.to_be_bytes());
        }
        let mut bin = block_input(&data);
        assert_eq!(bin.read_ints(3).unwrap(), vec![1, -1, 0x7FFF_FFFF]);
    }

    #[test]
    fn bulk_doubles() {
        let mut data = Vec::new();
        for v in [1.5f64, -2.25] {
            data.extend_from_slice(&v.to_be_bytes());
        }
        let mut bin = block_input(&data);
        assert_eq!(bin.read_doubles(2).unwrap(), vec![1.5, -2.25]);
    }

    /// Bulk-Reads ueberspannen Chunk-Grenzen wie Einzel-Reads.
    #[test]
    fn bulk_read_across_chunks() {
        let mut bin = block_input(&[TC_BLOCKDATA, 3, 0, 0, 1, TC_BLOCKDATA, 1, 2, TC_ENDBLOCKDATA]);
        bin.set_block_mode(true);
        assert_eq!(bin.read_shorts(2).unwrap(), vec![0, 0x0102]);
    }

    #[test]
    fn bulk_read_truncation_fails() {
        let data = [0u8; 6];
        let mut bin = block_input(&data);
        assert_eq!(bin.read_longs(1).unwrap_err(), Error::PrematureEndOfStream);
    }
}
