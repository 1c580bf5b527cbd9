//! Graph decoder: recursive-descent state machine over tagged records
//! (Protocol 3.1, 6.4.1).
//!
//! Der [`Decoder`] ist die einzige Komponente, die sowohl den Framer als
//! auch die Handle-Tabelle anfasst. Pro Aufruf entsteht genau eine
//! decodierte Entity; fuer verschachtelte Felder und Elemente steigt er
//! rekursiv ab. Die Kernordnung fuer Zyklen: das Handle einer Entity wird
//! zugewiesen, *bevor* ihr Inhalt decodiert wird — ein Feld, das auf das
//! gerade entstehende Objekt zurueckzeigt, sieht den pending Eintrag
//! statt endlos zu rekursieren.
//!
//! Eine Instanz gehoert zu genau einer Byte-Quelle und ist single-threaded;
//! Abbruch mitten im Decode wird nicht unterstuetzt (Instanz verwerfen).
//!
//! # Beispiel
//!
//! ```
//! use std::rc::Rc;
//! use jodec::{Decoder, TypeRegistry};
//!
//! // [magic][version][TC_STRING len=2 "hi"]
//! let data: &[u8] = &[0xAC, 0xED, 0x00, 0x05, 0x74, 0x00, 0x02, b'h', b'i'];
//! let mut dec = Decoder::new(data, Rc::new(TypeRegistry::strict())).unwrap();
//! let value = dec.read_object().unwrap();
//! assert_eq!(value.as_str(), Some("hi"));
//! ```

use std::io::Read;
use std::rc::Rc;

use log::{debug, trace, warn};

use crate::constants::{
    BASE_WIRE_HANDLE, STREAM_MAGIC, STREAM_VERSION, TC_ARRAY, TC_BLOCKDATA, TC_BLOCKDATALONG,
    TC_CLASS, TC_CLASSDESC, TC_ENDBLOCKDATA, TC_ENUM, TC_EXCEPTION, TC_LONGSTRING, TC_NULL,
    TC_OBJECT, TC_PROXYCLASSDESC, TC_REFERENCE, TC_RESET, TC_STRING,
};
use crate::descriptor::{ClassDesc, DescFlags, ElementKind, FieldDesc, FieldKind, PrimKind, element_kind};
use crate::error::TypeFault;
use crate::handles::{Handle, HandleTable, Slot};
use crate::options::DecodeOptions;
use crate::registry::{ClassResolver, ReadHook};
use crate::stream::BlockInput;
use crate::validation::{ValidationCallback, ValidationList};
use crate::value::{ArrayElems, ArrayValue, EnumValue, ObjectValue, Value};
use crate::{Error, Result};


/// Kontext waehrend eines laufenden Custom-Hooks (Objekt + Ebene).
#[derive(Clone)]
struct HookContext {
    obj: Rc<ObjectValue>,
    desc: Rc<ClassDesc>,
}

/// The decode surface visible to custom read hooks (and general callers):
/// nested graph reads plus the primitive pass-through of the framer.
///
/// Innerhalb eines Hooks laeuft der Framer im Block-Modus; primitive
/// Reads konsumieren die Custom-Daten des aktuellen Objekts.
pub trait StreamInput {
    /// Decodes the next entity of the stream (shared).
    fn read_object(&mut self) -> Result<Value>;

    /// Decodes the next entity, rejecting back-references
    /// (Protocol 3.1 `readUnshared`).
    fn read_unshared(&mut self) -> Result<Value>;

    /// Fuellt die Felder der aktuellen Hook-Ebene wie beim
    /// Standard-Decoding (`defaultReadObject`-Analogon). Nur innerhalb
    /// eines Hooks erlaubt.
    fn default_read_fields(&mut self) -> Result<()>;

    /// Registers a deferred validation callback; only legal while a graph
    /// decode is in progress (Protocol 3.4).
    fn register_validation(&mut self, priority: i32, callback: ValidationCallback) -> Result<()>;

    /// Reads up to `buf.len()` bytes; `0` signals end-of-data.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Reads exactly `buf.len()` bytes.
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()>;

    /// Skips up to `n` bytes, returning the number skipped.
    fn skip_bytes(&mut self, n: u64) -> Result<u64>;

    fn read_bool(&mut self) -> Result<bool>;
    fn read_i8(&mut self) -> Result<i8>;
    fn read_u8(&mut self) -> Result<u8>;
    fn read_i16(&mut self) -> Result<i16>;
    fn read_u16(&mut self) -> Result<u16>;
    /// Ein UTF-16-Code-Unit (`char` des Originals).
    fn read_char_code(&mut self) -> Result<u16>;
    fn read_i32(&mut self) -> Result<i32>;
    fn read_i64(&mut self) -> Result<i64>;
    fn read_f32(&mut self) -> Result<f32>;
    fn read_f64(&mut self) -> Result<f64>;
    /// Laengenpraefixierter modified-UTF-8 String (Kurzform).
    fn read_utf(&mut self) -> Result<String>;
}

/// Stream decoder for one serialization byte source.
pub struct Decoder<R> {
    bin: BlockInput<R>,
    handles: HandleTable,
    vlist: ValidationList,
    resolver: Rc<dyn ClassResolver>,
    options: DecodeOptions,
    /// Rekursionstiefe; 0 = kein Graph-Decode aktiv. Explizit statt
    /// Call-Stack-Zustand, mit Wiederherstellung auf allen Pfaden.
    depth: usize,
    /// Handle der zuletzt decodierten Entity (`None` nach Null-Records).
    pass_handle: Option<Handle>,
    closed: bool,
    cur_hook: Option<HookContext>,
}

impl<R> std::fmt::Debug for Decoder<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Decoder")
            .field("depth", &self.depth)
            .field("pass_handle", &self.pass_handle)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl<R: Read> Decoder<R> {
    /// Creates a decoder and validates the 4-byte stream header
    /// immediately (Protocol 6.4.2).
    pub fn new(source: R, resolver: Rc<dyn ClassResolver>) -> Result<Self> {
        Self::with_options(source, resolver, DecodeOptions::default())
    }

    /// Wie [`new`](Self::new), mit Ressourcen-Limits.
    pub fn with_options(
        source: R,
        resolver: Rc<dyn ClassResolver>,
        options: DecodeOptions,
    ) -> Result<Self> {
        let mut bin = BlockInput::new(source);
        let m0 = bin.read_u16()?;
        let m1 = bin.read_u16()?;
        if m0 != STREAM_MAGIC || m1 != STREAM_VERSION {
            return Err(Error::InvalidStreamHeader(m0, m1));
        }
        // Zwischen Top-Level-Records laeuft der Stream im Block-Modus
        bin.set_block_mode(true);
        Ok(Self {
            bin,
            handles: HandleTable::new(),
            vlist: ValidationList::new(),
            resolver,
            options,
            depth: 0,
            pass_handle: None,
            closed: false,
            cur_hook: None,
        })
    }

    /// Aktive Optionen.
    pub fn options(&self) -> &DecodeOptions {
        &self.options
    }

    /// Anzahl bisher vergebener Handles (Diagnostik).
    pub fn handle_count(&self) -> usize {
        self.handles.len()
    }

    /// True solange die Quelle weitere Top-Level-Records hat.
    pub fn has_more(&mut self) -> Result<bool> {
        if self.bin.block_mode() {
            if self.bin.current_block_remaining() > 0 {
                return Ok(true);
            }
            let old = self.bin.set_block_mode(false);
            let more = self.bin.peek()?.is_some();
            self.bin.set_block_mode(old);
            Ok(more)
        } else {
            Ok(self.bin.peek()?.is_some())
        }
    }

    /// Markiert die Session als geschlossen; ausserhalb eines laufenden
    /// Decodes wird der Session-Zustand sofort geraeumt, sonst beim
    /// Abwickeln des aeussersten Aufrufs.
    pub fn close(&mut self) {
        self.closed = true;
        if self.depth == 0 {
            self.clear_session();
        }
    }

    /// Decodes the next entity of the stream.
    ///
    /// Traegt die Entity einen (transitiv geerbten) Typ-Fault, kommt
    /// [`Error::ClassNotFound`] zurueck; Geschwister ohne Abhaengigkeit
    /// bleiben decodierbar.
    pub fn read_object(&mut self) -> Result<Value> {
        self.read_toplevel(false)
    }

    /// Decodes the next entity, rejecting any back-reference — auch auf
    /// pending Handles (Protocol 3.1 `readUnshared`).
    pub fn read_unshared(&mut self) -> Result<Value> {
        self.read_toplevel(true)
    }

    /// Registers a deferred validation callback (Protocol 3.4). Nur
    /// waehrend eines laufenden Graph-Decodes erlaubt; hoehere
    /// Prioritaeten laufen zuerst.
    pub fn register_validation(
        &mut self,
        priority: i32,
        callback: ValidationCallback,
    ) -> Result<()> {
        if self.depth == 0 {
            return Err(Error::NotActive("stream inactive"));
        }
        self.vlist.register(priority, callback);
        Ok(())
    }

    // ========================================================================
    // Top-Level-Choreografie
    // ========================================================================

    fn read_toplevel(&mut self, unshared: bool) -> Result<Value> {
        let outer = self.pass_handle;
        let result = self.read_toplevel_guarded(unshared, outer);
        self.pass_handle = outer;
        if self.closed && self.depth == 0 {
            self.clear_session();
        }
        result
    }

    fn read_toplevel_guarded(&mut self, unshared: bool, outer: Option<Handle>) -> Result<Value> {
        let value = self.read_record(unshared)?;
        self.handles.record_dependency(outer, self.pass_handle);
        if let Some(fault) = self.handles.fault(self.pass_handle) {
            return Err((&*fault).into());
        }
        if self.depth == 0 && !self.vlist.is_empty() {
            trace!("running {} validation callbacks", self.vlist.len());
            self.vlist.run()?;
        }
        Ok(value)
    }

    fn clear_session(&mut self) {
        self.handles.clear();
        self.vlist.clear();
    }

    // ========================================================================
    // Dispatcher (Protocol 6.4.1 `content`)
    // ========================================================================

    /// Decodes one record. Block-Modus und Tiefe werden auf allen Pfaden
    /// wiederhergestellt, auch bei Fehlern.
    fn read_record(&mut self, unshared: bool) -> Result<Value> {
        let old_mode = self.bin.block_mode();
        if old_mode {
            let remain = self.bin.current_block_remaining();
            if remain > 0 {
                return Err(Error::OptionalBlockData { remaining: remain });
            }
            if self.bin.default_data_end() {
                return Err(Error::EndOfCustomData);
            }
            self.bin.set_block_mode(false);
        }
        let result = self.read_record_raw(unshared, old_mode);
        if result.is_ok() {
            self.bin.set_block_mode(old_mode);
        } else {
            // Fehlerpfad: Modus wiederherstellen, ohne an liegen
            // gebliebenen Chunk-Bytes zu scheitern
            self.bin.force_block_mode(old_mode);
        }
        result
    }

    fn read_record_raw(&mut self, unshared: bool, old_mode: bool) -> Result<Value> {
        let tc = loop {
            let tc = self.bin.peek_u8()?;
            if tc != TC_RESET {
                break tc;
            }
            self.bin.read_u8()?;
            self.handle_reset()?;
        };
        if let Some(max) = self.options.max_depth()
            && self.depth >= max
        {
            return Err(Error::DepthLimitExceeded { max });
        }
        self.depth += 1;
        let result = self.dispatch(tc, unshared, old_mode);
        self.depth -= 1;
        result
    }

    fn dispatch(&mut self, tc: u8, unshared: bool, old_mode: bool) -> Result<Value> {
        match tc {
            TC_NULL => self.read_null(),
            TC_REFERENCE => self.read_back_reference(unshared),
            TC_CLASSDESC | TC_PROXYCLASSDESC => {
                let desc = self.read_class_desc(unshared)?.ok_or(Error::UnexpectedEntity {
                    expected: "class descriptor",
                })?;
                Ok(Value::Descriptor(desc))
            }
            TC_OBJECT => self.read_ordinary_object(unshared),
            TC_STRING | TC_LONGSTRING => {
                Ok(Value::Str(self.read_string_value(unshared)?))
            }
            TC_ARRAY => self.read_array(unshared),
            TC_CLASS => self.read_class(unshared),
            TC_ENUM => self.read_enum(unshared),
            TC_BLOCKDATA | TC_BLOCKDATALONG => {
                if old_mode {
                    // Aufrufer steht noch in Custom-Daten: Menge melden
                    self.bin.set_block_mode(true);
                    self.bin.peek()?;
                    Err(Error::OptionalBlockData {
                        remaining: self.bin.current_block_remaining(),
                    })
                } else {
                    Err(Error::UnexpectedBlockData)
                }
            }
            TC_ENDBLOCKDATA => {
                if old_mode {
                    Err(Error::EndOfCustomData)
                } else {
                    Err(Error::UnexpectedEndBlockData)
                }
            }
            TC_EXCEPTION => self.read_fatal_fault(),
            other => Err(Error::InvalidTypeCode(other)),
        }
    }

    /// Reset zwischen Top-Level-Records raeumt die Session; mitten im
    /// Graphen ist er ein Strukturfehler.
    fn handle_reset(&mut self) -> Result<()> {
        if self.depth > 0 {
            return Err(Error::UnexpectedReset);
        }
        trace!("reset record between top-level objects");
        self.clear_session();
        Ok(())
    }

    // ========================================================================
    // Records ohne Rekursion
    // ========================================================================

    fn read_null(&mut self) -> Result<Value> {
        let tc = self.bin.read_u8()?;
        debug_assert_eq!(tc, TC_NULL);
        self.pass_handle = None;
        Ok(Value::Null)
    }

    fn read_back_reference(&mut self, unshared: bool) -> Result<Value> {
        let tc = self.bin.read_u8()?;
        debug_assert_eq!(tc, TC_REFERENCE);
        let wire = self.bin.read_u32()?;
        let index = i64::from(wire) - i64::from(BASE_WIRE_HANDLE);
        if index < 0 || index >= self.handles.len() as i64 {
            return Err(Error::InvalidHandle(wire));
        }
        let index = index as usize;
        self.pass_handle = Some(index);
        if unshared {
            return Err(Error::UnsharedBackReference);
        }
        match self.handles.slot(index) {
            Slot::Unshared => Err(Error::BackReferenceToUnshared),
            // Fault wird ueber pass_handle beim Anfordernden sichtbar
            Slot::Fault(_) => Ok(Value::Null),
            Slot::Value(v) => Ok(v.clone()),
        }
    }

    /// String-Record: Kurz-/Langform, Handle sofort, keine Rekursion.
    fn read_string_value(&mut self, unshared: bool) -> Result<Rc<str>> {
        let max = self.options.max_string_length();
        let s: Rc<str> = match self.bin.read_u8()? {
            TC_STRING => self.bin.read_utf(max)?.into(),
            TC_LONGSTRING => self.bin.read_long_utf(max)?.into(),
            other => return Err(Error::InvalidTypeCode(other)),
        };
        let slot = if unshared {
            Slot::Unshared
        } else {
            Slot::Value(Value::Str(Rc::clone(&s)))
        };
        let handle = self.handles.assign(slot);
        self.handles.finish(handle);
        self.pass_handle = Some(handle);
        Ok(s)
    }

    // ========================================================================
    // Descriptoren (Protocol 6.4.1 `classDesc`)
    // ========================================================================

    /// Liest eine Descriptor-Position: null, Rueckwaerts-Referenz, plain
    /// oder Proxy.
    fn read_class_desc(&mut self, unshared: bool) -> Result<Option<Rc<ClassDesc>>> {
        match self.bin.peek_u8()? {
            TC_NULL => {
                self.read_null()?;
                Ok(None)
            }
            TC_REFERENCE => match self.read_back_reference(unshared)? {
                Value::Descriptor(d) => Ok(Some(d)),
                _ => Err(Error::UnexpectedEntity {
                    expected: "class descriptor",
                }),
            },
            TC_CLASSDESC => Ok(Some(self.read_plain_desc(unshared)?)),
            TC_PROXYCLASSDESC => Ok(Some(self.read_proxy_desc(unshared)?)),
            other => Err(Error::InvalidTypeCode(other)),
        }
    }

    /// Plain Descriptor. Handle-Zuweisung VOR dem Lesen von Feldern und
    /// Superkette: selbstreferenzielle Descriptoren loesen sich sonst nie
    /// auf.
    fn read_plain_desc(&mut self, unshared: bool) -> Result<Rc<ClassDesc>> {
        let tc = self.bin.read_u8()?;
        debug_assert_eq!(tc, TC_CLASSDESC);
        let desc = ClassDesc::pending();
        let slot = if unshared {
            Slot::Unshared
        } else {
            Slot::Value(Value::Descriptor(Rc::clone(&desc)))
        };
        let desc_handle = self.handles.assign(slot);
        self.pass_handle = None;

        let max_str = self.options.max_string_length();
        let name = self.bin.read_utf(max_str)?;
        let suid = self.bin.read_i64()?;
        let flags = DescFlags::from_bits(self.bin.read_u8()?);
        flags.validate(&name, suid)?;
        let num_fields = self.bin.read_u16()?;
        if flags.is_enum() && num_fields != 0 {
            return Err(Error::invalid_class(
                name.as_str(),
                format!("enum descriptor has non-zero field count: {num_fields}"),
            ));
        }
        let mut fields = Vec::with_capacity(usize::from(num_fields));
        for _ in 0..num_fields {
            let code = self.bin.read_u8()?;
            let fname: Rc<str> = self.bin.read_utf(max_str)?.into();
            let kind = match code {
                b'L' | b'[' => {
                    let sig = self.read_type_string()?.ok_or_else(|| {
                        Error::invalid_class(
                            name.as_str(),
                            format!("invalid descriptor for field {fname}"),
                        )
                    })?;
                    FieldKind::Ref(sig)
                }
                code => {
                    FieldKind::Prim(PrimKind::from_code(code).ok_or(Error::InvalidFieldCode(code))?)
                }
            };
            fields.push(FieldDesc::new(fname, kind));
        }

        // Klassen-Annotation folgt in Block-Chunks; Aufloesung davor,
        // Superkette danach
        self.bin.set_block_mode(true);
        let (local, fault) = if name.starts_with('[') {
            // Array-Typen loesen sich ueber ihre Signatur, nicht ueber die
            // Registry
            let fault = element_kind(&name).is_none().then(|| TypeFault::not_an_array(&name));
            (None, fault)
        } else {
            let local = self.resolver.resolve_class(&name);
            let fault = local.is_none().then(|| {
                debug!("type not found: {name}");
                TypeFault::class_not_found(&name)
            });
            (local, fault)
        };
        self.skip_custom_data()?;
        let super_desc = self.read_class_desc(false)?;
        desc.init_plain(name.into(), suid, flags, fields, local, fault, super_desc)?;
        self.handles.finish(desc_handle);
        self.pass_handle = Some(desc_handle);
        Ok(desc)
    }

    /// Proxy-Descriptor: Interface-Namen statt Name+Feldliste.
    fn read_proxy_desc(&mut self, unshared: bool) -> Result<Rc<ClassDesc>> {
        let tc = self.bin.read_u8()?;
        debug_assert_eq!(tc, TC_PROXYCLASSDESC);
        let desc = ClassDesc::pending();
        let slot = if unshared {
            Slot::Unshared
        } else {
            Slot::Value(Value::Descriptor(Rc::clone(&desc)))
        };
        let desc_handle = self.handles.assign(slot);
        self.pass_handle = None;

        let count = self.bin.read_i32()?;
        if count < 0 {
            return Err(Error::NegativeCount {
                what: "proxy interface count",
                count: count.into(),
            });
        }
        let max_str = self.options.max_string_length();
        let mut interfaces: Vec<Rc<str>> = Vec::with_capacity((count as usize).min(64));
        for _ in 0..count {
            interfaces.push(self.bin.read_utf(max_str)?.into());
        }

        self.bin.set_block_mode(true);
        let local = self.resolver.resolve_proxy(&interfaces);
        let fault = local.is_none().then(|| {
            debug!("proxy type not found: [{}]", interfaces.join(", "));
            TypeFault::proxy_not_found(&interfaces)
        });
        self.skip_custom_data()?;
        let super_desc = self.read_class_desc(false)?;
        desc.init_proxy(interfaces, local, fault, super_desc)?;
        self.handles.finish(desc_handle);
        self.pass_handle = Some(desc_handle);
        Ok(desc)
    }

    /// Typ-String eines Referenzfelds: null, Rueckwaerts-Referenz oder
    /// String-Record. Laesst `pass_handle` des Aufrufers unveraendert.
    fn read_type_string(&mut self) -> Result<Option<Rc<str>>> {
        let old_handle = self.pass_handle;
        let result = match self.bin.peek_u8()? {
            TC_NULL => {
                self.read_null()?;
                Ok(None)
            }
            TC_REFERENCE => match self.read_back_reference(false)? {
                Value::Str(s) => Ok(Some(s)),
                _ => Err(Error::UnexpectedEntity {
                    expected: "type string",
                }),
            },
            TC_STRING | TC_LONGSTRING => Ok(Some(self.read_string_value(false)?)),
            other => Err(Error::InvalidTypeCode(other)),
        };
        self.pass_handle = old_handle;
        result
    }

    // ========================================================================
    // Klassen als Werte
    // ========================================================================

    fn read_class(&mut self, unshared: bool) -> Result<Value> {
        let tc = self.bin.read_u8()?;
        debug_assert_eq!(tc, TC_CLASS);
        let desc = self.read_class_desc(false)?.ok_or(Error::UnexpectedEntity {
            expected: "class descriptor",
        })?;
        let value = Value::Class(Rc::clone(&desc));
        let slot = if unshared {
            Slot::Unshared
        } else {
            Slot::Value(value.clone())
        };
        let handle = self.handles.assign(slot);
        if let Some(fault) = desc.chain_fault() {
            self.handles.mark_fault(handle, fault);
        }
        self.handles.finish(handle);
        self.pass_handle = Some(handle);
        Ok(value)
    }

    // ========================================================================
    // Objekte (Protocol 6.4.1 `newObject`)
    // ========================================================================

    fn read_ordinary_object(&mut self, unshared: bool) -> Result<Value> {
        let tc = self.bin.read_u8()?;
        debug_assert_eq!(tc, TC_OBJECT);
        let desc = self.read_class_desc(false)?.ok_or(Error::UnexpectedEntity {
            expected: "class descriptor",
        })?;
        let obj = ObjectValue::pending(Rc::clone(&desc));
        let slot = if unshared {
            Slot::Unshared
        } else {
            Slot::Value(Value::Object(Rc::clone(&obj)))
        };
        // Der Dreh- und Angelpunkt der Zyklus-Unterstuetzung: Handle vor
        // den Feldern
        let handle = self.handles.assign(slot);
        obj.set_handle(handle);
        self.pass_handle = Some(handle);
        if let Some(fault) = desc.chain_fault() {
            debug!("object #{handle} poisoned by unresolved descriptor");
            self.handles.mark_fault(handle, fault);
        }
        if desc.is_externalizable() {
            self.read_external_data(&obj, &desc)?;
        } else {
            self.read_serial_data(&obj, &desc)?;
        }
        self.handles.finish(handle);
        self.pass_handle = Some(handle);
        Ok(Value::Object(obj))
    }

    /// Felddaten pro Ebene der Klassenkette, aeltester Vorfahre zuerst
    /// (Wire-Layout-Reihenfolge).
    fn read_serial_data(&mut self, obj: &Rc<ObjectValue>, desc: &Rc<ClassDesc>) -> Result<()> {
        for slot_desc in desc.chain() {
            let faulted = self.handles.fault(self.pass_handle).is_some();
            let hook = if faulted {
                None
            } else {
                slot_desc.local().and_then(|l| l.read_hook())
            };
            if faulted {
                // Werte lesen und verwerfen: der Stream muss synchron
                // bleiben, damit Geschwister decodierbar sind
                self.read_default_fields_of(None, &slot_desc)?;
            } else if let Some(hook) = hook {
                self.invoke_read_hook(hook, obj, &slot_desc)?;
            } else {
                self.read_default_fields_of(Some(obj), &slot_desc)?;
            }
            if slot_desc.has_write_data() {
                self.skip_custom_data()?;
            } else {
                self.bin.set_block_mode(false);
            }
        }
        Ok(())
    }

    /// Uebergibt die Ebene einem Custom-Hook im Block-Modus.
    ///
    /// `ClassNotFound` aus dem Hook (ein Typaufloesungs-Fehler aus einem
    /// verschachtelten Read) bleibt auf das Objekt-Handle begrenzt; alle
    /// anderen Fehler brechen die Session ab.
    fn invoke_read_hook(
        &mut self,
        hook: ReadHook,
        obj: &Rc<ObjectValue>,
        slot_desc: &Rc<ClassDesc>,
    ) -> Result<()> {
        let old_ctx = self.cur_hook.take();
        self.cur_hook = Some(HookContext {
            obj: Rc::clone(obj),
            desc: Rc::clone(slot_desc),
        });
        self.bin.set_block_mode(true);
        let result = hook(self, obj);
        self.cur_hook = old_ctx;
        self.bin.set_default_data_end(false);
        match result {
            Err(Error::ClassNotFound(name)) => {
                if let Some(handle) = self.pass_handle {
                    self.handles.mark_fault(handle, TypeFault::class_not_found(&name));
                }
                Ok(())
            }
            other => other,
        }
    }

    /// Externe Daten: Hook im Block-Modus (Stream-Version 2) und
    /// anschliessende Re-Synchronisation bis zum End-Marker.
    fn read_external_data(&mut self, obj: &Rc<ObjectValue>, desc: &Rc<ClassDesc>) -> Result<()> {
        let old_ctx = self.cur_hook.take();
        let blocked = desc.has_block_external_data();
        if blocked {
            self.bin.set_block_mode(true);
        }
        let faulted = self.handles.fault(self.pass_handle).is_some();
        let hook = if faulted {
            None
        } else {
            desc.local().and_then(|l| l.read_hook())
        };
        let result = match hook {
            Some(hook) => match hook(self, obj) {
                Err(Error::ClassNotFound(name)) => {
                    if let Some(handle) = self.pass_handle {
                        self.handles.mark_fault(handle, TypeFault::class_not_found(&name));
                    }
                    Ok(())
                }
                other => other,
            },
            // Ungerahmte externe Daten ohne Hook sind nicht
            // ueberspringbar; dahinter ist der Stream verloren
            None if !blocked => Err(Error::ExternalDataNotReadable {
                name: desc.name().to_string(),
            }),
            None => Ok(()),
        };
        self.cur_hook = old_ctx;
        result?;
        if blocked {
            self.skip_custom_data()?;
        }
        Ok(())
    }

    /// Standard-Feldfuellen einer Ebene: erst der zusammenhaengende
    /// Primitive-Block, dann jedes Referenzfeld rekursiv. `obj == None`
    /// liest und verwirft (faulted oder unbekannte Ebene).
    fn read_default_fields_of(
        &mut self,
        obj: Option<&Rc<ObjectValue>>,
        desc: &Rc<ClassDesc>,
    ) -> Result<()> {
        let fields = desc.fields();
        let mut prim = vec![0u8; desc.prim_data_size()];
        self.bin.read_exact(&mut prim)?;
        let mut off = 0;
        for (index, field) in fields.iter().enumerate() {
            if let FieldKind::Prim(kind) = field.kind() {
                let value = decode_prim(*kind, &prim[off..off + kind.width()]);
                off += kind.width();
                if let Some(obj) = obj
                    && desc.field_match(index).matched
                {
                    obj.set_field(Rc::clone(field.name()), value);
                }
            }
        }
        let obj_handle = self.pass_handle;
        for (index, field) in fields.iter().enumerate() {
            if matches!(field.kind(), FieldKind::Ref(_)) {
                let m = desc.field_match(index);
                let value = self.read_record(m.matched && m.unshared)?;
                if let Some(obj) = obj
                    && m.matched
                {
                    obj.set_field(Rc::clone(field.name()), value);
                    // Kante nur fuer pending Ziele: Fault-Erbschaft
                    self.handles.record_dependency(obj_handle, self.pass_handle);
                }
            }
        }
        self.pass_handle = obj_handle;
        Ok(())
    }

    /// Ueberspringt nicht konsumierte Custom-Daten bis zum End-Marker:
    /// Block-Chunks werden verworfen, verschachtelte Records vollstaendig
    /// (mit Handle-Vergabe) decodiert und fallen gelassen.
    fn skip_custom_data(&mut self) -> Result<()> {
        let old_handle = self.pass_handle;
        loop {
            if self.bin.block_mode() {
                self.bin.skip_block_data()?;
                self.bin.set_block_mode(false);
            }
            match self.bin.peek_u8()? {
                TC_BLOCKDATA | TC_BLOCKDATALONG => {
                    self.bin.set_block_mode(true);
                }
                TC_ENDBLOCKDATA => {
                    self.bin.read_u8()?;
                    self.pass_handle = old_handle;
                    return Ok(());
                }
                _ => {
                    self.read_record(false)?;
                }
            }
        }
    }

    // ========================================================================
    // Arrays (Protocol 6.4.1 `newArray`)
    // ========================================================================

    fn read_array(&mut self, unshared: bool) -> Result<Value> {
        let tc = self.bin.read_u8()?;
        debug_assert_eq!(tc, TC_ARRAY);
        let desc = self.read_class_desc(false)?.ok_or(Error::UnexpectedEntity {
            expected: "class descriptor",
        })?;
        let len = self.bin.read_i32()?;
        if len < 0 {
            return Err(Error::NegativeCount {
                what: "array length",
                count: len.into(),
            });
        }
        let len = len as usize;
        if let Some(max) = self.options.max_array_length()
            && len as u32 > max
        {
            return Err(Error::ArrayLengthExceeded {
                length: len as u32,
                max,
            });
        }
        let elem = desc.element_kind();
        let arr = ArrayValue::pending(Rc::clone(&desc), elem);
        let slot = if unshared {
            Slot::Unshared
        } else {
            Slot::Value(Value::Array(Rc::clone(&arr)))
        };
        let handle = self.handles.assign(slot);
        arr.set_handle(handle);
        self.pass_handle = Some(handle);
        if let Some(fault) = desc.chain_fault() {
            self.handles.mark_fault(handle, fault);
        }
        match elem {
            None => {
                // Elementart unbekannt: als Records lesen und verwerfen,
                // damit der Stream synchron bleibt
                self.handles
                    .mark_fault(handle, TypeFault::not_an_array(&desc.name()));
                for _ in 0..len {
                    self.read_record(false)?;
                }
            }
            Some(ElementKind::Ref) => {
                for _ in 0..len {
                    let value = self.read_record(false)?;
                    arr.push_ref(value);
                    self.handles.record_dependency(Some(handle), self.pass_handle);
                }
            }
            Some(ElementKind::Prim(kind)) => {
                let elems = match kind {
                    PrimKind::Bool => ArrayElems::Bools(self.bin.read_bools(len)?),
                    PrimKind::Byte => ArrayElems::Bytes(self.bin.read_bytes(len)?),
                    PrimKind::Char => ArrayElems::Chars(self.bin.read_chars(len)?),
                    PrimKind::Short => ArrayElems::Shorts(self.bin.read_shorts(len)?),
                    PrimKind::Int => ArrayElems::Ints(self.bin.read_ints(len)?),
                    PrimKind::Long => ArrayElems::Longs(self.bin.read_longs(len)?),
                    PrimKind::Float => ArrayElems::Floats(self.bin.read_floats(len)?),
                    PrimKind::Double => ArrayElems::Doubles(self.bin.read_doubles(len)?),
                };
                arr.fill(elems);
            }
        }
        self.handles.finish(handle);
        self.pass_handle = Some(handle);
        Ok(Value::Array(arr))
    }

    // ========================================================================
    // Enums (Protocol 6.4.1 `newEnum`)
    // ========================================================================

    fn read_enum(&mut self, unshared: bool) -> Result<Value> {
        let tc = self.bin.read_u8()?;
        debug_assert_eq!(tc, TC_ENUM);
        let desc = self.read_class_desc(false)?.ok_or(Error::UnexpectedEntity {
            expected: "class descriptor",
        })?;
        if !desc.is_enum() {
            return Err(Error::invalid_class(
                desc.name().to_string(),
                "non-enum class in enum record",
            ));
        }
        let slot = if unshared {
            Slot::Unshared
        } else {
            Slot::Value(Value::Null)
        };
        let handle = self.handles.assign(slot);
        if let Some(fault) = desc.chain_fault() {
            self.handles.mark_fault(handle, fault);
        }
        let name = self.read_string_value(false)?;
        let mut value = Value::Null;
        if let Some(local) = desc.local() {
            if !local.has_constant(&name) {
                return Err(Error::invalid_object(format!(
                    "enum constant {name} does not exist in {}",
                    desc.name()
                )));
            }
            value = Value::Enum(EnumValue::new(Rc::clone(&desc), name, handle));
            if !unshared {
                self.handles.set_value(handle, value.clone());
            }
        }
        self.handles.finish(handle);
        self.pass_handle = Some(handle);
        Ok(value)
    }

    // ========================================================================
    // Fault-Records (Protocol 6.4.1 `exception`)
    // ========================================================================

    /// Der Writer hat mitten im Stream abgebrochen und die Ursache als
    /// Objekt eingebettet: auspacken und als Session-Fehler melden. Die
    /// Handle-Tabelle wird davor und danach geraeumt (eigener
    /// Handle-Raum des Fault-Objekts).
    fn read_fatal_fault(&mut self) -> Result<Value> {
        let tc = self.bin.read_u8()?;
        debug_assert_eq!(tc, TC_EXCEPTION);
        self.clear_session();
        let fault_obj = self.read_record(false)?;
        self.clear_session();
        let (class_name, message) = match &fault_obj {
            Value::Object(obj) => (
                Some(obj.class_name().to_string()),
                obj.field("detailMessage").and_then(|v| v.as_str().map(String::from)),
            ),
            _ => (None, None),
        };
        warn!(
            "writer aborted the stream: {}",
            class_name.as_deref().unwrap_or("<unknown fault>")
        );
        Err(Error::WriteAborted { class_name, message })
    }

    // ========================================================================
    // Hook-Surface
    // ========================================================================

    /// Standard-Feldfuellen der aktuellen Hook-Ebene.
    fn default_read_fields_in_hook(&mut self) -> Result<()> {
        let Some(ctx) = self.cur_hook.clone() else {
            return Err(Error::NotActive("not in call to a read hook"));
        };
        self.bin.set_block_mode(false);
        self.read_default_fields_of(Some(&ctx.obj), &ctx.desc)?;
        self.bin.set_block_mode(true);
        if !ctx.desc.has_write_data() {
            // Hinter den Feldern folgen keine Custom-Daten mehr
            self.bin.set_default_data_end(true);
        }
        if let Some(fault) = self.handles.fault(self.pass_handle) {
            return Err((&*fault).into());
        }
        Ok(())
    }
}

/// Schneidet einen Primitivwert fester Breite aus dem Feldblock.
fn decode_prim(kind: PrimKind, b: &[u8]) -> Value {
    match kind {
        PrimKind::Bool => Value::Bool(b[0] != 0),
        PrimKind::Byte => Value::Byte(b[0] as i8),
        PrimKind::Char => Value::Char(u16::from_be_bytes([b[0], b[1]])),
        PrimKind::Short => Value::Short(i16::from_be_bytes([b[0], b[1]])),
        PrimKind::Int => Value::Int(i32::from_be_bytes([b[0], b[1], b[2], b[3]])),
        PrimKind::Long => Value::Long(i64::from_be_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ])),
        PrimKind::Float => Value::Float(f32::from_bits(u32::from_be_bytes([
            b[0], b[1], b[2], b[3],
        ]))),
        PrimKind::Double => Value::Double(f64::from_bits(u64::from_be_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))),
    }
}

impl<R: Read> StreamInput for Decoder<R> {
    fn read_object(&mut self) -> Result<Value> {
        Decoder::read_object(self)
    }

    fn read_unshared(&mut self) -> Result<Value> {
        Decoder::read_unshared(self)
    }

    fn default_read_fields(&mut self) -> Result<()> {
        self.default_read_fields_in_hook()
    }

    fn register_validation(&mut self, priority: i32, callback: ValidationCallback) -> Result<()> {
        Decoder::register_validation(self, priority, callback)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.bin.read_into(buf)
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        self.bin.read_exact(buf)
    }

    fn skip_bytes(&mut self, n: u64) -> Result<u64> {
        self.bin.skip(n)
    }

    fn read_bool(&mut self) -> Result<bool> {
        self.bin.read_bool()
    }

    fn read_i8(&mut self) -> Result<i8> {
        self.bin.read_i8()
    }

    fn read_u8(&mut self) -> Result<u8> {
        self.bin.read_u8()
    }

    fn read_i16(&mut self) -> Result<i16> {
        self.bin.read_i16()
    }

    fn read_u16(&mut self) -> Result<u16> {
        self.bin.read_u16()
    }

    fn read_char_code(&mut self) -> Result<u16> {
        self.bin.read_char_code()
    }

    fn read_i32(&mut self) -> Result<i32> {
        self.bin.read_i32()
    }

    fn read_i64(&mut self) -> Result<i64> {
        self.bin.read_i64()
    }

    fn read_f32(&mut self) -> Result<f32> {
        self.bin.read_f32()
    }

    fn read_f64(&mut self) -> Result<f64> {
        self.bin.read_f64()
    }

    fn read_utf(&mut self) -> Result<String> {
        self.bin.read_utf(self.options.max_string_length())
    }
}
