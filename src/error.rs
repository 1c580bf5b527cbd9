//! Central error types for the serialization stream decoder.
//!
//! Each variant references the relevant section of the Java Object
//! Serialization Specification ("Protocol") where one applies.
//!
//! Es gibt zwei Fehlerklassen: Strukturfehler beenden die aktuelle
//! Decode-Session (der Stream ist nicht mehr synchronisierbar), waehrend
//! Typaufloesungs-Fehler als [`TypeFault`] pro Handle aufgezeichnet werden
//! und nur die davon abhaengigen Entities vergiften.

use core::fmt;
use std::borrow::Cow;
use std::rc::Rc;

/// All error conditions surfaced by the decoder.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// The first four stream bytes are not magic + version (Protocol 6.4.2).
    InvalidStreamHeader(u16, u16),
    /// A record tag outside `0x70..=0x7E`, or one that is illegal in the
    /// current context (Protocol 6.4.1).
    InvalidTypeCode(u8),
    /// The byte source ended before a complete record was decoded.
    PrematureEndOfStream,
    /// The byte source ended in the middle of a block data chunk.
    TruncatedBlockData,
    /// The byte source ended inside a block data chunk header.
    TruncatedBlockHeader,
    /// A long block data chunk announced a negative length (Protocol 6.4.1).
    IllegalBlockLength(i32),
    /// Block data chunk encountered outside of an "expect block data" context.
    UnexpectedBlockData,
    /// End-of-block-data marker encountered outside of an object.
    UnexpectedEndBlockData,
    /// Reset record while a graph decode was in progress (Protocol 6.4.1:
    /// reset is only legal between top-level records).
    UnexpectedReset,
    /// Wire handle outside the range issued so far. Der Wert ist die rohe
    /// Wire-Repraesentation (inklusive [`BASE_WIRE_HANDLE`]-Offset).
    ///
    /// [`BASE_WIRE_HANDLE`]: crate::constants::BASE_WIRE_HANDLE
    InvalidHandle(u32),
    /// An unshared read resolved to a back-reference.
    UnsharedBackReference,
    /// A back-reference resolved to a slot that was filled unshared.
    BackReferenceToUnshared,
    /// A back-reference or type string resolved to the wrong entity kind,
    /// or a record that requires a descriptor carried a null one.
    UnexpectedEntity {
        /// Beschreibung der erwarteten Entity-Art.
        expected: &'static str,
    },
    /// `read_object` was called while unconsumed custom block data remains
    /// for the current object.
    OptionalBlockData {
        /// Bytes des aktuellen Chunks, die der Hook noch nicht gelesen hat.
        remaining: usize,
    },
    /// `read_object` was called after the end of the current object's
    /// custom data.
    EndOfCustomData,
    /// The requested entity (or something it transitively depends on) has a
    /// recorded type-resolution fault.
    ClassNotFound(String),
    /// A class descriptor violates the protocol's flag or shape rules
    /// (Protocol 4.3, 6.4.2).
    InvalidClass {
        /// Name der betroffenen Klasse.
        name: String,
        /// Verletzte Regel.
        reason: Cow<'static, str>,
    },
    /// A decoded entity violates an object-level constraint, e.g. an enum
    /// constant that does not exist in the resolved type.
    InvalidObject(Cow<'static, str>),
    /// Externalizable data without block framing and without a read hook
    /// cannot be skipped; the stream is unresolvable from here on.
    ExternalDataNotReadable {
        /// Name der externalizable Klasse.
        name: String,
    },
    /// A field descriptor carries an unknown type code byte.
    InvalidFieldCode(u8),
    /// A count field (array length, proxy interface count) is negative.
    NegativeCount {
        /// Welche Laengenangabe betroffen ist.
        what: &'static str,
        /// Der decodierte Wert.
        count: i64,
    },
    /// Malformed modified-UTF-8 string body (Protocol 6.2 `readUTF`).
    MalformedUtf,
    /// The writer recorded a fault while producing the stream; the rest of
    /// the original graph was aborted (Protocol 6.4.1 `exception`).
    WriteAborted {
        /// Klassenname des eingebetteten Fault-Objekts, falls decodierbar.
        class_name: Option<String>,
        /// `detailMessage` des Fault-Objekts, falls vorhanden.
        message: Option<String>,
    },
    /// Validation callback registered (or hook API used) outside of an
    /// active graph decode.
    NotActive(&'static str),
    /// A deferred validation callback rejected the decoded graph.
    ValidationFailed(Cow<'static, str>),
    /// A decoded string exceeds [`DecodeOptions::max_string_length`].
    ///
    /// [`DecodeOptions::max_string_length`]: crate::options::DecodeOptions::max_string_length
    StringLengthExceeded {
        /// Angekuendigte Laenge in Bytes.
        length: u64,
        /// Konfiguriertes Limit.
        max: u64,
    },
    /// An array exceeds [`DecodeOptions::max_array_length`].
    ///
    /// [`DecodeOptions::max_array_length`]: crate::options::DecodeOptions::max_array_length
    ArrayLengthExceeded {
        /// Angekuendigte Elementanzahl.
        length: u32,
        /// Konfiguriertes Limit.
        max: u32,
    },
    /// Recursion exceeded [`DecodeOptions::max_depth`].
    ///
    /// [`DecodeOptions::max_depth`]: crate::options::DecodeOptions::max_depth
    DepthLimitExceeded {
        /// Konfiguriertes Limit.
        max: usize,
    },
    /// An IO error from the underlying byte source.
    Io(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidStreamHeader(m0, m1) => {
                write!(f, "invalid stream header: {m0:04X}{m1:04X} (Protocol 6.4.2)")
            }
            Self::InvalidTypeCode(tc) => write!(f, "invalid type code: {tc:02X} (Protocol 6.4.1)"),
            Self::PrematureEndOfStream => write!(f, "premature end of stream"),
            Self::TruncatedBlockData => write!(f, "unexpected EOF in middle of data block"),
            Self::TruncatedBlockHeader => {
                write!(f, "unexpected EOF while reading block data header")
            }
            Self::IllegalBlockLength(len) => {
                write!(f, "illegal block data header length: {len} (Protocol 6.4.1)")
            }
            Self::UnexpectedBlockData => write!(f, "unexpected block data (Protocol 6.4.1)"),
            Self::UnexpectedEndBlockData => {
                write!(f, "unexpected end of block data (Protocol 6.4.1)")
            }
            Self::UnexpectedReset => write!(f, "unexpected reset record inside a graph decode"),
            Self::InvalidHandle(wire) => write!(f, "invalid handle value: {wire:08X}"),
            Self::UnsharedBackReference => {
                write!(f, "cannot read back reference as unshared")
            }
            Self::BackReferenceToUnshared => {
                write!(f, "cannot read back reference to unshared entity")
            }
            Self::UnexpectedEntity { expected } => {
                write!(f, "stream element is not a {expected}")
            }
            Self::OptionalBlockData { remaining } => {
                write!(f, "{remaining} bytes of custom block data not consumed")
            }
            Self::EndOfCustomData => write!(f, "no more custom data for the current object"),
            Self::ClassNotFound(name) => write!(f, "class not found: {name}"),
            Self::InvalidClass { name, reason } => {
                write!(f, "invalid class {name}: {reason}")
            }
            Self::InvalidObject(msg) => write!(f, "invalid object: {msg}"),
            Self::ExternalDataNotReadable { name } => {
                write!(
                    f,
                    "externalizable data for {name} is not block-framed and has no read hook"
                )
            }
            Self::InvalidFieldCode(tc) => {
                write!(f, "invalid field type code: {tc:02X} (Protocol 6.4.2)")
            }
            Self::NegativeCount { what, count } => write!(f, "negative {what}: {count}"),
            Self::MalformedUtf => write!(f, "malformed modified-UTF-8 string"),
            Self::WriteAborted { class_name, message } => {
                write!(f, "writing aborted by the remote writer")?;
                if let Some(cn) = class_name {
                    write!(f, ": {cn}")?;
                }
                if let Some(msg) = message {
                    write!(f, " ({msg})")?;
                }
                Ok(())
            }
            Self::NotActive(what) => write!(f, "{what}"),
            Self::ValidationFailed(msg) => write!(f, "object validation failed: {msg}"),
            Self::StringLengthExceeded { length, max } => {
                write!(f, "string length {length} exceeds maximum {max}")
            }
            Self::ArrayLengthExceeded { length, max } => {
                write!(f, "array length {length} exceeds maximum {max}")
            }
            Self::DepthLimitExceeded { max } => {
                write!(f, "recursion depth exceeds maximum {max}")
            }
            Self::Io(msg) => write!(f, "IO error: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl Error {
    /// Erstellt einen `InvalidClass` Fehler mit Kontext.
    pub fn invalid_class(name: impl Into<String>, reason: impl Into<Cow<'static, str>>) -> Self {
        Self::InvalidClass {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Erstellt einen `InvalidObject` Fehler mit Nachricht.
    pub fn invalid_object(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::InvalidObject(msg.into())
    }

    /// Erstellt einen `ValidationFailed` Fehler mit Nachricht.
    pub fn validation_failed(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::ValidationFailed(msg.into())
    }
}

/// A convenience `Result` type alias using [`Error`].
pub type Result<T> = core::result::Result<T, Error>;

/// A recorded type-resolution fault, scoped to one handle and its
/// transitive dependents.
///
/// Im Gegensatz zu [`Error`] bricht ein `TypeFault` die Session nicht ab:
/// er wird in der Handle-Tabelle vermerkt und erst dann zu einem
/// [`Error::ClassNotFound`], wenn der Aufrufer die betroffene Entity
/// tatsaechlich anfordert. Ein einmal aufgezeichneter Fault ist permanent.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeFault {
    class_name: Rc<str>,
    reason: Cow<'static, str>,
}

impl TypeFault {
    /// Fault fuer einen nicht aufloesbaren Klassennamen.
    pub fn class_not_found(name: &str) -> Rc<Self> {
        Rc::new(Self {
            class_name: name.into(),
            reason: Cow::Borrowed("no local type registered"),
        })
    }

    /// Fault fuer eine nicht aufloesbare Proxy-Interface-Menge.
    pub fn proxy_not_found(interfaces: &[Rc<str>]) -> Rc<Self> {
        Rc::new(Self {
            class_name: format!("proxy[{}]", interfaces.join(", ")).into(),
            reason: Cow::Borrowed("no local proxy type registered"),
        })
    }

    /// Fault fuer einen Array-Descriptor ohne gueltige Array-Signatur.
    pub fn not_an_array(name: &str) -> Rc<Self> {
        Rc::new(Self {
            class_name: name.into(),
            reason: Cow::Borrowed("descriptor name is not an array signature"),
        })
    }

    /// Name der betroffenen Klasse.
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// Begruendung der Aufzeichnung.
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

impl fmt::Display for TypeFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.class_name, self.reason)
    }
}

impl From<&TypeFault> for Error {
    fn from(fault: &TypeFault) -> Self {
        Self::ClassNotFound(fault.to_string())
    }
}
