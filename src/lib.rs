//! jodec – decoder for the Java Object Serialization stream protocol.
//!
//! Liest das Wire-Format von `java.io.ObjectOutputStream` (Magic `ACED`,
//! Version 5) und rekonstruiert beliebige, auch selbstreferenzielle
//! Objektgraphen aus einer linearen Byte-Quelle. Abschnittsverweise wie
//! "(Protocol 6.4.1)" meinen die Java Object Serialization Specification.
//!
//! Die Encoder-Seite des Protokolls ist bewusst nicht Teil dieser Crate.
//!
//! # Beispiel
//!
//! ```
//! use std::rc::Rc;
//! use jodec::{Decoder, LocalClass, LocalFieldKind, PrimKind, TypeRegistry, Value};
//!
//! // [header][new-object demo.Point{x:int}][x=3]
//! let data: &[u8] = &[
//!     0xAC, 0xED, 0x00, 0x05, // Stream-Header
//!     0x73, 0x72, // TC_OBJECT, TC_CLASSDESC
//!     0x00, 0x0A, b'd', b'e', b'm', b'o', b'.', b'P', b'o', b'i', b'n', b't',
//!     0, 0, 0, 0, 0, 0, 0, 1, // serialVersionUID
//!     0x02, // SC_SERIALIZABLE
//!     0x00, 0x01, // ein Feld
//!     b'I', 0x00, 0x01, b'x', // int x
//!     0x78, 0x70, // Annotation-Ende, kein Super-Descriptor
//!     0x00, 0x00, 0x00, 0x03, // x = 3
//! ];
//!
//! let mut registry = TypeRegistry::strict();
//! registry.register(LocalClass::new("demo.Point").with_field("x", LocalFieldKind::Prim(PrimKind::Int)));
//!
//! let mut dec = Decoder::new(data, Rc::new(registry)).unwrap();
//! let value = dec.read_object().unwrap();
//! let obj = value.as_object().unwrap();
//! assert!(matches!(obj.field("x"), Some(Value::Int(3))));
//! ```

pub mod constants;
pub mod decoder;
pub mod descriptor;
pub mod dump;
pub mod error;
pub mod handles;
pub mod mutf8;
pub mod options;
pub mod registry;
pub mod stream;
pub mod validation;
pub mod value;

#[cfg(test)]
pub(crate) mod testutil;

pub use error::{Error, Result, TypeFault};

/// HashMap mit ahash (schneller, nicht DoS-resistent — fuer interne
/// Datenstrukturen mit vertrauenswuerdigen Keys).
pub(crate) type FastHashMap<K, V> = hashbrown::HashMap<K, V, ahash::RandomState>;

/// IndexMap mit ahash (deterministische Iterationsreihenfolge fuer
/// Objektfelder).
pub(crate) type FastIndexMap<K, V> = indexmap::IndexMap<K, V, ahash::RandomState>;

// Public API: Decoder
pub use decoder::{Decoder, StreamInput};

// Public API: Optionen
pub use options::DecodeOptions;

// Public API: Werte
pub use value::{ArrayElems, ArrayValue, EnumValue, ObjectValue, Value};

// Public API: Descriptoren
pub use descriptor::{ClassDesc, DescFlags, ElementKind, FieldDesc, FieldKind, PrimKind};

// Public API: Registry
pub use registry::{ClassResolver, LocalClass, LocalField, LocalFieldKind, ReadHook, TypeRegistry};

// Public API: Handles und Validation
pub use handles::Handle;
pub use validation::ValidationCallback;

// Public API: Dump
pub use dump::to_json;
