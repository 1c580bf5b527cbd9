//! Local type registry: the decoder's external type-descriptor source.
//!
//! Der Decoder selbst kennt keine konkreten Typen. Was ein Wire-Descriptor
//! lokal bedeutet — welche Felder uebernommen werden, ob ein Custom-Hook
//! das Decoding uebernimmt, welche Enum-Konstanten existieren — liefert
//! ein [`ClassResolver`]. Schlaegt die Aufloesung fehl, wird das als
//! [`TypeFault`](crate::error::TypeFault) am Descriptor-Handle vermerkt
//! und vergiftet nur dessen Abhaengige, nie den Rest des Streams.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::FastHashMap;
use crate::decoder::StreamInput;
use crate::descriptor::{FieldDesc, FieldKind, FieldMatch, PrimKind};
use crate::value::ObjectValue;
use crate::Result;

/// Custom decode hook: uebernimmt das Feld-Decoding eines Objekts anstelle
/// des Standard-Feldfuellens (`readObject`-Analogon).
///
/// Der Hook liest ueber [`StreamInput`] aus dem Block-Modus und traegt
/// Ergebnisse in das uebergebene, noch unfertige Objekt ein. Nicht
/// konsumierte Custom-Daten werden nach der Rueckkehr transparent bis zum
/// End-Marker uebersprungen.
pub type ReadHook = Rc<dyn Fn(&mut dyn StreamInput, &Rc<ObjectValue>) -> Result<()>>;

/// Field kind expected by a local type; `Ref(None)` matches any reference
/// signature.
#[derive(Debug, Clone, PartialEq)]
pub enum LocalFieldKind {
    Prim(PrimKind),
    Ref(Option<Rc<str>>),
}

impl LocalFieldKind {
    fn matches(&self, kind: &FieldKind) -> bool {
        match (self, kind) {
            (Self::Prim(a), FieldKind::Prim(b)) => a == b,
            (Self::Ref(None), FieldKind::Ref(_)) => true,
            (Self::Ref(Some(sig)), FieldKind::Ref(wire)) => &**sig == &**wire,
            _ => false,
        }
    }
}

/// One declared field of a local type.
#[derive(Debug, Clone)]
pub struct LocalField {
    name: Rc<str>,
    kind: LocalFieldKind,
    unshared: bool,
}

/// A local type a wire descriptor can resolve to.
///
/// Drei Spielarten: `record` uebernimmt jedes Stream-Feld, `new` nur die
/// deklarierten (Rest wird gelesen und verworfen — Feld-Matching nach Name
/// und Art), `enumeration` beschreibt einen Enum-Typ mit bekannter
/// Konstantenmenge.
pub struct LocalClass {
    name: Rc<str>,
    /// `None` = jedes Stream-Feld uebernehmen.
    fields: Option<Vec<LocalField>>,
    read_hook: Option<ReadHook>,
    /// `Some` = Enum-Typ; nur gelistete Konstanten sind gueltig.
    enum_constants: Option<Vec<Rc<str>>>,
}

impl LocalClass {
    /// Accept-all type: every stream field is kept as decoded.
    pub fn record(name: &str) -> Self {
        Self {
            name: name.into(),
            fields: None,
            read_hook: None,
            enum_constants: None,
        }
    }

    /// Declared-fields type: only fields added via
    /// [`with_field`](Self::with_field) are kept.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.into(),
            fields: Some(Vec::new()),
            read_hook: None,
            enum_constants: None,
        }
    }

    /// Enum type with a fixed constant set.
    pub fn enumeration<'a>(name: &str, constants: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            name: name.into(),
            fields: Some(Vec::new()),
            read_hook: None,
            enum_constants: Some(constants.into_iter().map(Into::into).collect()),
        }
    }

    /// Declares a field matched by name and kind.
    pub fn with_field(mut self, name: &str, kind: LocalFieldKind) -> Self {
        self.push_field(name, kind, false);
        self
    }

    /// Declares a field whose value must be read unshared.
    pub fn with_unshared_field(mut self, name: &str, kind: LocalFieldKind) -> Self {
        self.push_field(name, kind, true);
        self
    }

    fn push_field(&mut self, name: &str, kind: LocalFieldKind, unshared: bool) {
        self.fields.get_or_insert_default().push(LocalField {
            name: name.into(),
            kind,
            unshared,
        });
    }

    /// Installs a custom decode hook for this type.
    pub fn with_read_hook(
        mut self,
        hook: impl Fn(&mut dyn StreamInput, &Rc<ObjectValue>) -> Result<()> + 'static,
    ) -> Self {
        self.read_hook = Some(Rc::new(hook));
        self
    }

    pub fn name(&self) -> &Rc<str> {
        &self.name
    }

    pub(crate) fn read_hook(&self) -> Option<ReadHook> {
        self.read_hook.clone()
    }

    /// True wenn der Typ als Enum deklariert wurde.
    pub fn is_enum_type(&self) -> bool {
        self.enum_constants.is_some()
    }

    /// Prueft einen Konstantennamen gegen die deklarierte Menge. Typen
    /// ohne Konstantenmenge akzeptieren jeden Namen.
    pub fn has_constant(&self, name: &str) -> bool {
        match &self.enum_constants {
            Some(list) => list.iter().any(|c| &**c == name),
            None => true,
        }
    }

    /// Matcht ein Wire-Feld nach Name und Art gegen die Deklarationen.
    pub(crate) fn match_field(&self, field: &FieldDesc) -> FieldMatch {
        match &self.fields {
            None => FieldMatch {
                matched: true,
                unshared: false,
            },
            Some(fields) => fields
                .iter()
                .find(|lf| lf.name == *field.name() && lf.kind.matches(field.kind()))
                .map_or(
                    FieldMatch {
                        matched: false,
                        unshared: false,
                    },
                    |lf| FieldMatch {
                        matched: true,
                        unshared: lf.unshared,
                    },
                ),
        }
    }
}

impl fmt::Debug for LocalClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalClass")
            .field("name", &self.name)
            .field("fields", &self.fields)
            .field("enum_constants", &self.enum_constants)
            .field("has_read_hook", &self.read_hook.is_some())
            .finish()
    }
}

/// External type-descriptor source consulted once per wire descriptor.
pub trait ClassResolver {
    /// Loest einen Klassennamen auf; `None` wird als Typ-Fault am
    /// Descriptor-Handle vermerkt.
    fn resolve_class(&self, name: &str) -> Option<Rc<LocalClass>>;

    /// Loest eine Proxy-Interface-Menge auf.
    fn resolve_proxy(&self, _interfaces: &[Rc<str>]) -> Option<Rc<LocalClass>> {
        None
    }
}

/// Name-keyed registry of local types, with a side table for synthesized
/// entries.
///
/// Zwei Modi: `strict` loest nur registrierte Namen auf, `lenient`
/// synthetisiert fuer jeden unbekannten Namen einen Accept-all-Typ
/// (fuer Dump-Werkzeuge). Synthetisierte Eintraege werden in einer
/// expliziten Seitentabelle gecacht und sind einzeln invalidierbar.
pub struct TypeRegistry {
    registered: FastHashMap<Rc<str>, Rc<LocalClass>>,
    lenient: bool,
    synthesized: RefCell<FastHashMap<Rc<str>, Rc<LocalClass>>>,
}

impl TypeRegistry {
    /// Registry, die nur registrierte Namen aufloest.
    ///
    /// Das Enum-Geruest `java.lang.Enum` (Vorfahre jedes Enum-Descriptors
    /// auf dem Wire) ist vorregistriert, damit Enums nicht an ihrer
    /// Basisklasse scheitern.
    pub fn strict() -> Self {
        let mut registry = Self {
            registered: FastHashMap::default(),
            lenient: false,
            synthesized: RefCell::new(FastHashMap::default()),
        };
        registry.register(LocalClass::new("java.lang.Enum"));
        registry
    }

    /// Registry, die jeden Namen als Accept-all-Typ aufloest.
    pub fn lenient() -> Self {
        Self {
            registered: FastHashMap::default(),
            lenient: true,
            synthesized: RefCell::new(FastHashMap::default()),
        }
    }

    /// Registers a local type under its name; replaces any previous entry.
    pub fn register(&mut self, class: LocalClass) -> &mut Self {
        self.registered
            .insert(Rc::clone(&class.name), Rc::new(class));
        self
    }

    /// Entfernt einen Namen aus Registrierung und Seitentabelle.
    pub fn invalidate(&mut self, name: &str) {
        self.registered.remove(name);
        self.synthesized.borrow_mut().remove(name);
    }

    /// Leert die Seitentabelle der synthetisierten Typen.
    pub fn clear_synthesized(&self) {
        self.synthesized.borrow_mut().clear();
    }
}

impl ClassResolver for TypeRegistry {
    fn resolve_class(&self, name: &str) -> Option<Rc<LocalClass>> {
        if let Some(class) = self.registered.get(name) {
            return Some(Rc::clone(class));
        }
        if !self.lenient {
            return None;
        }
        let mut cache = self.synthesized.borrow_mut();
        if let Some(class) = cache.get(name) {
            return Some(Rc::clone(class));
        }
        let class = Rc::new(LocalClass::record(name));
        cache.insert(Rc::clone(&class.name), Rc::clone(&class));
        Some(class)
    }

    fn resolve_proxy(&self, interfaces: &[Rc<str>]) -> Option<Rc<LocalClass>> {
        if !self.lenient {
            return None;
        }
        let key: Rc<str> = format!("proxy[{}]", interfaces.join(", ")).into();
        let mut cache = self.synthesized.borrow_mut();
        if let Some(class) = cache.get(&*key) {
            return Some(Rc::clone(class));
        }
        let class = Rc::new(LocalClass::record(&key));
        cache.insert(key, Rc::clone(&class));
        Some(class)
    }
}
