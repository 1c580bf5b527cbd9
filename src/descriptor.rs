//! Class descriptors: the wire-side shape of an encoded type
//! (Protocol 4.3, 6.4.1 `newClassDesc`).
//!
//! Ein [`ClassDesc`] entsteht zweiphasig: Er wird leer angelegt und sofort
//! in die Handle-Tabelle eingetragen, erst danach werden Name, Felder und
//! die Superklassen-Kette gefuellt. Nur so koennen selbstreferenzielle
//! Descriptoren (Rueckwaerts-Referenz waehrend des eigenen Decodings)
//! aufgeloest werden. Daher die innere Mutabilitaet.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::constants::{
    SC_BLOCK_DATA, SC_ENUM, SC_EXTERNALIZABLE, SC_SERIALIZABLE, SC_WRITE_METHOD,
};
use crate::error::TypeFault;
use crate::registry::LocalClass;
use crate::{Error, Result};

/// The eight primitive field kinds and their wire widths (Protocol 6.4.2
/// `prim_typecode`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimKind {
    Bool,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
}

impl PrimKind {
    /// Maps a `prim_typecode` byte to the kind.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            b'Z' => Some(Self::Bool),
            b'B' => Some(Self::Byte),
            b'C' => Some(Self::Char),
            b'S' => Some(Self::Short),
            b'I' => Some(Self::Int),
            b'J' => Some(Self::Long),
            b'F' => Some(Self::Float),
            b'D' => Some(Self::Double),
            _ => None,
        }
    }

    /// Breite des Werts im zusammenhaengenden Primitive-Block.
    pub fn width(self) -> usize {
        match self {
            Self::Bool | Self::Byte => 1,
            Self::Char | Self::Short => 2,
            Self::Int | Self::Float => 4,
            Self::Long | Self::Double => 8,
        }
    }
}

/// Wire kind of one field: fixed-width primitive or reference.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    /// Primitive mit fester Breite.
    Prim(PrimKind),
    /// Referenzfeld mit JVM-Signatur (`Lcom/example/Foo;` oder `[I`).
    Ref(Rc<str>),
}

/// One field of a wire descriptor, in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDesc {
    name: Rc<str>,
    kind: FieldKind,
}

impl FieldDesc {
    pub(crate) fn new(name: Rc<str>, kind: FieldKind) -> Self {
        Self { name, kind }
    }

    pub fn name(&self) -> &Rc<str> {
        &self.name
    }

    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }
}

/// Descriptor flag byte (Protocol 6.4.2 `classDescFlags`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DescFlags(u8);

impl DescFlags {
    pub fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    /// Klasse schreibt eigene Daten hinter den Feldern (`writeObject`).
    pub fn has_write_method(self) -> bool {
        self.0 & SC_WRITE_METHOD != 0
    }

    pub fn is_serializable(self) -> bool {
        self.0 & SC_SERIALIZABLE != 0
    }

    pub fn is_externalizable(self) -> bool {
        self.0 & SC_EXTERNALIZABLE != 0
    }

    /// Externe Daten sind in Block-Chunks gerahmt (Stream-Version 2).
    pub fn has_block_external_data(self) -> bool {
        self.0 & SC_BLOCK_DATA != 0
    }

    pub fn is_enum(self) -> bool {
        self.0 & SC_ENUM != 0
    }

    /// Validates the flag combination rules of the original reader
    /// (Protocol 4.3).
    pub fn validate(self, name: &str, suid: i64) -> Result<()> {
        if self.is_externalizable() && self.is_serializable() {
            return Err(Error::invalid_class(
                name,
                "serializable and externalizable flags conflict",
            ));
        }
        if self.is_enum() && suid != 0 {
            return Err(Error::invalid_class(
                name,
                format!("enum descriptor has non-zero serialVersionUID: {suid}"),
            ));
        }
        Ok(())
    }
}

/// Element kind of an array descriptor, derived from the name signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    /// Primitive Elemente: ein Bulk-Read fuellt das ganze Array.
    Prim(PrimKind),
    /// Referenz-Elemente: jedes Element ist ein eigener Record.
    Ref,
}

/// Parses an array signature (`[I`, `[Ljava.lang.String;`, `[[D`, ...).
pub fn element_kind(name: &str) -> Option<ElementKind> {
    let rest = name.strip_prefix('[')?;
    let first = rest.bytes().next()?;
    match first {
        b'L' | b'[' => Some(ElementKind::Ref),
        code => PrimKind::from_code(code).map(ElementKind::Prim),
    }
}

/// Positional match of one wire field against the resolved local type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FieldMatch {
    /// Feld existiert lokal mit gleichem Namen und gleicher Art.
    pub(crate) matched: bool,
    /// Lokales Feld verlangt einen unshared Read.
    pub(crate) unshared: bool,
}

#[derive(Default)]
struct Inner {
    name: Rc<str>,
    suid: i64,
    flags: DescFlags,
    fields: Vec<FieldDesc>,
    /// Pro Wire-Feld der Match gegen den lokalen Typ (positional,
    /// einmal beim Init berechnet).
    field_match: Vec<FieldMatch>,
    super_desc: Option<Rc<ClassDesc>>,
    /// `Some` markiert einen Proxy-Descriptor.
    interfaces: Option<Vec<Rc<str>>>,
    local: Option<Rc<LocalClass>>,
    fault: Option<Rc<TypeFault>>,
    ready: bool,
}

/// A decoded type descriptor, possibly resolved to a local type.
pub struct ClassDesc {
    inner: RefCell<Inner>,
}

impl ClassDesc {
    /// Legt einen leeren Descriptor an (Phase 1; Handle-Zuweisung vor dem
    /// Fuellen).
    pub(crate) fn pending() -> Rc<Self> {
        Rc::new(Self {
            inner: RefCell::new(Inner::default()),
        })
    }

    /// Fuellt einen plain Descriptor (Phase 2).
    ///
    /// Prueft die Superkette auf Zirkularitaet: eine Rueckwaerts-Referenz
    /// des eigenen (noch pending) Descriptors als Vorfahre wuerde jede
    /// spaetere Ketten-Traversierung endlos machen.
    pub(crate) fn init_plain(
        self: &Rc<Self>,
        name: Rc<str>,
        suid: i64,
        flags: DescFlags,
        fields: Vec<FieldDesc>,
        local: Option<Rc<LocalClass>>,
        fault: Option<Rc<TypeFault>>,
        super_desc: Option<Rc<ClassDesc>>,
    ) -> Result<()> {
        self.check_super_cycle(&name, super_desc.as_ref())?;
        let field_match = match_fields(&fields, local.as_deref());
        let mut inner = self.inner.borrow_mut();
        inner.name = name;
        inner.suid = suid;
        inner.flags = flags;
        inner.fields = fields;
        inner.field_match = field_match;
        inner.local = local;
        inner.fault = fault;
        inner.super_desc = super_desc;
        inner.ready = true;
        Ok(())
    }

    /// Fuellt einen Proxy-Descriptor (Phase 2). Proxys haben keine Felder
    /// und verhalten sich wie serialisierbare Klassen ohne eigene Daten.
    pub(crate) fn init_proxy(
        self: &Rc<Self>,
        interfaces: Vec<Rc<str>>,
        local: Option<Rc<LocalClass>>,
        fault: Option<Rc<TypeFault>>,
        super_desc: Option<Rc<ClassDesc>>,
    ) -> Result<()> {
        let name: Rc<str> = format!("proxy[{}]", interfaces.join(", ")).into();
        self.check_super_cycle(&name, super_desc.as_ref())?;
        let mut inner = self.inner.borrow_mut();
        inner.name = name;
        inner.flags = DescFlags::from_bits(SC_SERIALIZABLE);
        inner.interfaces = Some(interfaces);
        inner.local = local;
        inner.fault = fault;
        inner.super_desc = super_desc;
        inner.ready = true;
        Ok(())
    }

    fn check_super_cycle(self: &Rc<Self>, name: &str, super_desc: Option<&Rc<ClassDesc>>) -> Result<()> {
        let mut cursor = super_desc.cloned();
        while let Some(d) = cursor {
            if Rc::ptr_eq(&d, self) {
                return Err(Error::invalid_class(name, "circular class descriptor chain"));
            }
            cursor = d.super_desc();
        }
        Ok(())
    }

    pub fn name(&self) -> Rc<str> {
        Rc::clone(&self.inner.borrow().name)
    }

    pub fn suid(&self) -> i64 {
        self.inner.borrow().suid
    }

    pub fn flags(&self) -> DescFlags {
        self.inner.borrow().flags
    }

    /// Felder in Deklarationsreihenfolge (Wire-Layout).
    pub fn fields(&self) -> Vec<FieldDesc> {
        self.inner.borrow().fields.clone()
    }

    pub(crate) fn field_match(&self, index: usize) -> FieldMatch {
        self.inner.borrow().field_match[index]
    }

    pub fn super_desc(&self) -> Option<Rc<ClassDesc>> {
        self.inner.borrow().super_desc.clone()
    }

    pub fn is_proxy(&self) -> bool {
        self.inner.borrow().interfaces.is_some()
    }

    /// Interface-Namen eines Proxy-Descriptors.
    pub fn interfaces(&self) -> Option<Vec<Rc<str>>> {
        self.inner.borrow().interfaces.clone()
    }

    /// Aufgeloester lokaler Typ, `None` bei aufgezeichnetem Fault.
    pub fn local(&self) -> Option<Rc<LocalClass>> {
        self.inner.borrow().local.clone()
    }

    /// Type-resolution fault of this level alone.
    pub fn resolve_fault(&self) -> Option<Rc<TypeFault>> {
        self.inner.borrow().fault.clone()
    }

    /// First fault anywhere along the descriptor chain.
    ///
    /// Ein Objekt haengt von seiner gesamten Kette ab; ein nicht
    /// aufloesbarer Vorfahre vergiftet es genauso wie die eigene Ebene.
    pub fn chain_fault(self: &Rc<Self>) -> Option<Rc<TypeFault>> {
        self.chain()
            .iter()
            .find_map(|d| d.resolve_fault())
    }

    /// Descriptor chain, oldest ancestor first (wire layout order of the
    /// field data).
    pub fn chain(self: &Rc<Self>) -> Vec<Rc<ClassDesc>> {
        let mut chain = Vec::new();
        let mut cursor = Some(Rc::clone(self));
        while let Some(d) = cursor {
            cursor = d.super_desc();
            chain.push(d);
        }
        chain.reverse();
        chain
    }

    /// Gesamtbreite des zusammenhaengenden Primitive-Blocks dieser Ebene.
    pub fn prim_data_size(&self) -> usize {
        self.inner
            .borrow()
            .fields
            .iter()
            .map(|f| match f.kind() {
                FieldKind::Prim(p) => p.width(),
                FieldKind::Ref(_) => 0,
            })
            .sum()
    }

    /// Element kind when this descriptor names an array type.
    pub fn element_kind(&self) -> Option<ElementKind> {
        element_kind(&self.inner.borrow().name)
    }

    pub fn is_enum(&self) -> bool {
        self.flags().is_enum()
    }

    pub fn is_externalizable(&self) -> bool {
        self.flags().is_externalizable()
    }

    /// Ebene schreibt eigene Daten hinter den Feldwerten, die bis zum
    /// End-Marker uebersprungen werden muessen.
    pub fn has_write_data(&self) -> bool {
        self.flags().has_write_method()
    }

    pub fn has_block_external_data(&self) -> bool {
        self.flags().has_block_external_data()
    }
}

/// Berechnet die positionale Feld-Zuordnung Wire → Lokal (einmal pro
/// Descriptor, danach nur noch Index-Zugriffe).
fn match_fields(fields: &[FieldDesc], local: Option<&LocalClass>) -> Vec<FieldMatch> {
    fields
        .iter()
        .map(|f| match local {
            Some(local) => local.match_field(f),
            None => FieldMatch {
                matched: false,
                unshared: false,
            },
        })
        .collect()
}

impl fmt::Debug for ClassDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        if inner.ready {
            write!(f, "ClassDesc({})", inner.name)
        } else {
            write!(f, "ClassDesc(<pending>)")
        }
    }
}
