//! Decoded entity graph (Protocol 6.2 "stream elements").
//!
//! Der Decoder materialisiert den Objektgraphen dynamisch: Objekte,
//! Arrays und Enum-Konstanten sind `Rc`-geteilte Knoten, damit
//! Rueckwaerts-Referenzen dieselbe Identitaet liefern wie im
//! urspruenglichen Graphen (auch bei Zyklen). Felder und Elemente sind
//! innerlich mutabel, weil ein Knoten sein Handle bekommt, *bevor* sein
//! Inhalt decodiert ist.

use std::cell::{Cell, Ref, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::FastIndexMap;
use crate::descriptor::{ClassDesc, ElementKind, PrimKind};
use crate::handles::Handle;

/// Platzhalter bis [`ObjectValue::set_handle`]/[`ArrayValue::set_handle`].
const UNASSIGNED: Handle = usize::MAX;

/// One decoded entity.
#[derive(Debug, Clone)]
pub enum Value {
    /// Null-Referenz; verbraucht kein Handle.
    Null,
    Bool(bool),
    Byte(i8),
    /// Ein UTF-16-Code-Unit (`char` des Originals).
    Char(u16),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Str(Rc<str>),
    Object(Rc<ObjectValue>),
    Array(Rc<ArrayValue>),
    Enum(Rc<EnumValue>),
    /// Klasse als Wert (`TC_CLASS`).
    Class(Rc<ClassDesc>),
    /// Descriptor als Wert (`TC_CLASSDESC` an Record-Position).
    Descriptor(Rc<ClassDesc>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Rc<ObjectValue>> {
        match self {
            Self::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Rc<ArrayValue>> {
        match self {
            Self::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Kurzname der Entity-Art (fuer Fehlermeldungen und Dumps).
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Byte(_) => "byte",
            Self::Char(_) => "char",
            Self::Short(_) => "short",
            Self::Int(_) => "int",
            Self::Long(_) => "long",
            Self::Float(_) => "float",
            Self::Double(_) => "double",
            Self::Str(_) => "string",
            Self::Object(_) => "object",
            Self::Array(_) => "array",
            Self::Enum(_) => "enum constant",
            Self::Class(_) => "class",
            Self::Descriptor(_) => "class descriptor",
        }
    }
}

/// A decoded composite object. Felder werden nach der Handle-Zuweisung
/// gefuellt; Namen aus tieferen Ebenen der Klassenkette ueberschreiben
/// gleichnamige aus Vorfahren.
pub struct ObjectValue {
    desc: Rc<ClassDesc>,
    handle: Cell<Handle>,
    fields: RefCell<FastIndexMap<Rc<str>, Value>>,
}

impl ObjectValue {
    pub(crate) fn pending(desc: Rc<ClassDesc>) -> Rc<Self> {
        Rc::new(Self {
            desc,
            handle: Cell::new(UNASSIGNED),
            fields: RefCell::new(FastIndexMap::default()),
        })
    }

    pub(crate) fn set_handle(&self, handle: Handle) {
        self.handle.set(handle);
    }

    /// Handle dieser Entity innerhalb der Decode-Session.
    pub fn handle(&self) -> Handle {
        self.handle.get()
    }

    pub fn class(&self) -> Rc<ClassDesc> {
        Rc::clone(&self.desc)
    }

    pub fn class_name(&self) -> Rc<str> {
        self.desc.name()
    }

    /// Traegt einen Feldwert ein (auch fuer Custom-Hooks gedacht).
    pub fn set_field(&self, name: Rc<str>, value: Value) {
        self.fields.borrow_mut().insert(name, value);
    }

    /// Feldwert nach Name, ueber alle Ebenen der Klassenkette.
    pub fn field(&self, name: &str) -> Option<Value> {
        self.fields.borrow().get(name).cloned()
    }

    /// Feldnamen in Eintragsreihenfolge.
    pub fn field_names(&self) -> Vec<Rc<str>> {
        self.fields.borrow().keys().cloned().collect()
    }

    pub fn field_count(&self) -> usize {
        self.fields.borrow().len()
    }
}

impl fmt::Debug for ObjectValue {
    // Flach: Felder koennen auf das Objekt selbst zurueckzeigen.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ObjectValue({}#{}, {} fields)",
            self.class_name(),
            self.handle.get(),
            self.field_count()
        )
    }
}

/// Elements of a decoded array: one homogeneous primitive run or a
/// reference list.
#[derive(Debug, Clone)]
pub enum ArrayElems {
    Bools(Vec<bool>),
    Bytes(Vec<i8>),
    Chars(Vec<u16>),
    Shorts(Vec<i16>),
    Ints(Vec<i32>),
    Longs(Vec<i64>),
    Floats(Vec<f32>),
    Doubles(Vec<f64>),
    Refs(Vec<Value>),
}

impl ArrayElems {
    fn empty_for(kind: Option<ElementKind>) -> Self {
        match kind {
            Some(ElementKind::Prim(PrimKind::Bool)) => Self::Bools(Vec::new()),
            Some(ElementKind::Prim(PrimKind::Byte)) => Self::Bytes(Vec::new()),
            Some(ElementKind::Prim(PrimKind::Char)) => Self::Chars(Vec::new()),
            Some(ElementKind::Prim(PrimKind::Short)) => Self::Shorts(Vec::new()),
            Some(ElementKind::Prim(PrimKind::Int)) => Self::Ints(Vec::new()),
            Some(ElementKind::Prim(PrimKind::Long)) => Self::Longs(Vec::new()),
            Some(ElementKind::Prim(PrimKind::Float)) => Self::Floats(Vec::new()),
            Some(ElementKind::Prim(PrimKind::Double)) => Self::Doubles(Vec::new()),
            // Referenz-Elemente oder unaufloesbare Signatur
            Some(ElementKind::Ref) | None => Self::Refs(Vec::new()),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Bools(v) => v.len(),
            Self::Bytes(v) => v.len(),
            Self::Chars(v) => v.len(),
            Self::Shorts(v) => v.len(),
            Self::Ints(v) => v.len(),
            Self::Longs(v) => v.len(),
            Self::Floats(v) => v.len(),
            Self::Doubles(v) => v.len(),
            Self::Refs(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A decoded fixed-size homogeneous array.
pub struct ArrayValue {
    desc: Rc<ClassDesc>,
    handle: Cell<Handle>,
    elems: RefCell<ArrayElems>,
}

impl ArrayValue {
    pub(crate) fn pending(desc: Rc<ClassDesc>, kind: Option<ElementKind>) -> Rc<Self> {
        Rc::new(Self {
            desc,
            handle: Cell::new(UNASSIGNED),
            elems: RefCell::new(ArrayElems::empty_for(kind)),
        })
    }

    pub(crate) fn set_handle(&self, handle: Handle) {
        self.handle.set(handle);
    }

    /// Haengt ein Referenz-Element an (inkrementell, Zyklus-faehig).
    pub(crate) fn push_ref(&self, value: Value) {
        match &mut *self.elems.borrow_mut() {
            ArrayElems::Refs(refs) => refs.push(value),
            _ => debug_assert!(false, "push_ref on primitive array"),
        }
    }

    /// Ersetzt die Elemente durch einen fertigen Bulk-Read.
    pub(crate) fn fill(&self, elems: ArrayElems) {
        *self.elems.borrow_mut() = elems;
    }

    pub fn handle(&self) -> Handle {
        self.handle.get()
    }

    pub fn class(&self) -> Rc<ClassDesc> {
        Rc::clone(&self.desc)
    }

    pub fn class_name(&self) -> Rc<str> {
        self.desc.name()
    }

    pub fn len(&self) -> usize {
        self.elems.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Borrowed view of the elements.
    pub fn elements(&self) -> Ref<'_, ArrayElems> {
        self.elems.borrow()
    }
}

impl fmt::Debug for ArrayValue {
    // Flach: Elemente koennen auf das Array selbst zurueckzeigen.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ArrayValue({}#{}, {} elements)",
            self.class_name(),
            self.handle.get(),
            self.len()
        )
    }
}

/// A decoded enum constant.
#[derive(Debug)]
pub struct EnumValue {
    desc: Rc<ClassDesc>,
    name: Rc<str>,
    handle: Handle,
}

impl EnumValue {
    pub(crate) fn new(desc: Rc<ClassDesc>, name: Rc<str>, handle: Handle) -> Rc<Self> {
        Rc::new(Self { desc, name, handle })
    }

    pub fn class(&self) -> Rc<ClassDesc> {
        Rc::clone(&self.desc)
    }

    pub fn class_name(&self) -> Rc<str> {
        self.desc.name()
    }

    /// Name der Konstante.
    pub fn name(&self) -> &Rc<str> {
        &self.name
    }

    pub fn handle(&self) -> Handle {
        self.handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::SC_SERIALIZABLE;
    use crate::descriptor::DescFlags;

    fn desc(name: &str) -> Rc<ClassDesc> {
        let d = ClassDesc::pending();
        d.init_plain(
            name.into(),
            0,
            DescFlags::from_bits(SC_SERIALIZABLE),
            vec![],
            None,
            None,
            None,
        )
        .unwrap();
        d
    }

    #[test]
    fn object_fields_fill_after_handle() {
        let obj = ObjectValue::pending(desc("demo.Node"));
        obj.set_handle(0);
        assert_eq!(obj.field_count(), 0);
        obj.set_field("x".into(), Value::Int(3));
        assert_eq!(obj.handle(), 0);
        assert!(matches!(obj.field("x"), Some(Value::Int(3))));
        assert!(obj.field("y").is_none());
    }

    /// Gleichnamige Felder tieferer Ebenen ueberschreiben Vorfahren.
    #[test]
    fn shadowed_field_keeps_most_derived_value() {
        let obj = ObjectValue::pending(desc("demo.Derived"));
        obj.set_field("v".into(), Value::Int(1));
        obj.set_field("v".into(), Value::Int(2));
        assert!(matches!(obj.field("v"), Some(Value::Int(2))));
        assert_eq!(obj.field_count(), 1);
    }

    /// Selbstreferenz: das Feld zeigt auf denselben Knoten.
    #[test]
    fn self_referential_field_shares_identity() {
        let obj = ObjectValue::pending(desc("demo.Node"));
        obj.set_handle(0);
        obj.set_field("next".into(), Value::Object(Rc::clone(&obj)));
        let Some(Value::Object(next)) = obj.field("next") else {
            panic!("next is not an object");
        };
        assert!(Rc::ptr_eq(&next, &obj));
        // Debug bleibt flach und terminiert auf dem Zyklus
        assert!(format!("{obj:?}").contains("demo.Node"));
    }

    #[test]
    fn array_elems_kinds() {
        let arr = ArrayValue::pending(desc("[I"), Some(ElementKind::Prim(PrimKind::Int)));
        arr.fill(ArrayElems::Ints(vec![1, 2, 3]));
        assert_eq!(arr.len(), 3);
        assert!(matches!(&*arr.elements(), ArrayElems::Ints(v) if v == &[1, 2, 3]));
    }

    #[test]
    fn ref_array_pushes_incrementally() {
        let arr = ArrayValue::pending(desc("[Ljava.lang.Object;"), Some(ElementKind::Ref));
        arr.set_handle(0);
        arr.push_ref(Value::Null);
        arr.push_ref(Value::Array(Rc::clone(&arr)));
        assert_eq!(arr.len(), 2);
        let elems = arr.elements();
        let ArrayElems::Refs(refs) = &*elems else {
            panic!("not a ref array");
        };
        assert!(matches!(refs[0], Value::Null));
        assert!(matches!(&refs[1], Value::Array(a) if Rc::ptr_eq(a, &arr)));
    }

    #[test]
    fn enum_value_accessors() {
        let e = EnumValue::new(desc("demo.Color"), "RED".into(), 4);
        assert_eq!(&**e.name(), "RED");
        assert_eq!(e.handle(), 4);
        assert_eq!(&*e.class_name(), "demo.Color");
    }

    #[test]
    fn kind_names() {
        assert_eq!(Value::Null.kind_name(), "null");
        assert_eq!(Value::Int(1).kind_name(), "int");
        assert_eq!(Value::Str("x".into()).kind_name(), "string");
    }
}
