//! Rendering decoded graphs as JSON (fuer das CLI und Debugging).
//!
//! Graphen koennen Zyklen enthalten; jeder Objekt-/Array-Knoten wird
//! deshalb nur einmal ausgeschrieben und bei Wiederbesuch als
//! `{"$ref": handle}` referenziert. Die Handle-Nummern stammen aus der
//! Decode-Session und machen geteilte Identitaet im Dump sichtbar.

use serde_json::{Map, Number, json};

use crate::FastHashMap;
use crate::value::{ArrayElems, Value};

/// Renders a decoded value as JSON.
pub fn to_json(value: &Value) -> serde_json::Value {
    let mut seen = FastHashMap::default();
    render(value, &mut seen)
}

/// Gleitkommawerte, die JSON nicht darstellen kann (NaN, Infinity),
/// werden als String ausgegeben statt verworfen.
fn float_json(v: f64) -> serde_json::Value {
    match Number::from_f64(v) {
        Some(n) => serde_json::Value::Number(n),
        None => serde_json::Value::String(format!("{v}")),
    }
}

fn render(value: &Value, seen: &mut FastHashMap<usize, ()>) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(v) => json!(v),
        Value::Byte(v) => json!(v),
        Value::Char(v) => match char::from_u32(u32::from(*v)) {
            Some(c) => json!(c.to_string()),
            // Ungepaartes Surrogat: numerisch ausgeben
            None => json!(v),
        },
        Value::Short(v) => json!(v),
        Value::Int(v) => json!(v),
        Value::Long(v) => json!(v),
        Value::Float(v) => float_json(f64::from(*v)),
        Value::Double(v) => float_json(*v),
        Value::Str(s) => json!(&**s),
        Value::Class(desc) => json!({ "@class": &*desc.name() }),
        Value::Descriptor(desc) => json!({ "@classdesc": &*desc.name() }),
        Value::Enum(e) => json!({
            "@enum": &*e.class_name(),
            "name": &**e.name(),
        }),
        Value::Object(obj) => {
            if seen.insert(obj.handle(), ()).is_some() {
                return json!({ "$ref": obj.handle() });
            }
            let mut map = Map::new();
            map.insert("@class".into(), json!(&*obj.class_name()));
            map.insert("@handle".into(), json!(obj.handle()));
            for name in obj.field_names() {
                if let Some(field) = obj.field(&name) {
                    map.insert((*name).to_string(), render(&field, seen));
                }
            }
            serde_json::Value::Object(map)
        }
        Value::Array(arr) => {
            if seen.insert(arr.handle(), ()).is_some() {
                return json!({ "$ref": arr.handle() });
            }
            let elements: Vec<serde_json::Value> = match &*arr.elements() {
                ArrayElems::Bools(v) => v.iter().map(|b| json!(b)).collect(),
                ArrayElems::Bytes(v) => v.iter().map(|b| json!(b)).collect(),
                ArrayElems::Chars(v) => v.iter().map(|c| json!(c)).collect(),
                ArrayElems::Shorts(v) => v.iter().map(|s| json!(s)).collect(),
                ArrayElems::Ints(v) => v.iter().map(|i| json!(i)).collect(),
                ArrayElems::Longs(v) => v.iter().map(|l| json!(l)).collect(),
                ArrayElems::Floats(v) => {
                    v.iter().map(|f| float_json(f64::from(*f))).collect()
                }
                ArrayElems::Doubles(v) => v.iter().map(|d| float_json(*d)).collect(),
                ArrayElems::Refs(v) => v.iter().map(|e| render(e, seen)).collect(),
            };
            json!({
                "@class": &*arr.class_name(),
                "@handle": arr.handle(),
                "elements": serde_json::Value::Array(elements),
            })
        }
    }
}
