//! Handle table: entity identities and fault propagation (Protocol 6.2
//! `newHandle`, 6.4.1 `prevObject`).
//!
//! Jede decodierte Entity (Objekt, Array, String, Descriptor, Enum-
//! Konstante) bekommt in dem Moment ein Handle zugewiesen, in dem ihre
//! Identitaet feststeht — vor dem Fuellen ihres Inhalts. Nur so koennen
//! Rueckwaerts-Referenzen auf die gerade entstehende Entity aufgeloest
//! werden (Zyklen).
//!
//! Eintraege durchlaufen drei Zustaende: *pending* (zugewiesen, Inhalt
//! unvollstaendig), *resolved* und *faulted*. Faults propagieren eifrig
//! und transitiv ueber aufgezeichnete Abhaengigkeitskanten; ein bereits
//! faulted Handle ist dabei ein No-op-Ziel, daher terminiert die
//! Propagation auch auf Zyklen.
//!
//! Lifecycle: eine Tabelle pro Decode-Session; `clear` setzt sie fuer die
//! naechste Session am selben Stream zurueck.

use std::rc::Rc;

use crate::error::TypeFault;
use crate::value::Value;

/// Entity identity within one decode session.
///
/// Handles werden lueckenlos aufsteigend ab 0 vergeben und innerhalb
/// einer Session nie wiederverwendet.
pub type Handle = usize;

/// Inhalt eines Tabellen-Slots.
#[derive(Debug, Clone)]
pub(crate) enum Slot {
    /// Regulaerer Wert (auch provisorisch waehrend *pending*).
    Value(Value),
    /// Markierung fuer eine unshared gelesene Entity: darf nie ueber eine
    /// Rueckwaerts-Referenz wieder herausgegeben werden.
    Unshared,
    /// Aufgezeichneter Typaufloesungs-Fehler.
    Fault(Rc<TypeFault>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    /// Zugewiesen, Inhalt noch nicht abgeschlossen (*pending*).
    Unknown,
    /// Abgeschlossen (*resolved*).
    Ok,
    /// Faulted; der Slot haelt den [`TypeFault`].
    Fault,
}

/// Append-only table of decoded entities keyed by [`Handle`].
#[derive(Default)]
pub(crate) struct HandleTable {
    status: Vec<Status>,
    entries: Vec<Slot>,
    /// Abhaengigkeitskanten: `deps[target]` = Handles, die auf `target`
    /// warten und dessen Fault erben muessen.
    deps: Vec<Vec<Handle>>,
    /// Kleinstes Handle mit offenen Abhaengigkeiten (Watermark fuer
    /// `finish`).
    low_dep: Option<Handle>,
}

impl HandleTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Assigns the next handle to `slot`, in strict issuance order.
    pub(crate) fn assign(&mut self, slot: Slot) -> Handle {
        let handle = self.entries.len();
        self.status.push(Status::Unknown);
        self.entries.push(slot);
        self.deps.push(Vec::new());
        handle
    }

    /// Records that `dependent` must inherit a later fault of `target`.
    ///
    /// Kanten sind nur fuer *pending* Ziele noetig: ein *resolved* Ziel
    /// kann nicht mehr faulten, ein bereits faulted Ziel vergiftet den
    /// Abhaengigen sofort.
    pub(crate) fn record_dependency(&mut self, dependent: Option<Handle>, target: Option<Handle>) {
        let (Some(dependent), Some(target)) = (dependent, target) else {
            return;
        };
        match self.status[dependent] {
            Status::Unknown => match self.status[target] {
                Status::Ok => {}
                Status::Fault => {
                    let fault = self.fault(Some(target)).expect("faulted slot holds fault");
                    self.mark_fault(dependent, fault);
                }
                Status::Unknown => {
                    self.deps[target].push(dependent);
                    if self.low_dep.is_none_or(|low| low > target) {
                        self.low_dep = Some(target);
                    }
                }
            },
            Status::Fault => {}
            Status::Ok => debug_assert!(false, "dependency recorded for resolved handle"),
        }
    }

    /// Marks `handle` as faulted and eagerly propagates to all recorded
    /// dependents. Ein bereits faulted Handle bleibt unveraendert (der
    /// erste Fault ist permanent).
    pub(crate) fn mark_fault(&mut self, handle: Handle, fault: Rc<TypeFault>) {
        // Iterativ statt rekursiv: Abhaengigkeitsketten koennen aus
        // feindlichen Streams beliebig tief werden.
        let mut work = vec![handle];
        while let Some(h) = work.pop() {
            match self.status[h] {
                Status::Unknown => {
                    self.status[h] = Status::Fault;
                    self.entries[h] = Slot::Fault(Rc::clone(&fault));
                    work.append(&mut self.deps[h]);
                }
                Status::Fault => {}
                Status::Ok => debug_assert!(false, "fault for resolved handle {h}"),
            }
        }
    }

    /// Promotes *pending* entries to *resolved*, matching the depth-first
    /// completion order of the decode tree.
    ///
    /// Ohne offene Abhaengigkeiten wird nur `handle` selbst
    /// abgeschlossen; liegen alle offenen Abhaengigkeiten bei `handle`
    /// oder dahinter, wird bis zum Tabellenende abgeschlossen; liegt eine
    /// davor, darf noch nichts abgeschlossen werden.
    pub(crate) fn finish(&mut self, handle: Handle) {
        let end = match self.low_dep {
            None => handle + 1,
            Some(low) if low >= handle => {
                self.low_dep = None;
                self.entries.len()
            }
            Some(_) => return,
        };
        for h in handle..end {
            match self.status[h] {
                Status::Unknown => {
                    self.status[h] = Status::Ok;
                    self.deps[h].clear();
                }
                Status::Ok | Status::Fault => {}
            }
        }
    }

    /// Replaces the value of a live handle. Ein Fault wird nie
    /// ueberschrieben.
    pub(crate) fn set_value(&mut self, handle: Handle, value: Value) {
        match self.status[handle] {
            Status::Unknown | Status::Ok => self.entries[handle] = Slot::Value(value),
            Status::Fault => {}
        }
    }

    /// Slot-Inhalt fuer `handle`.
    pub(crate) fn slot(&self, handle: Handle) -> &Slot {
        &self.entries[handle]
    }

    /// Recorded fault for `handle`, `None` for live handles (und fuer
    /// "kein Handle").
    pub(crate) fn fault(&self, handle: Option<Handle>) -> Option<Rc<TypeFault>> {
        let handle = handle?;
        match &self.entries[handle] {
            Slot::Fault(f) if self.status[handle] == Status::Fault => Some(Rc::clone(f)),
            _ => None,
        }
    }

    /// Number of handles issued so far.
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resets the table for the next session on the same stream.
    pub(crate) fn clear(&mut self) {
        self.status.clear();
        self.entries.clear();
        self.deps.clear();
        self.low_dep = None;
    }
}
