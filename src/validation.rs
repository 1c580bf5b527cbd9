//! Deferred validation queue (Protocol 3.4 `registerValidation`).
//!
//! Callbacks werden waehrend des Decodings eines Graphen registriert
//! (nur bei Rekursionstiefe > 0) und erst nach Rueckkehr des aeussersten
//! Decode-Aufrufs ausgefuehrt: absteigend nach Prioritaet, bei gleicher
//! Prioritaet in Registrierungsreihenfolge. Der erste fehlschlagende
//! Callback bricht den Rest ab; die Queue ist danach in jedem Fall leer.

use crate::Result;

/// Deferred integrity check over the fully decoded graph.
pub type ValidationCallback = Box<dyn FnOnce() -> Result<()>>;

struct Entry {
    priority: i32,
    callback: ValidationCallback,
}

/// Priority-ordered list of deferred callbacks.
#[derive(Default)]
pub(crate) struct ValidationList {
    entries: Vec<Entry>,
}

impl ValidationList {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Registers a callback; higher priorities run first.
    ///
    /// Einsortierung hinter alle Eintraege mit Prioritaet >= `priority`,
    /// damit Gleichstaende in Registrierungsreihenfolge laufen.
    pub(crate) fn register(&mut self, priority: i32, callback: ValidationCallback) {
        let pos = self
            .entries
            .iter()
            .position(|e| e.priority < priority)
            .unwrap_or(self.entries.len());
        self.entries.insert(pos, Entry { priority, callback });
    }

    /// Runs all callbacks in order. Der erste Fehler wird durchgereicht,
    /// die restlichen Callbacks verfallen; die Queue ist danach leer.
    pub(crate) fn run(&mut self) -> Result<()> {
        let entries = std::mem::take(&mut self.entries);
        for entry in entries {
            (entry.callback)()?;
        }
        Ok(())
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn recorder(log: &Rc<RefCell<Vec<i32>>>, id: i32) -> ValidationCallback {
        let log = Rc::clone(log);
        Box::new(move || {
            log.borrow_mut().push(id);
            Ok(())
        })
    }

    /// Hoehere Prioritaet laeuft zuerst.
    #[test]
    fn descending_priority_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut list = ValidationList::new();
        list.register(1, recorder(&log, 1));
        list.register(10, recorder(&log, 10));
        list.register(5, recorder(&log, 5));
        list.run().unwrap();
        assert_eq!(*log.borrow(), vec![10, 5, 1]);
    }

    /// Gleichstaende laufen in Registrierungsreihenfolge.
    #[test]
    fn ties_run_in_registration_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut list = ValidationList::new();
        list.register(0, recorder(&log, 1));
        list.register(0, recorder(&log, 2));
        list.register(0, recorder(&log, 3));
        list.run().unwrap();
        assert_eq!(*log.borrow(), vec![1, 2, 3]);
    }

    /// Negative Prioritaeten sind erlaubt und laufen zuletzt.
    #[test]
    fn negative_priorities_run_last() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut list = ValidationList::new();
        list.register(-5, recorder(&log, -5));
        list.register(0, recorder(&log, 0));
        list.run().unwrap();
        assert_eq!(*log.borrow(), vec![0, -5]);
    }

    /// Der erste Fehler bricht den Rest ab; die Queue ist danach leer.
    #[test]
    fn first_failure_aborts_rest_and_clears() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut list = ValidationList::new();
        list.register(2, recorder(&log, 2));
        list.register(1, Box::new(|| Err(Error::validation_failed("broken link"))));
        list.register(0, recorder(&log, 0));
        let err = list.run().unwrap_err();
        assert!(matches!(err, Error::ValidationFailed(_)));
        assert_eq!(*log.borrow(), vec![2]);
        assert!(list.is_empty());
    }

    #[test]
    fn run_clears_on_success() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut list = ValidationList::new();
        list.register(0, recorder(&log, 0));
        list.run().unwrap();
        assert!(list.is_empty());
        // Ein zweiter Lauf ist ein No-op
        list.run().unwrap();
        assert_eq!(*log.borrow(), vec![0]);
    }

    #[test]
    fn clear_drops_callbacks() {
        let mut list = ValidationList::new();
        list.register(0, Box::new(|| Ok(())));
        assert_eq!(list.len(), 1);
        list.clear();
        assert!(list.is_empty());
    }
}
