//! Multicast listener registry used by every notification channel.
//!
//! A [`ListenerSet`] is a cheap-to-clone handle onto a shared list of
//! callbacks. Broadcasting never holds the interior borrow across a
//! callback invocation, so listeners may freely subscribe, unsubscribe
//! (including themselves), or trigger further broadcasts from inside a
//! broadcast. Removals requested while a broadcast is running are
//! deferred: the entry is tombstoned and swept once the outermost
//! broadcast completes, so no surviving listener is skipped or invoked
//! twice.

use std::cell::RefCell;
use std::rc::Rc;

use stowage_common::ListenerId;

type Callback<T> = Rc<dyn Fn(&T)>;

struct Entry<T> {
    id: ListenerId,
    callback: Option<Callback<T>>,
}

struct Inner<T> {
    entries: Vec<Entry<T>>,
    next_id: u64,
    depth: u32,
    has_tombstones: bool,
}

/// Shared multicast callback list.
///
/// Cloning the set yields another handle onto the same listeners.
pub struct ListenerSet<T> {
    inner: Rc<RefCell<Inner<T>>>,
}

impl<T: 'static> ListenerSet<T> {
    /// Creates an empty listener set.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                entries: Vec::new(),
                next_id: 0,
                depth: 0,
                has_tombstones: false,
            })),
        }
    }

    /// Subscribes a callback and returns its handle.
    ///
    /// A listener subscribed during a broadcast is visible to that
    /// broadcast.
    pub fn subscribe(&self, callback: impl Fn(&T) + 'static) -> ListenerId {
        let mut inner = self.inner.borrow_mut();
        let id = ListenerId::from_raw(inner.next_id);
        inner.next_id += 1;
        inner.entries.push(Entry {
            id,
            callback: Some(Rc::new(callback)),
        });
        id
    }

    /// Unsubscribes a listener by handle.
    ///
    /// During a broadcast the entry is only tombstoned; it is swept after
    /// the outermost broadcast finishes. Unknown handles are ignored.
    pub fn unsubscribe(&self, id: ListenerId) {
        let mut inner = self.inner.borrow_mut();
        if inner.depth > 0 {
            if let Some(entry) = inner.entries.iter_mut().find(|e| e.id == id) {
                entry.callback = None;
                inner.has_tombstones = true;
            }
        } else {
            inner.entries.retain(|e| e.id != id);
        }
    }

    /// Removes every listener.
    pub fn clear(&self) {
        let mut inner = self.inner.borrow_mut();
        if inner.depth > 0 {
            for entry in &mut inner.entries {
                entry.callback = None;
            }
            inner.has_tombstones = true;
        } else {
            inner.entries.clear();
        }
    }

    /// Invokes every live listener with the given event.
    pub fn emit(&self, event: &T) {
        self.inner.borrow_mut().depth += 1;

        let mut index = 0;
        loop {
            let callback = {
                let inner = self.inner.borrow();
                if index >= inner.entries.len() {
                    break;
                }
                inner.entries[index].callback.clone()
            };
            if let Some(callback) = callback {
                callback(event);
            }
            index += 1;
        }

        let mut inner = self.inner.borrow_mut();
        inner.depth -= 1;
        if inner.depth == 0 && inner.has_tombstones {
            inner.entries.retain(|e| e.callback.is_some());
            inner.has_tombstones = false;
        }
    }

    /// Number of live listeners.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner
            .borrow()
            .entries
            .iter()
            .filter(|e| e.callback.is_some())
            .count()
    }

    /// Checks whether the set has no live listeners.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: 'static> Default for ListenerSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for ListenerSet<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> std::fmt::Debug for ListenerSet<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerSet")
            .field("listeners", &self.inner.borrow().entries.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_subscribe_and_emit() {
        let set: ListenerSet<u32> = ListenerSet::new();
        let seen = Rc::new(Cell::new(0));

        let seen_a = Rc::clone(&seen);
        set.subscribe(move |v| seen_a.set(seen_a.get() + v));
        let seen_b = Rc::clone(&seen);
        set.subscribe(move |v| seen_b.set(seen_b.get() + v));

        set.emit(&3);
        assert_eq!(seen.get(), 6);
    }

    #[test]
    fn test_unsubscribe_outside_broadcast() {
        let set: ListenerSet<()> = ListenerSet::new();
        let count = Rc::new(Cell::new(0));

        let count_a = Rc::clone(&count);
        let id = set.subscribe(move |()| count_a.set(count_a.get() + 1));
        set.unsubscribe(id);

        set.emit(&());
        assert_eq!(count.get(), 0);
        assert!(set.is_empty());
    }

    #[test]
    fn test_listener_removing_itself_mid_broadcast() {
        let set: ListenerSet<()> = ListenerSet::new();
        let count = Rc::new(Cell::new(0));

        let id_slot: Rc<Cell<Option<ListenerId>>> = Rc::new(Cell::new(None));
        let set_handle = set.clone();
        let id_slot_inner = Rc::clone(&id_slot);
        let count_a = Rc::clone(&count);
        let id = set.subscribe(move |()| {
            count_a.set(count_a.get() + 1);
            if let Some(own) = id_slot_inner.get() {
                set_handle.unsubscribe(own);
            }
        });
        id_slot.set(Some(id));

        let count_b = Rc::clone(&count);
        set.subscribe(move |()| count_b.set(count_b.get() + 10));

        // First broadcast: both fire, first one removes itself.
        set.emit(&());
        assert_eq!(count.get(), 11);

        // Second broadcast: only the survivor fires.
        set.emit(&());
        assert_eq!(count.get(), 21);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_listener_removing_later_listener_mid_broadcast() {
        let set: ListenerSet<()> = ListenerSet::new();
        let second_fired = Rc::new(Cell::new(false));

        let second_id: Rc<Cell<Option<ListenerId>>> = Rc::new(Cell::new(None));
        let set_handle = set.clone();
        let second_id_inner = Rc::clone(&second_id);
        set.subscribe(move |()| {
            if let Some(id) = second_id_inner.get() {
                set_handle.unsubscribe(id);
            }
        });

        let fired = Rc::clone(&second_fired);
        let id = set.subscribe(move |()| fired.set(true));
        second_id.set(Some(id));

        // The tombstoned listener must not run in the same broadcast.
        set.emit(&());
        assert!(!second_fired.get());
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_subscribe_during_broadcast_is_visible() {
        let set: ListenerSet<()> = ListenerSet::new();
        let late_fired = Rc::new(Cell::new(false));

        let set_handle = set.clone();
        let late = Rc::clone(&late_fired);
        let armed = Rc::new(Cell::new(false));
        let armed_inner = Rc::clone(&armed);
        set.subscribe(move |()| {
            if !armed_inner.get() {
                armed_inner.set(true);
                let late = Rc::clone(&late);
                set_handle.subscribe(move |()| late.set(true));
            }
        });

        set.emit(&());
        assert!(late_fired.get());
    }

    #[test]
    fn test_reentrant_emit() {
        let set: ListenerSet<u32> = ListenerSet::new();
        let total = Rc::new(Cell::new(0));

        let set_handle = set.clone();
        let total_inner = Rc::clone(&total);
        set.subscribe(move |v| {
            total_inner.set(total_inner.get() + v);
            if *v > 0 {
                set_handle.emit(&(v - 1));
            }
        });

        set.emit(&3);
        assert_eq!(total.get(), 6); // 3 + 2 + 1 + 0
    }
}
