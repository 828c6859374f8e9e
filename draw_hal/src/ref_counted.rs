//! Manually reference-counted handles shared by every resource kind
//!
//! Resource objects are shared between caller code and the context's own
//! cached slots (bound state, presets) with no single natural owner, so their
//! lifetime is driven by explicit `acquire`/`release` calls instead of the
//! handle's own scope. A handle copy (`Clone`) is just another pointer to the
//! same object: it does not take a reference.
//!
//! The tracking cell outlives the wrapped object, so a stale handle never
//! dangles: after the last release `get()` returns `None` and further
//! releases are refused and logged.
//!
//! Handles do not leak: if every copy is dropped while references are still
//! held, the object goes with the last copy and an unbalanced-reference
//! warning is logged under `draw_hal::RefCounted::leak`.

use std::cell::{Cell, Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counts at or above this value are treated as corruption
pub const REF_COUNT_SENTINEL: i32 = 10000;

static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

struct Slot<T: ?Sized> {
    id: u64,
    count: Cell<i32>,
    object: RefCell<Option<Box<T>>>,
}

impl<T: ?Sized> Drop for Slot<T> {
    fn drop(&mut self) {
        let count = self.count.get();
        let alive = self.object.get_mut().is_some();
        if alive && count > 0 {
            crate::hal_warn!(
                "draw_hal::RefCounted::leak",
                "Object #{} dropped with {} unreleased reference(s)",
                self.id,
                count
            );
        }
    }
}

/// Handle to a manually reference-counted object
///
/// The creator holds the first reference (count starts at 1). Every
/// [`acquire`](Self::acquire) must be balanced by a [`release`](Self::release);
/// the object is dropped exactly once, on the release that takes the count
/// from 1 to 0 (or, unbalanced, with the last handle copy).
///
/// Not thread-safe: a handle belongs to the thread driving its context.
pub struct RefCounted<T: ?Sized> {
    slot: Rc<Slot<T>>,
}

impl<T: ?Sized> RefCounted<T> {
    /// Wrap a freshly created object; the caller owns the single reference
    pub fn new(object: Box<T>) -> Self {
        Self {
            slot: Rc::new(Slot {
                id: NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed),
                count: Cell::new(1),
                object: RefCell::new(Some(object)),
            }),
        }
    }

    /// Take an additional reference
    pub fn acquire(&self) {
        if !self.is_alive() {
            crate::hal_error!(
                "draw_hal::RefCounted",
                "acquire() on destroyed object #{} ignored",
                self.slot.id
            );
            return;
        }
        self.slot.count.set(self.slot.count.get().saturating_add(1));
    }

    /// Drop one reference
    ///
    /// Returns `true` if this call destroyed the object. A count outside
    /// `(0, REF_COUNT_SENTINEL)` means a double release or corruption: the
    /// decrement is refused, an error is logged and `false` is returned.
    pub fn release(&self) -> bool {
        let count = self.slot.count.get();
        if count <= 0 || count >= REF_COUNT_SENTINEL {
            crate::hal_error!(
                "draw_hal::RefCounted",
                "Refcount ({}) invalid for object #{} - corrupt?",
                count,
                self.slot.id
            );
            return false;
        }

        if count > 1 {
            self.slot.count.set(count - 1);
            return false;
        }

        // Last reference: take the object out before dropping it so its Drop
        // can freely release other handles.
        let object = match self.slot.object.try_borrow_mut() {
            Ok(mut object) => object.take(),
            Err(_) => {
                crate::hal_error!(
                    "draw_hal::RefCounted",
                    "Object #{} released while borrowed; release refused",
                    self.slot.id
                );
                return false;
            }
        };
        self.slot.count.set(0);
        drop(object);
        true
    }

    /// Current reference count (0 once destroyed)
    pub fn ref_count(&self) -> i32 {
        self.slot.count.get()
    }

    /// Whether the object has not been destroyed yet
    pub fn is_alive(&self) -> bool {
        self.slot.count.get() > 0
    }

    /// Process-unique object id, stable for the object's lifetime
    ///
    /// Ids are never reused, so backends may key caches by them.
    pub fn id(&self) -> u64 {
        self.slot.id
    }

    /// Borrow the object, or `None` if it has been destroyed
    pub fn get(&self) -> Option<Ref<'_, T>> {
        let object = self.slot.object.try_borrow().ok()?;
        Ref::filter_map(object, |o| o.as_deref()).ok()
    }

    /// Mutably borrow the object, or `None` if destroyed or already borrowed
    pub fn get_mut(&self) -> Option<RefMut<'_, T>> {
        let object = self.slot.object.try_borrow_mut().ok()?;
        RefMut::filter_map(object, |o| o.as_deref_mut()).ok()
    }

    /// Whether two handles point to the same object
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Rc::ptr_eq(&a.slot, &b.slot)
    }
}

impl<T: ?Sized> Clone for RefCounted<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Rc::clone(&self.slot),
        }
    }
}

impl<T: ?Sized> fmt::Debug for RefCounted<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefCounted")
            .field("id", &self.slot.id)
            .field("ref_count", &self.slot.count.get())
            .finish()
    }
}

#[cfg(test)]
#[path = "ref_counted_tests.rs"]
mod tests;
