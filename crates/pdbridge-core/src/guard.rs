//! Serialized access to the shared engine.
//!
//! One [`EngineContext`] wraps the process-wide engine behind a spin lock.
//! [`EngineContext::with_instance`] is the only way to reach the engine on
//! behalf of an instance: it takes the lock, selects the instance's patch,
//! publishes the instance's listener in the [`ActiveInstance`] cell, runs the
//! caller's work and clears the cell before unlocking. Engine hooks find the
//! listener through that cell.

use std::num::NonZeroU64;
use std::ops::{Deref, DerefMut};
use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicPtr, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::lock_api::{self, GuardSend, RawMutex};

use crate::engine::{Engine, EngineListener};

/// Busy-waiting raw lock. Sections are short relative to an audio period,
/// and a sleeping wait is not allowed on the audio thread.
pub struct RawSpinLock {
    locked: AtomicBool,
}

unsafe impl RawMutex for RawSpinLock {
    #[allow(clippy::declare_interior_mutable_const)]
    const INIT: Self = RawSpinLock {
        locked: AtomicBool::new(false),
    };

    type GuardMarker = GuardSend;

    fn lock(&self) {
        while !self.try_lock() {
            while self.locked.load(Ordering::Relaxed) {
                std::hint::spin_loop();
            }
        }
    }

    fn try_lock(&self) -> bool {
        self.locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    unsafe fn unlock(&self) {
        self.locked.store(false, Ordering::Release);
    }

    fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Relaxed)
    }
}

pub type SpinMutex<T> = lock_api::Mutex<RawSpinLock, T>;

/// Process-unique identity of one bridged instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct InstanceToken(NonZeroU64);

impl InstanceToken {
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        let id = NEXT.fetch_add(1, Ordering::Relaxed);
        Self(NonZeroU64::new(id).unwrap_or(NonZeroU64::MIN))
    }

    pub fn get(self) -> u64 {
        self.0.get()
    }
}

struct ListenerSlot<'a> {
    listener: &'a mut (dyn EngineListener + 'a),
}

/// Single-slot mailbox naming the instance currently inside the engine.
///
/// Null outside every critical section.
pub struct ActiveInstance {
    slot: AtomicPtr<ListenerSlot<'static>>,
    owner: AtomicU64,
}

impl ActiveInstance {
    pub const fn new() -> Self {
        Self {
            slot: AtomicPtr::new(ptr::null_mut()),
            owner: AtomicU64::new(0),
        }
    }

    /// Instance currently inside the engine, if any.
    pub fn owner(&self) -> Option<InstanceToken> {
        NonZeroU64::new(self.owner.load(Ordering::Acquire)).map(InstanceToken)
    }

    pub fn is_idle(&self) -> bool {
        self.slot.load(Ordering::Acquire).is_null()
    }

    /// Hand the active listener to `f`. Returns `false` (and drops the
    /// event) when no instance is inside the engine.
    ///
    /// # Safety
    /// Must only be called on the thread that holds the engine lock, from
    /// code running inside an [`EngineContext`] section (an engine hook
    /// invoked synchronously by an [`Engine`] method). `f` must not call
    /// back into `dispatch`.
    pub unsafe fn dispatch<F>(&self, f: F) -> bool
    where
        F: FnOnce(&mut dyn EngineListener),
    {
        let slot = self.slot.load(Ordering::Acquire);
        if slot.is_null() {
            return false;
        }
        // SAFETY: a non-null slot points at the ListenerSlot on the stack of
        // `with_instance`, which outlives its `Entered` guard; the caller
        // holds the engine lock so no other reference is live.
        let slot = unsafe { &mut *slot };
        f(&mut *slot.listener);
        true
    }

    fn enter<'s>(&'s self, token: InstanceToken, slot: &'s mut ListenerSlot<'_>) -> Entered<'s> {
        self.owner.store(token.get(), Ordering::Release);
        let published = (slot as *mut ListenerSlot<'_>).cast::<ListenerSlot<'static>>();
        let previous = self.slot.swap(published, Ordering::AcqRel);
        debug_assert!(previous.is_null(), "engine entered while another instance is active");
        Entered { active: self }
    }
}

impl Default for ActiveInstance {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ActiveInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActiveInstance")
            .field("owner", &self.owner())
            .finish()
    }
}

struct Entered<'s> {
    active: &'s ActiveInstance,
}

impl Drop for Entered<'_> {
    fn drop(&mut self) {
        self.active.slot.store(ptr::null_mut(), Ordering::Release);
        self.active.owner.store(0, Ordering::Release);
    }
}

/// The shared engine plus the cell its hooks read.
pub struct EngineContext<E: Engine> {
    engine: SpinMutex<E>,
    active: Arc<ActiveInstance>,
}

impl<E: Engine> EngineContext<E> {
    pub fn new(engine: E) -> Self {
        let active = engine.hook_target();
        Self {
            engine: SpinMutex::new(engine),
            active,
        }
    }

    pub fn active(&self) -> &ActiveInstance {
        &self.active
    }

    /// Run `f` inside `token`'s critical section.
    ///
    /// Spins until the engine is free, selects `patch` if given, routes
    /// engine output to `listener` while `f` runs, then clears the route and
    /// releases the engine. Must not be nested.
    pub fn with_instance<R>(
        &self,
        token: InstanceToken,
        patch: Option<&E::Patch>,
        listener: &mut dyn EngineListener,
        f: impl FnOnce(&mut Session<'_, E>) -> R,
    ) -> R {
        let mut engine = self.engine.lock();
        if let Some(patch) = patch {
            engine.select(patch);
        }
        let mut slot = ListenerSlot { listener };
        let _entered = self.active.enter(token, &mut slot);
        let mut session = Session {
            engine: &mut *engine,
            active: &self.active,
        };
        f(&mut session)
    }

    /// Run `f` with the engine locked and no instance active. Engine output
    /// during `f` is dropped.
    pub fn with_engine<R>(&self, f: impl FnOnce(&mut E) -> R) -> R {
        let mut engine = self.engine.lock();
        f(&mut *engine)
    }

    pub fn is_locked(&self) -> bool {
        self.engine.is_locked()
    }
}

/// Engine access granted for one critical section.
pub struct Session<'s, E> {
    engine: &'s mut E,
    active: &'s ActiveInstance,
}

impl<E> Session<'_, E> {
    pub fn engine(&mut self) -> &mut E {
        self.engine
    }

    /// Deliver something to this section's listener directly.
    pub fn notify(&self, f: impl FnOnce(&mut dyn EngineListener)) -> bool {
        // SAFETY: a Session only exists inside `with_instance` on the thread
        // holding the engine lock.
        unsafe { self.active.dispatch(f) }
    }
}

impl<E> Deref for Session<'_, E> {
    type Target = E;

    fn deref(&self) -> &E {
        self.engine
    }
}

impl<E> DerefMut for Session<'_, E> {
    fn deref_mut(&mut self) -> &mut E {
        self.engine
    }
}
