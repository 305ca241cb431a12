use std::cell::RefCell;
use std::collections::HashSet;

/// Enough room that typical tests never make the live set reallocate, which keeps
/// allocation-balance measurements stable once the state has been initialized.
const LIVE_SET_CAPACITY: usize = 1024;

thread_local! {
    static STATE: RefCell<ProbeState> = RefCell::new(ProbeState::new());
}

#[derive(Debug)]
struct ProbeState {
    next_id: u64,

    /// Identities of the probes currently alive on this thread. A probe that is dropped but
    /// not in this set has been dropped twice.
    live: HashSet<u64>,

    /// Construction attempts (successful or not) since the last reset.
    attempts: u64,

    /// The attempt number that will panic, if any.
    fail_at: Option<u64>,

    constructed: u64,
    cloned: u64,
    dropped: u64,
}

impl ProbeState {
    fn new() -> Self {
        Self {
            next_id: 0,
            live: HashSet::with_capacity(LIVE_SET_CAPACITY),
            attempts: 0,
            fail_at: None,
            constructed: 0,
            cloned: 0,
            dropped: 0,
        }
    }

    /// Registers a construction attempt, returning the identity of the new probe or `None`
    /// if this attempt is the one that must fail.
    fn begin_construction(&mut self, is_clone: bool) -> Option<u64> {
        let attempt = self.attempts;
        self.attempts = self.attempts.wrapping_add(1);

        if self.fail_at == Some(attempt) {
            self.fail_at = None;
            return None;
        }

        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        self.live.insert(id);

        self.constructed = self.constructed.wrapping_add(1);
        if is_clone {
            self.cloned = self.cloned.wrapping_add(1);
        }

        Some(id)
    }

    /// Returns `false` if the probe was not alive, meaning it is being dropped a second time.
    fn end(&mut self, id: u64) -> bool {
        self.dropped = self.dropped.wrapping_add(1);
        self.live.remove(&id)
    }
}

/// A test item that records its lifecycle in thread-local counters.
///
/// Every probe has a unique identity, so dropping the same probe twice is detected and
/// reported with a panic. Each probe also owns a heap allocation, so a leaked probe shows up
/// in allocation balances.
///
/// Use [`fail_on_construction()`] to make a future construction (via [`Probe::new()`],
/// [`Default`] or [`Clone`]) panic before it produces a probe.
///
/// # Examples
///
/// ```
/// use testing::{Probe, probe_stats, reset_probes};
///
/// reset_probes();
///
/// let a = Probe::new(1);
/// let b = a.clone();
/// drop(a);
///
/// let stats = probe_stats();
/// assert_eq!(stats.constructed(), 2);
/// assert_eq!(stats.cloned(), 1);
/// assert_eq!(stats.live(), 1);
/// assert_eq!(b.value(), 1);
/// ```
#[derive(Debug)]
pub struct Probe {
    id: u64,
    value: Box<u64>,
}

impl Probe {
    /// Creates a probe carrying `value`.
    ///
    /// # Panics
    ///
    /// Panics if this construction was selected to fail via [`fail_on_construction()`].
    #[must_use]
    pub fn new(value: u64) -> Self {
        Self::construct(value, false)
    }

    /// The value the probe carries.
    #[must_use]
    pub fn value(&self) -> u64 {
        *self.value
    }

    fn construct(value: u64, is_clone: bool) -> Self {
        let id = STATE.with_borrow_mut(|state| state.begin_construction(is_clone));

        let Some(id) = id else {
            panic!("injected failure while constructing probe with value {value}");
        };

        Self {
            id,
            value: Box::new(value),
        }
    }
}

impl Default for Probe {
    fn default() -> Self {
        Self::construct(0, false)
    }
}

impl Clone for Probe {
    fn clone(&self) -> Self {
        Self::construct(*self.value, true)
    }
}

impl PartialEq for Probe {
    /// Probes are equal if they carry the same value, regardless of identity.
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl Eq for Probe {}

impl Drop for Probe {
    fn drop(&mut self) {
        let was_alive = STATE.with_borrow_mut(|state| state.end(self.id));

        assert!(was_alive, "probe {} was dropped twice", self.id);
    }
}

/// Snapshot of the probe counters for the current thread.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ProbeStats {
    constructed: u64,
    cloned: u64,
    dropped: u64,
    live: u64,
}

impl ProbeStats {
    /// Probes successfully constructed (including clones) since the last reset.
    #[must_use]
    pub fn constructed(&self) -> u64 {
        self.constructed
    }

    /// Probes created via [`Clone`] since the last reset.
    #[must_use]
    pub fn cloned(&self) -> u64 {
        self.cloned
    }

    /// Probes dropped since the last reset.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Probes currently alive.
    #[must_use]
    pub fn live(&self) -> u64 {
        self.live
    }
}

/// Returns the probe counters for the current thread.
#[must_use]
pub fn probe_stats() -> ProbeStats {
    STATE.with_borrow(|state| ProbeStats {
        constructed: state.constructed,
        cloned: state.cloned,
        dropped: state.dropped,
        live: u64::try_from(state.live.len()).expect("usize fits into u64 on all supported targets"),
    })
}

/// Resets all probe counters and cancels any pending failure for the current thread.
///
/// Call this at the start of a test, while no probes are alive.
pub fn reset_probes() {
    STATE.with_borrow_mut(|state| {
        state.live.clear();
        state.attempts = 0;
        state.fail_at = None;
        state.constructed = 0;
        state.cloned = 0;
        state.dropped = 0;
    });
}

/// Makes the construction attempt `n` (counting from zero, starting now) panic.
///
/// The failure is one-shot: attempts after the failing one succeed again.
pub fn fail_on_construction(n: u64) {
    STATE.with_borrow_mut(|state| {
        state.fail_at = Some(state.attempts.wrapping_add(n));
    });
}

/// Cancels a pending failure requested via [`fail_on_construction()`].
pub fn cancel_failure() {
    STATE.with_borrow_mut(|state| state.fail_at = None);
}

/// Collects the values carried by a sequence of probes.
#[must_use]
pub fn values<'a>(probes: impl IntoIterator<Item = &'a Probe>) -> Vec<u64> {
    probes.into_iter().map(Probe::value).collect()
}
