//! Trailing-edge debouncing of rapidly changing values.
//!
//! Every push restarts the quiet window; only the latest value is propagated
//! once `delay` has elapsed without a new push.
//!
//! # Invariants
//!
//! - **Latest-wins**: intermediate values within a burst are never observed.
//! - **Single propagation**: a burst yields exactly one value.
//! - **Deterministic**: time is injected through the `*_at` methods, so
//!   identical push sequences produce identical output.
//!
//! ```
//! use std::time::{Duration, Instant};
//! use tabula_engine::debounce::Debouncer;
//!
//! let start = Instant::now();
//! let ms = |n| start + Duration::from_millis(n);
//! let mut d = Debouncer::new(Duration::from_millis(200));
//! d.push_at("a", ms(0));
//! d.push_at("b", ms(100));
//! d.push_at("c", ms(150));
//! assert_eq!(d.poll_at(ms(349)), None);
//! assert_eq!(d.poll_at(ms(350)), Some("c"));
//! assert_eq!(d.poll_at(ms(1000)), None);
//! ```

use std::time::{Duration, Instant};

#[inline]
fn duration_since_or_zero(now: Instant, earlier: Instant) -> Duration {
    now.checked_duration_since(earlier).unwrap_or(Duration::ZERO)
}

/// Holds at most one pending value and releases it after a quiet period.
#[derive(Debug, Clone)]
pub struct Debouncer<T> {
    delay: Duration,
    pending: Option<T>,
    last_push: Option<Instant>,
}

impl<T> Debouncer<T> {
    /// Debouncer with quiet period `delay`.
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
            last_push: None,
        }
    }

    /// Quiet period.
    #[inline]
    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Record `value` now.
    pub fn push(&mut self, value: T) {
        self.push_at(value, Instant::now());
    }

    /// Record `value` at `now`, replacing any pending value and restarting
    /// the quiet window.
    pub fn push_at(&mut self, value: T, now: Instant) {
        self.pending = Some(value);
        self.last_push = Some(now);
    }

    /// Poll now.
    pub fn poll(&mut self) -> Option<T> {
        self.poll_at(Instant::now())
    }

    /// Take the pending value if the quiet window has elapsed at `now`.
    pub fn poll_at(&mut self, now: Instant) -> Option<T> {
        let last = self.last_push?;
        if self.pending.is_none() || duration_since_or_zero(now, last) < self.delay {
            return None;
        }
        self.last_push = None;
        self.pending.take()
    }

    /// Time left until the pending value is released, `None` if nothing is
    /// pending.
    #[must_use]
    pub fn time_until_flush(&self, now: Instant) -> Option<Duration> {
        self.pending.as_ref()?;
        let elapsed = duration_since_or_zero(now, self.last_push?);
        Some(self.delay.saturating_sub(elapsed))
    }

    /// Whether a value is waiting.
    #[inline]
    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Peek at the pending value.
    #[must_use]
    pub fn pending(&self) -> Option<&T> {
        self.pending.as_ref()
    }

    /// Drop the pending value. Returns it, if any.
    pub fn cancel(&mut self) -> Option<T> {
        self.last_push = None;
        self.pending.take()
    }

    /// Release the pending value immediately.
    pub fn flush(&mut self) -> Option<T> {
        self.cancel()
    }
}

/// `debounce(value, delay) -> value'`: a value that follows its input only
/// after the input has been quiet for `delay`.
#[derive(Debug, Clone)]
pub struct Debounced<T> {
    current: T,
    inner: Debouncer<T>,
}

impl<T: Clone + PartialEq> Debounced<T> {
    /// Start at `initial` with quiet period `delay`.
    #[must_use]
    pub fn new(initial: T, delay: Duration) -> Self {
        Self {
            current: initial,
            inner: Debouncer::new(delay),
        }
    }

    /// The last propagated value.
    #[must_use]
    pub fn value(&self) -> &T {
        &self.current
    }

    /// Feed a new input value at `now`.
    pub fn update_at(&mut self, value: T, now: Instant) {
        self.inner.push_at(value, now);
    }

    /// Advance to `now`. Returns `true` when the propagated value changed.
    pub fn tick_at(&mut self, now: Instant) -> bool {
        match self.inner.poll_at(now) {
            Some(value) if value != self.current => {
                self.current = value;
                true
            }
            _ => false,
        }
    }

    /// Whether an input is waiting to propagate.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.inner.has_pending()
    }

    /// Discard the waiting input.
    pub fn cancel(&mut self) {
        self.inner.cancel();
    }
}
