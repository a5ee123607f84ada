//! Cooperative timer scheduler.
//!
//! There are no threads. The surrounding machine advances time, pops the
//! events that fell due and dispatches them itself. Periodic timers re-arm
//! automatically until their [`CancelToken`] is handed back to
//! [`Scheduler::cancel`].

use crate::Ticks;

/// Handle to an armed timer.
///
/// Deliberately neither `Copy` nor `Clone`: the owner keeps the only token in
/// a struct field and gives it back to cancel. A dropped token leaves the timer
/// armed, so owners store it rather than discard it.
#[derive(Debug, PartialEq, Eq, Hash)]
#[must_use = "dropping a CancelToken makes the timer impossible to disarm"]
pub struct CancelToken(u64);

impl CancelToken {
    /// Raw timer id (diagnostics only).
    #[must_use]
    pub fn id(&self) -> u64 {
        self.0
    }
}

#[derive(Debug)]
struct Timer<E> {
    id: u64,
    due: Ticks,
    period: Ticks,
    event: E,
}

/// A single-threaded scheduler of periodic events.
#[derive(Debug)]
pub struct Scheduler<E> {
    now: Ticks,
    next_id: u64,
    timers: Vec<Timer<E>>,
}

impl<E: Clone> Scheduler<E> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            now: Ticks::ZERO,
            next_id: 0,
            timers: Vec::new(),
        }
    }

    /// Current scheduler time.
    #[must_use]
    pub fn now(&self) -> Ticks {
        self.now
    }

    /// Arm a timer that first fires one `period` from now and then every
    /// `period` after that. A zero period is treated as one tick.
    pub fn schedule_periodic(&mut self, period: Ticks, event: E) -> CancelToken {
        let period = if period == Ticks::ZERO {
            Ticks::new(1)
        } else {
            period
        };
        let id = self.next_id;
        self.next_id += 1;
        self.timers.push(Timer {
            id,
            due: self.now + period,
            period,
            event,
        });
        CancelToken(id)
    }

    /// Disarm a timer. Returns `false` if it was not armed.
    pub fn cancel(&mut self, token: CancelToken) -> bool {
        let before = self.timers.len();
        self.timers.retain(|t| t.id != token.0);
        self.timers.len() != before
    }

    /// Whether the timer behind `token` is still armed.
    #[must_use]
    pub fn is_armed(&self, token: &CancelToken) -> bool {
        self.timers.iter().any(|t| t.id == token.0)
    }

    /// Number of armed timers.
    #[must_use]
    pub fn armed(&self) -> usize {
        self.timers.len()
    }

    /// Time at which the next timer fires.
    #[must_use]
    pub fn next_due(&self) -> Option<Ticks> {
        self.timers.iter().map(|t| t.due).min()
    }

    /// Pop the earliest event due at or before `until`.
    ///
    /// Time advances to the event's due time and the timer is re-armed one
    /// period later. Ties fire in the order the timers were armed.
    pub fn pop_due(&mut self, until: Ticks) -> Option<E> {
        let index = self
            .timers
            .iter()
            .enumerate()
            .filter(|(_, t)| t.due <= until)
            .min_by_key(|(_, t)| (t.due, t.id))
            .map(|(i, _)| i)?;

        let timer = &mut self.timers[index];
        if timer.due > self.now {
            self.now = timer.due;
        }
        timer.due += timer.period;
        Some(timer.event.clone())
    }

    /// Move time forward without firing anything.
    ///
    /// Callers drain [`Scheduler::pop_due`] first; time never moves backwards.
    pub fn advance_to(&mut self, time: Ticks) {
        if time > self.now {
            self.now = time;
        }
    }

    /// Disarm every timer and rewind to zero.
    pub fn reset(&mut self) {
        self.timers.clear();
        self.now = Ticks::ZERO;
    }
}

impl<E: Clone> Default for Scheduler<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    enum Ev {
        A,
        B,
    }

    fn drain(s: &mut Scheduler<Ev>, until: u64) -> Vec<(u64, Ev)> {
        let mut out = Vec::new();
        while let Some(ev) = s.pop_due(Ticks::new(until)) {
            out.push((s.now().get(), ev));
        }
        s.advance_to(Ticks::new(until));
        out
    }

    #[test]
    fn periodic_fires_every_period() {
        let mut s = Scheduler::new();
        let _token = s.schedule_periodic(Ticks::new(10), Ev::A);
        let fired = drain(&mut s, 35);
        assert_eq!(fired, vec![(10, Ev::A), (20, Ev::A), (30, Ev::A)]);
        assert_eq!(s.now(), Ticks::new(35));
    }

    #[test]
    fn cancelled_timer_never_fires_again() {
        let mut s = Scheduler::new();
        let token = s.schedule_periodic(Ticks::new(5), Ev::A);
        assert_eq!(drain(&mut s, 5).len(), 1);
        assert!(s.cancel(token));
        assert!(drain(&mut s, 100).is_empty());
        assert_eq!(s.armed(), 0);
    }

    #[test]
    fn ties_fire_in_arming_order() {
        let mut s = Scheduler::new();
        let _b = s.schedule_periodic(Ticks::new(4), Ev::B);
        let _a = s.schedule_periodic(Ticks::new(4), Ev::A);
        let fired = drain(&mut s, 4);
        assert_eq!(fired, vec![(4, Ev::B), (4, Ev::A)]);
    }

    #[test]
    fn interleaves_different_periods() {
        let mut s = Scheduler::new();
        let _a = s.schedule_periodic(Ticks::new(3), Ev::A);
        let _b = s.schedule_periodic(Ticks::new(5), Ev::B);
        let fired: Vec<u64> = drain(&mut s, 10).into_iter().map(|(t, _)| t).collect();
        assert_eq!(fired, vec![3, 5, 6, 9, 10]);
    }

    #[test]
    fn zero_period_is_clamped() {
        let mut s = Scheduler::new();
        let token = s.schedule_periodic(Ticks::ZERO, Ev::A);
        assert!(s.is_armed(&token));
        assert_eq!(s.next_due(), Some(Ticks::new(1)));
    }

    #[test]
    fn cancel_twice_reports_false() {
        let mut s = Scheduler::<Ev>::new();
        let token = s.schedule_periodic(Ticks::new(1), Ev::A);
        let id = token.id();
        assert!(s.cancel(token));
        assert!(!s.cancel(CancelToken(id)));
    }
}
