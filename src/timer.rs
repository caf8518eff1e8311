//! Monotonic microsecond clock and fixed-slot timer wheel.
//!
//! Single-threaded cooperative facility: the owner pumps the wheel with
//! [`TimerWheel::pop_due`], servicing the earliest pending timer whose
//! expiry has been reached. Popping advances the wheel's notion of "now"
//! to the expiry, so callbacks observe event time.
//!
//! Ordering guarantee: two timers armed with the same expiry fire in arm
//! order. The scheduler leans on this to sequence one action directly
//! after another at the same instant without computing offsets.

#[derive(Clone, Copy, Debug, Default)]
struct TimerSlot {
    expiry_us: u64,
    seq: u64,
    pending: bool,
}

/// Fixed set of `N` one-shot timers over a shared monotonic clock.
#[derive(Clone, Debug)]
pub struct TimerWheel<const N: usize> {
    now_us: u64,
    next_seq: u64,
    slots: [TimerSlot; N],
}

impl<const N: usize> Default for TimerWheel<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> TimerWheel<N> {
    pub const fn new() -> Self {
        Self {
            now_us: 0,
            next_seq: 0,
            slots: [TimerSlot {
                expiry_us: 0,
                seq: 0,
                pending: false,
            }; N],
        }
    }

    /// Non-decreasing microseconds since boot.
    pub fn now_us(&self) -> u64 {
        self.now_us
    }

    /// Move the clock forward. Never moves it backward.
    pub fn advance_to(&mut self, t_us: u64) {
        if t_us > self.now_us {
            self.now_us = t_us;
        }
    }

    /// (Re)schedule an absolute expiry, replacing any pending one. A
    /// re-armed timer counts as newly armed for equal-expiry ordering.
    pub fn arm_at(&mut self, index: usize, expiry_us: u64) {
        let slot = &mut self.slots[index];
        slot.expiry_us = expiry_us;
        slot.seq = self.next_seq;
        slot.pending = true;
        self.next_seq += 1;
    }

    /// Idempotent.
    pub fn cancel(&mut self, index: usize) {
        self.slots[index].pending = false;
    }

    pub fn cancel_all(&mut self) {
        for slot in &mut self.slots {
            slot.pending = false;
        }
    }

    pub fn is_pending(&self, index: usize) -> bool {
        self.slots[index].pending
    }

    pub fn expiry_us(&self, index: usize) -> Option<u64> {
        self.slots[index].pending.then(|| self.slots[index].expiry_us)
    }

    fn earliest(&self, limit_us: u64) -> Option<usize> {
        let mut best: Option<usize> = None;
        for (i, slot) in self.slots.iter().enumerate() {
            if !slot.pending || slot.expiry_us > limit_us {
                continue;
            }
            match best {
                None => best = Some(i),
                Some(b) => {
                    let bs = &self.slots[b];
                    if (slot.expiry_us, slot.seq) < (bs.expiry_us, bs.seq) {
                        best = Some(i);
                    }
                }
            }
        }
        best
    }

    /// Expiry of the earliest pending timer, if any.
    pub fn next_expiry(&self) -> Option<u64> {
        self.earliest(u64::MAX).map(|i| self.slots[i].expiry_us)
    }

    /// Pop the earliest pending timer with `expiry <= limit_us`, advancing
    /// the clock to its expiry. Returns `(index, expiry_us)`.
    pub fn pop_due(&mut self, limit_us: u64) -> Option<(usize, u64)> {
        let index = self.earliest(limit_us)?;
        let expiry_us = self.slots[index].expiry_us;
        self.slots[index].pending = false;
        self.advance_to(expiry_us);
        Some((index, expiry_us))
    }

    /// Re-project every pending expiry onto a shifted timeline. A positive
    /// delta moves time forward, so timers expire sooner (floored at 0); a
    /// negative delta pushes them out. Timers are visited in stable
    /// `(expiry, seq)` order and re-sequenced, so groups sharing an expiry
    /// keep their first-armed-first-fired order even when the floor merges
    /// previously distinct expiries.
    pub fn shift_all(&mut self, delta_us: i64) {
        let mut order: Vec<usize> = (0..N).filter(|&i| self.slots[i].pending).collect();
        order.sort_by_key(|&i| (self.slots[i].expiry_us, self.slots[i].seq));

        for i in order {
            let expiry_us = self.slots[i].expiry_us;
            let shifted = if delta_us >= 0 {
                expiry_us.saturating_sub(delta_us as u64)
            } else {
                expiry_us + delta_us.unsigned_abs()
            };
            self.arm_at(i, shifted);
        }
    }
}
