// Lag bookkeeping for intervals that cannot keep up
//
// Every dropped backlog pushes the level up by a fixed step; every
// on-time fine-sleep step lets it decay by one. Crossing the warning
// threshold logs once and parks the tracker in JustWarned, which
// decays back to zero on the next step instead of warning again.

use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backpressure {
    Level(u32),
    JustWarned,
}

impl Backpressure {
    pub const fn new() -> Self {
        Backpressure::Level(0)
    }

    pub const fn level(self) -> u32 {
        match self {
            Backpressure::Level(n) => n,
            Backpressure::JustWarned => 0,
        }
    }

    /// A backlog was dropped.
    pub fn bump(&mut self, step: u32) {
        *self = Backpressure::Level(self.level().saturating_add(step));
    }

    /// One on-time step. Returns true if the sustained-lag warning
    /// should be raised.
    pub fn settle(&mut self, warn_above: u32) -> bool {
        match *self {
            Backpressure::Level(n) if n > warn_above => {
                *self = Backpressure::JustWarned;
                true
            }
            Backpressure::Level(n) => {
                *self = Backpressure::Level(n.saturating_sub(1));
                false
            }
            Backpressure::JustWarned => {
                *self = Backpressure::Level(0);
                false
            }
        }
    }
}

impl Default for Backpressure {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Backpressure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backpressure::Level(n) => write!(f, "Level({})", n),
            Backpressure::JustWarned => write!(f, "JustWarned"),
        }
    }
}
