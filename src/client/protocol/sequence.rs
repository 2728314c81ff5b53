use crate::client::protocol::pacemaker_def::{MAX_SEQUENCE_NUMBER, SEQUENCE_MASK};

/// Control-byte sequence number expected by the next exchange.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SequenceCounter {
    value: u8,
}

impl SequenceCounter {
    pub fn new() -> Self {
        Self { value: 0 }
    }

    pub fn current(&self) -> u8 {
        self.value
    }

    /// Call once the reply for `current()` has been accepted.
    pub fn advance(&mut self) {
        self.value = if self.value >= MAX_SEQUENCE_NUMBER {
            0
        } else {
            self.value + 1
        };
    }

    pub fn matches(&self, control: u8) -> bool {
        control & SEQUENCE_MASK == self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_after_sixteen_advances() {
        let mut counter = SequenceCounter::new();
        let mut seen = [0usize; 16];
        for _ in 0..16 {
            seen[counter.current() as usize] += 1;
            counter.advance();
        }
        assert_eq!(counter.current(), 0);
        assert!(seen.iter().all(|count| *count == 1));
    }

    #[test]
    fn matches_ignores_debug_and_reserved_bits() {
        let mut counter = SequenceCounter::new();
        counter.advance();
        counter.advance();
        assert!(counter.matches(0x02));
        assert!(counter.matches(0x82));
        assert!(!counter.matches(0x03));
    }
}
