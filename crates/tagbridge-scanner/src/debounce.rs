//! Duplicate suppression for cards held over the reader.
//!
//! A card left on the reader answers every poll. The debouncer turns that
//! stream of presence results into one event per presentation:
//!
//! - `Idle --absent--> Idle`
//! - `Idle --present(uid)--> Holding(uid)`, emits
//! - `Holding(uid) --present(uid)--> Holding(uid)`
//! - `Holding(uid) --present(other)--> Holding(other)`, emits
//! - `Holding(uid) --absent--> Idle`
//!
//! [`TagDebouncer::evaluate`] only looks; [`TagDebouncer::apply`] commits.
//! The polling loop evaluates first and commits once the card content was
//! read, so a failed read leaves the machine where it was and the card is
//! retried on the next tick.
//!
//! # Examples
//!
//! ```
//! use tagbridge_core::Uid;
//! use tagbridge_scanner::debounce::{TagDebouncer, Transition};
//!
//! let mut debouncer = TagDebouncer::new();
//! let uid = Uid::new(&[0x04, 0xAB, 0x3C, 0x9F]).unwrap();
//!
//! assert_eq!(debouncer.apply(Some(&uid)), Transition::Acquire);
//! assert_eq!(debouncer.apply(Some(&uid)), Transition::Hold);
//! assert_eq!(debouncer.apply(None), Transition::Release);
//! ```

use tagbridge_core::{Uid, constants::MAX_UID_BYTES};

/// What a presence result does to the debouncer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Nothing held, nothing seen.
    StayIdle,

    /// First card after an empty field.
    Acquire,

    /// Same card still in the field.
    Hold,

    /// A different card replaced the held one without a gap.
    Swap,

    /// The held card left the field.
    Release,
}

impl Transition {
    /// Whether this transition reports a new presentation.
    pub fn emits_event(&self) -> bool {
        matches!(self, Self::Acquire | Self::Swap)
    }
}

/// Counters kept by the debouncer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DebounceStats {
    /// Presentations reported (acquire and swap).
    pub emitted: u64,

    /// Polls that saw the held card again.
    pub suppressed: u64,

    /// Times the held card left the field.
    pub released: u64,
}

/// Last-seen-UID state machine.
///
/// Holds one fixed-size UID buffer. The buffer is all zero while idle and is
/// overwritten only when a new card is committed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagDebouncer {
    last_uid: [u8; MAX_UID_BYTES],
    last_len: usize,
    stats: DebounceStats,
}

impl TagDebouncer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transition a presence result would cause, without committing it.
    pub fn evaluate(&self, seen: Option<&Uid>) -> Transition {
        match (seen, self.is_idle()) {
            (None, true) => Transition::StayIdle,
            (None, false) => Transition::Release,
            (Some(_), true) => Transition::Acquire,
            (Some(uid), false) if self.holds(uid) => Transition::Hold,
            (Some(_), false) => Transition::Swap,
        }
    }

    /// Commit a presence result.
    pub fn apply(&mut self, seen: Option<&Uid>) -> Transition {
        let transition = self.evaluate(seen);
        match (transition, seen) {
            (Transition::Acquire | Transition::Swap, Some(uid)) => {
                self.store(uid);
                self.stats.emitted += 1;
            }
            (Transition::Hold, _) => self.stats.suppressed += 1,
            (Transition::Release, _) => {
                self.clear();
                self.stats.released += 1;
            }
            _ => {}
        }
        transition
    }

    /// Whether no card is held.
    pub fn is_idle(&self) -> bool {
        self.last_len == 0
    }

    /// UID bytes of the held card.
    pub fn held(&self) -> Option<&[u8]> {
        (!self.is_idle()).then(|| &self.last_uid[..self.last_len])
    }

    pub fn stats(&self) -> DebounceStats {
        self.stats
    }

    /// Lengths must match so a 4-byte UID never equals the prefix of a
    /// 7-byte one.
    fn holds(&self, uid: &Uid) -> bool {
        let bytes = uid.as_bytes();
        self.last_len == bytes.len() && self.last_uid[..bytes.len()] == *bytes
    }

    fn store(&mut self, uid: &Uid) {
        let bytes = uid.as_bytes();
        self.last_uid = [0; MAX_UID_BYTES];
        self.last_uid[..bytes.len()].copy_from_slice(bytes);
        self.last_len = bytes.len();
    }

    fn clear(&mut self) {
        self.last_uid = [0; MAX_UID_BYTES];
        self.last_len = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn uid(bytes: &[u8]) -> Uid {
        Uid::new(bytes).unwrap()
    }

    #[test]
    fn test_new_debouncer_is_idle() {
        let debouncer = TagDebouncer::new();
        assert!(debouncer.is_idle());
        assert_eq!(debouncer.held(), None);
        assert_eq!(debouncer.evaluate(None), Transition::StayIdle);
    }

    #[test]
    fn test_held_card_emits_once() {
        let mut debouncer = TagDebouncer::new();
        let card = uid(&[0x04, 0xAB, 0x3C, 0x9F]);

        let emitted = (0..5)
            .map(|_| debouncer.apply(Some(&card)))
            .filter(Transition::emits_event)
            .count();

        assert_eq!(emitted, 1);
        assert_eq!(debouncer.stats().suppressed, 4);
        assert_eq!(debouncer.held(), Some(&[0x04, 0xAB, 0x3C, 0x9F][..]));
    }

    #[test]
    fn test_swap_without_gap_emits_again() {
        let mut debouncer = TagDebouncer::new();

        assert_eq!(debouncer.apply(Some(&uid(&[1, 2, 3, 4]))), Transition::Acquire);
        assert_eq!(debouncer.apply(Some(&uid(&[5, 6, 7, 8]))), Transition::Swap);
        assert_eq!(debouncer.stats().emitted, 2);
    }

    #[test]
    fn test_release_zeroes_buffer() {
        let mut debouncer = TagDebouncer::new();
        debouncer.apply(Some(&uid(&[0xFF; 7])));

        assert_eq!(debouncer.apply(None), Transition::Release);
        assert_eq!(debouncer, TagDebouncer {
            last_uid: [0; MAX_UID_BYTES],
            last_len: 0,
            stats: DebounceStats {
                emitted: 1,
                suppressed: 0,
                released: 1,
            },
        });
    }

    #[test]
    fn test_same_card_after_removal_emits_again() {
        let mut debouncer = TagDebouncer::new();
        let card = uid(&[0x12, 0x34]);

        debouncer.apply(Some(&card));
        debouncer.apply(None);
        assert_eq!(debouncer.apply(Some(&card)), Transition::Acquire);
    }

    #[rstest]
    #[case(&[0x04, 0x11, 0x22, 0x33], &[0x04, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66])]
    #[case(&[0x04, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66], &[0x04, 0x11, 0x22, 0x33])]
    #[case(&[0x00, 0x00], &[0x00, 0x00, 0x00, 0x00])]
    fn test_prefix_of_different_length_is_a_new_card(#[case] first: &[u8], #[case] second: &[u8]) {
        let mut debouncer = TagDebouncer::new();
        debouncer.apply(Some(&uid(first)));
        assert_eq!(debouncer.evaluate(Some(&uid(second))), Transition::Swap);
    }

    #[test]
    fn test_evaluate_does_not_commit() {
        let mut debouncer = TagDebouncer::new();
        let card = uid(&[1, 2, 3, 4]);

        assert_eq!(debouncer.evaluate(Some(&card)), Transition::Acquire);
        assert_eq!(debouncer.evaluate(Some(&card)), Transition::Acquire);
        assert!(debouncer.is_idle());
        assert_eq!(debouncer.stats(), DebounceStats::default());

        debouncer.apply(Some(&card));
        assert_eq!(debouncer.evaluate(Some(&card)), Transition::Hold);
    }
}
