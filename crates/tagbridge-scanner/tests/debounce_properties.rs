//! Property tests for duplicate suppression.

use proptest::prelude::*;
use tagbridge_core::Uid;
use tagbridge_scanner::{TagDebouncer, Transition};

fn uid_strategy() -> impl Strategy<Value = Uid> {
    prop::collection::vec(any::<u8>(), 1..=8).prop_map(|bytes| Uid::new(&bytes).unwrap())
}

/// A poll result: `None` is an empty field.
fn observation() -> impl Strategy<Value = Option<Uid>> {
    prop_oneof![
        1 => Just(None),
        3 => uid_strategy().prop_map(Some),
    ]
}

/// Events expected from a sequence: one per run of equal consecutive UIDs.
fn expected_events(observations: &[Option<Uid>]) -> usize {
    let mut previous: Option<&Uid> = None;
    let mut count = 0;
    for seen in observations {
        if let Some(uid) = seen {
            if previous != Some(uid) {
                count += 1;
            }
        }
        previous = seen.as_ref();
    }
    count
}

proptest! {
    #[test]
    fn test_one_event_per_presentation(observations in prop::collection::vec(observation(), 0..64)) {
        let mut debouncer = TagDebouncer::new();
        let emitted = observations
            .iter()
            .map(|seen| debouncer.apply(seen.as_ref()))
            .filter(Transition::emits_event)
            .count();

        prop_assert_eq!(emitted, expected_events(&observations));
    }

    #[test]
    fn test_repeated_uid_emits_once(uid in uid_strategy(), repeats in 1usize..50) {
        let mut debouncer = TagDebouncer::new();
        let emitted = (0..repeats)
            .map(|_| debouncer.apply(Some(&uid)))
            .filter(Transition::emits_event)
            .count();

        prop_assert_eq!(emitted, 1);
        prop_assert_eq!(debouncer.stats().suppressed, repeats as u64 - 1);
    }

    #[test]
    fn test_absent_always_resets(observations in prop::collection::vec(observation(), 0..32)) {
        let mut debouncer = TagDebouncer::new();
        for seen in &observations {
            debouncer.apply(seen.as_ref());
        }

        debouncer.apply(None);
        prop_assert!(debouncer.is_idle());
        prop_assert_eq!(debouncer.held(), None);
    }

    #[test]
    fn test_distinct_uids_emit_twice(first in uid_strategy(), second in uid_strategy()) {
        prop_assume!(first != second);

        let mut debouncer = TagDebouncer::new();
        prop_assert_eq!(debouncer.apply(Some(&first)), Transition::Acquire);
        prop_assert_eq!(debouncer.apply(Some(&second)), Transition::Swap);
        prop_assert_eq!(debouncer.held(), Some(second.as_bytes()));
    }

    #[test]
    fn test_evaluate_is_pure(
        observations in prop::collection::vec(observation(), 0..16),
        probe in observation(),
    ) {
        let mut debouncer = TagDebouncer::new();
        for seen in &observations {
            debouncer.apply(seen.as_ref());
        }

        let before = debouncer.clone();
        let _ = debouncer.evaluate(probe.as_ref());
        prop_assert_eq!(debouncer, before);
    }
}
