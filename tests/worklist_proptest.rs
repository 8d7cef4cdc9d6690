//! Property tests for worklist completeness and ordered monotonicity.

use proptest::prelude::*;

use lockstep::worklist::{self, WorklistPolicy};

proptest! {
    /// Every pushed item is popped exactly once, whatever the chunking.
    #[test]
    fn chunked_pop_is_a_permutation_of_push(
        items in proptest::collection::vec(0u32..1000, 0..300),
        chunk in 1usize..65,
        lifo in any::<bool>(),
    ) {
        let policy = if lifo {
            WorklistPolicy::ChunkedLifo { chunk }
        } else {
            WorklistPolicy::ChunkedFifo { chunk }
        };
        let wl = worklist::build::<u32>(&policy, 2, None).expect("valid policy");
        for (i, &x) in items.iter().enumerate() {
            wl.push(i % 2, x);
        }
        let mut popped = Vec::new();
        // Drain with both workers so local pops and steals are exercised; a
        // worker's in-progress drain chunk is only reachable by that worker.
        loop {
            let mut any = false;
            for w in 0..2 {
                while let Some(x) = wl.pop(w) {
                    popped.push(x);
                    any = true;
                }
            }
            if !any {
                break;
            }
        }
        prop_assert!(wl.is_empty());
        let mut expected = items.clone();
        expected.sort_unstable();
        popped.sort_unstable();
        prop_assert_eq!(popped, expected);
    }

    /// Draining after all pushes yields keys in non-decreasing order.
    #[test]
    fn ordered_drain_is_monotone(
        items in proptest::collection::vec(0u64..50, 0..300),
        chunk in 1usize..33,
    ) {
        let indexer = worklist::indexer_from(|x: &u64| *x);
        let wl = worklist::build(
            &WorklistPolicy::OrderedByMetric { chunk },
            1,
            Some(indexer),
        )
        .expect("valid policy");
        for &x in &items {
            wl.push(0, x);
        }
        let mut last = 0u64;
        let mut count = 0usize;
        while let Some(x) = wl.pop(0) {
            prop_assert!(x >= last, "key {} popped after {}", x, last);
            last = x;
            count += 1;
        }
        prop_assert_eq!(count, items.len());
    }
}
