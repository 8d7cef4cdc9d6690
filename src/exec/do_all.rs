//! Conflict-free parallel iteration.
//!
//! `do_all` is the degenerate schedule for operators with no shared-state
//! conflicts and no follow-up work: a static block partition of the input,
//! no worklist, no contexts, no abort path. Verification passes and
//! initialization sweeps use it.

/// Applies `f` to every item of `items` in parallel.
///
/// `threads == 0` selects the machine's available parallelism. With the
/// `parallel` feature enabled the global rayon pool is used instead and
/// `threads` is only a hint.
pub fn do_all<T, F>(threads: usize, items: &[T], f: F)
where
    T: Sync,
    F: Fn(&T) + Send + Sync,
{
    #[cfg(feature = "parallel")]
    {
        let _ = threads;
        use rayon::prelude::*;
        items.par_iter().for_each(|item| f(item));
    }

    #[cfg(not(feature = "parallel"))]
    {
        let threads = if threads != 0 {
            threads
        } else {
            std::thread::available_parallelism()
                .map(std::num::NonZeroUsize::get)
                .unwrap_or(1)
        };
        if threads <= 1 || items.len() <= 1 {
            for item in items {
                f(item);
            }
            return;
        }
        let per = items.len().div_ceil(threads);
        let f = &f;
        std::thread::scope(|scope| {
            for block in items.chunks(per) {
                scope.spawn(move || {
                    for item in block {
                        f(item);
                    }
                });
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[test]
    fn sums_across_threads() {
        let items: Vec<u64> = (1..=100).collect();
        let total = AtomicU64::new(0);
        do_all(4, &items, |&x| {
            total.fetch_add(x, Ordering::Relaxed);
        });
        assert_eq!(total.load(Ordering::Relaxed), 5050);
    }

    #[test]
    fn empty_input_is_fine() {
        let items: Vec<u64> = Vec::new();
        do_all(2, &items, |_| unreachable!("no items to visit"));
    }
}
