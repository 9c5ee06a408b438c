//! Random picks for shuffle and playlist fallback

use rand::seq::SliceRandom;
use rand::{thread_rng, Rng};

/// Uniformly random index in `0..len` other than `current`
///
/// Returns `None` when there is no other index to pick.
pub fn pick_other_index(len: usize, current: usize) -> Option<usize> {
    if len <= 1 {
        return None;
    }
    if current >= len {
        return Some(thread_rng().gen_range(0..len));
    }
    // Draw from len-1 slots and skip over the current one
    let pick = thread_rng().gen_range(0..len - 1);
    Some(if pick >= current { pick + 1 } else { pick })
}

/// Uniformly random element
pub fn pick_random<T>(items: &[T]) -> Option<&T> {
    items.choose(&mut thread_rng())
}
