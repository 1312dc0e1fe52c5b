//! Uniform random selection without replacement

use rand::seq::SliceRandom;
use rand::Rng;

/// Draw `amount` elements of `pool` uniformly at random, without replacement
pub fn sample<T: Clone>(pool: Vec<T>, amount: usize) -> Vec<T> {
    sample_with(&mut rand::thread_rng(), pool, amount)
}

/// [`sample`] with a caller-supplied generator
pub fn sample_with<T: Clone, R: Rng + ?Sized>(rng: &mut R, mut pool: Vec<T>, amount: usize) -> Vec<T> {
    let amount = amount.min(pool.len());
    // Partial Fisher-Yates: only `amount` swaps
    let (chosen, _) = pool.partial_shuffle(rng, amount);
    chosen.to_vec()
}
