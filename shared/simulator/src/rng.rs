use rand::SeedableRng;

pub use rand_chacha::ChaCha8Rng as SeededRng;

pub fn new_rng(seed: u64) -> SeededRng {
    SeededRng::seed_from_u64(seed)
}

/// Mixes the battle seed with an avatar index so that every avatar draws from
/// its own stream.
pub fn avatar_seed(seed: u64, index: usize) -> u64 {
    seed ^ (index as u64 + 1).wrapping_mul(0x9e37_79b9_7f4a_7c15)
}
