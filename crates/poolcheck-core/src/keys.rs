//! Random cache keys, tags and values for verification runs.

use rand::Rng;

/// `len` random bytes rendered as lowercase hex.
pub fn random_hex(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len).map(|_| format!("{:02x}", rng.gen::<u8>())).collect()
}

/// A key such as `cache_key_9f0c12ab34cd56ef_417`.
pub fn random_cache_key(prefix: &str) -> String {
    let n = rand::thread_rng().gen_range(100..=999);
    format!("{prefix}{}_{n}", random_hex(8))
}
