use rand::RngCore;

/// Bytes of entropy per identifier
pub const ID_BYTES: usize = 16;

/// Object identifiers drawn from a worker-owned generator
#[derive(Debug)]
pub struct IdGenerator<R> {
    rng: R,
}

impl<R: RngCore> IdGenerator<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    /// 16 random bytes as 32 lowercase hex characters
    pub fn next_id(&mut self) -> String {
        let mut id = [0u8; ID_BYTES];
        self.rng.fill_bytes(&mut id);
        hex::encode(id)
    }

    pub fn rng_mut(&mut self) -> &mut R {
        &mut self.rng
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn ids_are_32_lowercase_hex() {
        let mut ids = IdGenerator::new(StdRng::from_entropy());
        for _ in 0..100 {
            let id = ids.next_id();
            assert_eq!(id.len(), 32);
            assert!(id.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)), "{}", id);
        }
    }

    #[test]
    fn successive_ids_differ() {
        let mut ids = IdGenerator::new(StdRng::seed_from_u64(7));
        let a = ids.next_id();
        let b = ids.next_id();
        assert_ne!(a, b);
    }

    #[test]
    fn independently_seeded_generators_diverge() {
        let mut first = IdGenerator::new(StdRng::seed_from_u64(1));
        let mut second = IdGenerator::new(StdRng::seed_from_u64(2));
        assert_ne!(first.next_id(), second.next_id());
    }
}
