use std::hash::Hasher;

/// A hasher optimized for hashing component type IDs, which are already
/// the output of a 64-bit hash function.
#[derive(Default)]
pub struct ComponentTypeIdHasher(u64);

impl Hasher for ComponentTypeIdHasher {
    fn finish(&self) -> u64 { self.0 }

    fn write(&mut self, bytes: &[u8]) {
        self.0 = u64::from_ne_bytes(bytes.try_into().unwrap());
    }

    fn write_u64(&mut self, value: u64) { self.0 = value; }
}

/// A hasher optimized for types that are represented as a u64.
#[derive(Default)]
pub struct U64Hasher(u64);

impl Hasher for U64Hasher {
    fn finish(&self) -> u64 { self.0 }

    fn write(&mut self, bytes: &[u8]) {
        let seed = u64::from_ne_bytes(bytes.try_into().unwrap());
        let max_prime = 11_400_714_819_323_198_549u64;
        self.0 = max_prime.wrapping_mul(seed);
    }

    fn write_u64(&mut self, value: u64) {
        let max_prime = 11_400_714_819_323_198_549u64;
        self.0 = max_prime.wrapping_mul(value);
    }
}
