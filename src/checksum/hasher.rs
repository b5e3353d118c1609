// Hash algorithm adapters
// Puts the RustCrypto digests behind one object-safe trait

use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha512};

use super::ChecksumAlgorithm;

/// Trait for hash algorithm implementations
pub trait Hasher: Send {
    /// Update the hasher with new data
    fn update(&mut self, data: &[u8]);

    /// Finalize the hash and return the raw digest bytes
    fn finalize(self: Box<Self>) -> Vec<u8>;

    /// Get the output size in bytes
    fn output_size(&self) -> usize;
}

/// Wraps any RustCrypto `Digest` implementation.
pub struct DigestHasher<D>(D);

impl<D: Digest + Send> Hasher for DigestHasher<D> {
    fn update(&mut self, data: &[u8]) {
        Digest::update(&mut self.0, data);
    }

    fn finalize(self: Box<Self>) -> Vec<u8> {
        let inner = *self;
        Digest::finalize(inner.0).to_vec()
    }

    fn output_size(&self) -> usize {
        <D as Digest>::output_size()
    }
}

/// Create a fresh hasher for the given algorithm.
pub fn new_hasher(algorithm: ChecksumAlgorithm) -> Box<dyn Hasher> {
    match algorithm {
        ChecksumAlgorithm::Sha1 => Box::new(DigestHasher(Sha1::new())),
        ChecksumAlgorithm::Sha256 => Box::new(DigestHasher(Sha256::new())),
        ChecksumAlgorithm::Sha512 => Box::new(DigestHasher(Sha512::new())),
        ChecksumAlgorithm::Md5 => Box::new(DigestHasher(Md5::new())),
    }
}
