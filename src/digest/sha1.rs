//! Incremental SHA-1 with serializable mid-stream state.

use serde::{Deserialize, Serialize};

use super::BLOCK_SIZE;

const INITIAL_STATE: [u32; 5] = [0x6745_2301, 0xEFCD_AB89, 0x98BA_DCFE, 0x1032_5476, 0xC3D2_E1F0];

/// Restartable SHA-1.
///
/// The struct derives `Serialize`/`Deserialize`; a restored value continues
/// hashing bit-identically to one that was never suspended. `Clone` yields an
/// independent digest sharing no state with the original.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sha1 {
    state: [u32; 5],
    /// Bytes not yet consumed by the compression function; always < 64.
    pending: Vec<u8>,
    /// Total bytes fed in over the digest's lifetime.
    length: u64,
}

impl Sha1 {
    /// Output size in bytes.
    pub const DIGEST_SIZE: usize = 20;

    pub fn new() -> Self {
        Self {
            state: INITIAL_STATE,
            pending: Vec::new(),
            length: 0,
        }
    }

    /// Append bytes to the running hash.
    ///
    /// Full 64-byte blocks are consumed immediately; the remainder waits in the
    /// pending buffer. No limit on total input length.
    pub fn update(&mut self, data: &[u8]) {
        self.length = self.length.wrapping_add(data.len() as u64);
        self.pending.extend_from_slice(data);

        let mut offset = 0;
        while self.pending.len() - offset >= BLOCK_SIZE {
            compress(&mut self.state, &self.pending[offset..offset + BLOCK_SIZE]);
            offset += BLOCK_SIZE;
        }
        self.pending.drain(..offset);
    }

    /// Finalize a copy of the state and return the 20-byte digest.
    ///
    /// Non-destructive: the live state is untouched, so `update` may continue
    /// afterwards as if this was never called.
    pub fn digest(&self) -> [u8; Self::DIGEST_SIZE] {
        let mut state = self.state;
        let mut block = self.pending.clone();
        block.push(0x80);

        if block.len() > BLOCK_SIZE - 8 {
            block.resize(BLOCK_SIZE, 0);
            compress(&mut state, &block);
            block.clear();
        }
        block.resize(BLOCK_SIZE - 8, 0);
        block.extend_from_slice(&(self.length.wrapping_mul(8)).to_be_bytes());
        compress(&mut state, &block);

        let mut out = [0u8; Self::DIGEST_SIZE];
        for (chunk, word) in out.chunks_exact_mut(4).zip(state.iter()) {
            chunk.copy_from_slice(&word.to_be_bytes());
        }
        out
    }

    /// Lowercase hex rendition of [`digest`](Self::digest).
    pub fn hexdigest(&self) -> String {
        hex::encode(self.digest())
    }
}

impl Default for Sha1 {
    fn default() -> Self {
        Self::new()
    }
}

fn compress(state: &mut [u32; 5], block: &[u8]) {
    debug_assert_eq!(block.len(), BLOCK_SIZE);

    let mut w = [0u32; 80];
    for (t, chunk) in block.chunks_exact(4).enumerate() {
        w[t] = u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
    }
    for t in 16..80 {
        w[t] = (w[t - 3] ^ w[t - 8] ^ w[t - 14] ^ w[t - 16]).rotate_left(1);
    }

    let [mut a, mut b, mut c, mut d, mut e] = *state;

    for (t, &word) in w.iter().enumerate() {
        let (f, k) = match t {
            0..=19 => ((b & c) | (!b & d), 0x5A82_7999),
            20..=39 => (b ^ c ^ d, 0x6ED9_EBA1),
            40..=59 => ((b & c) | (b & d) | (c & d), 0x8F1B_BCDC),
            _ => (b ^ c ^ d, 0xCA62_C1D6),
        };
        let temp = a
            .rotate_left(5)
            .wrapping_add(f)
            .wrapping_add(e)
            .wrapping_add(word)
            .wrapping_add(k);
        e = d;
        d = c;
        c = b.rotate_left(30);
        b = a;
        a = temp;
    }

    state[0] = state[0].wrapping_add(a);
    state[1] = state[1].wrapping_add(b);
    state[2] = state[2].wrapping_add(c);
    state[3] = state[3].wrapping_add(d);
    state[4] = state[4].wrapping_add(e);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_vectors() {
        assert_eq!(
            Sha1::new().hexdigest(),
            "da39a3ee5e6b4b0d3255bfef95601890afd80709"
        );

        let mut d = Sha1::new();
        d.update(b"abc");
        assert_eq!(d.hexdigest(), "a9993e364706816aba3e25717850c26c9cd0d89d");

        let mut d = Sha1::new();
        d.update(b"The quick brown fox jumps over the lazy dog");
        assert_eq!(d.hexdigest(), "2fd4e1c67a2d28fced849ee1bb76e7391b93eb12");
    }

    #[test]
    fn padding_boundaries() {
        // Lengths straddling the 55/56-byte padding cutoff and the block size.
        for len in [55usize, 56, 63, 64, 65] {
            let data = vec![b'a'; len];
            let mut whole = Sha1::new();
            whole.update(&data);

            let mut pieces = Sha1::new();
            for byte in &data {
                pieces.update(std::slice::from_ref(byte));
            }
            assert_eq!(whole.hexdigest(), pieces.hexdigest(), "length {len}");
        }
    }

    #[test]
    fn hexdigest_is_non_mutating() {
        let mut d = Sha1::new();
        d.update(b"hello ");
        let mid = d.hexdigest();
        assert_eq!(mid, d.hexdigest());

        d.update(b"world");
        let mut reference = Sha1::new();
        reference.update(b"hello world");
        assert_eq!(d.hexdigest(), reference.hexdigest());
    }

    #[test]
    fn clone_is_independent() {
        let mut original = Sha1::new();
        original.update(b"shared prefix");
        let mut fork = original.clone();

        fork.update(b" and more");
        let mut reference = Sha1::new();
        reference.update(b"shared prefix and more");

        assert_eq!(fork.hexdigest(), reference.hexdigest());

        let mut prefix_only = Sha1::new();
        prefix_only.update(b"shared prefix");
        assert_eq!(original.hexdigest(), prefix_only.hexdigest());
    }
}
