//! Incremental MD5 with serializable mid-stream state.

use serde::{Deserialize, Serialize};

use super::BLOCK_SIZE;

const INITIAL_STATE: [u32; 4] = [0x6745_2301, 0xEFCD_AB89, 0x98BA_DCFE, 0x1032_5476];

/// Per-round left-rotation amounts.
const S: [u32; 64] = [
    7, 12, 17, 22, 7, 12, 17, 22, 7, 12, 17, 22, 7, 12, 17, 22, //
    5, 9, 14, 20, 5, 9, 14, 20, 5, 9, 14, 20, 5, 9, 14, 20, //
    4, 11, 16, 23, 4, 11, 16, 23, 4, 11, 16, 23, 4, 11, 16, 23, //
    6, 10, 15, 21, 6, 10, 15, 21, 6, 10, 15, 21, 6, 10, 15, 21,
];

/// Sine-derived round constants: `K[i] = floor(2^32 * |sin(i + 1)|)`.
const K: [u32; 64] = [
    0xD76A_A478, 0xE8C7_B756, 0x2420_70DB, 0xC1BD_CEEE, //
    0xF57C_0FAF, 0x4787_C62A, 0xA830_4613, 0xFD46_9501, //
    0x6980_98D8, 0x8B44_F7AF, 0xFFFF_5BB1, 0x895C_D7BE, //
    0x6B90_1122, 0xFD98_7193, 0xA679_438E, 0x49B4_0821, //
    0xF61E_2562, 0xC040_B340, 0x265E_5A51, 0xE9B6_C7AA, //
    0xD62F_105D, 0x0244_1453, 0xD8A1_E681, 0xE7D3_FBC8, //
    0x21E1_CDE6, 0xC337_07D6, 0xF4D5_0D87, 0x455A_14ED, //
    0xA9E3_E905, 0xFCEF_A3F8, 0x676F_02D9, 0x8D2A_4C8A, //
    0xFFFA_3942, 0x8771_F681, 0x6D9D_6122, 0xFDE5_380C, //
    0xA4BE_EA44, 0x4BDE_CFA9, 0xF6BB_4B60, 0xBEBF_BC70, //
    0x289B_7EC6, 0xEAA1_27FA, 0xD4EF_3085, 0x0488_1D05, //
    0xD9D4_D039, 0xE6DB_99E5, 0x1FA2_7CF8, 0xC4AC_5665, //
    0xF429_2244, 0x432A_FF97, 0xAB94_23A7, 0xFC93_A039, //
    0x655B_59C3, 0x8F0C_CC92, 0xFFEF_F47D, 0x8584_5DD1, //
    0x6FA8_7E4F, 0xFE2C_E6E0, 0xA301_4314, 0x4E08_11A1, //
    0xF753_7E82, 0xBD3A_F235, 0x2AD7_D2BB, 0xEB86_D391,
];

/// Restartable MD5.
///
/// Same suspend/resume contract as [`Sha1`](super::Sha1); MD5 works on
/// little-endian words and appends the little-endian bit length.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Md5 {
    state: [u32; 4],
    /// Bytes not yet consumed by the compression function; always < 64.
    pending: Vec<u8>,
    /// Total bytes fed in over the digest's lifetime.
    length: u64,
}

impl Md5 {
    /// Output size in bytes.
    pub const DIGEST_SIZE: usize = 16;

    pub fn new() -> Self {
        Self {
            state: INITIAL_STATE,
            pending: Vec::new(),
            length: 0,
        }
    }

    /// Append bytes to the running hash.
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

    /// Finalize a copy of the state and return the 16-byte digest.
    ///
    /// Non-destructive; see [`Sha1::digest`](super::Sha1::digest).
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
        block.extend_from_slice(&(self.length.wrapping_mul(8)).to_le_bytes());
        compress(&mut state, &block);

        let mut out = [0u8; Self::DIGEST_SIZE];
        for (chunk, word) in out.chunks_exact_mut(4).zip(state.iter()) {
            chunk.copy_from_slice(&word.to_le_bytes());
        }
        out
    }

    /// Lowercase hex rendition of [`digest`](Self::digest).
    pub fn hexdigest(&self) -> String {
        hex::encode(self.digest())
    }
}

impl Default for Md5 {
    fn default() -> Self {
        Self::new()
    }
}

fn compress(state: &mut [u32; 4], block: &[u8]) {
    debug_assert_eq!(block.len(), BLOCK_SIZE);

    let mut m = [0u32; 16];
    for (t, chunk) in block.chunks_exact(4).enumerate() {
        m[t] = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
    }

    let [mut a, mut b, mut c, mut d] = *state;

    for i in 0..64 {
        let (f, g) = match i {
            0..=15 => ((b & c) | (!b & d), i),
            16..=31 => ((d & b) | (!d & c), (5 * i + 1) % 16),
            32..=47 => (b ^ c ^ d, (3 * i + 5) % 16),
            _ => (c ^ (b | !d), (7 * i) % 16),
        };
        let rotated = a
            .wrapping_add(f)
            .wrapping_add(K[i])
            .wrapping_add(m[g])
            .rotate_left(S[i]);
        let next_b = b.wrapping_add(rotated);
        a = d;
        d = c;
        c = b;
        b = next_b;
    }

    state[0] = state[0].wrapping_add(a);
    state[1] = state[1].wrapping_add(b);
    state[2] = state[2].wrapping_add(c);
    state[3] = state[3].wrapping_add(d);
}
