//! # Restartable Digests
//!
//! From-scratch incremental SHA-1 and MD5 whose entire internal state is plain,
//! serializable data: the running hash words, the pending partial block, and a
//! total byte counter.
//!
//! The standard digest types in the ecosystem keep their accumulator opaque, so
//! a hash that is mid-stream cannot cross a serialization boundary. Connections
//! cached between workers carry exactly that kind of mid-stream state, which is
//! why these exist. The contract, for any byte sequences `A` and `B`:
//!
//! ```text
//! hash(A ‖ B) == restore(serialize(update(A))).update(B)
//! ```
//!
//! independent of where the split occurs. Finalization (`digest`/`hexdigest`)
//! pads a *copy* of the state, so it can be called any number of times without
//! disturbing further `update` calls.
//!
//! Both algorithms share the 64-byte block structure; they differ in word
//! endianness, round schedule, and output width.

mod md5;
mod sha1;

pub use md5::Md5;
pub use sha1::Sha1;

/// Common block size of both supported algorithms, in bytes.
pub const BLOCK_SIZE: usize = 64;
