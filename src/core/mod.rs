//! # Core Notification Components
//!
//! Request construction and the binary wire frame.
//!
//! ## Components
//! - **Request**: device token decoding plus compact JSON payload assembly,
//!   with the 256-byte payload cap enforced up front
//! - **Frame**: the gateway's fixed binary framing as a tokio codec
//!
//! ## Wire Format
//! ```text
//! [Command(1)=0x00] [TokenLen(2,BE)=32] [Token(32)] [PayloadLen(2,BE)] [Payload(N)]
//! ```
//!
//! The format is an external contract and must stay bit-exact.

pub mod frame;
pub mod request;

pub use frame::NotificationCodec;
pub use request::{NotificationOptions, NotificationRequest};
