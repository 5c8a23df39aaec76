//! Binary gateway framing.
//!
//! One frame per notification, written over the pooled TLS connection. The
//! layout is fixed by the remote gateway and must not change:
//!
//! ```text
//! [0x00] [u16 BE token length = 32] [token] [u16 BE payload length] [payload]
//! ```

use bytes::{BufMut, BytesMut};
use tokio_util::codec::Encoder;

use crate::core::request::{NotificationRequest, DEVICE_TOKEN_LEN, MAX_PAYLOAD_BYTES};
use crate::error::RelayError;

/// Simple-notification command byte.
pub const FRAME_COMMAND: u8 = 0x00;

/// Encoder for [`NotificationRequest`] frames.
#[derive(Debug, Default, Clone, Copy)]
pub struct NotificationCodec;

impl Encoder<&NotificationRequest> for NotificationCodec {
    type Error = RelayError;

    fn encode(
        &mut self,
        request: &NotificationRequest,
        dst: &mut BytesMut,
    ) -> Result<(), Self::Error> {
        // Requests are validated at construction; re-check the external
        // contract before putting bytes on the wire.
        if request.payload.len() > MAX_PAYLOAD_BYTES {
            return Err(RelayError::OversizedPayload(request.payload.len()));
        }

        dst.reserve(1 + 2 + DEVICE_TOKEN_LEN + 2 + request.payload.len());
        dst.put_u8(FRAME_COMMAND);
        dst.put_u16(DEVICE_TOKEN_LEN as u16);
        dst.put_slice(&request.token);
        dst.put_u16(request.payload.len() as u16);
        dst.put_slice(&request.payload);
        Ok(())
    }
}
