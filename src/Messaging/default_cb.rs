// Callbacks every messenger starts with.

use super::callback::CallbackInfo;
use super::message::Message;

/// Health check request; answered by [`health_check`].
pub const HEALTH_CHECK_REQ: i32 = 100;
/// Type of the health check answer.
pub const HEALTH_CHECK_RESP: i32 = 101;

/// Payload of a healthy answer, NUL included.
pub const HEALTH_OK: &[u8] = b"OK\n\0";

/// Answer a health check with "OK" to the endpoint that asked.
pub fn health_check(msg: &mut Message, info: CallbackInfo) {
    if let Err(e) = msg.send_response(Some(HEALTH_CHECK_RESP), Some(info.sub_id), None, Some(HEALTH_OK)) {
        tracing::warn!(error = %e, "health check response not sent");
    }
}
