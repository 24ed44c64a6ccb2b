use crate::foundation::error::PixelsResult;

/// Outbound half of a message link to one die.
///
/// `send` hands one whole packet to the transport and returns once it is queued; delivery is not
/// guaranteed. Inbound packets arrive separately and are fed to [`crate::Die::on_data`].
pub trait Link: Send + Sync {
    /// Queue one packet for the die.
    fn send(&self, packet: &[u8]) -> PixelsResult<()>;
}
