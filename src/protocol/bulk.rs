//! Stop-and-wait chunked transfer of an arbitrary byte buffer.
//!
//! Upload: `BulkSetup{size}` until `BulkSetupAck`, then one `BulkData` per chunk in increasing
//! offset order, each resent until its `BulkDataAck{offset}` arrives. Any message that exhausts
//! its attempts aborts the transfer. Download mirrors this on the receiving side.

use tokio::time::Instant;

use crate::foundation::error::{PixelsError, PixelsResult};
use crate::link::die::Die;
use crate::protocol::messages::{Message, MessageType};

impl Die {
    /// Upload `data` as one bulk transfer.
    ///
    /// `progress` receives the acknowledged fraction after every chunk.
    pub async fn upload_bulk_data(
        &self,
        data: &[u8],
        mut progress: impl FnMut(f32) + Send,
    ) -> PixelsResult<()> {
        let op = self.begin_operation("upload_bulk_data").await?;
        let result = self.upload_bulk(data, &mut progress).await;
        op.finish(result)
    }

    /// Receive one bulk transfer initiated by the die.
    ///
    /// Waits without a deadline for `BulkSetup`; once the transfer has started, each chunk must
    /// arrive within the query timeout.
    pub async fn download_bulk_data(&self) -> PixelsResult<Vec<u8>> {
        let op = self.begin_operation("download_bulk_data").await?;
        let result = self.download_bulk().await;
        op.finish(result)
    }

    #[tracing::instrument(skip(self, data, progress), fields(die = %self.name(), len = data.len()))]
    pub(crate) async fn upload_bulk(
        &self,
        data: &[u8],
        progress: &mut (dyn FnMut(f32) + Send),
    ) -> PixelsResult<()> {
        let size = i16::try_from(data.len()).map_err(|_| {
            PixelsError::validation(format!(
                "bulk transfer of {} bytes exceeds {} byte limit",
                data.len(),
                i16::MAX
            ))
        })?;

        self.send_with_ack_retry(
            &Message::BulkSetup { size },
            MessageType::BulkSetupAck,
            |_| true,
        )
        .await?;
        tracing::debug!("setup acknowledged");

        let chunk_max = self.opts().chunk_max;
        let total = data.len();
        let mut offset = 0usize;
        while offset < total {
            let len = chunk_max.min(total - offset);
            // Bounded by the i16 size check above.
            let wire_offset = offset as u16;
            self.send_with_ack_retry(
                &Message::BulkData {
                    offset: wire_offset,
                    payload: data[offset..offset + len].to_vec(),
                },
                MessageType::BulkDataAck,
                |m| matches!(m, Message::BulkDataAck { offset } if *offset == wire_offset),
            )
            .await?;
            offset += len;
            progress(offset as f32 / total as f32);
        }
        tracing::debug!("bulk upload complete");
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(die = %self.name()))]
    pub(crate) async fn download_bulk(&self) -> PixelsResult<Vec<u8>> {
        // Both waiters exist before the setup ack goes out so no chunk can slip past.
        let mut setup = self.expect(MessageType::BulkSetup);
        let mut chunks = self.expect(MessageType::BulkData);

        let size = match setup.next(None).await {
            Some(Message::BulkSetup { size }) => usize::try_from(size)
                .map_err(|_| PixelsError::decode(format!("negative bulk size {size}")))?,
            _ => return Err(PixelsError::link("inbound channel closed")),
        };
        drop(setup);
        self.post(&Message::BulkSetupAck)?;
        tracing::debug!(size, "download started");

        let idle = self.opts().query_timeout();
        let mut buf = vec![0u8; size];
        let mut received = 0usize;
        while received < size {
            let Some(msg) = chunks.next(Some(Instant::now() + idle)).await else {
                return Err(PixelsError::ProtocolTimeout {
                    awaiting: chunks.kind(),
                    timeout: idle,
                });
            };
            let Message::BulkData { offset, payload } = msg else {
                continue;
            };
            let start = usize::from(offset);
            if start < received {
                // Our ack was lost and the die resent; acknowledge again without recounting.
                tracing::debug!(offset, "duplicate chunk");
                self.post(&Message::BulkDataAck { offset })?;
                continue;
            }
            if start > received || start + payload.len() > size {
                tracing::warn!(offset, len = payload.len(), received, "out-of-order chunk ignored");
                continue;
            }
            buf[start..start + payload.len()].copy_from_slice(&payload);
            received += payload.len();
            self.post(&Message::BulkDataAck { offset })?;
        }
        tracing::debug!("download complete");
        Ok(buf)
    }
}
