//! Dataset and preview-animation uploads layered on the bulk transfer.

use tokio::time::Instant;

use crate::dataset::DataSet;
use crate::encode::fingerprint::content_hash;
use crate::encode::writer::{write_dataset, write_test_animation};
use crate::foundation::error::{PixelsError, PixelsResult};
use crate::link::die::Die;
use crate::link::dispatch::Waiter;
use crate::protocol::messages::{
    AnimSetHeader, Message, MessageType, TestAnimAck, TestAnimSetHeader,
};

/// How a preview upload ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TestAnimTransfer {
    /// The animation was sent and the die confirmed it.
    Downloaded,
    /// The die already held identical content; nothing was sent.
    UpToDate,
}

impl Die {
    /// Replace the die's dataset.
    ///
    /// Announces the pool sizes, waits once for the die to accept, streams the serialized
    /// dataset and waits for the die to confirm it has stored it.
    #[tracing::instrument(skip(self, ds, progress), fields(die = %self.name()))]
    pub async fn upload_dataset(
        &self,
        ds: &DataSet,
        mut progress: impl FnMut(f32) + Send,
    ) -> PixelsResult<()> {
        ds.validate()?;
        let header = AnimSetHeader::for_dataset(ds);
        let bytes = write_dataset(ds);

        let op = self.begin_operation("upload_dataset").await?;
        let result = self.upload_dataset_inner(header, &bytes, &mut progress).await;
        op.finish(result)
    }

    async fn upload_dataset_inner(
        &self,
        header: AnimSetHeader,
        bytes: &[u8],
        progress: &mut (dyn FnMut(f32) + Send),
    ) -> PixelsResult<()> {
        let accept = self.opts().accept_timeout();
        match self
            .request(
                &Message::TransferAnimSet(header),
                MessageType::TransferAnimSetAck,
                accept,
            )
            .await?
        {
            Message::TransferAnimSetAck { accepted: true } => {}
            _ => {
                return Err(PixelsError::rejected(format!(
                    "die has no room for a {} byte dataset",
                    bytes.len()
                )));
            }
        }
        tracing::debug!(len = bytes.len(), "dataset accepted");

        let finished = self.expect(MessageType::TransferAnimSetFinished);
        self.upload_bulk(bytes, progress).await?;
        self.wait_finished(finished).await
    }

    /// Send a single-animation dataset for immediate playback.
    ///
    /// The announcement carries a content hash; when the die already holds the same bytes it
    /// answers `UpToDate` and no data is sent.
    #[tracing::instrument(skip(self, ds, progress), fields(die = %self.name()))]
    pub async fn play_test_animation(
        &self,
        ds: &DataSet,
        mut progress: impl FnMut(f32) + Send,
    ) -> PixelsResult<TestAnimTransfer> {
        ds.validate()?;
        let bytes = write_test_animation(ds)?;
        let hash = content_hash(&bytes);
        let header = TestAnimSetHeader::for_dataset(ds, hash);

        let op = self.begin_operation("play_test_animation").await?;
        let result = self
            .play_test_animation_inner(header, &bytes, &mut progress)
            .await;
        op.finish(result)
    }

    async fn play_test_animation_inner(
        &self,
        header: TestAnimSetHeader,
        bytes: &[u8],
        progress: &mut (dyn FnMut(f32) + Send),
    ) -> PixelsResult<TestAnimTransfer> {
        let accept = self.opts().accept_timeout();
        let ack = match self
            .request(
                &Message::TransferTestAnimSet(header),
                MessageType::TransferTestAnimSetAck,
                accept,
            )
            .await?
        {
            Message::TransferTestAnimSetAck(ack) => ack,
            other => return Err(PixelsError::decode(format!("unexpected reply {other:?}"))),
        };
        tracing::debug!(?ack, hash = header.hash, "test animation ack");

        match ack {
            TestAnimAck::NoMemory => Err(PixelsError::rejected(format!(
                "die has no room for a {} byte test animation",
                bytes.len()
            ))),
            TestAnimAck::UpToDate => Ok(TestAnimTransfer::UpToDate),
            TestAnimAck::Download => {
                let finished = self.expect(MessageType::TransferTestAnimSetFinished);
                self.upload_bulk(bytes, progress).await?;
                self.wait_finished(finished).await?;
                Ok(TestAnimTransfer::Downloaded)
            }
        }
    }

    async fn wait_finished(&self, mut finished: Waiter) -> PixelsResult<()> {
        let timeout = self.opts().finished_timeout();
        match finished.next(timeout.map(|t| Instant::now() + t)).await {
            Some(_) => Ok(()),
            None => Err(PixelsError::ProtocolTimeout {
                awaiting: finished.kind(),
                timeout: timeout.unwrap_or_default(),
            }),
        }
    }
}
