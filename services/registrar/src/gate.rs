use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::chain::{self, ChainClient, CommandError};

/// Lower bound on the poll interval; the gate always sleeps between polls.
const MIN_POLL_EVERY: Duration = Duration::from_millis(1);

/// Height a gate waits for, fixed when the gate is created
#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
pub struct ConfirmationTarget {
    pub blocks_to_wait: u64,
    pub start_height: u64,
    pub target_height: u64,
}

impl ConfirmationTarget {
    pub fn new(start_height: u64, blocks_to_wait: u64) -> Self {
        Self {
            blocks_to_wait,
            start_height,
            target_height: start_height.saturating_add(blocks_to_wait),
        }
    }

    pub fn is_reached(&self, height: u64) -> bool {
        height >= self.target_height
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GateStatus {
    Pending { height: u64 },
    Reached { height: u64 },
}

#[derive(Debug, Error)]
pub enum GateError {
    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("cancelled while waiting for block {target_height}")]
    Cancelled { target_height: u64 },
}

/// Waits for a number of blocks on top of the height seen at creation.
///
/// The node only answers height queries, so the gate polls. The target is
/// never recomputed, so a reorg that lowers the height does not move it.
pub struct ConfirmationGate {
    chain: Arc<dyn ChainClient>,
    target: ConfirmationTarget,
    poll_every: Duration,
}

impl ConfirmationGate {
    /// Read the current height once and fix the target
    pub async fn create(
        chain: Arc<dyn ChainClient>,
        blocks_to_wait: u64,
        poll_every: Duration,
    ) -> Result<Self, CommandError> {
        let start = chain::block_height(chain.as_ref()).await?;
        let target = ConfirmationTarget::new(start, blocks_to_wait);
        info!(start_height = start, target_height = target.target_height, "gate: created");
        Ok(Self {
            chain,
            target,
            poll_every: poll_every.max(MIN_POLL_EVERY),
        })
    }

    pub fn target(&self) -> ConfirmationTarget {
        self.target
    }

    /// Single non-blocking height check
    pub async fn poll(&self) -> Result<GateStatus, CommandError> {
        let height = chain::block_height(self.chain.as_ref()).await?;
        if self.target.is_reached(height) {
            Ok(GateStatus::Reached { height })
        } else {
            Ok(GateStatus::Pending { height })
        }
    }

    /// Suspend until a polled height reaches the target, returning that height.
    ///
    /// Cancellation is observed between polls only, never during a node call.
    pub async fn await_reached(&self, cancel: &CancellationToken) -> Result<u64, GateError> {
        let target_height = self.target.target_height;
        loop {
            if cancel.is_cancelled() {
                return Err(GateError::Cancelled { target_height });
            }

            match self.poll().await? {
                GateStatus::Reached { height } => {
                    info!(height, target_height, "gate: reached");
                    return Ok(height);
                }
                GateStatus::Pending { height } => {
                    debug!(height, target_height, "gate: pending");
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => return Err(GateError::Cancelled { target_height }),
                _ = sleep(self.poll_every) => {}
            }
        }
    }
}
