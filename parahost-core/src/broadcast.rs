//! # Broadcast Channel
//!
//! Replicates a byte payload owned by the coordinator to every rank, in two
//! strictly ordered phases:
//!
//! 1. the payload length is broadcast as a fixed-width `u64`;
//! 2. every non-coordinator allocates a buffer of exactly that length and the
//!    payload bytes are broadcast into it.
//!
//! No rank touches payload bytes before it knows their final size. Any fault
//! aborts the whole job through [`Communicator::abort`]; there is no
//! partial-success path.

use thiserror::Error;
use tracing::{debug, error};

use crate::fabric::{Communicator, FabricError};

/// Rank that owns broadcast payloads.
pub const COORDINATOR: usize = 0;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BroadcastError {
    #[error("coordinator rank {0} supplied no payload")]
    MissingPayload(usize),
    #[error("root rank {root} is outside a world of size {size}")]
    InvalidRoot { root: usize, size: usize },
    #[error("payload length {0} does not fit in memory on this rank")]
    LengthOverflow(u64),
    #[error(transparent)]
    Fabric(#[from] FabricError),
}

pub type BroadcastResult<T> = Result<T, BroadcastError>;

/// Broadcasts `payload` from `root` and returns this rank's copy.
///
/// Only the root's `payload` is read; other ranks should pass `None`. The
/// root's buffer is never mutated: it receives a fresh copy like every
/// other rank.
#[tracing::instrument(level = "debug", skip(comm, payload), fields(rank = comm.rank()))]
pub async fn broadcast_bytes(
    comm: &dyn Communicator,
    payload: Option<&[u8]>,
    root: usize,
) -> BroadcastResult<Vec<u8>> {
    match exchange(comm, payload, root).await {
        Ok(buffer) => Ok(buffer),
        Err(e) => {
            error!(rank = comm.rank(), "broadcast failed: {}", e);
            comm.abort(&e.to_string());
            Err(e)
        }
    }
}

async fn exchange(
    comm: &dyn Communicator,
    payload: Option<&[u8]>,
    root: usize,
) -> BroadcastResult<Vec<u8>> {
    let size = comm.size();
    if root >= size {
        return Err(BroadcastError::InvalidRoot { root, size });
    }

    if comm.rank() == root {
        let payload = payload.ok_or(BroadcastError::MissingPayload(root))?;
        let len = comm.broadcast_len(Some(payload.len() as u64), root).await?;
        debug!(len, "length sent");
        let mut buffer = payload.to_vec();
        comm.broadcast_buf(&mut buffer, root).await?;
        return Ok(buffer);
    }

    let len = comm.broadcast_len(None, root).await?;
    let len = usize::try_from(len).map_err(|_| BroadcastError::LengthOverflow(len))?;
    debug!(len, "length received");
    let mut buffer = vec![0u8; len];
    comm.broadcast_buf(&mut buffer, root).await?;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fabric::{Fabric, ThreadLevel, serial::SerialFabric};

    #[tokio::test]
    async fn test_serial_broadcast_is_identity() {
        let mut fabric = SerialFabric::new();
        fabric.init(ThreadLevel::Single).unwrap();
        let world = fabric.world().unwrap();

        let payload = b"print(1);".to_vec();
        let copy = broadcast_bytes(world.as_ref(), Some(&payload), COORDINATOR)
            .await
            .unwrap();
        assert_eq!(copy, payload);
    }

    #[tokio::test]
    async fn test_coordinator_without_payload() {
        let mut fabric = SerialFabric::new();
        fabric.init(ThreadLevel::Single).unwrap();
        let world = fabric.world().unwrap();

        assert_eq!(
            broadcast_bytes(world.as_ref(), None, COORDINATOR).await,
            Err(BroadcastError::MissingPayload(0))
        );
        assert_eq!(
            broadcast_bytes(world.as_ref(), Some(b"x"), 2).await,
            Err(BroadcastError::InvalidRoot { root: 2, size: 1 })
        );
    }
}
