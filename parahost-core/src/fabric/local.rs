//! An in-process fabric hosting N ranks, one tokio task per rank.
//!
//! Collectives are matched by a per-rank sequence number: every rank issues
//! the same collectives in the same order, so the n-th collective on each rank
//! refers to the same slot. The root posts its message into the slot and every
//! other rank takes a copy; the last reader clears the slot.

use std::sync::{
    Arc, OnceLock,
    atomic::{AtomicBool, AtomicU64, Ordering},
};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::Notify;
use tracing::{debug, error};

use super::{Communicator, Fabric, FabricError, FabricResult, ThreadLevel};

#[derive(Debug, Clone)]
enum Message {
    Len(u64),
    Bytes(Arc<[u8]>),
}

#[derive(Debug)]
struct Slot {
    message: Message,
    pending: usize,
}

#[derive(Debug)]
struct Shared {
    size: usize,
    granted: Option<ThreadLevel>,
    slots: DashMap<u64, Slot>,
    notify: Notify,
    aborted: AtomicBool,
    reason: OnceLock<String>,
}

impl Shared {
    fn abort(&self, reason: &str) {
        if self.reason.set(reason.to_string()).is_ok() {
            error!(reason, "local fabric aborted");
        }
        self.aborted.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    fn check_aborted(&self) -> FabricResult<()> {
        if self.aborted.load(Ordering::SeqCst) {
            let reason = self.reason.get().cloned().unwrap_or_default();
            return Err(FabricError::Aborted(reason));
        }
        Ok(())
    }
}

/// One rank's endpoint of a [`LocalFabric`] group.
#[derive(Debug)]
pub struct LocalFabric {
    shared: Arc<Shared>,
    rank: usize,
    initialized: bool,
    world: OnceLock<Arc<LocalCommunicator>>,
}

impl LocalFabric {
    /// Creates `size` connected endpoints, indexed by rank.
    ///
    /// `granted` fixes the thread level every endpoint grants; `None` grants
    /// whatever is requested.
    pub fn create(size: usize, granted: Option<ThreadLevel>) -> FabricResult<Vec<LocalFabric>> {
        if size == 0 {
            return Err(FabricError::InvalidWorldSize(size));
        }
        let shared = Arc::new(Shared {
            size,
            granted,
            slots: DashMap::new(),
            notify: Notify::new(),
            aborted: AtomicBool::new(false),
            reason: OnceLock::new(),
        });
        Ok((0..size)
            .map(|rank| LocalFabric {
                shared: shared.clone(),
                rank,
                initialized: false,
                world: OnceLock::new(),
            })
            .collect())
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn abort_handle(&self) -> LocalAbortHandle {
        LocalAbortHandle {
            shared: self.shared.clone(),
        }
    }
}

impl Fabric for LocalFabric {
    fn init(&mut self, requested: ThreadLevel) -> FabricResult<ThreadLevel> {
        self.shared.check_aborted()?;
        self.initialized = true;
        Ok(self.shared.granted.unwrap_or(requested))
    }

    fn world(&self) -> FabricResult<Arc<dyn Communicator>> {
        if !self.initialized {
            return Err(FabricError::NotInitialized);
        }
        let world = self.world.get_or_init(|| {
            Arc::new(LocalCommunicator {
                shared: self.shared.clone(),
                rank: self.rank,
                sequence: AtomicU64::new(0),
            })
        });
        Ok(world.clone())
    }

    fn finalize(&mut self) -> FabricResult<()> {
        self.initialized = false;
        debug!(rank = self.rank, "local fabric endpoint finalized");
        Ok(())
    }
}

/// Aborts a whole [`LocalFabric`] group from outside any rank.
#[derive(Debug, Clone)]
pub struct LocalAbortHandle {
    shared: Arc<Shared>,
}

impl LocalAbortHandle {
    pub fn abort(&self, reason: &str) {
        self.shared.abort(reason);
    }

    pub fn is_aborted(&self) -> bool {
        self.shared.aborted.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
pub struct LocalCommunicator {
    shared: Arc<Shared>,
    rank: usize,
    sequence: AtomicU64,
}

impl LocalCommunicator {
    fn check_root(&self, root: usize) -> FabricResult<()> {
        if root >= self.shared.size {
            return Err(FabricError::InvalidRoot {
                root,
                size: self.shared.size,
            });
        }
        Ok(())
    }

    fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::SeqCst)
    }

    fn post(&self, sequence: u64, message: Message) -> FabricResult<()> {
        self.shared.check_aborted()?;
        let pending = self.shared.size - 1;
        if pending > 0 {
            self.shared.slots.insert(sequence, Slot { message, pending });
            self.shared.notify.notify_waiters();
        }
        Ok(())
    }

    fn take(&self, sequence: u64) -> Option<Message> {
        let message = {
            let mut slot = self.shared.slots.get_mut(&sequence)?;
            slot.pending -= 1;
            slot.message.clone()
        };
        self.shared
            .slots
            .remove_if(&sequence, |_, slot| slot.pending == 0);
        Some(message)
    }

    async fn receive(&self, sequence: u64) -> FabricResult<Message> {
        loop {
            let notified = self.shared.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            self.shared.check_aborted()?;
            if let Some(message) = self.take(sequence) {
                return Ok(message);
            }
            notified.await;
        }
    }
}

#[async_trait]
impl Communicator for LocalCommunicator {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.shared.size
    }

    #[tracing::instrument(level = "debug", skip(self), fields(rank = self.rank))]
    async fn broadcast_len(&self, len: Option<u64>, root: usize) -> FabricResult<u64> {
        self.check_root(root)?;
        let sequence = self.next_sequence();
        if self.rank == root {
            let len = len.ok_or(FabricError::MissingLength { rank: self.rank })?;
            self.post(sequence, Message::Len(len))?;
            return Ok(len);
        }
        match self.receive(sequence).await? {
            Message::Len(len) => Ok(len),
            Message::Bytes(_) => Err(FabricError::Protocol { sequence }),
        }
    }

    #[tracing::instrument(level = "debug", skip(self, buf), fields(rank = self.rank, len = buf.len()))]
    async fn broadcast_buf(&self, buf: &mut [u8], root: usize) -> FabricResult<()> {
        self.check_root(root)?;
        let sequence = self.next_sequence();
        if self.rank == root {
            return self.post(sequence, Message::Bytes(Arc::from(&buf[..])));
        }
        match self.receive(sequence).await? {
            Message::Bytes(bytes) if bytes.len() == buf.len() => {
                buf.copy_from_slice(&bytes);
                Ok(())
            }
            Message::Bytes(bytes) => Err(FabricError::SizeMismatch {
                expected: bytes.len(),
                actual: buf.len(),
            }),
            Message::Len(_) => Err(FabricError::Protocol { sequence }),
        }
    }

    fn abort(&self, reason: &str) {
        self.shared.abort(reason);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn worlds(size: usize) -> Vec<Arc<dyn Communicator>> {
        LocalFabric::create(size, None)
            .unwrap()
            .into_iter()
            .map(|mut fabric| {
                fabric.init(ThreadLevel::Single).unwrap();
                fabric.world().unwrap()
            })
            .collect()
    }

    #[test]
    fn test_empty_world_rejected() {
        assert_eq!(
            LocalFabric::create(0, None).unwrap_err(),
            FabricError::InvalidWorldSize(0)
        );
    }

    #[test]
    fn test_granted_level_is_fixed() {
        let mut fabrics = LocalFabric::create(2, Some(ThreadLevel::Funneled)).unwrap();
        assert_eq!(
            fabrics[1].init(ThreadLevel::Multiple).unwrap(),
            ThreadLevel::Funneled
        );
    }

    #[tokio::test]
    async fn test_length_reaches_every_rank() {
        let mut tasks = Vec::new();
        for world in worlds(3) {
            tasks.push(tokio::spawn(async move {
                let len = (world.rank() == 0).then_some(42);
                world.broadcast_len(len, 0).await
            }));
        }
        for task in tasks {
            assert_eq!(task.await.unwrap().unwrap(), 42);
        }
    }

    #[tokio::test]
    async fn test_size_mismatch_leaves_buffer_untouched() {
        let worlds = worlds(2);
        let root = worlds[0].clone();
        let receiver = worlds[1].clone();

        let mut payload = *b"hello";
        root.broadcast_buf(&mut payload, 0).await.unwrap();

        let mut short = [0u8; 3];
        assert_eq!(
            receiver.broadcast_buf(&mut short, 0).await.unwrap_err(),
            FabricError::SizeMismatch {
                expected: 5,
                actual: 3
            }
        );
        assert_eq!(short, [0u8; 3]);
    }

    #[tokio::test]
    async fn test_abort_fails_pending_collectives() {
        let worlds = worlds(2);
        let receiver = worlds[1].clone();
        let pending = tokio::spawn(async move { receiver.broadcast_len(None, 0).await });

        tokio::task::yield_now().await;
        worlds[0].abort("rank 0 gave up");

        assert_eq!(
            pending.await.unwrap().unwrap_err(),
            FabricError::Aborted("rank 0 gave up".to_string())
        );
        assert!(matches!(
            worlds[0].broadcast_len(Some(1), 0).await,
            Err(FabricError::Aborted(_))
        ));
    }
}
