use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error};

use super::{Communicator, Fabric, FabricError, FabricResult, ThreadLevel};

/// A one-rank fabric. Collectives are identity operations.
#[derive(Debug, Default)]
pub struct SerialFabric {
    world: Option<Arc<SerialCommunicator>>,
}

impl SerialFabric {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Fabric for SerialFabric {
    fn init(&mut self, requested: ThreadLevel) -> FabricResult<ThreadLevel> {
        self.world = Some(Arc::new(SerialCommunicator));
        Ok(requested)
    }

    fn world(&self) -> FabricResult<Arc<dyn Communicator>> {
        match &self.world {
            Some(world) => Ok(world.clone()),
            None => Err(FabricError::NotInitialized),
        }
    }

    fn finalize(&mut self) -> FabricResult<()> {
        self.world = None;
        Ok(())
    }
}

#[derive(Debug)]
pub struct SerialCommunicator;

impl SerialCommunicator {
    fn check_root(&self, root: usize) -> FabricResult<()> {
        if root != 0 {
            return Err(FabricError::InvalidRoot { root, size: 1 });
        }
        Ok(())
    }
}

#[async_trait]
impl Communicator for SerialCommunicator {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    async fn broadcast_len(&self, len: Option<u64>, root: usize) -> FabricResult<u64> {
        self.check_root(root)?;
        len.ok_or(FabricError::MissingLength { rank: 0 })
    }

    async fn broadcast_buf(&self, buf: &mut [u8], root: usize) -> FabricResult<()> {
        self.check_root(root)?;
        debug!(len = buf.len(), "serial broadcast");
        Ok(())
    }

    fn abort(&self, reason: &str) {
        error!(reason, "serial fabric abort");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_serial_world() {
        let mut fabric = SerialFabric::new();
        assert!(fabric.world().is_err());
        assert_eq!(fabric.init(ThreadLevel::Multiple).unwrap(), ThreadLevel::Multiple);

        let world = fabric.world().unwrap();
        assert_eq!((world.rank(), world.size()), (0, 1));
        assert_eq!(world.broadcast_len(Some(7), 0).await.unwrap(), 7);
        assert!(matches!(
            world.broadcast_len(None, 0).await,
            Err(FabricError::MissingLength { rank: 0 })
        ));
        let mut buf = *b"abc";
        assert!(matches!(
            world.broadcast_buf(&mut buf, 1).await,
            Err(FabricError::InvalidRoot { root: 1, size: 1 })
        ));
        fabric.finalize().unwrap();
        assert!(fabric.world().is_err());
    }
}
