//! Starts one [`Bootstrap`] per rank and folds their exit statuses into the
//! single status of the job.
//!
//! One rank runs over a [`SerialFabric`]. More ranks share a [`LocalFabric`],
//! one tokio task per rank. The first rank to finish with a failure decides
//! the job status and aborts the fabric, so ranks blocked in a collective
//! waiting for it fail instead of hanging.

use std::ffi::OsString;

use tokio::task::JoinSet;
use tracing::{Instrument, error, info, info_span, warn};

use crate::bootstrap::{Bootstrap, ExitStatus};
use crate::capability::CapabilitySet;
use crate::config::HostConfig;
use crate::fabric::Fabric;
use crate::fabric::local::LocalFabric;
use crate::fabric::serial::SerialFabric;

pub struct Launcher {
    config: HostConfig,
    flags: CapabilitySet,
}

impl Launcher {
    pub fn new(config: HostConfig) -> Self {
        Self {
            config,
            flags: CapabilitySet::compiled(),
        }
    }

    pub fn with_capabilities(mut self, flags: CapabilitySet) -> Self {
        self.flags = flags;
        self
    }

    fn bootstrap(&self, fabric: Box<dyn Fabric>) -> Bootstrap {
        Bootstrap::new(self.config.clone(), fabric).with_capabilities(self.flags)
    }

    pub async fn run(self, args: Vec<OsString>) -> ExitStatus {
        let size = self.config.fabric.world_size;
        if size == 1 {
            return self.bootstrap(Box::new(SerialFabric::new())).run(args).await;
        }
        if !self.flags.contains(CapabilitySet::DISTRIBUTED) {
            error!(size, "multi-rank world requested without the distributed capability");
            eprintln!("parahost: {} ranks requested but this build is serial", size);
            return ExitStatus::FabricInitFailure;
        }
        let fabrics = match LocalFabric::create(size, self.config.fabric.granted_thread_level) {
            Ok(fabrics) => fabrics,
            Err(e) => {
                error!("fabric creation failed: {}", e);
                eprintln!("parahost: fabric initialization failed: {}", e);
                return ExitStatus::FabricInitFailure;
            }
        };

        let mut abort = None;
        let mut tasks = JoinSet::new();
        for fabric in fabrics {
            let rank = fabric.rank();
            abort.get_or_insert_with(|| fabric.abort_handle());
            let bootstrap = self.bootstrap(Box::new(fabric));
            let args = args.clone();
            tasks.spawn(
                async move { (rank, bootstrap.run(args).await) }
                    .instrument(info_span!("rank", rank)),
            );
        }
        info!(size, "ranks launched");

        let mut coordinated = ExitStatus::Success;
        loop {
            let next = if coordinated.is_success() {
                tasks.join_next().await
            } else {
                match tokio::time::timeout(self.config.shutdown_timeout, tasks.join_next()).await {
                    Ok(next) => next,
                    Err(_) => {
                        warn!(remaining = tasks.len(), "ranks slow to shut down");
                        tasks.join_next().await
                    }
                }
            };
            let Some(joined) = next else {
                break;
            };

            let (reason, status) = match joined {
                Ok((rank, status)) => (format!("rank {} exited with {}", rank, status), status),
                Err(e) => {
                    error!("rank task failed: {}", e);
                    (format!("rank task failed: {}", e), ExitStatus::ExecutionFailure)
                }
            };
            if !status.is_success() && coordinated.is_success() {
                warn!(%status, "{}, aborting the job", reason);
                if let Some(abort) = &abort {
                    abort.abort(&reason);
                }
                coordinated = status;
            }
        }
        info!(%coordinated, "job finished");
        coordinated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn config(dir: &tempfile::TempDir, world_size: usize) -> HostConfig {
        let mut config = HostConfig::default();
        config.driver.search_paths = vec![dir.path().to_path_buf()];
        config.fabric.world_size = world_size;
        config
    }

    #[tokio::test]
    async fn test_serial_build_rejects_many_ranks() {
        let dir = tempfile::tempdir().unwrap();
        let status = Launcher::new(config(&dir, 2))
            .with_capabilities(CapabilitySet::empty())
            .run(Vec::new())
            .await;
        assert_eq!(status, ExitStatus::FabricInitFailure);
    }

    #[tokio::test]
    async fn test_zero_ranks() {
        let dir = tempfile::tempdir().unwrap();
        let status = Launcher::new(config(&dir, 0))
            .with_capabilities(CapabilitySet::DISTRIBUTED)
            .run(Vec::new())
            .await;
        assert_eq!(status, ExitStatus::FabricInitFailure);
    }

    #[tokio::test]
    async fn test_every_rank_agrees_on_rank_and_size() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("driver.phs"),
            r#"
            import _parahost;
            fn main() {
                let n = _parahost.size();
                if n != 3 { fail("bad size"); }
                let token = _parahost.globally_broadcast_bytes(bytes("from root"));
                if str(token) != "from root" { fail("bad payload"); }
            }
            "#,
        )
        .unwrap();
        let status = Launcher::new(config(&dir, 3))
            .with_capabilities(CapabilitySet::DISTRIBUTED)
            .run(Vec::new())
            .await;
        assert_eq!(status, ExitStatus::Success);
    }

    #[tokio::test]
    async fn test_one_failing_rank_fails_the_job() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("driver.phs"),
            r#"
            import _parahost;
            fn main() {
                if _parahost.rank() == 1 { fail("rank one diverged"); }
                _parahost.globally_broadcast_bytes(bytes("x"));
            }
            "#,
        )
        .unwrap();
        let status = Launcher::new(config(&dir, 2))
            .with_capabilities(CapabilitySet::DISTRIBUTED)
            .run(Vec::new())
            .await;
        assert_eq!(status, ExitStatus::ExecutionFailure);
    }
}
