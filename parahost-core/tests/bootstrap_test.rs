use std::collections::HashSet;
use std::ffi::OsString;
use std::fs;
use std::sync::Arc;

use parahost_core::capability::CapabilitySet;
use parahost_core::controller::{DriverStatus, MockEmbedding};
use parahost_core::fabric::serial::SerialFabric;
use parahost_core::fabric::{Communicator, Fabric, FabricError, MockFabric, ThreadLevel};
use parahost_core::lifecycle::{LifecycleError, LifecycleState};
use parahost_core::types::{TypeDescriptor, TypeReadinessSet};
use parahost_core::{Bootstrap, ExitStatus, HostConfig, Launcher};
use tempfile::TempDir;

fn serial_world() -> Arc<dyn Communicator> {
    let mut fabric = SerialFabric::new();
    fabric.init(ThreadLevel::Single).unwrap();
    fabric.world().unwrap()
}

/// A fabric that must be finalized exactly once.
fn counted_fabric() -> MockFabric {
    let mut fabric = MockFabric::new();
    fabric.expect_init().times(1).returning(|level| Ok(level));
    fabric.expect_world().returning(|| Ok(serial_world()));
    fabric.expect_finalize().times(1).returning(|| Ok(()));
    fabric
}

fn driver_dir(source: Option<&str>) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    if let Some(source) = source {
        fs::write(dir.path().join("driver.phs"), source).unwrap();
    }
    dir
}

fn config(dir: &TempDir) -> HostConfig {
    let mut config = HostConfig::default();
    config.driver.search_paths = vec![dir.path().to_path_buf()];
    config
}

async fn serial_run(source: Option<&str>) -> ExitStatus {
    let dir = driver_dir(source);
    Bootstrap::new(config(&dir), Box::new(SerialFabric::new()))
        .with_capabilities(CapabilitySet::empty())
        .run(Vec::new())
        .await
}

#[tokio::test]
async fn test_each_failure_class_has_its_own_status() {
    let mut fabric = MockFabric::new();
    fabric
        .expect_init()
        .returning(|_| Err(FabricError::InitFailed("interconnect down".into())));
    let dir = driver_dir(None);
    let fabric_failure = Bootstrap::new(config(&dir), Box::new(fabric))
        .run(Vec::new())
        .await;

    let statuses = vec![
        fabric_failure,
        serial_run(None).await,
        serial_run(Some("fn setup() { }")).await,
        serial_run(Some("fn main() { fail(\"scf did not converge\"); }")).await,
        serial_run(Some("fn main() { }")).await,
    ];
    assert_eq!(
        statuses,
        vec![
            ExitStatus::FabricInitFailure,
            ExitStatus::ImportFailure,
            ExitStatus::EntryPointMissing,
            ExitStatus::ExecutionFailure,
            ExitStatus::Success,
        ]
    );
    let codes: HashSet<i32> = statuses.iter().map(|s| s.code()).collect();
    assert_eq!(codes.len(), 5);
    assert_eq!(ExitStatus::Success.code(), 0);
}

#[tokio::test]
async fn test_teardown_runs_once_for_every_outcome() {
    let outcomes: Vec<Result<DriverStatus, LifecycleError>> = vec![
        Ok(DriverStatus::Success),
        Ok(DriverStatus::ImportFailure),
        Ok(DriverStatus::EntryPointMissing),
        Ok(DriverStatus::ExecutionFailure),
        Err(LifecycleError::OutOfOrder {
            resource: "runtime",
            from: LifecycleState::Finalized,
            to: LifecycleState::Running,
        }),
    ];
    for outcome in outcomes {
        let failed = !matches!(outcome, Ok(DriverStatus::Success));
        let mut embedding = MockEmbedding::new();
        embedding.expect_initialize().times(1).returning(|_, _| Ok(()));
        embedding
            .expect_run()
            .times(1)
            .returning(move |_, _| outcome.clone());
        embedding
            .expect_print_pending_diagnostic()
            .times(usize::from(failed))
            .return_const(());
        embedding.expect_finalize().times(1).returning(|| Ok(()));

        let dir = driver_dir(None);
        let status = Bootstrap::new(config(&dir), Box::new(counted_fabric()))
            .with_capabilities(CapabilitySet::empty())
            .with_embedding(Box::new(embedding))
            .run(Vec::new())
            .await;
        assert_eq!(status.is_success(), !failed);
    }
}

#[tokio::test]
async fn test_readiness_failure_never_exposes_the_registry() {
    let broken = TypeDescriptor {
        name: "Spline",
        requires: CapabilitySet::empty(),
        fields: &["l", "l"],
        methods: &[],
    };
    let mut embedding = MockEmbedding::new();
    embedding.expect_initialize().times(0);
    embedding.expect_run().times(0);
    embedding.expect_finalize().times(0);

    let dir = driver_dir(Some("fn main() { }"));
    let status = Bootstrap::new(config(&dir), Box::new(counted_fabric()))
        .with_capabilities(CapabilitySet::empty())
        .with_types(TypeReadinessSet::new(vec![broken]))
        .with_embedding(Box::new(embedding))
        .run(Vec::new())
        .await;
    assert_eq!(status, ExitStatus::ImportFailure);
}

#[tokio::test]
async fn test_unready_return_type_never_exposes_the_registry() {
    let mut embedding = MockEmbedding::new();
    embedding.expect_initialize().times(0);
    embedding.expect_finalize().times(0);

    let dir = driver_dir(Some("fn main() { }"));
    let status = Bootstrap::new(config(&dir), Box::new(counted_fabric()))
        .with_capabilities(CapabilitySet::DISTRIBUTED)
        .with_types(TypeReadinessSet::for_capabilities(CapabilitySet::empty()))
        .with_embedding(Box::new(embedding))
        .run(Vec::new())
        .await;
    assert_eq!(status, ExitStatus::ImportFailure);
}

#[tokio::test]
async fn test_arguments_reach_the_driver() {
    let dir = driver_dir(Some(
        r#"
        fn main() {
            let args = argv();
            if len(args) != 2 || args[1] != "--fast" { fail(str(args)); }
        }
        "#,
    ));
    let status = Bootstrap::new(config(&dir), Box::new(SerialFabric::new()))
        .with_capabilities(CapabilitySet::empty())
        .run(vec![OsString::from("in.gpw"), OsString::from("--fast")])
        .await;
    assert_eq!(status, ExitStatus::Success);
}

#[tokio::test]
async fn test_coordinator_script_runs_on_four_ranks() {
    let dir = driver_dir(Some(
        r#"
        import _parahost;

        fn main() {
            let payload = null;
            if _parahost.rank() == 0 {
                payload = read_file(argv()[0]);
            }
            let script = _parahost.globally_broadcast_bytes(payload);
            if len(script) != 37 { fail("short script"); }
            if exec(script) != 42 { fail("wrong answer"); }
        }
        "#,
    ));
    let script = dir.path().join("payload.phs");
    fs::write(&script, "fn main() { let a = 6; return a*7; }\n").unwrap();

    let mut config = config(&dir);
    config.fabric.world_size = 4;
    let status = Launcher::new(config)
        .with_capabilities(CapabilitySet::DISTRIBUTED)
        .run(vec![script.into_os_string()])
        .await;
    assert_eq!(status, ExitStatus::Success);
    assert_eq!(status.code(), 0);
}

#[tokio::test]
async fn test_runaway_recursion_is_an_execution_failure() {
    let dir = driver_dir(Some(
        "fn f(n) { return f(n + 1); }\nfn main() { f(0); }",
    ));
    let mut config = config(&dir);
    config.driver.max_call_depth = 32;
    let status = Bootstrap::new(config, Box::new(counted_fabric()))
        .with_capabilities(CapabilitySet::empty())
        .run(Vec::new())
        .await;
    assert_eq!(status, ExitStatus::ExecutionFailure);
}

#[tokio::test]
async fn test_deeply_nested_source_is_an_import_failure() {
    let depth = 5000;
    let source = format!("let x = {}1{};", "(".repeat(depth), ")".repeat(depth));
    let dir = driver_dir(Some(&source));
    let status = Bootstrap::new(config(&dir), Box::new(counted_fabric()))
        .with_capabilities(CapabilitySet::empty())
        .run(Vec::new())
        .await;
    assert_eq!(status, ExitStatus::ImportFailure);
}
