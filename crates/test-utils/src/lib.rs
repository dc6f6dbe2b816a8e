pub mod builders;
pub mod fake_executor;
pub mod fake_oracle;

use std::sync::Once;

use builddag::config::{BinaryPackageConfig, Manifest};
use tracing_subscriber::{EnvFilter, fmt};

use crate::builders::{ManifestBuilder, SourceBuilder, SubPackageBuilder, binary};

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// - Uses `with_test_writer()`, so logs are captured per-test.
/// - The Rust test harness only prints captured output for **failing** tests
///   (unless you run with `-- --nocapture`).
///
/// Enable levels with e.g.:
/// `RUST_LOG=debug cargo test`
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer() // print only for failing tests unless --nocapture
            .with_target(true)
            .init();
    });
}

/// Run a future with a 5-second timeout.
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(std::time::Duration::from_secs(5), f)
        .await
        .expect("Test timed out after 5 seconds")
}

/// The TrueNAS SCALE subset used throughout the rebuild tests:
///
/// - `openzfs` (kernel module) with sub-package `openzfs-dbg`;
/// - `kernel` with sub-package `kernel-dbg`;
/// - `scst` (kernel module) with sub-package `scst-dbg`;
/// - `py_libzfs`, `zectl`, `truenas_samba`, each after `openzfs`.
///
/// The `-dbg` sub-packages of `openzfs` and `scst` republish their parent's
/// binaries.
pub fn truenas_manifest() -> Manifest {
    truenas_manifest_builder().build()
}

/// [`truenas_manifest`] as a builder, for tests that add to it.
pub fn truenas_manifest_builder() -> ManifestBuilder {
    ManifestBuilder::new()
        .with_source(
            SourceBuilder::new("openzfs")
                .repo("https://github.com/truenas/zfs")
                .branch("truenas/zfs-2.1-release")
                .kernel_module(true)
                .subpackage(
                    SubPackageBuilder::new("openzfs-dbg")
                        .deps_path("contrib/debian")
                        .kernel_module(true)
                        .build(),
                )
                .build(),
        )
        .with_source(
            SourceBuilder::new("kernel")
                .repo("https://github.com/truenas/linux")
                .branch("truenas/linux-5.15")
                .subpackage(SubPackageBuilder::new("kernel-dbg").batch_priority(0).build())
                .build(),
        )
        .with_source(
            SourceBuilder::new("scst")
                .branch("truenas-3.7.x")
                .kernel_module(true)
                .subpackage(
                    SubPackageBuilder::new("scst-dbg")
                        .branch("truenas-3.7.x")
                        .kernel_module(true)
                        .build(),
                )
                .build(),
        )
        .with_source(
            SourceBuilder::new("py_libzfs")
                .repo("https://github.com/truenas/py-libzfs")
                .after("openzfs")
                .build(),
        )
        .with_source(SourceBuilder::new("zectl").after("openzfs").build())
        .with_source(
            SourceBuilder::new("truenas_samba")
                .repo("https://github.com/truenas/samba")
                .branch("SCALE-v4-18-stable")
                .after("openzfs")
                .build(),
        )
        .with_binaries("openzfs", openzfs_binaries())
        .with_binaries("openzfs-dbg", openzfs_binaries())
        .with_binaries("py_libzfs", vec![binary("python3-libzfs", "py-libzfs")])
        .with_binaries("scst", scst_binaries())
        .with_binaries("scst-dbg", scst_binaries())
        .with_binaries("zectl", vec![binary("zectl", "zectl")])
        .with_binaries("truenas_samba", vec![binary("truenas-samba", "samba")])
}

fn openzfs_binaries() -> Vec<BinaryPackageConfig> {
    [
        "openzfs-libnvpair3",
        "openzfs-libpam-zfs",
        "openzfs-libuutil3",
        "openzfs-libzfs-dev",
        "openzfs-libzfs4",
        "openzfs-libzfsbootenv1",
        "openzfs-libzpool5",
        "openzfs-python3-pyzfs",
        "openzfs-pyzfs-doc",
        "openzfs-zfs-dkms",
        "openzfs-zfs-initramfs",
        "openzfs-zfs-dracut",
        "openzfs-zfsutils",
        "openzfs-zfs-zed",
        "openzfs-zfs-test",
    ]
    .into_iter()
    .map(|name| binary(name, "openzfs-linux"))
    .collect()
}

fn scst_binaries() -> Vec<BinaryPackageConfig> {
    ["scst", "scst-dkms", "scst-dev", "scstadmin", "iscsi-scst"]
        .into_iter()
        .map(|name| binary(name, "scst"))
        .collect()
}
