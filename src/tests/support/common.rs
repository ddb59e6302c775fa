// Common test utilities for integration tests.

use std::os::unix::fs::FileTypeExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tonic::transport::Channel;

use crate::api::v1beta1::device_plugin_client::DevicePluginClient;
use crate::config::{new_test_config, PluginIdentity};
use crate::registration::dial;

pub const RESOURCE: &str = crate::config::DEFAULT_RESOURCE;

/// Fresh directory standing in for the kubelet device-plugin directory.
pub fn plugin_dir() -> TempDir {
    tempfile::tempdir().expect("create temp plugin dir")
}

/// Identity of a plugin configured by [`new_test_config`] with `unit_count` units.
pub fn identity(dir: &Path, unit_count: usize) -> Arc<PluginIdentity> {
    let mut cfg = new_test_config(dir);
    cfg.plugin.count = unit_count as i64;
    Arc::new(cfg.identity().expect("valid test config"))
}

pub fn kubelet_socket(dir: &Path) -> PathBuf {
    new_test_config(dir).kubelet_socket()
}

/// Polls `cond` every 10ms until it holds or `timeout` elapses.
pub async fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if cond() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Whether a unix socket file exists at `path`.
pub fn is_socket(path: &Path) -> bool {
    std::fs::symlink_metadata(path)
        .map(|m| m.file_type().is_socket())
        .unwrap_or(false)
}

/// Waits for a socket file to show up at `path`, panics after `timeout`.
pub async fn wait_for_socket(path: &Path, timeout: Duration) {
    let ok = wait_until(timeout, || is_socket(path)).await;
    assert!(ok, "no socket at {path:?} within {timeout:?}");
}

/// Device-plugin client over the plugin socket.
pub async fn plugin_client(path: &Path) -> DevicePluginClient<Channel> {
    let channel = dial(path, Duration::from_secs(2))
        .await
        .expect("dial plugin socket");
    DevicePluginClient::new(channel)
}
