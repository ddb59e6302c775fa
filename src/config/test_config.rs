use super::{Config, Kubelet, Logs, Plugin, Shutdown};
use std::path::Path;
use std::time::Duration;

/// Creates a configuration rooted in `dir`: the plugin socket and the
/// kubelet socket both live there, so tests never touch the real kubelet.
pub fn new_test_config(dir: &Path) -> Config {
    Config {
        env: super::TEST.to_string(),
        logs: Some(Logs {
            level: Some("debug".to_string()),
        }),
        plugin: Plugin {
            socket: "token-resource.sock".to_string(),
            resource: "example.com/token".to_string(),
            count: 2,
            dir: dir.to_path_buf(),
        },
        kubelet: Kubelet {
            socket: Some(dir.join(crate::api::KUBELET_SOCKET_NAME)),
        },
        shutdown: Some(Shutdown {
            timeout: Some(Duration::from_secs(2)),
        }),
    }
}
