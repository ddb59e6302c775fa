//! Kubelet device-plugin contract (`v1beta1`).
//!
//! Re-exports the generated gRPC bindings and the fixed values every plugin
//! has to agree on with the kubelet: protocol version, socket locations and
//! device health strings.

pub mod v1beta1 {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]
    #![allow(clippy::derive_partial_eq_without_eq)]

    include!("../proto/v1beta1.rs");
}

pub use v1beta1::device_plugin_server::{DevicePlugin, DevicePluginServer};
pub use v1beta1::registration_client::RegistrationClient;

/// Version of the device-plugin API this plugin speaks.
pub const VERSION: &str = "v1beta1";

/// Directory where the kubelet expects plugin sockets.
pub const DEVICE_PLUGIN_PATH: &str = "/var/lib/kubelet/device-plugins/";

/// Kubelet's registration socket file name inside [`DEVICE_PLUGIN_PATH`].
pub const KUBELET_SOCKET_NAME: &str = "kubelet.sock";

/// Device health as reported in `ListAndWatch`.
pub const HEALTHY: &str = "Healthy";
pub const UNHEALTHY: &str = "Unhealthy";
