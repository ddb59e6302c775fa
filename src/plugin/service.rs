//! Device-plugin handlers for the synthetic token resource.

use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tonic::{Request, Response, Status};
use tracing::{debug, error, info, Instrument, Span};

use crate::api::v1beta1::{
    AllocateRequest, AllocateResponse, ContainerAllocateResponse, Device, DevicePluginOptions,
    Empty, ListAndWatchResponse, PreStartContainerRequest, PreStartContainerResponse,
    PreferredAllocationRequest, PreferredAllocationResponse,
};
use crate::api::{DevicePlugin, HEALTHY};
use crate::config::PluginIdentity;

pub type ListAndWatchStream =
    Pin<Box<dyn Stream<Item = Result<ListAndWatchResponse, Status>> + Send + 'static>>;

/// Advertises `unit_count` always-healthy units and accepts every allocation.
///
/// Holds only read-only state, so calls run concurrently without locking.
/// `lifetime` is the serving lifetime of the current iteration; open
/// `ListAndWatch` streams end with it.
pub struct TokenPlugin {
    identity: Arc<PluginIdentity>,
    lifetime: CancellationToken,
    span: Span,
}

impl TokenPlugin {
    pub fn new(identity: Arc<PluginIdentity>, lifetime: CancellationToken, span: Span) -> Self {
        Self {
            identity,
            lifetime,
            span,
        }
    }

    /// Builds the unit list: `item-0` .. `item-(n-1)`, all healthy.
    pub fn devices(&self) -> Vec<Device> {
        (0..self.identity.unit_count)
            .map(|i| Device {
                id: format!("item-{i}"),
                health: HEALTHY.to_string(),
                topology: None,
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl DevicePlugin for TokenPlugin {
    async fn get_device_plugin_options(
        &self,
        _request: Request<Empty>,
    ) -> Result<Response<DevicePluginOptions>, Status> {
        debug!(
            parent: &self.span,
            component = "plugin",
            rpc = "GetDevicePluginOptions",
            "options requested"
        );
        Ok(Response::new(DevicePluginOptions::default()))
    }

    type ListAndWatchStream = ListAndWatchStream;

    async fn list_and_watch(
        &self,
        _request: Request<Empty>,
    ) -> Result<Response<Self::ListAndWatchStream>, Status> {
        let response = ListAndWatchResponse {
            devices: self.devices(),
        };
        info!(
            parent: &self.span,
            component = "plugin",
            rpc = "ListAndWatch",
            resource = %self.identity.resource_name,
            devices = ?response.devices.iter().map(|d| d.id.as_str()).collect::<Vec<_>>(),
            "advertising units"
        );

        let (tx, rx) = mpsc::channel::<Result<ListAndWatchResponse, Status>>(1);
        let lifetime = self.lifetime.clone();
        tokio::spawn(
            async move {
                if let Err(e) = tx.send(Ok(response)).await {
                    error!(
                        component = "plugin",
                        rpc = "ListAndWatch",
                        error = %e,
                        "send response failed"
                    );
                    return;
                }

                // Units never change, so the stream only stays open.
                debug!(component = "plugin", rpc = "ListAndWatch", "waiting...");
                tokio::select! {
                    _ = lifetime.cancelled() => {
                        debug!(
                            component = "plugin",
                            rpc = "ListAndWatch",
                            "serving lifetime ended, closing stream"
                        );
                    }
                    _ = tx.closed() => {
                        debug!(
                            component = "plugin",
                            rpc = "ListAndWatch",
                            "stream dropped by peer"
                        );
                    }
                }
            }
            .instrument(self.span.clone()),
        );

        Ok(Response::new(Box::pin(ReceiverStream::new(rx))))
    }

    async fn get_preferred_allocation(
        &self,
        _request: Request<PreferredAllocationRequest>,
    ) -> Result<Response<PreferredAllocationResponse>, Status> {
        Ok(Response::new(PreferredAllocationResponse::default()))
    }

    async fn allocate(
        &self,
        request: Request<AllocateRequest>,
    ) -> Result<Response<AllocateResponse>, Status> {
        let request = request.into_inner();
        debug!(
            parent: &self.span,
            component = "plugin",
            rpc = "Allocate",
            request = ?request,
            "allocating"
        );

        let container_responses = request
            .container_requests
            .iter()
            .map(|_| ContainerAllocateResponse::default())
            .collect();

        Ok(Response::new(AllocateResponse {
            container_responses,
        }))
    }

    async fn pre_start_container(
        &self,
        _request: Request<PreStartContainerRequest>,
    ) -> Result<Response<PreStartContainerResponse>, Status> {
        Ok(Response::new(PreStartContainerResponse::default()))
    }
}
