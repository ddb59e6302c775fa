// gRPC channels over unix domain sockets.

use hyper_util::rt::TokioIo;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::net::UnixStream;
use tonic::transport::{Channel, Endpoint, Uri};
use tower::service_fn;

/// Upper bound for establishing a connection, handshake included.
pub const DIAL_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
pub enum DialError {
    #[error("connect to {path:?} failed: {source}")]
    Connect {
        path: PathBuf,
        #[source]
        source: tonic::transport::Error,
    },
    #[error("connect to {path:?} timed out after {timeout:?}")]
    Timeout { path: PathBuf, timeout: Duration },
}

/// Dials a gRPC server listening on the unix socket at `path`.
///
/// Connects eagerly, so a missing or dead socket is reported here and not on
/// the first call.
pub async fn dial(path: impl AsRef<Path>, timeout: Duration) -> Result<Channel, DialError> {
    let path = path.as_ref().to_path_buf();
    let socket = path.clone();

    // The authority is never resolved, the connector ignores it.
    let endpoint = Endpoint::from_static("http://[::]:50051");
    let connect = endpoint.connect_with_connector(service_fn(move |_: Uri| {
        let socket = socket.clone();
        async move { Ok::<_, std::io::Error>(TokioIo::new(UnixStream::connect(socket).await?)) }
    }));

    match tokio::time::timeout(timeout, connect).await {
        Ok(Ok(channel)) => Ok(channel),
        Ok(Err(source)) => Err(DialError::Connect { path, source }),
        Err(_) => Err(DialError::Timeout { path, timeout }),
    }
}
