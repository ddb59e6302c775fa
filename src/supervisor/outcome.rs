use std::fmt;
use std::io;
use std::path::PathBuf;

use crate::plugin::ServeError;

/// Which serving task reported an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    Watchdog,
    Server,
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Component::Watchdog => f.write_str("watchdog"),
            Component::Server => f.write_str("server"),
        }
    }
}

/// Why a serving iteration came to an end. The first outcome received ends
/// the iteration; later ones are only drained.
#[derive(Debug, thiserror::Error)]
pub enum ServingOutcome {
    #[error("socket invalidated: {0}")]
    SocketInvalidated(#[source] io::Error),
    #[error("serving failed: {0}")]
    ServingFailed(#[source] ServeError),
    #[error("{0} stopped, serving lifetime ended")]
    Stopped(Component),
    #[error("serving task ended without reporting an outcome")]
    Aborted,
}

impl ServingOutcome {
    /// Whether the iteration has to be restarted because of this outcome.
    pub fn is_failure(&self) -> bool {
        !matches!(self, ServingOutcome::Stopped(_))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    #[error("listen on {path:?} failed: {source}")]
    Bind {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
