//! Transport failure → error taxonomy

use crate::error::{ErrorKind, FedError};
use crate::transport::{Connectivity, TransportError};

/// Classify a transport failure. The original error is kept as the cause.
pub fn classify(error: TransportError, connectivity: &dyn Connectivity) -> FedError {
    let (kind, status) = match &error {
        TransportError::Status { status, .. } => {
            let kind = match status {
                400..=499 => ErrorKind::Client,
                500..=599 => ErrorKind::Server,
                _ => ErrorKind::Generic,
            };
            (kind, Some(*status))
        }
        TransportError::NoResponse { .. } => match connectivity.is_online() {
            Some(false) => (ErrorKind::Network, None),
            _ => (ErrorKind::BackendUnavailable, None),
        },
        TransportError::Cancelled => (ErrorKind::Cancelled, None),
        TransportError::Other { .. } => (ErrorKind::Generic, None),
    };

    let mut classified = FedError::new(kind, error.to_string());
    if let Some(status) = status {
        classified = classified.with_status(status);
    }
    classified.caused_by(error)
}
