//! TCP listener for the debug endpoint.
//!
//! # Responsibilities
//! - Normalise configured addresses (`:6666` means every interface)
//! - Bind the listener, reporting failures as [`ListenerError`]

use tokio::net::TcpListener;
use thiserror::Error;

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// The address is not of the form `host:port` or `:port`.
    #[error("invalid listen address {0:?}")]
    InvalidAddress(String),

    /// Failed to bind to address.
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },
}

/// Turn a configured address into something `TcpListener::bind` resolves.
///
/// A bare `:port` binds every IPv4 interface. Host names are kept as-is and
/// resolved at bind time. Returns `None` when no port can be found.
pub fn normalize_address(address: &str) -> Option<String> {
    let address = address.trim();
    let (host, port) = address.rsplit_once(':')?;
    port.parse::<u16>().ok()?;

    if host.is_empty() {
        Some(format!("0.0.0.0:{port}"))
    } else {
        Some(address.to_string())
    }
}

/// Bind a listener on the configured address.
pub async fn bind(address: &str) -> Result<TcpListener, ListenerError> {
    let resolved =
        normalize_address(address).ok_or_else(|| ListenerError::InvalidAddress(address.to_string()))?;

    let listener = TcpListener::bind(&resolved)
        .await
        .map_err(|source| ListenerError::Bind {
            address: address.to_string(),
            source,
        })?;

    if let Ok(local_addr) = listener.local_addr() {
        tracing::debug!(address = %local_addr, "Listener bound");
    }

    Ok(listener)
}
