use url::Url;

use super::errors::TransportErrors;

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:5000";

const SOCKET_IO_PATH: &str = "/socket.io/";
const SOCKET_IO_QUERY: &str = "EIO=4&transport=websocket";

/// Maps the configured backend address to the Socket.IO WebSocket endpoint.
///
/// Any path on the base address is replaced: the server mounts Socket.IO at
/// `/socket.io/`.
pub fn socket_url(base: &str) -> Result<Url, TransportErrors> {
    let mut url = Url::parse(base.trim())
        .map_err(|err| TransportErrors::InvalidEndpoint(format!("{base}: {err}")))?;

    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(TransportErrors::InvalidEndpoint(format!(
                "{base}: unsupported scheme {other}"
            )))
        }
    };
    url.set_scheme(scheme)
        .map_err(|_| TransportErrors::InvalidEndpoint(format!("{base}: cannot use {scheme}")))?;
    url.set_path(SOCKET_IO_PATH);
    url.set_query(Some(SOCKET_IO_QUERY));
    url.set_fragment(None);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_backend() {
        let url = socket_url(DEFAULT_BACKEND_URL).unwrap();
        assert_eq!(
            url.as_str(),
            "ws://localhost:5000/socket.io/?EIO=4&transport=websocket"
        );
    }

    #[test]
    fn test_https_maps_to_wss_and_drops_path() {
        let url = socket_url("https://paint.example.com/app?x=1").unwrap();
        assert_eq!(
            url.as_str(),
            "wss://paint.example.com/socket.io/?EIO=4&transport=websocket"
        );
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(matches!(
            socket_url("localhost:5000"),
            Err(TransportErrors::InvalidEndpoint(_))
        ));
        assert!(matches!(
            socket_url("ftp://localhost"),
            Err(TransportErrors::InvalidEndpoint(_))
        ));
    }
}
