use crate::Result;
use futures::future::BoxFuture;
use tokio::io::{AsyncRead, AsyncWrite};

/// UpgradedIo is the bidirectional byte stream of an upgraded connection.
pub trait UpgradedIo: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T> UpgradedIo for T where T: AsyncRead + AsyncWrite + Send + Unpin {}

/// AcceptContext parameterizes the acceptance of an upgrade request.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AcceptContext {
    /// Sub-protocol selected by the server, echoed to the client.
    pub sub_protocol: Option<String>,
}

/// Upgraded is an accepted upgrade: the negotiated sub-protocol
/// and the raw stream which now belongs to the caller.
pub struct Upgraded {
    pub sub_protocol: Option<String>,
    pub io: Box<dyn UpgradedIo>,
}

impl std::fmt::Debug for Upgraded {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Upgraded")
            .field("sub_protocol", &self.sub_protocol)
            .finish_non_exhaustive()
    }
}

/// WebSocketUpgrade is offered by transports which are able to
/// hand off the connection for a websocket session.
pub trait WebSocketUpgrade: Send + Sync {
    /// Returns true if the current request asks for a websocket upgrade.
    fn is_upgrade_request(&self) -> bool;

    /// Complete the upgrade handshake and take over the connection.
    fn accept(&self, context: AcceptContext) -> BoxFuture<'static, Result<Upgraded>>;
}

/// Returns true if `headers` carry a websocket upgrade handshake:
/// a `Connection` header listing the `upgrade` token and
/// an `Upgrade: websocket` header.
pub fn is_websocket_handshake(headers: &http::HeaderMap) -> bool {
    let connection_upgrade = headers
        .get_all(http::header::CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .any(|token| token.trim().eq_ignore_ascii_case("upgrade"));

    let upgrade_websocket = headers
        .get_all(http::header::UPGRADE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .any(|value| value.trim().eq_ignore_ascii_case("websocket"));

    connection_upgrade && upgrade_websocket
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header::{HeaderValue, CONNECTION, UPGRADE};

    #[test]
    fn test_websocket_handshake_detection() {
        let mut headers = http::HeaderMap::new();
        assert!(!is_websocket_handshake(&headers));

        headers.insert(CONNECTION, HeaderValue::from_static("keep-alive, Upgrade"));
        assert!(!is_websocket_handshake(&headers));

        headers.insert(UPGRADE, HeaderValue::from_static("WebSocket"));
        assert!(is_websocket_handshake(&headers));

        headers.insert(UPGRADE, HeaderValue::from_static("h2c"));
        assert!(!is_websocket_handshake(&headers));
    }

    #[test]
    fn test_upgraded_debug() {
        let (io, _peer) = tokio::io::duplex(64);
        let upgraded = Upgraded {
            sub_protocol: Some("chat".to_string()),
            io: Box::new(io),
        };

        insta::assert_debug_snapshot!(upgraded, @r###"
        Upgraded {
            sub_protocol: Some(
                "chat",
            ),
            ..
        }
        "###);
    }
}
