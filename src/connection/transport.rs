use std::pin::Pin;
use std::time::Duration;

use async_tungstenite::WebSocketStream;
use async_tungstenite::tungstenite::{self, Message};
use compio::io::compat::AsyncStream;
use compio::net::TcpStream;
use futures::StreamExt;
use futures::stream::Fuse;
use snafu::prelude::*;
use tracing::{debug, trace};
use url::Url;

/// Whether this client can talk to an endpoint at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Capability {
    Supported,
    Unsupported { reason: String },
}

/// Location of the server's event stream for one watched subtree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    url: Url,
}

impl Endpoint {
    pub fn new(
        secure: bool,
        host: &str,
        events_prefix: &str,
        path: &str,
    ) -> Result<Self, EndpointError> {
        let scheme = if secure { "wss" } else { "ws" };
        format!("{scheme}://{host}{events_prefix}{path}").parse()
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn capability(&self) -> Capability {
        match self.url.scheme() {
            "ws" => Capability::Supported,
            "wss" => Capability::Unsupported {
                reason: "this build does not provide secure websockets (wss)".to_string(),
            },
            other => Capability::Unsupported {
                reason: format!("this client does not provide '{other}' connections"),
            },
        }
    }

    fn socket_address(&self) -> Result<String, TransportError> {
        let host = self.url.host_str().context(MissingHostSnafu {
            url: self.url.to_string(),
        })?;
        let port = self.url.port_or_known_default().unwrap_or(80);
        Ok(format!("{host}:{port}"))
    }
}

impl std::str::FromStr for Endpoint {
    type Err = EndpointError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let url = Url::parse(raw).context(InvalidUrlSnafu { url: raw })?;
        Ok(Endpoint { url })
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.url.fmt(f)
    }
}

/// What the push channel reported next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    Message(String),
    Closed,
    Failed(String),
}

type Socket = Pin<Box<AsyncStream<TcpStream>>>;

/// An open WebSocket subscription to the event stream.
pub struct PushChannel {
    frames: Fuse<WebSocketStream<Socket>>,
}

impl PushChannel {
    /// Like [`PushChannel::open`], but gives up once `limit` has passed
    /// without a completed handshake.
    pub async fn open_within(endpoint: &Endpoint, limit: Duration) -> Result<Self, TransportError> {
        match compio::time::timeout(limit, Self::open(endpoint)).await {
            Ok(result) => result,
            Err(_) => TimeoutSnafu {
                url: endpoint.to_string(),
                limit,
            }
            .fail(),
        }
    }

    pub async fn open(endpoint: &Endpoint) -> Result<Self, TransportError> {
        let address = endpoint.socket_address()?;
        debug!("Connecting to {} for {}", address, endpoint);
        let tcp = TcpStream::connect(address.as_str())
            .await
            .context(ConnectSnafu { address })?;

        let socket: Socket = Box::pin(AsyncStream::new(tcp));
        let (stream, response) = async_tungstenite::client_async(endpoint.url().as_str(), socket)
            .await
            .context(HandshakeSnafu {
                url: endpoint.to_string(),
            })?;
        debug!("Handshake completed with status {}", response.status());

        Ok(Self {
            frames: stream.fuse(),
        })
    }

    /// Waits for the next text payload, skipping control frames.
    pub async fn recv(&mut self) -> ChannelEvent {
        loop {
            match self.frames.next().await {
                Some(Ok(Message::Text(text))) => return ChannelEvent::Message(text.to_string()),
                Some(Ok(Message::Binary(data))) => {
                    return ChannelEvent::Message(String::from_utf8_lossy(&data).into_owned());
                }
                Some(Ok(Message::Close(frame))) => {
                    debug!("Server closed the channel: {:?}", frame);
                    return ChannelEvent::Closed;
                }
                Some(Ok(other)) => trace!("Skipping control frame {:?}", other),
                Some(Err(tungstenite::Error::ConnectionClosed)) | None => {
                    return ChannelEvent::Closed;
                }
                Some(Err(err)) => return ChannelEvent::Failed(err.to_string()),
            }
        }
    }
}

#[derive(Debug, Snafu)]
pub enum EndpointError {
    #[snafu(display("'{}' is not a valid event endpoint", url))]
    InvalidUrlError {
        url: String,
        source: url::ParseError,
    },
}

#[derive(Debug, Snafu)]
pub enum TransportError {
    #[snafu(display("Endpoint '{}' has no host", url))]
    MissingHostError { url: String },
    #[snafu(display("Failed to connect to {}", address))]
    ConnectError {
        address: String,
        source: std::io::Error,
    },
    #[snafu(display("Timed out after {:?} connecting to {}", limit, url))]
    TimeoutError { url: String, limit: Duration },
    #[snafu(display("WebSocket handshake with {} failed", url))]
    HandshakeError {
        url: String,
        source: tungstenite::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::*;

    #[test]
    fn builds_the_event_url_from_parts() {
        let endpoint = Endpoint::new(false, "localhost:8000", "/$events", "/d/local/").unwrap();
        assert_eq!(endpoint.url().as_str(), "ws://localhost:8000/$events/d/local/");
        assert_eq!(endpoint.capability(), Capability::Supported);
        assert_eq!(endpoint.socket_address().unwrap(), "localhost:8000");
    }

    #[test]
    fn default_port_is_used_without_explicit_port() {
        let endpoint = Endpoint::new(false, "doozer.example", "/$events", "/").unwrap();
        assert_eq!(endpoint.socket_address().unwrap(), "doozer.example:80");
    }

    #[rstest]
    #[case("wss://example.com/$events/")]
    #[case("http://example.com/$events/")]
    fn other_schemes_are_unsupported(#[case] raw: &str) {
        let endpoint: Endpoint = raw.parse().unwrap();
        assert!(matches!(
            endpoint.capability(),
            Capability::Unsupported { .. }
        ));
    }

    #[test]
    fn rejects_unparsable_endpoints() {
        let result = Endpoint::new(false, "", "", "");
        assert!(matches!(result, Err(EndpointError::InvalidUrlError { .. })));
    }

    #[compio::test]
    async fn silent_server_times_out_the_handshake() {
        // Accepted by the kernel backlog, but nobody ever answers the upgrade.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap();

        let endpoint = Endpoint::new(false, &address.to_string(), "/$events", "/").unwrap();
        let result = PushChannel::open_within(&endpoint, Duration::from_millis(200)).await;
        match result {
            Err(err @ TransportError::TimeoutError { .. }) => {
                assert!(err.to_string().starts_with("Timed out after 200ms"));
            }
            other => panic!("Expected a timeout, got {:?}", other.err()),
        }
        drop(listener);
    }

    #[compio::test]
    async fn refused_connection_is_a_transport_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let endpoint = Endpoint::new(false, &format!("127.0.0.1:{port}"), "/$events", "/").unwrap();
        let result = PushChannel::open(&endpoint).await;
        assert!(matches!(result, Err(TransportError::ConnectError { .. })));
    }
}
