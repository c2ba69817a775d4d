//! Message injection
//!
//! The [`Injector`] encodes a message for a configured service and hands the bytes
//! to a [`Transport`]. Transports are stateless per send so the injector can be
//! shared between any number of concurrent callers.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpStream, UdpSocket, lookup_host};
use tracing::{debug, info};

use crate::schema::SchemaRegistry;
use crate::types::{Service, Value};
use crate::{Result, SlateError};

/// Byte channel to a service.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Deliver one encoded message to `service`.
    async fn send(&self, service: &Service, payload: &[u8]) -> Result<()>;
}

/// One TCP connection per message to `host:port`.
///
/// Matches a device reached through a port-forwarding tunnel that terminates on
/// `host`; the service's own host is ignored.
#[derive(Debug, Clone)]
pub struct TcpTransport {
    host: String,
}

impl TcpTransport {
    pub fn new(host: impl Into<String>) -> Self {
        Self { host: host.into() }
    }
}

#[async_trait::async_trait]
impl Transport for TcpTransport {
    async fn send(&self, service: &Service, payload: &[u8]) -> Result<()> {
        let fail = |reason: &str, e: std::io::Error| {
            SlateError::transport_failed_with_source(&service.name, reason, Box::new(e))
        };

        let mut stream = TcpStream::connect((self.host.as_str(), service.port))
            .await
            .map_err(|e| fail("connect failed", e))?;
        stream.set_nodelay(true).map_err(|e| fail("cannot disable Nagle", e))?;
        stream.write_all(payload).await.map_err(|e| fail("write failed", e))?;
        stream.shutdown().await.map_err(|e| fail("shutdown failed", e))?;

        debug!(service = %service.name, len = payload.len(), "Sent over TCP");
        Ok(())
    }
}

/// One UDP datagram per message to `host:port`.
#[derive(Debug, Clone)]
pub struct UdpTransport {
    host: String,
}

impl UdpTransport {
    pub fn new(host: impl Into<String>) -> Self {
        Self { host: host.into() }
    }
}

#[async_trait::async_trait]
impl Transport for UdpTransport {
    async fn send(&self, service: &Service, payload: &[u8]) -> Result<()> {
        let fail = |reason: &str, e: std::io::Error| {
            SlateError::transport_failed_with_source(&service.name, reason, Box::new(e))
        };

        let target = lookup_host((self.host.as_str(), service.port))
            .await
            .map_err(|e| fail("cannot resolve host", e))?
            .next()
            .ok_or_else(|| SlateError::transport_failed(&service.name, "host did not resolve"))?;

        // Local socket must share the target's address family
        let local = if target.is_ipv6() {
            SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0)
        } else {
            SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0)
        };
        let socket = UdpSocket::bind(local).await.map_err(|e| fail("bind failed", e))?;
        let sent = socket.send_to(payload, target).await.map_err(|e| fail("send failed", e))?;

        if sent != payload.len() {
            return Err(SlateError::transport_failed(
                &service.name,
                format!("datagram truncated to {sent} of {} bytes", payload.len()),
            ));
        }

        debug!(service = %service.name, len = payload.len(), "Sent over UDP");
        Ok(())
    }
}

/// Encodes and transmits messages to configured services.
#[derive(Clone)]
pub struct Injector {
    registry: Arc<SchemaRegistry>,
    transport: Arc<dyn Transport>,
}

impl Injector {
    pub fn new(registry: Arc<SchemaRegistry>, transport: Arc<dyn Transport>) -> Self {
        Self { registry, transport }
    }

    /// Encode `values` (header first) for `service` and send them.
    ///
    /// # Errors
    ///
    /// - [`SlateError::UnknownService`] if no schema is registered for `service`
    /// - [`SlateError::Encode`] if the values do not fit the schema
    /// - [`SlateError::Transport`] if delivery fails; nothing is retried here
    pub async fn send(&self, service: &str, values: &[Value]) -> Result<()> {
        let entry = self
            .registry
            .by_name(service)
            .ok_or_else(|| SlateError::unknown_service(service))?;
        let payload = entry.schema.encode(values)?;

        self.transport.send(&entry.service, &payload).await?;
        info!(service, port = entry.service.port, len = payload.len(), "Injected message");
        Ok(())
    }
}

impl std::fmt::Debug for Injector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Injector").field("services", &self.registry.len()).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{MemoryTransport, flag_registry};
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    fn flag_values(registry: &SchemaRegistry, flag: bool) -> Vec<Value> {
        let mut values = registry.schema("frontend_to_control").unwrap().default_message();
        values[4] = Value::from(flag);
        values
    }

    #[tokio::test]
    async fn unknown_service_is_rejected_before_sending() {
        let (registry, _) = flag_registry(1);
        let transport = Arc::new(MemoryTransport::default());
        let injector = Injector::new(registry, transport.clone());

        let result = injector.send("nope", &[]).await;
        assert!(matches!(result, Err(SlateError::UnknownService { .. })));
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn encode_errors_are_propagated() {
        let (registry, _) = flag_registry(1);
        let transport = Arc::new(MemoryTransport::default());
        let injector = Injector::new(registry, transport.clone());

        let result = injector.send("frontend_to_control", &[Value::UInt32(1)]).await;
        assert!(matches!(result, Err(SlateError::Encode { .. })));
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn encoded_bytes_reach_the_transport() {
        let (registry, _) = flag_registry(1);
        let transport = Arc::new(MemoryTransport::default());
        let injector = Injector::new(Arc::clone(&registry), transport.clone());

        injector.send("frontend_to_control", &flag_values(&registry, true)).await.unwrap();

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, 6250);
        assert_eq!(sent[0].1.len(), 24);
        assert_eq!(&sent[0].1[20..], &[0, 0, 0, 1]);
    }

    #[tokio::test]
    async fn tcp_transport_delivers_the_payload() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let reader = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut received = Vec::new();
            socket.read_to_end(&mut received).await.unwrap();
            received
        });

        let service = crate::test_utils::service("frontend_to_control", port);
        TcpTransport::new("127.0.0.1").send(&service, &[1, 2, 3, 4]).await.unwrap();

        assert_eq!(reader.await.unwrap(), vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn udp_transport_delivers_one_datagram() {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = socket.local_addr().unwrap().port();

        let service = crate::test_utils::service("frontend_to_control", port);
        UdpTransport::new("127.0.0.1").send(&service, &[9, 8, 7]).await.unwrap();

        let mut buf = [0u8; 16];
        let (len, _) = socket.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..len], &[9, 8, 7]);
    }

    #[tokio::test]
    async fn udp_transport_reaches_an_ipv6_host() {
        // Hosts without IPv6 loopback cannot run this
        let Ok(socket) = UdpSocket::bind("[::1]:0").await else {
            return;
        };
        let port = socket.local_addr().unwrap().port();

        let service = crate::test_utils::service("frontend_to_control", port);
        UdpTransport::new("::1").send(&service, &[6, 5, 4]).await.unwrap();

        let mut buf = [0u8; 16];
        let (len, from) = socket.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..len], &[6, 5, 4]);
        assert!(from.is_ipv6());
    }

    #[tokio::test]
    async fn refused_connection_is_a_transport_error() {
        // Bind then drop to get a port with nothing listening
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };

        let service = crate::test_utils::service("frontend_to_control", port);
        let error = TcpTransport::new("127.0.0.1").send(&service, &[1]).await.unwrap_err();
        assert!(matches!(error, SlateError::Transport { .. }));
        assert!(error.is_retryable());
    }
}
