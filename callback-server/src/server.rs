//! HTTP server for receiving UPnP event notifications.

use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpListener};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use warp::Filter;

use crate::error::{CallbackError, Result};
use crate::router::{EventRouter, NotificationPayload};

/// HTTP callback server for receiving UPnP event notifications.
///
/// The `CallbackServer` binds to a local port and accepts GENA `NOTIFY`
/// requests on `/<callback-key>`. Requests are validated and handed to the
/// [`EventRouter`], which forwards them to a channel.
///
/// # Example
///
/// ```no_run
/// use tokio::sync::mpsc;
/// use callback_server::{CallbackServer, NotificationPayload};
///
/// #[tokio::main]
/// async fn main() -> Result<(), callback_server::CallbackError> {
///     let (tx, mut rx) = mpsc::unbounded_channel::<NotificationPayload>();
///
///     let server = CallbackServer::new((3400, 3500), tx).await?;
///     let key = server.router().register_new().await;
///     println!("Subscribe with callback {}", server.callback_url(&key));
///
///     while let Some(notification) = rx.recv().await {
///         println!("Event from {}", notification.subscription_id);
///     }
///     Ok(())
/// }
/// ```
pub struct CallbackServer {
    port: u16,
    /// `http://<local-ip>:<port>`
    base_url: String,
    event_router: Arc<EventRouter>,
    shutdown_tx: Option<mpsc::Sender<()>>,
    server_handle: Option<tokio::task::JoinHandle<()>>,
}

impl std::fmt::Debug for CallbackServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackServer")
            .field("base_url", &self.base_url)
            .field("running", &self.server_handle.is_some())
            .finish()
    }
}

impl CallbackServer {
    /// Create and start a new callback server.
    ///
    /// The server:
    /// - Finds an available port in the specified range
    /// - Detects the local IP address for callback URLs
    /// - Starts an HTTP server for NOTIFY requests
    ///
    /// Must be called from within a tokio runtime.
    pub async fn new(
        port_range: (u16, u16),
        event_sender: mpsc::UnboundedSender<NotificationPayload>,
    ) -> Result<Self> {
        let port = Self::find_available_port(port_range.0, port_range.1).ok_or(
            CallbackError::NoAvailablePort {
                start: port_range.0,
                end: port_range.1,
            },
        )?;

        let local_ip = Self::detect_local_ip().unwrap_or_else(|| {
            warn!("could not detect local IP address, advertising loopback");
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        });

        let base_url = format!("http://{local_ip}:{port}");
        let event_router = Arc::new(EventRouter::new(event_sender));

        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
        let (ready_tx, mut ready_rx) = mpsc::channel::<Result<SocketAddr>>(1);

        let server_handle = Self::start_server(port, event_router.clone(), shutdown_rx, ready_tx);

        let addr = ready_rx
            .recv()
            .await
            .ok_or(CallbackError::StartFailed)??;
        info!(%addr, %base_url, "callback server listening");

        Ok(Self {
            port,
            base_url,
            event_router,
            shutdown_tx: Some(shutdown_tx),
            server_handle: Some(server_handle),
        })
    }

    /// Base URL shared by all callbacks, `http://<local_ip>:<port>`.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Callback URL to hand to a publisher for the given key.
    pub fn callback_url(&self, callback_key: &str) -> String {
        format!("{}/{}", self.base_url, callback_key)
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Router used to register and unregister callback keys.
    pub fn router(&self) -> &Arc<EventRouter> {
        &self.event_router
    }

    /// Shutdown the callback server gracefully.
    ///
    /// Sends a shutdown signal to the HTTP server and waits for it to finish
    /// any in-flight requests.
    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(()).await;
        }

        if let Some(handle) = self.server_handle.take() {
            let _ = handle.await;
        }

        debug!(port = self.port, "callback server stopped");
        Ok(())
    }

    /// Find an available port in the given range.
    fn find_available_port(start: u16, end: u16) -> Option<u16> {
        (start..=end).find(|&port| Self::is_port_available(port))
    }

    /// Check if a port is available for binding.
    fn is_port_available(port: u16) -> bool {
        TcpListener::bind(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port)).is_ok()
    }

    /// Detect the local IP address for callback URLs.
    ///
    /// A connected UDP socket reveals the address used for outbound traffic.
    /// No data is actually sent.
    fn detect_local_ip() -> Option<IpAddr> {
        let socket = std::net::UdpSocket::bind("0.0.0.0:0").ok()?;
        socket.connect("8.8.8.8:80").ok()?;
        let local_addr = socket.local_addr().ok()?;
        Some(local_addr.ip())
    }

    fn start_server(
        port: u16,
        event_router: Arc<EventRouter>,
        mut shutdown_rx: mpsc::Receiver<()>,
        ready_tx: mpsc::Sender<Result<SocketAddr>>,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let notify_route = warp::method()
                .and(warp::path::full())
                .and(warp::header::optional::<String>("sid"))
                .and(warp::header::optional::<String>("nt"))
                .and(warp::header::optional::<String>("nts"))
                .and(warp::body::bytes())
                .and_then({
                    let router = event_router.clone();
                    move |method: warp::http::Method,
                          path: warp::path::FullPath,
                          sid: Option<String>,
                          nt: Option<String>,
                          nts: Option<String>,
                          body: bytes::Bytes| {
                        let router = router.clone();
                        async move {
                            if method.as_str() != "NOTIFY" {
                                return Err(warp::reject::not_found());
                            }

                            let callback_key = path.as_str().trim_matches('/').to_string();
                            debug!(
                                %callback_key,
                                sid = sid.as_deref().unwrap_or("-"),
                                bytes = body.len(),
                                "incoming NOTIFY"
                            );

                            if !Self::validate_upnp_headers(&sid, &nt, &nts) {
                                warn!(%callback_key, ?nt, ?nts, "rejecting NOTIFY with invalid headers");
                                return Err(warp::reject::custom(InvalidUpnpHeaders));
                            }
                            let sid = sid.ok_or_else(|| warp::reject::custom(InvalidUpnpHeaders))?;

                            let event_xml = String::from_utf8_lossy(&body).into_owned();
                            if router.route_event(callback_key.clone(), sid, event_xml).await {
                                Ok::<_, warp::Rejection>(warp::reply::with_status(
                                    "",
                                    warp::http::StatusCode::OK,
                                ))
                            } else {
                                debug!(%callback_key, "NOTIFY for unknown callback key");
                                Err(warp::reject::not_found())
                            }
                        }
                    }
                });

            let routes = notify_route.recover(handle_rejection);

            let bound = warp::serve(routes).try_bind_with_graceful_shutdown(
                SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port),
                async move {
                    shutdown_rx.recv().await;
                },
            );

            match bound {
                Ok((addr, server)) => {
                    let _ = ready_tx.send(Ok(addr)).await;
                    server.await;
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(CallbackError::Bind(e.to_string()))).await;
                }
            }
        })
    }

    /// Validate GENA notification headers.
    ///
    /// SID is required. NT and NTS, when both present, must be `upnp:event`
    /// and `upnp:propchange`.
    fn validate_upnp_headers(
        sid: &Option<String>,
        nt: &Option<String>,
        nts: &Option<String>,
    ) -> bool {
        if sid.is_none() {
            return false;
        }

        if let (Some(nt_val), Some(nts_val)) = (nt, nts) {
            if nt_val != "upnp:event" || nts_val != "upnp:propchange" {
                return false;
            }
        }

        true
    }
}

/// Custom rejection for invalid UPnP headers.
#[derive(Debug)]
struct InvalidUpnpHeaders;

impl warp::reject::Reject for InvalidUpnpHeaders {}

/// Handle rejections and convert them to HTTP responses.
async fn handle_rejection(
    err: warp::Rejection,
) -> std::result::Result<impl warp::Reply, std::convert::Infallible> {
    let (code, message) = if err.is_not_found() {
        (warp::http::StatusCode::NOT_FOUND, "Subscription not found")
    } else if err.find::<InvalidUpnpHeaders>().is_some() {
        (warp::http::StatusCode::BAD_REQUEST, "Invalid UPnP headers")
    } else {
        (
            warp::http::StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error",
        )
    };

    Ok(warp::reply::with_status(message, code))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_port_available() {
        assert!(CallbackServer::is_port_available(0));

        let listener = TcpListener::bind("0.0.0.0:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        assert!(!CallbackServer::is_port_available(port));
    }

    #[test]
    fn test_find_available_port() {
        let port = CallbackServer::find_available_port(50000, 50100);
        assert!(port.is_some());
        assert!(port.unwrap() >= 50000 && port.unwrap() <= 50100);
    }

    #[test]
    fn test_find_available_port_exhausted() {
        let listener = TcpListener::bind("0.0.0.0:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        assert_eq!(CallbackServer::find_available_port(port, port), None);
    }

    #[test]
    fn test_validate_upnp_headers() {
        assert!(CallbackServer::validate_upnp_headers(
            &Some("uuid:123".to_string()),
            &Some("upnp:event".to_string()),
            &Some("upnp:propchange".to_string()),
        ));

        assert!(CallbackServer::validate_upnp_headers(
            &Some("uuid:123".to_string()),
            &None,
            &None,
        ));

        assert!(!CallbackServer::validate_upnp_headers(
            &None,
            &Some("upnp:event".to_string()),
            &Some("upnp:propchange".to_string()),
        ));

        assert!(!CallbackServer::validate_upnp_headers(
            &Some("uuid:123".to_string()),
            &Some("wrong".to_string()),
            &Some("upnp:propchange".to_string()),
        ));

        assert!(!CallbackServer::validate_upnp_headers(
            &Some("uuid:123".to_string()),
            &Some("upnp:event".to_string()),
            &Some("wrong".to_string()),
        ));
    }

    #[tokio::test]
    async fn test_callback_server_creation() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let server = CallbackServer::new((50000, 50100), tx).await.unwrap();

        assert!(server.port() >= 50000 && server.port() <= 50100);
        assert!(server.base_url().contains(&server.port().to_string()));
        assert_eq!(
            server.callback_url("abc"),
            format!("{}/abc", server.base_url())
        );

        server.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_no_available_port() {
        let listener = TcpListener::bind("0.0.0.0:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let (tx, _rx) = mpsc::unbounded_channel();
        let result = CallbackServer::new((port, port), tx).await;
        assert!(matches!(result, Err(CallbackError::NoAvailablePort { .. })));
    }
}
