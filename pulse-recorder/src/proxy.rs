//! Intercepting proxy: accept loop, forward path, CONNECT tunneling
//!
//! Each accepted connection is served as raw HTTP/1.1 with upgrades
//! enabled; proxy clients use absolute-form request targets and the
//! authority-form `CONNECT`, neither of which a path router accepts.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use chrono::{Local, Utc};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::header::HeaderMap;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use parking_lot::Mutex;
use pulse_core::RecordedRequest;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::artifact;
use crate::config::RecorderConfig;
use crate::error::RecorderError;
use crate::event::RecorderEvent;

/// Lifecycle of a recorder instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderState {
    Idle,
    Starting,
    Listening,
    Stopping,
    Stopped,
}

/// The recording proxy.
///
/// [`Recorder::start`] blocks until [`Recorder::stop`] is signalled, then
/// drains in-flight traffic, closes the events channel, and writes the
/// session artifact.
pub struct Recorder {
    config: RecorderConfig,
    inner: Arc<Inner>,
    state_tx: watch::Sender<RecorderState>,
    stop_tx: watch::Sender<bool>,
}

struct Inner {
    records: Mutex<Vec<RecordedRequest>>,
    events: Mutex<Option<mpsc::Sender<RecorderEvent>>>,
    client: reqwest::Client,
    local_addr: Mutex<Option<SocketAddr>>,
    dial_timeout: std::time::Duration,
}

impl Recorder {
    /// Build a recorder and the receiving half of its live event channel.
    pub fn new(config: RecorderConfig) -> Result<(Self, mpsc::Receiver<RecorderEvent>), RecorderError> {
        // Forwarding matches a bare round-trip: no redirect following, no
        // per-request timeout beyond what the caller's socket imposes.
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| RecorderError::UpstreamFailure(e.to_string()))?;

        let (events_tx, events_rx) = mpsc::channel(config.events_capacity);
        let inner = Arc::new(Inner {
            records: Mutex::new(Vec::new()),
            events: Mutex::new(Some(events_tx)),
            client,
            local_addr: Mutex::new(None),
            dial_timeout: config.dial_timeout,
        });

        let (state_tx, _) = watch::channel(RecorderState::Idle);
        let (stop_tx, _) = watch::channel(false);

        Ok((
            Self {
                config,
                inner,
                state_tx,
                stop_tx,
            },
            events_rx,
        ))
    }

    /// Watch lifecycle transitions; useful for callers binding to `:0`.
    pub fn state(&self) -> watch::Receiver<RecorderState> {
        self.state_tx.subscribe()
    }

    /// The bound address once the recorder reaches `Listening`.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.inner.local_addr.lock()
    }

    /// Signal the recorder to stop. Idempotent; returns immediately.
    pub fn stop(&self) {
        self.stop_tx.send_replace(true);
    }

    /// Bind, serve until stopped, then drain and persist the session.
    pub async fn start(&self) -> Result<(), RecorderError> {
        self.state_tx.send_replace(RecorderState::Starting);

        let listener = TcpListener::bind(&self.config.addr)
            .await
            .map_err(|e| RecorderError::BindFailed {
                addr: self.config.addr.clone(),
                source: e,
            })?;
        let addr = listener.local_addr().map_err(|e| RecorderError::BindFailed {
            addr: self.config.addr.clone(),
            source: e,
        })?;
        *self.inner.local_addr.lock() = Some(addr);
        self.state_tx.send_replace(RecorderState::Listening);
        info!(%addr, "recorder listening; point your client's proxy at this address");

        let mut connections = JoinSet::new();
        let mut stop_rx = self.stop_tx.subscribe();
        if !*stop_rx.borrow() {
            loop {
                tokio::select! {
                    _ = stop_rx.changed() => break,
                    accepted = listener.accept() => match accepted {
                        Ok((stream, peer)) => {
                            let inner = Arc::clone(&self.inner);
                            connections.spawn(async move {
                                let service = service_fn(move |req| {
                                    let inner = Arc::clone(&inner);
                                    async move {
                                        Ok::<_, std::convert::Infallible>(inner.handle(req).await)
                                    }
                                });
                                if let Err(e) = http1::Builder::new()
                                    .preserve_header_case(true)
                                    .serve_connection(TokioIo::new(stream), service)
                                    .with_upgrades()
                                    .await
                                {
                                    debug!(%peer, error = %e, "proxy connection closed with error");
                                }
                            });
                        }
                        Err(e) => warn!(error = %e, "accept failed"),
                    },
                }
            }
        }

        self.state_tx.send_replace(RecorderState::Stopping);
        info!("stop signal received; draining in-flight traffic");
        drop(listener);
        tokio::time::sleep(self.config.drain).await;

        let graceful = tokio::time::timeout(self.config.shutdown_deadline, async {
            while connections.join_next().await.is_some() {}
        })
        .await;
        if graceful.is_err() {
            warn!("shutdown deadline elapsed with connections still open");
            connections.abort_all();
        }

        // Closing the channel lets event pumps run dry; open tunnels hold
        // no sender and are left to die with their sockets.
        self.inner.events.lock().take();

        let records = self.inner.records.lock().clone();
        let result = artifact::write_session(&self.config.out_dir, &records);
        self.state_tx.send_replace(RecorderState::Stopped);
        result.map(|_| ())
    }
}

impl Inner {
    async fn handle(self: Arc<Self>, req: Request<Incoming>) -> Response<Full<Bytes>> {
        let outcome = if req.method() == Method::CONNECT {
            self.handle_connect(req).await
        } else {
            self.handle_forward(req).await
        };
        outcome.unwrap_or_else(|err| {
            warn!(error = %err, "proxy request failed");
            plain_response(StatusCode::BAD_GATEWAY, format!("{err}\n"))
        })
    }

    /// Buffer, record, and forward a plain HTTP request, teeing the
    /// response body into the live event.
    async fn handle_forward(
        &self,
        req: Request<Incoming>,
    ) -> Result<Response<Full<Bytes>>, RecorderError> {
        let method = req.method().clone();
        let proto = format!("{:?}", req.version());
        let host = req
            .uri()
            .authority()
            .map(|a| a.to_string())
            .or_else(|| header_str(req.headers(), hyper::header::HOST))
            .unwrap_or_default();
        let url = if req.uri().scheme().is_some() {
            req.uri().to_string()
        } else {
            // Origin-form target from a misconfigured client; reconstruct
            // the absolute URL from the Host header.
            format!(
                "http://{host}{}",
                req.uri().path_and_query().map(|p| p.as_str()).unwrap_or("/")
            )
        };

        let headers = snapshot_headers(req.headers());
        let cookies = parse_cookies(req.headers());
        let forward_headers = req.headers().clone();

        let body = match req.into_body().collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                warn!(error = %e, "failed to buffer request body");
                Bytes::new()
            }
        };
        let body_text = String::from_utf8_lossy(&body).into_owned();

        self.records.lock().push(RecordedRequest {
            timestamp: Utc::now(),
            method: method.to_string(),
            url: url.clone(),
            host: host.clone(),
            headers: headers.clone(),
            cookies,
            body: body_text.clone(),
            proto: proto.clone(),
            note: None,
        });
        info!(method = %method, url = %url, "recording request");

        let upstream = self
            .client
            .request(method.clone(), &url)
            .headers(strip_hop_by_hop(&forward_headers))
            .body(body)
            .send()
            .await;

        let response = match upstream {
            Ok(response) => response,
            Err(e) => {
                self.emit(RecorderEvent {
                    method: method.to_string(),
                    url,
                    status: 0,
                    time: clock(),
                    headers,
                    body: body_text,
                    proto,
                    host,
                    err: e.to_string(),
                    ..RecorderEvent::default()
                });
                return Err(RecorderError::UpstreamFailure(e.to_string()));
            }
        };

        let status = response.status();
        let response_headers = response.headers().clone();
        let response_body = response.bytes().await.unwrap_or_default();

        self.emit(RecorderEvent {
            method: method.to_string(),
            url,
            status: status.as_u16(),
            time: clock(),
            headers,
            body: body_text,
            response: String::from_utf8_lossy(&response_body).into_owned(),
            proto,
            host: host.clone(),
            port: extract_port(&host),
            ..RecorderEvent::default()
        });

        let mut builder = Response::builder().status(status);
        if let Some(headers) = builder.headers_mut() {
            *headers = strip_hop_by_hop(&response_headers);
        }
        builder
            .body(Full::new(response_body))
            .map_err(|e| RecorderError::UpstreamFailure(e.to_string()))
    }

    /// Record the tunnel request, dial the target, and splice bytes.
    ///
    /// Tunnel contents are opaque: nothing past the CONNECT line reaches
    /// the capture list or the event channel.
    async fn handle_connect(
        &self,
        req: Request<Incoming>,
    ) -> Result<Response<Full<Bytes>>, RecorderError> {
        let host = req
            .uri()
            .authority()
            .map(|a| a.to_string())
            .unwrap_or_default();

        self.records.lock().push(RecordedRequest {
            timestamp: Utc::now(),
            method: Method::CONNECT.to_string(),
            url: host.clone(),
            host: host.clone(),
            headers: BTreeMap::new(),
            cookies: BTreeMap::new(),
            body: String::new(),
            proto: format!("{:?}", req.version()),
            note: Some("HTTPS tunnel (CONNECT); body not visible unless MITM enabled".to_string()),
        });
        self.emit(RecorderEvent {
            method: Method::CONNECT.to_string(),
            url: host.clone(),
            time: clock(),
            note: "HTTPS tunnel established".to_string(),
            ..RecorderEvent::default()
        });
        info!(target = %host, "establishing tunnel");

        let dialed = tokio::time::timeout(self.dial_timeout, TcpStream::connect(&host)).await;
        let mut upstream = match dialed {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                return Err(RecorderError::DialFailed {
                    host,
                    message: e.to_string(),
                })
            }
            Err(_) => {
                return Err(RecorderError::DialFailed {
                    host,
                    message: "connect timed out".to_string(),
                })
            }
        };

        tokio::spawn(async move {
            match hyper::upgrade::on(req).await {
                Ok(upgraded) => {
                    let mut client = TokioIo::new(upgraded);
                    if let Err(e) = tokio::io::copy_bidirectional(&mut client, &mut upstream).await
                    {
                        debug!(error = %e, "tunnel closed with error");
                    }
                }
                Err(e) => {
                    let err = RecorderError::HijackUnavailable(e.to_string());
                    warn!(error = %err, "tunnel abandoned");
                }
            }
        });

        // hyper performs the upgrade once this 2xx is written out.
        Ok(Response::new(Full::new(Bytes::new())))
    }

    /// Offer an event without blocking; a full channel drops it. The
    /// artifact is authoritative, the live stream best-effort.
    fn emit(&self, event: RecorderEvent) {
        if let Some(tx) = self.events.lock().as_ref() {
            let _ = tx.try_send(event);
        }
    }
}

fn clock() -> String {
    Local::now().format("%H:%M:%S").to_string()
}

fn header_str(headers: &HeaderMap, name: hyper::header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Flatten headers to strings, joining repeated values with `"; "`.
fn snapshot_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut snapshot = BTreeMap::new();
    for name in headers.keys() {
        let joined = headers
            .get_all(name)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect::<Vec<_>>()
            .join("; ");
        snapshot.insert(name.to_string(), joined);
    }
    snapshot
}

/// Cookies by name, from every `Cookie` header on the request.
fn parse_cookies(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut cookies = BTreeMap::new();
    for value in headers.get_all(hyper::header::COOKIE) {
        let Ok(value) = value.to_str() else { continue };
        for pair in value.split(';') {
            if let Some((name, value)) = pair.trim().split_once('=') {
                cookies.insert(name.trim().to_string(), value.trim().to_string());
            }
        }
    }
    cookies
}

const HOP_BY_HOP: [&str; 9] = [
    "connection",
    "proxy-connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Copy of a header map without hop-by-hop headers or `Host` (the
/// forwarding client derives those from the connection and URL).
fn strip_hop_by_hop(headers: &HeaderMap) -> HeaderMap {
    let mut stripped = HeaderMap::new();
    for (name, value) in headers {
        if HOP_BY_HOP.contains(&name.as_str()) || name.as_str() == "host" {
            continue;
        }
        stripped.append(name.clone(), value.clone());
    }
    stripped
}

fn extract_port(host: &str) -> String {
    match host.rsplit_once(':') {
        Some((_, port)) => port.to_string(),
        None => "80".to_string(),
    }
}

fn plain_response(status: StatusCode, body: String) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    response
}
