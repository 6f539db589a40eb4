//! Inbound webhook HTTP server
//!
//! Routes:
//! - `GET /webhook` - current server time (health-check style)
//! - `POST /webhook` - signed event batch from the messaging platform
//! - `GET /health` - liveness probe
//! - `GET /metrics` - Prometheus counters
//!
//! Uses hyper for the HTTP server. Batch processing lives in
//! `process_webhook` so it can be exercised without a socket.

use crate::domain::types::Event;
use crate::infra::metrics::Metrics;
use crate::io::line::{LineClient, ReplySender};
use crate::io::slack::TeamNotifier;
use crate::io::store::AttendanceStore;
use crate::services::attendance::AttendanceService;
use bytes::Bytes;
use chrono::{FixedOffset, Utc};
use http_body_util::{BodyExt, Full};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info};

const SIGNATURE_HEADER: &str = "x-line-signature";

/// Everything a request handler needs, shared across connections
pub struct ServerContext<S, N, R> {
    pub service: AttendanceService<S, N>,
    pub line: Arc<LineClient>,
    pub replier: Arc<R>,
    pub metrics: Arc<Metrics>,
    /// Business timezone used to stamp records and pick messages
    pub tz: FixedOffset,
}

/// Process one signed event batch and map the outcome to a status and a
/// JSON body.
///
/// Returns 200 `"success"` even when individual replies or notifications
/// failed, 500 `"register error"` when a record could not be persisted, and
/// 500 with the parse error otherwise.
pub async fn process_webhook<S, N, R>(
    ctx: &ServerContext<S, N, R>,
    signature: Option<&str>,
    body: &[u8],
) -> (StatusCode, String)
where
    S: AttendanceStore,
    N: TeamNotifier,
    R: ReplySender,
{
    let events: Vec<Event> = match ctx.line.parse_batch(signature, body) {
        Ok(events) => events,
        Err(e) => {
            ctx.metrics.record_parse_failure();
            info!(error = %e, "batch_rejected");
            return (StatusCode::INTERNAL_SERVER_ERROR, json_string(&e.to_string()));
        }
    };

    // One timestamp per request; every event in the batch shares it
    let now = Utc::now().with_timezone(&ctx.tz);

    for event in &events {
        ctx.metrics.record_event();

        match ctx.service.handle_event(event, now).await {
            Ok(reply_text) => {
                if let Err(e) = ctx.replier.send_reply(event.reply_token(), &reply_text).await {
                    // Reply failure must not fail the batch
                    ctx.metrics.record_reply_failure();
                    error!(error = %e, "reply_send_failed");
                }
            }
            Err(_) => {
                // Persistence is authoritative; abort the whole request
                return (StatusCode::INTERNAL_SERVER_ERROR, json_string("register error"));
            }
        }
    }

    (StatusCode::OK, json_string("success"))
}

fn json_string(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}

fn json_response(status: StatusCode, body: String) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::from(body)))
        .expect("static response should not fail")
}

/// Handle HTTP requests
async fn handle_request<S, N, R>(
    req: Request<hyper::body::Incoming>,
    ctx: Arc<ServerContext<S, N, R>>,
) -> Result<Response<Full<Bytes>>, Infallible>
where
    S: AttendanceStore,
    N: TeamNotifier,
    R: ReplySender,
{
    match (req.method(), req.uri().path()) {
        (&Method::GET, "/webhook") => {
            let now = Utc::now().with_timezone(&ctx.tz);
            Ok(json_response(StatusCode::OK, json_string(&now.to_rfc3339())))
        }
        (&Method::POST, "/webhook") => {
            ctx.metrics.record_request();

            let signature = req
                .headers()
                .get(SIGNATURE_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned);

            let body = match req.into_body().collect().await {
                Ok(collected) => collected.to_bytes(),
                Err(e) => {
                    error!(error = %e, "body_read_failed");
                    return Ok(json_response(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        json_string("body read error"),
                    ));
                }
            };

            let (status, body) = process_webhook(&ctx, signature.as_deref(), &body).await;
            Ok(json_response(status, body))
        }
        // CORS preflight for the webhook group
        (&Method::OPTIONS, "/webhook") => Ok(Response::builder()
            .status(StatusCode::OK)
            .header("Access-Control-Allow-Origin", "*")
            .header("Access-Control-Allow-Methods", "GET, POST, OPTIONS")
            .header("Access-Control-Allow-Headers", "Content-Type, X-Line-Signature")
            .body(Full::new(Bytes::from("")))
            .expect("static response should not fail")),
        (&Method::GET, "/health") => Ok(Response::builder()
            .status(StatusCode::OK)
            .body(Full::new(Bytes::from("ok")))
            .expect("static response should not fail")),
        (&Method::GET, "/metrics") => {
            let body = ctx.metrics.render_prometheus();
            Ok(Response::builder()
                .status(StatusCode::OK)
                .header("Content-Type", "text/plain; version=0.0.4; charset=utf-8")
                .body(Full::new(Bytes::from(body)))
                .expect("static response should not fail"))
        }
        _ => Ok(Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Full::new(Bytes::from("Not Found")))
            .expect("static response should not fail")),
    }
}

/// Start the webhook HTTP server
pub async fn start_server<S, N, R>(
    addr: SocketAddr,
    ctx: Arc<ServerContext<S, N, R>>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
where
    S: AttendanceStore + 'static,
    N: TeamNotifier + 'static,
    R: ReplySender + 'static,
{
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %addr, "webhook_server_started");

    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, _addr)) => {
                        let io = TokioIo::new(stream);
                        let ctx = ctx.clone();

                        tokio::spawn(async move {
                            let service = service_fn(move |req| {
                                let ctx = ctx.clone();
                                async move { handle_request(req, ctx).await }
                            });

                            if let Err(e) = http1::Builder::new()
                                .serve_connection(io, service)
                                .await
                            {
                                error!(error = %e, "webhook_http_error");
                            }
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "webhook_accept_error");
                    }
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("webhook_server_shutdown");
                    return Ok(());
                }
            }
        }
    }
}
