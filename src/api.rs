use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::Result;
use chrono::Local;
use serde::Serialize;
use tiny_http::{Header, Method, Request, Response, Server, StatusCode};
use tracing::{debug, info};

use crate::quart::clock::{MinuteOfDay, format_clock_string};
use crate::quart::model::{ColorSource, Quart};
use crate::quart::resolver::{Resolution, Resolver};
use crate::quart::window::{DEFAULT_RADIUS, visible_window};

const POLL_INTERVAL: Duration = Duration::from_millis(200);
const NOT_RUNNING: &str = "dashboard not running yet";

#[derive(Debug, Clone, Serialize)]
pub struct QuartSummary {
    pub index: usize,
    pub name: String,
    pub start: MinuteOfDay,
    pub end: MinuteOfDay,
    pub display_time: String,
    pub hex: String,
    pub use_black_text: bool,
    pub color_source: ColorSource,
    pub description: String,
}

impl QuartSummary {
    fn from_quart(index: usize, quart: &Quart) -> Self {
        Self {
            index,
            name: quart.name.clone(),
            start: quart.start(),
            end: quart.end(),
            display_time: quart.display_time().to_string(),
            hex: quart.color().hex().to_string(),
            use_black_text: quart.color().use_black_text(),
            color_source: quart.color().source().clone(),
            description: quart.description.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WindowEntry {
    pub offset: isize,
    pub index: usize,
    pub name: String,
    pub display_time: String,
    pub hex: String,
    pub opacity: f32,
    pub current: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RuntimeSnapshot {
    pub now: String,
    pub clock_label: String,
    pub resolution: Resolution,
    pub active: Option<QuartSummary>,
    pub progress_percent: f64,
    pub user_active: bool,
    pub window: Vec<WindowEntry>,
    pub schedule: Vec<QuartSummary>,
    pub updated_unix_ms: i64,
}

impl RuntimeSnapshot {
    pub fn capture(resolver: &Resolver, clock_label: &str, user_active: bool) -> Self {
        let schedule = resolver.schedule();
        let resolution = resolver.resolution();
        let active = resolver
            .display_quart()
            .map(|(index, quart)| QuartSummary::from_quart(index, quart));
        let window = match resolver.display_quart() {
            Some((index, _)) => visible_window(schedule.quarts(), index, DEFAULT_RADIUS)
                .into_iter()
                .map(|slot| WindowEntry {
                    offset: slot.offset,
                    index: slot.index,
                    name: slot.quart.name.clone(),
                    display_time: slot.quart.display_time().to_string(),
                    hex: slot.quart.color().hex().to_string(),
                    opacity: slot.opacity,
                    current: slot.is_current(),
                })
                .collect(),
            None => Vec::new(),
        };
        Self {
            now: format_clock_string(resolver.now_minutes()),
            clock_label: clock_label.to_string(),
            resolution,
            active,
            progress_percent: resolution.progress_percent(),
            user_active,
            window,
            schedule: schedule
                .quarts()
                .iter()
                .enumerate()
                .map(|(index, quart)| QuartSummary::from_quart(index, quart))
                .collect(),
            updated_unix_ms: Local::now().timestamp_millis(),
        }
    }
}

#[derive(Debug)]
pub struct ApiSharedState {
    pub runtime: Option<RuntimeSnapshot>,
    total_requests: u64,
    server_started_unix_ms: i64,
}

impl Default for ApiSharedState {
    fn default() -> Self {
        Self {
            runtime: None,
            total_requests: 0,
            server_started_unix_ms: Local::now().timestamp_millis(),
        }
    }
}

impl ApiSharedState {
    pub fn publish(&mut self, snapshot: RuntimeSnapshot) {
        self.runtime = Some(snapshot);
    }

    /// Drops the published snapshot; state routes answer 503 until the next publish.
    pub fn clear(&mut self) {
        self.runtime = None;
    }

    pub fn total_requests(&self) -> u64 {
        self.total_requests
    }
}

#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    pub bind_addr: String,
    pub port: u16,
}

/// Read-only HTTP view of the dashboard, served from a background thread until dropped.
pub struct ApiServer {
    pub state: Arc<Mutex<ApiSharedState>>,
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl ApiServer {
    pub fn start(config: ApiServerConfig) -> Result<Self> {
        let bind = format!("{}:{}", config.bind_addr, config.port);
        let server = Server::http(&bind)
            .map_err(|err| anyhow::anyhow!("failed to start API server on {bind}: {err}"))?;
        info!("local API listening on http://{bind}/v1");

        let state = Arc::new(Mutex::new(ApiSharedState::default()));
        let stop = Arc::new(AtomicBool::new(false));
        let worker = {
            let state = Arc::clone(&state);
            let stop = Arc::clone(&stop);
            thread::spawn(move || serve(&server, &state, &stop))
        };
        Ok(Self {
            state,
            stop,
            worker: Some(worker),
        })
    }
}

impl Drop for ApiServer {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(worker) = self.worker.take()
            && worker.join().is_err()
        {
            debug!("API worker panicked");
        }
    }
}

fn serve(server: &Server, state: &Mutex<ApiSharedState>, stop: &AtomicBool) {
    while !stop.load(Ordering::Relaxed) {
        if let Ok(Some(request)) = server.recv_timeout(POLL_INTERVAL) {
            handle_request(request, state);
        }
    }
}

/// A response body that has not been written to the socket yet.
enum Reply {
    Json(StatusCode, Vec<u8>),
    Text(StatusCode, &'static str),
}

fn json_reply<T: Serialize>(body: &T) -> Result<Reply> {
    Ok(Reply::Json(StatusCode(200), serde_json::to_vec(body)?))
}

#[derive(Serialize)]
struct IndexBody {
    state_url: &'static str,
    quarts_url: &'static str,
    health_url: &'static str,
}

#[derive(Serialize)]
struct HealthBody {
    ok: bool,
    total_requests: u64,
    server_started_unix_ms: i64,
}

/// Resolves a GET path against the shared state, counting the request.
fn route(path: &str, state: &mut ApiSharedState) -> Result<Reply> {
    state.total_requests += 1;
    match path {
        "/v1" => json_reply(&IndexBody {
            state_url: "/v1/state",
            quarts_url: "/v1/quarts",
            health_url: "/healthz",
        }),
        "/" | "/v1/state" => match &state.runtime {
            Some(runtime) => json_reply(runtime),
            None => Ok(Reply::Text(StatusCode(503), NOT_RUNNING)),
        },
        "/v1/quarts" => match &state.runtime {
            Some(runtime) => json_reply(&runtime.schedule),
            None => Ok(Reply::Text(StatusCode(503), NOT_RUNNING)),
        },
        "/healthz" => json_reply(&HealthBody {
            ok: true,
            total_requests: state.total_requests(),
            server_started_unix_ms: state.server_started_unix_ms,
        }),
        _ => Ok(Reply::Text(StatusCode(404), "not found")),
    }
}

fn handle_request(request: Request, state: &Mutex<ApiSharedState>) {
    let reply = if request.method() != &Method::Get {
        Reply::Text(StatusCode(405), "method not allowed")
    } else if !request
        .remote_addr()
        .is_some_and(|addr| is_local_network_ip(addr.ip()))
    {
        Reply::Text(StatusCode(403), "forbidden: local network only")
    } else {
        let url = request.url();
        let path = url.split_once('?').map_or(url, |(path, _)| path);
        debug!(path, "api request");
        let routed = match state.lock() {
            Ok(mut guard) => route(path, &mut guard),
            Err(_) => Ok(Reply::Text(StatusCode(500), "internal state lock error")),
        };
        routed.unwrap_or_else(|err| {
            debug!("failed to encode API response: {err:#}");
            Reply::Text(StatusCode(500), "failed to encode response")
        })
    };
    if let Err(err) = respond(request, reply) {
        debug!("failed to send API response: {err:#}");
    }
}

fn respond(request: Request, reply: Reply) -> Result<()> {
    let (status, content_type, body) = match reply {
        Reply::Json(status, body) => (status, "application/json; charset=utf-8", body),
        Reply::Text(status, text) => (status, "text/plain; charset=utf-8", text.as_bytes().to_vec()),
    };
    let header = Header::from_str(&format!("Content-Type: {content_type}"))
        .map_err(|_| anyhow::anyhow!("failed to build content-type header"))?;
    request.respond(
        Response::from_data(body)
            .with_status_code(status)
            .with_header(header),
    )?;
    Ok(())
}

fn is_local_v4(ip: Ipv4Addr) -> bool {
    ip.is_loopback() || ip.is_private() || ip.is_link_local()
}

fn is_local_network_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_local_v4(v4),
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => is_local_v4(v4),
            None => v6.is_loopback() || v6.is_unique_local() || v6.is_unicast_link_local(),
        },
    }
}
