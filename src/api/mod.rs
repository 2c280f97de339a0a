//! HTTP surface for camera listing, detection, and map assets.
//!
//! Routes:
//! - `GET  /health`
//! - `GET  /api/configs`
//! - `POST /api/detect` (multipart: `camera`, `image`)
//! - `GET  /api/reference-image`
//! - `GET  /api/parking-map`

pub mod multipart;

use anyhow::{anyhow, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::cameras::CameraConfig;
use crate::detect::{DetectInput, DetectionPipeline};
use crate::inference::ImagePayload;
use crate::map::{ParkingMap, DEFAULT_PARKING_MAP_PATH};
use crate::media::{load_reference_image, mime_for_upload};

const MAX_HEADER_BYTES: usize = 16 * 1024;
const READ_TIMEOUT: Duration = Duration::from_secs(30);
const REJECT_DRAIN_TIMEOUT: Duration = Duration::from_millis(200);
const ASSET_CACHE_CONTROL: &str = "public, max-age=60";

#[derive(Clone, Debug)]
pub struct ApiConfig {
    pub addr: String,
    pub max_upload_bytes: usize,
    /// Connections handled at once. Connections past the cap get 503.
    pub max_connections: usize,
    pub parking_map_path: PathBuf,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:8788".to_string(),
            max_upload_bytes: 20 * 1024 * 1024,
            max_connections: 64,
            parking_map_path: PathBuf::from(DEFAULT_PARKING_MAP_PATH),
        }
    }
}

#[derive(Debug)]
pub struct ApiHandle {
    pub addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl ApiHandle {
    /// Stop accepting connections. In-flight requests run to completion.
    pub fn stop(mut self) -> Result<()> {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(join) = self.join.take() {
            join.join()
                .map_err(|_| anyhow!("api server thread panicked"))?;
        }
        Ok(())
    }
}

pub struct ApiServer {
    cfg: ApiConfig,
    pipeline: Arc<DetectionPipeline>,
}

impl ApiServer {
    pub fn new(cfg: ApiConfig, pipeline: Arc<DetectionPipeline>) -> Self {
        Self { cfg, pipeline }
    }

    pub fn spawn(self) -> Result<ApiHandle> {
        let configured_addr: SocketAddr = self.cfg.addr.parse()?;
        let listener = TcpListener::bind(configured_addr)?;
        let addr = listener.local_addr()?;
        listener.set_nonblocking(true)?;

        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_thread = shutdown.clone();
        let ctx = Arc::new(RequestContext {
            cfg: self.cfg,
            pipeline: self.pipeline,
            active: AtomicUsize::new(0),
        });
        let join = std::thread::spawn(move || {
            if let Err(err) = run_api(listener, ctx, shutdown_thread) {
                log::error!("parking api stopped: {}", err);
            }
        });

        Ok(ApiHandle {
            addr,
            shutdown,
            join: Some(join),
        })
    }
}

struct RequestContext {
    cfg: ApiConfig,
    pipeline: Arc<DetectionPipeline>,
    active: AtomicUsize,
}

/// One occupied handler slot, released on drop.
struct ConnectionSlot {
    ctx: Arc<RequestContext>,
}

impl ConnectionSlot {
    fn acquire(ctx: &Arc<RequestContext>) -> Option<Self> {
        let limit = ctx.cfg.max_connections;
        ctx.active
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |active| {
                (active < limit).then_some(active + 1)
            })
            .ok()
            .map(|_| Self { ctx: ctx.clone() })
    }
}

impl Drop for ConnectionSlot {
    fn drop(&mut self) {
        self.ctx.active.fetch_sub(1, Ordering::SeqCst);
    }
}

fn run_api(
    listener: TcpListener,
    ctx: Arc<RequestContext>,
    shutdown: Arc<AtomicBool>,
) -> Result<()> {
    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }
        match listener.accept() {
            Ok((stream, peer)) => {
                let Some(slot) = ConnectionSlot::acquire(&ctx) else {
                    log::warn!(
                        "rejecting connection from {}: {} handlers busy",
                        peer,
                        ctx.cfg.max_connections
                    );
                    if let Err(err) = reject_busy(stream) {
                        log::debug!("busy reply to {} failed: {}", peer, err);
                    }
                    continue;
                };
                std::thread::spawn(move || {
                    if let Err(err) = handle_connection(stream, &slot.ctx) {
                        log::warn!("parking api request failed: {}", err);
                    }
                });
            }
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(Duration::from_millis(50));
                continue;
            }
            Err(err) => return Err(err.into()),
        }
    }
    Ok(())
}

fn handle_connection(mut stream: TcpStream, ctx: &RequestContext) -> Result<()> {
    stream.set_nonblocking(false)?;
    stream.set_read_timeout(Some(READ_TIMEOUT))?;

    let (head, prefix) = match read_head(&mut stream)? {
        RequestHead::Complete { head, rest } => (head, rest),
        RequestHead::TooLarge => {
            log::warn!("request rejected: headers exceed {} bytes", MAX_HEADER_BYTES);
            write_error(&mut stream, 431, "Request headers too large")?;
            finish_rejected(&mut stream);
            return Ok(());
        }
        RequestHead::Closed => return Ok(()),
    };
    let request = match parse_head(&head) {
        Ok(request) => request,
        Err(err) => {
            log::warn!("malformed request: {}", err);
            write_error(&mut stream, 400, "Malformed request")?;
            finish_rejected(&mut stream);
            return Ok(());
        }
    };

    let content_length = match request.content_length() {
        Ok(length) => length,
        Err(err) => {
            log::warn!("{} {} rejected: {}", request.method, request.path, err);
            write_error(&mut stream, 400, "Malformed request")?;
            finish_rejected(&mut stream);
            return Ok(());
        }
    };
    if content_length > ctx.cfg.max_upload_bytes {
        log::warn!(
            "{} {} rejected: body of {} bytes exceeds limit",
            request.method,
            request.path,
            content_length
        );
        write_error(&mut stream, 413, "Request body too large")?;
        // Closing with unread input resets the connection before the client
        // sees the response.
        stream.shutdown(Shutdown::Write)?;
        let unread = content_length.saturating_sub(prefix.len()) as u64;
        let _ = std::io::copy(&mut Read::by_ref(&mut stream).take(unread), &mut std::io::sink());
        return Ok(());
    }
    let body = read_body(&mut stream, prefix, content_length)?;

    let status = route(&mut stream, ctx, &request, &body)?;
    log::info!("{} {} -> {}", request.method, request.path, status);
    Ok(())
}

fn route(
    stream: &mut TcpStream,
    ctx: &RequestContext,
    request: &HttpRequest,
    body: &[u8],
) -> Result<u16> {
    let allowed = match request.path.as_str() {
        "/health" | "/api/configs" | "/api/reference-image" | "/api/parking-map" => "GET",
        "/api/detect" => "POST",
        _ => {
            write_error(stream, 404, "Not found")?;
            return Ok(404);
        }
    };
    if request.method != allowed {
        write_error(stream, 405, "Method not allowed")?;
        return Ok(405);
    }

    match request.path.as_str() {
        "/health" => {
            write_json_response(stream, 200, r#"{"status":"ok"}"#)?;
            Ok(200)
        }
        "/api/configs" => handle_configs(stream, ctx),
        "/api/reference-image" => handle_reference_image(stream, ctx),
        "/api/parking-map" => handle_parking_map(stream, ctx),
        _ => handle_detect(stream, ctx, request, body),
    }
}

#[derive(Serialize)]
struct ConfigEntry<'a> {
    key: &'a str,
    #[serde(flatten)]
    config: &'a CameraConfig,
}

#[derive(Serialize)]
struct ConfigList<'a> {
    configs: Vec<ConfigEntry<'a>>,
}

fn handle_configs(stream: &mut TcpStream, ctx: &RequestContext) -> Result<u16> {
    let configs = match ctx.pipeline.cameras().load() {
        Ok(configs) => configs,
        Err(err) => {
            log::error!("camera configuration unavailable: {:#}", err);
            write_error(stream, 500, "Camera configuration unavailable")?;
            return Ok(500);
        }
    };
    let list = ConfigList {
        configs: configs
            .iter()
            .map(|(key, config)| ConfigEntry { key, config })
            .collect(),
    };
    let payload = serde_json::to_vec(&list)?;
    write_response(stream, 200, "application/json", &payload, None)?;
    Ok(200)
}

fn handle_reference_image(stream: &mut TcpStream, ctx: &RequestContext) -> Result<u16> {
    match load_reference_image(ctx.pipeline.reference_image_path()) {
        Ok(Some(image)) => {
            write_response(
                stream,
                200,
                &image.mime_type,
                &image.bytes,
                Some(ASSET_CACHE_CONTROL),
            )?;
            Ok(200)
        }
        Ok(None) => {
            log::error!(
                "reference image missing at {}",
                ctx.pipeline.reference_image_path().display()
            );
            write_error(stream, 500, "Reference image not found")?;
            Ok(500)
        }
        Err(err) => {
            log::error!("{:#}", err);
            write_error(stream, 500, "Reference image unavailable")?;
            Ok(500)
        }
    }
}

fn handle_parking_map(stream: &mut TcpStream, ctx: &RequestContext) -> Result<u16> {
    match ParkingMap::load(&ctx.cfg.parking_map_path) {
        Ok(map) => {
            let payload = serde_json::to_vec(&map)?;
            write_response(
                stream,
                200,
                "application/json",
                &payload,
                Some(ASSET_CACHE_CONTROL),
            )?;
            Ok(200)
        }
        Err(err) => {
            log::error!("{:#}", err);
            write_error(stream, 500, "Parking map unavailable")?;
            Ok(500)
        }
    }
}

fn handle_detect(
    stream: &mut TcpStream,
    ctx: &RequestContext,
    request: &HttpRequest,
    body: &[u8],
) -> Result<u16> {
    let input = detect_input(request, body);
    match ctx.pipeline.detect(input) {
        Ok(response) => {
            let payload = serde_json::to_vec(&response)?;
            write_response(stream, 200, "application/json", &payload, None)?;
            Ok(200)
        }
        Err(err) => {
            let status = err.status_code();
            if err.is_client_error() {
                log::warn!("detect rejected: {}", err);
            } else {
                log::error!("detect failed: {}", err);
            }
            write_error(stream, status, &err.public_message())?;
            Ok(status)
        }
    }
}

/// Pull `camera` and `image` out of a multipart body.
///
/// An unparseable form reads as empty so the pipeline reports it in its usual
/// order.
fn detect_input(request: &HttpRequest, body: &[u8]) -> DetectInput {
    let parts = request
        .header("content-type")
        .and_then(multipart::boundary_from_content_type)
        .map(|boundary| multipart::parse(body, &boundary))
        .transpose()
        .unwrap_or_else(|err| {
            log::warn!("unreadable multipart body: {}", err);
            None
        })
        .unwrap_or_default();

    let camera = parts
        .iter()
        .find(|part| part.name == "camera")
        .map(|part| part.text());
    let image = parts
        .into_iter()
        .find(|part| part.name == "image" && part.is_file())
        .map(|part| {
            let mime = mime_for_upload(part.content_type.as_deref(), &part.data);
            ImagePayload::new(mime, part.data)
        });
    DetectInput { camera, image }
}

/// Reply 503 from the accept thread without tying up a handler.
fn reject_busy(mut stream: TcpStream) -> Result<()> {
    stream.set_nonblocking(false)?;
    stream.set_write_timeout(Some(REJECT_DRAIN_TIMEOUT))?;
    write_error(&mut stream, 503, "Server busy")?;
    finish_rejected(&mut stream);
    Ok(())
}

/// Half-close after an early error reply and discard pending input briefly.
/// Closing with unread input resets the connection before the client sees
/// the response.
fn finish_rejected(stream: &mut TcpStream) {
    let _ = stream.shutdown(Shutdown::Write);
    let _ = stream.set_read_timeout(Some(REJECT_DRAIN_TIMEOUT));
    let _ = std::io::copy(
        &mut Read::by_ref(stream).take(MAX_HEADER_BYTES as u64),
        &mut std::io::sink(),
    );
}

enum RequestHead {
    Complete { head: Vec<u8>, rest: Vec<u8> },
    TooLarge,
    Closed,
}

fn read_head(stream: &mut TcpStream) -> Result<RequestHead> {
    let mut buf = [0u8; 4096];
    let mut data = Vec::new();
    loop {
        if let Some(end) = find_header_end(&data) {
            let rest = data.split_off(end + 4);
            data.truncate(end);
            return Ok(RequestHead::Complete { head: data, rest });
        }
        if data.len() > MAX_HEADER_BYTES {
            return Ok(RequestHead::TooLarge);
        }
        let n = stream.read(&mut buf)?;
        if n == 0 {
            if !data.is_empty() {
                log::debug!("connection closed before headers completed");
            }
            return Ok(RequestHead::Closed);
        }
        data.extend_from_slice(&buf[..n]);
    }
}

fn read_body(stream: &mut TcpStream, mut body: Vec<u8>, content_length: usize) -> Result<Vec<u8>> {
    if body.len() >= content_length {
        body.truncate(content_length);
        return Ok(body);
    }
    let remaining = content_length - body.len();
    body.reserve(remaining);
    Read::by_ref(stream)
        .take(remaining as u64)
        .read_to_end(&mut body)?;
    if body.len() < content_length {
        return Err(anyhow!(
            "request body truncated: expected {} bytes, got {}",
            content_length,
            body.len()
        ));
    }
    Ok(body)
}

fn find_header_end(data: &[u8]) -> Option<usize> {
    data.windows(4).position(|w| w == b"\r\n\r\n")
}

fn parse_head(head: &[u8]) -> Result<HttpRequest> {
    let text = String::from_utf8_lossy(head);
    let mut lines = text.split("\r\n");
    let request_line = lines.next().ok_or_else(|| anyhow!("empty request"))?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next().ok_or_else(|| anyhow!("missing method"))?;
    let raw_path = parts.next().ok_or_else(|| anyhow!("missing path"))?;
    let version = parts.next().ok_or_else(|| anyhow!("missing http version"))?;
    if !version.starts_with("HTTP/") || !raw_path.starts_with('/') {
        return Err(anyhow!("invalid request line '{}'", request_line));
    }
    let mut headers = HashMap::new();
    for line in lines {
        if line.is_empty() {
            break;
        }
        if let Some((k, v)) = line.split_once(':') {
            headers.insert(k.trim().to_lowercase(), v.trim().to_string());
        }
    }
    let path = raw_path.split('?').next().unwrap_or(raw_path).to_string();
    Ok(HttpRequest {
        method: method.to_string(),
        path,
        headers,
    })
}

fn write_json_response(stream: &mut TcpStream, status: u16, body: &str) -> Result<()> {
    write_response(stream, status, "application/json", body.as_bytes(), None)
}

fn write_error(stream: &mut TcpStream, status: u16, message: &str) -> Result<()> {
    let body = serde_json::json!({ "error": message }).to_string();
    write_json_response(stream, status, &body)
}

fn write_response(
    stream: &mut TcpStream,
    status: u16,
    content_type: &str,
    body: &[u8],
    cache_control: Option<&str>,
) -> Result<()> {
    let status_line = match status {
        200 => "HTTP/1.1 200 OK",
        400 => "HTTP/1.1 400 Bad Request",
        404 => "HTTP/1.1 404 Not Found",
        405 => "HTTP/1.1 405 Method Not Allowed",
        413 => "HTTP/1.1 413 Payload Too Large",
        431 => "HTTP/1.1 431 Request Header Fields Too Large",
        502 => "HTTP/1.1 502 Bad Gateway",
        503 => "HTTP/1.1 503 Service Unavailable",
        _ => "HTTP/1.1 500 Internal Server Error",
    };
    let header = format!(
        "{status_line}\r\nContent-Type: {content_type}\r\nContent-Length: {len}\r\nCache-Control: {cache}\r\nConnection: close\r\n\r\n",
        status_line = status_line,
        content_type = content_type,
        len = body.len(),
        cache = cache_control.unwrap_or("no-store")
    );
    stream.write_all(header.as_bytes())?;
    stream.write_all(body)?;
    stream.flush()?;
    Ok(())
}

#[derive(Debug)]
struct HttpRequest {
    method: String,
    path: String,
    headers: HashMap<String, String>,
}

impl HttpRequest {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    fn content_length(&self) -> Result<usize> {
        match self.header("content-length") {
            Some(value) => value
                .parse()
                .map_err(|_| anyhow!("invalid content-length '{}'", value)),
            None => Ok(0),
        }
    }
}
