//! Browser UI for a reading session.
//!
//! The session loop pushes display updates into a [`WebDisplay`]; the HTTP
//! handlers only ever read the latest [`Snapshot`] from a watch channel.

use std::convert::Infallible;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use barcode_reader_common::config::UiConfig;
use barcode_reader_common::display::DisplaySink;
use barcode_reader_common::frame::Frame;
use bytes::Bytes;
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

const PAGE_TEMPLATE: &str = include_str!("../assets/index.html");
const PART_BOUNDARY: &str = "frame";

// ---------------------------------------------------------------------------
// Display state
// ---------------------------------------------------------------------------

/// Everything the page shows, as of the most recent display update.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    /// Latest annotated frame, JPEG encoded.
    pub frame_jpeg: Option<Bytes>,
    /// Capture time of `frame_jpeg`, unix milliseconds.
    pub frame_captured_at_ms: i64,
    /// Number of frames shown so far.
    pub frames: u64,
    pub last_code: Option<String>,
    pub count: usize,
    pub codes: Vec<String>,
    pub error: Option<String>,
}

/// [`DisplaySink`] that publishes into a watch channel for the web handlers.
pub struct WebDisplay {
    tx: watch::Sender<Snapshot>,
    jpeg_quality: u8,
}

impl WebDisplay {
    /// Create a display and the receiver the router reads from.
    pub fn channel(jpeg_quality: u8) -> (Self, watch::Receiver<Snapshot>) {
        let (tx, rx) = watch::channel(Snapshot::default());
        (Self { tx, jpeg_quality }, rx)
    }
}

impl DisplaySink for WebDisplay {
    fn show_frame(&mut self, frame: &Frame) {
        let jpeg = match frame.to_jpeg(self.jpeg_quality) {
            Ok(j) => Bytes::from(j),
            Err(e) => {
                warn!(error = %e, seq = frame.seq, "failed to encode frame for display");
                return;
            }
        };
        self.tx.send_modify(|s| {
            s.frame_jpeg = Some(jpeg);
            s.frame_captured_at_ms = frame.captured_at_ms;
            s.frames += 1;
        });
    }

    fn show_last_code(&mut self, code: &str) {
        self.tx.send_modify(|s| s.last_code = Some(code.to_string()));
    }

    fn show_count(&mut self, count: usize) {
        self.tx.send_modify(|s| s.count = count);
    }

    fn show_table(&mut self, rows: &[String]) {
        self.tx.send_modify(|s| {
            s.codes.clear();
            s.codes.extend_from_slice(rows);
        });
    }

    fn show_error(&mut self, message: &str) {
        self.tx.send_modify(|s| s.error = Some(message.to_string()));
    }
}

// ---------------------------------------------------------------------------
// App state
// ---------------------------------------------------------------------------

struct AppState {
    page: String,
    snapshots: watch::Receiver<Snapshot>,
}

#[derive(Debug, Serialize)]
struct StateView {
    last_code: Option<String>,
    count: usize,
    codes: Vec<String>,
    error: Option<String>,
    frames: u64,
    frame_captured_at_ms: i64,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET / — the reader page
async fn index(State(state): State<Arc<AppState>>) -> Html<String> {
    Html(state.page.clone())
}

/// GET /api/state — last code, count and table as JSON
async fn api_state(State(state): State<Arc<AppState>>) -> Json<StateView> {
    let snap = state.snapshots.borrow();
    Json(StateView {
        last_code: snap.last_code.clone(),
        count: snap.count,
        codes: snap.codes.clone(),
        error: snap.error.clone(),
        frames: snap.frames,
        frame_captured_at_ms: snap.frame_captured_at_ms,
    })
}

/// GET /frame.jpg — latest annotated frame, 204 until the first one arrives
async fn latest_frame(State(state): State<Arc<AppState>>) -> Response {
    let jpeg = state.snapshots.borrow().frame_jpeg.clone();
    match jpeg {
        Some(jpeg) => ([(CONTENT_TYPE, "image/jpeg"), (CACHE_CONTROL, "no-cache")], jpeg).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

/// GET /video — multipart MJPEG stream, one part per displayed frame
async fn video(State(state): State<Arc<AppState>>) -> Response {
    let rx = state.snapshots.clone();
    let parts = futures_util::stream::unfold((rx, 0u64), |(mut rx, sent)| async move {
        loop {
            let next = {
                let snap = rx.borrow_and_update();
                match &snap.frame_jpeg {
                    Some(jpeg) if snap.frames != sent => Some((jpeg.clone(), snap.frames)),
                    _ => None,
                }
            };
            if let Some((jpeg, frames)) = next {
                return Some((Ok::<_, Infallible>(mjpeg_part(&jpeg)), (rx, frames)));
            }
            // Sender gone: the session is over and no new frames will come.
            if rx.changed().await.is_err() {
                return None;
            }
        }
    });

    (
        [
            (
                CONTENT_TYPE,
                format!("multipart/x-mixed-replace; boundary={PART_BOUNDARY}"),
            ),
            (CACHE_CONTROL, "no-cache".to_string()),
        ],
        Body::from_stream(parts),
    )
        .into_response()
}

fn mjpeg_part(jpeg: &[u8]) -> Bytes {
    let header = format!(
        "--{PART_BOUNDARY}\r\nContent-Type: image/jpeg\r\nContent-Length: {}\r\n\r\n",
        jpeg.len()
    );
    let mut part = Vec::with_capacity(header.len() + jpeg.len() + 2);
    part.extend_from_slice(header.as_bytes());
    part.extend_from_slice(jpeg);
    part.extend_from_slice(b"\r\n");
    Bytes::from(part)
}

fn render_page(ui: &UiConfig) -> String {
    PAGE_TEMPLATE
        .replace("{{TITLE}}", &escape_html(&ui.title))
        .replace("{{REFRESH_MS}}", &ui.refresh_ms.max(1).to_string())
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn router(ui: &UiConfig, snapshots: watch::Receiver<Snapshot>) -> Router {
    let state = Arc::new(AppState {
        page: render_page(ui),
        snapshots,
    });

    Router::new()
        .route("/", get(index))
        .route("/api/state", get(api_state))
        .route("/frame.jpg", get(latest_frame))
        .route("/video", get(video))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the UI until the process ends.
pub async fn serve(listener: TcpListener, app: Router) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "UI server listening");
    }
    axum::serve(listener, app).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use barcode_reader_common::frame::ChannelOrder;
    use futures_util::StreamExt;

    fn app_state(rx: watch::Receiver<Snapshot>) -> State<Arc<AppState>> {
        State(Arc::new(AppState {
            page: render_page(&UiConfig::default()),
            snapshots: rx,
        }))
    }

    fn small_frame(seq: u64) -> Frame {
        Frame::new(8, 8, ChannelOrder::Rgb, vec![200; 8 * 8 * 3])
            .unwrap()
            .with_meta(seq, 1_700_000_000_000 + seq as i64)
    }

    #[test]
    fn display_updates_land_in_snapshot() {
        let (mut display, rx) = WebDisplay::channel(80);
        display.show_frame(&small_frame(7));
        display.show_last_code("ABCDEFGHIJKLM");
        display.show_count(1);
        display.show_table(&["ABCDEFGHIJKLM".to_string()]);

        let snap = rx.borrow().clone();
        assert_eq!(snap.frames, 1);
        assert_eq!(snap.frame_captured_at_ms, 1_700_000_000_007);
        assert!(snap.frame_jpeg.as_ref().is_some_and(|j| j.starts_with(&[0xFF, 0xD8])));
        assert_eq!(snap.last_code.as_deref(), Some("ABCDEFGHIJKLM"));
        assert_eq!(snap.count, 1);
        assert_eq!(snap.codes, vec!["ABCDEFGHIJKLM"]);
        assert!(snap.error.is_none());
    }

    #[test]
    fn table_is_replaced_not_appended() {
        let (mut display, rx) = WebDisplay::channel(80);
        display.show_table(&["A".to_string()]);
        display.show_table(&["A".to_string(), "B".to_string()]);
        assert_eq!(rx.borrow().codes, vec!["A", "B"]);
    }

    #[tokio::test]
    async fn state_endpoint_reports_latest_values() {
        let (mut display, rx) = WebDisplay::channel(80);
        display.show_count(2);
        display.show_table(&["CODE000000001".to_string(), "CODE000000002".to_string()]);
        display.show_last_code("CODE000000002");
        display.show_error("Could not capture video: stream ended");

        let Json(view) = api_state(app_state(rx)).await;
        assert_eq!(view.count, 2);
        assert_eq!(view.codes.len(), 2);
        assert_eq!(view.last_code.as_deref(), Some("CODE000000002"));
        assert_eq!(view.error.as_deref(), Some("Could not capture video: stream ended"));

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["count"], 2);
        assert_eq!(json["frame_captured_at_ms"], 0);
        assert!(json["last_code"].is_string());
    }

    #[tokio::test]
    async fn latest_frame_is_no_content_before_first_frame() {
        let (mut display, rx) = WebDisplay::channel(80);
        let state = app_state(rx);

        let resp = latest_frame(state.clone()).await;
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);

        display.show_frame(&small_frame(0));
        let resp = latest_frame(state).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[CONTENT_TYPE], "image/jpeg");
    }

    #[tokio::test]
    async fn video_stream_emits_a_part_per_frame() {
        let (mut display, rx) = WebDisplay::channel(80);
        display.show_frame(&small_frame(0));

        let resp = video(app_state(rx)).await;
        assert!(resp.headers()[CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("multipart/x-mixed-replace"));

        let mut body = resp.into_body().into_data_stream();
        let first = body.next().await.unwrap().unwrap();
        assert!(first.starts_with(b"--frame\r\nContent-Type: image/jpeg\r\n"));
        assert!(first.ends_with(b"\r\n"));

        display.show_frame(&small_frame(1));
        let second = body.next().await.unwrap().unwrap();
        assert!(second.starts_with(b"--frame\r\n"));

        // closing the display ends the stream
        drop(display);
        assert!(body.next().await.is_none());
    }

    #[tokio::test]
    async fn page_carries_title_and_refresh() {
        let ui = UiConfig {
            title: "Dock <3>".into(),
            refresh_ms: 500,
            ..UiConfig::default()
        };
        let (_display, rx) = WebDisplay::channel(80);
        let state = State(Arc::new(AppState {
            page: render_page(&ui),
            snapshots: rx,
        }));
        let Html(page) = index(state).await;
        assert!(page.contains("<title>Dock &lt;3&gt;</title>"));
        assert!(page.contains("const refreshMs = 500;"));
        assert!(page.contains("Show table of read codes"));
    }
}
