use barcode_reader_capture::Source;
use barcode_reader_common::config::Config;
use barcode_reader_scanner::decoder::{DecoderChain, SymbolDecoder};
use barcode_reader_scanner::{FrameAnalyzer, SessionTracker};
use barcode_reader_web::WebDisplay;
use std::path::PathBuf;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    let config = match Config::load(&config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {e}", config_path.display());
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.parse().unwrap_or_default()),
        )
        .init();

    let decoder = DecoderChain::default();
    info!(
        mode = config.camera.mode,
        decoder = decoder.name(),
        bind = config.ui.bind,
        port = config.ui.port,
        "starting barcode reader"
    );

    let (display, snapshots) = WebDisplay::channel(config.ui.jpeg_quality);
    let app = barcode_reader_web::router(&config.ui, snapshots);

    let addr = format!("{}:{}", config.ui.bind, config.ui.port);
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            eprintln!("Failed to bind to {addr}: {e}");
            std::process::exit(1);
        }
    };
    let mut server = tokio::spawn(barcode_reader_web::serve(listener, app));

    let mut tracker = SessionTracker::new(FrameAnalyzer::new(decoder), display);
    let session = async {
        match Source::open(&config.camera).await {
            Ok(source) => tracker.run(source).await,
            Err(e) => tracker.stop(e),
        }
    };

    tokio::select! {
        summary = session => {
            info!(
                frames = summary.frames,
                unique_codes = summary.unique_codes,
                last_code = summary.last_code.as_deref().unwrap_or("-"),
                "session over, UI keeps its last state until interrupted"
            );
        }
        result = &mut server => {
            report_server_exit(result);
            std::process::exit(1);
        }
        _ = tokio::signal::ctrl_c() => {
            info!("interrupted");
            return;
        }
    }

    // The tracker still holds the display, so the page keeps showing the last state.
    tokio::select! {
        result = &mut server => {
            report_server_exit(result);
            std::process::exit(1);
        }
        _ = tokio::signal::ctrl_c() => {
            info!(
                frames = tracker.frames(),
                unique_codes = tracker.count(),
                last_code = tracker.last_code().unwrap_or("-"),
                "interrupted"
            );
        }
    }
}

fn report_server_exit(result: Result<std::io::Result<()>, tokio::task::JoinError>) {
    match result {
        Ok(Ok(())) => error!("UI server stopped unexpectedly"),
        Ok(Err(e)) => error!(error = %e, "UI server failed"),
        Err(e) => error!(error = %e, "UI server task panicked"),
    }
}
