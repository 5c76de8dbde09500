//! Camera streaming server
//!
//! Run with: cargo run --example camera_server [OPTIONS]
//!
//! Examples:
//!   cargo run --example camera_server                          # camera, 640x480@24
//!   cargo run --example camera_server -- --test-pattern        # no camera needed
//!   cargo run --example camera_server -- --resolution 320x240 --framerate 15
//!   cargo run --example camera_server -- --http 127.0.0.1:8080 --stream 127.0.0.1:8081
//!
//! Requires `ffmpeg` on PATH (or `--transcoder PATH`), and `libcamera-vid` unless `--test-pattern` is given.
//! Open the printed URL in a browser to watch.

use std::net::SocketAddr;
use std::process::ExitCode;
use std::time::Duration;

use camstream::lifecycle::spawn_signal_listener;
use camstream::{CaptureSource, CommandCapture, Orchestrator, ServerConfig, TestPattern};

struct Options {
    config: ServerConfig,
    test_pattern: bool,
}

fn parse_resolution(arg: &str) -> Result<(u16, u16), String> {
    let (w, h) = arg
        .split_once('x')
        .ok_or_else(|| format!("Invalid resolution: '{}'. Expected WIDTHxHEIGHT", arg))?;
    let width = w.parse().map_err(|_| format!("Invalid width: '{}'", w))?;
    let height = h.parse().map_err(|_| format!("Invalid height: '{}'", h))?;
    Ok((width, height))
}

fn parse_addr(arg: &str) -> Result<SocketAddr, String> {
    arg.replace("localhost", "127.0.0.1")
        .parse()
        .map_err(|_| format!("Invalid address: '{}'. Expected IP:PORT", arg))
}

fn parse_args(args: &[String]) -> Result<Options, String> {
    let mut config = ServerConfig::default().warmup(Duration::from_secs(1));
    let mut test_pattern = false;
    let mut orientation = config.capture.orientation;
    let mut iter = args.iter().skip(1);

    while let Some(arg) = iter.next() {
        let mut value = || {
            iter.next()
                .cloned()
                .ok_or_else(|| format!("Missing value for {}", arg))
        };

        match arg.as_str() {
            "--test-pattern" => test_pattern = true,
            "--resolution" => {
                let (width, height) = parse_resolution(&value()?)?;
                config = config.resolution(width, height);
            }
            "--framerate" => {
                let raw = value()?;
                let fps = raw
                    .parse()
                    .map_err(|_| format!("Invalid framerate: '{}'", raw))?;
                config = config.framerate(fps);
            }
            "--http" => config = config.http_addr(parse_addr(&value()?)?),
            "--stream" => config = config.stream_addr(parse_addr(&value()?)?),
            "--transcoder" => {
                let transcoder = config.transcoder.clone().program(value()?);
                config = config.transcoder(transcoder);
            }
            "--hflip" => orientation.hflip = true,
            "--no-vflip" => orientation.vflip = false,
            other => return Err(format!("Unknown option: '{}'", other)),
        }
    }

    Ok(Options {
        config: config.orientation(orientation),
        test_pattern,
    })
}

fn print_usage() {
    eprintln!("Usage: camera_server [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --test-pattern           Generate frames instead of reading the camera");
    eprintln!("  --resolution WxH         Frame size (default: 640x480)");
    eprintln!("  --framerate N            Frames per second (default: 24)");
    eprintln!("  --http ADDR              Viewer page address (default: 0.0.0.0:8082)");
    eprintln!("  --stream ADDR            WebSocket stream address (default: 0.0.0.0:8084)");
    eprintln!("  --transcoder PATH        Transcoder binary (default: ffmpeg)");
    eprintln!("  --hflip                  Mirror horizontally");
    eprintln!("  --no-vflip               Do not flip vertically");
}

async fn run<C: CaptureSource>(config: ServerConfig, capture: C) -> ExitCode {
    let orchestrator = match Orchestrator::new(config) {
        Ok(orchestrator) => orchestrator,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // Installed before start so ctrl-c during camera warmup still works
    if let Err(e) = spawn_signal_listener(orchestrator.trigger()) {
        eprintln!("Failed to install signal handlers: {}", e);
        return ExitCode::FAILURE;
    }

    let handle = match orchestrator.start(capture).await {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("Failed to start: {}", e);
            return ExitCode::FAILURE;
        }
    };

    println!();
    println!("Open {} in a browser to watch", handle.http_url());
    println!("Stream: ws://{}/", handle.stream_addr());
    println!("Press Ctrl+C to stop");
    println!();

    let failure = handle.wait().await;

    let stats = handle.stats();
    println!(
        "Stats: captured={} dropped={} forwarded={} bytes uptime={}s",
        stats.frames_captured,
        stats.frames_dropped,
        stats.bytes_forwarded,
        stats.uptime.as_secs(),
    );

    match failure {
        Some(failure) => {
            eprintln!("Stopped after failure: {}", failure);
            ExitCode::FAILURE
        }
        None => ExitCode::SUCCESS,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return ExitCode::SUCCESS;
    }

    let options = match parse_args(&args) {
        Ok(options) => options,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!();
            print_usage();
            return ExitCode::FAILURE;
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("camstream=info,camera_server=info")),
        )
        .init();

    if options.test_pattern {
        run(options.config, TestPattern::new()).await
    } else {
        run(options.config, CommandCapture::new()).await
    }
}
