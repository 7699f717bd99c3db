//! pointerd - Remote-controlled on-screen cursor
//!
//! Draws a cursor marker on the local display, moves it by relative deltas
//! sent from a remote controller and taps at its position on request.

mod bridge;
mod config;
mod cursor;
mod network;
mod platform;
mod protocol;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use bridge::{CommandBridge, CursorService, ServiceOptions};
use config::{Config, GestureBackend, OverlayBackend};
use cursor::CursorEvent;
use network::{BridgeServer, ControllerClient, NetworkConfig, ServerEvent};
use platform::ScreenMetrics;
use protocol::{MethodCall, MethodResponse};

/// pointerd - Remote-controlled on-screen cursor
#[derive(Parser)]
#[command(name = "pointerd")]
#[command(author = "pointerd Contributors")]
#[command(version = "0.1.0")]
#[command(about = "Drive an on-screen cursor from a remote controller", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the cursor service and accept controllers
    Serve {
        /// Port to listen on (overrides the config file)
        #[arg(short, long)]
        port: Option<u16>,

        /// Gesture injector to use (overrides the config file)
        #[arg(short, long, value_enum)]
        backend: Option<GestureBackend>,

        /// Overlay surface to draw the cursor with (overrides the config file)
        #[arg(long, value_enum)]
        overlay: Option<OverlayBackend>,
    },

    /// Send one command to a running server
    Send {
        /// Server address (host or host:port)
        #[arg(short, long, default_value = "127.0.0.1")]
        server: String,

        /// Server port
        #[arg(short, long, default_value_t = protocol::DEFAULT_PORT)]
        port: u16,

        #[command(subcommand)]
        action: SendAction,
    },

    /// Show current configuration
    Config {
        /// Generate sample configuration
        #[arg(long)]
        generate: bool,

        /// Output path for generated config
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show system information
    Info,
}

#[derive(Subcommand, Debug, PartialEq)]
enum SendAction {
    /// Move the cursor by a relative amount
    Move {
        #[arg(allow_negative_numbers = true)]
        delta_x: i32,
        #[arg(allow_negative_numbers = true)]
        delta_y: i32,
    },
    /// Tap at the cursor position
    Click,
    /// Open the accessibility settings
    Settings,
    /// Call an arbitrary method with no arguments
    Raw { method: String },
}

impl SendAction {
    fn to_call(&self) -> MethodCall {
        match self {
            SendAction::Move { delta_x, delta_y } => MethodCall::move_cursor(*delta_x, *delta_y),
            SendAction::Click => MethodCall::perform_click(),
            SendAction::Settings => MethodCall::open_accessibility_settings(),
            SendAction::Raw { method } => MethodCall::new(method.as_str()),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = if let Some(config_path) = &cli.config {
        Config::load(config_path)?
    } else {
        Config::load_default().unwrap_or_default()
    };

    // Initialize logging
    let filter = if cli.verbose || config.general.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    match cli.command {
        Commands::Serve {
            port,
            backend,
            overlay,
        } => {
            let mut config = config;
            if let Some(port) = port {
                config.bridge.port = port;
            }
            if let Some(backend) = backend {
                config.gesture.backend = backend;
            }
            if let Some(overlay) = overlay {
                config.overlay.backend = overlay;
            }
            run_serve(config).await?;
        }
        Commands::Send {
            server,
            port,
            action,
        } => {
            run_send(&config, &server, port, &action).await?;
        }
        Commands::Config { generate, output } => {
            if generate {
                let sample = config::generate_sample_config()?;
                if let Some(path) = output {
                    std::fs::write(&path, &sample)?;
                    println!("Configuration written to: {}", path.display());
                } else {
                    println!("{}", sample);
                }
            } else {
                println!("{}", toml::to_string_pretty(&config)?);
            }
        }
        Commands::Info => {
            print_system_info(&config);
        }
    }

    Ok(())
}

/// Run the cursor service behind the bridge server
async fn run_serve(config: Config) -> anyhow::Result<()> {
    let platform = platform::build_platform(&config)?;
    let bounds = platform.screen.screen_bounds();
    let options = ServiceOptions::from_config(&config)?;

    let mut service = CursorService::new(platform, options);
    let mut cursor_events = service
        .take_event_receiver()
        .ok_or_else(|| anyhow::anyhow!("cursor event receiver already taken"))?;
    service.start()?;

    let bridge = CommandBridge::for_service(&service)?;
    let mut server = BridgeServer::new(NetworkConfig::from(&config.bridge), bridge);
    let mut server_events = server
        .take_event_receiver()
        .ok_or_else(|| anyhow::anyhow!("server event receiver already taken"))?;
    let local_addr = server.start().await?;

    tracing::info!(
        "Device '{}' ({}) ready on {}",
        config.general.name,
        config.device_id(),
        local_addr
    );

    println!("\n========================================");
    println!("  pointerd Running");
    println!("========================================");
    println!("  Device: {}", config.general.name);
    println!("  Service: {}", service.id());
    println!("  Listening: {}", local_addr);
    println!("  Screen: {}", bounds);
    println!("  Overlay: {:?}", config.overlay.backend);
    println!("  Gestures: {:?}", config.gesture.backend);
    println!("========================================");
    println!("\nWaiting for controllers to connect...");
    println!("Press Ctrl+C to stop.\n");

    loop {
        tokio::select! {
            Some(event) = server_events.recv() => {
                match event {
                    ServerEvent::ClientConnected { addr } => {
                        let connected = server.clients().await.len();
                        println!("+ Controller connected: {} ({} connected)", addr, connected);
                    }
                    ServerEvent::ClientDisconnected { addr, reason } => {
                        println!("- Controller disconnected: {} ({})", addr, reason);
                    }
                    ServerEvent::CallHandled { addr, method, response } => {
                        if !response.is_success() {
                            tracing::info!("Call {:?} from {} answered with {:?}", method, addr, response);
                        }
                    }
                    _ => {}
                }
            }
            Some(event) = cursor_events.recv() => {
                match event {
                    CursorEvent::OverlayUnavailable { reason } => {
                        tracing::warn!("Cursor overlay unavailable: {}", reason);
                    }
                    CursorEvent::GestureFailed { position, reason } => {
                        tracing::warn!("Tap at {} failed: {}", position, reason);
                    }
                    CursorEvent::GestureBusy { position } => {
                        tracing::info!("Tap at {} ignored, previous tap still running", position);
                    }
                    other => {
                        tracing::trace!("Cursor event: {:?}", other);
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!("\nShutting down...");
                break;
            }
        }
    }

    server.stop().await?;
    service.stop().await?;
    tracing::info!("pointerd stopped");

    Ok(())
}

/// Send a single command and print the response
async fn run_send(config: &Config, server: &str, port: u16, action: &SendAction) -> anyhow::Result<()> {
    let timeout = Duration::from_millis(config.bridge.connect_timeout_ms);

    let mut client = if let Ok(addr) = server.parse::<SocketAddr>() {
        ControllerClient::connect(addr, timeout).await?
    } else {
        let net_config = NetworkConfig {
            port,
            ..NetworkConfig::from(&config.bridge)
        };
        ControllerClient::connect_hostname(server, &net_config).await?
    };

    let call = action.to_call();
    tracing::debug!("Sending {:?} to {}", call, client.server_addr());

    let response = client.call(&call).await?;
    client.close().await?;

    match response {
        MethodResponse::Success => println!("ok"),
        MethodResponse::NotImplemented { method } => {
            anyhow::bail!("server does not implement '{}'", method)
        }
        MethodResponse::Error { message } => anyhow::bail!("server error: {}", message),
    }

    Ok(())
}

/// Print system information
fn print_system_info(config: &Config) {
    let fallback = platform::FixedScreen::default();

    println!("pointerd System Information");
    println!("===========================\n");

    println!("Platform: {}", platform::platform_name());
    println!("Device: {} ({})", config.general.name, config.device_id());
    match config.screen.fixed_size() {
        Some((width, height)) => println!("Screen: {}x{} (configured)", width, height),
        None => println!("Screen: {} (fallback)", fallback.screen_bounds()),
    }
    println!("Overlay backend: {:?}", config.overlay.backend);
    println!("Gesture backend: {:?}", config.gesture.backend);
    println!("Settings command: {}", config.settings.command.join(" "));

    #[cfg(target_os = "linux")]
    {
        println!("\nLinux Requirements:");
        println!("  - framebuffer overlay needs write access to /dev/fb0 ('video' group)");
        println!("  - uinput backend needs write access to /dev/uinput");
        println!("  - uinput module must be loaded: sudo modprobe uinput");
    }

    println!("\nProtocol Version: {}", protocol::PROTOCOL_VERSION);
    println!("Default Port: {}", protocol::DEFAULT_PORT);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::try_parse_from(["pointerd", "info"]);
        assert!(cli.is_ok());
    }

    #[test]
    fn test_send_move_accepts_negative_deltas() {
        let cli = Cli::try_parse_from(["pointerd", "send", "move", "-20", "15"]).unwrap();
        match cli.command {
            Commands::Send { action, port, .. } => {
                assert_eq!(
                    action,
                    SendAction::Move {
                        delta_x: -20,
                        delta_y: 15
                    }
                );
                assert_eq!(port, protocol::DEFAULT_PORT);
                assert_eq!(action.to_call(), MethodCall::move_cursor(-20, 15));
            }
            _ => panic!("expected send"),
        }
    }

    #[test]
    fn test_serve_overrides() {
        let cli = Cli::try_parse_from([
            "pointerd",
            "serve",
            "--port",
            "9000",
            "--backend",
            "uinput",
            "--overlay",
            "framebuffer",
        ])
        .unwrap();
        match cli.command {
            Commands::Serve {
                port,
                backend,
                overlay,
            } => {
                assert_eq!(port, Some(9000));
                assert_eq!(backend, Some(GestureBackend::Uinput));
                assert_eq!(overlay, Some(OverlayBackend::Framebuffer));
            }
            _ => panic!("expected serve"),
        }
    }

    #[test]
    fn test_raw_call() {
        let action = SendAction::Raw {
            method: "foo".to_string(),
        };
        assert_eq!(action.to_call(), MethodCall::new("foo"));
    }
}
