//! coreos-deploy - Entry Point
//!
//! Deploys docker-backed fleet services into a CoreOS cluster by rotating
//! between an A and a B generation of units.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use coreos_deploy::app::options::AppOptions;
use coreos_deploy::app::run::run;
use coreos_deploy::command::ProcessRunner;
use coreos_deploy::filesys::file::File;
use coreos_deploy::logs::{init_logging, LogOptions};
use coreos_deploy::storage::settings::Settings;
use coreos_deploy::utils::version_info;

use tracing::{error, info};

const USAGE: &str = "\
Usage: coreos-deploy [options]

Server options:
    --config=<path>                  JSON settings file
    --name=<name>                    Name of the server (default: none)
    --hostname=<host>                Hostname or address to bind to (default: localhost)
    --domain=<domain>                Domain of the site being managed
    --environment=<env>              Environment of the server (default: development)
    --port=<port>                    Port to listen on (default: 8080)
    --etcd2_endpoint=<url>           etcd2 endpoint, empty for in-memory (default: http://0.0.0.0:2379)
    --fleetctl=<path>                fleetctl binary (default: /usr/local/bin/coreos-deploy/fleetctl)
    --tmp_dir=<dir>                  Work directory for unit templates (default: /tmp/coreos-deploy/)
    --deploy_log_dir=<dir>           Deploy log directory, empty for in-memory
    --auth_token=<token>             Accepted API bearer token, may be repeated in the config
    --max_shutdown_delay_secs=<n>    Upper bound on stopping the HTTP server (default: 600)

Logging options:
    --log_level=<level>              trace, debug, info, warn or error (default: info)
    --json_logs=<bool>               Emit logs as JSON (default: false)
    --debug=<bool>                   Enable debugging output (default: false)

Common options:
    --help                           Show this message
    --version                        Show version
";

#[tokio::main]
async fn main() {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    let mut cli_args: HashMap<String, String> = HashMap::new();

    for arg in args.iter().skip(1) {
        if let Some((key, value)) = arg.split_once('=') {
            // Handle --key=value format
            let clean_key = key.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), value.to_string());
        } else {
            // Handle standalone flags like --version, or bare `version` / `help`
            let clean_key = arg.trim_start_matches('-').to_lowercase();
            cli_args.insert(clean_key, "true".to_string());
        }
    }

    // Print version and exit
    let version = version_info();
    if cli_args.contains_key("version") {
        match serde_json::to_string_pretty(&version) {
            Ok(text) => println!("{}", text),
            Err(_) => println!("{}", version.version),
        }
        return;
    }

    // Print usage and exit
    if cli_args.contains_key("help") {
        print!("{}", USAGE);
        return;
    }

    // Retrieve the settings file, if any
    let mut settings = match cli_args.get("config") {
        Some(path) => match File::new(PathBuf::from(path)).read_json::<Settings>().await {
            Ok(settings) => settings,
            Err(e) => {
                eprintln!("Unable to read settings file {}: {}", path, e);
                std::process::exit(1);
            }
        },
        None => Settings::default(),
    };
    if let Err(e) = settings.apply_overrides(&cli_args) {
        eprintln!("{}\n\n{}", e, USAGE);
        std::process::exit(1);
    }

    // Initialize logging
    let log_options = LogOptions {
        log_level: settings.effective_log_level(),
        json_format: settings.json_logs,
    };
    if let Err(e) = init_logging(log_options) {
        println!("Failed to initialize logging: {e}");
    }

    // Run the server
    let options = AppOptions::from_settings(&settings);
    info!("Running coreos-deploy with options: {:?}", options);

    let runner = Arc::new(ProcessRunner);
    let result = run(version.version, options, runner, await_shutdown_signal()).await;
    if let Err(e) = result {
        error!("Failed to run the server: {e}");
        std::process::exit(1);
    }
}

async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let (mut sigterm, mut sigint) =
            match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
                _ => {
                    error!("Unable to install signal handlers, waiting for Ctrl+C only");
                    let _ = tokio::signal::ctrl_c().await;
                    return;
                }
            };

        tokio::select! {
            _ = sigterm.recv() => {
                info!("SIGTERM received, shutting down...");
            }
            _ = sigint.recv() => {
                info!("SIGINT received, shutting down...");
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl+C received, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        info!("Ctrl+C received, shutting down...");
    }
}
