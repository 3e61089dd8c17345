use spider_server::ServerBuilder;
use spider_server::config::loader::{DEFAULT_CONFIG_PATH, load_config};
use spider_server::observability::{apply_logging_level, init_tracing};

const CONFIG_ENV: &str = "SPIDER_CONFIG";

#[tokio::main]
async fn main() {
    match dotenvy::dotenv() {
        Ok(_) => {}
        Err(e) if e.not_found() => {}
        Err(e) => eprintln!("Warning: failed to load .env file: {e}"),
    }

    init_tracing();

    let (path, source) = config_path(std::env::args().skip(1));
    let cfg = match load_config(Some(&path)) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error ({path}): {e}");
            std::process::exit(2);
        }
    };
    tracing::info!(path = %path, source, "Configuration loaded");
    apply_logging_level(&cfg.logging);

    let server = match ServerBuilder::new().with_config(cfg).build().await {
        Ok(server) => server,
        Err(e) => {
            eprintln!("Server initialization failed: {e:#}");
            std::process::exit(2);
        }
    };

    if let Err(e) = server.run().await {
        eprintln!("Server error: {e:#}");
        std::process::exit(1);
    }
}

/// `--config <path>`, then `SPIDER_CONFIG`, then `spider.toml`.
fn config_path(mut args: impl Iterator<Item = String>) -> (String, &'static str) {
    while let Some(arg) = args.next() {
        if arg == "--config" {
            if let Some(path) = args.next() {
                return (path, "--config");
            }
        }
    }
    match std::env::var(CONFIG_ENV) {
        Ok(path) if !path.is_empty() => (path, CONFIG_ENV),
        _ => (DEFAULT_CONFIG_PATH.to_string(), "default"),
    }
}
