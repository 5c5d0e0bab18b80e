use std::env;
use tracing::Level;
use tracing_subscriber::{
    filter::Targets,
    fmt,
    layer::{Layered, SubscriberExt},
    util::SubscriberInitExt,
    Registry,
};

const TARGETS: [&str; 2] = ["nvram", "vcs_nvram_core"];

fn default_level(verbose: u8) -> Level {
    match verbose {
        0 if cfg!(debug_assertions) => Level::DEBUG,
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

fn create_registry(verbose: u8) -> Layered<Targets, Registry> {
    let level = default_level(verbose);
    let default_filter = Targets::new().with_targets(TARGETS.map(|target| (target, level)));
    let filter = match env::var("RUST_LOG") {
        Ok(filter) => filter.parse::<Targets>().unwrap_or(default_filter),
        Err(_) => default_filter,
    };

    tracing_subscriber::registry().with(filter)
}

/// Initialize logging to stderr. Each `-v` raises the default level, `RUST_LOG` overrides it.
pub fn init(verbose: u8) {
    let registry = create_registry(verbose).with(
        fmt::layer()
            .compact()
            .with_line_number(true)
            .with_writer(std::io::stderr),
    );

    if let Err(err) = registry.try_init() {
        eprintln!("setting tracing default failed: {err:?}");
    }
}
