use tracing_subscriber::EnvFilter;

/// Install the global `fmt` subscriber. `RUST_LOG` directives are applied on
/// top of the crate default of `info`.
pub fn init_tracing() {
    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = "dte_outage_exporter=info".parse() {
        filter = filter.add_directive(directive);
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
