//! Tracing initialization: `tracing_subscriber::fmt` to stderr with an
//! env-configurable filter.

pub fn init() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init()
        .ok();
}
