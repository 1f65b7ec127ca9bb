use env_logger::{Builder, Env};
use log::LevelFilter;

/// Install the stderr logger. `RUST_LOG` wins; otherwise the level is `info`,
/// or `debug` when asked for.
pub fn init(debug: bool) {
    let mut builder = Builder::from_env(Env::default().default_filter_or("debug"));
    builder.format_timestamp_millis();
    if builder.try_init().is_ok() && !rust_log_set() && !debug {
        log::set_max_level(LevelFilter::Info);
    }
}

/// Raise the level to `debug` after startup, e.g. when a profile asks for it.
pub fn enable_debug() {
    if !rust_log_set() {
        log::set_max_level(LevelFilter::Debug);
    }
}

fn rust_log_set() -> bool {
    std::env::var_os("RUST_LOG").is_some()
}
