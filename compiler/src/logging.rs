//! Logging configuration for the Kestrel compiler
//!
//! Thin helpers around the `log` facade and `env_logger`, initialized at
//! most once per process.
//!
//! # Log Levels
//!
//! - `error!` - actual failures that should always be shown
//! - `warn!`  - suspicious situations that may indicate problems
//! - `info!`  - high-level progress (pipeline phases)
//! - `debug!` - per-function detail (lowering, pass results)
//! - `trace!` - per-instruction detail (emitted MIR, analysis events)
//!
//! # Environment Variable
//!
//! `RUST_LOG` controls output at runtime, including per-module filters:
//!
//! ```bash
//! RUST_LOG=debug kestrelc build main.ks
//! RUST_LOG=compiler::ir::hir_to_mir=trace kestrelc build main.ks
//! ```

use env_logger::Builder;
use log::LevelFilter;
use std::io::Write;
use std::sync::Once;

static INIT: Once = Once::new();

/// Initialize logging with sensible defaults (Warn level).
///
/// This only initializes once; subsequent calls are no-ops.
pub fn init() {
    init_with_level(LevelFilter::Warn);
}

/// Initialize logging with a specific level.
///
/// This only initializes once; subsequent calls are no-ops.
pub fn init_with_level(level: LevelFilter) {
    INIT.call_once(|| {
        Builder::new()
            .filter_level(level)
            .format(|buf, record| {
                writeln!(
                    buf,
                    "[{:5}] {}:{} - {}",
                    record.level(),
                    record.file().unwrap_or("unknown"),
                    record.line().unwrap_or(0),
                    record.args()
                )
            })
            .init();
    });
}

/// Initialize logging from the RUST_LOG environment variable, defaulting
/// to Warn when unset. Only initializes once.
pub fn init_from_env() {
    INIT.call_once(|| {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    });
}

/// Initialize logging for tests. Safe to call from every test; the first
/// caller wins and later calls are no-ops.
pub fn init_test() {
    let _ = env_logger::builder()
        .filter_level(LevelFilter::Warn)
        .is_test(true)
        .try_init();
}

/// Whether [`init`] or one of its siblings has run.
pub fn is_initialized() -> bool {
    INIT.is_completed()
}
