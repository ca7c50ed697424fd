//! Process-wide debug switch.
//!
//! Library code always emits `tracing` events; this module only decides
//! whether they are printed to stderr when no other subscriber is installed.

use std::sync::Once;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing_subscriber::filter::dynamic_filter_fn;
use tracing_subscriber::prelude::*;

static DEBUG: AtomicBool = AtomicBool::new(false);
static INSTALL: Once = Once::new();

/// Enables or disables debug output on stderr for the whole process.
pub fn set_debug(enabled: bool) {
    DEBUG.store(enabled, Ordering::Relaxed);
    if enabled {
        INSTALL.call_once(install_stderr_subscriber);
    }
}

pub fn debug_enabled() -> bool {
    DEBUG.load(Ordering::Relaxed)
}

fn install_stderr_subscriber() {
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(dynamic_filter_fn(|meta, _cx| {
            debug_enabled() && meta.target().starts_with(env!("CARGO_CRATE_NAME"))
        }));
    // Re-evaluated on every event so the switch can be flipped later.
    // Another subscriber may already be installed by the application.
    let _ = tracing_subscriber::registry().with(layer).try_init();
}
