//! Logging setup for hosts embedding the storage

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install a fmt subscriber for the storage's tracing events.
///
/// `RUST_LOG` wins when set; otherwise `swarm_storage=debug` when verbose
/// (every statement is logged) and `swarm_storage=info` when not. Returns
/// false if a global subscriber was already installed.
pub fn init_tracing(verbose: bool) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("swarm_storage=debug")
        } else {
            EnvFilter::new("swarm_storage=info")
        }
    });

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_harmless() {
        init_tracing(true);
        assert!(!init_tracing(false));
    }
}
