use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use mock_dhcpv6::config::Config;
use signal_hook::consts::{SIGHUP, SIGINT, SIGTERM};
use signal_hook::iterator::Signals;
use tracing::{error, info};

/// Spawn a thread that reloads the config file on SIGHUP and requests a
/// graceful shutdown on SIGINT/SIGTERM.
pub fn spawn_signal_handler(
    config: Arc<ArcSwap<Config>>,
    config_path: Option<PathBuf>,
    shutdown: Arc<AtomicBool>,
) -> std::io::Result<std::thread::JoinHandle<()>> {
    let mut signals = Signals::new([SIGHUP, SIGINT, SIGTERM])?;

    std::thread::Builder::new()
        .name("signals".to_string())
        .spawn(move || {
            for sig in signals.forever() {
                match sig {
                    SIGHUP => match &config_path {
                        Some(path) => {
                            info!("received SIGHUP, reloading config");
                            match Config::load(path) {
                                Ok(new_config) => config.store(Arc::new(new_config)),
                                Err(e) => error!(%e, "failed to reload config, keeping current"),
                            }
                        }
                        None => info!("received SIGHUP, no config file to reload"),
                    },
                    _ => {
                        info!(signal = sig, "server shutting down");
                        shutdown.store(true, Ordering::Relaxed);
                        break;
                    }
                }
            }
        })
}
