//! Puts the host in the blackhole state before the tunnel comes up.
//!
//! Reads `GATEWAY_IP`, `GATEWAY_PORT` and `OIFName` (default `eth0`) from the environment, must
//! be run as root.

use std::error::Error;
use std::process;

use killswitch::{bring_up, BlackholePolicy, Firewall, FirewallConfig, RouteManager};

fn run() -> Result<(), Box<dyn Error>> {
    bring_up(
        |name| std::env::var(name).ok(),
        RouteManager::new,
        &BlackholePolicy::default(),
        || Firewall::new(FirewallConfig::default()),
    )?;
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run() {
        let mut message = e.to_string();
        let mut source = e.source();
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        log::error!("{}", message);
        process::exit(1);
    }
}
