//! Echo Host - runs the default handler over stdio.
//!
//! This example demonstrates:
//! - Building a host with options loaded from the environment
//! - Driving it on a current-thread runtime inside a `LocalSet`
//! - Mapping the exit notification to the process exit code
//!
//! # Running
//!
//! ```sh
//! printf 'hello\nbfoo\ncompleteCallback\nexit\n' | cargo run --example echo_host
//! ```
//!
//! Options are read as JSON from `KERNEL_HOST_OPTIONS`, e.g.
//! `{"debug": true, "noStack": true}`. Logs go to stderr, filtered by
//! `RUST_LOG`.

use kernel_host::{HostConfig, KernelHost};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config = match std::env::var("KERNEL_HOST_OPTIONS") {
        Ok(json) => HostConfig::from_json(&json)?,
        Err(_) => HostConfig::default(),
    };

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let local = tokio::task::LocalSet::new();

    let outcome = local.block_on(&runtime, async move {
        let host = KernelHost::builder().config(config).build_stdio()?;
        host.run();
        host.wait_for_exit().await
    });

    match outcome {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            tracing::error!(error = %e, "Host failed");
            std::process::exit(1);
        }
    }
}
