//! Basic engine example.
//!
//! Connects to a metrics server, waits for a handful of updates and prints
//! the derived gauges after each one.
//!
//! Run: `cargo run --example basic -- http://127.0.0.1:5000`

use std::time::Duration;

use hostwatch_core::{Engine, EngineConfig, format_bytes};

#[tokio::main]
async fn main() {
    let endpoint = std::env::args()
        .nth(1)
        .unwrap_or_else(|| hostwatch_core::config::DEFAULT_ENDPOINT.to_string());
    let config = EngineConfig {
        endpoint,
        ..EngineConfig::default()
    };

    let (engine, handle) = match Engine::new(&config) {
        Ok(pair) => pair,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    };
    let task = tokio::spawn(engine.run());

    let mut updates = handle.subscribe();
    for _ in 0..5 {
        if tokio::time::timeout(Duration::from_secs(10), updates.changed())
            .await
            .is_err()
        {
            println!("no update within 10s (status: {})", handle.status());
            break;
        }
        let frame = handle.frame();
        println!("revision {} ({})", frame.revision, frame.status);
        for gauge in &frame.gauges {
            println!(
                "  {:<10} {:>7.1}  needle {:>6.1}°",
                gauge.label, gauge.value, gauge.state.angle_degrees
            );
        }
        if let Some(used) = frame.snapshot.memory.as_ref().and_then(|m| m.used) {
            println!("  memory used {}", format_bytes(used));
        }
    }

    handle.shutdown();
    let _ = task.await;
}
