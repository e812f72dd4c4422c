use std::time::Duration;

use hostwatch_core::EngineConfig;

pub fn run(config: EngineConfig, timeout_secs: f64) {
    let wait = Duration::try_from_secs_f64(timeout_secs.max(0.0)).unwrap_or(Duration::MAX);
    let (engine, handle) = super::engine_or_exit(&config);
    let rt = super::runtime_or_exit();

    let frame = rt.block_on(async move {
        let task = tokio::spawn(engine.run());
        let mut updates = handle.subscribe();
        let received = tokio::time::timeout(wait, updates.changed()).await;
        let frame = handle.frame();
        handle.shutdown();
        let _ = task.await;
        match received {
            Ok(Ok(())) => Some(frame),
            _ => None,
        }
    });

    let Some(frame) = frame else {
        eprintln!(
            "error: no update from {} within {:.1}s",
            config.endpoint,
            wait.as_secs_f64()
        );
        std::process::exit(1);
    };

    match serde_json::to_string_pretty(&frame) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("error: cannot encode snapshot: {e}");
            std::process::exit(1);
        }
    }
}
