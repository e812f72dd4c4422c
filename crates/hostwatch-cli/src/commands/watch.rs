use hostwatch_core::{ConnectionStatus, DashboardFrame, EngineConfig, EngineHandle, GaugeMetric};

pub fn run(config: EngineConfig, json: bool) {
    let (engine, handle) = super::engine_or_exit(&config);
    let rt = super::runtime_or_exit();

    eprintln!("watching {} (ctrl-c to stop)", config.endpoint);

    rt.block_on(async move {
        let task = tokio::spawn(engine.run());
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::warn!("cannot listen for ctrl-c: {e}");
                std::future::pending::<()>().await;
            }
        };
        watch_until(&handle, json, ctrl_c, |line| println!("{line}")).await;

        handle.shutdown();
        let _ = task.await;
    });
}

/// Emit one line per merge until `stop` resolves or the engine goes away.
/// Status transitions go to stderr.
async fn watch_until(
    handle: &EngineHandle,
    json: bool,
    stop: impl Future<Output = ()>,
    mut emit: impl FnMut(String),
) {
    let mut updates = handle.subscribe();
    let mut status = handle.watch_status();
    let mut last_status = ConnectionStatus::Disconnected;
    // Polled across iterations so a signal during a branch body is not lost.
    tokio::pin!(stop);

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let frame = handle.frame();
                if json {
                    match serde_json::to_string(&frame) {
                        Ok(line) => emit(line),
                        Err(e) => log::warn!("cannot encode frame: {e}"),
                    }
                } else {
                    emit(summary_line(&frame));
                }
            }
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let now = *status.borrow_and_update();
                if now != last_status {
                    eprintln!("status: {now}");
                    last_status = now;
                }
            }
            _ = &mut stop => break,
        }
    }
}

/// One human-readable line per update.
pub fn summary_line(frame: &DashboardFrame) -> String {
    let mut parts = vec![format!("#{:<5}", frame.revision)];
    for gauge in &frame.gauges {
        let value = if !gauge.available {
            "-".to_string()
        } else if gauge.metric == GaugeMetric::Processes {
            format!("{}", gauge.value as u64)
        } else {
            format!("{:.1}%", gauge.value)
        };
        parts.push(format!("{} {value}", gauge.label.to_lowercase()));
    }
    parts.join("  ")
}
