use std::thread;

use hostwatch_core::EngineConfig;

pub fn run(config: EngineConfig) {
    let (engine, handle) = super::engine_or_exit(&config);
    let rt = super::runtime_or_exit();

    // Engine on its own thread; the TUI keeps the main thread.
    let engine_thread = thread::spawn(move || rt.block_on(engine.run()));

    let mut app = crate::tui::app::App::new(handle.clone(), &config);
    let result = app.run();

    handle.shutdown();
    if engine_thread.join().is_err() {
        log::error!("engine thread panicked");
    }

    if let Err(e) = result {
        eprintln!("TUI error: {e}");
        std::process::exit(1);
    }
}
