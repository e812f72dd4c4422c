//! TUI application state and event loop.
//!
//! The engine runs on its own thread and owns the connection; the App only
//! reads [`DashboardFrame`]s from the handle and sends it commands, so a slow
//! terminal never delays a merge.

use std::io;
use std::time::Duration;

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::prelude::*;

use hostwatch_core::{DashboardFrame, EngineConfig, EngineHandle, ProcessSort, process_count};

/// Poll interval for key events; also the redraw cadence.
const INPUT_POLL: Duration = Duration::from_millis(100);

pub struct App {
    handle: EngineHandle,
    endpoint: String,
    refresh_ms: u64,
    running: bool,
    sort: ProcessSort,
    scroll: usize,
}

impl App {
    pub fn new(handle: EngineHandle, config: &EngineConfig) -> Self {
        Self {
            handle,
            endpoint: config.endpoint.clone(),
            refresh_ms: config.refresh_interval_ms,
            running: true,
            sort: ProcessSort::default(),
            scroll: 0,
        }
    }

    pub fn run(&mut self) -> io::Result<()> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        // Install panic hook that restores terminal before printing the panic.
        let original_hook = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let _ = disable_raw_mode();
            let _ = execute!(io::stdout(), LeaveAlternateScreen, crossterm::cursor::Show);
            original_hook(info);
        }));

        let result = self.run_loop(&mut terminal);

        // Always restore terminal, even if the loop returned an error.
        let _ = std::panic::take_hook();
        disable_raw_mode()?;
        execute!(
            terminal.backend_mut(),
            LeaveAlternateScreen,
            crossterm::cursor::Show
        )?;

        result
    }

    fn run_loop(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    ) -> io::Result<()> {
        while self.running {
            let frame = self.handle.frame();
            terminal.draw(|f| super::ui::draw(f, self, &frame))?;

            if event::poll(INPUT_POLL)? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        self.handle_key(key.code);
                    }
                }
            }
        }

        Ok(())
    }

    fn handle_key(&mut self, key: KeyCode) {
        match key {
            KeyCode::Char('q') | KeyCode::Esc => self.running = false,
            KeyCode::Char('p') | KeyCode::Enter => {
                self.handle.toggle_process_detail();
                self.scroll = 0;
            }
            KeyCode::Char('s') => {
                self.sort = self.sort.next();
                self.scroll = 0;
            }
            KeyCode::Char('r') => {
                self.handle.connect();
            }
            KeyCode::Char('d') => {
                self.handle.disconnect();
            }
            KeyCode::Up | KeyCode::Char('k') => self.scroll = self.scroll.saturating_sub(1),
            KeyCode::Down | KeyCode::Char('j') => {
                self.scroll = self.scroll.saturating_add(1).min(self.last_process_row());
            }
            _ => {}
        }
    }

    fn last_process_row(&self) -> usize {
        self.handle
            .store()
            .read(process_count)
            .saturating_sub(1)
    }

    // -- Accessors for UI --

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn refresh_ms(&self) -> u64 {
        self.refresh_ms
    }

    pub fn sort(&self) -> ProcessSort {
        self.sort
    }

    /// First process row to show, clamped to the list length.
    pub fn scroll_for(&self, frame: &DashboardFrame) -> usize {
        self.scroll.min(frame.process_count.saturating_sub(1))
    }
}
