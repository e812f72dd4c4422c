//! Local presentation toggles. Never touched by remote updates.

use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UiState {
    show_process_detail: bool,
}

impl UiState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn show_process_detail(&self) -> bool {
        self.show_process_detail
    }

    /// Flip the process detail panel; returns the new value.
    pub fn toggle_process_detail(&mut self) -> bool {
        self.show_process_detail = !self.show_process_detail;
        self.show_process_detail
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_hidden() {
        assert!(!UiState::new().show_process_detail());
    }

    #[test]
    fn toggle_flips_and_round_trips() {
        let mut ui = UiState::new();
        assert!(ui.toggle_process_detail());
        assert!(ui.show_process_detail());
        assert!(!ui.toggle_process_detail());
        assert_eq!(ui, UiState::default());
    }
}
