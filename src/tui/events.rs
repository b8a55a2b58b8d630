use crate::download::media::MediaInfo;
use crate::ui::dialog::Dialog;
use crossterm::event::Event as CrosstermEvent;

/// TUI events that can occur
#[derive(Debug, Clone)]
pub enum TuiEvent {
    /// Terminal input event (keyboard, mouse, resize)
    Input(CrosstermEvent),
    /// Tick event for periodic updates
    Tick,
    /// Background analyze finished; failures arrive as the dialog to show
    Analyzed(Result<Vec<MediaInfo>, Dialog>),
}
