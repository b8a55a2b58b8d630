use super::events::TuiEvent;
use super::state::{FocusPane, InputKind, TuiState, UiMode};
use crate::app::state::AppState;
use crate::download::Controller;
use crate::download::intake;
use crate::gateway::TaskGateway;
use anyhow::Result;
use crossterm::ExecutableCommand;
use crossterm::event::{DisableBracketedPaste, EnableBracketedPaste};
use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use futures_util::StreamExt;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Main TUI application
pub struct TuiApp<G: ?Sized> {
    pub state: TuiState,
    pub controller: Controller<G>,
    pub should_quit: bool,
    events: mpsc::Sender<TuiEvent>,
    analyze_timeout: Duration,
    default_format: String,
}

impl<G: TaskGateway + ?Sized + 'static> TuiApp<G> {
    pub fn new(
        state: TuiState,
        controller: Controller<G>,
        events: mpsc::Sender<TuiEvent>,
        analyze_timeout: Duration,
        default_format: String,
    ) -> Self {
        Self {
            state,
            controller,
            should_quit: false,
            events,
            analyze_timeout,
            default_format,
        }
    }

    /// Handle a TUI event
    pub async fn handle_event(&mut self, event: TuiEvent) -> Result<()> {
        match event {
            TuiEvent::Tick => {
                self.refresh().await;
            }
            TuiEvent::Input(input) => {
                self.handle_input(input).await?;
                // Force update after user input for immediate feedback
                self.refresh().await;
            }
            TuiEvent::Analyzed(result) => {
                self.state.analyzing = None;
                match result {
                    Ok(items) => {
                        let args = fluent::fluent_args!["count" => items.len()];
                        self.state.notice =
                            Some(self.state.t_with_args("tui-analyzed", Some(&args)));
                        let requests = self.state.set_results(&items);
                        let mut ctx = self.controller.context().lock().await;
                        ctx.buttons.clear_idle();
                        for request in requests {
                            ctx.buttons.register(request);
                        }
                    }
                    Err(dialog) => {
                        self.state.notice = None;
                        self.controller.context().lock().await.notify(dialog);
                    }
                }
                self.refresh().await;
            }
        }
        Ok(())
    }

    async fn refresh(&mut self) {
        let ctx = self.controller.context().lock().await;
        self.state.sync(&ctx);
        drop(ctx);
        self.state.mark_dirty();
    }

    async fn handle_input(&mut self, event: Event) -> Result<()> {
        match event {
            Event::Key(KeyEvent {
                code,
                modifiers,
                kind,
                ..
            }) => {
                // Only process key press events, ignore release and repeat
                if kind != KeyEventKind::Press {
                    return Ok(());
                }

                match self.state.ui_mode {
                    UiMode::Normal => self.handle_normal_mode(code, modifiers).await,
                    UiMode::Input(kind) => self.handle_input_mode(kind, code, modifiers),
                    UiMode::Help => self.state.ui_mode = UiMode::Normal,
                }
            }
            Event::Paste(text) => match self.state.ui_mode {
                UiMode::Input(_) => self.state.push_input(&text),
                _ => {
                    // Pasting on the main screen opens the analyze input with the text
                    if crate::util::url_list::has_urls(&text) {
                        self.state.input_buffer.clear();
                        self.state.push_input(&text);
                        self.state.ui_mode = UiMode::Input(InputKind::Analyze);
                    }
                }
            },
            Event::Resize(width, height) => {
                tracing::debug!("Terminal resized to {}x{}", width, height);
            }
            _ => {}
        }
        Ok(())
    }

    async fn handle_normal_mode(&mut self, code: KeyCode, modifiers: KeyModifiers) {
        match code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => {
                self.should_quit = true
            }
            KeyCode::Esc => {
                self.controller.context().lock().await.pop_dialog();
            }
            KeyCode::Char('?') => self.state.ui_mode = UiMode::Help,
            KeyCode::Char('a') => self.open_input(InputKind::Analyze),
            KeyCode::Char('b') => self.open_input(InputKind::Batch),
            KeyCode::Tab => self.state.toggle_focus(),
            KeyCode::Down | KeyCode::Char('j') => self.state.select_next(),
            KeyCode::Up | KeyCode::Char('k') => self.state.select_previous(),
            KeyCode::Enter => self.press_format(),
            KeyCode::Char('p') => {
                if let Some(id) = self.state.selected_task_id().cloned() {
                    let dispatcher = self.controller.dispatcher().clone();
                    tokio::spawn(async move {
                        dispatcher.toggle_pause(&id).await;
                    });
                }
            }
            KeyCode::Char('r') => {
                if let Some(id) = self.state.selected_task_id().cloned() {
                    let dispatcher = self.controller.dispatcher().clone();
                    tokio::spawn(async move {
                        dispatcher.retry(&id).await;
                    });
                }
            }
            KeyCode::Char('x') | KeyCode::Delete => {
                if let Some(id) = self.state.selected_task_id().cloned() {
                    let dispatcher = self.controller.dispatcher().clone();
                    tokio::spawn(async move {
                        dispatcher.cancel_or_close(&id).await;
                    });
                }
            }
            _ => {}
        }
    }

    fn open_input(&mut self, kind: InputKind) {
        self.state.input_buffer.clear();
        self.state.ui_mode = UiMode::Input(kind);
    }

    /// Enter on a format row: download, pause or resume depending on its mode
    fn press_format(&mut self) {
        if self.state.focus_pane != FocusPane::Formats {
            return;
        }
        let Some(row) = self.state.selected_format() else {
            return;
        };
        let key = row.key.clone();
        let dispatcher = self.controller.dispatcher().clone();
        tokio::spawn(async move {
            dispatcher.handle_format_action(&key).await;
        });
    }

    fn handle_input_mode(&mut self, kind: InputKind, code: KeyCode, modifiers: KeyModifiers) {
        match code {
            KeyCode::Esc => {
                self.state.input_buffer.clear();
                self.state.ui_mode = UiMode::Normal;
            }
            // Alt+Enter inserts a line break for typing several links
            KeyCode::Enter if modifiers.contains(KeyModifiers::ALT) => {
                self.state.push_input("\n");
            }
            KeyCode::Enter => {
                let raw = std::mem::take(&mut self.state.input_buffer);
                self.state.ui_mode = UiMode::Normal;
                match kind {
                    InputKind::Analyze => self.submit_analyze(raw),
                    InputKind::Batch => self.submit_batch(raw),
                }
            }
            KeyCode::Backspace => {
                self.state.input_buffer.pop();
            }
            KeyCode::Char(c) => {
                let mut buf = [0u8; 4];
                self.state.push_input(c.encode_utf8(&mut buf));
            }
            _ => {}
        }
    }

    /// Analyze in the background; the result comes back as a TuiEvent
    fn submit_analyze(&mut self, raw: String) {
        let urls = crate::util::url_list::parse_url_list(&raw);
        self.state.analyzing = (!urls.is_empty()).then_some(urls.len());
        self.state.notice = None;

        let gateway = Arc::clone(self.controller.gateway());
        let i18n = Arc::clone(self.state.i18n());
        let events = self.events.clone();
        let limit = self.analyze_timeout;
        tokio::spawn(async move {
            let result = intake::analyze_urls(gateway.as_ref(), &urls, limit)
                .await
                .map_err(|e| e.to_dialog(&i18n));
            if events.send(TuiEvent::Analyzed(result)).await.is_err() {
                tracing::debug!("Analyze finished after the UI closed");
            }
        });
    }

    fn submit_batch(&mut self, raw: String) {
        let dispatcher = self.controller.dispatcher().clone();
        let format_id = self.default_format.clone();
        tokio::spawn(async move {
            dispatcher.start_batch(&raw, &format_id).await;
        });
    }
}

/// Run the terminal UI until the user quits
pub async fn run_tui<G: TaskGateway + ?Sized + 'static>(
    app_state: AppState,
    controller: Controller<G>,
) -> Result<()> {
    let (tick, analyze_timeout, default_format) = {
        let config = app_state.config.read().await;
        (
            config.ui.tick(),
            config.intake.analyze_timeout(),
            config.intake.default_format.clone(),
        )
    };

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    stdout.execute(EnterAlternateScreen)?;
    stdout.execute(EnableBracketedPaste)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Event channel
    let (tx, mut rx) = mpsc::channel(100);

    let state = TuiState::new(Arc::clone(&app_state.i18n));
    let mut app = TuiApp::new(state, controller, tx.clone(), analyze_timeout, default_format);

    // Spawn keyboard event reader
    let input_tx = tx.clone();
    tokio::spawn(async move {
        let mut reader = crossterm::event::EventStream::new();
        while let Some(Ok(event)) = reader.next().await {
            if input_tx.send(TuiEvent::Input(event)).await.is_err() {
                break;
            }
        }
    });

    // Spawn tick event generator
    let tick_tx = tx.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(tick);
        loop {
            interval.tick().await;
            if tick_tx.send(TuiEvent::Tick).await.is_err() {
                break;
            }
        }
    });

    let result = event_loop(&mut app, &mut terminal, &mut rx).await;

    // Cleanup terminal, even when the loop failed
    disable_raw_mode()?;
    terminal.backend_mut().execute(LeaveAlternateScreen)?;
    terminal.backend_mut().execute(DisableBracketedPaste)?;
    terminal.show_cursor()?;

    result
}

async fn event_loop<G: TaskGateway + ?Sized + 'static>(
    app: &mut TuiApp<G>,
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    rx: &mut mpsc::Receiver<TuiEvent>,
) -> Result<()> {
    while !app.should_quit {
        // Draw UI only if dirty flag is set
        if app.state.needs_redraw() {
            terminal.draw(|f| super::ui::render(&app.state, f))?;
            app.state.clear_dirty();
        }

        if let Ok(Some(event)) = tokio::time::timeout(Duration::from_millis(100), rx.recv()).await {
            app.handle_event(event).await?;
        }
    }
    Ok(())
}
