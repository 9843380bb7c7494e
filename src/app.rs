// The terminal controller: renders engine snapshots and turns keys into intents.

use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{Terminal, backend::Backend, widgets::ListState};
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::mpsc::error::TryRecvError;

pub mod brew;
pub mod engine;
pub mod model;
pub mod observer;
pub mod parser;
pub mod ui;

use engine::EngineHandle;
use model::{Notice, ServiceRecord, Snapshot};
use observer::EngineEvent;

/// How often the loop wakes up to pick up new snapshots.
const POLL_RATE: Duration = Duration::from_millis(100);

/// Notices beyond this many are dropped oldest-first.
const MAX_NOTICES: usize = 8;

pub struct App {
    engine: EngineHandle,
    events: UnboundedReceiver<EngineEvent>,
    acting_user: String,
    snapshot: Snapshot,
    notices: VecDeque<Notice>,
    list_state: ListState,
    refresh_interval: Option<Duration>,
    should_quit: bool,
}

impl App {
    pub fn new(
        engine: EngineHandle,
        events: UnboundedReceiver<EngineEvent>,
        acting_user: impl Into<String>,
        refresh_interval: Option<Duration>,
    ) -> Self {
        let mut list_state = ListState::default();
        list_state.select(Some(0)); // Start with first item selected

        Self {
            engine,
            events,
            acting_user: acting_user.into(),
            snapshot: Snapshot::default(),
            notices: VecDeque::new(),
            list_state,
            refresh_interval,
            should_quit: false,
        }
    }

    pub fn run<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> Result<()> {
        // Initial fetch
        self.engine.refresh();

        let mut last_refresh = Instant::now();

        loop {
            self.drain_events();

            terminal.draw(|f| {
                ui::render(
                    f,
                    &self.snapshot,
                    &self.acting_user,
                    self.notices.front(),
                    &mut self.list_state,
                )
            })?;

            if event::poll(POLL_RATE)? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        self.handle_key(key);
                    }
                }
            }

            if let Some(interval) = self.refresh_interval {
                if last_refresh.elapsed() >= interval {
                    self.engine.refresh();
                    last_refresh = Instant::now();
                }
            }

            if self.should_quit {
                return Ok(());
            }
        }
    }

    /// Applies everything the engine has published since the last frame.
    fn drain_events(&mut self) {
        loop {
            match self.events.try_recv() {
                Ok(event) => self.apply(event),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    tracing::error!("sync engine went away, quitting");
                    self.should_quit = true;
                    break;
                }
            }
        }
    }

    fn apply(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::Snapshot(snapshot) => {
                self.snapshot = snapshot;
                self.clamp_selection();
            }
            EngineEvent::Notice(notice) => {
                if self.notices.len() == MAX_NOTICES {
                    self.notices.pop_front();
                }
                self.notices.push_back(notice);
            }
        }
    }

    fn clamp_selection(&mut self) {
        if let Some(selected) = self.list_state.selected() {
            if selected >= self.snapshot.services.len() {
                self.list_state
                    .select(Some(self.snapshot.services.len().saturating_sub(1)));
            }
        }
    }

    fn handle_key(&mut self, key: KeyEvent) {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.should_quit = true;
            return;
        }

        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Esc => {
                self.notices.pop_front();
            }
            KeyCode::Char('j') | KeyCode::Down => self.next(),
            KeyCode::Char('k') | KeyCode::Up => self.previous(),

            KeyCode::Enter | KeyCode::Char(' ') => self.with_selected(|engine, s| {
                engine.toggle(&s.name, false);
            }),
            // Restart is the alternate gesture of a toggle
            KeyCode::Char('r') => self.with_selected(|engine, s| {
                engine.toggle(&s.name, true);
            }),
            KeyCode::Char('s') => self.with_selected(|engine, s| engine.start(&s.name)),
            KeyCode::Char('x') => self.with_selected(|engine, s| engine.stop(&s.name)),

            KeyCode::Char('S') if self.has_services() => self.engine.start_all(),
            KeyCode::Char('X') if self.has_services() => self.engine.stop_all(),
            KeyCode::Char('R') if self.has_services() => self.engine.restart_all(),

            KeyCode::Char('u') | KeyCode::F(5) => self.engine.refresh(),
            _ => {}
        }
    }

    fn has_services(&self) -> bool {
        !self.snapshot.services.is_empty()
    }

    fn selected(&self) -> Option<&ServiceRecord> {
        self.list_state
            .selected()
            .and_then(|index| self.snapshot.services.get(index))
    }

    fn with_selected(&self, f: impl FnOnce(&EngineHandle, &ServiceRecord)) {
        if let Some(service) = self.selected() {
            f(&self.engine, service);
        }
    }

    fn next(&mut self) {
        let i = match self.list_state.selected() {
            Some(i) => {
                if i >= self.snapshot.services.len().saturating_sub(1) {
                    0
                } else {
                    i + 1
                }
            }
            None => 0,
        };
        self.list_state.select(Some(i));
    }

    fn previous(&mut self) {
        let i = match self.list_state.selected() {
            Some(i) => {
                if i == 0 {
                    self.snapshot.services.len().saturating_sub(1)
                } else {
                    i - 1
                }
            }
            None => 0,
        };
        self.list_state.select(Some(i));
    }
}
