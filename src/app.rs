// The central application controller and event loop.

use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{EnterAlternateScreen, enable_raw_mode};
use ratatui::{Terminal, backend::Backend, widgets::ListState};
use std::io;
use std::time::{Duration, Instant};

pub mod model;
pub mod row;
pub mod systemd;
pub mod ui;

use model::ActionMode;
use row::ServiceRow;
use systemd::ServiceManager;

/// Hands the tty back while a lifecycle command may prompt for a password.
pub trait Suspend {
    fn suspend(&mut self) -> Result<()>;
    fn resume(&mut self) -> Result<()>;
}

/// Leaves raw mode and the alternate screen, then re-enters them.
pub struct TtySuspend;

impl Suspend for TtySuspend {
    fn suspend(&mut self) -> Result<()> {
        ratatui::try_restore()?;
        Ok(())
    }

    fn resume(&mut self) -> Result<()> {
        enable_raw_mode()?;
        execute!(io::stdout(), EnterAlternateScreen)?;
        Ok(())
    }
}

pub struct App<M> {
    manager: M,
    rows: Vec<ServiceRow>,
    list_state: ListState,
    action_mode: ActionMode,
    tick_rate: Duration,
    notice: Option<String>,
    should_quit: bool,
}

impl<M: ServiceManager> App<M> {
    pub fn new(
        manager: M,
        rows: Vec<ServiceRow>,
        action_mode: ActionMode,
        tick_rate: Duration,
    ) -> Self {
        let mut list_state = ListState::default();
        if !rows.is_empty() {
            list_state.select(Some(0));
        }

        Self {
            manager,
            rows,
            list_state,
            action_mode,
            tick_rate,
            notice: None,
            should_quit: false,
        }
    }

    pub fn run<B: Backend, S: Suspend>(
        &mut self,
        terminal: &mut Terminal<B>,
        suspend: &mut S,
    ) -> Result<()> {
        self.refresh_all();

        let mut last_tick = Instant::now();

        loop {
            terminal.draw(|f| {
                ui::render(f, &self.rows, &mut self.list_state, self.notice.as_deref())
            })?;

            let timeout = self
                .tick_rate
                .checked_sub(last_tick.elapsed())
                .unwrap_or_else(|| Duration::from_secs(0));

            if event::poll(timeout)? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press && self.handle_key(key.code, suspend)? {
                        // Whatever the prompt printed is not in ratatui's buffer.
                        terminal.clear()?;
                    }
                }
            }

            if last_tick.elapsed() >= self.tick_rate {
                self.refresh_all();
                last_tick = Instant::now();
            }

            if self.should_quit {
                return Ok(());
            }
        }
    }

    /// Returns true when the terminal was handed out and needs a full redraw.
    fn handle_key<S: Suspend>(&mut self, code: KeyCode, suspend: &mut S) -> Result<bool> {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
            KeyCode::Char('j') | KeyCode::Down => self.next(),
            KeyCode::Char('k') | KeyCode::Up => self.previous(),
            KeyCode::Char('r') => {
                self.notice = None;
                self.refresh_all();
            }
            KeyCode::Enter | KeyCode::Char(' ') => return self.press_selected(suspend),
            _ => {}
        }
        Ok(false)
    }

    pub fn refresh_all(&mut self) {
        for row in &mut self.rows {
            row.refresh(&self.manager);
        }
    }

    fn next(&mut self) {
        let i = match self.list_state.selected() {
            Some(i) => {
                if i >= self.rows.len().saturating_sub(1) {
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
                    self.rows.len().saturating_sub(1)
                } else {
                    i - 1
                }
            }
            None => 0,
        };
        self.list_state.select(Some(i));
    }

    fn press_selected<S: Suspend>(&mut self, suspend: &mut S) -> Result<bool> {
        let Some(index) = self.list_state.selected() else {
            return Ok(false);
        };
        let Some(row) = self.rows.get_mut(index) else {
            return Ok(false);
        };

        suspend.suspend()?;
        // The row refreshes itself; only a verify failure needs showing.
        let outcome = row.trigger(&self.manager, self.action_mode);
        suspend.resume()?;

        self.notice = outcome.err().map(|e| format!("{:#}", e));
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::EngineDescriptor;
    use systemd::Systemctl;
    use systemd::testing::ScriptedRunner;

    /// Writes its transitions into the runner's call log.
    struct MarkingSuspend(ScriptedRunner);

    impl Suspend for MarkingSuspend {
        fn suspend(&mut self) -> Result<()> {
            self.0.note("suspend");
            Ok(())
        }

        fn resume(&mut self) -> Result<()> {
            self.0.note("resume");
            Ok(())
        }
    }

    fn app(mode: ActionMode) -> (App<Systemctl<ScriptedRunner>>, MarkingSuspend) {
        let runner = ScriptedRunner::new();
        runner
            .respond_with("systemctl is-active redis.service", false, "inactive")
            .respond("systemctl show redis.service -p MainPID --value", "0")
            .respond_with("pkexec systemctl start redis.service", false, "");
        let rows = vec![
            ServiceRow::new(
                EngineDescriptor::new("PostgreSQL", &["postgresql"], "postgres"),
                "postgresql.service".to_string(),
            ),
            ServiceRow::new(
                EngineDescriptor::new("Redis", &["redis"], "redis-server"),
                "redis.service".to_string(),
            ),
        ];
        let suspend = MarkingSuspend(runner.clone());
        let app = App::new(
            Systemctl::new(runner, "pkexec"),
            rows,
            mode,
            Duration::from_secs(2),
        );
        (app, suspend)
    }

    #[test]
    fn selection_wraps() {
        let (mut app, mut tty) = app(ActionMode::FireAndForget);
        assert!(!app.handle_key(KeyCode::Char('k'), &mut tty).unwrap());
        assert_eq!(app.list_state.selected(), Some(1));
        app.handle_key(KeyCode::Char('j'), &mut tty).unwrap();
        assert_eq!(app.list_state.selected(), Some(0));
        assert_eq!(app.manager.runner().count("suspend"), 0);
    }

    #[test]
    fn pressing_refreshes_only_that_row() {
        let (mut app, mut tty) = app(ActionMode::FireAndForget);
        app.refresh_all();
        app.handle_key(KeyCode::Down, &mut tty).unwrap();
        assert!(app.handle_key(KeyCode::Enter, &mut tty).unwrap());

        let runner = app.manager.runner();
        assert_eq!(runner.count("pkexec systemctl start redis.service"), 1);
        assert_eq!(runner.count("systemctl is-active redis.service"), 2);
        assert_eq!(runner.count("systemctl is-active postgresql.service"), 1);
        assert!(app.notice.is_none());
    }

    #[test]
    fn terminal_is_released_around_lifecycle_command() {
        let (mut app, mut tty) = app(ActionMode::FireAndForget);
        app.handle_key(KeyCode::Down, &mut tty).unwrap();
        app.handle_key(KeyCode::Enter, &mut tty).unwrap();

        let calls = app.manager.runner().calls();
        let position = |name: &str| calls.iter().position(|c| c == name).unwrap();
        let suspend = position("suspend");
        let start = position("pkexec systemctl start redis.service");
        let resume = position("resume");
        assert!(suspend < start && start < resume);
        assert_eq!(app.manager.runner().count("suspend"), 1);
        assert_eq!(app.manager.runner().count("resume"), 1);
    }

    #[test]
    fn verify_failure_becomes_notice() {
        let (mut app, mut tty) = app(ActionMode::Verify);
        app.refresh_all();
        app.handle_key(KeyCode::Down, &mut tty).unwrap();
        app.handle_key(KeyCode::Char(' '), &mut tty).unwrap();
        assert!(app.notice.as_deref().unwrap_or("").contains("redis.service"));
        assert_eq!(app.manager.runner().count("resume"), 1);

        app.handle_key(KeyCode::Char('r'), &mut tty).unwrap();
        assert!(app.notice.is_none());
    }

    #[test]
    fn quit_keys() {
        let (mut app, mut tty) = app(ActionMode::FireAndForget);
        app.handle_key(KeyCode::Esc, &mut tty).unwrap();
        assert!(app.should_quit);
        assert_eq!(app.rows.len(), 2);
    }
}
