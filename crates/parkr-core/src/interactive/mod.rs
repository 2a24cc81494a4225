use crate::error::Error;
use crate::platform::{Key, RawModeGuard, Terminal};
use crate::prune::PruneCandidate;
use crate::size::format_size;
use chrono::{DateTime, Utc};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Active,
    Confirmed,
    Quit,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectionOutcome {
    /// The candidates chosen when Enter was pressed, in list order.
    Confirmed(Vec<PruneCandidate>),
    /// Quit; every selection is discarded.
    Quit,
}

/// Keyboard-driven adjustment of an automatic prune selection.
///
/// A plain state machine: [`InteractiveSelector::handle_key`] applies one
/// key and [`InteractiveSelector::render`] produces the screen.
/// [`InteractiveSelector::run`] ties both to a [`Terminal`], redrawing and
/// then blocking on the next key until the session is confirmed or quit.
pub struct InteractiveSelector {
    candidates: Vec<PruneCandidate>,
    cursor: usize,
    target_bytes: u64,
    total_selected: u64,
    state: SessionState,
}

impl InteractiveSelector {
    /// Start with the cursor on the first row and the automatic choices
    /// pre-selected.
    pub fn new(candidates: Vec<PruneCandidate>, target_bytes: u64) -> Self {
        let total_selected = candidates
            .iter()
            .filter(|candidate| candidate.selected)
            .map(|candidate| candidate.report.local_size)
            .sum();

        Self {
            candidates,
            cursor: 0,
            target_bytes,
            total_selected,
            state: SessionState::Active,
        }
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn total_selected(&self) -> u64 {
        self.total_selected
    }

    pub fn candidates(&self) -> &[PruneCandidate] {
        &self.candidates
    }

    /// Apply one key. Keys after confirm or quit are ignored.
    pub fn handle_key(&mut self, key: Key) -> SessionState {
        if self.state != SessionState::Active {
            return self.state;
        }

        match key {
            Key::Up => self.cursor = self.cursor.saturating_sub(1),
            Key::Down => {
                if self.cursor + 1 < self.candidates.len() {
                    self.cursor += 1;
                }
            }
            Key::Toggle => {
                if let Some(candidate) = self.candidates.get_mut(self.cursor) {
                    candidate.selected = !candidate.selected;
                    if candidate.selected {
                        self.total_selected += candidate.report.local_size;
                    } else {
                        self.total_selected -= candidate.report.local_size;
                    }
                }
            }
            Key::ToggleAll => {
                let select_all = !self.candidates.iter().all(|candidate| candidate.selected);
                for candidate in &mut self.candidates {
                    candidate.selected = select_all;
                }
                self.total_selected = if select_all {
                    self.candidates.iter().map(|c| c.report.local_size).sum()
                } else {
                    0
                };
            }
            Key::Confirm => self.state = SessionState::Confirmed,
            Key::Quit => self.state = SessionState::Quit,
            Key::Other => {}
        }

        self.state
    }

    pub fn selected(&self) -> Vec<PruneCandidate> {
        self.candidates
            .iter()
            .filter(|candidate| candidate.selected)
            .cloned()
            .collect()
    }

    pub fn outcome(&self) -> Option<SelectionOutcome> {
        match self.state {
            SessionState::Active => None,
            SessionState::Confirmed => Some(SelectionOutcome::Confirmed(self.selected())),
            SessionState::Quit => Some(SelectionOutcome::Quit),
        }
    }

    pub fn render(&self, now: DateTime<Utc>) -> Vec<String> {
        let mut lines = Vec::with_capacity(self.candidates.len() + 6);
        lines.push(format!(
            "Need to free up {}. Select projects to delete:",
            format_size(self.target_bytes)
        ));
        lines.push(String::new());

        for (index, candidate) in self.candidates.iter().enumerate() {
            let cursor = if index == self.cursor { ">" } else { " " };
            let checked = if candidate.selected { "[x]" } else { "[ ]" };
            lines.push(format!(
                "{} {} {} ({}) - {}",
                cursor,
                checked,
                candidate.report.name,
                format_size(candidate.report.local_size),
                format_age(candidate.report.last_modified, now)
            ));
        }

        lines.push(String::new());
        let mut footer = format!(
            "Selected: {} / Target: {}",
            format_size(self.total_selected),
            format_size(self.target_bytes)
        );
        if self.total_selected >= self.target_bytes {
            footer.push_str(" (target reached)");
        } else if self.total_selected > 0 {
            footer.push_str(&format!(
                " (need {} more)",
                format_size(self.target_bytes - self.total_selected)
            ));
        }
        lines.push(footer);
        lines.push(String::new());
        lines.push("Controls: space=toggle  a=select all  enter=confirm  q=quit".to_string());
        lines
    }

    /// Run the session on `terminal` until confirmed or quit.
    ///
    /// Fails with [`Error::NotATerminal`] before touching the terminal when
    /// input is not interactive. Raw mode is restored on every exit path.
    pub fn run<T: Terminal + ?Sized>(mut self, terminal: &mut T) -> Result<SelectionOutcome, Error> {
        if !terminal.is_interactive() {
            return Err(Error::NotATerminal);
        }

        let mut guard = RawModeGuard::enter(terminal)?;

        while self.state == SessionState::Active {
            guard.draw(&self.render(Utc::now()))?;
            let key = guard.read_key()?;
            debug!("Interactive key {:?}", key);
            self.handle_key(key);
        }

        guard.clear()?;
        drop(guard);

        Ok(self.outcome().unwrap_or(SelectionOutcome::Quit))
    }
}

/// Human age of a timestamp relative to `now`, e.g. `"3 days ago"`.
pub fn format_age(time: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let Some(time) = time else {
        return "never".to_string();
    };

    let elapsed = now.signed_duration_since(time);
    let plural = |count: i64, unit: &str| {
        if count == 1 {
            format!("1 {} ago", unit)
        } else {
            format!("{} {}s ago", count, unit)
        }
    };

    if elapsed.num_minutes() < 1 {
        "just now".to_string()
    } else if elapsed.num_hours() < 1 {
        plural(elapsed.num_minutes(), "min")
    } else if elapsed.num_days() < 1 {
        plural(elapsed.num_hours(), "hour")
    } else if elapsed.num_days() < 7 {
        plural(elapsed.num_days(), "day")
    } else if elapsed.num_days() < 30 {
        plural(elapsed.num_weeks(), "week")
    } else {
        plural(elapsed.num_days() / 30, "month")
    }
}
