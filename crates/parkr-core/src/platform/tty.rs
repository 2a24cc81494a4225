use super::{Key, Terminal};
use crate::error::Error;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::tty::IsTty;
use crossterm::{cursor, style, terminal, ExecutableCommand, QueueableCommand};
use std::io::{self, Stdout, Write};

/// Terminal backed by crossterm on stdin/stdout.
pub struct CrosstermTerminal {
    stdout: Stdout,
}

impl CrosstermTerminal {
    pub fn new() -> Self {
        Self {
            stdout: io::stdout(),
        }
    }
}

impl Default for CrosstermTerminal {
    fn default() -> Self {
        Self::new()
    }
}

impl Terminal for CrosstermTerminal {
    fn is_interactive(&self) -> bool {
        io::stdin().is_tty()
    }

    fn enable_raw_mode(&mut self) -> Result<(), Error> {
        terminal::enable_raw_mode()?;
        self.stdout.execute(cursor::Hide)?;
        Ok(())
    }

    fn disable_raw_mode(&mut self) -> Result<(), Error> {
        // Restore the cursor even if leaving raw mode fails.
        let shown = self.stdout.execute(cursor::Show).map(|_| ());
        terminal::disable_raw_mode()?;
        shown?;
        Ok(())
    }

    fn read_key(&mut self) -> Result<Key, Error> {
        loop {
            if let Event::Key(key_event) = event::read()? {
                if key_event.kind == KeyEventKind::Release {
                    continue;
                }
                return Ok(map_key(key_event));
            }
        }
    }

    fn draw(&mut self, lines: &[String]) -> Result<(), Error> {
        self.stdout
            .queue(terminal::Clear(terminal::ClearType::All))?
            .queue(cursor::MoveTo(0, 0))?;
        for line in lines {
            // Raw mode disables output post-processing, so emit CR explicitly.
            self.stdout
                .queue(style::Print(line))?
                .queue(style::Print("\r\n"))?;
        }
        self.stdout.flush()?;
        Ok(())
    }

    fn clear(&mut self) -> Result<(), Error> {
        self.stdout
            .queue(terminal::Clear(terminal::ClearType::All))?
            .queue(cursor::MoveTo(0, 0))?;
        self.stdout.flush()?;
        Ok(())
    }
}

fn map_key(key_event: KeyEvent) -> Key {
    match key_event.code {
        KeyCode::Char('c') if key_event.modifiers.contains(KeyModifiers::CONTROL) => Key::Quit,
        KeyCode::Up | KeyCode::Char('k') => Key::Up,
        KeyCode::Down | KeyCode::Char('j') => Key::Down,
        KeyCode::Char(' ') => Key::Toggle,
        KeyCode::Char('a') => Key::ToggleAll,
        KeyCode::Enter => Key::Confirm,
        KeyCode::Esc | KeyCode::Char('q') => Key::Quit,
        _ => Key::Other,
    }
}
