pub mod tty;

pub use tty::CrosstermTerminal;

use crate::error::Error;
use std::ops::{Deref, DerefMut};
use tracing::warn;

/// Keys the interactive selector understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Up,
    Down,
    Toggle,
    ToggleAll,
    Confirm,
    Quit,
    Other,
}

/// The terminal operations the interactive selector needs.
///
/// Raw mode must only be entered through [`RawModeGuard`], which restores
/// the previous configuration when dropped.
pub trait Terminal {
    /// Whether input comes from an interactive terminal.
    fn is_interactive(&self) -> bool;
    fn enable_raw_mode(&mut self) -> Result<(), Error>;
    fn disable_raw_mode(&mut self) -> Result<(), Error>;
    /// Block until the next key press.
    fn read_key(&mut self) -> Result<Key, Error>;
    /// Replace the screen contents with `lines`.
    fn draw(&mut self, lines: &[String]) -> Result<(), Error>;
    fn clear(&mut self) -> Result<(), Error>;
}

/// Scoped raw mode: entered on construction, left on drop, including
/// during unwinding.
pub struct RawModeGuard<'a, T: Terminal + ?Sized> {
    terminal: &'a mut T,
}

impl<'a, T: Terminal + ?Sized> RawModeGuard<'a, T> {
    pub fn enter(terminal: &'a mut T) -> Result<Self, Error> {
        terminal.enable_raw_mode()?;
        Ok(Self { terminal })
    }
}

impl<T: Terminal + ?Sized> Deref for RawModeGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.terminal
    }
}

impl<T: Terminal + ?Sized> DerefMut for RawModeGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.terminal
    }
}

impl<T: Terminal + ?Sized> Drop for RawModeGuard<'_, T> {
    fn drop(&mut self) {
        if let Err(err) = self.terminal.disable_raw_mode() {
            warn!("Failed to restore terminal mode: {}", err);
        }
    }
}
