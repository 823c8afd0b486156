//! `ExContext`: state shared by every session.
//!
//! Registers, macros, variables, the last search and substitution, settings
//! and the process port. Load it once at startup, pass it to every command,
//! and [`flush`](ExContext::flush) it on shutdown.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;

use crate::config::Settings;
use crate::process::{ProcessRunner, ShellRunner};
use crate::register::RegisterStore;
use crate::store::MacroStore;
use crate::substitute::Substitution;

pub struct ExContext {
    pub store: MacroStore,
    pub registers: RegisterStore,
    pub settings: Settings,
    /// Pattern of the last successful search, reused by `//` and `~`.
    pub last_search: Option<String>,
    /// Reused by `&`, and by `~` as replacement text.
    pub last_substitution: Option<Substitution>,
    pub(crate) runner: Box<dyn ProcessRunner>,
    cancel: Arc<AtomicBool>,
}

impl ExContext {
    pub fn new(store: MacroStore) -> Self {
        Self {
            store,
            registers: RegisterStore::new(),
            settings: Settings::default(),
            last_search: None,
            last_substitution: None,
            runner: Box::new(ShellRunner),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Context with a store that is never written.
    pub fn in_memory() -> Self {
        Self::new(MacroStore::in_memory())
    }

    pub fn with_runner(mut self, runner: Box<dyn ProcessRunner>) -> Self {
        self.runner = runner;
        self
    }

    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Read the persisted store; later modifications are saved as they happen.
    pub fn load(&mut self) -> Result<()> {
        self.store.load()
    }

    pub fn flush(&self) -> Result<()> {
        self.store.save()
    }

    /// Handle another thread can use to stop a running substitute or macro.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    /// Clear a previous cancellation before the next command runs.
    pub fn reset_cancel(&self) {
        self.cancel.store(false, Ordering::Relaxed);
    }
}
