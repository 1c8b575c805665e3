use anyhow::{anyhow, Context, Result};
use budget_core::ledger::BudgetStore;
use budget_core::{paths, AppContext, FileStore, LifecycleSignal, LockState};
use std::path::Path;
use std::sync::Arc;
use zeroize::Zeroizing;

pub const PIN_ENV: &str = "BUDGET_TRACKER_PIN";

/// One process worth of app state: the context over the on-disk store plus
/// whatever PIN the user supplied. Every process starts locked when a PIN
/// exists.
pub struct Session {
    ctx: AppContext,
    pin_arg: Option<String>,
    verified_pin: Option<Zeroizing<String>>,
}

impl Session {
    pub fn open(data_dir: Option<&Path>, pin_arg: Option<String>) -> Result<Self> {
        let path = paths::store_path(data_dir)?;
        let store = FileStore::open(&path)
            .with_context(|| format!("opening store {}", path.display()))?;
        let ctx = AppContext::new(Arc::new(store))?;
        Ok(Self {
            ctx,
            pin_arg,
            verified_pin: None,
        })
    }

    pub fn context(&self) -> &AppContext {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut AppContext {
        &mut self.ctx
    }

    /// PIN given on the command line or in the environment, if any.
    pub fn preset_pin(&self) -> Option<Zeroizing<String>> {
        self.pin_arg
            .clone()
            .or_else(|| std::env::var(PIN_ENV).ok().filter(|pin| !pin.is_empty()))
            .map(Zeroizing::new)
    }

    /// The PIN that unlocked this session, else a preset one, else a prompt.
    pub fn pin(&self, prompt: &str) -> Result<Zeroizing<String>> {
        if let Some(pin) = &self.verified_pin {
            return Ok(pin.clone());
        }
        match self.preset_pin() {
            Some(pin) => Ok(pin),
            None => prompt_pin(prompt),
        }
    }

    pub fn unlock_with(&mut self, pin: &str) -> Result<()> {
        self.ctx.unlock(pin)?;
        self.verified_pin = Some(Zeroizing::new(pin.to_string()));
        Ok(())
    }

    /// Unlock if locked, asking for the PIN when none was supplied.
    pub fn ensure_unlocked(&mut self) -> Result<()> {
        if !self.ctx.is_locked() {
            return Ok(());
        }
        let pin = self.pin("PIN: ")?;
        self.unlock_with(&pin)
    }

    pub fn lock(&mut self) {
        self.ctx.lock();
        self.verified_pin = None;
    }

    pub fn signal(&mut self, signal: LifecycleSignal) -> LockState {
        let state = self.ctx.handle_signal(signal);
        if state == LockState::Locked {
            self.verified_pin = None;
        }
        state
    }

    pub fn ledger(&mut self) -> Result<BudgetStore<'_>> {
        self.ensure_unlocked()?;
        Ok(self.ctx.ledger()?)
    }
}

pub fn prompt_pin(prompt: &str) -> Result<Zeroizing<String>> {
    rpassword::prompt_password(prompt)
        .map(Zeroizing::new)
        .map_err(|e| anyhow!("PIN prompt: {e}"))
}

pub fn prompt_new_pin() -> Result<Zeroizing<String>> {
    let first = prompt_pin("New PIN (4-6 digits): ")?;
    let second = prompt_pin("Confirm PIN: ")?;
    if first != second {
        return Err(anyhow!("PINs do not match"));
    }
    Ok(first)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn verified_pin_is_kept_until_the_session_locks() {
        let dir = tempdir().unwrap();
        let mut session = Session::open(Some(dir.path()), None).unwrap();
        session.context_mut().setup_pin("4242").unwrap();
        assert!(session.verified_pin.is_none());

        session.unlock_with("4242").unwrap();
        assert_eq!(session.pin("PIN: ").unwrap().as_str(), "4242");

        assert_eq!(session.signal(LifecycleSignal::Blur), LockState::Locked);
        assert!(session.verified_pin.is_none());

        session.unlock_with("4242").unwrap();
        session.lock();
        assert!(session.verified_pin.is_none());
        assert!(session.unlock_with("0000").is_err());
        assert!(session.verified_pin.is_none());
    }
}
