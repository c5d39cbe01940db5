use tracing::{info, warn};

use super::SESSION_LIFETIME;
use crate::config::Timings;
use crate::ports::sandbox::{SandboxProvider, SandboxSession};

/// The sandbox session owned by one orchestration run.
///
/// At most one session is live at a time: [`SessionSlot::acquire`] tears the
/// previous one down first. The owner must call [`SessionSlot::release`] or
/// [`SessionSlot::detach`] before dropping the slot.
pub struct SessionSlot<'a> {
    provider: &'a dyn SandboxProvider,
    timings: &'a Timings,
    current: Option<Box<dyn SandboxSession>>,
}

impl<'a> SessionSlot<'a> {
    /// An empty slot.
    #[must_use]
    pub fn new(provider: &'a dyn SandboxProvider, timings: &'a Timings) -> Self {
        Self { provider, timings, current: None }
    }

    /// Returns `true` while a session is held.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.current.is_some()
    }

    /// Closes any held session and opens a fresh one, retrying the open once.
    ///
    /// # Errors
    ///
    /// Returns the provider's error text when both open attempts fail.
    pub async fn acquire(&mut self) -> Result<&dyn SandboxSession, String> {
        self.release().await;
        let session = match self.provider.open(SESSION_LIFETIME).await {
            Ok(session) => session,
            Err(first) => {
                warn!(error = %first, "sandbox open failed, retrying once");
                tokio::time::sleep(self.timings.sandbox_open_retry).await;
                self.provider
                    .open(SESSION_LIFETIME)
                    .await
                    .map_err(|e| format!("Failed to create sandbox: {e}"))?
            }
        };
        info!(session = session.id(), "sandbox session opened");
        let held: &dyn SandboxSession = &**self.current.insert(session);
        Ok(held)
    }

    /// Closes the held session, if any. Teardown failures are only logged.
    pub async fn release(&mut self) {
        if let Some(session) = self.current.take() {
            match session.close().await {
                Ok(()) => info!(session = session.id(), "sandbox session closed"),
                Err(e) => warn!(session = session.id(), error = %e, "sandbox teardown failed"),
            }
        }
    }

    /// Gives up ownership without closing, leaving the session to its remote timeout.
    pub fn detach(&mut self) -> Option<String> {
        self.current.take().map(|session| session.id().to_string())
    }
}

impl Drop for SessionSlot<'_> {
    fn drop(&mut self) {
        if let Some(session) = &self.current {
            warn!(
                session = session.id(),
                "sandbox session dropped while held; left to remote timeout"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::scripted::ScriptedSandbox;

    #[tokio::test]
    async fn acquire_tears_down_previous_session() {
        let sandbox = ScriptedSandbox::healthy();
        let journal = sandbox.journal();
        let timings = Timings::immediate();
        let mut slot = SessionSlot::new(&sandbox, &timings);

        let first = slot.acquire().await.unwrap().id().to_string();
        let second = slot.acquire().await.unwrap().id().to_string();
        assert_ne!(first, second);
        {
            let journal = journal.lock().unwrap();
            assert_eq!(journal.opened, 2);
            assert_eq!(journal.closed, 1);
        }

        slot.release().await;
        assert!(!slot.is_active());
        assert_eq!(journal.lock().unwrap().closed, 2);
    }

    #[tokio::test]
    async fn detach_keeps_session_open() {
        let sandbox = ScriptedSandbox::healthy();
        let journal = sandbox.journal();
        let timings = Timings::immediate();
        let mut slot = SessionSlot::new(&sandbox, &timings);

        slot.acquire().await.unwrap();
        assert_eq!(slot.detach().as_deref(), Some("sbx1"));
        slot.release().await;
        assert_eq!(journal.lock().unwrap().closed, 0);
    }
}
