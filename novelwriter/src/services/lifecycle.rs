//! Persistence and lifecycle coordinator
//!
//! Owns the workspace behind an async mutex and writes every change through
//! to the key-value store before releasing the lock, so each operation and
//! its flush are atomic with respect to other operations. Lifecycle signals
//! from the host (visibility, unload, focus, timer) decide when the session
//! is flushed or reloaded.

use super::backup::BackupService;
use super::generation::{GenerationClient, GenerationOutcome, GenerationTicket};
use super::persistence;
use super::workspace::Workspace;
use crate::config::{AUTOSAVE_INTERVAL, LIFECYCLE_CHANNEL_CAPACITY};
use crate::error::{AppError, Result};
use crate::storage::{KeyValueStore, StorageKey};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::time::MissedTickBehavior;

/// Process lifecycle events the coordinator reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleSignal {
    /// The window was hidden or the screen locked
    Hidden,
    /// The process is about to exit
    BeforeUnload,
    /// The window regained focus; another instance may have saved
    Refocus,
    /// Periodic autosave
    Tick,
}

/// Channel used by the host to deliver lifecycle signals
pub fn lifecycle_channel() -> (mpsc::Sender<LifecycleSignal>, mpsc::Receiver<LifecycleSignal>) {
    mpsc::channel(LIFECYCLE_CHANNEL_CAPACITY)
}

/// Shared handle to the workspace and its store
#[derive(Clone)]
pub struct Coordinator {
    workspace: Arc<Mutex<Workspace>>,
    store: Arc<dyn KeyValueStore>,
}

impl Coordinator {
    /// Load the workspace from `store`
    pub async fn load(store: Arc<dyn KeyValueStore>) -> Self {
        let workspace = persistence::load_workspace(store.as_ref()).await;
        Self {
            workspace: Arc::new(Mutex::new(workspace)),
            store,
        }
    }

    pub fn store(&self) -> Arc<dyn KeyValueStore> {
        Arc::clone(&self.store)
    }

    /// Run a mutation and write through every key it touched
    pub async fn update<R>(&self, f: impl FnOnce(&mut Workspace) -> R) -> R {
        let mut ws = self.workspace.lock().await;
        let result = f(&mut ws);
        let keys = ws.take_pending();
        persistence::write_keys(self.store.as_ref(), &ws, &keys).await;
        result
    }

    /// Run a read-only query
    pub async fn read<R>(&self, f: impl FnOnce(&Workspace) -> R) -> R {
        let ws = self.workspace.lock().await;
        f(&ws)
    }

    /// Write the session regardless of its contents
    pub async fn flush_session(&self) {
        let ws = self.workspace.lock().await;
        persistence::write_key(self.store.as_ref(), &ws, StorageKey::WritingSession).await;
    }

    /// Replace the in-memory session with the stored one (last writer wins)
    pub async fn reload_session(&self) {
        let mut ws = self.workspace.lock().await;
        if persistence::load_key(self.store.as_ref(), &mut ws, StorageKey::WritingSession).await {
            ws.resume_current_novel();
            tracing::debug!("Writing session reloaded from storage");
        }
    }

    /// Re-read every stored key, e.g. after a backup restore
    pub async fn reload_all(&self) {
        let mut ws = self.workspace.lock().await;
        persistence::reload_into(self.store.as_ref(), &mut ws).await;
    }

    /// Restore a backup archive and reload the workspace from it.
    ///
    /// The workspace stays locked from the first restored write until the
    /// reload finishes, so no write-through can put the previous state back
    /// in between.
    pub async fn restore_backup(
        &self,
        backups: &BackupService,
        backup_path: &Path,
    ) -> Result<Vec<StorageKey>> {
        let mut ws = self.workspace.lock().await;
        let restored = backups.restore_backup(backup_path).await?;
        persistence::reload_into(self.store.as_ref(), &mut ws).await;
        Ok(restored)
    }

    pub async fn handle_signal(&self, signal: LifecycleSignal) {
        match signal {
            LifecycleSignal::Hidden | LifecycleSignal::BeforeUnload => {
                tracing::debug!("{:?}: flushing writing session", signal);
                self.flush_session().await;
            }
            LifecycleSignal::Refocus => self.reload_session().await,
            LifecycleSignal::Tick => {
                let ws = self.workspace.lock().await;
                if ws.has_draft() {
                    persistence::write_key(self.store.as_ref(), &ws, StorageKey::WritingSession)
                        .await;
                    tracing::debug!("Autosaved writing session");
                }
            }
        }
    }

    /// Serve lifecycle signals until the sender side closes, autosaving on
    /// `AUTOSAVE_INTERVAL`. The session is flushed once more on exit.
    pub async fn run(&self, mut signals: mpsc::Receiver<LifecycleSignal>) {
        let mut ticker = tokio::time::interval(AUTOSAVE_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        ticker.tick().await;

        tracing::info!("Lifecycle coordinator started");

        loop {
            tokio::select! {
                signal = signals.recv() => match signal {
                    Some(signal) => self.handle_signal(signal).await,
                    None => break,
                },
                _ = ticker.tick() => self.handle_signal(LifecycleSignal::Tick).await,
            }
        }

        self.flush_session().await;
        tracing::info!("Lifecycle coordinator stopped");
    }

    /// Run one generation round trip through `client`.
    ///
    /// Returns `None` when the session is not ready to send. The workspace
    /// is unlocked while the client works, so the user may keep editing; a
    /// result for a chapter that is no longer bound comes back `Stale`.
    ///
    /// Dropping the returned future before it completes (a timeout, say)
    /// finishes the generation as failed in the background, so the session
    /// never stays stuck generating.
    pub async fn generate(&self, client: &dyn GenerationClient) -> Option<GenerationOutcome> {
        let request = self.update(|ws| ws.begin_generation()).await?;
        let mut in_flight = InFlightGeneration {
            coordinator: self,
            ticket: request.ticket,
            armed: true,
        };

        let result = client.generate(&request.context).await;

        let outcome = self
            .update(|ws| ws.finish_generation(&in_flight.ticket, result))
            .await;
        in_flight.armed = false;
        Some(outcome)
    }
}

/// Generation started by `Coordinator::generate` and not yet finished
struct InFlightGeneration<'a> {
    coordinator: &'a Coordinator,
    ticket: GenerationTicket,
    armed: bool,
}

impl Drop for InFlightGeneration<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        let ticket = self.ticket.clone();
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("Generation {} abandoned outside the runtime", ticket.epoch);
            return;
        };

        tracing::warn!("Generation {} cancelled by the caller", ticket.epoch);
        let coordinator = self.coordinator.clone();
        handle.spawn(async move {
            let cancelled = Err(AppError::Generic("Generation cancelled".to_string()));
            coordinator
                .update(|ws| ws.finish_generation(&ticket, cancelled))
                .await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChapterPatch;
    use crate::services::generation::GenerationContext;
    use crate::storage::MemoryStore;
    use async_trait::async_trait;
    use std::time::Duration;
    use tempfile::TempDir;

    async fn coordinator() -> (Coordinator, MemoryStore) {
        let store = MemoryStore::new();
        let coordinator = Coordinator::load(Arc::new(store.clone())).await;
        (coordinator, store)
    }

    /// Creates a novel with one chapter and binds the session to it
    async fn seed(coordinator: &Coordinator) -> (String, String) {
        coordinator
            .update(|ws| {
                let novel = ws.entities_mut().create_novel("Harbor", "1890", "Lyrical");
                let chapter = ws
                    .entities_mut()
                    .create_chapter(&novel.id, "Arrival", "The magistrate");
                ws.set_current_novel(Some(&novel.id));
                ws.start_editing_chapter(&chapter.id);
                (novel.id, chapter.id)
            })
            .await
    }

    async fn stored_session(store: &MemoryStore) -> Option<serde_json::Value> {
        store
            .get("writing-session")
            .await
            .unwrap()
            .map(|raw| serde_json::from_str(&raw).unwrap())
    }

    struct EchoClient;

    #[async_trait]
    impl GenerationClient for EchoClient {
        async fn generate(&self, context: &GenerationContext) -> Result<String> {
            Ok(format!("Generated: {}", context.user_input))
        }
    }

    /// Client whose request never completes
    struct HangingClient;

    #[async_trait]
    impl GenerationClient for HangingClient {
        async fn generate(&self, _context: &GenerationContext) -> Result<String> {
            std::future::pending().await
        }
    }

    struct FailingClient;

    #[async_trait]
    impl GenerationClient for FailingClient {
        async fn generate(&self, _context: &GenerationContext) -> Result<String> {
            Err(AppError::Generic("service unavailable".to_string()))
        }
    }

    #[tokio::test]
    async fn test_update_writes_through() {
        let (coordinator, store) = coordinator().await;

        let (_, chapter_id) = seed(&coordinator).await;

        assert!(store.get("novels").await.unwrap().is_some());
        assert!(store.get("chapters").await.unwrap().unwrap().contains(&chapter_id));
        let session = stored_session(&store).await.unwrap();
        assert_eq!(session["currentChapterId"], chapter_id.as_str());
        assert!(store.get("app-settings").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_state_survives_restart() {
        let (coordinator, store) = coordinator().await;
        let (novel_id, chapter_id) = seed(&coordinator).await;
        coordinator.update(|ws| ws.set_generated_content("draft")).await;

        let restarted = Coordinator::load(Arc::new(store)).await;

        restarted
            .read(|ws| {
                assert_eq!(ws.current_novel().unwrap().id, novel_id);
                assert_eq!(ws.current_chapter().unwrap().id, chapter_id);
                assert_eq!(ws.current_chapter_latest_content(), "draft");
                assert!(ws.session().has_unsaved_changes());
            })
            .await;
    }

    #[tokio::test]
    async fn test_tick_skips_session_without_draft() {
        let (coordinator, store) = coordinator().await;
        coordinator
            .update(|ws| ws.entities_mut().create_novel("N", "", ""))
            .await;

        coordinator.handle_signal(LifecycleSignal::Tick).await;

        assert!(stored_session(&store).await.is_none());
    }

    #[tokio::test]
    async fn test_tick_saves_session_with_draft() {
        let (coordinator, store) = coordinator().await;
        seed(&coordinator).await;
        coordinator.update(|ws| ws.set_generated_content("draft")).await;
        // Simulate another instance overwriting the stored session
        store.set("writing-session", "{}").await.unwrap();

        coordinator.handle_signal(LifecycleSignal::Tick).await;

        let session = stored_session(&store).await.unwrap();
        assert_eq!(session["generatedContent"], "draft");
    }

    #[tokio::test]
    async fn test_tick_skips_session_bound_to_deleted_chapter() {
        let (coordinator, store) = coordinator().await;
        let (_, chapter_id) = seed(&coordinator).await;
        coordinator.update(|ws| ws.set_generated_content("draft")).await;
        store.set("writing-session", "{}").await.unwrap();

        coordinator
            .update(|ws| ws.entities_mut().delete_chapter(&chapter_id))
            .await;
        coordinator.handle_signal(LifecycleSignal::Tick).await;

        assert_eq!(
            store.get("writing-session").await.unwrap().unwrap(),
            "{}"
        );
    }

    #[tokio::test]
    async fn test_hidden_and_unload_always_flush() {
        for signal in [LifecycleSignal::Hidden, LifecycleSignal::BeforeUnload] {
            let (coordinator, store) = coordinator().await;

            coordinator.handle_signal(signal).await;

            let session = stored_session(&store).await.unwrap();
            assert_eq!(session["generatedContent"], "");
        }
    }

    #[tokio::test]
    async fn test_refocus_takes_stored_session() {
        let (coordinator, store) = coordinator().await;
        let (novel_id, chapter_id) = seed(&coordinator).await;
        coordinator.update(|ws| ws.set_generated_content("mine")).await;

        let other = format!(
            r#"{{"novelId":"{}","currentChapterId":"{}","generatedContent":"theirs","originalContent":"","hasUnsavedChanges":true,"isGenerating":true}}"#,
            novel_id, chapter_id
        );
        store.set("writing-session", &other).await.unwrap();

        coordinator.handle_signal(LifecycleSignal::Refocus).await;

        coordinator
            .read(|ws| {
                assert_eq!(ws.session().generated_content(), "theirs");
                assert!(!ws.session().is_generating());
                assert_eq!(ws.current_novel().unwrap().id, novel_id);
            })
            .await;
    }

    #[tokio::test]
    async fn test_refocus_without_stored_session_keeps_memory() {
        let store = MemoryStore::new();
        let coordinator = Coordinator::load(Arc::new(store)).await;
        coordinator
            .workspace
            .lock()
            .await
            .set_user_input("unsaved prompt");

        coordinator.handle_signal(LifecycleSignal::Refocus).await;

        let input = coordinator
            .read(|ws| ws.session().user_input().to_string())
            .await;
        assert_eq!(input, "unsaved prompt");
    }

    #[tokio::test]
    async fn test_run_flushes_on_close() {
        let (coordinator, store) = coordinator().await;
        let (tx, rx) = lifecycle_channel();
        let handle = tokio::spawn({
            let coordinator = coordinator.clone();
            async move { coordinator.run(rx).await }
        });

        tx.send(LifecycleSignal::Hidden).await.unwrap();
        drop(tx);
        handle.await.unwrap();

        assert!(stored_session(&store).await.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_autosaves_on_interval() {
        let (coordinator, store) = coordinator().await;
        seed(&coordinator).await;
        coordinator.update(|ws| ws.set_generated_content("draft")).await;
        store.set("writing-session", "{}").await.unwrap();

        let (tx, rx) = lifecycle_channel();
        let handle = tokio::spawn({
            let coordinator = coordinator.clone();
            async move { coordinator.run(rx).await }
        });

        tokio::time::sleep(AUTOSAVE_INTERVAL + Duration::from_secs(1)).await;

        let session = stored_session(&store).await.unwrap();
        assert_eq!(session["generatedContent"], "draft");

        drop(tx);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_generate_round_trip() {
        let (coordinator, store) = coordinator().await;
        seed(&coordinator).await;

        assert_eq!(coordinator.generate(&EchoClient).await, None);

        coordinator.update(|ws| ws.set_user_input("Rain.")).await;
        let outcome = coordinator.generate(&EchoClient).await;

        assert_eq!(outcome, Some(GenerationOutcome::Applied));
        let session = stored_session(&store).await.unwrap();
        assert_eq!(session["generatedContent"], "Generated: Rain.");
        assert_eq!(session["isGenerating"], false);
    }

    #[tokio::test]
    async fn test_generate_failure_unblocks_session() {
        let (coordinator, _store) = coordinator().await;
        seed(&coordinator).await;
        coordinator.update(|ws| ws.set_user_input("Rain.")).await;

        let outcome = coordinator.generate(&FailingClient).await;

        assert_eq!(
            outcome,
            Some(GenerationOutcome::Failed("service unavailable".to_string()))
        );
        assert!(coordinator.read(|ws| ws.can_send_to_ai()).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_generation_unblocks_session() {
        let (coordinator, store) = coordinator().await;
        seed(&coordinator).await;
        coordinator.update(|ws| ws.set_user_input("Rain.")).await;

        let timed_out = tokio::time::timeout(
            Duration::from_secs(5),
            coordinator.generate(&HangingClient),
        )
        .await;
        assert!(timed_out.is_err());

        // Let the background cleanup run
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(coordinator.read(|ws| !ws.session().is_generating()).await);
        assert!(coordinator.read(|ws| ws.can_send_to_ai()).await);
        let session = stored_session(&store).await.unwrap();
        assert_eq!(session["isGenerating"], false);
        assert_eq!(session["generatedContent"], "");
    }

    #[tokio::test]
    async fn test_restore_backup_is_not_overwritten_by_flushes() {
        let (coordinator, store) = coordinator().await;
        seed(&coordinator).await;
        coordinator.update(|ws| ws.set_user_input("backed up")).await;

        let temp_dir = TempDir::new().unwrap();
        let backups = BackupService::new(coordinator.store(), temp_dir.path().join("backups"));
        let backup_path = backups.create_backup().await.unwrap();

        coordinator.update(|ws| ws.set_user_input("after backup")).await;

        let (restored, _) = tokio::join!(
            coordinator.restore_backup(&backups, &backup_path),
            coordinator.handle_signal(LifecycleSignal::Hidden),
        );
        assert!(restored.unwrap().contains(&StorageKey::WritingSession));

        coordinator.handle_signal(LifecycleSignal::Hidden).await;
        coordinator.reload_all().await;

        let input = coordinator
            .read(|ws| ws.session().user_input().to_string())
            .await;
        assert_eq!(input, "backed up");
        let session = stored_session(&store).await.unwrap();
        assert_eq!(session["userInput"], "backed up");
    }

    #[tokio::test]
    async fn test_reload_all_picks_up_external_changes() {
        let (coordinator, store) = coordinator().await;
        let (_, chapter_id) = seed(&coordinator).await;

        let other = Coordinator::load(Arc::new(store.clone())).await;
        other
            .update(|ws| {
                ws.entities_mut().update_chapter(
                    &chapter_id,
                    ChapterPatch {
                        title: Some("Departure".to_string()),
                        ..Default::default()
                    },
                )
            })
            .await;

        coordinator.reload_all().await;

        let title = coordinator
            .read(|ws| ws.entities().chapter(&chapter_id).unwrap().title.clone())
            .await;
        assert_eq!(title, "Departure");
    }
}
