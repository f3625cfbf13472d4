use std::sync::Arc;

use tokio::{
    sync::{Mutex, Semaphore, broadcast, mpsc, oneshot},
    time::{Duration, Instant},
};
use tracing::{debug, info, warn};

use crate::{
    doi,
    features::{self, FeatureHost, FeatureToggles, GrantAll, NoopHost, PermissionGate},
    history::{self, NoTitles, RecordOutcome, TitleSource},
    message::BusMessage,
    options::{Options, names::OptionName, patch::OptionsPatch},
    persist::{AreaSink, PersistError, StoredWrite},
    reconcile::{self, Effect},
    storage::SettingsStore,
    types::{HistoryEntry, OpSeq, StorageArea},
};

#[derive(Debug)]
pub enum RuntimeError {
    /// The argument is not syntactically a DOI or ShortDOI. Raised before
    /// any storage interaction.
    InvalidDoi(String),
    Persist(PersistError),
    ChannelClosed,
}

impl From<PersistError> for RuntimeError {
    fn from(value: PersistError) -> Self {
        Self::Persist(value)
    }
}

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub flush_on_write: bool,
    pub batch_max_writes: usize,
    pub batch_max_latency_ms: u64,
    pub persist_queue_bound: usize,
    /// Concurrent title fetches allowed at once.
    pub title_fetch_limit: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            flush_on_write: true,
            batch_max_writes: 32,
            batch_max_latency_ms: 75,
            persist_queue_bound: 64,
            title_fetch_limit: 4,
        }
    }
}

/// External services the session calls out to. The defaults are inert,
/// suitable for tests and headless embedding.
pub struct Collaborators {
    pub titles: Arc<dyn TitleSource>,
    pub permissions: Arc<dyn PermissionGate>,
    pub features: Box<dyn FeatureHost>,
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            titles: Arc::new(NoTitles),
            permissions: Arc::new(GrantAll),
            features: Box::new(NoopHost),
        }
    }
}

pub struct SessionHandle {
    cmd_tx: mpsc::Sender<Command>,
    bus_tx: broadcast::Sender<BusMessage>,
}

impl Clone for SessionHandle {
    fn clone(&self) -> Self {
        Self {
            cmd_tx: self.cmd_tx.clone(),
            bus_tx: self.bus_tx.clone(),
        }
    }
}

enum Command {
    GetOptions {
        area: StorageArea,
        names: Option<Vec<OptionName>>,
        resp: oneshot::Sender<OptionsPatch>,
    },
    SetOptions {
        area: StorageArea,
        patch: OptionsPatch,
        resp: oneshot::Sender<Result<(), RuntimeError>>,
    },
    RemoveOptions {
        area: StorageArea,
        names: Vec<OptionName>,
        resp: oneshot::Sender<Result<(), RuntimeError>>,
    },
    ClearArea {
        area: StorageArea,
        resp: oneshot::Sender<Result<(), RuntimeError>>,
    },
    CurrentOptions {
        resp: oneshot::Sender<Options>,
    },
    RecordDoi {
        doi: String,
        title: Option<String>,
        resp: oneshot::Sender<Result<RecordOutcome, RuntimeError>>,
    },
    QueueRecordDoi {
        doi: String,
        resp: oneshot::Sender<Result<bool, RuntimeError>>,
    },
    ProcessQueue {
        resp: oneshot::Sender<Result<usize, RuntimeError>>,
    },
    SetHistorySaved {
        doi: String,
        saved: bool,
        resp: oneshot::Sender<Result<bool, RuntimeError>>,
    },
    DeleteHistoryEntry {
        doi: String,
        resp: oneshot::Sender<Result<bool, RuntimeError>>,
    },
    ClearHistory {
        resp: oneshot::Sender<Result<usize, RuntimeError>>,
    },
    History {
        resp: oneshot::Sender<Vec<HistoryEntry>>,
    },
    /// Posted by a finished title-fetch task; no response channel.
    RecordTitle {
        doi: String,
        title: String,
    },
    FeatureState {
        resp: oneshot::Sender<FeatureToggles>,
    },
    Flush {
        resp: oneshot::Sender<Result<OpSeq, RuntimeError>>,
    },
    Shutdown {
        resp: oneshot::Sender<Result<(), RuntimeError>>,
    },
}

enum PersistMsg {
    Writes(Vec<StoredWrite>),
    Flush {
        resp: oneshot::Sender<Result<OpSeq, PersistError>>,
    },
    Shutdown {
        resp: oneshot::Sender<()>,
    },
}

struct Session {
    store: SettingsStore,
    toggles: FeatureToggles,
    bus_tx: broadcast::Sender<BusMessage>,
    persist_tx: Option<mpsc::Sender<PersistMsg>>,
    titles: Arc<dyn TitleSource>,
    permissions: Arc<dyn PermissionGate>,
    features: Box<dyn FeatureHost>,
    fetch_limit: Arc<Semaphore>,
    self_tx: mpsc::Sender<Command>,
}

/// Spawns the single reconciling session over `store`.
///
/// The returned handle is the only way in; every mutation runs on the
/// session task, which also pumps storage events through the reconciler
/// to a fixpoint after each one.
pub fn spawn_session(
    store: SettingsStore,
    sink: Option<Box<dyn AreaSink>>,
    collaborators: Collaborators,
    config: RuntimeConfig,
) -> SessionHandle {
    let (cmd_tx, mut cmd_rx) = mpsc::channel::<Command>(256);
    let (bus_tx, _) = broadcast::channel::<BusMessage>(1024);

    let (persist_tx_opt, mut durable_rx) = if let Some(sink) = sink {
        let (persist_tx, persist_rx) = mpsc::channel::<PersistMsg>(config.persist_queue_bound);
        let (durable_tx, durable_rx) = mpsc::unbounded_channel::<Result<OpSeq, PersistError>>();
        spawn_persistence_worker(sink, persist_rx, durable_tx, config.clone());
        (Some(persist_tx), Some(durable_rx))
    } else {
        (None, None)
    };

    let bus_tx_loop = bus_tx.clone();
    let self_tx = cmd_tx.clone();

    tokio::spawn(async move {
        let mut session = Session {
            store,
            toggles: FeatureToggles::default(),
            bus_tx: bus_tx_loop,
            persist_tx: persist_tx_opt,
            titles: collaborators.titles,
            permissions: collaborators.permissions,
            features: collaborators.features,
            fetch_limit: Arc::new(Semaphore::new(config.title_fetch_limit.max(1))),
            self_tx,
        };

        session.startup().await;

        loop {
            if let Some(rx) = durable_rx.as_mut() {
                tokio::select! {
                    cmd = cmd_rx.recv() => {
                        let Some(cmd) = cmd else { break; };
                        if session.handle_command(cmd).await {
                            break;
                        }
                    }
                    durable = rx.recv() => {
                        match durable {
                            Some(Ok(op_seq)) => {
                                let _ = session.bus_tx.send(BusMessage::DurableUpTo { op_seq });
                            }
                            Some(Err(err)) => {
                                warn!(?err, "write batch could not be persisted");
                            }
                            None => {}
                        }
                    }
                }
            } else {
                let Some(cmd) = cmd_rx.recv().await else { break; };
                if session.handle_command(cmd).await {
                    break;
                }
            }
        }
    });

    SessionHandle { cmd_tx, bus_tx }
}

impl SessionHandle {
    pub fn subscribe(&self) -> broadcast::Receiver<BusMessage> {
        self.bus_tx.subscribe()
    }

    pub async fn get_options(
        &self,
        area: StorageArea,
        names: Option<&[OptionName]>,
    ) -> Result<OptionsPatch, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::GetOptions {
                area,
                names: names.map(|n| n.to_vec()),
                resp: tx,
            })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)
    }

    pub async fn set_options(
        &self,
        area: StorageArea,
        patch: OptionsPatch,
    ) -> Result<(), RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::SetOptions {
                area,
                patch,
                resp: tx,
            })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)?
    }

    pub async fn remove_options(
        &self,
        area: StorageArea,
        names: &[OptionName],
    ) -> Result<(), RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::RemoveOptions {
                area,
                names: names.to_vec(),
                resp: tx,
            })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)?
    }

    pub async fn clear_area(&self, area: StorageArea) -> Result<(), RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::ClearArea { area, resp: tx })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)?
    }

    /// Full typed view of the local area over defaults.
    pub async fn options(&self) -> Result<Options, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::CurrentOptions { resp: tx })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)
    }

    /// Records a DOI into the history log.
    ///
    /// The argument is normalized (resolver URL and `doi:` prefixes
    /// stripped) and validated before the session is involved.
    pub async fn record_doi(
        &self,
        doi: impl Into<String>,
        title: Option<String>,
    ) -> Result<RecordOutcome, RuntimeError> {
        let doi = validated(doi.into())?;
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::RecordDoi {
                doi,
                title,
                resp: tx,
            })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)?
    }

    /// Enqueues a DOI for later recording. Returns false when history is
    /// disabled.
    pub async fn queue_record_doi(&self, doi: impl Into<String>) -> Result<bool, RuntimeError> {
        let doi = validated(doi.into())?;
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::QueueRecordDoi { doi, resp: tx })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)?
    }

    /// Drains the pending queue now. Returns how many DOIs ended up in
    /// the collection.
    pub async fn process_queue(&self) -> Result<usize, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::ProcessQueue { resp: tx })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)?
    }

    pub async fn set_history_saved(
        &self,
        doi: impl Into<String>,
        saved: bool,
    ) -> Result<bool, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::SetHistorySaved {
                doi: doi.into(),
                saved,
                resp: tx,
            })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)?
    }

    pub async fn delete_history_entry(
        &self,
        doi: impl Into<String>,
    ) -> Result<bool, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::DeleteHistoryEntry {
                doi: doi.into(),
                resp: tx,
            })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)?
    }

    pub async fn clear_history(&self) -> Result<usize, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::ClearHistory { resp: tx })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)?
    }

    /// The collection ordered per the sort option.
    pub async fn history(&self) -> Result<Vec<HistoryEntry>, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::History { resp: tx })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)
    }

    pub async fn feature_state(&self) -> Result<FeatureToggles, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::FeatureState { resp: tx })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)
    }

    /// Forces buffered writes to disk and returns the durable watermark.
    pub async fn flush(&self) -> Result<OpSeq, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Flush { resp: tx })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)?
    }

    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Shutdown { resp: tx })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)?
    }
}

fn validated(doi: String) -> Result<String, RuntimeError> {
    match doi::normalize(&doi) {
        Some(doi) => Ok(doi),
        None => Err(RuntimeError::InvalidDoi(doi)),
    }
}

impl Session {
    /// Startup reconciliation, run once before the command loop.
    ///
    /// Order matters: a stale mute flag must be cleared before anything
    /// else or the reconciler would stay deaf; deprecated keys go next so
    /// the default fill cannot resurrect them; the sync check and queue
    /// drain then run against a complete option set. Events raised by
    /// these passes are consumed without reaction, the passes themselves
    /// produce the complete outcome.
    async fn startup(&mut self) {
        if self.store.reset_listener_flag() {
            info!("cleared mute flag left set by a previous run");
        }

        let purged = self.store.purge_deprecated();
        if purged > 0 {
            debug!(purged, "dropped deprecated option keys");
        }

        let filled = self.store.fill_missing_defaults();
        if filled > 0 {
            debug!(filled, "filled missing options with defaults");
        }

        while self.store.take_event().is_some() {}

        let effects = reconcile::verify_sync_state(&mut self.store);
        self.run_effects(effects).await;

        if !self.store.options().history_doi_queue.is_empty() {
            self.process_queue().await;
        }

        if let Err(err) = self.settle().await {
            warn!(?err, "startup writes could not be queued for persistence");
        }

        let initial = features::toggles(&self.store.options(), self.permissions.as_ref()).await;
        features::push_changes(self.features.as_ref(), FeatureToggles::default(), initial);
        self.toggles = initial;
    }

    async fn handle_command(&mut self, cmd: Command) -> bool {
        match cmd {
            Command::GetOptions { area, names, resp } => {
                let _ = resp.send(self.store.get(area, names.as_deref()));
            }
            Command::SetOptions { area, patch, resp } => {
                self.store.set(area, &patch);
                let _ = resp.send(self.settle().await);
            }
            Command::RemoveOptions { area, names, resp } => {
                self.store.remove(area, &names);
                let _ = resp.send(self.settle().await);
            }
            Command::ClearArea { area, resp } => {
                self.store.clear(area);
                let _ = resp.send(self.settle().await);
            }
            Command::CurrentOptions { resp } => {
                let _ = resp.send(self.store.options());
            }
            Command::RecordDoi { doi, title, resp } => {
                let outcome = history::record(&mut self.store, &doi, title.as_deref(), true);
                if outcome.needs_title() {
                    self.spawn_title_fetch(doi);
                }
                let _ = resp.send(self.settle().await.map(|()| outcome));
            }
            Command::QueueRecordDoi { doi, resp } => {
                let queued = history::queue(&mut self.store, &doi);
                let _ = resp.send(self.settle().await.map(|()| queued));
            }
            Command::ProcessQueue { resp } => {
                let recorded = self.process_queue().await;
                let _ = resp.send(self.settle().await.map(|()| recorded));
            }
            Command::SetHistorySaved { doi, saved, resp } => {
                let changed = history::set_saved(&mut self.store, &doi, saved);
                let _ = resp.send(self.settle().await.map(|()| changed));
            }
            Command::DeleteHistoryEntry { doi, resp } => {
                let deleted = history::delete(&mut self.store, &doi);
                let _ = resp.send(self.settle().await.map(|()| deleted));
            }
            Command::ClearHistory { resp } => {
                let removed = history::clear(&mut self.store);
                let _ = resp.send(self.settle().await.map(|()| removed));
            }
            Command::History { resp } => {
                let _ = resp.send(history::entries(&self.store));
            }
            Command::RecordTitle { doi, title } => {
                if history::patch_title(&mut self.store, &doi, &title) {
                    if let Err(err) = self.settle().await {
                        warn!(?err, "title patch could not be queued for persistence");
                    }
                }
            }
            Command::FeatureState { resp } => {
                let _ = resp.send(self.toggles);
            }
            Command::Flush { resp } => {
                let out = if let Some(tx) = self.persist_tx.as_ref() {
                    let (flush_tx, flush_rx) = oneshot::channel();
                    if tx.send(PersistMsg::Flush { resp: flush_tx }).await.is_err() {
                        Err(RuntimeError::ChannelClosed)
                    } else {
                        flush_rx
                            .await
                            .map_err(|_| RuntimeError::ChannelClosed)
                            .and_then(|r| r.map_err(RuntimeError::from))
                    }
                } else {
                    Ok(self.store.latest_op_seq())
                };
                let _ = resp.send(out);
            }
            Command::Shutdown { resp } => {
                let out = if let Some(tx) = self.persist_tx.as_ref() {
                    let (done_tx, done_rx) = oneshot::channel();
                    if tx.send(PersistMsg::Shutdown { resp: done_tx }).await.is_err() {
                        Err(RuntimeError::ChannelClosed)
                    } else {
                        done_rx.await.map_err(|_| RuntimeError::ChannelClosed)
                    }
                } else {
                    Ok(())
                };
                let _ = resp.send(out);
                return true;
            }
        }

        false
    }

    /// Pumps storage events through the reconciler until none remain,
    /// then hands accumulated writes to the persistence worker.
    ///
    /// The reconciler's own writes enqueue further events; those are
    /// processed in the same pass, and the value-equality commit rule
    /// guarantees the pass terminates.
    async fn settle(&mut self) -> Result<(), RuntimeError> {
        while let Some(event) = self.store.take_event() {
            let effects = reconcile::react(&mut self.store, &event);
            self.run_effects(effects).await;
        }
        self.flush_writes()
    }

    async fn run_effects(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Broadcast(update) => {
                    let _ = self.bus_tx.send(BusMessage::SettingsUpdated(update));
                }
                Effect::RefreshFeatures => self.refresh_features().await,
                Effect::DrainHistoryQueue => {
                    self.process_queue().await;
                }
            }
        }
    }

    async fn refresh_features(&mut self) {
        let next = features::toggles(&self.store.options(), self.permissions.as_ref()).await;
        features::push_changes(self.features.as_ref(), self.toggles, next);
        self.toggles = next;
    }

    /// Drains the queue and records every entry, tolerating per-item
    /// rejection. Returns how many DOIs are present afterwards.
    async fn process_queue(&mut self) -> usize {
        let drained = history::drain_queue(&mut self.store);
        if drained.is_empty() {
            return 0;
        }

        let mut recorded = 0usize;
        for doi in drained {
            let outcome = history::record(&mut self.store, &doi, None, true);
            if matches!(
                outcome,
                RecordOutcome::Oversized | RecordOutcome::RejectedFull
            ) {
                warn!(%doi, ?outcome, "queued DOI was not recorded");
            }
            if outcome.present() {
                recorded += 1;
            }
            if outcome.needs_title() {
                self.spawn_title_fetch(doi);
            }
        }

        let _ = self.bus_tx.send(BusMessage::QueueDrained { recorded });
        recorded
    }

    /// Fetches a title off the session task, bounded by the semaphore,
    /// and posts the result back as an internal command. A failed fetch
    /// is logged and dropped; the entry keeps its empty title.
    fn spawn_title_fetch(&self, doi: String) {
        let titles = Arc::clone(&self.titles);
        let limit = Arc::clone(&self.fetch_limit);
        let tx = self.self_tx.clone();
        tokio::spawn(async move {
            let Ok(_permit) = limit.acquire_owned().await else {
                return;
            };
            match titles.fetch_title(&doi).await {
                Some(title) => {
                    let _ = tx.send(Command::RecordTitle { doi, title }).await;
                }
                None => {
                    debug!(%doi, "title fetch returned nothing");
                }
            }
        });
    }

    fn flush_writes(&mut self) -> Result<(), RuntimeError> {
        let writes = self.store.drain_pending_writes();
        if writes.is_empty() {
            return Ok(());
        }
        match self.persist_tx.as_ref() {
            Some(tx) => enqueue_persist(tx, writes),
            None => {
                let _ = self.bus_tx.send(BusMessage::DurableUpTo {
                    op_seq: self.store.latest_op_seq(),
                });
                Ok(())
            }
        }
    }
}

fn enqueue_persist(tx: &mpsc::Sender<PersistMsg>, writes: Vec<StoredWrite>) -> Result<(), RuntimeError> {
    tx.try_send(PersistMsg::Writes(writes))
        .map_err(|err| RuntimeError::Persist(PersistError::Message(format!("persist queue error: {err}"))))
}

fn spawn_persistence_worker(
    sink: Box<dyn AreaSink>,
    mut rx: mpsc::Receiver<PersistMsg>,
    durable_tx: mpsc::UnboundedSender<Result<OpSeq, PersistError>>,
    config: RuntimeConfig,
) {
    let sink = Arc::new(Mutex::new(sink));
    tokio::spawn(async move {
        let mut buf = Vec::<StoredWrite>::new();
        let mut deadline = Instant::now() + Duration::from_millis(config.batch_max_latency_ms);
        let mut last_durable: OpSeq = 0;

        loop {
            tokio::select! {
                msg = rx.recv() => {
                    let Some(msg) = msg else {
                        let _ = flush_buf(&sink, &mut buf, &mut last_durable, &durable_tx, true).await;
                        break;
                    };

                    match msg {
                        PersistMsg::Writes(writes) => {
                            buf.extend(writes);
                            if buf.len() >= config.batch_max_writes || config.flush_on_write {
                                let _ = flush_buf(&sink, &mut buf, &mut last_durable, &durable_tx, true).await;
                                deadline = Instant::now() + Duration::from_millis(config.batch_max_latency_ms);
                            }
                        }
                        PersistMsg::Flush { resp } => {
                            let result = flush_buf(&sink, &mut buf, &mut last_durable, &durable_tx, true).await;
                            let _ = resp.send(result.map(|_| last_durable));
                            deadline = Instant::now() + Duration::from_millis(config.batch_max_latency_ms);
                        }
                        PersistMsg::Shutdown { resp } => {
                            let _ = flush_buf(&sink, &mut buf, &mut last_durable, &durable_tx, true).await;
                            let _ = resp.send(());
                            break;
                        }
                    }
                }
                _ = tokio::time::sleep_until(deadline), if !buf.is_empty() => {
                    let _ = flush_buf(&sink, &mut buf, &mut last_durable, &durable_tx, false).await;
                    deadline = Instant::now() + Duration::from_millis(config.batch_max_latency_ms);
                }
            }
        }
    });
}

async fn flush_buf(
    sink: &Arc<Mutex<Box<dyn AreaSink>>>,
    buf: &mut Vec<StoredWrite>,
    last_durable: &mut OpSeq,
    durable_tx: &mpsc::UnboundedSender<Result<OpSeq, PersistError>>,
    call_flush: bool,
) -> Result<(), PersistError> {
    if buf.is_empty() {
        if call_flush {
            let sink_ref = Arc::clone(sink);
            tokio::task::spawn_blocking(move || {
                let mut sink = sink_ref.blocking_lock();
                sink.flush()
            })
            .await
            .map_err(|e| PersistError::Message(format!("join error: {e}")))??;
        }
        return Ok(());
    }

    let writes = std::mem::take(buf);
    let sink_ref = Arc::clone(sink);
    let joined = tokio::task::spawn_blocking(move || {
        let mut sink = sink_ref.blocking_lock();
        let seq = sink.apply_writes(&writes)?;
        if call_flush {
            sink.flush()?;
        }
        Ok(seq)
    })
    .await;

    // A join failure is a batch failure; the writes are gone either way.
    let apply_res: Result<OpSeq, PersistError> = match joined {
        Ok(res) => res,
        Err(e) => Err(PersistError::Message(format!("join error: {e}"))),
    };

    match apply_res {
        Ok(seq) => {
            *last_durable = (*last_durable).max(seq);
            let _ = durable_tx.send(Ok(*last_durable));
            Ok(())
        }
        Err(err) => {
            let _ = durable_tx.send(Err(PersistError::Message(format!(
                "apply failed: {err:?}"
            ))));
            Err(err)
        }
    }
}
