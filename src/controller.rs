//! Pet Care Interaction Controller.
//!
//! The controller is the single authority for "current known pet state" on
//! the client. It dispatches care actions, reconciles the server's answers,
//! and keeps the transient feedback (stat-change indicators, coin toasts,
//! evolution celebrations, error banners) that a presentation layer renders.
//!
//! # Reconciliation
//!
//! Every response replaces the cached stats wholesale. Before replacing, the
//! old and new snapshots are compared to produce stat deltas and evolution
//! events. All of this happens under one lock, so a reader sees either the
//! whole update or none of it.
//!
//! # Ordering
//!
//! Each dispatch (action, refresh, chat snapshot) takes a sequence number from
//! a monotonically increasing counter. A response is applied only if its
//! sequence number is higher than that of the last applied response. A slow
//! response that resolves after a newer one is discarded instead of rolling
//! the pet back.
//!
//! # In-flight slots
//!
//! One slot per pet and [`CareActionKind`]. A second trigger of the same kind
//! for the same pet while the first is in flight is rejected; different kinds
//! (or a newly selected pet) run concurrently. The slot is released by a guard
//! on every exit path, including cancellation.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};

use crate::error::{ACTION_FAILED_MESSAGE, CareError, REFRESH_FAILED_MESSAGE};
use crate::evolution::{detect_evolution, stage_for_level};
use crate::model::{
    CareAction, CareActionKind, CoinChange, DiaryEntry, EvolutionEvent, EvolutionStage,
    PetActionResponse, PetStats, StatDelta,
};
use crate::remote::{PetApiClient, WalletClient};
use crate::stats::stat_deltas;
use crate::storage::{ActionRecord, Outcome, Storage};
use crate::transient::{
    COIN_CHANGE_TTL_MS, EVOLUTION_TTL_MS, Expiring, ExpiringQueue, STAT_CHANGE_TTL_MS,
};
use crate::validation::validate_pet_name;

/// Default period of the background refresh.
pub const DEFAULT_REFRESH_PERIOD: Duration = Duration::from_secs(60);

/// Most banners kept at once; the oldest is dropped first.
const MAX_BANNERS: usize = 8;

/// Whether a refresh was asked for by someone who is waiting on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshMode {
    /// Initial load or a user-requested reload: failures surface.
    Explicit,
    /// Background timer: failures are logged only.
    Periodic,
}

/// A dismissible, user-facing error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBanner {
    pub id: u64,
    pub message: String,
    /// Whether a Retry affordance re-runs the failed refresh.
    pub retryable: bool,
}

/// A dispatch reserved before a snapshot request leaves (e.g. a chat
/// message). The reply is reconciled against this pet and sequence number,
/// not whatever is current when it arrives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotTicket {
    seq: u64,
    pet_id: String,
}

impl SnapshotTicket {
    pub fn pet_id(&self) -> &str {
        &self.pet_id
    }
}

/// What a reconciliation did to local state.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Reconciliation {
    /// False when the response was stale or the view was gone.
    pub applied: bool,
    pub stat_changes: Vec<StatDelta>,
    pub evolution: Option<EvolutionEvent>,
}

/// Result of a successful care action.
#[derive(Debug, Clone, Serialize)]
pub struct ActionOutcome {
    pub action: CareActionKind,
    pub reaction: String,
    pub notifications: Vec<String>,
    #[serde(flatten)]
    pub reconciliation: Reconciliation,
}

/// Stats prepared for display.
#[derive(Debug, Clone, Serialize)]
pub struct StatsView {
    /// Stats clamped to [0, 100].
    pub stats: PetStats,
    /// Server happiness if present, else derived; clamped.
    pub happiness: f64,
    pub stage: EvolutionStage,
}

impl StatsView {
    pub fn from_stats(stats: &PetStats) -> Self {
        Self {
            stats: stats.clamped(),
            happiness: stats.display_happiness().clamp(0.0, 100.0),
            stage: stage_for_level(stats.level),
        }
    }
}

/// Read-only snapshot of everything the presentation layer renders.
#[derive(Debug, Clone, Serialize)]
pub struct ControllerView {
    pub pet_id: Option<String>,
    pub stats: Option<StatsView>,
    pub diary: Vec<DiaryEntry>,
    pub reaction: Option<String>,
    pub notifications: Vec<String>,
    pub balance: Option<i64>,
    pub in_flight: Vec<CareActionKind>,
    pub stat_changes: Vec<Expiring<StatDelta>>,
    pub coin_changes: Vec<Expiring<CoinChange>>,
    pub evolutions: Vec<Expiring<EvolutionEvent>>,
    pub banners: Vec<ErrorBanner>,
}

struct ControllerState {
    alive: bool,
    pet_id: Option<String>,
    stats: Option<PetStats>,
    diary: Vec<DiaryEntry>,
    reaction: Option<String>,
    notifications: Vec<String>,
    balance: Option<i64>,
    in_flight: HashSet<(String, CareActionKind)>,
    applied_seq: u64,
    stat_changes: ExpiringQueue<StatDelta>,
    coin_changes: ExpiringQueue<CoinChange>,
    evolutions: ExpiringQueue<EvolutionEvent>,
    banners: Vec<ErrorBanner>,
    next_banner_id: u64,
}

impl ControllerState {
    fn new() -> Self {
        Self {
            alive: true,
            pet_id: None,
            stats: None,
            diary: Vec::new(),
            reaction: None,
            notifications: Vec::new(),
            balance: None,
            in_flight: HashSet::new(),
            applied_seq: 0,
            stat_changes: ExpiringQueue::with_ttl_ms(STAT_CHANGE_TTL_MS),
            coin_changes: ExpiringQueue::with_ttl_ms(COIN_CHANGE_TTL_MS),
            evolutions: ExpiringQueue::with_ttl_ms(EVOLUTION_TTL_MS),
            banners: Vec::new(),
            next_banner_id: 1,
        }
    }

    /// Drop everything that belonged to the previous pet.
    fn reset_pet(&mut self, pet_id: Option<String>) {
        self.pet_id = pet_id;
        self.stats = None;
        self.diary.clear();
        self.reaction = None;
        self.notifications.clear();
        self.stat_changes.clear();
        self.coin_changes.clear();
        self.evolutions.clear();
        self.banners.clear();
    }

    fn in_flight_for_current(&self) -> Vec<CareActionKind> {
        let mut kinds: Vec<CareActionKind> = self
            .in_flight
            .iter()
            .filter(|(pet_id, _)| self.pet_id.as_deref() == Some(pet_id.as_str()))
            .map(|(_, kind)| *kind)
            .collect();
        kinds.sort_by_key(|k| k.label());
        kinds
    }

    fn push_banner(&mut self, message: &str, retryable: bool) -> u64 {
        if self.banners.len() >= MAX_BANNERS {
            self.banners.remove(0);
        }
        let id = self.next_banner_id;
        self.next_banner_id += 1;
        self.banners.push(ErrorBanner {
            id,
            message: message.to_string(),
            retryable,
        });
        id
    }

    /// Replace cached state with a server snapshot, if it is still wanted.
    fn reconcile(&mut self, update: Update, now: DateTime<Utc>) -> Reconciliation {
        if !self.alive {
            debug!(seq = update.seq, "View torn down; dropping response");
            return Reconciliation::default();
        }
        if self.pet_id.as_deref() != Some(update.pet_id.as_str()) {
            debug!(seq = update.seq, pet_id = %update.pet_id, "Pet changed; dropping response");
            return Reconciliation::default();
        }
        if update.seq <= self.applied_seq {
            debug!(
                seq = update.seq,
                applied_seq = self.applied_seq,
                "Stale response; dropping"
            );
            return Reconciliation::default();
        }

        let stat_changes = if update.track_deltas {
            stat_deltas(self.stats.as_ref(), &update.stats)
        } else {
            Vec::new()
        };
        let evolution = detect_evolution(self.stats.as_ref(), Some(&update.stats));

        for change in &stat_changes {
            self.stat_changes.push(*change, now);
        }
        if let Some(event) = evolution {
            self.evolutions.push(event, now);
        }

        self.stats = Some(update.stats);
        if let Some(diary) = update.diary {
            self.diary = diary;
        }
        if let Some((reaction, notifications)) = update.feedback {
            self.reaction = Some(reaction);
            self.notifications = notifications;
        }
        self.applied_seq = update.seq;

        Reconciliation {
            applied: true,
            stat_changes,
            evolution,
        }
    }
}

/// A server snapshot waiting to be reconciled.
struct Update {
    seq: u64,
    pet_id: String,
    stats: PetStats,
    diary: Option<Vec<DiaryEntry>>,
    feedback: Option<(String, Vec<String>)>,
    track_deltas: bool,
}

struct Inner {
    api: PetApiClient,
    wallet: Option<WalletClient>,
    storage: Option<Storage>,
    next_seq: AtomicU64,
    state: Mutex<ControllerState>,
}

/// Cloneable handle to one view's controller.
#[derive(Clone)]
pub struct CareController {
    inner: Arc<Inner>,
}

/// Releases an in-flight slot when dropped.
struct InFlightGuard {
    inner: Arc<Inner>,
    slot: (String, CareActionKind),
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        lock(&self.inner.state).in_flight.remove(&self.slot);
    }
}

fn lock(state: &Mutex<ControllerState>) -> MutexGuard<'_, ControllerState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl CareController {
    /// Create a controller.
    ///
    /// # Arguments
    ///
    /// * `api` - Pet Action Service client
    /// * `wallet` - Coin balance client, refreshed after every successful action
    /// * `storage` - Optional telemetry journal
    pub fn new(api: PetApiClient, wallet: Option<WalletClient>, storage: Option<Storage>) -> Self {
        Self {
            inner: Arc::new(Inner {
                api,
                wallet,
                storage,
                next_seq: AtomicU64::new(1),
                state: Mutex::new(ControllerState::new()),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, ControllerState> {
        lock(&self.inner.state)
    }

    fn next_seq(&self) -> u64 {
        self.inner.next_seq.fetch_add(1, Ordering::SeqCst)
    }

    /// Make `pet_id` the active pet.
    ///
    /// Switching pets clears cached pet state, transient feedback and banners.
    /// Requests still in flight for the previous pet keep their own slots and
    /// their responses are dropped on arrival.
    pub fn select_pet(&self, pet_id: &str) {
        let mut state = self.state();
        if state.pet_id.as_deref() == Some(pet_id) {
            return;
        }

        info!(pet_id, "Pet selected");
        state.reset_pet(Some(pet_id.to_string()));
    }

    /// Forget the active pet.
    pub fn clear_pet(&self) {
        self.state().reset_pet(None);
    }

    pub fn pet_id(&self) -> Option<String> {
        self.state().pet_id.clone()
    }

    /// Current cached stats, exactly as last reconciled.
    pub fn stats(&self) -> Option<PetStats> {
        self.state().stats.clone()
    }

    pub fn diary(&self) -> Vec<DiaryEntry> {
        self.state().diary.clone()
    }

    pub fn balance(&self) -> Option<i64> {
        self.state().balance
    }

    /// Whether `kind` is in flight for the active pet.
    pub fn is_in_flight(&self, kind: CareActionKind) -> bool {
        let state = self.state();
        match &state.pet_id {
            Some(pet_id) => state.in_flight.contains(&(pet_id.clone(), kind)),
            None => false,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.state().alive
    }

    pub fn banners(&self) -> Vec<ErrorBanner> {
        self.state().banners.clone()
    }

    /// Dismiss a banner. Returns false if no such banner exists.
    pub fn dismiss_banner(&self, id: u64) -> bool {
        let mut state = self.state();
        let before = state.banners.len();
        state.banners.retain(|b| b.id != id);
        state.banners.len() != before
    }

    /// Tear the view down: stop applying responses.
    ///
    /// Requests already in flight are not cancelled; their responses are
    /// simply dropped when they arrive.
    pub fn shutdown(&self) {
        let mut state = self.state();
        state.alive = false;
        info!("Controller shut down");
    }

    /// Everything the presentation layer needs, as of `now`.
    pub fn snapshot(&self, now: DateTime<Utc>) -> ControllerView {
        let mut state = self.state();
        let in_flight = state.in_flight_for_current();

        ControllerView {
            pet_id: state.pet_id.clone(),
            stats: state.stats.as_ref().map(StatsView::from_stats),
            diary: state.diary.clone(),
            reaction: state.reaction.clone(),
            notifications: state.notifications.clone(),
            balance: state.balance,
            in_flight,
            stat_changes: state.stat_changes.live(now),
            coin_changes: state.coin_changes.live(now),
            evolutions: state.evolutions.live(now),
            banners: state.banners.clone(),
        }
    }

    /// Dispatch a care action and reconcile the result.
    ///
    /// # Errors
    ///
    /// - [`CareError::NoPetSelected`] if no pet is active (nothing is sent)
    /// - [`CareError::AlreadyInFlight`] if the same kind is already running
    /// - [`CareError::NetworkOrServerFailure`] for any remote failure; cached
    ///   stats are left untouched and one banner is raised
    #[instrument(skip(self), fields(action = %action.kind()))]
    pub async fn perform_care_action(
        &self,
        action: CareAction,
    ) -> Result<ActionOutcome, CareError> {
        let kind = action.kind();

        let (pet_id, guard) = {
            let mut state = self.state();
            let pet_id = match (&state.pet_id, state.alive) {
                (Some(pet_id), true) => pet_id.clone(),
                _ => return Err(CareError::NoPetSelected),
            };
            let slot = (pet_id.clone(), kind);
            if !state.in_flight.insert(slot.clone()) {
                debug!("Ignoring duplicate trigger");
                return Err(CareError::AlreadyInFlight(kind));
            }
            (
                pet_id,
                InFlightGuard {
                    inner: Arc::clone(&self.inner),
                    slot,
                },
            )
        };

        let seq = self.next_seq();
        debug!(pet_id = %pet_id, seq, "Dispatching care action");

        let response = match self.inner.api.perform(&pet_id, &action).await {
            Ok(response) => response,
            Err(e) => {
                let err = CareError::remote(e);
                warn!(pet_id = %pet_id, error = %err, "Care action failed");
                {
                    let mut state = self.state();
                    if state.alive {
                        state.push_banner(ACTION_FAILED_MESSAGE, false);
                    }
                }
                drop(guard);
                self.journal(kind.label(), &pet_id, Outcome::Failure, Some(err.to_string()))
                    .await;
                return Err(err);
            }
        };

        let PetActionResponse {
            pet,
            reaction,
            notifications,
        } = response;

        let reconciliation = self.state().reconcile(
            Update {
                seq,
                pet_id: pet_id.clone(),
                stats: pet.stats,
                diary: pet.diary,
                feedback: Some((reaction.clone(), notifications.clone())),
                track_deltas: true,
            },
            Utc::now(),
        );
        drop(guard);

        let outcome = if reconciliation.applied {
            info!(
                pet_id = %pet_id,
                changes = reconciliation.stat_changes.len(),
                evolved = reconciliation.evolution.is_some(),
                "Care action applied"
            );
            self.refresh_balance().await;
            Outcome::Success
        } else {
            Outcome::Stale
        };
        self.journal(kind.label(), &pet_id, outcome, None).await;

        Ok(ActionOutcome {
            action: kind,
            reaction,
            notifications,
            reconciliation,
        })
    }

    /// Reload stats and diary from the server.
    ///
    /// Stats changes that happened server-side (decay, rewards) still trigger
    /// evolution detection. Periodic refresh failures are logged and
    /// swallowed; explicit ones raise a retryable banner and are returned.
    #[instrument(skip(self))]
    pub async fn refresh_from_server(
        &self,
        mode: RefreshMode,
    ) -> Result<Reconciliation, CareError> {
        let pet_id = {
            let state = self.state();
            match (&state.pet_id, state.alive) {
                (Some(pet_id), true) => pet_id.clone(),
                _ if mode == RefreshMode::Periodic => return Ok(Reconciliation::default()),
                _ => return Err(CareError::NoPetSelected),
            }
        };

        let seq = self.next_seq();
        let (stats, diary) = tokio::join!(
            self.inner.api.get_stats(&pet_id),
            self.inner.api.get_diary(&pet_id),
        );

        let (stats, diary) = match (stats, diary) {
            (Ok(stats), Ok(diary)) => (stats, diary),
            (Err(e), _) | (_, Err(e)) => {
                let err = CareError::remote(e);
                match mode {
                    RefreshMode::Periodic => {
                        warn!(pet_id = %pet_id, error = %err, "Periodic refresh failed");
                    }
                    RefreshMode::Explicit => {
                        warn!(pet_id = %pet_id, error = %err, "Refresh failed");
                        let mut state = self.state();
                        if state.alive {
                            state.push_banner(REFRESH_FAILED_MESSAGE, true);
                        }
                    }
                }
                self.journal("refresh", &pet_id, Outcome::Failure, Some(err.to_string()))
                    .await;

                return match mode {
                    RefreshMode::Periodic => Ok(Reconciliation::default()),
                    RefreshMode::Explicit => Err(err),
                };
            }
        };

        let reconciliation = self.state().reconcile(
            Update {
                seq,
                pet_id: pet_id.clone(),
                stats,
                diary: Some(diary),
                feedback: None,
                track_deltas: false,
            },
            Utc::now(),
        );

        if reconciliation.applied {
            debug!(pet_id = %pet_id, "Refreshed from server");
        } else {
            self.journal("refresh", &pet_id, Outcome::Stale, None).await;
        }
        Ok(reconciliation)
    }

    /// Re-run whatever a retryable banner was raised for, dismissing it.
    pub async fn retry_banner(&self, id: u64) -> Result<bool, CareError> {
        let retryable = {
            let mut state = self.state();
            let Some(pos) = state.banners.iter().position(|b| b.id == id) else {
                return Ok(false);
            };
            if !state.banners[pos].retryable {
                return Ok(false);
            }
            state.banners.remove(pos);
            true
        };

        if retryable {
            self.refresh_from_server(RefreshMode::Explicit).await?;
        }
        Ok(retryable)
    }

    /// Reserve a sequence number for the active pet before sending a request
    /// whose reply may carry a snapshot (e.g. a chat command).
    pub fn begin_snapshot(&self) -> Result<SnapshotTicket, CareError> {
        let state = self.state();
        match (&state.pet_id, state.alive) {
            (Some(pet_id), true) => Ok(SnapshotTicket {
                seq: self.next_seq(),
                pet_id: pet_id.clone(),
            }),
            _ => Err(CareError::NoPetSelected),
        }
    }

    /// Reconcile a snapshot that arrived outside a care action.
    ///
    /// The snapshot is dropped if the ticket's pet is no longer active or a
    /// newer dispatch has already been applied.
    pub fn apply_snapshot(&self, ticket: SnapshotTicket, stats: PetStats) -> Reconciliation {
        self.state().reconcile(
            Update {
                seq: ticket.seq,
                pet_id: ticket.pet_id,
                stats,
                diary: None,
                feedback: None,
                track_deltas: true,
            },
            Utc::now(),
        )
    }

    /// Rename the active pet. The name is validated before anything is sent.
    pub async fn rename_pet(&self, name: &str) -> Result<(), CareError> {
        validate_pet_name(name)?;
        let pet_id = self.pet_id().ok_or(CareError::NoPetSelected)?;

        if let Err(e) = self.inner.api.rename(&pet_id, name.trim()).await {
            let err = CareError::remote(e);
            warn!(pet_id = %pet_id, error = %err, "Rename failed");
            self.journal("rename", &pet_id, Outcome::Failure, Some(err.to_string()))
                .await;
            return Err(err);
        }

        info!(pet_id = %pet_id, "Pet renamed");
        self.journal("rename", &pet_id, Outcome::Success, None).await;
        Ok(())
    }

    /// Ask the wallet for the current balance and raise a coin toast if it
    /// moved. Failures are logged only.
    pub async fn refresh_balance(&self) -> Option<i64> {
        let wallet = self.inner.wallet.as_ref()?;

        let balance = match wallet.get_balance().await {
            Ok(balance) => balance,
            Err(e) => {
                warn!(error = %format!("{e:#}"), "Balance refresh failed");
                return None;
            }
        };

        let mut state = self.state();
        if !state.alive {
            return None;
        }
        if let Some(previous) = state.balance {
            if previous != balance {
                state.coin_changes.push(
                    CoinChange {
                        delta: balance - previous,
                        balance,
                    },
                    Utc::now(),
                );
            }
        }
        state.balance = Some(balance);
        Some(balance)
    }

    /// Start the background refresh timer. Dropping the returned handle stops it.
    pub fn spawn_refresh_loop(&self, period: Duration) -> RefreshLoop {
        let controller = self.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately; the initial load is done
            // explicitly by whoever mounts the view.
            ticker.tick().await;

            loop {
                ticker.tick().await;
                if !controller.is_alive() {
                    break;
                }
                let _ = controller.refresh_from_server(RefreshMode::Periodic).await;
                controller.refresh_balance().await;
            }
            debug!("Refresh loop stopped");
        });

        RefreshLoop { handle }
    }

    /// Append an outcome to the telemetry journal, if one is configured.
    pub(crate) async fn journal(
        &self,
        action: &str,
        pet_id: &str,
        outcome: Outcome,
        detail: Option<String>,
    ) {
        let Some(storage) = &self.inner.storage else {
            return;
        };

        let record = ActionRecord {
            action: action.to_string(),
            pet_id: pet_id.to_string(),
            outcome,
            detail,
            timestamp: Utc::now(),
        };
        if let Err(e) = storage.record(&record).await {
            warn!(error = %e, "Failed to journal action");
        }
    }
}

/// Handle to the background refresh task; aborts it on drop.
pub struct RefreshLoop {
    handle: JoinHandle<()>,
}

impl Drop for RefreshLoop {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
