//! Program lifecycle engine.
//!
//! Owns the [`ProgramState`] and every operation that replaces it. All
//! replacements funnel through one commit point that re-evaluates the three
//! engine timers against the (previous, next) state pair while still holding
//! the state lock, so a transition and its timer changes land atomically.

use std::sync::{Arc, Weak};

use tokio::sync::{broadcast, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::api::{BroadcastApi, CreateOutcome, OperatorComment};
use crate::error::{CoreError, Result};
use crate::program::{ProgramState, ProgramStatus};
use crate::schedule::select_program;
use crate::time::now_unix;
use crate::timers::{
    extension_timer_action, refresh_timer_action, statistics_timer_action, TimerAction, TimerSlot,
    STATISTICS_INTERVAL,
};

/// Events emitted by the program engine
#[derive(Debug, Clone)]
pub enum ProgramEvent {
    /// The program, its lifecycle phase, or its metadata changed
    StateChanged { state: ProgramState },
    /// Only audience statistics changed; connection coordinates are
    /// untouched, so stream consumers can ignore these
    StatisticsUpdated { state: ProgramState },
}

/// What a commit changes, deciding which notification (if any) goes out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChangeKind {
    Lifecycle,
    Statistics,
    /// Local preference flips that no consumer needs to observe
    Local,
}

/// Engine that tracks one broadcast program's lifecycle.
pub struct ProgramEngine {
    api: Arc<dyn BroadcastApi>,
    state: RwLock<ProgramState>,
    event_tx: broadcast::Sender<ProgramEvent>,
    refresh_timer: TimerSlot,
    statistics_timer: TimerSlot,
    extension_timer: TimerSlot,
    cancel_token: CancellationToken,
    weak: Weak<Self>,
}

impl ProgramEngine {
    /// Create a new program engine.
    ///
    /// Timer tasks hold only a weak reference back to the engine, so
    /// dropping the last external `Arc` stops them.
    #[must_use]
    pub fn new(api: Arc<dyn BroadcastApi>, cancel_token: CancellationToken) -> Arc<Self> {
        let (event_tx, _) = broadcast::channel(64);

        Arc::new_cyclic(|weak| Self {
            api,
            state: RwLock::new(ProgramState::default()),
            event_tx,
            refresh_timer: TimerSlot::new(),
            statistics_timer: TimerSlot::new(),
            extension_timer: TimerSlot::new(),
            cancel_token,
            weak: weak.clone(),
        })
    }

    /// Subscribe to engine events
    pub fn subscribe(&self) -> broadcast::Receiver<ProgramEvent> {
        self.event_tx.subscribe()
    }

    /// Get a snapshot of the current program state
    pub async fn snapshot(&self) -> ProgramState {
        self.state.read().await.clone()
    }

    /// Whether a program is currently loaded
    pub async fn has_program(&self) -> bool {
        self.state.read().await.has_program()
    }

    /// Whether the program can be extended right now
    pub async fn is_extendable(&self) -> bool {
        self.state.read().await.is_extendable()
    }

    /// Reserve a new program slot, then load whatever the provider now
    /// lists as the current program.
    ///
    /// # Errors
    ///
    /// Returns an error if the reservation or the follow-up load fails.
    /// The reservation outcome itself (created vs. already exists) is not
    /// an error.
    pub async fn create_program(&self) -> Result<CreateOutcome> {
        let outcome = self.api.create_program().await?;
        debug!("create program outcome: {outcome:?}");
        self.fetch_program().await?;
        Ok(outcome)
    }

    /// Select the program to track from the provider's schedule listing and
    /// load its details.
    ///
    /// Program and community details are fetched concurrently and committed
    /// together; if either fetch fails, nothing is committed. Statistics
    /// counters and the auto-extension toggle survive the commit.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NoSuitableSchedule`] when the listing has no
    /// user program, after forcing an already-loaded program to ended.
    pub async fn fetch_program(&self) -> Result<()> {
        let schedules = self.api.fetch_schedules().await?;

        let Some(entry) = select_program(&schedules, now_unix()) else {
            if self.has_program().await {
                self.commit(ChangeKind::Lifecycle, |prev| {
                    let mut next = prev.clone();
                    next.status = ProgramStatus::End;
                    next
                })
                .await;
            }
            return Err(CoreError::NoSuitableSchedule);
        };

        let (detail, community) = tokio::try_join!(
            self.api.fetch_program(&entry.program_id),
            self.api.fetch_community(&entry.group_id),
        )?;

        self.commit(ChangeKind::Lifecycle, |prev| {
            let mut next = prev.clone();
            next.apply_detail(&detail);
            next.apply_community(&community);
            next
        })
        .await;

        Ok(())
    }

    /// Re-fetch details of the loaded program and merge them in.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NoActiveProgram`] when nothing is loaded.
    pub async fn refresh_program(&self) -> Result<()> {
        let program_id = self.require_program_id().await?;
        let detail = self.api.fetch_program(&program_id).await?;

        self.commit(ChangeKind::Lifecycle, |prev| {
            let mut next = prev.clone();
            next.apply_detail(&detail);
            next
        })
        .await;

        Ok(())
    }

    /// Push staged program edits to the provider, then refresh.
    pub async fn edit_program(&self) -> Result<()> {
        let program_id = self.require_program_id().await?;
        self.api.edit_program(&program_id).await?;
        self.refresh_program().await
    }

    /// Put the loaded program on air.
    ///
    /// On success the provider's reported times become authoritative.
    pub async fn start_program(&self) -> Result<()> {
        let program_id = self.require_program_id().await?;
        let times = self.api.start_program(&program_id).await?;

        self.commit(ChangeKind::Lifecycle, move |prev| {
            let mut next = prev.clone();
            next.status = ProgramStatus::OnAir;
            next.start_time = times.start_time;
            next.end_time = times.end_time;
            next
        })
        .await;

        Ok(())
    }

    /// End the loaded program.
    pub async fn end_program(&self) -> Result<()> {
        let program_id = self.require_program_id().await?;
        let end = self.api.end_program(&program_id).await?;

        self.commit(ChangeKind::Lifecycle, move |prev| {
            let mut next = prev.clone();
            next.status = ProgramStatus::End;
            next.end_time = end.end_time;
            next
        })
        .await;

        Ok(())
    }

    /// Extend the loaded program by the provider's standard increment.
    pub async fn extend_program(&self) -> Result<()> {
        let program_id = self.require_program_id().await?;
        let end = self.api.extend_program(&program_id).await?;

        self.commit(ChangeKind::Lifecycle, move |prev| {
            let mut next = prev.clone();
            next.end_time = end.end_time;
            next
        })
        .await;

        Ok(())
    }

    /// Flip the auto-extension preference, returning the new value.
    ///
    /// A local mutation: timers are re-evaluated but no event is emitted,
    /// so flipping the toggle never disturbs stream consumers.
    pub async fn toggle_auto_extension(&self) -> bool {
        let mut enabled = false;
        self.commit(ChangeKind::Local, |prev| {
            let mut next = prev.clone();
            next.auto_extension_enabled = !prev.auto_extension_enabled;
            enabled = next.auto_extension_enabled;
            next
        })
        .await;
        enabled
    }

    /// Publish a broadcaster comment on the loaded program.
    pub async fn send_operator_comment(&self, comment: &OperatorComment) -> Result<()> {
        let program_id = self.require_program_id().await?;
        self.api.send_operator_comment(&program_id, comment).await
    }

    async fn require_program_id(&self) -> Result<String> {
        let state = self.state.read().await;
        if state.has_program() {
            Ok(state.program_id.clone())
        } else {
            Err(CoreError::NoActiveProgram)
        }
    }

    /// Replace the state and re-evaluate all timers atomically.
    async fn commit<F>(&self, kind: ChangeKind, make_next: F)
    where
        F: FnOnce(&ProgramState) -> ProgramState,
    {
        let mut state = self.state.write().await;
        let next = make_next(&state);
        let now = now_unix();

        let refresh = refresh_timer_action(&state, &next, now);
        let statistics = statistics_timer_action(&state, &next);
        let extension = extension_timer_action(&state, &next, now);

        self.apply_refresh_action(refresh);
        self.apply_statistics_action(statistics);
        self.apply_extension_action(extension);

        *state = next.clone();
        drop(state);

        let event = match kind {
            ChangeKind::Lifecycle => ProgramEvent::StateChanged { state: next },
            ChangeKind::Statistics => ProgramEvent::StatisticsUpdated { state: next },
            ChangeKind::Local => return,
        };
        let _ = self.event_tx.send(event);
    }

    fn apply_refresh_action(&self, action: TimerAction) {
        match action {
            TimerAction::Leave => {}
            TimerAction::Cancel => self.refresh_timer.cancel(),
            TimerAction::Arm(delay) => {
                let weak = self.weak.clone();
                let token = self.cancel_token.clone();
                self.refresh_timer.arm(tokio::spawn(async move {
                    tokio::select! {
                        () = token.cancelled() => {}
                        () = tokio::time::sleep(delay) => {
                            let Some(engine) = weak.upgrade() else { return };
                            // Detached task: re-arming this slot must not
                            // abort a refresh already in flight
                            tokio::spawn(async move {
                                if let Err(e) = engine.refresh_program().await {
                                    warn!("scheduled status refresh failed: {e}");
                                }
                            });
                        }
                    }
                }));
            }
        }
    }

    fn apply_statistics_action(&self, action: TimerAction) {
        match action {
            TimerAction::Leave => {}
            TimerAction::Cancel => self.statistics_timer.cancel(),
            TimerAction::Arm(_) => {
                let weak = self.weak.clone();
                let token = self.cancel_token.clone();
                self.statistics_timer.arm(tokio::spawn(async move {
                    loop {
                        // Poll first so a freshly armed loop reports right away
                        let Some(engine) = weak.upgrade() else { break };
                        engine.poll_statistics().await;
                        drop(engine);

                        tokio::select! {
                            () = token.cancelled() => break,
                            () = tokio::time::sleep(STATISTICS_INTERVAL) => {}
                        }
                    }
                }));
            }
        }
    }

    fn apply_extension_action(&self, action: TimerAction) {
        match action {
            TimerAction::Leave => {}
            TimerAction::Cancel => self.extension_timer.cancel(),
            TimerAction::Arm(delay) => {
                let weak = self.weak.clone();
                let token = self.cancel_token.clone();
                self.extension_timer.arm(tokio::spawn(async move {
                    tokio::select! {
                        () = token.cancelled() => {}
                        () = tokio::time::sleep(delay) => {
                            let Some(engine) = weak.upgrade() else { return };
                            tokio::spawn(async move {
                                if let Err(e) = engine.extend_program().await {
                                    warn!("auto extension failed: {e}");
                                }
                            });
                        }
                    }
                }));
            }
        }
    }

    /// Fetch both statistics sources and merge whatever succeeded.
    ///
    /// Each source may fail independently; failures are logged and
    /// swallowed so one bad source never blocks the other's update.
    async fn poll_statistics(&self) {
        let Ok(program_id) = self.require_program_id().await else {
            return;
        };

        let (live, ad) = tokio::join!(
            self.api.fetch_statistics(&program_id),
            self.api.fetch_ad_statistics(&program_id),
        );

        let live = match live {
            Ok(stats) => Some(stats),
            Err(e) => {
                warn!("live statistics fetch failed: {e}");
                None
            }
        };
        let ad = match ad {
            Ok(stats) => Some(stats),
            Err(e) => {
                warn!("ad statistics fetch failed: {e}");
                None
            }
        };

        if live.is_none() && ad.is_none() {
            return;
        }

        self.commit(ChangeKind::Statistics, |prev| {
            let mut next = prev.clone();
            if let Some(live) = live {
                next.viewers = live.viewers;
                next.comments = live.comments;
            }
            if let Some(ad) = ad {
                next.ad_points = ad.ad_points;
                next.gift_points = ad.gift_points;
            }
            next
        })
        .await;
    }
}
