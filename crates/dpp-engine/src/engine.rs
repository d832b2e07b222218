use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use dpp_crypto::commit_section;
use dpp_ledger::{with_timeout, AnchorReceipt, LedgerClient, LedgerError, Subscription};
use dpp_store::{CursorStore, DocumentStore, Mutation, StoreError, StoreResult};
use dpp_types::{
    Document, DocumentWarning, EventType, Position, RawEvent, SectionHash, SectionKind,
    SectionRecord, Tier, WarningKind, INSTALLATION_LOG,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::anchoring::{AnchorQueue, PendingAnchor};
use crate::backoff::Backoff;
use crate::config::EngineConfig;
use crate::cursor::EventCursor;
use crate::error::{EngineError, EngineResult};
use crate::validation::{validate, ValidatedEvent, ValidationFailure};

const LAST_EVENT_TIMESTAMP: &str = "last_event_timestamp";

/// Phase of the polling state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    Idle,
    Fetching,
    Applying,
    Anchoring,
    Stopped,
}

/// What happened to one ledger event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Appended; carries the new hash of every mutated section.
    Applied {
        entity_id: String,
        sections: Vec<(String, SectionHash)>,
    },
    /// Already present in the target log.
    Duplicate { entity_id: String, event_id: String },
    /// Failed validation and was skipped.
    Invalid { reason: String },
    /// No document is registered for the event's entity.
    UnknownEntity { entity_id: String },
}

/// Counters for one pass of the state machine.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleReport {
    pub fetched: usize,
    pub applied: usize,
    pub duplicates: usize,
    pub invalid: usize,
    pub unknown_entities: usize,
    pub anchored: usize,
    pub anchor_failures: usize,
    /// Cursor position at the end of the cycle.
    pub position: Option<Position>,
}

/// Snapshot published after every state change, for health reporting.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStatus {
    pub source_id: String,
    pub state: EngineState,
    pub position: Option<Position>,
    pub cycles: u64,
    pub pending_anchors: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

#[derive(Debug, Default)]
struct Applied {
    duplicate: bool,
    sections: Vec<(String, SectionHash)>,
}

/// Reconciles one ledger source into the document store.
///
/// Each cycle runs `Idle → Fetching → Applying → Anchoring → Idle`. Events are
/// applied strictly in ledger order and the cursor is saved after each
/// event's document commit. Replays after a crash are absorbed by `event_id`
/// deduplication. Anchoring runs off a retry queue and never holds back
/// ingestion.
pub struct Reconciler {
    ledger: Arc<dyn LedgerClient>,
    store: Arc<dyn DocumentStore>,
    cursor: EventCursor,
    subscription: Subscription,
    anchors: AnchorQueue,
    fetch_backoff: Backoff,
    anchor_backoff: Backoff,
    config: EngineConfig,
    state: EngineState,
    cycles: u64,
    last_error: Option<String>,
    status: watch::Sender<EngineStatus>,
}

impl Reconciler {
    /// Build an engine for `ledger`, resuming from its persisted cursor.
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        store: Arc<dyn DocumentStore>,
        cursors: Arc<dyn CursorStore>,
        config: EngineConfig,
    ) -> EngineResult<Self> {
        let cursor = EventCursor::load(ledger.source_id(), cursors)?;
        let subscription = Subscription::new(
            Arc::clone(&ledger),
            cursor.position(),
            config.batch_size,
            config.ledger_timeout(),
        );
        let (status, _) = watch::channel(EngineStatus {
            source_id: cursor.source_id().to_string(),
            state: EngineState::Idle,
            position: cursor.position(),
            cycles: 0,
            pending_anchors: 0,
            last_error: None,
        });

        Ok(Self {
            ledger,
            store,
            cursor,
            subscription,
            anchors: AnchorQueue::new(),
            fetch_backoff: Backoff::new(config.fetch_backoff.clone()),
            anchor_backoff: Backoff::new(config.anchor_backoff.clone()),
            config,
            state: EngineState::Idle,
            cycles: 0,
            last_error: None,
            status,
        })
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn position(&self) -> Option<Position> {
        self.cursor.position()
    }

    pub fn pending_anchors(&self) -> usize {
        self.anchors.len()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Watch the engine's status from another task.
    pub fn status(&self) -> watch::Receiver<EngineStatus> {
        self.status.subscribe()
    }

    fn set_state(&mut self, state: EngineState) {
        self.state = state;
        self.publish();
    }

    fn publish(&self) {
        self.status.send_replace(EngineStatus {
            source_id: self.cursor.source_id().to_string(),
            state: self.state,
            position: self.cursor.position(),
            cycles: self.cycles,
            pending_anchors: self.anchors.len(),
            last_error: self.last_error.clone(),
        });
    }

    /// Validate one event and apply it to its document.
    ///
    /// Does not move the cursor. Safe to call again with the same event.
    pub fn apply_event(&mut self, raw: &RawEvent) -> EngineResult<ApplyOutcome> {
        let validated = match validate(raw) {
            Ok(v) => v,
            Err(failure) => return self.reject(failure),
        };
        let entity_id = validated.entity_id.clone();
        let event_id = validated.event.event_id.clone();
        let log_name = validated.event.event_type.log_section();

        let current = match self.store.get(&entity_id) {
            Ok(doc) => doc,
            Err(StoreError::NotFound(_) | StoreError::InvalidId(_)) => {
                warn!(
                    entity_id = %entity_id,
                    event_id = %event_id,
                    position = %raw.position(),
                    "event for unregistered entity skipped"
                );
                return Ok(ApplyOutcome::UnknownEntity { entity_id });
            }
            Err(e) => return Err(e.into()),
        };

        if let Some(section) = current.section(log_name) {
            if section.kind() != SectionKind::Log {
                return self.reject(ValidationFailure {
                    position: raw.position(),
                    entity_id: Some(entity_id),
                    event_id: Some(event_id),
                    reason: format!("target section {log_name} is not a log"),
                });
            }
        }
        if current.log(log_name).iter().any(|e| e.event_id == event_id) {
            debug!(entity_id = %entity_id, event_id = %event_id, "duplicate event skipped");
            return Ok(ApplyOutcome::Duplicate { entity_id, event_id });
        }

        let status_section = self.config.status_section.clone();
        let mut applied = Applied::default();
        self.update_with_retry(&entity_id, &mut |doc| {
            applied = apply_to_document(doc, &validated, &status_section)?;
            Ok(())
        })?;

        if applied.duplicate {
            return Ok(ApplyOutcome::Duplicate { entity_id, event_id });
        }

        let now = Instant::now();
        for (section, hash) in &applied.sections {
            self.anchors
                .enqueue(&entity_id, section, validated.event.event_type, *hash, now);
        }
        info!(
            entity_id = %entity_id,
            event_id = %event_id,
            section = log_name,
            position = %raw.position(),
            "event applied"
        );
        Ok(ApplyOutcome::Applied {
            entity_id,
            sections: applied.sections,
        })
    }

    fn reject(&self, failure: ValidationFailure) -> EngineResult<ApplyOutcome> {
        warn!(
            position = %failure.position,
            entity_id = ?failure.entity_id,
            event_id = ?failure.event_id,
            reason = %failure.reason,
            "invalid event skipped"
        );

        if let Some(entity_id) = failure.entity_id.as_deref() {
            let mut warning = DocumentWarning::new(
                WarningKind::Validation,
                format!("event at {} rejected: {}", failure.position, failure.reason),
            )
            .with_position(failure.position);
            if let Some(event_id) = &failure.event_id {
                warning = warning.with_event_id(event_id.clone());
            }

            let already_flagged = match self.store.get(entity_id) {
                Ok(doc) => doc.warnings.iter().any(|w| {
                    w.kind == WarningKind::Validation && w.position == Some(failure.position)
                }),
                Err(StoreError::NotFound(_) | StoreError::InvalidId(_)) => true,
                Err(e) => return Err(e.into()),
            };
            if !already_flagged {
                match self.update_with_retry(entity_id, &mut |doc| {
                    doc.push_warning(warning.clone());
                    Ok(())
                }) {
                    Ok(_) | Err(EngineError::NotFound(_)) => {}
                    Err(e) => return Err(e),
                }
            }
        }

        Ok(ApplyOutcome::Invalid {
            reason: failure.reason,
        })
    }

    /// Run `mutation` through the store, re-reading after conflicts.
    fn update_with_retry(
        &self,
        entity_id: &str,
        mutation: &mut Mutation<'_>,
    ) -> EngineResult<Document> {
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            match self.store.atomic_update(entity_id, mutation) {
                Ok(doc) => return Ok(doc),
                Err(e) if e.is_conflict() && attempts <= self.config.max_conflict_retries => {
                    debug!(entity_id, attempts, "store conflict, re-reading");
                }
                Err(e) if e.is_conflict() => {
                    return Err(EngineError::Conflict {
                        entity_id: entity_id.to_string(),
                        attempts,
                    })
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// One full pass of the state machine.
    ///
    /// On failure the cursor keeps its last committed position and the
    /// subscription is rewound to it, so the next cycle fetches the same
    /// events again.
    pub async fn run_cycle(&mut self) -> EngineResult<CycleReport> {
        let mut report = CycleReport::default();

        self.set_state(EngineState::Fetching);
        let batch = match self.subscription.next_batch().await {
            Ok(batch) => batch,
            Err(e) => {
                self.set_state(EngineState::Idle);
                return Err(e.into());
            }
        };
        report.fetched = batch.len();

        self.set_state(EngineState::Applying);
        for raw in &batch {
            if let Err(e) = self.ingest(raw, &mut report) {
                self.subscription.rewind(self.cursor.position());
                let next = if e.is_fatal() {
                    EngineState::Stopped
                } else {
                    EngineState::Idle
                };
                self.set_state(next);
                return Err(e);
            }
        }

        self.set_state(EngineState::Anchoring);
        self.process_anchors(&mut report).await;

        self.cycles += 1;
        report.position = self.cursor.position();
        self.set_state(EngineState::Idle);
        Ok(report)
    }

    fn ingest(&mut self, raw: &RawEvent, report: &mut CycleReport) -> EngineResult<()> {
        self.cursor.check_next(raw.position())?;
        match self.apply_event(raw)? {
            ApplyOutcome::Applied { .. } => report.applied += 1,
            ApplyOutcome::Duplicate { .. } => report.duplicates += 1,
            ApplyOutcome::Invalid { .. } => report.invalid += 1,
            ApplyOutcome::UnknownEntity { .. } => report.unknown_entities += 1,
        }
        self.cursor.advance(raw.position())
    }

    async fn process_anchors(&mut self, report: &mut CycleReport) {
        let now = Instant::now();
        for mut anchor in self.anchors.take_due(now) {
            let submitted = with_timeout(
                self.config.ledger_timeout(),
                self.ledger
                    .submit(&anchor.entity_id, anchor.event_type, anchor.hash),
            )
            .await;

            match submitted {
                Ok(receipt) => match self.mark_anchored(&anchor, &receipt) {
                    Ok(()) => report.anchored += 1,
                    Err(e) => {
                        warn!(
                            entity_id = %anchor.entity_id,
                            section = %anchor.section,
                            error = %e,
                            "anchoring receipt not recorded, will resubmit"
                        );
                        anchor.next_attempt_at = now + self.anchor_backoff.delay_for(anchor.attempts + 1);
                        self.anchors.requeue(anchor);
                    }
                },
                Err(e) => {
                    report.anchor_failures += 1;
                    self.anchor_failed(anchor, e, now);
                }
            }
        }
    }

    fn anchor_failed(&mut self, mut anchor: PendingAnchor, e: LedgerError, now: Instant) {
        anchor.attempts += 1;
        if e.is_retryable() && anchor.attempts < self.config.anchor_max_attempts {
            let delay = self.anchor_backoff.delay_for(anchor.attempts);
            debug!(
                entity_id = %anchor.entity_id,
                section = %anchor.section,
                attempts = anchor.attempts,
                delay_ms = delay.as_millis() as u64,
                error = %e,
                "anchoring failed, rescheduled"
            );
            anchor.next_attempt_at = now + delay;
            self.anchors.requeue(anchor);
            return;
        }

        let failure = EngineError::AnchoringFailure {
            entity_id: anchor.entity_id.clone(),
            section: anchor.section.clone(),
            reason: format!("{e} after {} attempts", anchor.attempts),
        };
        warn!(error = %failure, hash = %anchor.hash.short_hex(), "anchoring abandoned, section left pending");
        if let Err(store_err) = self.flag_pending(&anchor, &failure) {
            warn!(entity_id = %anchor.entity_id, error = %store_err, "could not record anchoring warning");
        }
    }

    fn mark_anchored(&self, anchor: &PendingAnchor, receipt: &AnchorReceipt) -> EngineResult<()> {
        self.update_with_retry(&anchor.entity_id, &mut |doc| {
            let entries = doc
                .section(&anchor.section)
                .and_then(|s| s.log_entries())
                .map(<[_]>::len);
            if let Some(commitment) = doc.commitments.get_mut(&anchor.section) {
                if commitment.hash == anchor.hash {
                    commitment.mark_anchored(receipt.submitted_at, entries);
                }
            }
            doc.clear_warnings(WarningKind::AnchoringPending, &anchor.section);
            Ok(())
        })?;
        info!(
            entity_id = %anchor.entity_id,
            section = %anchor.section,
            tx_id = %receipt.tx_id,
            hash = %anchor.hash.short_hex(),
            "section anchored"
        );
        Ok(())
    }

    fn flag_pending(&self, anchor: &PendingAnchor, failure: &EngineError) -> EngineResult<()> {
        let warning = DocumentWarning::new(WarningKind::AnchoringPending, failure.to_string())
            .with_section(anchor.section.clone());
        self.update_with_retry(&anchor.entity_id, &mut |doc| {
            doc.push_warning(warning.clone());
            Ok(())
        })?;
        Ok(())
    }

    /// Queue every recorded commitment the ledger has not acknowledged yet.
    ///
    /// The retry queue lives in memory; this rebuilds it after a restart.
    pub fn requeue_unanchored(&mut self) -> EngineResult<usize> {
        let now = Instant::now();
        let mut queued = 0;
        for entity_id in self.store.list_ids()? {
            let doc = self.store.get(&entity_id)?;
            for (section, commitment) in doc.commitments.iter().filter(|(_, c)| !c.anchored) {
                let event_type = if section == INSTALLATION_LOG {
                    EventType::Installation
                } else {
                    EventType::Operation
                };
                self.anchors
                    .enqueue(&entity_id, section, event_type, commitment.hash, now);
                queued += 1;
            }
        }
        self.publish();
        Ok(queued)
    }

    /// Poll until `shutdown` flips to `true` or its sender goes away.
    ///
    /// Waits, fetches, and submissions are abandoned on shutdown; an event is
    /// never left half-applied. Returns an error only for fatal conditions.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> EngineResult<()> {
        info!(
            source = %self.cursor.source_id(),
            position = ?self.cursor.position(),
            "reconciler started"
        );
        match self.requeue_unanchored() {
            Ok(0) => {}
            Ok(count) => info!(count, "unanchored commitments queued"),
            Err(e) => warn!(error = %e, "could not scan for unanchored commitments"),
        }

        loop {
            let stop = *shutdown.borrow();
            if stop {
                break;
            }

            let outcome = tokio::select! {
                outcome = self.run_cycle() => outcome,
                _ = shutdown.changed() => break,
            };

            let wait = match outcome {
                Ok(report) => {
                    self.fetch_backoff.reset();
                    self.last_error = None;
                    if report.fetched > 0 || report.anchored > 0 || report.anchor_failures > 0 {
                        debug!(?report, "cycle complete");
                    }
                    if report.fetched >= self.config.batch_size {
                        Duration::ZERO
                    } else {
                        self.config.poll_interval()
                    }
                }
                Err(e) if e.is_fatal() => {
                    error!(error = %e, source = %self.cursor.source_id(), "reconciler halted");
                    self.last_error = Some(e.to_string());
                    self.set_state(EngineState::Stopped);
                    return Err(e);
                }
                Err(e) => {
                    let delay = self.fetch_backoff.next_delay();
                    warn!(
                        error = %e,
                        attempt = self.fetch_backoff.attempts(),
                        delay_ms = delay.as_millis() as u64,
                        "cycle failed, backing off"
                    );
                    self.last_error = Some(e.to_string());
                    self.publish();
                    delay
                }
            };

            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = shutdown.changed() => break,
            }
        }

        self.set_state(EngineState::Stopped);
        info!(source = %self.cursor.source_id(), position = ?self.cursor.position(), "reconciler stopped");
        Ok(())
    }
}

/// Append the event to its log and refresh the status section.
fn apply_to_document(
    doc: &mut Document,
    validated: &ValidatedEvent,
    status_section: &str,
) -> StoreResult<Applied> {
    let event = &validated.event;
    let log_name = event.event_type.log_section();

    let log = doc
        .sections
        .entry(log_name.to_string())
        .or_insert_with(|| SectionRecord::log(Tier::Tier2));
    let entries = log
        .log_entries_mut()
        .ok_or_else(|| StoreError::Mutation(format!("section {log_name} is not a log")))?;
    if entries.iter().any(|e| e.event_id == event.event_id) {
        return Ok(Applied {
            duplicate: true,
            sections: Vec::new(),
        });
    }
    entries.push(event.clone());

    let mut sections = vec![(log_name.to_string(), commit(doc, log_name)?)];
    if refresh_status(doc, status_section, validated) {
        sections.push((status_section.to_string(), commit(doc, status_section)?));
    }
    Ok(Applied {
        duplicate: false,
        sections,
    })
}

fn commit(doc: &mut Document, section: &str) -> StoreResult<SectionHash> {
    commit_section(doc, section).map_err(|e| StoreError::Mutation(e.to_string()))
}

/// Reflect the event in the status section unless it is older than what the
/// section already shows. Returns `true` if the section changed.
fn refresh_status(doc: &mut Document, section: &str, validated: &ValidatedEvent) -> bool {
    let Some(fields) = doc
        .section_mut(section)
        .and_then(SectionRecord::status_fields_mut)
    else {
        return false;
    };

    let event = &validated.event;
    let reflected = fields
        .get(LAST_EVENT_TIMESTAMP)
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc));
    if reflected.is_some_and(|t| event.timestamp < t) {
        debug!(event_id = %event.event_id, "older event leaves status untouched");
        return false;
    }

    if let Some(status) = &validated.status {
        fields.insert("current_visual_status".into(), Value::String(status.clone()));
    }
    if let Some(color) = &validated.color {
        fields.insert("last_color_change".into(), Value::String(color.clone()));
    }
    fields.insert("last_fault_type".into(), Value::String(event.fault_type.clone()));
    fields.insert("last_severity".into(), Value::from(event.severity));
    fields.insert("last_event_id".into(), Value::String(event.event_id.clone()));
    fields.insert(
        LAST_EVENT_TIMESTAMP.into(),
        Value::String(event.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)),
    );
    true
}
