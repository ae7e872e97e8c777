use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use checklist_core::field::{FieldKind, Photo, TmcPart};
use checklist_core::hlc::physical_now;
use checklist_core::{Answer, Checklist, ChecklistId, FieldViewModel, MutationId, Parameter};
use checklist_storage::{MutationLog, SnapshotStore};

use crate::cache::{CacheLoad, ParameterCache};
use crate::config::EngineConfig;
use crate::confirm::{Confirmation, Confirmer, Decision, PendingConfirmation, Prompt, Resolution};
use crate::dispatch::{Dispatcher, FlushReport, SharedStorage};
use crate::error::EngineError;
use crate::navigation::{NavigationState, ScreenSequence, Step, TabBounds, Transition, ZoneEntry};
use crate::remote::{ChecklistRemote, RemoteError};
use crate::transform::transform_parameter;
use crate::visibility::{Evaluation, ValidityRules};
use crate::{pest, tmc};

/// Collaborators a session talks to.
pub struct SessionDeps {
    pub remote: Arc<dyn ChecklistRemote>,
    pub storage: SharedStorage,
    pub confirmer: Arc<dyn Confirmer>,
    pub sequence: Box<dyn ScreenSequence>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    Sent(MutationId),
    /// A stock sub-value was clamped; nothing was sent.
    Corrected,
    /// A pest count went back to zero; nothing was sent.
    Reset,
    AwaitingConfirmation(PendingConfirmation),
    Skipped,
}

impl CommitOutcome {
    pub fn mutation_id(&self) -> Option<MutationId> {
        match self {
            Self::Sent(id) => Some(*id),
            _ => None,
        }
    }
}

fn mismatch(name: &str, expected: FieldKind) -> EngineError {
    EngineError::FieldKindMismatch {
        name: name.to_string(),
        expected: expected.as_str(),
    }
}

fn parameter_at(
    checklist: &Checklist,
    zone_index: usize,
    index: usize,
) -> Result<&Parameter, EngineError> {
    let zone = checklist.zone(zone_index).ok_or(EngineError::ZoneOutOfRange {
        index: zone_index,
        count: checklist.zones.len(),
    })?;
    zone.parameter(index).ok_or(EngineError::ParameterOutOfRange {
        index,
        count: zone.parameters().len(),
    })
}

/// Derive a parameter's fields from the schema, then replay answers that
/// were committed but not yet delivered.
fn seed_fields(
    checklist: &Checklist,
    storage: &SharedStorage,
    checklist_id: &ChecklistId,
    zone_index: usize,
    index: usize,
) -> Result<Vec<FieldViewModel>, EngineError> {
    let parameter = parameter_at(checklist, zone_index, index)?;
    let mut fields = transform_parameter(parameter);
    let pending = storage
        .lock()
        .pending_for_parameter(checklist_id, &parameter.id)?;
    for record in &pending {
        let answer = &record.mutation.answer;
        let applied = fields
            .iter_mut()
            .find(|f| f.name() == answer.field_name())
            .is_some_and(|f| f.apply_answer(answer));
        if applied {
            debug!(field = answer.field_name(), "replayed pending answer");
        } else {
            debug!(
                field = answer.field_name(),
                "pending answer no longer fits the schema"
            );
        }
    }
    Ok(fields)
}

/// Apply a commit resolution to the named field. `None` when the field is
/// gone or of another kind; otherwise the answer to send, if any.
///
/// With `asked`, the committed value is first put back to what the
/// confirmation asked about.
fn resolve_field(
    fields: &mut [FieldViewModel],
    name: &str,
    part: Option<TmcPart>,
    resolution: &Resolution,
    asked: Option<&FieldViewModel>,
) -> Option<Option<Answer>> {
    let field = fields.iter_mut().find(|f| f.name() == name)?;
    match (&mut *field, asked, part) {
        (FieldViewModel::Tmc(f), Some(FieldViewModel::Tmc(asked)), Some(part)) => {
            f.values.set(part, asked.values.get(part).to_string());
        }
        (FieldViewModel::Pest(f), Some(FieldViewModel::Pest(asked)), _) => {
            f.value = asked.value.clone();
        }
        _ => {}
    }
    let send = match (&mut *field, part) {
        (FieldViewModel::Tmc(f), Some(part)) => tmc::apply(f, part, resolution),
        (FieldViewModel::Pest(f), _) => pest::apply(f, resolution),
        _ => return None,
    };
    Some(if send { field.to_answer() } else { None })
}

async fn fetch_checklist(
    remote: &dyn ChecklistRemote,
    storage: &SharedStorage,
    checklist_id: &ChecklistId,
) -> Result<Checklist, EngineError> {
    let body = remote.fetch_checklist(checklist_id).await?;
    let checklist: Checklist =
        serde_json::from_value(body.clone()).map_err(|e| RemoteError::Decode(e.to_string()))?;
    storage
        .lock()
        .save_snapshot(checklist_id, &body.to_string(), physical_now()?)?;
    Ok(checklist)
}

async fn load_checklist(
    remote: &dyn ChecklistRemote,
    storage: &SharedStorage,
    checklist_id: &ChecklistId,
) -> Result<Checklist, EngineError> {
    let err = match fetch_checklist(remote, storage, checklist_id).await {
        Ok(checklist) => return Ok(checklist),
        Err(err) => err,
    };
    warn!(checklist = %checklist_id, %err, "fetch failed, falling back to snapshot");
    let snapshot = storage.lock().load_snapshot(checklist_id)?;
    let Some(body) = snapshot else {
        return Err(EngineError::ChecklistUnavailable(format!(
            "{checklist_id}: {err}"
        )));
    };
    let checklist = serde_json::from_str(&body).map_err(|e| {
        EngineError::ChecklistUnavailable(format!("{checklist_id}: corrupt snapshot: {e}"))
    })?;
    info!(checklist = %checklist_id, "opened from stored snapshot");
    Ok(checklist)
}

/// Editing state of one checklist: the active zone and parameter, the
/// per-parameter caches and the outbox-backed dispatcher.
pub struct ChecklistSession {
    checklist_id: ChecklistId,
    checklist: Checklist,
    remote: Arc<dyn ChecklistRemote>,
    confirmer: Arc<dyn Confirmer>,
    sequence: Box<dyn ScreenSequence>,
    dispatcher: Dispatcher,
    cache: ParameterCache,
    /// Caches of the zones that are not active, kept until `refresh`.
    parked: BTreeMap<usize, ParameterCache>,
    rules: ValidityRules,
    state: NavigationState,
}

impl ChecklistSession {
    /// Fetch the checklist (or its stored snapshot) and enter `zone_index`.
    pub async fn open(
        checklist_id: ChecklistId,
        deps: SessionDeps,
        config: &EngineConfig,
        zone_index: usize,
        entry: ZoneEntry,
    ) -> Result<Self, EngineError> {
        let checklist = load_checklist(deps.remote.as_ref(), &deps.storage, &checklist_id).await?;
        let dispatcher = Dispatcher::new(
            checklist_id.clone(),
            Arc::clone(&deps.storage),
            Arc::clone(&deps.remote),
            config.backoff(),
        );
        let mut session = Self {
            checklist_id,
            checklist,
            remote: deps.remote,
            confirmer: deps.confirmer,
            sequence: deps.sequence,
            dispatcher,
            cache: ParameterCache::new(),
            parked: BTreeMap::new(),
            rules: config.validity_rules(),
            state: NavigationState::default(),
        };
        session.enter_zone(zone_index, entry)?;
        info!(
            checklist = %session.checklist_id,
            zones = session.checklist.zones.len(),
            "checklist session opened"
        );
        Ok(session)
    }

    pub fn checklist_id(&self) -> &ChecklistId {
        &self.checklist_id
    }

    pub fn checklist(&self) -> &Checklist {
        &self.checklist
    }

    pub fn state(&self) -> NavigationState {
        self.state
    }

    pub fn cache(&self) -> &ParameterCache {
        &self.cache
    }

    pub fn parameter_count(&self) -> usize {
        self.checklist
            .zone(self.state.zone_index)
            .map_or(0, |zone| zone.parameters().len())
    }

    pub fn bounds(&self) -> TabBounds {
        self.sequence
            .bounds(self.state.zone_index, self.checklist.zones.len())
    }

    pub fn active_parameter(&self) -> Option<&Parameter> {
        let index = self.cache.active_index()?;
        self.checklist.zone(self.state.zone_index)?.parameter(index)
    }

    pub fn fields(&self) -> &[FieldViewModel] {
        self.cache.active_fields()
    }

    pub fn field(&self, name: &str) -> Option<&FieldViewModel> {
        self.fields().iter().find(|f| f.name() == name)
    }

    pub fn evaluate(&self) -> Evaluation {
        self.rules.evaluate(self.cache.active_fields())
    }

    pub fn rendered_fields(&self) -> Vec<&FieldViewModel> {
        self.evaluate().rendered_fields(self.cache.active_fields())
    }

    // Selection

    /// Enter a zone tab. Each tab keeps its own cache, so edits made in a
    /// zone are still there when it is entered again.
    pub fn enter_zone(&mut self, zone_index: usize, entry: ZoneEntry) -> Result<(), EngineError> {
        let zone = self
            .checklist
            .zone(zone_index)
            .ok_or(EngineError::ZoneOutOfRange {
                index: zone_index,
                count: self.checklist.zones.len(),
            })?;
        let index = entry.index_in(zone);
        let has_parameters = !zone.parameters().is_empty();
        self.cache.persist_active();
        let outgoing = std::mem::take(&mut self.cache);
        self.parked.insert(self.state.zone_index, outgoing);
        self.cache = self.parked.remove(&zone_index).unwrap_or_default();
        self.state = NavigationState {
            zone_index,
            parameter_index: index,
        };
        if has_parameters {
            self.select_parameter(index)?;
        }
        info!(zone = zone_index, parameter = index, "zone entered");
        Ok(())
    }

    pub fn select_parameter(&mut self, index: usize) -> Result<CacheLoad, EngineError> {
        let zone_index = self.state.zone_index;
        parameter_at(&self.checklist, zone_index, index)?;
        let checklist = &self.checklist;
        let storage = self.dispatcher.storage();
        let checklist_id = &self.checklist_id;
        let load = self.cache.select(index, || {
            seed_fields(checklist, storage, checklist_id, zone_index, index)
        })?;
        self.state.parameter_index = index;
        Ok(load)
    }

    // Field edits

    fn with_field<R>(
        &mut self,
        name: &str,
        f: impl FnOnce(&mut FieldViewModel) -> Result<R, EngineError>,
    ) -> Result<R, EngineError> {
        self.cache
            .mutate_active(|fields| match fields.iter_mut().find(|fld| fld.name() == name) {
                Some(field) => f(field),
                None => Err(EngineError::FieldNotFound(name.to_string())),
            })
    }

    fn send_active(&mut self, name: &str) -> Result<CommitOutcome, EngineError> {
        let Some(answer) = self.field(name).and_then(FieldViewModel::to_answer) else {
            return Ok(CommitOutcome::Skipped);
        };
        let parameter_id = self
            .active_parameter()
            .map(|p| p.id.clone())
            .ok_or_else(|| EngineError::FieldNotFound(name.to_string()))?;
        Ok(CommitOutcome::Sent(
            self.dispatcher.dispatch(&parameter_id, answer)?,
        ))
    }

    pub fn set_text(&mut self, name: &str, value: impl Into<String>) -> Result<(), EngineError> {
        let value = value.into();
        self.with_field(name, |field| match field {
            FieldViewModel::Text(text) => {
                text.value = value;
                Ok(())
            }
            _ => Err(mismatch(name, FieldKind::Text)),
        })
    }

    /// Focus left a text field.
    pub fn commit_text(&mut self, name: &str) -> Result<CommitOutcome, EngineError> {
        self.with_field(name, |field| match field {
            FieldViewModel::Text(_) => Ok(()),
            _ => Err(mismatch(name, FieldKind::Text)),
        })?;
        self.send_active(name)
    }

    /// Pick a radio or select option by value. Sends immediately.
    pub fn select_option(&mut self, name: &str, value: &str) -> Result<CommitOutcome, EngineError> {
        self.with_field(name, |field| {
            let options = match field {
                FieldViewModel::Radio(f) => &mut f.options,
                FieldViewModel::Select(f) => &mut f.options,
                _ => return Err(mismatch(name, FieldKind::Radio)),
            };
            if !options.iter().any(|o| o.value == value) {
                return Err(EngineError::OptionNotFound {
                    field: name.to_string(),
                    value: value.to_string(),
                });
            }
            for option in options.iter_mut() {
                option.selected = option.value == value;
            }
            Ok(())
        })?;
        self.send_active(name)
    }

    pub fn set_checkbox(&mut self, name: &str, checked: bool) -> Result<CommitOutcome, EngineError> {
        self.with_field(name, |field| match field {
            FieldViewModel::Checkbox(f) => {
                f.checked = checked;
                Ok(())
            }
            _ => Err(mismatch(name, FieldKind::Checkbox)),
        })?;
        self.send_active(name)
    }

    pub fn toggle_checkbox(&mut self, name: &str) -> Result<CommitOutcome, EngineError> {
        let checked = match self.field(name) {
            Some(FieldViewModel::Checkbox(f)) => !f.checked,
            Some(_) => return Err(mismatch(name, FieldKind::Checkbox)),
            None => return Err(EngineError::FieldNotFound(name.to_string())),
        };
        self.set_checkbox(name, checked)
    }

    /// Attach a captured photo. Uploading is the capture side's job, so
    /// nothing is sent. Returns the photo count.
    pub fn add_photo(&mut self, name: &str, photo: Photo) -> Result<usize, EngineError> {
        self.with_field(name, |field| match field {
            FieldViewModel::Foto(f) => {
                f.photos.push(photo);
                Ok(f.photos.len())
            }
            _ => Err(mismatch(name, FieldKind::Foto)),
        })
    }

    pub fn remove_photo(&mut self, name: &str, url: &str) -> Result<bool, EngineError> {
        self.with_field(name, |field| match field {
            FieldViewModel::Foto(f) => {
                let before = f.photos.len();
                f.photos.retain(|p| p.url != url);
                Ok(f.photos.len() != before)
            }
            _ => Err(mismatch(name, FieldKind::Foto)),
        })
    }

    pub fn set_tmc_value(
        &mut self,
        name: &str,
        part: TmcPart,
        value: impl Into<String>,
    ) -> Result<(), EngineError> {
        let value = value.into();
        self.with_field(name, |field| match field {
            FieldViewModel::Tmc(f) if !f.is_placeholder() => {
                tmc::edit(f, part, value);
                Ok(())
            }
            _ => Err(mismatch(name, FieldKind::Tmc)),
        })
    }

    /// Focus left a stock sub-value: run the reconciliation check.
    pub fn commit_tmc(&mut self, name: &str, part: TmcPart) -> Result<CommitOutcome, EngineError> {
        let decision = self.with_field(name, |field| match field {
            FieldViewModel::Tmc(f) if !f.is_placeholder() => {
                Ok(tmc::check_commit(&f.label, &f.values, part))
            }
            _ => Err(mismatch(name, FieldKind::Tmc)),
        })?;
        self.decide(name, Some(part), decision)
    }

    pub fn set_pest(&mut self, name: &str, value: impl Into<String>) -> Result<(), EngineError> {
        let value = value.into();
        self.with_field(name, |field| match field {
            FieldViewModel::Pest(f) => {
                f.value = value;
                Ok(())
            }
            _ => Err(mismatch(name, FieldKind::Pest)),
        })
    }

    pub fn commit_pest(&mut self, name: &str) -> Result<CommitOutcome, EngineError> {
        let decision = self.with_field(name, |field| match field {
            FieldViewModel::Pest(f) => Ok(pest::check_commit(f)),
            _ => Err(mismatch(name, FieldKind::Pest)),
        })?;
        self.decide(name, None, decision)
    }

    // Confirmations

    fn decide(
        &mut self,
        name: &str,
        part: Option<TmcPart>,
        decision: Decision,
    ) -> Result<CommitOutcome, EngineError> {
        match decision {
            Decision::Skip => Ok(CommitOutcome::Skipped),
            Decision::Apply(resolution) => self.apply_resolution(
                self.state.zone_index,
                self.state.parameter_index,
                name,
                part,
                &resolution,
                None,
            ),
            Decision::Ask {
                prompt,
                on_confirm,
                on_cancel,
            } => {
                let field = self
                    .field(name)
                    .cloned()
                    .ok_or_else(|| EngineError::FieldNotFound(name.to_string()))?;
                debug!(field = name, ?prompt, "commit waits for confirmation");
                Ok(CommitOutcome::AwaitingConfirmation(PendingConfirmation {
                    zone_index: self.state.zone_index,
                    parameter_index: self.state.parameter_index,
                    field_name: name.to_string(),
                    part,
                    field,
                    prompt,
                    on_confirm,
                    on_cancel,
                }))
            }
        }
    }

    fn cache_for(&mut self, zone_index: usize) -> &mut ParameterCache {
        if zone_index == self.state.zone_index {
            &mut self.cache
        } else {
            self.parked.entry(zone_index).or_default()
        }
    }

    /// Apply a resolution to a field of any parameter. A parameter whose
    /// entry was dropped is seeded again first.
    fn apply_resolution(
        &mut self,
        zone_index: usize,
        parameter_index: usize,
        name: &str,
        part: Option<TmcPart>,
        resolution: &Resolution,
        asked: Option<&FieldViewModel>,
    ) -> Result<CommitOutcome, EngineError> {
        let checklist = &self.checklist;
        let storage = self.dispatcher.storage();
        let checklist_id = &self.checklist_id;
        let cache = if zone_index == self.state.zone_index {
            &mut self.cache
        } else {
            self.parked.entry(zone_index).or_default()
        };
        let seeded = cache.ensure(parameter_index, || {
            seed_fields(checklist, storage, checklist_id, zone_index, parameter_index)
        })?;
        if seeded {
            debug!(
                zone = zone_index,
                parameter = parameter_index,
                field = name,
                "parameter seeded for a late resolution"
            );
        }

        let applied = self
            .cache_for(zone_index)
            .update(parameter_index, |fields| {
                resolve_field(fields, name, part, resolution, asked)
            });
        let Some(answer) = applied.flatten() else {
            return Err(EngineError::FieldNotFound(name.to_string()));
        };

        match (answer, resolution) {
            (Some(answer), _) => {
                let parameter_id = parameter_at(&self.checklist, zone_index, parameter_index)?
                    .id
                    .clone();
                Ok(CommitOutcome::Sent(
                    self.dispatcher.dispatch(&parameter_id, answer)?,
                ))
            }
            (None, Resolution::Clamp { part, value }) => {
                info!(field = name, part = part.suffix(), %value, "stock value corrected");
                Ok(CommitOutcome::Corrected)
            }
            (None, Resolution::ResetPest) => {
                info!(field = name, "pest count reset");
                Ok(CommitOutcome::Reset)
            }
            (None, Resolution::Send) => Ok(CommitOutcome::Skipped),
        }
    }

    /// Finish a commit that was waiting on the user, wherever the user has
    /// navigated since.
    pub fn resolve_confirmation(
        &mut self,
        pending: &PendingConfirmation,
        answer: Confirmation,
    ) -> Result<CommitOutcome, EngineError> {
        debug!(field = %pending.field_name, ?answer, "confirmation answered");
        let resolution = pending.resolution(answer).clone();
        self.apply_resolution(
            pending.zone_index,
            pending.parameter_index,
            &pending.field_name,
            pending.part,
            &resolution,
            Some(&pending.field),
        )
    }

    /// Ask the confirmer and apply its answer.
    pub async fn settle_confirmation(
        &mut self,
        pending: PendingConfirmation,
    ) -> Result<CommitOutcome, EngineError> {
        let answer = self.confirmer.confirm(pending.prompt.clone()).await;
        self.resolve_confirmation(&pending, answer)
    }

    /// Pass-through for settled outcomes; asks the confirmer otherwise.
    pub async fn confirm_outcome(
        &mut self,
        outcome: CommitOutcome,
    ) -> Result<CommitOutcome, EngineError> {
        match outcome {
            CommitOutcome::AwaitingConfirmation(pending) => self.settle_confirmation(pending).await,
            other => Ok(other),
        }
    }

    // Navigation

    pub async fn next(&mut self) -> Result<Transition, EngineError> {
        let step = self.state.next_step(self.parameter_count(), self.bounds());
        self.transition(step).await
    }

    pub async fn previous(&mut self) -> Result<Transition, EngineError> {
        let step = self.state.previous_step(self.bounds());
        self.transition(step).await
    }

    async fn transition(&mut self, step: Step) -> Result<Transition, EngineError> {
        if step == Step::Stay {
            debug!(zone = self.state.zone_index, "no further parameter");
            return Ok(Transition {
                step,
                warned: false,
            });
        }

        // The warning is advisory: any answer proceeds.
        let warned = !self.evaluate().valid;
        if warned {
            warn!(
                zone = self.state.zone_index,
                parameter = self.state.parameter_index,
                "leaving an incomplete parameter"
            );
            let dismissed = self.confirmer.confirm(Prompt::IncompleteParameter).await;
            debug!(?dismissed, "incomplete parameter warning closed");
        }

        self.cache.persist_active();
        if let Err(err) = self.reload().await {
            warn!(%err, "refresh after transition failed, keeping current schema");
        }

        let from_zone = self.state.zone_index;
        match step {
            Step::Parameter(index) => {
                let index = index.min(self.parameter_count().saturating_sub(1));
                self.select_parameter(index)?;
            }
            Step::NextTab => {
                self.sequence.on_next_tab(from_zone);
                self.enter_zone(from_zone + 1, ZoneEntry::First)?;
            }
            Step::PreviousTab => {
                self.sequence.on_previous_tab(from_zone);
                self.enter_zone(from_zone.saturating_sub(1), ZoneEntry::Last)?;
            }
            Step::Stay => {}
        }
        info!(
            zone = self.state.zone_index,
            parameter = self.state.parameter_index,
            ?step,
            warned,
            "navigated"
        );
        Ok(Transition { step, warned })
    }

    /// Fetch the checklist and swap in the fresh schema. Cached parameters
    /// keep their entries; only unvisited ones seed from the new schema.
    async fn reload(&mut self) -> Result<(), EngineError> {
        let checklist = fetch_checklist(
            self.remote.as_ref(),
            self.dispatcher.storage(),
            &self.checklist_id,
        )
        .await?;
        self.checklist = checklist;
        self.sequence.on_reload();
        debug!(checklist = %self.checklist_id, "checklist refetched");
        Ok(())
    }

    /// Re-fetch the checklist and rebuild every parameter from it. Returns
    /// the cache indexes of the active zone that were dropped. On failure
    /// schema and caches stay as they were.
    pub async fn refresh(&mut self) -> Result<Vec<usize>, EngineError> {
        if let Err(err) = self.reload().await {
            warn!(checklist = %self.checklist_id, %err, "refresh failed");
            return Err(err);
        }
        let dropped = self.cache.invalidate();
        self.parked.clear();
        info!(checklist = %self.checklist_id, dropped = dropped.len(), "checklist refreshed");
        let count = self.parameter_count();
        if count > 0 {
            self.select_parameter(self.state.parameter_index.min(count - 1))?;
        }
        Ok(dropped)
    }

    // Delivery

    pub async fn settle(&mut self) {
        self.dispatcher.settle().await;
    }

    pub async fn flush(&mut self, now_ms: u64) -> Result<FlushReport, EngineError> {
        self.dispatcher.flush(now_ms).await
    }

    /// Flush against the wall clock.
    pub async fn flush_due(&mut self) -> Result<FlushReport, EngineError> {
        self.dispatcher.flush_due().await
    }

    pub fn pending_count(&self) -> Result<u64, EngineError> {
        self.dispatcher.pending_count()
    }
}
