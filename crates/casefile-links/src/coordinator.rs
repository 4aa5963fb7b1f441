use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use casefile_attachments::{AttachmentManager, AttachmentOwner, AttachmentStore, MaterializeReport};
use casefile_ledger::{AuditRecorder, AuditWriter};
use casefile_store::{RecordStore, StoreError, WriteOp};
use casefile_types::{
    is_blob_path, Actor, AuditAction, AuditStamp, Case, CaseDraft, CaseId, EntityType,
    ExhibitDraft, ProfileImageChange, ReferenceNumber, Suspect, SuspectDraft, SuspectId, TypeError,
};
use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::config::CoordinatorConfig;
use crate::delta::{LinkDelta, LinkPlan};
use crate::error::{CoordinatorError, CoordinatorResult};
use crate::matcher::AutoLinkMatcher;
use crate::report::{DeleteOutcome, DeltaOutcome, LinkPropagationError, PropagationReport};

/// A saved case together with what happened to its secondary effects.
#[derive(Clone, Debug)]
pub struct CaseWrite {
    pub case: Case,
    /// Suspect-side link propagation.
    pub propagation: PropagationReport,
    /// Pending-capture materialization, one outcome per exhibit.
    pub exhibits: MaterializeReport,
}

impl CaseWrite {
    pub fn into_case(self) -> Case {
        self.case
    }
}

/// Result of [`CrossLinkCoordinator::link_suspect_by_reference_number`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkResult {
    Linked,
    AlreadyLinked,
    /// No case carries the reference yet. The suspect keeps the declaration.
    CaseNotFound,
}

/// A link request's case-side result plus what happened on the suspect side.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinkOutcome {
    pub result: LinkResult,
    /// Empty when the suspect already carried the reference.
    pub propagation: PropagationReport,
}

impl LinkOutcome {
    fn case_not_found() -> Self {
        Self {
            result: LinkResult::CaseNotFound,
            propagation: PropagationReport::default(),
        }
    }
}

/// Keeps cases and suspects mutually linked across every mutation.
///
/// Each operation writes the primary record first and then carries out
/// secondary effects (link propagation, blob cleanup, audit) one by one.
/// Secondary failures are logged and reported; they never undo the primary
/// write.
#[derive(Clone)]
pub struct CrossLinkCoordinator {
    store: Arc<dyn RecordStore>,
    attachments: AttachmentManager,
    audit: AuditRecorder,
    config: CoordinatorConfig,
}

impl CrossLinkCoordinator {
    pub fn new(
        store: Arc<dyn RecordStore>,
        attachment_store: Arc<dyn AttachmentStore>,
        ledger: Arc<dyn AuditWriter>,
        config: CoordinatorConfig,
    ) -> Self {
        Self {
            store,
            attachments: AttachmentManager::new(attachment_store),
            audit: AuditRecorder::new(ledger),
            config,
        }
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub fn attachments(&self) -> &AttachmentManager {
        &self.attachments
    }

    pub fn matcher(&self) -> AutoLinkMatcher {
        AutoLinkMatcher::new(self.store.clone())
    }

    /// Reserve an id for a case that is about to be created, so exhibits can
    /// be uploaded under its prefix before the case is saved.
    pub fn reserve_case_id(&self) -> CaseId {
        self.store.allocate_case_id()
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub async fn get_case(&self, id: &CaseId) -> CoordinatorResult<Case> {
        self.store
            .get_case(id)
            .await?
            .ok_or_else(|| not_found("case", id.as_str()))
    }

    pub async fn get_suspect(&self, id: &SuspectId) -> CoordinatorResult<Suspect> {
        self.store
            .get_suspect(id)
            .await?
            .ok_or_else(|| not_found("suspect", id.as_str()))
    }

    pub async fn list_cases(&self) -> CoordinatorResult<Vec<Case>> {
        Ok(self.store.list_cases().await?)
    }

    pub async fn list_suspects(&self) -> CoordinatorResult<Vec<Suspect>> {
        Ok(self.store.list_suspects().await?)
    }

    // -----------------------------------------------------------------------
    // Cases
    // -----------------------------------------------------------------------

    pub async fn create_case(&self, draft: CaseDraft, actor: &Actor) -> CoordinatorResult<CaseWrite> {
        let id = self.store.allocate_case_id();
        self.create_case_with_id(id, draft, actor).await
    }

    /// Create a case under an id from [`Self::reserve_case_id`].
    pub async fn create_case_with_id(
        &self,
        id: CaseId,
        draft: CaseDraft,
        actor: &Actor,
    ) -> CoordinatorResult<CaseWrite> {
        let reference = self.validate_reference(&draft)?;
        if self.store.get_case(&id).await?.is_some() {
            return Err(CoordinatorError::validation(
                "id",
                format!("case id {id} is already in use"),
            ));
        }
        if let Some(existing) = self.store.find_case_by_reference(&reference).await? {
            debug!(%reference, existing = %existing.id, "duplicate reference number");
            return Err(CoordinatorError::validation(
                "reference_number",
                format!("R.O. {reference} is already assigned to another case"),
            ));
        }
        validate_exhibits(&id, &draft.exhibits)?;

        let now = Utc::now();
        let CaseDraft {
            offence,
            brief_facts,
            assigned_investigator,
            status,
            priority,
            date_reported,
            date_occurred,
            location_of_offence,
            complainant,
            witnesses,
            suspect_links,
            exhibits,
            ..
        } = draft;
        let materialized = self.attachments.materialize_all(exhibits, &id, now).await;

        let case = Case {
            id: id.clone(),
            reference_number: reference,
            offence,
            brief_facts,
            assigned_investigator,
            status,
            priority,
            date_reported: date_reported.unwrap_or(now),
            date_occurred,
            location_of_offence,
            complainant,
            witnesses,
            suspect_links,
            exhibits: materialized.outcomes.iter().map(|o| o.exhibit.clone()).collect(),
            stamp: AuditStamp::new(actor, now),
        };
        self.store.put_case(&case).await?;
        info!(case = %case.id, %reference, suspects = case.suspect_links.len(), "case created");

        self.audit
            .record(
                AuditAction::Create,
                EntityType::Case,
                case.id.as_str(),
                &reference.to_string(),
                actor,
                format!(
                    "Case record created: R.O. {reference}. Exhibits: {}. Suspects linked: {}.",
                    case.exhibits.len(),
                    case.suspect_links.len()
                ),
            )
            .await;

        let propagation = self
            .propagate_links(&LinkPlan::for_created_case(&case), actor, now)
            .await;
        Ok(CaseWrite {
            case,
            propagation,
            exhibits: materialized,
        })
    }

    /// Replace a case's contents.
    ///
    /// The reference number cannot change. Exhibits dropped by the draft have
    /// their blobs deleted before anything is written; if one of those
    /// deletions fails the update is abandoned and the stored case is left
    /// as it was.
    pub async fn update_case(
        &self,
        id: &CaseId,
        draft: CaseDraft,
        actor: &Actor,
    ) -> CoordinatorResult<CaseWrite> {
        let old = self.get_case(id).await?;
        let reference = self.validate_reference(&draft)?;
        if reference != old.reference_number {
            return Err(CoordinatorError::validation(
                "reference_number",
                format!(
                    "R.O. {} cannot be changed once assigned",
                    old.reference_number
                ),
            ));
        }
        validate_exhibits(id, &draft.exhibits)?;

        let kept: HashSet<&str> = draft
            .exhibits
            .iter()
            .filter(|e| is_blob_path(&e.storage_path))
            .map(|e| e.storage_path.as_str())
            .collect();
        for path in old.blob_paths().filter(|p| !kept.contains(p)) {
            self.attachments
                .delete(path)
                .await
                .map_err(CoordinatorError::Deletion)?;
        }

        let now = Utc::now();
        let CaseDraft {
            offence,
            brief_facts,
            assigned_investigator,
            status,
            priority,
            date_reported,
            date_occurred,
            location_of_offence,
            complainant,
            witnesses,
            suspect_links,
            exhibits,
            ..
        } = draft;
        let materialized = self.attachments.materialize_all(exhibits, id, now).await;

        let mut stamp = old.stamp.clone();
        stamp.touch(actor, now);
        let case = Case {
            id: id.clone(),
            reference_number: reference,
            offence,
            brief_facts,
            assigned_investigator,
            status,
            priority,
            date_reported: date_reported.unwrap_or(old.date_reported),
            date_occurred,
            location_of_offence,
            complainant,
            witnesses,
            suspect_links,
            exhibits: materialized.outcomes.iter().map(|o| o.exhibit.clone()).collect(),
            stamp,
        };
        self.store.put_case(&case).await?;
        info!(case = %id, %reference, "case updated");

        self.audit
            .record(
                AuditAction::Update,
                EntityType::Case,
                id.as_str(),
                &reference.to_string(),
                actor,
                format!(
                    "Case record R.O. {reference} updated. Exhibits: {}. Suspects linked: {}.",
                    case.exhibits.len(),
                    case.suspect_links.len()
                ),
            )
            .await;

        let propagation = self
            .propagate_links(&LinkPlan::for_updated_case(&old, &case), actor, now)
            .await;
        Ok(CaseWrite {
            case,
            propagation,
            exhibits: materialized,
        })
    }

    pub async fn delete_case(&self, id: &CaseId, actor: &Actor) -> CoordinatorResult<DeleteOutcome> {
        let case = self.get_case(id).await?;
        let reference = case.reference_number;
        let now = Utc::now();

        let plan = LinkPlan::for_deleted_case(&case);
        let mut names = BTreeMap::new();
        let mut report = PropagationReport::default();
        let mut ops = Vec::new();
        let mut batched = Vec::new();
        for delta in plan.deltas {
            match self.store.get_suspect(&delta.suspect_id).await {
                Ok(Some(suspect)) => {
                    names.insert(suspect.id.clone(), suspect.display_name().to_string());
                    ops.push(delta.suspect_side_op(actor, now));
                    batched.push(delta);
                }
                Ok(None) => {
                    warn!(case = %id, suspect = %delta.suspect_id, "linked suspect missing; nothing to unlink");
                    report.push(delta, DeltaOutcome::SkippedMissing);
                }
                Err(e) => {
                    error!(case = %id, suspect = %delta.suspect_id, error = %e, "could not read linked suspect");
                    report.push(delta.clone(), failed(delta, &e));
                }
            }
        }

        if let Err(e) = self.apply_unlink_batch(&ops, batched, &mut report).await {
            error!(case = %id, error = %e, "unlinking suspects failed; case kept");
            return Ok(DeleteOutcome {
                success: false,
                message: Some(format!(
                    "Case R.O. {reference} was not deleted: its suspects could not be unlinked."
                )),
                report,
                blob_failures: Vec::new(),
            });
        }

        if let Err(e) = self.store.delete_case(id).await {
            error!(case = %id, error = %e, "case document deletion failed");
            return Ok(DeleteOutcome {
                success: false,
                message: Some(format!("Failed to delete case R.O. {reference}.")),
                report,
                blob_failures: Vec::new(),
            });
        }
        info!(case = %id, %reference, "case deleted");

        let mut blob_failures = Vec::new();
        for path in case.blob_paths() {
            if let Err(e) = self.attachments.delete(path).await {
                warn!(case = %id, path, error = %e, "exhibit blob deletion failed");
                blob_failures.push(path.to_string());
            }
        }

        self.audit
            .record(
                AuditAction::Delete,
                EntityType::Case,
                id.as_str(),
                &reference.to_string(),
                actor,
                format!(
                    "Case record R.O. {reference} (ID: {id}) and associated exhibits permanently deleted."
                ),
            )
            .await;
        for delta in report.changed() {
            let name = names
                .get(&delta.suspect_id)
                .map(String::as_str)
                .unwrap_or(delta.suspect_id.as_str());
            self.audit
                .record(
                    AuditAction::Update,
                    EntityType::Suspect,
                    delta.suspect_id.as_str(),
                    name,
                    actor,
                    format!("Suspect record updated: Unlinked from deleted Case R.O. {reference}."),
                )
                .await;
        }

        let message = (!blob_failures.is_empty() || !report.is_clean()).then(|| {
            format!(
                "Case R.O. {reference} deleted, but {} exhibit file(s) and {} suspect link(s) could not be cleaned up.",
                blob_failures.len(),
                report.failed().count()
            )
        });
        Ok(DeleteOutcome {
            success: true,
            message,
            report,
            blob_failures,
        })
    }

    // -----------------------------------------------------------------------
    // Suspects
    // -----------------------------------------------------------------------

    pub async fn create_suspect(&self, draft: SuspectDraft, actor: &Actor) -> CoordinatorResult<Suspect> {
        let declared = parse_declared_reference(draft.linked_reference_number.as_deref())?;
        let id = self.store.allocate_suspect_id();
        let now = Utc::now();

        let profile_image = match &draft.profile_image {
            ProfileImageChange::Replace { data_uri } => {
                match self.attachments.upload_profile_image(&id, data_uri).await {
                    Ok(image) => Some(image),
                    Err(e) => {
                        warn!(suspect = %id, error = %e, "profile image upload failed; saving without image");
                        None
                    }
                }
            }
            ProfileImageChange::Keep | ProfileImageChange::Clear => None,
        };

        let mut suspect = suspect_from_draft(id, draft, AuditStamp::new(actor, now));
        suspect.profile_image = profile_image;
        if let Some(reference) = declared {
            suspect.linked_case_reference_numbers.insert(reference.to_string());
        }
        self.store.put_suspect(&suspect).await?;
        info!(suspect = %suspect.id, "suspect created");

        let name = suspect.display_name().to_string();
        let mut details = format!("Suspect record created for {name}.");
        if suspect.profile_image.is_some() {
            details.push_str(" Profile image uploaded.");
        }
        self.audit
            .record(
                AuditAction::Create,
                EntityType::Suspect,
                suspect.id.as_str(),
                &name,
                actor,
                details,
            )
            .await;

        if let Some(reference) = declared {
            self.link_declared_reference(reference, &suspect, actor).await;
        }
        Ok(suspect)
    }

    pub async fn update_suspect(
        &self,
        id: &SuspectId,
        draft: SuspectDraft,
        actor: &Actor,
    ) -> CoordinatorResult<Suspect> {
        let old = self.get_suspect(id).await?;
        let declared = parse_declared_reference(draft.linked_reference_number.as_deref())?;

        // The old blob is only dropped once the new document is stored.
        let (profile_image, image_note) = match &draft.profile_image {
            ProfileImageChange::Keep => (old.profile_image.clone(), None),
            ProfileImageChange::Clear => {
                (None, old.profile_image.as_ref().map(|_| "Profile image removed."))
            }
            ProfileImageChange::Replace { data_uri } => {
                let image = self
                    .attachments
                    .upload_profile_image(id, data_uri)
                    .await
                    .map_err(CoordinatorError::Upload)?;
                (Some(image), Some("Profile image updated."))
            }
        };
        let replaced = matches!(draft.profile_image, ProfileImageChange::Replace { .. });

        let now = Utc::now();
        let mut stamp = old.stamp.clone();
        stamp.touch(actor, now);
        let mut suspect = suspect_from_draft(id.clone(), draft, stamp);
        suspect.profile_image = profile_image;
        suspect.linked_case_reference_numbers = old.linked_case_reference_numbers.clone();
        let mut newly_declared = None;
        if let Some(reference) = declared {
            if suspect
                .linked_case_reference_numbers
                .insert(reference.to_string())
            {
                newly_declared = Some(reference);
            }
        }
        if let Err(e) = self.store.put_suspect(&suspect).await {
            if let Some(image) = suspect.profile_image.as_ref().filter(|_| replaced) {
                self.delete_profile_image(id, &image.storage_path).await;
            }
            return Err(e.into());
        }
        info!(suspect = %id, "suspect updated");

        if image_note.is_some() {
            if let Some(previous) = &old.profile_image {
                self.delete_profile_image(id, &previous.storage_path).await;
            }
        }

        let name = suspect.display_name().to_string();
        let details = match image_note {
            Some(note) => format!("Suspect record updated. {note} For {name}."),
            None => format!("Suspect record updated. For {name}."),
        };
        self.audit
            .record(AuditAction::Update, EntityType::Suspect, id.as_str(), &name, actor, details)
            .await;

        if let Some(reference) = newly_declared {
            self.link_declared_reference(reference, &suspect, actor).await;
        }
        Ok(suspect)
    }

    /// Delete a suspect, its profile image and every case link to it.
    ///
    /// `display_name` is what the audit trail records for the suspect.
    pub async fn delete_suspect(
        &self,
        id: &SuspectId,
        display_name: &str,
        actor: &Actor,
    ) -> CoordinatorResult<DeleteOutcome> {
        let suspect = self.get_suspect(id).await?;
        let now = Utc::now();

        let mut report = PropagationReport::default();
        let cases = match self.store.find_cases_linking_suspect(id).await {
            Ok(cases) => cases,
            Err(e) => {
                error!(suspect = %id, error = %e, "could not find cases linking suspect; suspect kept");
                return Ok(DeleteOutcome {
                    success: false,
                    message: Some(format!(
                        "Suspect {display_name} was not deleted: linked cases could not be read."
                    )),
                    report,
                    blob_failures: Vec::new(),
                });
            }
        };
        let plan = LinkPlan::for_deleted_suspect(id, &cases);
        let ops: Vec<WriteOp> = plan
            .deltas
            .iter()
            .map(|d| d.case_side_op(actor, now))
            .collect();
        if let Err(e) = self.apply_unlink_batch(&ops, plan.deltas, &mut report).await {
            error!(suspect = %id, error = %e, "unlinking cases failed; suspect kept");
            return Ok(DeleteOutcome {
                success: false,
                message: Some(format!(
                    "Suspect {display_name} was not deleted: linked cases could not be updated."
                )),
                report,
                blob_failures: Vec::new(),
            });
        }

        if let Err(e) = self.store.delete_suspect(id).await {
            error!(suspect = %id, error = %e, "suspect document deletion failed");
            return Ok(DeleteOutcome {
                success: false,
                message: Some(format!("Failed to delete suspect {display_name}.")),
                report,
                blob_failures: Vec::new(),
            });
        }
        info!(suspect = %id, cases = cases.len(), "suspect deleted");

        let mut blob_failures = Vec::new();
        if let Some(image) = &suspect.profile_image {
            if !self.delete_profile_image(id, &image.storage_path).await {
                blob_failures.push(image.storage_path.clone());
            }
        }

        self.audit
            .record(
                AuditAction::Delete,
                EntityType::Suspect,
                id.as_str(),
                display_name,
                actor,
                format!(
                    "Suspect record permanently deleted for {display_name} (ID: {id}). Profile image (if any) and case links removed."
                ),
            )
            .await;
        for delta in report.changed() {
            self.audit
                .record(
                    AuditAction::Update,
                    EntityType::Case,
                    delta.case_id.as_str(),
                    &delta.reference.to_string(),
                    actor,
                    format!(
                        "Case record R.O. {} updated: Suspect {display_name} (ID: {id}) unlinked after suspect deletion.",
                        delta.reference
                    ),
                )
                .await;
        }

        let message = (!blob_failures.is_empty()).then(|| {
            format!("Suspect {display_name} deleted, but the profile image could not be removed.")
        });
        Ok(DeleteOutcome {
            success: true,
            message,
            report,
            blob_failures,
        })
    }

    /// Link a suspect to the case carrying `reference`, on both sides.
    ///
    /// A reference no case carries yet is not an error; the suspect simply
    /// keeps the declaration.
    pub async fn link_suspect_by_reference_number(
        &self,
        reference: &str,
        suspect_id: &SuspectId,
        actor: &Actor,
    ) -> CoordinatorResult<LinkOutcome> {
        let reference = parse_declared_reference(Some(reference))?.ok_or_else(|| {
            CoordinatorError::validation("linked_reference_number", "reference number is empty")
        })?;
        let suspect = self.get_suspect(suspect_id).await?;
        self.link_to_case(reference, &suspect, actor).await
    }

    // -----------------------------------------------------------------------
    // Secondary effects
    // -----------------------------------------------------------------------

    async fn link_declared_reference(&self, reference: ReferenceNumber, suspect: &Suspect, actor: &Actor) {
        match self.link_to_case(reference, suspect, actor).await {
            Ok(outcome) if !outcome.propagation.is_clean() => {
                warn!(suspect = %suspect.id, %reference, "declared case linked on the case side only");
            }
            Ok(_) => {}
            Err(e) => {
                warn!(suspect = %suspect.id, %reference, error = %e, "linking declared case failed");
            }
        }
    }

    async fn link_to_case(
        &self,
        reference: ReferenceNumber,
        suspect: &Suspect,
        actor: &Actor,
    ) -> CoordinatorResult<LinkOutcome> {
        let Some(case) = self.store.find_case_by_reference(&reference).await? else {
            info!(suspect = %suspect.id, %reference, "no case with declared reference yet");
            return Ok(LinkOutcome::case_not_found());
        };

        let now = Utc::now();
        let delta = LinkDelta::link(&case, suspect.id.clone());
        let added = match self.store.apply(&delta.case_side_op(actor, now)).await {
            Ok(changed) => changed,
            Err(StoreError::NotFound { .. }) => {
                info!(suspect = %suspect.id, %reference, "case vanished before linking");
                return Ok(LinkOutcome::case_not_found());
            }
            Err(e) => {
                return Err(LinkPropagationError {
                    delta,
                    reason: e.to_string(),
                }
                .into())
            }
        };

        let name = suspect.display_name();
        if added {
            info!(case = %case.id, suspect = %suspect.id, %reference, "suspect linked to case");
            self.audit
                .record(
                    AuditAction::Update,
                    EntityType::Case,
                    case.id.as_str(),
                    &reference.to_string(),
                    actor,
                    format!(
                        "Case updated: Suspect {name} (ID: {}) automatically linked via R.O. {reference} specified in suspect form.",
                        suspect.id
                    ),
                )
                .await;
        } else {
            debug!(case = %case.id, suspect = %suspect.id, "already linked");
        }

        let mut propagation = PropagationReport::default();
        if !suspect
            .linked_case_reference_numbers
            .contains(&reference.to_string())
        {
            let outcome = match self.store.apply(&delta.suspect_side_op(actor, now)).await {
                Ok(changed) => {
                    if changed {
                        self.audit
                            .record(
                                AuditAction::Update,
                                EntityType::Suspect,
                                suspect.id.as_str(),
                                name,
                                actor,
                                format!("Suspect record updated: Linked to Case R.O. {reference}."),
                            )
                            .await;
                    }
                    DeltaOutcome::Applied { changed }
                }
                Err(StoreError::NotFound { .. }) => {
                    warn!(suspect = %suspect.id, %reference, "suspect vanished while linking");
                    DeltaOutcome::SkippedMissing
                }
                Err(e) => {
                    error!(suspect = %suspect.id, %reference, error = %e, "suspect side of link failed");
                    failed(delta.clone(), &e)
                }
            };
            propagation.push(delta, outcome);
        }

        let result = if added {
            LinkResult::Linked
        } else {
            LinkResult::AlreadyLinked
        };
        Ok(LinkOutcome {
            result,
            propagation,
        })
    }

    /// Add the case's reference to every suspect a plan links, one
    /// independent write per suspect.
    async fn propagate_links(&self, plan: &LinkPlan, actor: &Actor, at: DateTime<Utc>) -> PropagationReport {
        let mut report = PropagationReport::default();
        for delta in &plan.deltas {
            let suspect = match self.store.get_suspect(&delta.suspect_id).await {
                Ok(Some(s)) => s,
                Ok(None) => {
                    warn!(suspect = %delta.suspect_id, reference = %delta.reference, "linked suspect missing; skipped");
                    report.push(delta.clone(), DeltaOutcome::SkippedMissing);
                    continue;
                }
                Err(e) => {
                    error!(suspect = %delta.suspect_id, error = %e, "link propagation read failed");
                    report.push(delta.clone(), failed(delta.clone(), &e));
                    continue;
                }
            };

            match self.store.apply(&delta.suspect_side_op(actor, at)).await {
                Ok(false) => report.push(delta.clone(), DeltaOutcome::Applied { changed: false }),
                Ok(true) => {
                    self.audit
                        .record(
                            AuditAction::Update,
                            EntityType::Suspect,
                            suspect.id.as_str(),
                            suspect.display_name(),
                            actor,
                            format!(
                                "Suspect record updated: Automatically linked to Case R.O. {}.",
                                delta.reference
                            ),
                        )
                        .await;
                    report.push(delta.clone(), DeltaOutcome::Applied { changed: true });
                }
                Err(StoreError::NotFound { .. }) => {
                    warn!(suspect = %delta.suspect_id, "suspect vanished during propagation; skipped");
                    report.push(delta.clone(), DeltaOutcome::SkippedMissing);
                }
                Err(e) => {
                    error!(suspect = %delta.suspect_id, reference = %delta.reference, error = %e, "link propagation failed");
                    report.push(delta.clone(), failed(delta.clone(), &e));
                }
            }
        }
        if !report.is_clean() {
            warn!(failed = report.failed().count(), "link propagation incomplete");
        }
        report
    }

    /// Apply unlink ops as one batch and record one outcome per delta.
    async fn apply_unlink_batch(
        &self,
        ops: &[WriteOp],
        deltas: Vec<LinkDelta>,
        report: &mut PropagationReport,
    ) -> Result<(), StoreError> {
        if ops.is_empty() {
            return Ok(());
        }
        match self.store.apply_batch(ops).await {
            Ok(changed) => {
                for (delta, changed) in deltas.into_iter().zip(changed) {
                    report.push(delta, DeltaOutcome::Applied { changed });
                }
                Ok(())
            }
            Err(e) => {
                for delta in deltas {
                    report.push(delta.clone(), failed(delta, &e));
                }
                Err(e)
            }
        }
    }

    /// Returns false when the blob could not be deleted.
    async fn delete_profile_image(&self, id: &SuspectId, path: &str) -> bool {
        match self.attachments.delete(path).await {
            Ok(_) => true,
            Err(e) => {
                warn!(suspect = %id, path, error = %e, "profile image deletion failed");
                false
            }
        }
    }

    fn validate_reference(&self, draft: &CaseDraft) -> CoordinatorResult<ReferenceNumber> {
        let cfg = &self.config;
        let sequence = draft
            .sequence
            .ok_or_else(|| CoordinatorError::validation("sequence", "is required"))?;
        if sequence <= 0 || sequence > cfg.max_sequence {
            return Err(CoordinatorError::validation(
                "sequence",
                format!("must be between 1 and {}", cfg.max_sequence),
            ));
        }
        let year = draft
            .year
            .ok_or_else(|| CoordinatorError::validation("year", "is required"))?;
        if year < cfg.min_year || year > cfg.max_year {
            return Err(CoordinatorError::validation(
                "year",
                format!("must be between {} and {}", cfg.min_year, cfg.max_year),
            ));
        }
        let sequence = u32::try_from(sequence)
            .map_err(|_| CoordinatorError::validation("sequence", "is out of range"))?;
        let year = u16::try_from(year)
            .map_err(|_| CoordinatorError::validation("year", "is out of range"))?;
        ReferenceNumber::new(sequence, year)
            .map_err(|e| CoordinatorError::validation("reference_number", e.to_string()))
    }
}

impl std::fmt::Debug for CrossLinkCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrossLinkCoordinator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn not_found(entity: &'static str, id: &str) -> CoordinatorError {
    CoordinatorError::NotFound {
        entity,
        id: id.to_string(),
    }
}

fn failed(delta: LinkDelta, e: &StoreError) -> DeltaOutcome {
    DeltaOutcome::Failed(LinkPropagationError {
        delta,
        reason: e.to_string(),
    })
}

fn parse_declared_reference(raw: Option<&str>) -> CoordinatorResult<Option<ReferenceNumber>> {
    match raw.map(str::trim).filter(|r| !r.is_empty()) {
        None => Ok(None),
        Some(r) => r
            .parse::<ReferenceNumber>()
            .map(Some)
            .map_err(|e: TypeError| {
                CoordinatorError::validation("linked_reference_number", e.to_string())
            }),
    }
}

/// Exhibit ids are unique within the case, and every stored blob lives under
/// the case's own prefix and is referenced once.
fn validate_exhibits(case_id: &CaseId, exhibits: &[ExhibitDraft]) -> CoordinatorResult<()> {
    let owner = AttachmentOwner::CaseExhibit(case_id.clone());
    let mut ids = HashSet::new();
    let mut paths = HashSet::new();
    for exhibit in exhibits {
        if let Some(id) = &exhibit.id {
            if !ids.insert(id.as_str()) {
                return Err(CoordinatorError::validation(
                    "exhibits",
                    format!("exhibit id {id} appears more than once"),
                ));
            }
        }
        if exhibit.is_pending_capture || !is_blob_path(&exhibit.storage_path) {
            continue;
        }
        if !owner.owns(&exhibit.storage_path) {
            return Err(CoordinatorError::validation(
                "exhibits",
                format!("exhibit {} is not stored under this case", exhibit.name),
            ));
        }
        if !paths.insert(exhibit.storage_path.as_str()) {
            return Err(CoordinatorError::validation(
                "exhibits",
                format!("exhibit file {} is referenced twice", exhibit.storage_path),
            ));
        }
    }
    Ok(())
}

fn suspect_from_draft(id: SuspectId, draft: SuspectDraft, stamp: AuditStamp) -> Suspect {
    Suspect {
        id,
        full_name: draft.full_name.trim().to_string(),
        nickname: draft.nickname,
        gender: draft.gender,
        date_of_birth: draft.date_of_birth,
        nationality: draft.nationality,
        occupation: draft.occupation,
        phone_numbers: draft.phone_numbers,
        offences: draft.offences,
        custody_status: draft.custody_status,
        custody_location: draft.custody_location,
        linked_case_reference_numbers: Default::default(),
        profile_image: None,
        stamp,
    }
}
