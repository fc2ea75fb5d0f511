use cbe_schemas::{derive_id, ErrorClass};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::{detect_changes, ChangeCandidate, FieldDescriptor, FieldValue, Snapshot};

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum AuditError {
    #[error("audit: attribution must be non-empty")]
    EmptyAttribution,
    #[error("audit: a change source is required")]
    MissingSource,
    #[error("audit: unknown change source {value:?}")]
    UnknownSource { value: String },
    #[error("audit: {operation} not allowed while session is {state}")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },
    #[error("audit: field {field} expects {expected}")]
    FieldTypeMismatch { field: String, expected: &'static str },
    #[error("audit: unknown field {field}")]
    UnknownField { field: String },
}

impl AuditError {
    pub fn class(&self) -> ErrorClass {
        ErrorClass::Validation
    }
}

/// How the customer's change request reached the business.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeSource {
    Phone,
    Email,
    PortalRequest,
    InPerson,
    InternalAdjustment,
}

impl ChangeSource {
    pub const ALL: [ChangeSource; 5] = [
        ChangeSource::Phone,
        ChangeSource::Email,
        ChangeSource::PortalRequest,
        ChangeSource::InPerson,
        ChangeSource::InternalAdjustment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeSource::Phone => "phone",
            ChangeSource::Email => "email",
            ChangeSource::PortalRequest => "portal_request",
            ChangeSource::InPerson => "in_person",
            ChangeSource::InternalAdjustment => "internal_adjustment",
        }
    }

    /// Wording used in customer summaries ("via phone call").
    pub fn phrase(&self) -> &'static str {
        match self {
            ChangeSource::Phone => "phone call",
            ChangeSource::Email => "email",
            ChangeSource::PortalRequest => "portal request",
            ChangeSource::InPerson => "in-person meeting",
            ChangeSource::InternalAdjustment => "internal adjustment",
        }
    }
}

impl fmt::Display for ChangeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accepts `portal_request`, `portal-request` and `Portal Request` alike.
impl FromStr for ChangeSource {
    type Err = AuditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let norm = s.trim().to_ascii_lowercase().replace([' ', '-'], "_");
        ChangeSource::ALL
            .into_iter()
            .find(|src| src.as_str() == norm)
            .ok_or_else(|| AuditError::UnknownSource {
                value: s.to_string(),
            })
    }
}

/// Parent entity of a change (customer, event order, ...).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    pub entity_type: String,
    pub entity_id: Uuid,
}

impl EntityRef {
    pub fn new(entity_type: impl Into<String>, entity_id: Uuid) -> Self {
        Self {
            entity_type: entity_type.into(),
            entity_id,
        }
    }
}

/// Context shared by every record of one commit.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeContext {
    pub attribution: String,
    pub source: Option<ChangeSource>,
    pub contact_info: Option<String>,
    pub internal_note: Option<String>,
    pub customer_summary: Option<String>,
}

/// Immutable once written.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub record_id: Uuid,
    pub entity: EntityRef,
    pub document_id: Option<Uuid>,
    pub field_name: String,
    pub old_value: FieldValue,
    pub new_value: FieldValue,
    pub timestamp: DateTime<Utc>,
    pub attribution: String,
    pub source: ChangeSource,
    pub contact_info: Option<String>,
    pub internal_note: Option<String>,
    pub customer_summary: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Detecting,
    AwaitingContext,
    Committed,
    Abandoned,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SessionState::Detecting => "detecting",
            SessionState::AwaitingContext => "awaiting_context",
            SessionState::Committed => "committed",
            SessionState::Abandoned => "abandoned",
        })
    }
}

/// One edit of one tracked record.
///
/// `Detecting -> AwaitingContext -> Committed`, or `Abandoned` from either
/// open state. Abandoning writes nothing.
#[derive(Clone, Debug)]
pub struct EditSession {
    session_id: Uuid,
    entity: EntityRef,
    document_id: Option<Uuid>,
    state: SessionState,
    candidates: Vec<ChangeCandidate>,
    context: ChangeContext,
    summary_dirty: bool,
}

impl EditSession {
    /// `session_id` scopes the ids of the records this session commits.
    pub fn new(session_id: Uuid, entity: EntityRef, document_id: Option<Uuid>) -> Self {
        Self {
            session_id,
            entity,
            document_id,
            state: SessionState::Detecting,
            candidates: Vec::new(),
            context: ChangeContext::default(),
            summary_dirty: false,
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn entity(&self) -> &EntityRef {
        &self.entity
    }

    pub fn document_id(&self) -> Option<Uuid> {
        self.document_id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn candidates(&self) -> &[ChangeCandidate] {
        &self.candidates
    }

    pub fn context(&self) -> &ChangeContext {
        &self.context
    }

    pub fn is_noop(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn summary(&self) -> Option<&str> {
        self.context.customer_summary.as_deref()
    }

    pub fn summary_is_dirty(&self) -> bool {
        self.summary_dirty
    }

    /// Compare snapshots and move to `AwaitingContext`.
    pub fn detect(
        &mut self,
        old: &Snapshot,
        new: &Snapshot,
        fields: &[FieldDescriptor],
    ) -> Result<&[ChangeCandidate], AuditError> {
        self.require(SessionState::Detecting, "detect")?;
        self.candidates = detect_changes(old, new, fields);
        self.state = SessionState::AwaitingContext;
        self.refresh_summary();
        Ok(&self.candidates)
    }

    pub fn set_attribution(&mut self, attribution: impl Into<String>) -> Result<(), AuditError> {
        self.require(SessionState::AwaitingContext, "set_attribution")?;
        self.context.attribution = attribution.into();
        self.refresh_summary();
        Ok(())
    }

    pub fn set_source(&mut self, source: ChangeSource) -> Result<(), AuditError> {
        self.require(SessionState::AwaitingContext, "set_source")?;
        self.context.source = Some(source);
        self.refresh_summary();
        Ok(())
    }

    pub fn set_contact_info(&mut self, contact: Option<String>) -> Result<(), AuditError> {
        self.require(SessionState::AwaitingContext, "set_contact_info")?;
        self.context.contact_info = contact;
        Ok(())
    }

    pub fn set_internal_note(&mut self, note: Option<String>) -> Result<(), AuditError> {
        self.require(SessionState::AwaitingContext, "set_internal_note")?;
        self.context.internal_note = note;
        Ok(())
    }

    /// Human edit of the customer summary. Stops auto-regeneration for the
    /// rest of the session, even if the edit restores the generated text.
    /// `None` removes the summary.
    pub fn edit_summary(&mut self, summary: Option<String>) -> Result<(), AuditError> {
        self.require(SessionState::AwaitingContext, "edit_summary")?;
        self.context.customer_summary = summary;
        self.summary_dirty = true;
        Ok(())
    }

    fn refresh_summary(&mut self) {
        if !self.summary_dirty {
            self.context.customer_summary =
                default_summary(&self.candidates, &self.context.attribution, self.context.source);
        }
    }

    /// Validate the context and mint the records without changing state.
    ///
    /// All records share `timestamp` and the context. A no-op edit yields no
    /// records and needs no context.
    pub fn prepare(&self, timestamp: DateTime<Utc>) -> Result<Vec<ChangeRecord>, AuditError> {
        self.require(SessionState::AwaitingContext, "commit")?;
        if self.candidates.is_empty() {
            return Ok(Vec::new());
        }
        let attribution = self.context.attribution.trim();
        if attribution.is_empty() {
            return Err(AuditError::EmptyAttribution);
        }
        let source = self.context.source.ok_or(AuditError::MissingSource)?;

        Ok(self
            .candidates
            .iter()
            .map(|c| ChangeRecord {
                record_id: derive_id(self.session_id, &format!("change/{}", c.field_name)),
                entity: self.entity.clone(),
                document_id: self.document_id,
                field_name: c.field_name.clone(),
                old_value: c.old_value.clone(),
                new_value: c.new_value.clone(),
                timestamp,
                attribution: attribution.to_string(),
                source,
                contact_info: self.context.contact_info.clone(),
                internal_note: self.context.internal_note.clone(),
                customer_summary: self.context.customer_summary.clone(),
            })
            .collect())
    }

    /// Commit through `persist`: the session only becomes `Committed` if
    /// `persist` accepted the records. On error the session stays open.
    pub fn commit_with<E, F>(
        &mut self,
        timestamp: DateTime<Utc>,
        persist: F,
    ) -> Result<Vec<ChangeRecord>, E>
    where
        E: From<AuditError>,
        F: FnOnce(&[ChangeRecord]) -> Result<(), E>,
    {
        let records = self.prepare(timestamp)?;
        persist(&records)?;
        self.state = SessionState::Committed;
        Ok(records)
    }

    /// Commit with no external write (pure callers and tests).
    pub fn commit(&mut self, timestamp: DateTime<Utc>) -> Result<Vec<ChangeRecord>, AuditError> {
        self.commit_with(timestamp, |_| Ok(()))
    }

    pub fn abandon(&mut self) -> Result<(), AuditError> {
        match self.state {
            SessionState::Detecting | SessionState::AwaitingContext => {
                self.state = SessionState::Abandoned;
                Ok(())
            }
            state => Err(AuditError::InvalidState {
                operation: "abandon",
                state,
            }),
        }
    }

    fn require(&self, want: SessionState, operation: &'static str) -> Result<(), AuditError> {
        if self.state == want {
            Ok(())
        } else {
            Err(AuditError::InvalidState {
                operation,
                state: self.state,
            })
        }
    }
}

/// "Updated by JD via phone call: guest count changed from 120 to 140".
/// Missing attribution or source drops that clause. `None` when nothing changed.
fn default_summary(
    candidates: &[ChangeCandidate],
    attribution: &str,
    source: Option<ChangeSource>,
) -> Option<String> {
    if candidates.is_empty() {
        return None;
    }
    let mut out = String::from("Updated");
    let who = attribution.trim();
    if !who.is_empty() {
        out.push_str(" by ");
        out.push_str(who);
    }
    if let Some(src) = source {
        out.push_str(" via ");
        out.push_str(src.phrase());
    }
    out.push_str(": ");
    let changes: Vec<String> = candidates
        .iter()
        .map(|c| format!("{} changed from {} to {}", c.label, c.old_value, c.new_value))
        .collect();
    out.push_str(&changes.join("; "));
    Some(out)
}
