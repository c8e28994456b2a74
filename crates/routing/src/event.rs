//! The inbound event model.
//!
//! [`RawEvent`] is what the HTTP layer managed to extract from a request;
//! every field may be missing. [`RawEvent::admit`] runs the ordered presence
//! checks and produces an [`InboundEvent`], whose scalar fields are
//! guaranteed non-empty.

use std::collections::BTreeMap;

use bytes::Bytes;

use crate::errors::InboundValidationError;
use crate::{DispatchId, EventType, OrgName, RepoName, Timestamp};

/// Logging field holding the event type.
pub const FIELD_EVENT_TYPE: &str = "event_type";
/// Logging field holding the organisation.
pub const FIELD_ORG: &str = "org";
/// Logging field holding the repository.
pub const FIELD_REPO: &str = "repo";
/// Logging field holding the relay-generated dispatch id.
pub const FIELD_DISPATCH_ID: &str = "dispatch_id";
/// Logging field holding the arrival time.
pub const FIELD_RECEIVED_AT: &str = "received_at";

/// Fields extracted from an inbound request, before validation.
#[derive(Debug, Clone, Default)]
pub struct RawEvent {
    /// Value of the event-type header.
    pub event_type: Option<String>,
    /// Request body, present only when it parsed as a non-empty JSON object.
    pub payload: Option<Bytes>,
    /// Owning organisation, as found in the payload.
    pub org: Option<String>,
    /// Repository name, as found in the payload.
    pub repo: Option<String>,
    /// Headers to forward to every destination.
    pub headers: BTreeMap<String, String>,
    /// Extra correlation fields (e.g. the platform's delivery id).
    pub logging_fields: BTreeMap<String, String>,
}

impl RawEvent {
    /// Checks event type, payload, organisation and repository, in that order.
    ///
    /// On success the event receives a fresh [`DispatchId`] and arrival time,
    /// and the scalar fields are copied into its logging fields.
    pub fn admit(self) -> Result<InboundEvent, InboundValidationError> {
        let event_type = self
            .event_type
            .and_then(EventType::new)
            .ok_or(InboundValidationError::MissingEventType)?;
        let payload = self
            .payload
            .filter(|p| !p.is_empty())
            .ok_or(InboundValidationError::MissingPayload)?;
        let org = self
            .org
            .and_then(OrgName::new)
            .ok_or(InboundValidationError::MissingOrg)?;
        let repo = self
            .repo
            .and_then(RepoName::new)
            .ok_or(InboundValidationError::MissingRepo)?;

        let dispatch_id = DispatchId::new_random();
        let received_at = Timestamp::now();

        let mut logging_fields = self.logging_fields;
        logging_fields.insert(FIELD_EVENT_TYPE.into(), event_type.to_string());
        logging_fields.insert(FIELD_ORG.into(), org.to_string());
        logging_fields.insert(FIELD_REPO.into(), repo.to_string());
        logging_fields.insert(FIELD_DISPATCH_ID.into(), dispatch_id.to_string());
        logging_fields.insert(FIELD_RECEIVED_AT.into(), received_at.to_string());

        Ok(InboundEvent {
            dispatch_id,
            received_at,
            event_type,
            org,
            repo,
            payload,
            headers: self.headers,
            logging_fields,
        })
    }
}

/// A validated, dispatchable webhook event.
///
/// Cheap to clone: the payload is reference counted.
#[derive(Debug, Clone)]
pub struct InboundEvent {
    dispatch_id: DispatchId,
    received_at: Timestamp,
    event_type: EventType,
    org: OrgName,
    repo: RepoName,
    payload: Bytes,
    headers: BTreeMap<String, String>,
    logging_fields: BTreeMap<String, String>,
}

impl InboundEvent {
    /// Relay-generated id shared by every delivery of this event.
    pub fn dispatch_id(&self) -> DispatchId {
        self.dispatch_id
    }

    /// When the relay admitted the event.
    pub fn received_at(&self) -> Timestamp {
        self.received_at
    }

    pub fn event_type(&self) -> &EventType {
        &self.event_type
    }

    pub fn org(&self) -> &OrgName {
        &self.org
    }

    pub fn repo(&self) -> &RepoName {
        &self.repo
    }

    /// The original request body, forwarded unchanged.
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Headers forwarded to every destination.
    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    /// Structured-log correlation fields.
    pub fn logging_fields(&self) -> &BTreeMap<String, String> {
        &self.logging_fields
    }
}
