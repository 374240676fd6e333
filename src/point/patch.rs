//! Typed partial update of a [`Point`](super::Point).

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use validator::{ValidationError, ValidationErrors};

use super::PointStatus;
use crate::error::{Result, ServerError};

/// Raw request body. Unknown keys are ignored.
#[derive(Debug, Default, Deserialize)]
pub struct PatchBody {
    clock_in: Option<Value>,
    clock_out: Option<Value>,
    status: Option<Value>,
}

/// A single allowed change.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointChange {
    ClockIn(DateTime<Utc>),
    ClockOut(DateTime<Utc>),
    Status(PointStatus),
}

/// Validated, non-empty set of changes.
#[derive(Debug, Clone, PartialEq)]
pub struct PointPatch {
    changes: Vec<PointChange>,
}

impl PointPatch {
    pub fn changes(&self) -> &[PointChange] {
        &self.changes
    }

    pub fn clock_in(&self) -> Option<DateTime<Utc>> {
        self.changes.iter().find_map(|c| match c {
            PointChange::ClockIn(t) => Some(*t),
            _ => None,
        })
    }

    pub fn clock_out(&self) -> Option<DateTime<Utc>> {
        self.changes.iter().find_map(|c| match c {
            PointChange::ClockOut(t) => Some(*t),
            _ => None,
        })
    }

    pub fn status(&self) -> Option<PointStatus> {
        self.changes.iter().find_map(|c| match c {
            PointChange::Status(s) => Some(*s),
            _ => None,
        })
    }

    /// Check ordering once merged with the stored timestamps.
    pub fn check_against(
        &self,
        stored_in: Option<DateTime<Utc>>,
        stored_out: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let clock_in = self.clock_in().or(stored_in);
        let clock_out = self.clock_out().or(stored_out);

        match clock_in.zip(clock_out) {
            Some((clock_in, clock_out)) if clock_out < clock_in => Err(out_before_in()),
            _ => Ok(()),
        }
    }
}

fn out_before_in() -> ServerError {
    ServerError::field(
        "clock_out",
        "order",
        "clock_out cannot be before clock_in.",
    )
}

fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    value
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc))
}

impl TryFrom<PatchBody> for PointPatch {
    type Error = ServerError;

    fn try_from(body: PatchBody) -> Result<Self> {
        let mut errors = ValidationErrors::new();
        let mut changes = Vec::with_capacity(3);

        if let Some(value) = body.clock_in {
            match parse_timestamp(&value) {
                Some(t) => changes.push(PointChange::ClockIn(t)),
                None => errors.add(
                    "clock_in",
                    ValidationError::new("timestamp")
                        .with_message("clock_in must be an RFC 3339 timestamp.".into()),
                ),
            }
        }

        if let Some(value) = body.clock_out {
            match parse_timestamp(&value) {
                Some(t) => changes.push(PointChange::ClockOut(t)),
                None => errors.add(
                    "clock_out",
                    ValidationError::new("timestamp")
                        .with_message("clock_out must be an RFC 3339 timestamp.".into()),
                ),
            }
        }

        if let Some(value) = body.status {
            match serde_json::from_value::<PointStatus>(value) {
                Ok(status) => changes.push(PointChange::Status(status)),
                Err(_) => errors.add(
                    "status",
                    ValidationError::new("status")
                        .with_message("status must be 'open' or 'close'.".into()),
                ),
            }
        }

        if !errors.is_empty() {
            return Err(errors.into());
        }

        if changes.is_empty() {
            return Err(ServerError::field(
                "body",
                "empty",
                "no valid fields to update.",
            ));
        }

        let patch = Self { changes };
        patch.check_against(None, None)?;
        Ok(patch)
    }
}
