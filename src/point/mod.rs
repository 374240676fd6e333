//! Clock ledger: one row per clock-in/clock-out cycle.
mod patch;
mod repository;
mod service;

pub use patch::*;
pub use repository::*;
pub use service::*;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ServerError;

/// Open/closed state of a [`Point`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PointStatus {
    #[serde(rename = "open")]
    Open,
    #[serde(rename = "close", alias = "closed")]
    Closed,
}

impl PointStatus {
    /// Value stored in the `status` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            PointStatus::Open => "open",
            PointStatus::Closed => "close",
        }
    }
}

impl fmt::Display for PointStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown status literal.
#[derive(Debug, thiserror::Error)]
#[error("unknown point status '{0}'")]
pub struct UnknownStatus(pub String);

/// Strict parsing, only accepts stored literals.
impl FromStr for PointStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(PointStatus::Open),
            "close" => Ok(PointStatus::Closed),
            _ => Err(UnknownStatus(s.to_owned())),
        }
    }
}

/// Point as returned by the API.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub id: i64,
    pub user_id: String,
    pub clock_in: Option<DateTime<Utc>>,
    pub clock_out: Option<DateTime<Utc>>,
    pub status: PointStatus,
    pub location_in: Option<String>,
    pub location_out: Option<String>,
    pub photo_in: Option<String>,
    pub photo_out: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Point as saved on database.
#[derive(Clone, Debug, sqlx::FromRow)]
pub struct PointRecord {
    pub id: i64,
    pub user_id: String,
    pub clock_in: Option<DateTime<Utc>>,
    pub clock_out: Option<DateTime<Utc>>,
    pub status: String,
    pub location_in: Option<String>,
    pub location_out: Option<String>,
    pub photo_in: Option<String>,
    pub photo_out: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<PointRecord> for Point {
    type Error = ServerError;

    fn try_from(record: PointRecord) -> Result<Self, Self::Error> {
        let status = record
            .status
            .parse()
            .map_err(|err| ServerError::internal("corrupted point row", err))?;

        Ok(Self {
            id: record.id,
            user_id: record.user_id,
            clock_in: record.clock_in,
            clock_out: record.clock_out,
            status,
            location_in: record.location_in,
            location_out: record.location_out,
            photo_in: record.photo_in,
            photo_out: record.photo_out,
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }
}

/// Columns selected for a full [`PointRecord`].
pub(crate) const POINT_COLUMNS: &str = r#"p.id, p.user_id, p.clock_in, p.clock_out, p.status,
    p.location_in, p.location_out, p.photo_in, p.photo_out,
    p.created_at, p.updated_at"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parsing_is_strict() {
        assert_eq!("open".parse::<PointStatus>().unwrap(), PointStatus::Open);
        assert_eq!("close".parse::<PointStatus>().unwrap(), PointStatus::Closed);
        assert!("closed".parse::<PointStatus>().is_err());
        assert!("OPEN".parse::<PointStatus>().is_err());
    }

    #[test]
    fn test_status_wire_format() {
        assert_eq!(serde_json::to_string(&PointStatus::Closed).unwrap(), r#""close""#);
        let status: PointStatus = serde_json::from_str(r#""closed""#).unwrap();
        assert_eq!(status, PointStatus::Closed);
    }

    #[test]
    fn test_corrupted_record() {
        let now = Utc::now();
        let record = PointRecord {
            id: 1,
            user_id: "u".into(),
            clock_in: Some(now),
            clock_out: None,
            status: "paused".into(),
            location_in: None,
            location_out: None,
            photo_in: None,
            photo_out: None,
            created_at: now,
            updated_at: now,
        };
        assert!(Point::try_from(record).is_err());
    }
}
