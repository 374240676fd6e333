//! Report filters shared by the listing and aggregation paths.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Deserialize;
use sqlx::{Postgres, QueryBuilder};
use validator::{ValidationError, ValidationErrors};

use crate::error::{Result, ServerError};
use crate::point::PointStatus;

pub const DEFAULT_LIMIT: i64 = 50;
pub const MAX_LIMIT: i64 = 200;
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Points joined with the owner and its department.
pub(crate) const FROM_POINTS: &str = r#" FROM points p
    LEFT JOIN users u ON u.user_id = p.user_id
    LEFT JOIN setores s ON s.setor_id = u.setor_id"#;

/// Raw query string. Every field stays textual so that pagination
/// mistakes fall back to defaults instead of rejecting the request.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ReportQuery {
    pub user_id: Option<String>,
    pub setor_id: Option<String>,
    pub status: Option<String>,
    pub location: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub limit: Option<String>,
    pub offset: Option<String>,
    pub group_by: Option<String>,
}

/// Trimmed, non-blank value.
pub(crate) fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Calendar range on `clock_in`. Both bounds are inclusive days.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateRange {
    /// First instant included, `from` at midnight UTC.
    pub fn start(&self) -> Option<DateTime<Utc>> {
        self.from.map(|d| d.and_time(NaiveTime::MIN).and_utc())
    }

    /// First instant excluded, midnight UTC of the day after `to`.
    pub fn end_exclusive(&self) -> Option<DateTime<Utc>> {
        self.to
            .and_then(|d| d.succ_opt())
            .map(|d| d.and_time(NaiveTime::MIN).and_utc())
    }
}

/// Pagination of the listing path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

impl Page {
    /// Invalid values are ignored.
    pub fn from_query(query: &ReportQuery) -> Self {
        let limit = present(&query.limit)
            .and_then(|v| v.parse::<i64>().ok())
            .filter(|n| *n > 0 && *n <= MAX_LIMIT)
            .unwrap_or(DEFAULT_LIMIT);
        let offset = present(&query.offset)
            .and_then(|v| v.parse::<i64>().ok())
            .filter(|n| *n >= 0)
            .unwrap_or(0);

        Self { limit, offset }
    }
}

/// Conjunction of optional predicates.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ReportFilter {
    pub user_id: Option<String>,
    pub setor_id: Option<String>,
    pub status: Option<PointStatus>,
    pub location: Option<String>,
    pub range: DateRange,
}

impl ReportFilter {
    /// Validate query parameters. Every invalid field is reported.
    pub fn from_query(query: &ReportQuery) -> Result<Self> {
        let mut errors = ValidationErrors::new();

        let status = match present(&query.status) {
            Some(value) => match value.parse::<PointStatus>() {
                Ok(status) => Some(status),
                Err(_) => {
                    errors.add(
                        "status",
                        ValidationError::new("status")
                            .with_message("invalid status (open|close).".into()),
                    );
                    None
                },
            },
            None => None,
        };

        let from = parse_date(&query.from, "from", &mut errors);
        let to = parse_date(&query.to, "to", &mut errors);
        if to.is_some_and(|d| d.succ_opt().is_none()) {
            errors.add(
                "to",
                ValidationError::new("date").with_message("to is out of range.".into()),
            );
        }

        if !errors.is_empty() {
            return Err(errors.into());
        }

        Ok(Self {
            user_id: present(&query.user_id).map(str::to_owned),
            setor_id: present(&query.setor_id).map(str::to_owned),
            status,
            location: present(&query.location).map(str::to_owned),
            range: DateRange { from, to },
        })
    }

    /// Append ` WHERE ...` with every active predicate bound as a parameter.
    pub fn push_where(&self, qb: &mut QueryBuilder<'static, Postgres>) {
        qb.push(" WHERE 1=1");

        if let Some(start) = self.range.start() {
            qb.push(" AND p.clock_in >= ").push_bind(start);
        }
        if let Some(end) = self.range.end_exclusive() {
            qb.push(" AND p.clock_in < ").push_bind(end);
        }
        if let Some(user_id) = &self.user_id {
            qb.push(" AND p.user_id = ").push_bind(user_id.clone());
        }
        if let Some(status) = self.status {
            qb.push(" AND p.status = ").push_bind(status.as_str());
        }
        if let Some(location) = &self.location {
            let pattern = format!("%{}%", escape_like(location));
            qb.push(" AND (p.location_in ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR p.location_out ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
        if let Some(setor_id) = &self.setor_id {
            qb.push(" AND u.setor_id = ").push_bind(setor_id.clone());
        }
    }
}

fn parse_date(
    value: &Option<String>,
    field: &'static str,
    errors: &mut ValidationErrors,
) -> Option<NaiveDate> {
    let value = present(value)?;
    match NaiveDate::parse_from_str(value, DATE_FORMAT) {
        Ok(date) => Some(date),
        Err(_) => {
            errors.add(
                field,
                ValidationError::new("date")
                    .with_message(format!("invalid {field} (use YYYY-MM-DD).").into()),
            );
            None
        },
    }
}

/// Match `value` literally inside a LIKE pattern.
fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Require both bounds, used by aggregations.
pub fn require_range(filter: &ReportFilter) -> Result<(NaiveDate, NaiveDate)> {
    match (filter.range.from, filter.range.to) {
        (Some(from), Some(to)) => Ok((from, to)),
        _ => Err(ServerError::field(
            "range",
            "required",
            "from and to are required (YYYY-MM-DD).",
        )),
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    pub(crate) fn query(pairs: &[(&str, &str)]) -> ReportQuery {
        serde_json::from_value(serde_json::Value::Object(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), serde_json::Value::String(v.to_string())))
                .collect(),
        ))
        .unwrap()
    }

    #[test]
    fn test_page_defaults_and_clamping() {
        assert_eq!(Page::from_query(&query(&[])), Page::default());
        assert_eq!(Page::from_query(&query(&[("limit", "500")])).limit, 50);
        assert_eq!(Page::from_query(&query(&[("limit", "0")])).limit, 50);
        assert_eq!(Page::from_query(&query(&[("limit", "abc")])).limit, 50);
        assert_eq!(Page::from_query(&query(&[("limit", "200")])).limit, 200);
        assert_eq!(Page::from_query(&query(&[("offset", "-1")])).offset, 0);
        assert_eq!(Page::from_query(&query(&[("offset", "20")])).offset, 20);
    }

    #[test]
    fn test_end_date_is_inclusive() {
        let filter =
            ReportFilter::from_query(&query(&[("from", "2024-01-01"), ("to", "2024-01-31")]))
                .unwrap();

        let start = filter.range.start().unwrap();
        let end = filter.range.end_exclusive().unwrap();
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap());

        let late = Utc.with_ymd_and_hms(2024, 1, 31, 23, 59, 0).unwrap();
        let next = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 1).unwrap();
        assert!(late >= start && late < end);
        assert!(next >= end);
    }

    #[test]
    fn test_status_must_be_exact() {
        assert!(ReportFilter::from_query(&query(&[("status", "open")])).is_ok());
        assert!(ReportFilter::from_query(&query(&[("status", "close")])).is_ok());
        assert!(ReportFilter::from_query(&query(&[("status", "closed")])).is_err());
    }

    #[test]
    fn test_invalid_dates() {
        let err = ReportFilter::from_query(&query(&[("from", "01/02/2024"), ("to", "x")]))
            .unwrap_err();
        match err {
            ServerError::Validation(errors) => {
                let fields = errors.field_errors();
                assert!(fields.contains_key("from"));
                assert!(fields.contains_key("to"));
            },
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_blank_values_are_absent() {
        let filter =
            ReportFilter::from_query(&query(&[("user_id", "  "), ("status", "")])).unwrap();
        assert_eq!(filter, ReportFilter::default());
    }

    #[test]
    fn test_predicates() {
        let filter = ReportFilter::from_query(&query(&[
            ("user_id", "u-1"),
            ("setor_id", "s-1"),
            ("status", "close"),
            ("location", "50%_off"),
            ("from", "2024-01-01"),
            ("to", "2024-01-31"),
        ]))
        .unwrap();

        let mut qb = QueryBuilder::<Postgres>::new("SELECT 1");
        qb.push(FROM_POINTS);
        filter.push_where(&mut qb);
        let sql = qb.sql();

        assert!(sql.contains("p.clock_in >= $1"));
        assert!(sql.contains("p.clock_in < $2"));
        assert!(sql.contains("p.user_id = $3"));
        assert!(sql.contains("p.status = $4"));
        assert!(sql.contains("(p.location_in ILIKE $5 OR p.location_out ILIKE $6)"));
        assert!(sql.contains("u.setor_id = $7"));
        assert!(!sql.contains("u-1"));
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like(r"50%_off\"), r"50\%\_off\\");
    }

    #[test]
    fn test_require_range() {
        let filter = ReportFilter::from_query(&query(&[("from", "2024-01-01")])).unwrap();
        assert!(require_range(&filter).is_err());
    }
}
