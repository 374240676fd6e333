//! Attendance aggregation over the points ledger.

use serde::Serialize;
use sqlx::{FromRow, Postgres, QueryBuilder};

use super::filter::{FROM_POINTS, ReportFilter};
use crate::error::{Result, ServerError};

/// Department name used when a user has no (or an unknown) setor.
pub const NO_DEPARTMENT: &str = "Sem setor";

const SECONDS_PER_HOUR: f64 = 3600.0;

/// Aggregation dimension.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupBy {
    #[default]
    User,
    Department,
    Day,
}

impl GroupBy {
    /// Blank or absent values default to [`GroupBy::User`].
    pub fn parse(value: Option<&str>) -> Result<Self> {
        match value.map(str::trim).unwrap_or_default() {
            "" | "user" => Ok(GroupBy::User),
            "department" => Ok(GroupBy::Department),
            "day" => Ok(GroupBy::Day),
            _ => Err(ServerError::field(
                "group_by",
                "group_by",
                "invalid group_by (user|department|day).",
            )),
        }
    }

    fn key(self) -> String {
        match self {
            GroupBy::User => "p.user_id".to_owned(),
            GroupBy::Department => format!("COALESCE(s.nome, '{NO_DEPARTMENT}')"),
            GroupBy::Day => "to_char((p.clock_in AT TIME ZONE 'UTC')::date, 'YYYY-MM-DD')".to_owned(),
        }
    }

    /// Distinct days for user/department, distinct users for day.
    fn distinct(self) -> &'static str {
        match self {
            GroupBy::User | GroupBy::Department => {
                "COUNT(DISTINCT (p.clock_in AT TIME ZONE 'UTC')::date)"
            },
            GroupBy::Day => "COUNT(DISTINCT p.user_id)",
        }
    }

    fn order(self) -> &'static str {
        match self {
            GroupBy::User | GroupBy::Department => {
                " ORDER BY distinct_count DESC, shifts_closed DESC, key ASC"
            },
            GroupBy::Day => " ORDER BY key ASC",
        }
    }
}

#[derive(Debug, FromRow)]
struct FrequencyRecord {
    key: String,
    shifts_total: i64,
    shifts_closed: i64,
    distinct_count: i64,
    seconds_worked: f64,
}

/// One aggregated group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrequencyRow {
    pub key: String,
    pub shifts_total: i64,
    pub shifts_closed: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days_worked: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub users_present: Option<i64>,
    pub hours_worked: f64,
}

impl FrequencyRow {
    fn from_record(group_by: GroupBy, record: FrequencyRecord) -> Self {
        let (days_worked, users_present) = match group_by {
            GroupBy::Day => (None, Some(record.distinct_count)),
            GroupBy::User | GroupBy::Department => (Some(record.distinct_count), None),
        };

        Self {
            key: record.key,
            shifts_total: record.shifts_total,
            shifts_closed: record.shifts_closed,
            days_worked,
            users_present,
            hours_worked: hours(record.seconds_worked),
        }
    }
}

pub fn hours(seconds: f64) -> f64 {
    seconds / SECONDS_PER_HOUR
}

/// Build the grouped query. Open rows are counted but contribute no time.
pub(crate) fn query(group_by: GroupBy, filter: &ReportFilter) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(format!(
        r#"SELECT {} AS key,
            COUNT(*) AS shifts_total,
            COUNT(*) FILTER (WHERE p.status = 'close') AS shifts_closed,
            {} AS distinct_count,
            COALESCE(SUM(EXTRACT(EPOCH FROM (p.clock_out - p.clock_in)))
                FILTER (WHERE p.status = 'close' AND p.clock_out IS NOT NULL), 0)::float8 AS seconds_worked"#,
        group_by.key(),
        group_by.distinct(),
    ));

    qb.push(FROM_POINTS);
    filter.push_where(&mut qb);
    qb.push(" GROUP BY 1");
    qb.push(group_by.order());

    qb
}

/// Run the aggregation.
pub async fn aggregate(
    pool: &sqlx::PgPool,
    group_by: GroupBy,
    filter: &ReportFilter,
) -> Result<Vec<FrequencyRow>> {
    let mut qb = query(group_by, filter);

    let rows = qb
        .build_query_as::<FrequencyRecord>()
        .fetch_all(pool)
        .await?
        .into_iter()
        .map(|record| FrequencyRow::from_record(group_by, record))
        .collect();

    Ok(rows)
}
