//! Read-only reports over the points ledger.

mod filter;
mod frequency;

use std::time::Duration;

use axum::extract::FromRef;
use chrono::NaiveDate;
use serde::Serialize;
use sqlx::{PgPool, Postgres, QueryBuilder};

pub use filter::{Page, ReportFilter, ReportQuery, require_range};
pub use frequency::{FrequencyRow, GroupBy};

use crate::AppState;
use crate::database::bounded;
use crate::error::Result;
use crate::point::{POINT_COLUMNS, Point, PointRecord};

/// Deadline of a report query.
pub const REPORT_TIMEOUT: Duration = Duration::from_secs(10);

/// Paginated listing response.
#[derive(Debug, Serialize)]
pub struct PointsPage {
    pub limit: i64,
    pub offset: i64,
    pub items: Vec<Point>,
}

/// Aggregation response. Dates echo the request.
#[derive(Debug, Serialize)]
pub struct Frequency {
    pub group_by: GroupBy,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub items: Vec<FrequencyRow>,
}

#[derive(Clone)]
pub struct Reports {
    pool: PgPool,
    timeout: Duration,
}

impl Reports {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            timeout: REPORT_TIMEOUT,
        }
    }

    /// Points matching `filter`, latest clock-in first.
    pub async fn points(&self, filter: &ReportFilter, page: Page) -> Result<PointsPage> {
        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {POINT_COLUMNS}"));
        qb.push(filter::FROM_POINTS);
        filter.push_where(&mut qb);
        qb.push(" ORDER BY p.clock_in DESC NULLS LAST, p.created_at DESC")
            .push(" LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset);

        let items = bounded(self.timeout, async {
            qb.build_query_as::<PointRecord>()
                .fetch_all(&self.pool)
                .await?
                .into_iter()
                .map(Point::try_from)
                .collect::<Result<Vec<_>>>()
        })
        .await?;

        tracing::debug!(
            count = items.len(),
            limit = page.limit,
            offset = page.offset,
            "points report"
        );

        Ok(PointsPage {
            limit: page.limit,
            offset: page.offset,
            items,
        })
    }

    /// Grouped attendance between two required dates.
    pub async fn frequency(&self, group_by: GroupBy, filter: &ReportFilter) -> Result<Frequency> {
        let (from, to) = require_range(filter)?;
        let items = bounded(
            self.timeout,
            frequency::aggregate(&self.pool, group_by, filter),
        )
        .await?;

        tracing::debug!(?group_by, %from, %to, groups = items.len(), "frequency report");

        Ok(Frequency {
            group_by,
            from,
            to,
            items,
        })
    }
}

impl FromRef<AppState> for Reports {
    fn from_ref(state: &AppState) -> Reports {
        Reports::new(state.db.postgres.clone())
    }
}
