use crate::database::DbPool;
use crate::entities::{lesson_entity, student_entity, LessonStatus, LessonType, Subject};
use crate::error::AppResult;
use crate::models::*;
use chrono::{DateTime, Datelike, Months, Utc};
use sea_orm::{
    ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
};
use std::collections::HashMap;
use uuid::Uuid;

/// Derived earnings figures over a date range. All queries aggregate in the
/// database; nothing here loads full lesson rows.
#[derive(Clone)]
pub struct StatisticsService {
    pool: DbPool,
}

impl StatisticsService {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Summary over `[start, end)`, defaulting to the current month.
    /// `upcoming_lessons` is anchored at `now`, not at the range.
    pub async fn summary(
        &self,
        tutor_id: i64,
        query: StatisticsQuery,
        now: DateTime<Utc>,
    ) -> AppResult<StatisticsResponse> {
        let (default_start, default_end) = month_range(now);
        let start = query.start_date.unwrap_or(default_start);
        let end = query.end_date.unwrap_or(default_end);

        let total_lessons = self.count_in_range(tutor_id, start, end, None).await?;
        let completed_lessons = self
            .count_in_range(tutor_id, start, end, Some(LessonStatus::Completed))
            .await?;
        let cancelled_lessons = self
            .count_in_range(tutor_id, start, end, Some(LessonStatus::Cancelled))
            .await?;

        // 即将进行的课程不受查询区间限制
        let upcoming_lessons = lesson_entity::Entity::find()
            .filter(lesson_entity::Column::TutorId.eq(tutor_id))
            .filter(lesson_entity::Column::StartTime.gte(now))
            .filter(lesson_entity::Column::Status.is_in([
                LessonStatus::Scheduled,
                LessonStatus::Rescheduled,
            ]))
            .count(&*self.pool)
            .await?;

        let earnings = self.earnings_in_range(tutor_id, start, end).await?;
        let (prev_start, prev_end) = previous_month_range(now);
        let last_month_earnings = self.earnings_in_range(tutor_id, prev_start, prev_end).await?;

        let lost_earnings = self
            .price_sum(tutor_id, start, end, LessonStatus::Cancelled, None)
            .await?;

        Ok(StatisticsResponse {
            total_lessons,
            completed_lessons,
            cancelled_lessons,
            upcoming_lessons,
            earnings,
            last_month_earnings,
            lost_earnings,
        })
    }

    pub async fn by_subject(
        &self,
        tutor_id: i64,
        query: StatisticsQuery,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<SubjectStat>> {
        let (start, end) = resolve_range(&query, now);
        let rows: Vec<(Subject, i64, Option<f64>)> = lesson_entity::Entity::find()
            .select_only()
            .column(lesson_entity::Column::Subject)
            .column_as(lesson_entity::Column::Id.count(), "lesson_count")
            .column_as(lesson_entity::Column::Price.sum(), "total_price")
            .filter(lesson_entity::Column::TutorId.eq(tutor_id))
            .filter(lesson_entity::Column::StartTime.gte(start))
            .filter(lesson_entity::Column::StartTime.lt(end))
            .group_by(lesson_entity::Column::Subject)
            .into_tuple()
            .all(&*self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(subject, count, total)| SubjectStat {
                subject,
                lesson_count: count.max(0) as u64,
                total_price: total.unwrap_or(0.0),
            })
            .collect())
    }

    pub async fn by_lesson_type(
        &self,
        tutor_id: i64,
        query: StatisticsQuery,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<LessonTypeStat>> {
        let (start, end) = resolve_range(&query, now);
        let rows: Vec<(LessonType, i64, Option<f64>)> = lesson_entity::Entity::find()
            .select_only()
            .column(lesson_entity::Column::LessonType)
            .column_as(lesson_entity::Column::Id.count(), "lesson_count")
            .column_as(lesson_entity::Column::Price.sum(), "total_price")
            .filter(lesson_entity::Column::TutorId.eq(tutor_id))
            .filter(lesson_entity::Column::StartTime.gte(start))
            .filter(lesson_entity::Column::StartTime.lt(end))
            .group_by(lesson_entity::Column::LessonType)
            .into_tuple()
            .all(&*self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(lesson_type, count, total)| LessonTypeStat {
                lesson_type,
                lesson_count: count.max(0) as u64,
                total_price: total.unwrap_or(0.0),
            })
            .collect())
    }

    pub async fn by_student(
        &self,
        tutor_id: i64,
        query: StatisticsQuery,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<StudentStat>> {
        let (start, end) = resolve_range(&query, now);
        let rows: Vec<(Uuid, i64, Option<f64>)> = lesson_entity::Entity::find()
            .select_only()
            .column(lesson_entity::Column::StudentId)
            .column_as(lesson_entity::Column::Id.count(), "lesson_count")
            .column_as(lesson_entity::Column::Price.sum(), "total_price")
            .filter(lesson_entity::Column::TutorId.eq(tutor_id))
            .filter(lesson_entity::Column::StartTime.gte(start))
            .filter(lesson_entity::Column::StartTime.lt(end))
            .group_by(lesson_entity::Column::StudentId)
            .into_tuple()
            .all(&*self.pool)
            .await?;

        // 学生名单独查一次，课程里可能引用已改名的学生
        let names: HashMap<Uuid, String> = student_entity::Entity::find()
            .filter(student_entity::Column::TutorId.eq(tutor_id))
            .order_by_asc(student_entity::Column::Name)
            .all(&*self.pool)
            .await?
            .into_iter()
            .map(|s| (s.id, s.name))
            .collect();

        Ok(rows
            .into_iter()
            .map(|(student_id, count, total)| StudentStat {
                student_name: names.get(&student_id).cloned(),
                student_id,
                lesson_count: count.max(0) as u64,
                total_price: total.unwrap_or(0.0),
            })
            .collect())
    }

    async fn count_in_range(
        &self,
        tutor_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        status: Option<LessonStatus>,
    ) -> AppResult<u64> {
        let mut query = lesson_entity::Entity::find()
            .filter(lesson_entity::Column::TutorId.eq(tutor_id))
            .filter(lesson_entity::Column::StartTime.gte(start))
            .filter(lesson_entity::Column::StartTime.lt(end));
        if let Some(status) = status {
            query = query.filter(lesson_entity::Column::Status.eq(status));
        }
        Ok(query.count(&*self.pool).await?)
    }

    // 收入口径：已完成且已付款
    async fn earnings_in_range(
        &self,
        tutor_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AppResult<f64> {
        self.price_sum(tutor_id, start, end, LessonStatus::Completed, Some(true))
            .await
    }

    async fn price_sum(
        &self,
        tutor_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        status: LessonStatus,
        is_paid: Option<bool>,
    ) -> AppResult<f64> {
        let mut query = lesson_entity::Entity::find()
            .select_only()
            .column_as(lesson_entity::Column::Price.sum(), "total")
            .filter(lesson_entity::Column::TutorId.eq(tutor_id))
            .filter(lesson_entity::Column::Status.eq(status))
            .filter(lesson_entity::Column::StartTime.gte(start))
            .filter(lesson_entity::Column::StartTime.lt(end));
        if let Some(is_paid) = is_paid {
            query = query.filter(lesson_entity::Column::IsPaid.eq(is_paid));
        }
        let total: Option<Option<f64>> = query.into_tuple().one(&*self.pool).await?;
        Ok(total.flatten().unwrap_or(0.0))
    }
}

fn resolve_range(query: &StatisticsQuery, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let (default_start, default_end) = month_range(now);
    (
        query.start_date.unwrap_or(default_start),
        query.end_date.unwrap_or(default_end),
    )
}

/// Half-open `[first day of month, first day of next month)`.
fn month_range(t: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = month_start(t);
    let end = start.checked_add_months(Months::new(1)).unwrap_or(start);
    (start, end)
}

fn previous_month_range(t: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let this_month = month_start(t);
    let start = this_month
        .checked_sub_months(Months::new(1))
        .unwrap_or(this_month);
    (start, this_month)
}

fn month_start(t: DateTime<Utc>) -> DateTime<Utc> {
    let date = t.date_naive().with_day(1).unwrap_or(t.date_naive());
    match date.and_hms_opt(0, 0, 0) {
        Some(dt) => dt.and_utc(),
        None => t,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use sea_orm::{DatabaseBackend, MockDatabase, Value};
    use std::collections::BTreeMap;

    #[test]
    fn test_month_range_is_half_open() {
        let t = Utc.with_ymd_and_hms(2025, 6, 15, 13, 45, 0).unwrap();
        let (start, end) = month_range(t);
        assert_eq!(start, Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2025, 7, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_previous_month_range_crosses_year_boundary() {
        let t = Utc.with_ymd_and_hms(2025, 1, 10, 8, 0, 0).unwrap();
        let (start, end) = previous_month_range(t);
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 12, 1, 0, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap());
    }

    fn count_row(n: i64) -> BTreeMap<&'static str, Value> {
        [("num_items", Value::BigInt(Some(n)))].into_iter().collect()
    }

    fn sum_row(total: Option<f64>) -> BTreeMap<&'static str, Value> {
        [("total", Value::Double(total))].into_iter().collect()
    }

    #[tokio::test]
    async fn test_summary_defaults_missing_sums_to_zero() {
        // 查询顺序：total、completed、cancelled、upcoming、earnings、上月 earnings、lost
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![count_row(7)]])
            .append_query_results([vec![count_row(4)]])
            .append_query_results([vec![count_row(1)]])
            .append_query_results([vec![count_row(2)]])
            .append_query_results([vec![sum_row(Some(6000.0))]])
            .append_query_results([vec![sum_row(None)]])
            .append_query_results([vec![sum_row(Some(1500.0))]])
            .into_connection();
        let service = StatisticsService::new(std::sync::Arc::new(db));

        let now = Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap();
        let summary = service
            .summary(
                1,
                StatisticsQuery {
                    start_date: None,
                    end_date: None,
                },
                now,
            )
            .await
            .unwrap();

        assert_eq!(summary.total_lessons, 7);
        assert_eq!(summary.completed_lessons, 4);
        assert_eq!(summary.cancelled_lessons, 1);
        assert_eq!(summary.upcoming_lessons, 2);
        assert_eq!(summary.earnings, 6000.0);
        assert_eq!(summary.last_month_earnings, 0.0);
        assert_eq!(summary.lost_earnings, 1500.0);
    }
}
