use crate::entities::{LessonType, Subject};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StatisticsQuery {
    /// 默认当月月初
    pub start_date: Option<DateTime<Utc>>,
    /// 默认当月月末
    pub end_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StatisticsResponse {
    pub total_lessons: u64,
    pub completed_lessons: u64,
    pub cancelled_lessons: u64,
    pub upcoming_lessons: u64,
    /// 已完成且已付款课程的收入
    pub earnings: f64,
    pub last_month_earnings: f64,
    /// 被取消课程的损失
    pub lost_earnings: f64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SubjectStat {
    pub subject: Subject,
    pub lesson_count: u64,
    pub total_price: f64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LessonTypeStat {
    pub lesson_type: LessonType,
    pub lesson_count: u64,
    pub total_price: f64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StudentStat {
    pub student_id: Uuid,
    pub student_name: Option<String>,
    pub lesson_count: u64,
    pub total_price: f64,
}
