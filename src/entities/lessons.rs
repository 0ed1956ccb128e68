use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{DeriveActiveEnum, EnumIter};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(
    Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema, DeriveActiveEnum, EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "String(None)")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Subject {
    #[sea_orm(string_value = "MATHEMATICS")]
    Mathematics,
    #[sea_orm(string_value = "PHYSICS")]
    Physics,
}

impl std::fmt::Display for Subject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Subject::Mathematics => write!(f, "MATHEMATICS"),
            Subject::Physics => write!(f, "PHYSICS"),
        }
    }
}

#[derive(
    Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema, DeriveActiveEnum, EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "String(None)")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LessonType {
    #[sea_orm(string_value = "EGE")]
    Ege,
    #[sea_orm(string_value = "OGE")]
    Oge,
    #[sea_orm(string_value = "OLYMPICS")]
    Olympics,
    #[sea_orm(string_value = "SCHOOL")]
    School,
}

impl std::fmt::Display for LessonType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LessonType::Ege => write!(f, "EGE"),
            LessonType::Oge => write!(f, "OGE"),
            LessonType::Olympics => write!(f, "OLYMPICS"),
            LessonType::School => write!(f, "SCHOOL"),
        }
    }
}

/// Lesson lifecycle. SCHEDULED/IN_PROGRESS/COMPLETED are driven by the
/// periodic sweep; CANCELLED and RESCHEDULED only by explicit user actions.
#[derive(
    Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema, DeriveActiveEnum, EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "String(None)")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LessonStatus {
    #[sea_orm(string_value = "SCHEDULED")]
    Scheduled,
    #[sea_orm(string_value = "IN_PROGRESS")]
    InProgress,
    #[sea_orm(string_value = "COMPLETED")]
    Completed,
    #[sea_orm(string_value = "CANCELLED")]
    Cancelled,
    #[sea_orm(string_value = "RESCHEDULED")]
    Rescheduled,
}

impl std::fmt::Display for LessonStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LessonStatus::Scheduled => write!(f, "SCHEDULED"),
            LessonStatus::InProgress => write!(f, "IN_PROGRESS"),
            LessonStatus::Completed => write!(f, "COMPLETED"),
            LessonStatus::Cancelled => write!(f, "CANCELLED"),
            LessonStatus::Rescheduled => write!(f, "RESCHEDULED"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "lessons")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub tutor_id: i64,
    pub student_id: Uuid,
    pub subject: Subject,
    pub lesson_type: LessonType,
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub price: Option<f64>,
    pub is_paid: bool,
    pub status: LessonStatus,
    pub is_recurring: bool,
    /// 同一周期系列的所有课程共享一个 series_id
    pub series_id: Option<Uuid>,
    pub homework: Option<String>,
    pub notes: Option<String>,
    /// 课程评分 1-5
    pub grade: Option<i32>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
