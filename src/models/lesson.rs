use crate::entities::{lesson_entity, LessonStatus, LessonType, Subject};
use crate::models::student::StudentBrief;
use crate::utils::pagination::PaginationInfo;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateLessonRequest {
    pub subject: Subject,
    pub lesson_type: LessonType,
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// 不填则回退到学生的默认课时费
    pub price: Option<f64>,
    pub student_id: Uuid,
    pub homework: Option<String>,
    pub notes: Option<String>,
    /// 按周重复，向后生成 3 个月
    #[serde(default)]
    pub is_recurring: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UpdateLessonRequest {
    pub description: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub price: Option<f64>,
    pub is_paid: Option<bool>,
    pub homework: Option<String>,
    pub notes: Option<String>,
    /// 课程评分 1-5
    pub grade: Option<i32>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RescheduleLessonRequest {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct DeleteLessonRequest {
    /// 同一系列中此课程之后（含本课）的未完成课程一并删除
    #[serde(default)]
    pub delete_all_future: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LessonQuery {
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub student_id: Option<Uuid>,
    /// 逗号分隔的状态列表，如 "SCHEDULED,RESCHEDULED"
    pub status: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LessonResponse {
    pub id: Uuid,
    pub subject: Subject,
    pub lesson_type: LessonType,
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub price: Option<f64>,
    pub is_paid: bool,
    pub status: LessonStatus,
    pub is_recurring: bool,
    pub series_id: Option<Uuid>,
    pub homework: Option<String>,
    pub notes: Option<String>,
    pub grade: Option<i32>,
    pub student_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student: Option<StudentBrief>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LessonListResponse {
    pub lessons: Vec<LessonResponse>,
    pub pagination: PaginationInfo,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateLessonResponse {
    pub lesson: LessonResponse,
    /// 本次请求实际创建的课程数（规律课程可能因冲突少于计划数）
    pub created_count: u64,
}

impl From<lesson_entity::Model> for LessonResponse {
    fn from(lesson: lesson_entity::Model) -> Self {
        Self {
            id: lesson.id,
            subject: lesson.subject,
            lesson_type: lesson.lesson_type,
            description: lesson.description,
            start_time: lesson.start_time,
            end_time: lesson.end_time,
            price: lesson.price,
            is_paid: lesson.is_paid,
            status: lesson.status,
            is_recurring: lesson.is_recurring,
            series_id: lesson.series_id,
            homework: lesson.homework,
            notes: lesson.notes,
            grade: lesson.grade,
            student_id: lesson.student_id,
            student: None,
            created_at: lesson.created_at,
        }
    }
}

impl LessonResponse {
    pub fn with_student(mut self, student: StudentBrief) -> Self {
        self.student = Some(student);
        self
    }
}
