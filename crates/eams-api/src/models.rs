//! Wire models for the course-selection service.
//!
//! Only the fields the client and robber read are modelled; responses
//! default missing fields so schema drift on the portal side does not
//! break decoding.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// The envelope every endpoint responds with.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope {
    pub result: i64,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: serde_json::Value,
}

/// An enrollment round.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Turn {
    pub id: i64,
    pub name: String,
    pub bulletin: String,
    pub open_date_time_text: String,
    pub select_date_time_text: String,
    pub drop_date_time_text: String,
    pub select_date_time_range: TimeRange,
    pub drop_date_time_range: TimeRange,
    pub turn_mode: TurnMode,
    pub allow_enter: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TimeRange {
    pub start_date_time: String,
    pub end_date_time: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TurnMode {
    pub enable_pre_select: bool,
    pub enable_delay_release: bool,
    pub enable_virtual_wallet: bool,
    pub show_count: bool,
}

/// A section as returned by lesson queries and the selected list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Lesson {
    pub id: i64,
    pub name_zh: String,
    pub name_en: Option<String>,
    pub code: String,
    pub teachers: Vec<Teacher>,
    pub course: Course,
    pub limit_count: i64,
    pub date_time_place: DateTimePlace,
    pub virtual_cost: Option<i64>,
    pub retake: bool,
    pub pinned: bool,
}

impl Lesson {
    pub fn teacher_names(&self) -> String {
        self.teachers
            .iter()
            .map(|t| t.name_zh.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Teacher {
    pub id: i64,
    pub name_zh: String,
    pub name_en: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Course {
    pub id: i64,
    pub name_zh: String,
    pub code: String,
    pub credits: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DateTimePlace {
    pub text_zh: String,
    pub text_en: String,
    pub text: String,
}

/// Round configuration for one student, from `{student}/turn/{turn}/select`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SelectDetail {
    pub pack_course_select: bool,
    pub retake_disallow: bool,
    pub retake_exclusive_allow: bool,
    pub substitute_course_retake: bool,
    pub retake_passed_disallow: bool,
    pub conflict_agree_not_attend: bool,
    pub turn: TurnDetail,
    pub biz_type_id: i64,
    /// Lesson queries are scoped to this semester's id.
    pub semester: Semester,
    pub campus_id: i64,
    pub program_id: i64,
    pub program: Program,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TurnDetail {
    pub id: i64,
    pub semester_assoc: i64,
    pub turn_mode: TurnMode,
    pub name: String,
    pub bulletin: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Semester {
    pub id: i64,
    pub name_zh: String,
    pub name_en: Option<String>,
    pub season: String,
    pub calendar_id: i64,
}

/// Degree program the student is enrolled in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Program {
    pub id: i64,
    pub name_zh: String,
    pub name_en: Option<String>,
    pub program_type: String,
    pub season: String,
    pub biz_type_id: i64,
    pub require_credits: f64,
}

/// Filter values offered by `query-condition/{turn}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct QueryCondition {
    pub grades: Vec<String>,
    pub departments: Vec<Department>,
    pub campuses: Vec<Campus>,
    pub course_types: Vec<CourseType>,
    pub course_properties: Vec<CourseProperty>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Department {
    pub id: i64,
    pub name_zh: String,
    pub name_en: Option<String>,
    pub code: String,
    pub telephone: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Campus {
    pub id: i64,
    pub name_zh: String,
    pub name_en: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CourseType {
    pub id: i64,
    pub name_zh: String,
    pub name_en: Option<String>,
    pub code: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CourseProperty {
    pub id: i64,
    pub name_zh: String,
    pub name_en: Option<String>,
    pub code: String,
}

/// A failed or retakeable course listed by `repaired-courses`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RepairedCourse {
    pub id: i64,
    pub name_zh: String,
    pub name_en: Option<String>,
    pub code: String,
    pub credits: f64,
    pub flags: serde_json::Value,
    pub department: Department,
    pub score: Option<f64>,
    pub course_select_pass_status: String,
    pub course_type: CourseType,
    pub passed: bool,
}

/// Filter for `query-lesson`. Empty strings mean "no filter".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonQueryRequest {
    pub turn_id: i64,
    pub student_id: i64,
    pub semester_id: i64,
    pub page_no: u32,
    pub page_size: u32,
    pub course_name_or_code: String,
    pub lesson_name_or_code: String,
    pub teacher_name_or_code: String,
    pub week: String,
    pub grade: String,
    pub department_id: String,
    pub campus_id: String,
    pub course_type_id: String,
    pub can_select: bool,
    #[serde(rename = "_canSelect")]
    pub can_select_text: String,
    pub has_count: Option<bool>,
    pub ids: Vec<i64>,
    pub sort_field: String,
    pub sort_type: String,
}

impl LessonQueryRequest {
    /// Selectable sections, first page of 20, ordered by lesson code.
    pub fn selectable(student_id: i64, turn_id: i64) -> Self {
        Self {
            turn_id,
            student_id,
            semester_id: 0,
            page_no: 1,
            page_size: 20,
            course_name_or_code: String::new(),
            lesson_name_or_code: String::new(),
            teacher_name_or_code: String::new(),
            week: String::new(),
            grade: String::new(),
            department_id: String::new(),
            campus_id: String::new(),
            course_type_id: String::new(),
            can_select: true,
            can_select_text: "可选".to_string(),
            has_count: None,
            ids: Vec::new(),
            sort_field: "lesson".to_string(),
            sort_type: "ASC".to_string(),
        }
    }

    /// Scope the query to a semester, as reported by the select detail.
    pub fn in_semester(mut self, semester_id: i64) -> Self {
        self.semester_id = semester_id;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LessonQueryResponse {
    pub lessons: Vec<Lesson>,
    pub page_info: PageInfo,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PageInfo {
    pub current_page: u32,
    pub rows_in_page: u32,
    pub rows_per_page: u32,
    pub total_rows: u32,
    pub total_pages: u32,
}

/// Seat counters for one section. `am*` fields count cross-major seats
/// and `pre*` fields count pre-selections.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CountInfo {
    pub limit_count: i64,
    pub am_limit_count: i64,
    pub std_count: i64,
    pub am_std_count: i64,
    pub pre_std_count: i64,
    pub pre_am_std_count: i64,
}

impl From<CountInfo> for eams_core::SeatCount {
    fn from(info: CountInfo) -> Self {
        eams_core::SeatCount::new(info.limit_count, info.std_count)
    }
}

/// Result of `std-count`: lesson id → counter text.
pub type StdCounts = HashMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestMiddleDto {
    pub lesson_assoc: i64,
    pub virtual_cost: i64,
}

/// Body of `add-predicate` and `add-request`; both share one shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddPayload {
    pub student_assoc: i64,
    pub course_select_turn_assoc: i64,
    pub request_middle_dtos: Vec<RequestMiddleDto>,
    pub course_pack_assoc: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DropPredicate {
    pub student_assoc: i64,
    pub course_select_turn_assoc: i64,
    pub lesson_assoc_set: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DropRequest {
    pub student_assoc: i64,
    pub course_select_turn_assoc: i64,
    pub lesson_assocs: Vec<i64>,
    pub course_pack_assoc: Option<i64>,
}

/// Asynchronous outcome of a predicate or add/drop submission.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AddDropResponse {
    pub id: Option<String>,
    pub request_id: Option<String>,
    pub error_message: Option<String>,
    pub success: bool,
    pub result: Option<serde_json::Value>,
}
