//! Model-facing school functions.
//!
//! These are the tools the model may call during a conversation. They read
//! and write the [`SchoolStore`] directly and render results as indented
//! JSON for the model to read.

use std::sync::Arc;

use chrono::Local;
use serde_json::{Value, json};

use super::models::{DATE_FORMAT, HomeworkStatus, assistant_feedback_entry};
use super::recommend;
use super::store::{HomeworkQuery, HomeworkRecord, SchoolStore};
use crate::llm::ToolExecutor;
use crate::tools::{
    InputSchema, ToolArguments, ToolCallResult, ToolCatalog, ToolDefinition, ToolKind, run_guarded,
};

/// Tools exposed to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchoolFunction {
    GetStudentHomework,
    GetStudentProfile,
    GetCourseList,
    GetCourseDetails,
    RecommendCourses,
    SubmitHomeworkFeedback,
}

impl ToolKind for SchoolFunction {
    const ALL: &'static [Self] = &[
        Self::GetStudentHomework,
        Self::GetStudentProfile,
        Self::GetCourseList,
        Self::GetCourseDetails,
        Self::RecommendCourses,
        Self::SubmitHomeworkFeedback,
    ];

    fn name(self) -> &'static str {
        match self {
            Self::GetStudentHomework => "get_student_homework",
            Self::GetStudentProfile => "get_student_profile",
            Self::GetCourseList => "get_course_list",
            Self::GetCourseDetails => "get_course_details",
            Self::RecommendCourses => "recommend_courses",
            Self::SubmitHomeworkFeedback => "submit_homework_feedback",
        }
    }

    fn definition(self) -> ToolDefinition {
        let (description, schema) = match self {
            Self::GetStudentHomework => (
                "取得學生的作業資料，包括成績和老師回饋",
                InputSchema::object()
                    .required("student_name", "學生姓名")
                    .optional("course_name", "課程名稱（可選）")
                    .optional_enum("status", "作業狀態（可選）", &HomeworkStatus::NAMES),
            ),
            Self::GetStudentProfile => (
                "取得學生的基本資料和選課狀況",
                InputSchema::object().required("student_name", "學生姓名"),
            ),
            Self::GetCourseList => (
                "取得課程列表，可依科目篩選",
                InputSchema::object().optional("subject", "科目名稱（可選，如：數學、英文、物理）"),
            ),
            Self::GetCourseDetails => (
                "取得特定課程的詳細資訊，包括學生名單",
                InputSchema::object().required("course", "課程名稱或課程編號"),
            ),
            Self::RecommendCourses => (
                "根據學生年級和興趣推薦適合的課程",
                InputSchema::object()
                    .required("grade", "學生年級（如：國一、國二、國三、高一、高二、高三）")
                    .optional("preferred_subject", "感興趣的科目（可選）"),
            ),
            Self::SubmitHomeworkFeedback => (
                "為學生作業提供 AI 協助回饋",
                InputSchema::object()
                    .required("student_name", "學生姓名")
                    .required("homework_title", "作業標題")
                    .required("ai_feedback", "AI 建議回饋"),
            ),
        };
        ToolDefinition::new(self.name(), description, schema)
    }
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

fn homework_json(r: &HomeworkRecord) -> Value {
    let hw = &r.homework;
    json!({
        "學生": r.student_name,
        "課程": r.course_name,
        "作業標題": hw.title,
        "作業描述": hw.description,
        "指派日期": hw.assigned_date.format(DATE_FORMAT).to_string(),
        "截止日期": hw.due_date.format(DATE_FORMAT).to_string(),
        "繳交日期": hw.submitted_date.map_or_else(|| "未繳交".to_string(), |d| d.format(DATE_FORMAT).to_string()),
        "成績": hw.score.map_or_else(|| "未評分".to_string(), |s| s.to_string()),
        "老師回饋": hw.feedback.as_deref().unwrap_or("無回饋"),
        "狀態": hw.status.as_str(),
        "學生作答內容": hw.submitted_content.as_deref().unwrap_or("未繳交"),
    })
}

fn final_grade(grade: Option<f32>) -> String {
    grade.map_or_else(|| "未評分".to_string(), |g| g.to_string())
}

/// Validates and runs [`SchoolFunction`]s against a store.
#[derive(Debug, Clone)]
pub struct SchoolToolbox {
    store: Arc<dyn SchoolStore>,
    catalog: Arc<ToolCatalog<SchoolFunction>>,
}

impl SchoolToolbox {
    pub fn new(store: Arc<dyn SchoolStore>) -> Self {
        Self {
            store,
            catalog: Arc::new(ToolCatalog::new()),
        }
    }

    pub fn catalog(&self) -> &ToolCatalog<SchoolFunction> {
        &self.catalog
    }

    pub fn store(&self) -> &Arc<dyn SchoolStore> {
        &self.store
    }

    /// Validate `arguments` for tool `name` and run it.
    pub async fn dispatch(&self, name: &str, arguments: &Value) -> ToolCallResult {
        let Some((function, definition)) = self.catalog.resolve(name) else {
            tracing::warn!(tool_name = %name, "Unknown school function");
            return ToolCallResult::error(format!("unknown tool: {name}"));
        };
        let args = match ToolArguments::validate(&definition.input_schema, arguments) {
            Ok(args) => args,
            Err(e) => {
                return ToolCallResult::error(format!("invalid arguments for tool '{name}': {e}"));
            }
        };
        run_guarded(name, self.run(function, &args)).await
    }

    async fn run(&self, function: SchoolFunction, args: &ToolArguments) -> anyhow::Result<ToolCallResult> {
        match function {
            SchoolFunction::GetStudentHomework => self.student_homework(args).await,
            SchoolFunction::GetStudentProfile => self.student_profile(args).await,
            SchoolFunction::GetCourseList => self.course_list(args).await,
            SchoolFunction::GetCourseDetails => self.course_details(args).await,
            SchoolFunction::RecommendCourses => self.recommend_courses(args).await,
            SchoolFunction::SubmitHomeworkFeedback => self.submit_feedback(args).await,
        }
    }

    async fn student_homework(&self, args: &ToolArguments) -> anyhow::Result<ToolCallResult> {
        let student = args.require_str("student_name")?;
        let mut query = HomeworkQuery::for_student(student);
        query.course_name = args.str("course_name").map(ToString::to_string);
        query.status = args.str("status").and_then(HomeworkStatus::parse);

        let records = self.store.student_homework(&query).await?;
        if records.is_empty() {
            return Ok(ToolCallResult::error(format!("找不到學生 {student} 的作業記錄")));
        }
        let list: Vec<Value> = records.iter().map(homework_json).collect();
        Ok(ToolCallResult::text(pretty(&Value::Array(list))))
    }

    async fn student_profile(&self, args: &ToolArguments) -> anyhow::Result<ToolCallResult> {
        let student = args.require_str("student_name")?;
        let Some(profile) = self.store.find_student(student).await? else {
            return Ok(ToolCallResult::error(format!("找不到學生 {student}")));
        };

        let s = &profile.student;
        let courses: Vec<Value> = profile
            .enrollments
            .iter()
            .map(|e| {
                json!({
                    "課程名稱": e.course.name,
                    "科目": e.course.subject,
                    "老師": e.course.teacher_name,
                    "選課日期": e.enrollment.enrollment_date.format(DATE_FORMAT).to_string(),
                    "狀態": e.enrollment.status.as_str(),
                    "期末成績": final_grade(e.enrollment.final_grade),
                })
            })
            .collect();

        Ok(ToolCallResult::text(pretty(&json!({
            "學生姓名": s.name,
            "電子郵件": s.email,
            "年級": s.grade,
            "入學日期": s.enrollment_date.format(DATE_FORMAT).to_string(),
            "選修課程": courses,
        }))))
    }

    async fn course_list(&self, args: &ToolArguments) -> anyhow::Result<ToolCallResult> {
        let subject = args.str("subject");
        let listings = self.store.list_courses(subject).await?;
        if listings.is_empty() {
            return Ok(ToolCallResult::text(subject.map_or_else(
                || "目前沒有開設課程".to_string(),
                |s| format!("目前沒有開設 {s} 相關課程"),
            )));
        }

        let list: Vec<Value> = listings
            .iter()
            .map(|l| {
                let c = &l.course;
                json!({
                    "課程編號": c.id,
                    "課程名稱": c.name,
                    "科目": c.subject,
                    "課程描述": c.description,
                    "授課老師": c.teacher_name,
                    "學費": c.price,
                    "招生人數上限": c.max_students,
                    "目前報名人數": l.total_enrollments,
                    "開課日期": c.start_date.format(DATE_FORMAT).to_string(),
                    "結束日期": c.end_date.format(DATE_FORMAT).to_string(),
                    "是否可報名": if l.is_open() { "可報名" } else { "已額滿" },
                })
            })
            .collect();
        Ok(ToolCallResult::text(pretty(&Value::Array(list))))
    }

    async fn course_details(&self, args: &ToolArguments) -> anyhow::Result<ToolCallResult> {
        let identifier = args.require_str("course")?;
        let Some(detail) = self.store.find_course(identifier).await? else {
            return Ok(ToolCallResult::error(format!("找不到課程：{identifier}")));
        };

        let c = &detail.course;
        let roster: Vec<Value> = detail
            .roster
            .iter()
            .map(|r| {
                json!({
                    "學生姓名": r.student.name,
                    "年級": r.student.grade,
                    "選課日期": r.enrollment.enrollment_date.format(DATE_FORMAT).to_string(),
                    "期末成績": final_grade(r.enrollment.final_grade),
                })
            })
            .collect();
        let active = u32::try_from(detail.roster.len()).unwrap_or(u32::MAX);

        Ok(ToolCallResult::text(pretty(&json!({
            "課程資訊": {
                "課程編號": c.id,
                "課程名稱": c.name,
                "科目": c.subject,
                "課程描述": c.description,
                "授課老師": c.teacher_name,
                "學費": c.price,
                "招生人數上限": c.max_students,
                "開課日期": c.start_date.format(DATE_FORMAT).to_string(),
                "結束日期": c.end_date.format(DATE_FORMAT).to_string(),
            },
            "學生名單": roster,
            "統計資訊": {
                "目前報名人數": active,
                "剩餘名額": c.max_students.saturating_sub(active),
            },
        }))))
    }

    async fn recommend_courses(&self, args: &ToolArguments) -> anyhow::Result<ToolCallResult> {
        let grade = args.require_str("grade")?;
        let preferred = args.str("preferred_subject");
        let listings = self.store.list_courses(None).await?;
        let picks = recommend::recommend(&listings, grade, preferred, Local::now().date_naive());

        if picks.is_empty() {
            return Ok(ToolCallResult::text(format!("目前沒有適合 {grade} 學生的課程推薦")));
        }

        let courses: Vec<Value> = picks
            .iter()
            .map(|r| {
                let c = &r.listing.course;
                json!({
                    "課程名稱": c.name,
                    "科目": c.subject,
                    "授課老師": c.teacher_name,
                    "學費": c.price,
                    "開課日期": c.start_date.format(DATE_FORMAT).to_string(),
                    "剩餘名額": r.listing.remaining_seats(),
                    "推薦指數": r.score,
                })
            })
            .collect();

        Ok(ToolCallResult::text(pretty(&json!({
            "推薦原因": format!("為 {grade} 學生推薦以下課程"),
            "推薦課程": courses,
        }))))
    }

    async fn submit_feedback(&self, args: &ToolArguments) -> anyhow::Result<ToolCallResult> {
        let student = args.require_str("student_name")?;
        let title = args.require_str("homework_title")?;
        let feedback = args.require_str("ai_feedback")?;

        let entry = assistant_feedback_entry(Local::now().naive_local(), feedback);
        match self.store.append_homework_feedback(student, title, &entry).await? {
            Some(record) => {
                tracing::info!(
                    student = %record.student_name,
                    homework = %record.homework.title,
                    "Assistant feedback appended"
                );
                Ok(ToolCallResult::text(format!(
                    "已為學生 {student} 的作業 {title} 添加 AI 回饋"
                )))
            }
            None => Ok(ToolCallResult::error(format!(
                "找不到學生 {student} 的作業 {title}"
            ))),
        }
    }
}

#[async_trait::async_trait]
impl ToolExecutor for SchoolToolbox {
    fn tool_schemas(&self) -> Vec<Value> {
        self.catalog.openai_tools_json()
    }

    async fn execute(&self, name: &str, arguments: Value) -> ToolCallResult {
        self.dispatch(name, &arguments).await
    }
}
