//! Tools advertised to protocol clients.

use crate::tools::{InputSchema, ToolDefinition, ToolKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolTool {
    QueryStudentHomework,
    GetStudentProfile,
    ListCourses,
    RecommendCourses,
    ChatWithStudent,
    AnalyzeHomework,
}

impl ToolKind for ProtocolTool {
    const ALL: &'static [Self] = &[
        Self::QueryStudentHomework,
        Self::GetStudentProfile,
        Self::ListCourses,
        Self::RecommendCourses,
        Self::ChatWithStudent,
        Self::AnalyzeHomework,
    ];

    fn name(self) -> &'static str {
        match self {
            Self::QueryStudentHomework => "query_student_homework",
            Self::GetStudentProfile => "get_student_profile",
            Self::ListCourses => "list_courses",
            Self::RecommendCourses => "recommend_courses",
            Self::ChatWithStudent => "chat_with_student",
            Self::AnalyzeHomework => "analyze_homework",
        }
    }

    fn definition(self) -> ToolDefinition {
        let (description, schema) = match self {
            Self::QueryStudentHomework => (
                "查詢學生的作業狀況、成績和老師回饋",
                InputSchema::object()
                    .required("student_name", "學生姓名")
                    .optional("course_name", "課程名稱（可選）"),
            ),
            Self::GetStudentProfile => (
                "取得學生的基本資料和選課狀況",
                InputSchema::object().required("student_name", "學生姓名"),
            ),
            Self::ListCourses => (
                "列出可選修的課程，可依科目篩選",
                InputSchema::object().optional("subject", "科目名稱（可選）"),
            ),
            Self::RecommendCourses => (
                "根據學生年級和興趣推薦適合的課程",
                InputSchema::object()
                    .required("grade", "學生年級")
                    .optional("preferred_subject", "偏好科目（可選）"),
            ),
            Self::ChatWithStudent => (
                "與學生進行智慧對話，提供個人化學習指導",
                InputSchema::object()
                    .required("student_name", "學生姓名")
                    .required("query", "學生的問題或需求"),
            ),
            Self::AnalyzeHomework => (
                "分析學生作業並提供 AI 回饋",
                InputSchema::object()
                    .required("student_name", "學生姓名")
                    .required("homework_title", "作業標題")
                    .required("submitted_content", "學生提交的作業內容"),
            ),
        };
        ToolDefinition::new(self.name(), description, schema)
    }
}
