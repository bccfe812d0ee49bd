//! Routes protocol tool calls to the conversation orchestrator.

use std::sync::Arc;

use serde_json::{Map, Value};

use super::catalog::ProtocolTool;
use crate::agent::ConversationOrchestrator;
use crate::tools::{ToolArguments, ToolCallResult, ToolCatalog, run_guarded};

/// Identity used for requests that are not about one student.
pub const SYSTEM_IDENTITY: &str = "系統";

/// Validates protocol tool calls and runs their handlers.
#[derive(Debug, Clone)]
pub struct ToolDispatcher {
    orchestrator: Arc<ConversationOrchestrator>,
    catalog: Arc<ToolCatalog<ProtocolTool>>,
}

impl ToolDispatcher {
    pub fn new(orchestrator: Arc<ConversationOrchestrator>) -> Self {
        Self {
            orchestrator,
            catalog: Arc::new(ToolCatalog::new()),
        }
    }

    pub fn catalog(&self) -> &ToolCatalog<ProtocolTool> {
        &self.catalog
    }

    /// Run tool `name` with its decoded argument object (`None` for none).
    ///
    /// Never fails: unknown tools, bad arguments, and handler failures all
    /// come back as error results.
    pub async fn call(&self, name: &str, arguments: Option<&Map<String, Value>>) -> ToolCallResult {
        let Some((tool, definition)) = self.catalog.resolve(name) else {
            tracing::warn!(tool_name = %name, "Unknown protocol tool");
            return ToolCallResult::error(format!("unknown tool: {name}"));
        };

        let args = match ToolArguments::validate_object(&definition.input_schema, arguments) {
            Ok(args) => args,
            Err(e) => {
                tracing::debug!(tool_name = %name, error = %e, "Rejected tool arguments");
                return ToolCallResult::error(format!("invalid arguments for tool '{name}': {e}"));
            }
        };

        tracing::info!(tool_name = %name, "Handling protocol tool call");
        run_guarded(name, self.run(tool, &args)).await
    }

    async fn run(&self, tool: ProtocolTool, args: &ToolArguments) -> anyhow::Result<ToolCallResult> {
        let agent = &self.orchestrator;
        let reply = match tool {
            ProtocolTool::QueryStudentHomework => {
                let student = args.require_str("student_name")?;
                let mut request = String::from("請查詢我的作業狀況");
                if let Some(course) = args.str("course_name") {
                    request.push_str(&format!("，特別是{course}課程"));
                }
                agent.try_send(student, &request).await?
            }
            ProtocolTool::GetStudentProfile => {
                let student = args.require_str("student_name")?;
                agent.try_send(student, "請查詢我的基本資料和選課狀況").await?
            }
            ProtocolTool::ListCourses => {
                let mut request = String::from("請列出可選修的課程");
                if let Some(subject) = args.str("subject") {
                    request.push_str(&format!("，特別是{subject}相關課程"));
                }
                agent.try_send(SYSTEM_IDENTITY, &request).await?
            }
            ProtocolTool::RecommendCourses => {
                let grade = args.require_str("grade")?;
                let mut request = format!("請為{grade}學生推薦適合的課程");
                if let Some(subject) = args.str("preferred_subject") {
                    request.push_str(&format!("，偏好科目是{subject}"));
                }
                agent.try_send(SYSTEM_IDENTITY, &request).await?
            }
            ProtocolTool::ChatWithStudent => {
                let student = args.require_str("student_name")?;
                let query = args.require_str("query")?;
                agent.try_send(student, query).await?
            }
            ProtocolTool::AnalyzeHomework => {
                agent
                    .try_analyze(
                        args.require_str("student_name")?,
                        args.require_str("homework_title")?,
                        args.require_str("submitted_content")?,
                    )
                    .await?
            }
        };
        Ok(ToolCallResult::text(reply))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ScriptedDriver, ScriptedReply};
    use crate::school::{InMemorySchoolStore, SchoolToolbox};
    use crate::session::SessionStore;
    use serde_json::json;

    fn dispatcher(driver: ScriptedDriver) -> (ToolDispatcher, Arc<ScriptedDriver>) {
        let driver = Arc::new(driver);
        let toolbox = SchoolToolbox::new(Arc::new(InMemorySchoolStore::seeded()));
        let agent = ConversationOrchestrator::new(driver.clone(), toolbox, SessionStore::new());
        (ToolDispatcher::new(Arc::new(agent)), driver)
    }

    async fn call(d: &ToolDispatcher, name: &str, arguments: Value) -> ToolCallResult {
        let Value::Object(map) = arguments else {
            panic!("test arguments must be an object");
        };
        d.call(name, Some(&map)).await
    }

    fn last_user(driver: &ScriptedDriver) -> String {
        let reqs = driver.requests();
        let messages = &reqs.last().unwrap().messages;
        messages.last().unwrap()["content"].as_str().unwrap().to_string()
    }

    fn sample_value(param: &str) -> Value {
        match param {
            "grade" => json!("國三"),
            "student_name" => json!("張小明"),
            "homework_title" => json!("三角函數應用"),
            _ => json!("內容"),
        }
    }

    #[tokio::test]
    async fn unknown_tool() {
        let (d, _) = dispatcher(ScriptedDriver::echo());
        let out = call(&d, "nope", json!({})).await;
        assert!(out.is_error);
        assert_eq!(out.joined_text(), "unknown tool: nope");
    }

    #[tokio::test]
    async fn missing_required_argument() {
        let (d, driver) = dispatcher(ScriptedDriver::echo());
        let out = call(&d, "chat_with_student", json!({"student_name": "張小明"})).await;
        assert!(out.is_error);
        assert_eq!(
            out.joined_text(),
            "invalid arguments for tool 'chat_with_student': missing required argument 'query'"
        );
        assert!(driver.requests().is_empty());
    }

    #[tokio::test]
    async fn every_required_argument_is_enforced() {
        let (d, driver) = dispatcher(ScriptedDriver::echo());
        for def in d.catalog().list() {
            let full: Map<String, Value> = def
                .input_schema
                .required
                .iter()
                .map(|p| (p.clone(), sample_value(p)))
                .collect();
            for dropped in &def.input_schema.required {
                let mut partial = full.clone();
                partial.remove(dropped);
                let out = d.call(&def.name, Some(&partial)).await;
                assert!(out.is_error, "{} without {dropped}", def.name);
                assert_eq!(
                    out.joined_text(),
                    format!(
                        "invalid arguments for tool '{}': missing required argument '{dropped}'",
                        def.name
                    )
                );
            }
        }
        assert!(driver.requests().is_empty());
    }

    #[tokio::test]
    async fn optional_only_tool_accepts_no_arguments() {
        let (d, _) = dispatcher(ScriptedDriver::echo());
        let out = call(&d, "list_courses", json!({})).await;
        assert!(!out.is_error, "{}", out.joined_text());
        assert_eq!(out.joined_text(), "echo: 請列出可選修的課程");

        let out = d.call("list_courses", None).await;
        assert!(!out.is_error, "{}", out.joined_text());
    }

    #[tokio::test]
    async fn handlers_phrase_requests() {
        let (d, driver) = dispatcher(ScriptedDriver::echo());

        call(
            &d,
            "query_student_homework",
            json!({"student_name": "張小明", "course_name": "數學"}),
        )
        .await;
        assert_eq!(last_user(&driver), "請查詢我的作業狀況，特別是數學課程");

        call(&d, "list_courses", json!({})).await;
        assert_eq!(last_user(&driver), "請列出可選修的課程");

        call(&d, "recommend_courses", json!({"grade": "國三", "preferred_subject": "數學"})).await;
        assert_eq!(last_user(&driver), "請為國三學生推薦適合的課程，偏好科目是數學");

        let out = call(&d, "chat_with_student", json!({"student_name": "張小明", "query": "你好"})).await;
        assert!(!out.is_error);
        assert_eq!(out.joined_text(), "echo: 你好");
    }

    #[tokio::test]
    async fn system_requests_share_one_identity() {
        let (d, _) = dispatcher(ScriptedDriver::echo());
        call(&d, "list_courses", json!({"subject": "英文"})).await;
        call(&d, "recommend_courses", json!({"grade": "高一"})).await;
        assert_eq!(d.orchestrator.sessions().identities(), vec![SYSTEM_IDENTITY.to_string()]);
    }

    #[tokio::test]
    async fn orchestration_failure_is_error_result() {
        let (d, _) = dispatcher(ScriptedDriver::new([ScriptedReply::fail("provider down")]));
        let out = call(&d, "get_student_profile", json!({"student_name": "張小明"})).await;
        assert!(out.is_error);
        let text = out.joined_text();
        assert!(text.starts_with("tool 'get_student_profile' failed: "), "{text}");
        assert!(text.contains("provider down"));
    }
}
