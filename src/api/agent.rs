//! Conversation endpoints.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::bad_request;
use crate::AppState;

fn blank(s: &str) -> bool {
    s.trim().is_empty()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[serde(default)]
    pub student_name: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub student_name: String,
    pub response: String,
    pub timestamp: DateTime<Utc>,
}

/// POST /api/agent/chat
pub async fn chat(State(state): State<AppState>, Json(req): Json<ChatRequest>) -> Response {
    if blank(&req.student_name) || blank(&req.message) {
        return bad_request("學生姓名和訊息不能為空");
    }

    let response = state.agent.send(&req.student_name, &req.message).await;
    Json(ChatResponse {
        student_name: req.student_name,
        response,
        timestamp: Utc::now(),
    })
    .into_response()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HomeworkAnalysisRequest {
    #[serde(default)]
    pub student_name: String,
    #[serde(default)]
    pub homework_title: String,
    #[serde(default)]
    pub submitted_content: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HomeworkAnalysisResponse {
    pub student_name: String,
    pub homework_title: String,
    pub feedback: String,
    pub timestamp: DateTime<Utc>,
}

/// POST /api/agent/analyze-homework
pub async fn analyze_homework(
    State(state): State<AppState>,
    Json(req): Json<HomeworkAnalysisRequest>,
) -> Response {
    if blank(&req.student_name) || blank(&req.homework_title) || blank(&req.submitted_content) {
        return bad_request("所有欄位都是必填的");
    }

    let feedback = state
        .agent
        .analyze(&req.student_name, &req.homework_title, &req.submitted_content)
        .await;
    Json(HomeworkAnalysisResponse {
        student_name: req.student_name,
        homework_title: req.homework_title,
        feedback,
        timestamp: Utc::now(),
    })
    .into_response()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyRecommendationResponse {
    pub student_name: String,
    pub recommendation: String,
    pub date: NaiveDate,
    pub timestamp: DateTime<Utc>,
}

/// GET /api/agent/daily-recommendation/{student_name}
pub async fn daily_recommendation(
    State(state): State<AppState>,
    Path(student_name): Path<String>,
) -> Response {
    if blank(&student_name) {
        return bad_request("學生姓名不能為空");
    }

    let recommendation = state.agent.recommend_daily(&student_name).await;
    Json(DailyRecommendationResponse {
        student_name,
        recommendation,
        date: Local::now().date_naive(),
        timestamp: Utc::now(),
    })
    .into_response()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatHistorySummaryResponse {
    pub student_name: String,
    pub summary: String,
    pub user_turns: usize,
    pub assistant_turns: usize,
    pub timestamp: DateTime<Utc>,
}

/// GET /api/agent/chat-history/{student_name}
pub async fn chat_history(
    State(state): State<AppState>,
    Path(student_name): Path<String>,
) -> Response {
    if blank(&student_name) {
        return bad_request("學生姓名不能為空");
    }

    let summary = state.agent.summary(&student_name).await;
    Json(ChatHistorySummaryResponse {
        summary: summary.to_string(),
        user_turns: summary.user_turns(),
        assistant_turns: summary.assistant_turns(),
        student_name,
        timestamp: Utc::now(),
    })
    .into_response()
}

/// DELETE /api/agent/chat-history/{student_name}
pub async fn clear_history(
    State(state): State<AppState>,
    Path(student_name): Path<String>,
) -> StatusCode {
    state.agent.clear(&student_name).await;
    StatusCode::NO_CONTENT
}
