//! Canned replies used when no model provider is configured.

use super::{EventStream, LlmDriver, LlmRequest, NormalizedEvent};

const HOMEWORK_REPLY: &str = "我已經查詢了您的作業狀況。根據記錄，您有幾份作業需要注意：\n\n\
📚 二次函數練習 - 已評分 (85分)\n\
老師回饋：計算正確，但要注意圖形標示\n\n\
📚 三角函數應用 - 已繳交，等待評分\n\
您提到需要第6題的協助，建議複習三角函數的基本性質。\n\n\
繼續保持用功！如有問題歡迎隨時詢問。";

const COURSE_REPLY: &str = "以下是為您推薦的課程：\n\n\
📖 國三數學總復習\n\
授課老師：陳老師\n\
學費：$12,000\n\
開課日期：適合會考準備\n\n\
這門課程很適合您目前的程度，建議盡早報名！";

const GREETING_REPLY: &str = "您好！我是智慧補習班 AI 助理。我可以協助您：\n\n\
✅ 查詢作業狀況和成績\n\
✅ 推薦適合的課程\n\
✅ 提供學習建議\n\
✅ 解答學習相關問題\n\n\
請告訴我您需要什麼協助？\n\n\
💡 提示：由於未設定模型服務金鑰，目前使用模擬回應。";

/// Keyword-matched replies keyed on the last message. Never calls tools.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineDriver;

impl OfflineDriver {
    pub fn reply_for(message: &str) -> &'static str {
        let lower = message.to_lowercase();
        if message.contains("作業") || lower.contains("homework") {
            HOMEWORK_REPLY
        } else if message.contains("課程") || lower.contains("course") {
            COURSE_REPLY
        } else {
            GREETING_REPLY
        }
    }
}

#[async_trait::async_trait]
impl LlmDriver for OfflineDriver {
    async fn stream(&self, req: LlmRequest) -> anyhow::Result<EventStream> {
        let last = req
            .messages
            .last()
            .and_then(|m| m["content"].as_str())
            .unwrap_or_default();
        let events = [
            Ok(NormalizedEvent::MessageDelta {
                text: Self::reply_for(last).to_string(),
            }),
            Ok(NormalizedEvent::Done),
        ];
        Ok(Box::pin(futures::stream::iter(events)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_routing() {
        assert!(OfflineDriver::reply_for("請查詢我的作業狀況").contains("二次函數練習"));
        assert!(OfflineDriver::reply_for("Any COURSE ideas?").contains("國三數學總復習"));
        assert!(OfflineDriver::reply_for("hello").contains("AI 助理"));
    }
}
