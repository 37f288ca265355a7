//! Habit plan generation through an OpenAI-compatible chat endpoint
//!
//! The planner asks the model for a JSON plan and reconciles whatever comes
//! back: the declared duration is clamped to the supported range and the
//! task list is padded or truncated to match it. Transient failures
//! (network, 5xx, 429, garbled content) are retried with exponential
//! backoff; a well-formed response that lacks the required fields fails
//! immediately since retrying cannot fix its shape.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::db::schemas::HabitKind;
use crate::habits::schedule::{MAX_DURATION_DAYS, MIN_DURATION_DAYS};
use crate::types::{Result, RitualError};

const SYSTEM_PROMPT: &str = "You are a habit formation expert. Create personalized daily tasks for habits.\n\
For 'build' type: focus on progressive skill development and positive reinforcement.\n\
For 'quit' type: focus on gradual reduction and alternative behaviors.\n\
Return ONLY valid JSON without markdown formatting.";

/// Planner configuration
#[derive(Debug, Clone)]
pub struct PlannerConfig {
    pub api_key: String,
    /// Base URL of the chat-completions API, without the endpoint path
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
    /// Total attempts per plan, including the first
    pub max_attempts: u8,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            timeout: Duration::from_secs(30),
            max_attempts: 3,
        }
    }
}

/// A reconciled habit plan: exactly `duration` day titles
#[derive(Debug, Clone, PartialEq)]
pub struct HabitPlan {
    pub duration: i64,
    pub day_titles: Vec<String>,
}

/// Client for the plan-generation endpoint
#[derive(Clone)]
pub struct AiPlanner {
    http_client: reqwest::Client,
    config: PlannerConfig,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    response_format: ResponseFormat<'a>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat<'a> {
    #[serde(rename = "type")]
    format_type: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPlan {
    duration: Option<i64>,
    daily_tasks: Option<Vec<RawTask>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTask {
    day_title: String,
}

/// Failures during one attempt, split by whether a retry can help
enum AttemptError {
    Transient(String),
    Fatal(RitualError),
}

impl AiPlanner {
    pub fn new(config: PlannerConfig) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            http_client,
            config,
        }
    }

    /// Generate a plan for the habit. `duration` pins the plan length; when
    /// absent the model picks one between 21 and 90 days.
    pub async fn generate_plan(
        &self,
        title: &str,
        kind: HabitKind,
        duration: Option<i64>,
    ) -> Result<HabitPlan> {
        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt(title, kind, duration),
                },
            ],
            temperature: 0.7,
            response_format: ResponseFormat {
                format_type: "json_object",
            },
        };

        debug!(title, %kind, requested_duration = ?duration, "Requesting AI habit plan");

        let mut attempts = 0u8;
        loop {
            attempts += 1;

            match self.request_plan(&url, &request).await {
                Ok(raw) => return reconcile(raw, title),
                Err(AttemptError::Fatal(e)) => return Err(e),
                Err(AttemptError::Transient(detail)) => {
                    if attempts >= self.config.max_attempts {
                        return Err(RitualError::ExternalService(detail));
                    }
                    warn!(attempt = attempts, "AI plan attempt failed: {}", detail);
                }
            }

            // Exponential backoff
            let delay = Duration::from_millis(100 * 2u64.pow(attempts as u32 - 1));
            tokio::time::sleep(delay).await;
        }
    }

    async fn request_plan(
        &self,
        url: &str,
        request: &ChatRequest<'_>,
    ) -> std::result::Result<RawPlan, AttemptError> {
        let response = self
            .http_client
            .post(url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(request)
            .send()
            .await
            .map_err(|e| AttemptError::Transient(format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            // Only overload-shaped statuses are worth retrying; a 401 or
            // 400 will not change on the next attempt.
            if status.is_server_error() || status.as_u16() == 429 {
                return Err(AttemptError::Transient(format!("HTTP {}", status)));
            }
            return Err(AttemptError::Fatal(RitualError::ExternalService(format!(
                "HTTP {}",
                status
            ))));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| AttemptError::Transient(format!("Malformed response: {}", e)))?;

        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.is_empty())
            .ok_or_else(|| AttemptError::Transient("No response content".to_string()))?;

        // The model was asked for a JSON object; anything unparseable is a
        // generation hiccup worth one more try.
        let value: serde_json::Value = serde_json::from_str(&content)
            .map_err(|e| AttemptError::Transient(format!("Plan is not valid JSON: {}", e)))?;

        // A parsed object with the wrong shape is a contract violation;
        // retrying the same prompt will not change it.
        serde_json::from_value(value)
            .map_err(|e| AttemptError::Fatal(RitualError::ExternalService(format!(
                "Invalid plan format: {}",
                e
            ))))
    }
}

fn user_prompt(title: &str, kind: HabitKind, duration: Option<i64>) -> String {
    match duration {
        Some(days) => format!(
            "Create a {days}-day habit plan for \"{title}\" (type: {kind}).\n\
             Return a JSON object with:\n\
             {{\n\
               \"duration\": {days},\n\
               \"dailyTasks\": [\n\
                 {{\"dayTitle\": \"Day 1 task description\", \"completed\": false}},\n\
                 ...\n\
               ]\n\
             }}\n\
             Each dayTitle should be a specific, actionable task for that day.\n\
             Create exactly {days} daily tasks.\n\
             Return ONLY valid JSON, no additional text."
        ),
        None => format!(
            "Create an optimal habit plan for \"{title}\" (type: {kind}).\n\
             Determine the best duration (between 21 and 90 days) and create daily tasks.\n\
             Return a JSON object with:\n\
             {{\n\
               \"duration\": <optimal_duration_number>,\n\
               \"dailyTasks\": [\n\
                 {{\"dayTitle\": \"Day 1 task description\", \"completed\": false}},\n\
                 ...\n\
               ]\n\
             }}\n\
             Each dayTitle should be a specific, actionable task for that day.\n\
             The number of daily tasks must match the duration.\n\
             Return ONLY valid JSON, no additional text."
        ),
    }
}

/// Turn a raw model answer into a plan the schedule builder will accept.
fn reconcile(raw: RawPlan, habit_title: &str) -> Result<HabitPlan> {
    let duration = raw
        .duration
        .ok_or_else(|| RitualError::ExternalService("Plan is missing a duration".to_string()))?
        .clamp(MIN_DURATION_DAYS, MAX_DURATION_DAYS);
    let tasks = raw
        .daily_tasks
        .ok_or_else(|| RitualError::ExternalService("Plan is missing daily tasks".to_string()))?;

    let mut day_titles: Vec<String> = tasks
        .into_iter()
        .take(duration as usize)
        .map(|task| task.day_title)
        .collect();

    // Short lists are padded with the habit title so every scheduled day
    // still has a task.
    while (day_titles.len() as i64) < duration {
        day_titles.push(habit_title.to_string());
    }

    Ok(HabitPlan {
        duration,
        day_titles,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Mock, Server, ServerGuard};

    fn planner_for(server: &ServerGuard, max_attempts: u8) -> AiPlanner {
        AiPlanner::new(PlannerConfig {
            api_key: "test-key".to_string(),
            base_url: server.url(),
            model: "gpt-4o-mini".to_string(),
            timeout: Duration::from_secs(5),
            max_attempts,
        })
    }

    fn chat_body(content: &str) -> String {
        serde_json::json!({
            "choices": [{ "message": { "content": content } }]
        })
        .to_string()
    }

    async fn mock_completion(server: &mut ServerGuard, status: usize, body: String) -> Mock {
        server
            .mock("POST", "/chat/completions")
            .with_status(status)
            .with_header("content-type", "application/json")
            .with_body(body)
            .create_async()
            .await
    }

    #[tokio::test]
    async fn test_parses_a_well_formed_plan() {
        let mut server = Server::new_async().await;
        let plan = r#"{"duration": 3, "dailyTasks": [
            {"dayTitle": "Walk 10 minutes", "completed": false},
            {"dayTitle": "Walk 15 minutes", "completed": false},
            {"dayTitle": "Walk 20 minutes", "completed": false}
        ]}"#;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer test-key")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(chat_body(plan))
            .create_async()
            .await;

        let planner = planner_for(&server, 3);
        let result = planner
            .generate_plan("Daily walk", HabitKind::Build, Some(3))
            .await
            .unwrap();

        assert_eq!(result.duration, 3);
        assert_eq!(
            result.day_titles,
            vec!["Walk 10 minutes", "Walk 15 minutes", "Walk 20 minutes"]
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_pads_short_task_lists_with_the_habit_title() {
        let mut server = Server::new_async().await;
        let plan = r#"{"duration": 4, "dailyTasks": [{"dayTitle": "Stretch"}]}"#;
        mock_completion(&mut server, 200, chat_body(plan)).await;

        let planner = planner_for(&server, 1);
        let result = planner
            .generate_plan("Morning stretch", HabitKind::Build, None)
            .await
            .unwrap();

        assert_eq!(result.duration, 4);
        assert_eq!(
            result.day_titles,
            vec![
                "Stretch",
                "Morning stretch",
                "Morning stretch",
                "Morning stretch"
            ]
        );
    }

    #[tokio::test]
    async fn test_truncates_long_task_lists() {
        let mut server = Server::new_async().await;
        let plan = r#"{"duration": 2, "dailyTasks": [
            {"dayTitle": "a"}, {"dayTitle": "b"}, {"dayTitle": "c"}, {"dayTitle": "d"}
        ]}"#;
        mock_completion(&mut server, 200, chat_body(plan)).await;

        let planner = planner_for(&server, 1);
        let result = planner
            .generate_plan("Focus", HabitKind::Build, Some(2))
            .await
            .unwrap();

        assert_eq!(result.duration, 2);
        assert_eq!(result.day_titles, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_oversized_durations_are_clamped() {
        let mut server = Server::new_async().await;
        let plan = r#"{"duration": 500, "dailyTasks": [{"dayTitle": "t"}]}"#;
        mock_completion(&mut server, 200, chat_body(plan)).await;

        let planner = planner_for(&server, 1);
        let result = planner
            .generate_plan("Hydrate", HabitKind::Build, None)
            .await
            .unwrap();

        assert_eq!(result.duration, 365);
        assert_eq!(result.day_titles.len(), 365);
    }

    #[tokio::test]
    async fn test_server_errors_are_retried_then_reported() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .with_status(500)
            .with_body("{}")
            .expect(3)
            .create_async()
            .await;

        let planner = planner_for(&server, 3);
        let err = planner
            .generate_plan("Read", HabitKind::Build, Some(5))
            .await
            .unwrap_err();

        assert!(matches!(err, RitualError::ExternalService(_)));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_garbled_content_is_retried() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(chat_body("here is your plan: do things daily"))
            .expect(2)
            .create_async()
            .await;

        let planner = planner_for(&server, 2);
        let err = planner
            .generate_plan("Read", HabitKind::Build, Some(5))
            .await
            .unwrap_err();

        assert!(matches!(err, RitualError::ExternalService(_)));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_missing_fields_fail_without_retry() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(chat_body(r#"{"tasks": []}"#))
            .expect(1)
            .create_async()
            .await;

        let planner = planner_for(&server, 3);
        let err = planner
            .generate_plan("Read", HabitKind::Quit, None)
            .await
            .unwrap_err();

        assert!(matches!(err, RitualError::ExternalService(_)));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_auth_failures_are_not_retried() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .with_status(401)
            .with_body(r#"{"error": "invalid key"}"#)
            .expect(1)
            .create_async()
            .await;

        let planner = planner_for(&server, 3);
        let err = planner
            .generate_plan("Read", HabitKind::Build, Some(5))
            .await
            .unwrap_err();

        assert!(matches!(err, RitualError::ExternalService(_)));
        mock.assert_async().await;
    }

    #[test]
    fn test_prompt_mentions_the_fixed_duration() {
        let prompt = user_prompt("Meditate", HabitKind::Build, Some(14));
        assert!(prompt.contains("14-day habit plan"));
        assert!(prompt.contains("exactly 14 daily tasks"));
        assert!(prompt.contains("(type: build)"));
    }

    #[test]
    fn test_prompt_asks_for_a_duration_when_unpinned() {
        let prompt = user_prompt("Meditate", HabitKind::Quit, None);
        assert!(prompt.contains("between 21 and 90 days"));
        assert!(prompt.contains("(type: quit)"));
    }
}
