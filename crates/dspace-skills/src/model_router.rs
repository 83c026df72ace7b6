//! Model Router: answers a question with a mock reply or the live YandexGPT completion API.

use dspace_core::{AnswerGenerator, CoreConfig, GenerateError, HistoryTurn, Role, DEFAULT_LLM_API_URL};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const GENERATOR_NAME: &str = "ModelRouter";
const MODEL_NAME: &str = "yandexgpt-lite";
const TEMPERATURE: f32 = 0.3;
const MAX_TOKENS: u32 = 1000;

/// Mode for LLM invocation: mock (deterministic canned reply) or live (calls the completion API).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LlmMode {
    #[default]
    Mock,
    Live,
}

impl LlmMode {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "live" => LlmMode::Live,
            _ => LlmMode::Mock,
        }
    }
}

/// Connection settings for live mode.
#[derive(Clone, Debug)]
pub struct LiveSettings {
    pub api_url: String,
    pub api_key: Option<String>,
    pub folder_id: Option<String>,
    /// Per attempt.
    pub timeout: Duration,
    pub attempts: u32,
    /// Fixed pause between attempts.
    pub backoff: Duration,
}

impl Default for LiveSettings {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_LLM_API_URL.to_string(),
            api_key: None,
            folder_id: None,
            timeout: Duration::from_secs(10),
            attempts: 3,
            backoff: Duration::from_secs(1),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CompletionRequest<'a> {
    model_uri: String,
    completion_options: CompletionOptions,
    messages: Vec<ApiMessage<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CompletionOptions {
    stream: bool,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ApiMessage<'a> {
    role: Role,
    text: &'a str,
}

#[derive(Deserialize)]
struct CompletionResponse {
    result: CompletionResult,
}

#[derive(Deserialize)]
struct CompletionResult {
    alternatives: Vec<Alternative>,
}

#[derive(Deserialize)]
struct Alternative {
    message: AlternativeMessage,
}

#[derive(Deserialize)]
struct AlternativeMessage {
    text: String,
}

/// Routes a question to a mock LLM or the live YandexGPT API.
pub struct ModelRouter {
    mode: LlmMode,
    settings: LiveSettings,
    system_prompt: String,
    client: reqwest::Client,
}

impl ModelRouter {
    pub fn with_mode(mode: LlmMode) -> Self {
        Self::build(mode, LiveSettings::default(), "D-Space")
    }

    pub fn with_settings(mode: LlmMode, settings: LiveSettings) -> Self {
        Self::build(mode, settings, "D-Space")
    }

    pub fn from_config(cfg: &CoreConfig) -> Self {
        let settings = LiveSettings {
            api_url: cfg.llm_api_url.clone(),
            api_key: cfg.llm_api_key.clone(),
            folder_id: cfg.llm_folder_id.clone(),
            timeout: cfg.llm_timeout(),
            attempts: cfg.llm_attempts,
            backoff: cfg.llm_backoff(),
        };
        Self::build(LlmMode::parse(&cfg.llm_mode), settings, &cfg.app_name)
    }

    fn build(mode: LlmMode, settings: LiveSettings, app_name: &str) -> Self {
        Self {
            mode,
            system_prompt: system_prompt(app_name),
            client: reqwest::Client::new(),
            settings,
        }
    }

    pub fn mode(&self) -> LlmMode {
        self.mode
    }

    /// Mock LLM: deterministic reply that echoes the start of the question.
    fn mock_generate(&self, question: &str) -> String {
        let preview: String = question.chars().take(60).collect();
        let ellipsis = if question.chars().count() > 60 { "…" } else { "" };
        format!(
            "🤖 [Демо-режим] Спасибо за вопрос «{preview}{ellipsis}». Точный ответ подскажет наш администратор. Чем ещё могу помочь?"
        )
    }

    fn credentials(&self) -> Result<(&str, &str), GenerateError> {
        let key = self
            .settings
            .api_key
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| GenerateError::Configuration("API key is not set".into()))?;
        let folder = self
            .settings
            .folder_id
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| GenerateError::Configuration("folder id is not set".into()))?;
        Ok((key, folder))
    }

    fn build_request<'a>(
        &'a self,
        folder: &str,
        question: &'a str,
        history: &'a [HistoryTurn],
    ) -> CompletionRequest<'a> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ApiMessage {
            role: Role::System,
            text: &self.system_prompt,
        });
        messages.extend(history.iter().map(|turn| ApiMessage {
            role: turn.role,
            text: &turn.text,
        }));
        messages.push(ApiMessage {
            role: Role::User,
            text: question,
        });
        CompletionRequest {
            model_uri: format!("gpt://{folder}/{MODEL_NAME}"),
            completion_options: CompletionOptions {
                stream: false,
                temperature: TEMPERATURE,
                max_tokens: MAX_TOKENS,
            },
            messages,
        }
    }

    /// One HTTP round trip.
    async fn execute_request(
        &self,
        key: &str,
        folder: &str,
        request: &CompletionRequest<'_>,
    ) -> Result<String, GenerateError> {
        let response = self
            .client
            .post(&self.settings.api_url)
            .timeout(self.settings.timeout)
            .header("Authorization", format!("Api-Key {key}"))
            .header("x-folder-id", folder)
            .json(request)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if status.is_success() {
            let body: CompletionResponse = response
                .json()
                .await
                .map_err(|e| GenerateError::InvalidResponse(e.to_string()))?;
            return body
                .result
                .alternatives
                .into_iter()
                .next()
                .map(|alt| alt.message.text)
                .ok_or_else(|| GenerateError::InvalidResponse("no alternatives".into()));
        }

        let body = response.text().await.unwrap_or_default();
        Err(match status.as_u16() {
            401 => GenerateError::Auth,
            400 => GenerateError::BadRequest(body),
            code => GenerateError::Api { status: code, body },
        })
    }

    async fn live_generate(&self, question: &str, history: &[HistoryTurn]) -> Result<String, GenerateError> {
        let (key, folder) = self.credentials()?;
        let request = self.build_request(folder, question, history);
        let attempts = self.settings.attempts.max(1);

        let mut last_error = None;
        for attempt in 1..=attempts {
            if attempt > 1 {
                tokio::time::sleep(self.settings.backoff).await;
            }
            match self.execute_request(key, folder, &request).await {
                Ok(text) => {
                    tracing::info!(target: "dspace::generator", attempt, "completion received");
                    return Ok(text);
                }
                Err(e) if e.is_retryable() => {
                    tracing::warn!(
                        target: "dspace::generator",
                        attempt,
                        attempts,
                        error = %e,
                        "completion attempt failed"
                    );
                    last_error = Some(e);
                }
                Err(e) => {
                    tracing::error!(target: "dspace::generator", error = %e, "completion rejected, not retrying");
                    return Err(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| GenerateError::Network("no attempts made".into())))
    }
}

#[async_trait::async_trait]
impl AnswerGenerator for ModelRouter {
    fn name(&self) -> &str {
        GENERATOR_NAME
    }

    async fn answer(&self, question: &str, history: &[HistoryTurn]) -> Result<String, GenerateError> {
        match self.mode {
            LlmMode::Mock => Ok(self.mock_generate(question)),
            LlmMode::Live => self.live_generate(question, history).await,
        }
    }
}

fn map_transport_error(e: reqwest::Error) -> GenerateError {
    if e.is_timeout() {
        GenerateError::Timeout
    } else {
        GenerateError::Network(e.to_string())
    }
}

fn system_prompt(app_name: &str) -> String {
    format!(
        "Ты - дружелюбный консультант развлекательного центра {app_name}. \
         Отвечай кратко и структурированно. \
         Если пользователь спрашивает об услугах центра, предложи задать уточняющий вопрос или связаться с администратором. \
         Не выдумывай цены: если не знаешь, скажи честно и предложи помощь. \
         Завершай ответ открытым вопросом, чтобы продолжить диалог."
    )
}
