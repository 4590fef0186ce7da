//! Client for the chat-assistant widget and the admin translate helper.
//!
//! Four prompt templates over an OpenAI-compatible chat-completions
//! endpoint. Prompt assembly and reply parsing are plain functions so
//! they stay testable without a live model.

use crate::config::AssistantConfig;
use crate::utils::SITE_NAME;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const CHAT_TEMPERATURE: f32 = 0.7;
const TRANSLATE_TEMPERATURE: f32 = 0.2;
const MAX_COMPLETION_TOKENS: u32 = 2000;

#[derive(Clone)]
pub struct PromptClient {
    api_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<Message>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: content.into(),
        }
    }

    fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

/// One prior exchange in the widget conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: TurnRole,
    pub text: String,
}

pub type TranslationMap = BTreeMap<String, BTreeMap<String, String>>;

impl PromptClient {
    pub fn new(config: AssistantConfig, client: reqwest::Client) -> Self {
        Self {
            api_url: config.api_url,
            api_key: config.api_key,
            model: config.model,
            client,
        }
    }

    /// Short greeting for a site page.
    pub async fn page_welcome(&self, page: &str, language: &str) -> Result<String> {
        let page = page.trim();
        if page.is_empty() {
            bail!("page name may not be empty");
        }
        self.complete(build_page_welcome(page, language), CHAT_TEMPERATURE)
            .await
    }

    /// Greeting tailored to one reviewed tool.
    pub async fn tool_welcome(
        &self,
        tool_name: &str,
        short_description: &str,
        language: &str,
    ) -> Result<String> {
        let tool_name = tool_name.trim();
        if tool_name.is_empty() {
            bail!("tool name may not be empty");
        }
        self.complete(
            build_tool_welcome(tool_name, short_description, language),
            CHAT_TEMPERATURE,
        )
        .await
    }

    /// Free-form widget reply over the running conversation.
    pub async fn chat(
        &self,
        message: &str,
        history: &[ChatTurn],
        language: &str,
    ) -> Result<String> {
        let message = message.trim();
        if message.is_empty() {
            bail!("message may not be empty");
        }
        self.complete(build_chat(message, history, language), CHAT_TEMPERATURE)
            .await
    }

    /// Translates a set of named fields into every target language and
    /// returns the per-field per-language map.
    pub async fn translate_fields(
        &self,
        fields: &BTreeMap<String, String>,
        source_language: &str,
        target_languages: &[String],
    ) -> Result<TranslationMap> {
        if fields.is_empty() {
            bail!("no fields to translate");
        }
        if target_languages.is_empty() {
            bail!("no target languages given");
        }
        let reply = self
            .complete(
                build_translation(fields, source_language, target_languages),
                TRANSLATE_TEMPERATURE,
            )
            .await?;
        parse_translation_reply(&reply, fields, target_languages)
    }

    async fn complete(&self, messages: Vec<Message>, temperature: f32) -> Result<String> {
        let url = format!("{}/chat/completions", self.api_url);

        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages,
            temperature,
            max_tokens: MAX_COMPLETION_TOKENS,
        };

        let mut req = self.client.post(&url).json(&request);
        if !self.api_key.is_empty() {
            req = req.header("Authorization", format!("Bearer {}", self.api_key));
        }

        let response = req.send().await.context("failed to reach the prompt service")?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read body".to_string());
            bail!("prompt service returned {status}: {body}");
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .context("failed to parse the prompt service response")?;
        let content = completion
            .choices
            .first()
            .map(|choice| choice.message.content.trim().to_string())
            .filter(|content| !content.is_empty())
            .context("prompt service returned no completion")?;
        Ok(content)
    }
}

fn persona(language: &str) -> String {
    format!(
        "You are the friendly assistant of {SITE_NAME}, a site that reviews AI tools \
         and sells books about them. Keep answers short and concrete. \
         Respond in the language with code '{language}'."
    )
}

fn build_page_welcome(page: &str, language: &str) -> Vec<Message> {
    vec![
        Message::system(persona(language)),
        Message::user(format!(
            "Write a one-or-two sentence welcome for a visitor who just opened the \
             '{page}' page. Do not use markdown."
        )),
    ]
}

fn build_tool_welcome(tool_name: &str, short_description: &str, language: &str) -> Vec<Message> {
    let mut prompt = format!(
        "Write a one-or-two sentence welcome for a visitor reading about the AI tool \
         '{tool_name}'."
    );
    let short_description = short_description.trim();
    if !short_description.is_empty() {
        prompt.push_str(&format!(" The tool, in short: {short_description}."));
    }
    prompt.push_str(" Do not use markdown.");
    vec![Message::system(persona(language)), Message::user(prompt)]
}

fn build_chat(message: &str, history: &[ChatTurn], language: &str) -> Vec<Message> {
    let mut messages = vec![Message::system(persona(language))];
    for turn in history {
        let text = turn.text.trim();
        if text.is_empty() {
            continue;
        }
        messages.push(Message {
            role: match turn.role {
                TurnRole::User => "user".into(),
                TurnRole::Assistant => "assistant".into(),
            },
            content: text.to_string(),
        });
    }
    messages.push(Message::user(message));
    messages
}

fn build_translation(
    fields: &BTreeMap<String, String>,
    source_language: &str,
    target_languages: &[String],
) -> Vec<Message> {
    let field_lines: String = fields
        .iter()
        .map(|(name, text)| format!("{name}: {text}\n"))
        .collect();
    let targets = target_languages.join(", ");
    vec![
        Message::system(
            "You are a translation engine. Reply with a single JSON object and \
             nothing else: one key per input field, each mapping language codes to \
             the translated text."
                .to_string(),
        ),
        Message::user(format!(
            "Source language: {source_language}\nTarget languages: {targets}\n\
             Fields:\n{field_lines}"
        )),
    ]
}

/// Parses the strict-JSON translation reply, tolerating a markdown code
/// fence around it, and checks every requested field and language came
/// back.
fn parse_translation_reply(
    reply: &str,
    fields: &BTreeMap<String, String>,
    target_languages: &[String],
) -> Result<TranslationMap> {
    let body = strip_code_fence(reply);
    let map: TranslationMap =
        serde_json::from_str(body).context("translation reply was not the expected JSON shape")?;
    for field in fields.keys() {
        let languages = map
            .get(field)
            .with_context(|| format!("translation reply is missing field '{field}'"))?;
        for language in target_languages {
            if !languages.get(language).is_some_and(|text| !text.trim().is_empty()) {
                bail!("translation reply is missing '{language}' for field '{field}'");
            }
        }
    }
    Ok(map)
}

/// Models often wrap JSON in ``` fences even when told not to.
fn strip_code_fence(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim()
}
