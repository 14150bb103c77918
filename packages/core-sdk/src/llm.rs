use std::time::Duration;

use anyhow::{bail, Result};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde_json::{json, Value};

use crate::config::AppConfig;
use crate::credentials::CredentialResolver;
use crate::models::{provider_kind, ProviderKind, ProviderSpec, RunRequest, RunResult};
use crate::prompts::system_prompt_for;
use crate::telemetry;

const DEFAULT_GEMINI_BASE: &str = "https://generativelanguage.googleapis.com";

/** \brief Ollama 在"只有图片、没有文字"时使用的固定用户指令。 */
const OLLAMA_IMAGE_ONLY_PROMPT: &str =
    "Please read any visible text in the image and perform the requested action.";

/** \brief 空提交在任何网络请求之前就被拦下。 */
const EMPTY_INPUT_ERROR: &str = "Nothing to send. Paste text or copy an image first.";

/** \brief 单次请求的硬超时；超时与其他传输层错误一样以 Failure 返回。 */
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// URL 路径段编码，与 encodeURIComponent 的保留集一致
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'!')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/**
 * \brief 调用入口：解析 Provider、拦截空提交、选择系统指令并派发。
 * \details 即原先桌面壳 "llm:run" 处理器的组合逻辑。所有失败都以
 *          RunResult::Failure 返回，本函数不会 panic 也不会返回 Err。
 */
pub async fn run_request(
    config: &AppConfig,
    credentials: &dyn CredentialResolver,
    request: &RunRequest,
) -> RunResult {
    if request.input_text.trim().is_empty() && request.image_data.is_none() {
        return RunResult::failure(EMPTY_INPUT_ERROR);
    }

    let spec = config.resolve_provider(request.provider_id.as_deref());
    let system = system_prompt_for(request.action, request.has_image());

    if let Some(spec) = spec {
        telemetry::log_event(
            "router.run",
            &format!(
                "action={} provider={}({}) text_len={} image={}",
                request.action.tag(),
                spec.label,
                spec.provider_type,
                request.input_text.len(),
                request.has_image()
            ),
        );
    }

    let result = run_llm(
        spec,
        credentials,
        &system,
        &request.input_text,
        request.image_data.as_deref(),
    )
    .await;

    if let RunResult::Failure { error } = &result {
        telemetry::log_error("router.run", error);
    }
    result
}

/**
 * \brief 路由层：解析凭据并按 Provider 家族派发到对应适配器。
 * \details 契约：恰好返回 text 或 error 之一。无 Provider、凭据缺失都在
 *          这里短路，不会发起网络请求。Ollama 不需要凭据。
 */
pub async fn run_llm(
    spec: Option<&ProviderSpec>,
    credentials: &dyn CredentialResolver,
    system: &str,
    input_text: &str,
    image_data: Option<&str>,
) -> RunResult {
    let Some(spec) = spec else {
        return RunResult::failure("No provider configured");
    };

    let outcome = match provider_kind(spec) {
        ProviderKind::Ollama => {
            run_ollama(
                spec.host.as_deref().unwrap_or(""),
                &spec.model,
                system,
                input_text,
                image_data,
            )
            .await
        }
        kind => {
            let Some(api_key) = credentials.resolve(spec) else {
                return RunResult::failure(format!(
                    "Missing API key in {}",
                    credentials.source(spec)
                ));
            };
            match kind {
                ProviderKind::Gemini => {
                    run_gemini(
                        spec.api_base.as_deref(),
                        &api_key,
                        &spec.model,
                        system,
                        input_text,
                        image_data,
                    )
                    .await
                }
                _ => {
                    run_openai(
                        spec.api_base.as_deref().unwrap_or(""),
                        &api_key,
                        &spec.model,
                        system,
                        input_text,
                        image_data,
                    )
                    .await
                }
            }
        }
    };

    match outcome {
        Ok(text) => RunResult::success(text),
        Err(e) => RunResult::failure(e.to_string()),
    }
}

fn http_client() -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?)
}

/**
 * \brief OpenAI 及兼容端点：POST {apiBase}/chat/completions，Bearer 认证。
 */
async fn run_openai(
    api_base: &str,
    api_key: &str,
    model: &str,
    system: &str,
    input_text: &str,
    image_data: Option<&str>,
) -> Result<String> {
    let url = format!("{}/chat/completions", api_base.trim_end_matches('/'));
    let body = json!({
        "model": model,
        "messages": openai_messages(system, input_text, image_data),
        "temperature": 0.2
    });

    let resp = http_client()?
        .post(url)
        .header(CONTENT_TYPE, "application/json")
        .header(AUTHORIZATION, format!("Bearer {}", api_key))
        .json(&body)
        .send()
        .await?;

    if !resp.status().is_success() {
        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        bail!("HTTP {}: {}", status.as_u16(), text);
    }
    let v: Value = resp.json().await?;
    Ok(extract_openai_content(&v))
}

/**
 * \brief Ollama 本地端点：POST {host}/api/chat，非流式，无需凭据。
 */
async fn run_ollama(
    host: &str,
    model: &str,
    system: &str,
    input_text: &str,
    image_data: Option<&str>,
) -> Result<String> {
    let url = format!("{}/api/chat", host.trim_end_matches('/'));
    let body = json!({
        "model": model,
        "messages": ollama_messages(system, input_text, image_data),
        "stream": false
    });

    let resp = http_client()?
        .post(url)
        .header(CONTENT_TYPE, "application/json")
        .json(&body)
        .send()
        .await?;

    if !resp.status().is_success() {
        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        bail!("HTTP {}: {}", status.as_u16(), text);
    }
    let v: Value = resp.json().await?;
    Ok(extract_ollama_content(&v))
}

/**
 * \brief Gemini 端点：POST {base}/v1beta/models/{model}:generateContent?key=...。
 * \details system 指令走 Gemini 专属的 systemInstruction 字段，而不是消息列表。
 */
async fn run_gemini(
    api_base: Option<&str>,
    api_key: &str,
    model: &str,
    system: &str,
    input_text: &str,
    image_data: Option<&str>,
) -> Result<String> {
    let url = gemini_url(api_base, model);
    let body = gemini_body(system, input_text, image_data);

    let resp = http_client()?
        .post(url)
        .query(&[("key", api_key)])
        .json(&body)
        .send()
        .await?;

    if !resp.status().is_success() {
        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        bail!("HTTP {}: {}", status.as_u16(), text);
    }
    let v: Value = resp.json().await?;
    Ok(extract_gemini_content(&v))
}

fn openai_messages(system: &str, input_text: &str, image_data: Option<&str>) -> Value {
    let mut user_parts = Vec::new();
    if !input_text.is_empty() {
        user_parts.push(json!({"type": "text", "text": input_text}));
    }
    if let Some(image) = image_data {
        // data URI 或远程 URL，按原样内联，后端自行识别
        user_parts.push(json!({"type": "image_url", "image_url": {"url": image}}));
    }
    json!([
        {"role": "system", "content": system},
        {"role": "user", "content": user_parts}
    ])
}

fn ollama_messages(system: &str, input_text: &str, image_data: Option<&str>) -> Value {
    let mut messages = Vec::new();
    if !system.trim().is_empty() {
        messages.push(json!({"role": "system", "content": system}));
    }

    let content = if !input_text.trim().is_empty() {
        input_text
    } else if image_data.is_some() {
        OLLAMA_IMAGE_ONLY_PROMPT
    } else {
        ""
    };

    let mut msg = json!({"role": "user", "content": content});
    if let Some(image) = image_data {
        // Ollama 线格式要求不带 data: 前缀的裸 base64
        msg["images"] = json!([strip_data_prefix(image)]);
    }
    messages.push(msg);
    Value::Array(messages)
}

fn gemini_body(system: &str, input_text: &str, image_data: Option<&str>) -> Value {
    let mut parts = Vec::new();
    if !input_text.trim().is_empty() {
        parts.push(json!({"text": input_text}));
    }
    if let Some(image) = image_data {
        let (mime_type, b64) = to_inline_data(image);
        parts.push(json!({"inlineData": {"mimeType": mime_type, "data": b64}}));
    }

    let mut body = json!({
        "contents": [{"role": "user", "parts": parts}],
        "generationConfig": {"temperature": 0.2}
    });
    if !system.trim().is_empty() {
        body["systemInstruction"] = json!({"role": "system", "parts": [{"text": system}]});
    }
    body
}

fn gemini_url(api_base: Option<&str>, model: &str) -> String {
    let base = api_base
        .filter(|b| !b.trim().is_empty())
        .unwrap_or(DEFAULT_GEMINI_BASE)
        .trim_end_matches('/');
    format!(
        "{}/v1beta/models/{}:generateContent",
        base,
        utf8_percent_encode(model, PATH_SEGMENT)
    )
}

// data URI 或裸 base64 → 裸 base64（幂等：裸 base64 不含逗号）
fn strip_data_prefix(data: &str) -> &str {
    match data.find(',') {
        Some(i) => &data[i + 1..],
        None => data,
    }
}

// data URI → (mimeType, 裸 base64)；无前缀时按 image/png 的裸 base64 处理
fn to_inline_data(data: &str) -> (String, String) {
    if let Some(rest) = data.strip_prefix("data:") {
        if let Some((mime, b64)) = rest.split_once(";base64,") {
            let mime = if mime.is_empty() { "image/png" } else { mime };
            return (mime.to_string(), b64.to_string());
        }
    }
    ("image/png".to_string(), data.to_string())
}

fn extract_openai_content(v: &Value) -> String {
    v.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .unwrap_or("")
        .trim()
        .to_string()
}

fn extract_ollama_content(v: &Value) -> String {
    v.get("message")
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .or_else(|| v.get("content").and_then(|c| c.as_str()))
        .unwrap_or("")
        .trim()
        .to_string()
}

fn extract_gemini_content(v: &Value) -> String {
    v.get("candidates")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("content"))
        .and_then(|c| c.get("parts"))
        .and_then(|p| p.as_array())
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default()
        .trim()
        .to_string()
}
