use serde::{Deserialize, Serialize};

use crate::prompts::Action;

/**
 * \brief Provider 配置模型，持久化为 camelCase JSON（每个 Provider 一条记录）。
 */
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSpec {
    /** \brief 唯一标识，如 "prov-openai" */
    pub id: String,
    /** \brief 展示名称 */
    pub label: String,
    /** \brief Provider 类型：openai / openaiCompatible / ollama / gemini */
    #[serde(rename = "type")]
    pub provider_type: String,
    /** \brief API 基地址（openai / openaiCompatible / gemini 必填） */
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
    /** \brief Ollama 主机地址（ollama 必填） */
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    /** \brief 模型名，始终必填 */
    pub model: String,
    /** \brief 存放 API Key 的环境变量名（环境变量后端使用） */
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    /** \brief 安全存储中的账户名（安全存储后端使用，缺省退回 id） */
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_account: Option<String>,
}

impl ProviderSpec {
    /**
     * \brief 安全存储后端的账户名；未显式配置时使用 Provider id。
     */
    pub fn secret_account_name(&self) -> &str {
        self.secret_account.as_deref().unwrap_or(&self.id)
    }
}

/**
 * \brief Provider 家族的封闭分类，适配器按此分派。
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    OpenAiFamily,
    Ollama,
    Gemini,
}

/**
 * \brief 从配置的类型字符串归类。未识别的类型按 OpenAI 兼容处理（文档化的缺省，
 *        与既有配置行为一致；严格部署可在上游先校验类型再调用）。
 */
pub fn provider_kind(spec: &ProviderSpec) -> ProviderKind {
    match spec.provider_type.to_ascii_lowercase().as_str() {
        "ollama" => ProviderKind::Ollama,
        "gemini" | "google" => ProviderKind::Gemini,
        _ => ProviderKind::OpenAiFamily,
    }
}

/**
 * \brief 一次调用的入参。生命周期仅限单次调用，核心不保留历史。
 * \details 风格 / 目标语言等提示由调用方在派发前折叠进 inputText 的前缀头，
 *          核心只转发组合后的文本。
 */
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RunRequest {
    /** \brief 请求的处理动作 */
    pub action: Action,
    /** \brief 剪贴板文本（有图片时可为空） */
    #[serde(default)]
    pub input_text: String,
    /** \brief 单张图片，data URI 或裸 base64 */
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_data: Option<String>,
    /** \brief 指定 Provider；缺省走配置的默认项 */
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
}

impl RunRequest {
    pub fn has_image(&self) -> bool {
        self.image_data.is_some()
    }
}

/**
 * \brief 一次调用的出参：成功文本或错误消息，二者必居其一。
 * \details 序列化为 {"text": ...} 或 {"error": ...}，与胶水层的线格式一致。
 */
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum RunResult {
    Success { text: String },
    Failure { error: String },
}

impl RunResult {
    pub fn success(text: impl Into<String>) -> Self {
        RunResult::Success { text: text.into() }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        RunResult::Failure {
            error: error.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RunResult::Success { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(provider_type: &str) -> ProviderSpec {
        ProviderSpec {
            id: "prov-1".into(),
            label: "test".into(),
            provider_type: provider_type.into(),
            api_base: None,
            host: None,
            model: "m".into(),
            api_key_env: None,
            secret_account: None,
        }
    }

    #[test]
    fn test_provider_kind_classification() {
        assert_eq!(provider_kind(&spec("openai")), ProviderKind::OpenAiFamily);
        assert_eq!(
            provider_kind(&spec("openaiCompatible")),
            ProviderKind::OpenAiFamily
        );
        assert_eq!(provider_kind(&spec("ollama")), ProviderKind::Ollama);
        assert_eq!(provider_kind(&spec("Gemini")), ProviderKind::Gemini);
        assert_eq!(provider_kind(&spec("google")), ProviderKind::Gemini);
    }

    #[test]
    fn test_unknown_type_falls_back_to_openai_family() {
        assert_eq!(
            provider_kind(&spec("something-new")),
            ProviderKind::OpenAiFamily
        );
    }

    #[test]
    fn test_provider_spec_json_uses_camel_case() {
        let mut s = spec("openai");
        s.api_base = Some("https://api.openai.com/v1".into());
        s.api_key_env = Some("OPENAI_API_KEY".into());
        let json = serde_json::to_value(&s).expect("serialize");
        assert_eq!(json["type"], "openai");
        assert_eq!(json["apiBase"], "https://api.openai.com/v1");
        assert_eq!(json["apiKeyEnv"], "OPENAI_API_KEY");
        assert!(json.get("host").is_none());

        let back: ProviderSpec = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back, s);
    }

    #[test]
    fn test_run_result_wire_shape() {
        let ok = serde_json::to_value(RunResult::success("hi")).expect("serialize");
        assert_eq!(ok, serde_json::json!({"text": "hi"}));
        let err = serde_json::to_value(RunResult::failure("boom")).expect("serialize");
        assert_eq!(err, serde_json::json!({"error": "boom"}));
    }

    #[test]
    fn test_secret_account_defaults_to_id() {
        let mut s = spec("gemini");
        assert_eq!(s.secret_account_name(), "prov-1");
        s.secret_account = Some("work-account".into());
        assert_eq!(s.secret_account_name(), "work-account");
    }
}
