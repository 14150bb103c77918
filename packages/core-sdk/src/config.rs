use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::models::ProviderSpec;

/**
 * \brief 应用配置快照。核心在一次调用内只读；持久化为 JSON 文件，
 *        加载 / 保存由外层（CLI、桌面壳）触发。
 * \details 缺失字段按默认值补齐，与旧版本的配置文件保持兼容。
 */
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    /** \brief 全局唤起热键（桌面壳使用，核心不解释） */
    pub hotkey: String,
    /** \brief translate_to 的默认目标语言 */
    pub target_lang: String,
    /** \brief 默认 Provider id */
    pub default_provider_id: Option<String>,
    /** \brief 遥测开关，默认关闭 */
    pub telemetry_enabled: bool,
    /** \brief 已配置的 Provider 列表 */
    pub providers: Vec<ProviderSpec>,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            hotkey: "Alt+Space".to_string(),
            target_lang: String::new(),
            default_provider_id: Some("prov-openai".to_string()),
            telemetry_enabled: false,
            providers: vec![
                ProviderSpec {
                    id: "prov-openai".into(),
                    label: "OpenAI (prod)".into(),
                    provider_type: "openai".into(),
                    api_base: Some("https://api.openai.com/v1".into()),
                    host: None,
                    model: "gpt-4o-mini".into(),
                    api_key_env: Some("OPENAI_API_KEY".into()),
                    secret_account: None,
                },
                ProviderSpec {
                    id: "prov-compat".into(),
                    label: "OpenAI-Compatible (local)".into(),
                    provider_type: "openaiCompatible".into(),
                    api_base: Some("http://localhost:11434/v1".into()),
                    host: None,
                    model: "gpt-4o-mini".into(),
                    api_key_env: Some("OPENAI_COMPAT_KEY".into()),
                    secret_account: None,
                },
                ProviderSpec {
                    id: "prov-ollama".into(),
                    label: "Ollama (localhost)".into(),
                    provider_type: "ollama".into(),
                    api_base: None,
                    host: Some("http://localhost:11434".into()),
                    model: "llama3.1:8b".into(),
                    api_key_env: None,
                    secret_account: None,
                },
            ],
        }
    }
}

/**
 * \brief 读取配置文件；文件不存在时返回默认配置。
 */
pub fn load(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("read config {}", path.display()))?;
    let config: AppConfig = serde_json::from_str(&raw)
        .with_context(|| format!("parse config {}", path.display()))?;
    Ok(config)
}

/**
 * \brief 保存配置文件（pretty JSON，便于手工编辑）。
 */
pub fn save(path: &Path, config: &AppConfig) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create config dir {}", parent.display()))?;
        }
    }
    let raw = serde_json::to_string_pretty(config)?;
    std::fs::write(path, raw).with_context(|| format!("write config {}", path.display()))?;
    Ok(())
}

impl AppConfig {
    /**
     * \brief 按 id 查找 Provider。
     */
    pub fn find_provider(&self, id: &str) -> Option<&ProviderSpec> {
        self.providers.iter().find(|p| p.id == id)
    }

    /**
     * \brief 解析本次调用使用的 Provider：显式 id → 默认 id → 列表首个。
     * \details 列表为空时返回 None，由路由层给出 "No provider configured"。
     */
    pub fn resolve_provider(&self, explicit_id: Option<&str>) -> Option<&ProviderSpec> {
        let wanted = explicit_id.or(self.default_provider_id.as_deref());
        wanted
            .and_then(|id| self.find_provider(id))
            .or_else(|| self.providers.first())
    }

    /**
     * \brief 新增或更新 Provider；id 为空时生成 "prov-" 前缀的新 id。
     * \return 实际使用的 Provider id。
     */
    pub fn upsert_provider(&mut self, mut spec: ProviderSpec) -> String {
        if spec.id.trim().is_empty() {
            spec.id = generate_provider_id();
        }
        if spec.label.trim().is_empty() {
            spec.label = "Provider".to_string();
        }
        let id = spec.id.clone();
        match self.providers.iter_mut().find(|p| p.id == id) {
            Some(existing) => *existing = spec,
            None => self.providers.push(spec),
        }
        id
    }

    /**
     * \brief 删除 Provider。若删除的是默认项，默认指向剩余列表的首个。
     */
    pub fn delete_provider(&mut self, id: &str) -> Result<()> {
        let Some(idx) = self.providers.iter().position(|p| p.id == id) else {
            bail!("provider {} not found", id);
        };
        self.providers.remove(idx);
        if self.default_provider_id.as_deref() == Some(id) {
            self.default_provider_id = self.providers.first().map(|p| p.id.clone());
        }
        Ok(())
    }

    /**
     * \brief 设置默认 Provider；id 不存在则报错。
     */
    pub fn set_default_provider(&mut self, id: &str) -> Result<()> {
        if self.find_provider(id).is_none() {
            bail!("provider {} not found", id);
        }
        self.default_provider_id = Some(id.to_string());
        Ok(())
    }
}

// 同一毫秒内的多次生成靠进程内序号区分
static PROVIDER_ID_SEQ: AtomicU64 = AtomicU64::new(0);

fn generate_provider_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    let seq = PROVIDER_ID_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("prov-{:x}-{:x}", millis, seq)
}
