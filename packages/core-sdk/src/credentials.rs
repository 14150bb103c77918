use std::collections::HashMap;

use crate::models::ProviderSpec;

/**
 * \brief 凭据解析能力：按 Provider 规格取回密钥。
 * \details 环境变量与安全存储是可互换的两种后端，由部署方式决定选用哪种，
 *          与 Provider 类型无关。空串视为未配置。
 */
pub trait CredentialResolver: Send + Sync {
    /** \brief 解析密钥；未找到或为空返回 None。 */
    fn resolve(&self, spec: &ProviderSpec) -> Option<String>;

    /** \brief 凭据来源的人类可读描述，用于 "Missing API key in {source}" 提示。 */
    fn source(&self, spec: &ProviderSpec) -> String;
}

/**
 * \brief 环境变量后端：按 apiKeyEnv 指定的变量名读取进程环境。
 */
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvCredentials;

impl CredentialResolver for EnvCredentials {
    fn resolve(&self, spec: &ProviderSpec) -> Option<String> {
        let name = spec.api_key_env.as_deref()?;
        std::env::var(name).ok().filter(|v| !v.trim().is_empty())
    }

    fn source(&self, spec: &ProviderSpec) -> String {
        format!("env: {}", spec.api_key_env.as_deref().unwrap_or("(unset)"))
    }
}

/**
 * \brief 键值后端：以安全存储账户名（缺省为 Provider id）为键的内存映射。
 * \details 桌面端在启动时从系统安全存储中取出密钥灌入此映射；测试直接 insert。
 */
#[derive(Debug, Default, Clone)]
pub struct KeyedCredentials {
    entries: HashMap<String, String>,
}

impl KeyedCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, account: impl Into<String>, secret: impl Into<String>) {
        self.entries.insert(account.into(), secret.into());
    }

    pub fn remove(&mut self, account: &str) {
        self.entries.remove(account);
    }
}

impl CredentialResolver for KeyedCredentials {
    fn resolve(&self, spec: &ProviderSpec) -> Option<String> {
        self.entries
            .get(spec.secret_account_name())
            .filter(|v| !v.trim().is_empty())
            .cloned()
    }

    fn source(&self, spec: &ProviderSpec) -> String {
        format!("secure store account: {}", spec.secret_account_name())
    }
}
