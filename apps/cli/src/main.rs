use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use clap::{Parser, Subcommand};

use echoclip_core_sdk::{config, credentials::EnvCredentials, llm, telemetry};
use echoclip_core_sdk::models::{ProviderSpec, RunRequest, RunResult};
use echoclip_core_sdk::prompts::Action;

/**
 * \brief CLI 入口：桌面壳之外的瘦调用层，负责组合请求并回显结果。
 */
#[derive(Parser, Debug)]
#[command(name = "echoclip", version, about = "Clipboard LLM assistant (CLI front-end)")]
struct Cli {
    /** \brief 配置文件路径（JSON） */
    #[arg(long, global = true, default_value = "config.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /**
     * \brief 写出默认配置文件（含三个示例 Provider）。
     */
    Init {
        #[arg(long, default_value_t = false)]
        force: bool,
    },

    /**
     * \brief Provider 增删改查，等价于设置界面的操作。
     */
    Providers {
        #[command(subcommand)]
        command: ProviderCommands,
    },

    /**
     * \brief 对一段文本 / 一张图片执行动作，结果打印到 stdout。
     * \details 文本缺省从 stdin 读取；风格与目标语言以前缀头折叠进正文。
     */
    Run {
        /** \brief 动作标签：ask / proofread / translate_en / translate_to / summarize / rewrite_style */
        #[arg(long)]
        action: String,
        /** \brief 输入文本；省略时读取 stdin */
        #[arg(long)]
        text: Option<String>,
        /** \brief 附带的图片文件 */
        #[arg(long)]
        image: Option<PathBuf>,
        /** \brief 指定 Provider id，缺省用配置的默认项 */
        #[arg(long)]
        provider: Option<String>,
        /** \brief translate_to 的目标语言，缺省读配置的 targetLang */
        #[arg(long)]
        target_lang: Option<String>,
        /** \brief rewrite_style 的目标风格 */
        #[arg(long)]
        style: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum ProviderCommands {
    /** \brief 列出 Provider 与默认项。 */
    List,
    /** \brief 新增或更新 Provider。 */
    Add {
        #[arg(long, default_value = "")]
        id: String,
        #[arg(long)]
        label: String,
        /** \brief openai / openaiCompatible / ollama / gemini */
        #[arg(long = "type")]
        provider_type: String,
        #[arg(long)]
        api_base: Option<String>,
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        model: String,
        #[arg(long)]
        api_key_env: Option<String>,
        #[arg(long, default_value_t = false)]
        set_default: bool,
    },
    /** \brief 删除 Provider。 */
    Remove {
        id: String,
    },
    /** \brief 设为默认 Provider。 */
    SetDefault {
        id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Init { force } => {
            if cli.config.exists() && !force {
                bail!(
                    "{} already exists, use --force to overwrite",
                    cli.config.display()
                );
            }
            config::save(&cli.config, &config::AppConfig::default())
                .context("write default config failed")?;
            println!("Wrote default config to {}", cli.config.display());
        }

        Commands::Providers { command } => {
            let mut cfg = config::load(&cli.config).context("load config failed")?;
            telemetry::set_enabled(cfg.telemetry_enabled);
            match command {
                ProviderCommands::List => {
                    for p in &cfg.providers {
                        let marker = if cfg.default_provider_id.as_deref() == Some(&p.id) {
                            "*"
                        } else {
                            " "
                        };
                        let endpoint = p
                            .api_base
                            .as_deref()
                            .or(p.host.as_deref())
                            .unwrap_or("(no endpoint)");
                        println!(
                            "{} {}  {}  [{}]  {}  model={}",
                            marker, p.id, p.label, p.provider_type, endpoint, p.model
                        );
                    }
                }
                ProviderCommands::Add {
                    id,
                    label,
                    provider_type,
                    api_base,
                    host,
                    model,
                    api_key_env,
                    set_default,
                } => {
                    let spec = ProviderSpec {
                        id,
                        label,
                        provider_type,
                        api_base,
                        host,
                        model,
                        api_key_env,
                        secret_account: None,
                    };
                    let id = cfg.upsert_provider(spec);
                    if set_default {
                        cfg.set_default_provider(&id).context("set default failed")?;
                    }
                    config::save(&cli.config, &cfg).context("save config failed")?;
                    telemetry::log_event("cli.providers", &format!("save id={}", id));
                    println!("Saved provider id={}", id);
                }
                ProviderCommands::Remove { id } => {
                    cfg.delete_provider(&id).context("delete provider failed")?;
                    config::save(&cli.config, &cfg).context("save config failed")?;
                    telemetry::log_event("cli.providers", &format!("delete id={}", id));
                    println!("Removed provider id={}", id);
                }
                ProviderCommands::SetDefault { id } => {
                    cfg.set_default_provider(&id).context("set default failed")?;
                    config::save(&cli.config, &cfg).context("save config failed")?;
                    println!("Default provider id={}", id);
                }
            }
        }

        Commands::Run {
            action,
            text,
            image,
            provider,
            target_lang,
            style,
        } => {
            let cfg = config::load(&cli.config).context("load config failed")?;
            telemetry::set_enabled(cfg.telemetry_enabled);

            let action = Action::from_tag(&action);
            let text = match text {
                Some(t) => t,
                None => read_stdin().context("read stdin failed")?,
            };
            let image_data = image
                .as_deref()
                .map(read_image_as_data_uri)
                .transpose()
                .context("read image failed")?;

            // 调用方守卫：空提交与缺失目标语言在进入核心前拦截
            if text.trim().is_empty() && image_data.is_none() {
                bail!("Nothing to send. Paste text or copy an image first.");
            }
            let target_lang = resolve_target_lang(action, target_lang, &cfg)?;

            let input_text = compose_input(action, &text, target_lang.as_deref(), style.as_deref());
            telemetry::log_event(
                "cli.run",
                &format!("action={} text_len={}", action.tag(), input_text.len()),
            );

            let request = RunRequest {
                action,
                input_text,
                image_data,
                provider_id: provider,
            };
            match llm::run_request(&cfg, &EnvCredentials, &request).await {
                RunResult::Success { text } => println!("{}", text),
                RunResult::Failure { error } => {
                    eprintln!("Error: {}", error);
                    std::process::exit(1);
                }
            }
        }
    }

    Ok(())
}

/**
 * \brief 解析 translate_to 的目标语言：命令行参数 → 配置的 targetLang。
 * \details 两处都缺失时拒绝执行，核心不会被调用；其他动作不作要求。
 */
fn resolve_target_lang(
    action: Action,
    flag: Option<String>,
    cfg: &config::AppConfig,
) -> Result<Option<String>> {
    let lang = flag
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .or_else(|| {
            let configured = cfg.target_lang.trim();
            (!configured.is_empty()).then(|| configured.to_string())
        });
    if action == Action::TranslateTo && lang.is_none() {
        bail!("translate_to requires a target language (--target-lang or config targetLang)");
    }
    Ok(lang)
}

/**
 * \brief 把风格 / 目标语言折叠为正文前缀头，与动作对应的系统指令呼应。
 */
fn compose_input(action: Action, text: &str, target_lang: Option<&str>, style: Option<&str>) -> String {
    let mut headers = Vec::new();
    if action == Action::RewriteStyle {
        if let Some(style) = style.map(str::trim).filter(|s| !s.is_empty()) {
            headers.push(format!("Style: {}", style));
        }
    }
    if action == Action::TranslateTo {
        if let Some(lang) = target_lang.map(str::trim).filter(|s| !s.is_empty()) {
            headers.push(format!("Target language: {}", lang));
        }
    }
    if headers.is_empty() {
        text.to_string()
    } else {
        format!("{}\n\n{}", headers.join("\n"), text)
    }
}

fn read_stdin() -> Result<String> {
    let mut buf = String::new();
    std::io::stdin().read_to_string(&mut buf)?;
    Ok(buf.trim_end().to_string())
}

fn read_image_as_data_uri(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path).with_context(|| format!("read {}", path.display()))?;
    Ok(format!(
        "data:{};base64,{}",
        image_mime(path),
        BASE64.encode(bytes)
    ))
}

fn image_mime(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        _ => "image/png",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compose_input_headers() {
        let composed = compose_input(Action::TranslateTo, "hello", Some("Mongolian"), None);
        assert_eq!(composed, "Target language: Mongolian\n\nhello");

        let composed = compose_input(Action::RewriteStyle, "hello", None, Some("formal"));
        assert_eq!(composed, "Style: formal\n\nhello");

        // 其他动作不携带前缀头
        let composed = compose_input(Action::Proofread, "hello", Some("Mongolian"), Some("formal"));
        assert_eq!(composed, "hello");
    }

    #[test]
    fn test_resolve_target_lang_prefers_flag_then_config() {
        let mut cfg = config::AppConfig::default();
        cfg.target_lang = "Mongolian".into();

        let lang = resolve_target_lang(Action::TranslateTo, Some("French".into()), &cfg)
            .expect("flag accepted");
        assert_eq!(lang.as_deref(), Some("French"));

        let lang = resolve_target_lang(Action::TranslateTo, None, &cfg)
            .expect("config fallback accepted");
        assert_eq!(lang.as_deref(), Some("Mongolian"));
    }

    #[test]
    fn test_resolve_target_lang_rejects_translate_to_without_language() {
        let cfg = config::AppConfig::default();
        let err = resolve_target_lang(Action::TranslateTo, None, &cfg)
            .expect_err("must reject before the core runs");
        assert!(err.to_string().contains("target language"));
        // 空白参数等同缺失
        assert!(resolve_target_lang(Action::TranslateTo, Some("   ".into()), &cfg).is_err());
    }

    #[test]
    fn test_resolve_target_lang_not_required_for_other_actions() {
        let cfg = config::AppConfig::default();
        let lang =
            resolve_target_lang(Action::Proofread, None, &cfg).expect("no requirement");
        assert_eq!(lang, None);
    }

    #[test]
    fn test_image_mime_from_extension() {
        assert_eq!(image_mime(Path::new("a.JPG")), "image/jpeg");
        assert_eq!(image_mime(Path::new("a.webp")), "image/webp");
        assert_eq!(image_mime(Path::new("a.bin")), "image/png");
        assert_eq!(image_mime(Path::new("noext")), "image/png");
    }
}
