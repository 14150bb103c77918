use std::{fs::OpenOptions, io::Write, path::PathBuf};

use anyhow::Result;
use once_cell::sync::Lazy;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

static TELEMETRY_ENABLED: Lazy<std::sync::RwLock<bool>> =
    Lazy::new(|| std::sync::RwLock::new(false));

/**
 * \brief 更新遥测开关状态。默认关闭；密钥与剪贴板内容永不写入日志。
 */
pub fn set_enabled(enabled: bool) {
    if let Ok(mut guard) = TELEMETRY_ENABLED.write() {
        *guard = enabled;
    }
}

/**
 * \brief 查询当前遥测开关状态。
 */
pub fn is_enabled() -> bool {
    TELEMETRY_ENABLED.read().map(|g| *g).unwrap_or(false)
}

/**
 * \brief 记录常规事件，category 采用 "区域.主题" 约定（如 router.run、cli.run）。
 */
pub fn log_event(category: &str, message: &str) {
    if !is_enabled() {
        return;
    }
    if let Err(err) = write_line("INFO", category, message) {
        eprintln!("telemetry write failed: {}", err);
    }
}

/**
 * \brief 记录错误事件。
 */
pub fn log_error(category: &str, message: &str) {
    if !is_enabled() {
        return;
    }
    if let Err(err) = write_line("ERROR", category, message) {
        eprintln!("telemetry write failed: {}", err);
    }
}

fn log_dir() -> PathBuf {
    std::env::var("ECHOCLIP_LOG_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("logs"))
}

fn write_line(level: &str, category: &str, message: &str) -> Result<()> {
    let dir = log_dir();
    if !dir.exists() {
        std::fs::create_dir_all(&dir)?;
    }
    let timestamp = OffsetDateTime::now_utc().format(&Rfc3339)?;
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join("echoclip.log"))?;
    writeln!(file, "{} [{}] {} - {}", timestamp, level, category, message)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    // 开关与写入合并为单个用例：全局开关只在日志目录已指向临时目录的
    // 窗口内打开，避免并行用例的 log_event 落盘到工作目录。
    #[test]
    fn test_toggle_and_write_line_under_temp_log_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::env::set_var("ECHOCLIP_LOG_DIR", dir.path());

        assert!(!is_enabled());
        set_enabled(true);
        assert!(is_enabled());

        write_line("INFO", "test.case", "hello").expect("write");
        write_line("ERROR", "test.case", "boom").expect("write");

        set_enabled(false);
        assert!(!is_enabled());

        let content =
            std::fs::read_to_string(dir.path().join("echoclip.log")).expect("read log");
        std::env::remove_var("ECHOCLIP_LOG_DIR");
        assert!(content.contains("[INFO] test.case - hello"));
        assert!(content.contains("[ERROR] test.case - boom"));
    }
}
