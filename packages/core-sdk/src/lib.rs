pub mod config;
pub mod credentials;
pub mod llm;
pub mod models;
pub mod prompts;
pub mod telemetry;

/**
 * \brief SDK 预导入集合，方便外部引用常用模块。
 */
pub mod prelude {
    pub use crate::config;
    pub use crate::credentials;
    pub use crate::llm;
    pub use crate::models;
    pub use crate::prompts;
    pub use crate::telemetry;
}
