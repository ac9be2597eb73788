use thiserror::Error;

#[derive(Debug, Error)]
pub enum SqlxActiveError {
    #[error("Unsupported database URL: {0}")]
    UnsupportedDatabase(String),
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
    /// 配置缺失或无效（例如未设置 DATABASE_URL）
    #[error("Configuration error: {0}")]
    Config(String),
    /// `with_relations` 传入了未注册的关联名
    #[error("Invalid relation: {0}")]
    InvalidRelation(String),
    /// Invalid field error
    #[error("Invalid field: {0}")]
    InvalidField(String),
    /// 字段值类型与目标 Rust 类型不匹配
    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: String,
    },
}

pub type Result<T> = std::result::Result<T, SqlxActiveError>;
