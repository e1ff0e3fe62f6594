use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShellError {
    #[error("Ошибка конфигурации: {0}")]
    Config(#[from] anyhow::Error),

    #[error("Ошибка ввода-вывода: {0}")]
    Io(#[from] std::io::Error),

    #[error("Ошибка разбора JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Некорректный аргумент: {0}")]
    InvalidArgument(String),

    #[error("Не удалось загрузить {url}: статус {status}")]
    LoadFailure { status: u16, url: String },

    #[error("Внутренняя ошибка: {0}")]
    Internal(String),
}

impl ShellError {
    pub fn invalid_argument<T>(msg: impl Into<String>) -> Result<T> {
        Err(ShellError::InvalidArgument(msg.into()))
    }

    /// HTTP-подобный статус для ошибок загрузки (None для прочих ошибок)
    pub fn status(&self) -> Option<u16> {
        match self {
            ShellError::LoadFailure { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ShellError>;

// Удобные макросы для создания ошибок
#[macro_export]
macro_rules! shell_error {
    (invalid_argument, $($arg:tt)*) => {
        $crate::error::ShellError::InvalidArgument(format!($($arg)*))
    };
    (internal, $($arg:tt)*) => {
        $crate::error::ShellError::Internal(format!($($arg)*))
    };
}
