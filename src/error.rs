/// Broad failure category. Each kind maps to a stable process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad arguments, unreadable mapping file, no sources configured.
    Config,
    /// Payload retrieved but not parseable as the expected tabular shape.
    Format,
    /// Every configured source failed or returned an unusable payload.
    Retrieval,
    /// Export or log-file write failures.
    Io,
    /// Terminal setup, draw, or event failures.
    Terminal,
}

impl ErrorKind {
    pub fn exit_code(self) -> u8 {
        match self {
            ErrorKind::Config => 2,
            ErrorKind::Format => 3,
            ErrorKind::Retrieval => 4,
            ErrorKind::Io => 5,
            ErrorKind::Terminal => 6,
        }
    }
}

#[derive(Clone)]
pub struct AppError {
    kind: ErrorKind,
    message: String,
}

impl AppError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Config, message)
    }

    pub fn format(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Format, message)
    }

    pub fn retrieval(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Retrieval, message)
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Io, message)
    }

    pub fn terminal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Terminal, message)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn exit_code(&self) -> u8 {
        self.kind.exit_code()
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("kind", &self.kind)
            .field("exit_code", &self.exit_code())
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}
