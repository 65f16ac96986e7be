use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] tokio_rusqlite::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Feed parse error: {0}")]
    FeedParse(#[from] feed_rs::parser::ParseFeedError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("LLM API error: {0}")]
    LlmApi(String),

    /// The generative service answered, but without the JSON object we asked for.
    #[error("No structured content in response")]
    NoStructuredContent,

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Content extraction failed: {0}")]
    Extraction(String),

    #[error("Instance lock error: {0}")]
    Lease(String),

    #[error("Scheduler error: {0}")]
    Scheduler(String),

    #[error("Job scheduler error: {0}")]
    JobScheduler(#[from] tokio_cron_scheduler::JobSchedulerError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;
