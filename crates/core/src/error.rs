use nutrilog_uuid::RecordId;

#[derive(Debug, thiserror::Error)]
pub enum JournalError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid text: {0}")]
    Text(#[from] nutrilog_types::TextError),
    #[error("invalid identifier: {0}")]
    Id(#[from] nutrilog_uuid::IdError),
    #[error("patient not found: {0}")]
    PatientNotFound(RecordId),
    #[error("patient name '{name}' is already used by patient {existing}")]
    NameConflict { name: String, existing: RecordId },
    #[error("consultation result is incomplete: {0}")]
    IncompleteResult(String),
    #[error("persistence error: {0}")]
    Persistence(#[from] PersistenceError),
    #[error("journal state lock was poisoned")]
    LockPoisoned,
}

pub type JournalResult<T> = std::result::Result<T, JournalError>;

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("failed to create storage directory: {0}")]
    StorageDirCreation(std::io::Error),
    #[error("failed to read journal file: {0}")]
    FileRead(std::io::Error),
    #[error("failed to write journal file: {0}")]
    FileWrite(std::io::Error),
    #[error("failed to serialize journal: {0}")]
    Serialization(serde_json::Error),
    #[error("failed to deserialize journal: {0}")]
    Deserialization(serde_json::Error),
    #[error("persistence unavailable: {0}")]
    Unavailable(String),
}

pub type PersistenceResult<T> = std::result::Result<T, PersistenceError>;
