//! Record identifiers.
//!
//! Every patient and timeline event in the journal carries an opaque, stable identifier that is
//! assigned once at creation and never reused.
//!
//! Freshly allocated identifiers use a *canonical* UUID representation: **32 lowercase
//! hexadecimal characters** (no hyphens), the same value you would get from
//! `Uuid::new_v4().simple().to_string()`.
//!
//! Journals written by earlier versions of the application used other identifier shapes
//! (for example `patient_1712345678901_0`). Those are still accepted when loading, as long as
//! they are made of a conservative ASCII token alphabet, so [`RecordId::parse`] validates the
//! *shape* of an identifier rather than insisting on the canonical form.
//!
//! ## Accepted alphabet
//! - Length: 1 to [`MAX_ID_LEN`] bytes
//! - Characters: ASCII letters, digits, `_` and `-`

mod record_id;

pub use record_id::{RecordId, Uuid, MAX_ID_LEN};

/// Error type for identifier operations.
#[derive(Debug, thiserror::Error)]
pub enum IdError {
    /// Invalid input provided
    #[error("Invalid identifier: {0}")]
    InvalidInput(String),
}

/// Result type for identifier operations.
pub type IdResult<T> = Result<T, IdError>;
