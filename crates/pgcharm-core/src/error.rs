//! Error types for parsing connection strings.

/// Errors raised while parsing a libpq `key=value` connection string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectionStringError {
    /// A keyword was not followed by `=`.
    #[error("Missing '=' after keyword \"{keyword}\"")]
    MissingEquals {
        /// The keyword that had no value assignment.
        keyword: String,
    },

    /// A token did not start with a valid keyword.
    #[error("Invalid keyword at offset {offset}")]
    InvalidKeyword {
        /// Byte offset of the offending character.
        offset: usize,
    },

    /// A single-quoted value ran to the end of input.
    #[error("Unterminated quoted value for keyword \"{keyword}\"")]
    UnterminatedQuote {
        /// The keyword whose value was not closed.
        keyword: String,
    },
}

impl ConnectionStringError {
    /// Creates a new `MissingEquals` error.
    #[must_use]
    pub fn missing_equals(keyword: impl Into<String>) -> Self {
        Self::MissingEquals {
            keyword: keyword.into(),
        }
    }

    /// Creates a new `UnterminatedQuote` error.
    #[must_use]
    pub fn unterminated_quote(keyword: impl Into<String>) -> Self {
        Self::UnterminatedQuote {
            keyword: keyword.into(),
        }
    }
}
