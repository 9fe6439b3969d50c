use thiserror::Error;

/// Errors surfaced by the query boundary. An unknown term is not one of them: it
/// resolves to an empty result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// Malformed query. Nothing was evaluated.
    #[error("parse error at byte {offset}: {message}")]
    Parse { offset: usize, message: String },

    /// The query needs a structure this index was built without.
    #[error("unsupported query: {0}")]
    Unsupported(String),
}

impl QueryError {
    pub fn parse<S: Into<String>>(offset: usize, message: S) -> Self {
        QueryError::Parse { offset, message: message.into() }
    }

    pub fn unsupported<S: Into<String>>(message: S) -> Self {
        QueryError::Unsupported(message.into())
    }

    pub fn is_parse(&self) -> bool {
        matches!(self, QueryError::Parse { .. })
    }
}

pub type Result<T> = std::result::Result<T, QueryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages() {
        assert_eq!(QueryError::parse(3, "dangling operator").to_string(), "parse error at byte 3: dangling operator");
        assert_eq!(
            QueryError::unsupported("phrase queries need a positional index").to_string(),
            "unsupported query: phrase queries need a positional index"
        );
    }
}
