//! Conversions from external infrastructure errors into domain errors.

use conduit_domain::ConduitError;
use reqwest::Error as HttpError;
use rusqlite::Error as SqlError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub ConduitError);

impl From<InfraError> for ConduitError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<ConduitError> for InfraError {
    fn from(value: ConduitError) -> Self {
        InfraError(value)
    }
}

/// Extension trait to make the conversion logic explicit in tests and within
/// this module.
trait IntoConduitError {
    fn into_conduit(self) -> ConduitError;
}

/* -------------------------------------------------------------------------- */
/* rusqlite::Error → ConduitError */
/* -------------------------------------------------------------------------- */

impl IntoConduitError for SqlError {
    fn into_conduit(self) -> ConduitError {
        use rusqlite::ffi::ErrorCode;
        use rusqlite::Error as RE;

        fn looks_like_wrong_key(message: &str) -> bool {
            let lower = message.to_ascii_lowercase();
            lower.contains("not a database") || lower.contains("encrypted")
        }

        match self {
            RE::SqliteFailure(err, maybe_message) => {
                let message = maybe_message.unwrap_or_default();
                match (err.code, err.extended_code) {
                    (ErrorCode::DatabaseBusy, _) => ConduitError::Database("database is busy".into()),
                    (ErrorCode::DatabaseLocked, _) => ConduitError::Database("database is locked".into()),
                    (ErrorCode::ConstraintViolation, 2067 | 1555) => {
                        ConduitError::Database("unique constraint violation".into())
                    }
                    (ErrorCode::ConstraintViolation, 787) => {
                        ConduitError::Database("foreign key constraint violation".into())
                    }
                    (_, _) if looks_like_wrong_key(&message) => {
                        ConduitError::Config("SQLCipher key rejected or database not encrypted".into())
                    }
                    _ => ConduitError::Database(format!(
                        "sqlite failure {:?} (code {}): {}",
                        err.code, err.extended_code, message
                    )),
                }
            }
            RE::QueryReturnedNoRows => ConduitError::NotFound("no rows returned by query".into()),
            RE::FromSqlConversionFailure(_, _, cause) => {
                ConduitError::Database(format!("failed to convert sqlite value: {cause}"))
            }
            RE::InvalidColumnType(_, name, ty) => {
                ConduitError::Database(format!("invalid column type for {name}: {ty}"))
            }
            RE::Utf8Error(_) => ConduitError::Database("invalid UTF-8 returned from sqlite".into()),
            RE::InvalidPath(path) => {
                ConduitError::Config(format!("invalid database path: {}", path.to_string_lossy()))
            }
            other => ConduitError::Database(other.to_string()),
        }
    }
}

impl From<SqlError> for InfraError {
    fn from(value: SqlError) -> Self {
        InfraError(value.into_conduit())
    }
}

/* -------------------------------------------------------------------------- */
/* r2d2::Error → ConduitError */
/* -------------------------------------------------------------------------- */

impl IntoConduitError for r2d2::Error {
    fn into_conduit(self) -> ConduitError {
        let message = self.to_string();
        if message.to_ascii_lowercase().contains("not a database") {
            return ConduitError::Config("SQLCipher key rejected or database not encrypted".into());
        }
        ConduitError::Database(format!("connection pool: {message}"))
    }
}

impl From<r2d2::Error> for InfraError {
    fn from(value: r2d2::Error) -> Self {
        InfraError(value.into_conduit())
    }
}

/* -------------------------------------------------------------------------- */
/* serde_json::Error → ConduitError */
/* -------------------------------------------------------------------------- */

impl IntoConduitError for serde_json::Error {
    fn into_conduit(self) -> ConduitError {
        ConduitError::Database(format!("stored JSON is invalid: {self}"))
    }
}

impl From<serde_json::Error> for InfraError {
    fn from(value: serde_json::Error) -> Self {
        InfraError(value.into_conduit())
    }
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → ConduitError */
/* -------------------------------------------------------------------------- */

impl IntoConduitError for HttpError {
    fn into_conduit(self) -> ConduitError {
        if self.is_timeout() {
            return ConduitError::Network("HTTP request timed out".into());
        }

        if self.is_connect() {
            return ConduitError::Network("HTTP connection failure".into());
        }

        if let Some(status) = self.status() {
            let code = status.as_u16();
            let message = format!("HTTP {} {}", code, status.canonical_reason().unwrap_or("unknown status"));

            return match code {
                401 | 403 => ConduitError::Auth(message),
                404 => ConduitError::NotFound(message),
                429 => ConduitError::Network(message),
                400..=499 => ConduitError::InvalidInput(message),
                _ => ConduitError::Network(message),
            };
        }

        if self.is_decode() {
            return ConduitError::InvalidInput(format!("unexpected response body: {self}"));
        }

        ConduitError::Network(self.to_string())
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        InfraError(value.into_conduit())
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
