use crate::application::repos::RepoError;

pub fn map_sqlx_error(err: sqlx::Error) -> RepoError {
    match err {
        sqlx::Error::RowNotFound => RepoError::NotFound,
        sqlx::Error::PoolTimedOut => RepoError::Timeout,
        sqlx::Error::Database(db) => {
            let message = db.message().to_string();
            if db.is_unique_violation() {
                RepoError::Duplicate {
                    constraint: db.constraint().unwrap_or("unknown").to_string(),
                }
            } else if db.is_foreign_key_violation() || message.contains("invalid input") {
                RepoError::InvalidInput { message }
            } else if db.is_check_violation() || message.contains("violates") {
                RepoError::Integrity { message }
            } else if message.contains("canceling statement") {
                RepoError::Timeout
            } else {
                RepoError::Persistence(message)
            }
        }
        other => RepoError::from_persistence(other),
    }
}

/// Escape `LIKE` wildcards so user text matches literally.
pub fn like_contains(value: &str) -> String {
    let mut pattern = String::with_capacity(value.len() + 2);
    pattern.push('%');
    for ch in value.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_contains("50%_off"), "%50\\%\\_off%");
    }

    #[test]
    fn missing_row_is_not_found() {
        assert!(matches!(
            map_sqlx_error(sqlx::Error::RowNotFound),
            RepoError::NotFound
        ));
    }
}
