pub mod change_password;
pub mod forgot_password;
pub mod health;
pub mod login;
pub mod logout;
pub mod me;
pub mod medias;
pub mod refresh;
pub mod register;
pub mod resend_verify_email;
pub mod reset_password;
pub mod verify_email;
pub mod verify_forgot_password;

use chirp_shared::errors::{AppError, ErrorCode};
use chrono::Utc;

/// Date-of-birth fields arrive as ISO 8601 strings and are parsed before
/// anything touches the store.
pub(crate) fn parse_date_of_birth(raw: &str) -> Result<chrono::DateTime<Utc>, AppError> {
    chrono::DateTime::parse_from_rfc3339(raw)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|_| {
            AppError::new(
                ErrorCode::ValidationError,
                "date_of_birth must be an ISO 8601 datetime",
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_iso_dates() {
        let parsed = parse_date_of_birth("2000-01-02T00:00:00Z").unwrap();
        assert_eq!(parsed.timestamp(), 946_771_200);
        assert!(parse_date_of_birth("2000-01-02").is_err());
        assert!(parse_date_of_birth("not a date").is_err());
    }
}
