use parsec_core::error::ParsecCoreError;
use parsec_core::types::Timestamp;

/// Checks that `client_timestamp` lies within the configured ballpark of
/// `server_timestamp`. `early_offset`/`late_offset` are the symmetric
/// tolerances in seconds.
pub fn check_ballpark(
    client_timestamp: Timestamp,
    server_timestamp: Timestamp,
    early_offset_secs: i64,
    late_offset_secs: i64,
) -> Result<(), ParsecCoreError> {
    let delta = (client_timestamp - server_timestamp).num_seconds();
    // delta > 0 means the client is ahead of the server (early); delta < 0
    // means the client is behind (late).
    if delta > early_offset_secs || -delta > late_offset_secs {
        return Err(ParsecCoreError::TimestampOutOfBallpark {
            server_timestamp,
            client_timestamp,
            ballpark_client_early_offset: early_offset_secs,
            ballpark_client_late_offset: late_offset_secs,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    #[test]
    fn within_ballpark_ok() {
        let now = Utc::now();
        let client = now - Duration::seconds(10);
        assert!(check_ballpark(client, now, 300, 300).is_ok());
    }

    #[test]
    fn too_far_in_future_rejected() {
        let now = Utc::now();
        let client = now + Duration::seconds(600);
        assert!(check_ballpark(client, now, 300, 300).is_err());
    }

    #[test]
    fn too_far_in_past_rejected() {
        let now = Utc::now();
        let client = now - Duration::seconds(600);
        assert!(check_ballpark(client, now, 300, 300).is_err());
    }
}
