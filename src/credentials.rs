use aws_sdk_sts::{Client, error::DisplayErrorContext};
use chrono::{DateTime, Utc};
use log::info;

use crate::{
    error::ExchangeError,
    session::{Credentials, SUCCESS_STATUS, SessionToken},
};

/// Session durations STS accepts for `GetSessionToken`, in seconds.
pub const MIN_DURATION: u32 = 900;
pub const MAX_DURATION: u32 = 129_600;

/// Trades an MFA code for a session token bundle.
pub trait TokenExchanger {
    async fn exchange(&self, code: &str) -> Result<SessionToken, ExchangeError>;
}

/// Calls STS `GetSessionToken` with the long-term credentials of an AWS CLI
/// profile.
pub struct StsExchanger {
    aws_profile: String,
    mfa_device: String,
    duration: u32,
}

impl StsExchanger {
    pub fn new(aws_profile: String, mfa_device: String, duration: u32) -> Self {
        Self {
            aws_profile,
            mfa_device,
            duration,
        }
    }
}

impl TokenExchanger for StsExchanger {
    async fn exchange(&self, code: &str) -> Result<SessionToken, ExchangeError> {
        info!(
            "Requesting session token - Profile: {}, Device: {}, Duration: {}s",
            self.aws_profile, self.mfa_device, self.duration
        );

        let duration = i32::try_from(self.duration)
            .map_err(|_| ExchangeError::InvalidDuration(self.duration))?;

        let config = aws_config::from_env()
            .profile_name(&self.aws_profile)
            .load()
            .await;

        let output = Client::new(&config)
            .get_session_token()
            .duration_seconds(duration)
            .serial_number(&self.mfa_device)
            .token_code(code)
            .send()
            .await
            .map_err(|err| {
                let message = DisplayErrorContext(&err).to_string();
                match err.raw_response() {
                    Some(raw) => ExchangeError::Status {
                        status: raw.status().as_u16(),
                        message,
                    },
                    None => ExchangeError::Transport(message),
                }
            })?;

        let session = output
            .credentials()
            .ok_or(ExchangeError::MissingCredentials)?;
        let expiration =
            to_utc(session.expiration()).ok_or(ExchangeError::InvalidExpiration)?;

        Ok(SessionToken {
            credentials: Credentials {
                access_key_id: session.access_key_id().to_string(),
                secret_access_key: session.secret_access_key().to_string(),
                session_token: session.session_token().to_string(),
            },
            expiration,
            response_status: SUCCESS_STATUS,
        })
    }
}

/// Converts an SDK timestamp without dropping sub-second precision.
fn to_utc(timestamp: &aws_smithy_types::DateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(timestamp.secs(), timestamp.subsec_nanos())
}

/// Serial number of the virtual MFA device registered for `username`.
pub fn mfa_device_arn(account: &str, username: &str) -> String {
    format!("arn:aws:iam::{account}:mfa/{username}")
}
