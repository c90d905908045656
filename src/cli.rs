//! Command-line interface definitions.

use std::path::PathBuf;

use clap::Parser;

use crate::{
    credentials::{MAX_DURATION, MIN_DURATION},
    shell::Shell,
};

/// Print shell commands exporting MFA-backed AWS session credentials.
///
/// Session tokens are cached per profile in `<config-dir>/.aws-mfa-<profile>.cache`
/// and reused until they expire, so the MFA code is only asked for once per
/// session. Typical use: `eval "$(aws-mfa -p staging)"`.
#[derive(Parser)]
#[command(author, version, about)]
pub struct Args {
    /// MFA code to use instead of prompting when the cached token has expired
    #[arg(short, long, env = "AWS_MFA_CODE", value_name = "MFA code")]
    pub code: Option<String>,

    /// Profile from aws-mfa.yaml
    #[arg(
        short,
        long,
        env = "AWS_MFA_PROFILE",
        value_name = "profile",
        default_value = "default"
    )]
    pub profile: String,

    /// AWS CLI profile holding the long-term credentials [default: profile's aws_profile, then "default"]
    #[arg(
        short,
        long,
        env = "AWS_MFA_AWS_PROFILE",
        value_name = "profile",
        alias = "aws_profile"
    )]
    pub aws_profile: Option<String>,

    /// Session duration in seconds (900-129600) [default: profile's expiry, then 86400]
    #[arg(
        short,
        long,
        env = "AWS_MFA_EXPIRY",
        value_name = "seconds",
        value_parser = clap::value_parser!(u32).range(i64::from(MIN_DURATION)..=i64::from(MAX_DURATION))
    )]
    pub expiry: Option<u32>,

    /// Shell to emit commands for [default: profile's shell, then the parent shell]
    #[arg(short, long, env = "AWS_MFA_SHELL", value_enum, value_name = "shell")]
    pub shell: Option<Shell>,

    /// Directory holding aws-mfa.yaml and the token caches [default: ~/.aws]
    #[arg(long, env = "AWS_MFA_CONFIG_DIR", value_name = "dir")]
    pub config_dir: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn definition_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn flags_parse() {
        let args = Args::try_parse_from([
            "aws-mfa", "-c", "123456", "-p", "staging", "--aws_profile", "lt", "-e", "3600", "-s",
            "tcsh",
        ])
        .unwrap();

        assert_eq!(args.code.as_deref(), Some("123456"));
        assert_eq!(args.profile, "staging");
        assert_eq!(args.aws_profile.as_deref(), Some("lt"));
        assert_eq!(args.expiry, Some(3600));
        assert_eq!(args.shell, Some(Shell::Tcsh));
    }

    #[test]
    fn expiry_outside_sts_limits_is_rejected() {
        assert!(Args::try_parse_from(["aws-mfa", "-e", "60"]).is_err());
        assert!(Args::try_parse_from(["aws-mfa", "-e", "200000"]).is_err());
    }

    #[test]
    fn unknown_shell_is_rejected() {
        assert!(Args::try_parse_from(["aws-mfa", "-s", "powershell"]).is_err());
    }
}
