//! AWS MFA session helper
//!
//! Obtains temporary AWS credentials through STS `GetSessionToken` with an MFA
//! code and prints shell commands that export them, for use as
//! `eval "$(aws-mfa -p <profile>)"`.
//!
//! The program performs the following operations:
//! 1. Parses command-line arguments and resolves the named profile from
//!    `~/.aws/aws-mfa.yaml`
//! 2. Settles the AWS profile, session duration and output shell
//! 3. Returns the cached session token for the profile if it has not expired,
//!    otherwise prompts for an MFA code, exchanges it and caches the result
//! 4. Prints `AWS_PROFILE`, `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY` and
//!    `AWS_SESSION_TOKEN` assignments for the chosen shell
//!
//! Diagnostics go to standard error; standard output carries either all four
//! assignments or nothing.

use std::{path::PathBuf, process::ExitCode};

use anyhow::{Context, Result};
use clap::Parser;
use log::debug;

mod cache;
mod cli;
mod credentials;
mod error;
mod profile;
mod prompt;
mod session;
mod shell;

use cache::{CredentialCache, PROGRAM};
use cli::Args;
use credentials::StsExchanger;
use profile::{ConfigFile, ProfileConfig};
use prompt::{CodeSource, ProvidedCode, TerminalPrompt};
use shell::{Shell, exports};

/// Session duration when neither the command line nor the profile sets one.
const DEFAULT_EXPIRY: u32 = 86400;
const DEFAULT_AWS_PROFILE: &str = "default";

/// Values that parameterize one invocation after every source has been
/// consulted.
#[derive(Debug, PartialEq, Eq)]
struct Settings {
    aws_profile: String,
    expiry: u32,
    shell: Shell,
}

/// Entry point: prints the export statements on success, or a single
/// diagnostic line on stderr and a non-zero exit status on any failure.
#[tokio::main]
async fn main() -> ExitCode {
    // Standard output is evaluated by the calling shell, so logging stays on
    // stderr and defaults to warnings only. RUST_LOG overrides.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    match run(Args::parse()).await {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("{PROGRAM}: {err:#}");
            ExitCode::FAILURE
        }
    }
}

/// Resolves the profile, settles the invocation settings and returns the
/// export statements for a valid session token.
///
/// # Returns
/// * `Ok(String)` - Four newline-separated assignments in the chosen shell's syntax
/// * `Err(anyhow::Error)` - Nothing is printed on stdout in that case
///
/// # Errors
/// This function will return an error if:
/// * The home directory or config file cannot be read, or the profile does not resolve
/// * No shell is given and none can be detected (raised before any prompt)
/// * The cache is inaccessible, the prompt fails, or the token exchange fails
async fn run(args: Args) -> Result<String> {
    let config_dir = args
        .config_dir
        .clone()
        .or_else(default_config_dir)
        .context("Could not determine home directory")?;
    let config = ConfigFile::load(&config_dir.join(format!("{PROGRAM}.yaml"))).await?;
    let profile = config.resolve(&args.profile)?;

    // Settled before any prompt so an unusable shell never costs an MFA code.
    let Settings {
        aws_profile,
        expiry,
        shell,
    } = settle(&args, &profile, Shell::detect)?;
    debug!(
        "Profile {}: aws_profile={aws_profile}, expiry={expiry}s, shell={shell}",
        args.profile
    );

    let exchanger = StsExchanger::new(aws_profile.clone(), profile.mfa_device(), expiry);
    let mut codes: Box<dyn CodeSource> = match args.code {
        Some(code) => Box::new(ProvidedCode(code)),
        None => Box::new(TerminalPrompt),
    };

    let token = CredentialCache::new(config_dir)
        .obtain(&args.profile, codes.as_mut(), &exchanger)
        .await?;

    Ok(shell.render(&exports(&aws_profile, &token.credentials)))
}

/// Each setting comes from the command line, then the resolved profile, then
/// the built-in default. `detect` is only consulted when neither names a shell.
fn settle(
    args: &Args,
    profile: &ProfileConfig,
    detect: impl FnOnce() -> Option<Shell>,
) -> Result<Settings> {
    let aws_profile = args
        .aws_profile
        .clone()
        .or_else(|| profile.aws_profile.clone())
        .unwrap_or_else(|| DEFAULT_AWS_PROFILE.to_string());
    let expiry = args.expiry.or(profile.expiry).unwrap_or(DEFAULT_EXPIRY);
    let shell = args
        .shell
        .or(profile.shell)
        .or_else(detect)
        .context("Unable to determine the calling shell; pass --shell")?;

    Ok(Settings {
        aws_profile,
        expiry,
        shell,
    })
}

fn default_config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|d| d.join(".aws"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(
        aws_profile: Option<&str>,
        expiry: Option<u32>,
        shell: Option<Shell>,
    ) -> ProfileConfig {
        ProfileConfig {
            account: "012345678901".to_string(),
            username: "alice".to_string(),
            aws_profile: aws_profile.map(str::to_string),
            expiry,
            shell,
        }
    }

    fn args(extra: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("aws-mfa").chain(extra.iter().copied())).unwrap()
    }

    #[test]
    fn command_line_wins_over_profile() {
        let settings = settle(
            &args(&["-a", "cli", "-e", "3600", "-s", "fish"]),
            &profile(Some("yaml"), Some(7200), Some(Shell::Csh)),
            || panic!("detection must not run when a shell is given"),
        )
        .unwrap();

        assert_eq!(
            settings,
            Settings {
                aws_profile: "cli".to_string(),
                expiry: 3600,
                shell: Shell::Fish,
            }
        );
    }

    #[test]
    fn profile_wins_over_defaults() {
        let settings = settle(
            &args(&[]),
            &profile(Some("yaml"), Some(7200), Some(Shell::Csh)),
            || panic!("detection must not run when the profile names a shell"),
        )
        .unwrap();

        assert_eq!(
            settings,
            Settings {
                aws_profile: "yaml".to_string(),
                expiry: 7200,
                shell: Shell::Csh,
            }
        );
    }

    #[test]
    fn defaults_apply_last() {
        let settings =
            settle(&args(&[]), &profile(None, None, None), || Some(Shell::Zsh)).unwrap();

        assert_eq!(
            settings,
            Settings {
                aws_profile: DEFAULT_AWS_PROFILE.to_string(),
                expiry: DEFAULT_EXPIRY,
                shell: Shell::Zsh,
            }
        );
    }

    #[test]
    fn undetectable_shell_fails_before_any_prompt() {
        let err =
            settle(&args(&["-c", "123456"]), &profile(None, None, None), || None).unwrap_err();

        assert!(err.to_string().contains("pass --shell"));
    }
}
