//! Shell families and the assignment syntax each one evaluates.

use std::{env, fmt, path::Path};

use clap::ValueEnum;
use serde::Deserialize;

use crate::session::Credentials;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Shell {
    Sh,
    Bash,
    Ksh,
    Zsh,
    Fish,
    Csh,
    Tcsh,
    Tclsh,
}

impl Shell {
    /// Maps a process or executable name (`bash`, `-zsh`, `/bin/tcsh`) to a
    /// known shell.
    pub fn from_process_name(name: &str) -> Option<Self> {
        let name = Path::new(name.trim())
            .file_name()?
            .to_str()?
            .trim_start_matches('-');
        Self::from_str(name, true).ok()
    }

    /// One assignment statement in this shell's syntax.
    pub fn assignment(self, name: &str, value: &str) -> String {
        match self {
            Self::Sh | Self::Bash | Self::Ksh | Self::Zsh | Self::Fish => {
                format!("export {name}=\"{value}\"")
            }
            Self::Csh | Self::Tcsh => format!("setenv {name} \"{value}\""),
            Self::Tclsh => format!("set ::env({name}) {value}"),
        }
    }

    /// One line per variable, in the order given.
    pub fn render(self, vars: &[(&str, &str)]) -> String {
        vars.iter()
            .map(|(name, value)| self.assignment(name, value))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Shell of the invoking process: the parent process name where the
    /// platform exposes it, otherwise `$SHELL`.
    pub fn detect() -> Option<Self> {
        parent_process_name()
            .as_deref()
            .and_then(Self::from_process_name)
            .or_else(|| {
                env::var("SHELL")
                    .ok()
                    .as_deref()
                    .and_then(Self::from_process_name)
            })
    }
}

impl fmt::Display for Shell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_possible_value() {
            Some(value) => f.write_str(value.get_name()),
            None => write!(f, "{self:?}"),
        }
    }
}

#[cfg(target_os = "linux")]
fn parent_process_name() -> Option<String> {
    let ppid = std::os::unix::process::parent_id();
    std::fs::read_to_string(format!("/proc/{ppid}/comm")).ok()
}

#[cfg(not(target_os = "linux"))]
fn parent_process_name() -> Option<String> {
    None
}

/// The four variables handed to the calling shell, in emission order.
pub fn exports<'a>(
    aws_profile: &'a str,
    credentials: &'a Credentials,
) -> [(&'static str, &'a str); 4] {
    [
        ("AWS_PROFILE", aws_profile),
        ("AWS_ACCESS_KEY_ID", &credentials.access_key_id),
        ("AWS_SECRET_ACCESS_KEY", &credentials.secret_access_key),
        ("AWS_SESSION_TOKEN", &credentials.session_token),
    ]
}
