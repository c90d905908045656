//! Profile resolution over `aws-mfa.yaml`.
//!
//! ```yaml
//! default:
//!   account: "012345678901"
//!   username: alice
//!   expiry: 43200
//!
//! staging:
//!   aws_profile: staging-long-term
//!
//! staging-tcl:
//!   inherits: staging
//!   shell: tclsh
//! ```
//!
//! A profile is layered over its `inherits` chain and finally over `default`;
//! the most specific layer that sets a field wins.

use std::{
    collections::{BTreeMap, HashSet},
    path::Path,
};

use serde::Deserialize;
use tokio::fs;

use crate::{
    credentials::{MAX_DURATION, MIN_DURATION, mfa_device_arn},
    error::Error,
    shell::Shell,
};

pub const DEFAULT_PROFILE: &str = "default";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
enum AccountId {
    Text(String),
    Number(u64),
}

impl AccountId {
    fn into_string(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::Number(number) => format!("{number:012}"),
        }
    }
}

/// One profile as written in the file, before inheritance is applied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
struct ProfileEntry {
    account: Option<AccountId>,
    username: Option<String>,
    aws_profile: Option<String>,
    expiry: Option<u32>,
    shell: Option<Shell>,
    inherits: Option<String>,
}

impl ProfileEntry {
    /// `self` layered over `base`.
    fn over(&self, base: &Self) -> Self {
        Self {
            account: self.account.clone().or_else(|| base.account.clone()),
            username: self.username.clone().or_else(|| base.username.clone()),
            aws_profile: self.aws_profile.clone().or_else(|| base.aws_profile.clone()),
            expiry: self.expiry.or(base.expiry),
            shell: self.shell.or(base.shell),
            inherits: None,
        }
    }
}

/// A fully merged profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileConfig {
    pub account: String,
    pub username: String,
    pub aws_profile: Option<String>,
    pub expiry: Option<u32>,
    pub shell: Option<Shell>,
}

impl ProfileConfig {
    pub fn mfa_device(&self) -> String {
        mfa_device_arn(&self.account, &self.username)
    }
}

#[derive(Debug, Default)]
pub struct ConfigFile {
    profiles: BTreeMap<String, ProfileEntry>,
}

impl ConfigFile {
    pub async fn load(path: &Path) -> Result<Self, Error> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|source| Error::ConfigRead {
                path: path.to_path_buf(),
                source,
            })?;
        let profiles = serde_yaml::from_str(&content).map_err(|source| Error::ConfigParse {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self { profiles })
    }

    pub fn resolve(&self, name: &str) -> Result<ProfileConfig, Error> {
        let merged = self
            .chain(name)?
            .into_iter()
            .rev()
            .fold(ProfileEntry::default(), |base, layer| layer.over(&base));

        let missing = |field| Error::Config(format!("profile {name:?} has no {field}"));
        if let Some(expiry) = merged.expiry {
            if !(MIN_DURATION..=MAX_DURATION).contains(&expiry) {
                return Err(Error::Config(format!(
                    "profile {name:?} has expiry {expiry}, expected {MIN_DURATION}-{MAX_DURATION} seconds"
                )));
            }
        }
        Ok(ProfileConfig {
            account: merged.account.ok_or_else(|| missing("account"))?.into_string(),
            username: merged.username.ok_or_else(|| missing("username"))?,
            aws_profile: merged.aws_profile,
            expiry: merged.expiry,
            shell: merged.shell,
        })
    }

    /// Layers for `name`, most specific first.
    fn chain<'a>(&'a self, name: &'a str) -> Result<Vec<&'a ProfileEntry>, Error> {
        let mut layers = Vec::new();
        let mut seen = HashSet::new();
        let mut next = Some(name);

        while let Some(current) = next {
            if !seen.insert(current) {
                return Err(Error::Config(format!(
                    "profile {current:?} inherits from itself"
                )));
            }
            let entry = self.profiles.get(current).ok_or_else(|| {
                if current == name {
                    Error::Config(format!("profile {name:?} not found"))
                } else {
                    Error::Config(format!("profile {name:?} inherits unknown profile {current:?}"))
                }
            })?;
            layers.push(entry);
            next = entry.inherits.as_deref();
        }

        if !seen.contains(DEFAULT_PROFILE) {
            if let Some(default) = self.profiles.get(DEFAULT_PROFILE) {
                layers.push(default);
            }
        }
        Ok(layers)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    fn parse(yaml: &str) -> ConfigFile {
        ConfigFile {
            profiles: serde_yaml::from_str(yaml).unwrap(),
        }
    }

    const SAMPLE: &str = r#"
default:
  account: "012345678901"
  username: alice
  expiry: 43200

staging:
  aws_profile: staging-long-term
  shell: csh

staging-tcl:
  inherits: staging
  shell: tclsh

other-account:
  account: 123456789012
  username: bob
"#;

    #[test]
    fn default_profile_resolves_alone() {
        let config = parse(SAMPLE).resolve("default").unwrap();

        assert_eq!(
            config,
            ProfileConfig {
                account: "012345678901".to_string(),
                username: "alice".to_string(),
                aws_profile: None,
                expiry: Some(43200),
                shell: None,
            }
        );
        assert_eq!(config.mfa_device(), "arn:aws:iam::012345678901:mfa/alice");
    }

    #[test]
    fn inheritance_chain_then_default() {
        let config = parse(SAMPLE).resolve("staging-tcl").unwrap();

        assert_eq!(config.shell, Some(Shell::Tclsh));
        assert_eq!(config.aws_profile.as_deref(), Some("staging-long-term"));
        assert_eq!(config.username, "alice");
        assert_eq!(config.expiry, Some(43200));
    }

    #[test]
    fn numeric_account_is_zero_padded() {
        let config = parse("p:\n  account: 12345\n  username: u\n")
            .resolve("p")
            .unwrap();
        assert_eq!(config.account, "000000012345");

        let config = parse(SAMPLE).resolve("other-account").unwrap();
        assert_eq!(config.account, "123456789012");
        assert_eq!(config.expiry, Some(43200));
    }

    #[test]
    fn unknown_profile_is_an_error() {
        let err = parse(SAMPLE).resolve("prod").unwrap_err();
        assert_eq!(err.to_string(), "profile \"prod\" not found");
    }

    #[test]
    fn dangling_and_cyclic_inheritance_are_errors() {
        let config = parse(
            r#"
a: { inherits: b }
b: { inherits: a }
c: { inherits: missing, account: "1", username: u }
"#,
        );

        assert!(config.resolve("a").unwrap_err().to_string().contains("itself"));
        assert!(
            config
                .resolve("c")
                .unwrap_err()
                .to_string()
                .contains("unknown profile \"missing\"")
        );
    }

    #[test]
    fn missing_required_field_is_an_error() {
        let err = parse("p:\n  account: \"1\"\n").resolve("p").unwrap_err();
        assert_eq!(err.to_string(), "profile \"p\" has no username");
    }

    #[test]
    fn expiry_outside_sts_limits_is_an_error() {
        for expiry in ["899", "129601", "3000000000"] {
            let yaml = format!("p:\n  account: \"1\"\n  username: u\n  expiry: {expiry}\n");
            let err = parse(&yaml).resolve("p").unwrap_err();
            assert!(matches!(err, Error::Config(_)), "{expiry}");
            assert!(err.to_string().contains("expected 900-129600 seconds"), "{err}");
        }

        let inherited = parse("default:\n  expiry: 60\np:\n  account: \"1\"\n  username: u\n");
        assert!(inherited.resolve("p").is_err());

        let yaml = "p:\n  account: \"1\"\n  username: u\n  expiry: 129600\n";
        assert_eq!(parse(yaml).resolve("p").unwrap().expiry, Some(129600));
    }

    #[tokio::test]
    async fn load_reports_path_on_failure() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("aws-mfa.yaml");

        let err = ConfigFile::load(&path).await.unwrap_err();
        assert!(matches!(err, Error::ConfigRead { .. }));

        std::fs::write(&path, "default: [unterminated").unwrap();
        let err = ConfigFile::load(&path).await.unwrap_err();
        assert!(matches!(err, Error::ConfigParse { .. }));

        std::fs::write(&path, SAMPLE).unwrap();
        let config = ConfigFile::load(&path).await.unwrap();
        assert_eq!(config.resolve("staging").unwrap().shell, Some(Shell::Csh));
    }
}
