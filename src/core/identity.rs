//! Operator identity written into the master configuration

use serde::{Deserialize, Serialize};

use super::config_store::MasterConfig;
use super::error::{FleetError, Result};

/// Who the clients report results for.
///
/// `email` and `userid` are required by the PRPNet server; `machineid`
/// separates several hosts of the same user and `teamid` rolls results up
/// into team statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub email: String,
    pub userid: String,
    #[serde(default)]
    pub machineid: String,
    #[serde(default)]
    pub teamid: String,
}

impl Identity {
    pub fn new(email: impl Into<String>, userid: impl Into<String>) -> Result<Self> {
        let identity = Self {
            email: email.into(),
            userid: userid.into(),
            machineid: String::new(),
            teamid: String::new(),
        };
        identity.validate()?;
        Ok(identity)
    }

    pub fn with_machine(mut self, machineid: impl Into<String>) -> Self {
        self.machineid = machineid.into();
        self
    }

    pub fn with_team(mut self, teamid: impl Into<String>) -> Self {
        self.teamid = teamid.into();
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.email.trim().is_empty() {
            return Err(FleetError::InvalidIdentity("email is required".into()));
        }
        if self.userid.trim().is_empty() {
            return Err(FleetError::InvalidIdentity("userid is required".into()));
        }
        let fields = [&self.email, &self.userid, &self.machineid, &self.teamid];
        if fields.iter().any(|v| v.contains(&['\n', '\r'][..])) {
            return Err(FleetError::InvalidIdentity(
                "values must not contain line breaks".into(),
            ));
        }
        Ok(())
    }

    /// The configuration keys this identity rewrites
    pub fn updates(&self) -> MasterConfig {
        [
            ("email", self.email.as_str()),
            ("userid", self.userid.as_str()),
            ("machineid", self.machineid.as_str()),
            ("teamid", self.teamid.as_str()),
        ]
        .into_iter()
        .collect()
    }
}
