//! Scenario files
//!
//! A scenario is a TOML description of one complete meeting: the subject,
//! the framing details, and every participant with their input. The `run`
//! command plays it end to end without any interactive steps.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

#[derive(Debug, Deserialize)]
pub struct Scenario {
    pub subject: String,
    pub details: String,
    pub participants: Vec<ScenarioParticipant>,
}

#[derive(Debug, Deserialize)]
pub struct ScenarioParticipant {
    /// Email-style contact string, also used as the persona's attribution.
    pub contact: String,
    /// The free-text perspective this participant brings to the meeting.
    pub input: String,
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading scenario file {}", path.display()))?;
        let scenario: Scenario = toml::from_str(&text)
            .with_context(|| format!("parsing scenario file {}", path.display()))?;
        scenario.validate()?;
        Ok(scenario)
    }

    fn validate(&self) -> Result<()> {
        if self.subject.trim().is_empty() {
            bail!("scenario subject must not be empty");
        }
        if self.participants.is_empty() {
            bail!("scenario needs at least one participant");
        }
        let mut seen = HashSet::new();
        for participant in &self.participants {
            if participant.contact.trim().is_empty() {
                bail!("participant contact must not be empty");
            }
            if participant.input.trim().is_empty() {
                bail!(
                    "participant {} has an empty input",
                    participant.contact
                );
            }
            if !seen.insert(participant.contact.as_str()) {
                bail!("duplicate participant contact: {}", participant.contact);
            }
        }
        Ok(())
    }

    pub fn contacts(&self) -> Vec<String> {
        self.participants
            .iter()
            .map(|p| p.contact.clone())
            .collect()
    }

    pub fn input_for(&self, contact: &str) -> Option<&str> {
        self.participants
            .iter()
            .find(|p| p.contact == contact)
            .map(|p| p.input.as_str())
    }
}
