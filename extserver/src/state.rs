use std::{collections::BTreeMap, io::ErrorKind, path::Path};

use anyhow::{Context, Result};
use extserver_core::{ConnectorRecord, Identifier};
use extserver_resource::Mode;
use serde::{Deserialize, Deserializer, Serialize};

const STATE_TYPE: &str = "extserverState";

/// The root of a state file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineState {
    #[serde(default)]
    pub servers: BTreeMap<Identifier, ServerState>,

    #[serde(deserialize_with = "type_is_extserver_state")]
    _type: String,
}

fn type_is_extserver_state<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    if s == STATE_TYPE {
        Ok(s)
    } else {
        Err(serde::de::Error::custom(format!(
            "unexpected _type in extserver state: expected '{}', got '{}'",
            STATE_TYPE, s
        )))
    }
}

/// The last known state of one external server. Holds the secrets last sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerState {
    pub adopted: bool,
    pub record: ConnectorRecord,
}

impl ServerState {
    pub fn new(mode: Mode, record: ConnectorRecord) -> Self {
        ServerState {
            adopted: mode == Mode::Adopted,
            record,
        }
    }

    pub fn mode(&self) -> Mode {
        if self.adopted {
            Mode::Adopted
        } else {
            Mode::Managed
        }
    }
}

impl Default for EngineState {
    fn default() -> Self {
        EngineState {
            servers: BTreeMap::new(),
            _type: STATE_TYPE.to_string(),
        }
    }
}

impl EngineState {
    /// A missing file is an empty state.
    pub fn load(path: &Path) -> Result<EngineState> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(EngineState::default()),
            Err(e) => {
                return Err(e).with_context(|| format!("Could not read state file {}", path.display()))
            }
        };
        serde_json::from_str(&contents)
            .with_context(|| format!("Could not parse state file {}", path.display()))
    }

    /// Replace the state file. Written next to it first, then renamed over it.
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(&tmp, contents + "\n")
            .with_context(|| format!("Could not write state file {}", path.display()))?;
        std::fs::rename(&tmp, path)
            .with_context(|| format!("Could not replace state file {}", path.display()))
    }
}
