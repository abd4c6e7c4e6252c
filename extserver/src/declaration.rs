use std::{collections::BTreeMap, path::Path};

use anyhow::{Context, Result};
use extserver_core::{ConnectorRecord, Identifier};
use extserver_resource::{registry, Mode};
use serde_json::{Map, Value};

/// A declaration file: the external servers that should exist.
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Declarations {
    pub servers: BTreeMap<Identifier, ServerDeclaration>,
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerDeclaration {
    #[serde(rename = "type")]
    pub type_: String,
    /// The server already exists and is owned elsewhere
    #[serde(default)]
    pub adopt: bool,
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

/// One declared server, classified.
#[derive(Debug, Clone, PartialEq)]
pub struct Declared {
    pub plan: ConnectorRecord,
    pub mode: Mode,
}

impl Declarations {
    pub fn load(path: &Path) -> Result<Declarations> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Could not read declarations from {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Could not parse declarations in {}", path.display()))
    }

    pub fn declared(&self) -> Result<BTreeMap<Identifier, Declared>> {
        self.servers
            .iter()
            .map(|(id, decl)| {
                let plan = registry::record_from_declaration(id.clone(), &decl.type_, &decl.attributes)
                    .with_context(|| format!("In the declaration of external server '{}'", id))?;
                let mode = if decl.adopt {
                    Mode::Adopted
                } else {
                    Mode::Managed
                };
                Ok((id.clone(), Declared { plan, mode }))
            })
            .collect()
    }
}
