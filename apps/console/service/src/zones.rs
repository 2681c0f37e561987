//! Zone registry.
//!
//! A zone is one core installation: an RPC endpoint for commands and an
//! event endpoint for the pub-sub stream. Deployments with a single core
//! never write a zones file; the registry then carries one implicit zone
//! built from the configured endpoints. A broken zones file degrades to
//! that same implicit zone instead of refusing to start.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::Config;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneDescriptor {
    pub id: u32,
    pub name: String,
    pub rpc_endpoint: String,
    pub event_endpoint: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ZoneError {
    #[error("unknown zone {0:?}")]
    Unknown(String),
}

#[derive(Debug, Clone)]
pub struct ZoneRegistry {
    default: ZoneDescriptor,
    zones: Vec<ZoneDescriptor>,
}

impl ZoneRegistry {
    pub fn from_config(config: &Config) -> Self {
        let implicit = ZoneDescriptor {
            id: 0,
            name: "default".to_string(),
            rpc_endpoint: config.rpc_endpoint.clone(),
            event_endpoint: config.event_endpoint.clone(),
        };
        let Some(path) = &config.zones_path else {
            return Self::with_zones(vec![implicit]);
        };
        match load_zones(path) {
            Ok(zones) if !zones.is_empty() => Self::with_zones(zones),
            Ok(_) => {
                tracing::warn!(path = %path.display(), "zones file is empty, using the configured endpoints");
                Self::with_zones(vec![implicit])
            }
            Err(reason) => {
                tracing::warn!(path = %path.display(), %reason, "zones file unusable, using the configured endpoints");
                Self::with_zones(vec![implicit])
            }
        }
    }

    fn with_zones(zones: Vec<ZoneDescriptor>) -> Self {
        let default = zones
            .first()
            .cloned()
            .unwrap_or_else(|| ZoneDescriptor {
                id: 0,
                name: "default".to_string(),
                rpc_endpoint: String::new(),
                event_endpoint: String::new(),
            });
        Self { default, zones }
    }

    /// The first zone in the file, or the implicit zone.
    pub fn default_zone(&self) -> &ZoneDescriptor {
        &self.default
    }

    pub fn zones(&self) -> &[ZoneDescriptor] {
        &self.zones
    }

    /// Resolves an optional `zone` query value. Absent means the default;
    /// anything that is not a known numeric id is an error.
    pub fn resolve(&self, requested: Option<&str>) -> Result<&ZoneDescriptor, ZoneError> {
        let Some(raw) = requested else {
            return Ok(self.default_zone());
        };
        let id: u32 = raw
            .trim()
            .parse()
            .map_err(|_| ZoneError::Unknown(raw.to_string()))?;
        self.zones
            .iter()
            .find(|zone| zone.id == id)
            .ok_or_else(|| ZoneError::Unknown(raw.to_string()))
    }
}

fn load_zones(path: &Path) -> Result<Vec<ZoneDescriptor>, String> {
    let raw =
        std::fs::read_to_string(path).map_err(|err| format!("cannot read zones file: {err}"))?;
    serde_json::from_str(&raw).map_err(|err| format!("malformed zones file: {err}"))
}
