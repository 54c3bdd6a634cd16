//! On-disk checkpoint of a backend's three components.
//!
//! A checkpoint directory holds `networks.json` (every parameter, by
//! component) and `checkpoint.json`, a manifest with the SHA-256 of the exact
//! bytes of `networks.json`. Loading verifies the digest before anything is
//! deserialized.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use ganomaly_core::Method;
use ganomaly_core::persistence::{atomic_write, load_json, save_json, sha256_hex};

use super::ComponentKind;
use crate::error::MlError;

pub const NETWORKS_FILE: &str = "networks.json";
pub const MANIFEST_FILE: &str = "checkpoint.json";

/// Parameters of one component together with its interface shape and the
/// architecture they were trained for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentSnapshot {
    pub kind: ComponentKind,
    pub input_dim: usize,
    pub output_dim: usize,
    /// [`Component::architecture`](super::Component::architecture) at save time.
    #[serde(default)]
    pub architecture: String,
    pub parameters: Vec<f64>,
}

/// Everything needed to restore a backend of the same shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkSnapshot {
    pub method: Method,
    pub feature_dim: usize,
    pub latent_dim: usize,
    pub components: Vec<ComponentSnapshot>,
}

impl NetworkSnapshot {
    pub fn component(&self, kind: ComponentKind) -> Result<&ComponentSnapshot, MlError> {
        self.components
            .iter()
            .find(|c| c.kind == kind)
            .ok_or_else(|| MlError::mismatch(format!("checkpoint has no {kind}")))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointManifest {
    pub id: String,
    pub method: Method,
    pub feature_dim: usize,
    pub latent_dim: usize,
    pub parameter_counts: BTreeMap<String, usize>,
    pub architectures: BTreeMap<String, String>,
    pub hash: String,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
}

/// Write `snapshot` under `dir`. Returns the path of the weights file.
pub fn write(dir: &Path, snapshot: &NetworkSnapshot) -> Result<PathBuf, MlError> {
    std::fs::create_dir_all(dir)?;
    let bytes = serde_json::to_vec(snapshot)?;
    let networks_path = dir.join(NETWORKS_FILE);
    atomic_write(&networks_path, &bytes)?;

    let manifest = CheckpointManifest {
        id: uuid::Uuid::new_v4().to_string(),
        method: snapshot.method,
        feature_dim: snapshot.feature_dim,
        latent_dim: snapshot.latent_dim,
        parameter_counts: snapshot
            .components
            .iter()
            .map(|c| (c.kind.to_string(), c.parameters.len()))
            .collect(),
        architectures: snapshot
            .components
            .iter()
            .map(|c| (c.kind.to_string(), c.architecture.clone()))
            .collect(),
        hash: sha256_hex(&bytes),
        size_bytes: bytes.len() as u64,
        created_at: Utc::now(),
    };
    save_json(&dir.join(MANIFEST_FILE), &manifest)?;

    info!(
        path = %networks_path.display(),
        checkpoint_id = %manifest.id,
        method = %snapshot.method,
        "Checkpoint saved"
    );
    Ok(networks_path)
}

/// Read and verify the checkpoint under `dir`.
pub fn read(dir: &Path) -> Result<(CheckpointManifest, NetworkSnapshot), MlError> {
    let networks_path = dir.join(NETWORKS_FILE);
    let manifest_path = dir.join(MANIFEST_FILE);
    if !networks_path.is_file() || !manifest_path.is_file() {
        return Err(MlError::CheckpointNotFound(dir.to_path_buf()));
    }

    let manifest: CheckpointManifest = load_json(&manifest_path)?;
    let bytes = std::fs::read(&networks_path)?;
    let hash = sha256_hex(&bytes);
    if hash != manifest.hash {
        return Err(MlError::mismatch(format!(
            "{} digest {hash} does not match manifest {}",
            networks_path.display(),
            manifest.hash
        )));
    }
    let snapshot: NetworkSnapshot = serde_json::from_slice(&bytes)?;
    debug!(checkpoint_id = %manifest.id, created_at = %manifest.created_at, "Checkpoint verified");
    Ok((manifest, snapshot))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn snapshot() -> NetworkSnapshot {
        NetworkSnapshot {
            method: Method::Classical,
            feature_dim: 4,
            latent_dim: 2,
            components: vec![
                ComponentSnapshot {
                    kind: ComponentKind::Encoder,
                    input_dim: 4,
                    output_dim: 2,
                    architecture: "dense 4->2 tanh".to_string(),
                    parameters: vec![0.1, -0.2, 0.3],
                },
                ComponentSnapshot {
                    kind: ComponentKind::Critic,
                    input_dim: 4,
                    output_dim: 1,
                    architecture: "dense 4->1 linear".to_string(),
                    parameters: vec![1.0 / 3.0],
                },
            ],
        }
    }

    #[test]
    fn test_write_then_read() {
        let dir = TempDir::new().unwrap();
        let path = write(dir.path(), &snapshot()).unwrap();
        assert!(path.ends_with(NETWORKS_FILE));

        let (manifest, loaded) = read(dir.path()).unwrap();
        assert_eq!(loaded, snapshot());
        assert_eq!(manifest.parameter_counts["encoder"], 3);
        assert_eq!(manifest.architectures["critic"], "dense 4->1 linear");
        assert_eq!(manifest.method, Method::Classical);
    }

    #[test]
    fn test_missing_checkpoint() {
        let dir = TempDir::new().unwrap();
        let err = read(&dir.path().join("nothing-here")).unwrap_err();
        assert!(matches!(err, MlError::CheckpointNotFound(_)));
    }

    #[test]
    fn test_tampered_weights_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write(dir.path(), &snapshot()).unwrap();
        let mut content = std::fs::read_to_string(&path).unwrap();
        content = content.replace("0.1", "0.2");
        std::fs::write(&path, content).unwrap();

        let err = read(dir.path()).unwrap_err();
        assert!(matches!(err, MlError::CheckpointMismatch(_)));
    }

    #[test]
    fn test_missing_component() {
        let snap = snapshot();
        assert!(snap.component(ComponentKind::Encoder).is_ok());
        assert!(matches!(
            snap.component(ComponentKind::Decoder),
            Err(MlError::CheckpointMismatch(_))
        ));
    }
}
