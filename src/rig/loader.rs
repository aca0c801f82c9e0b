//! Rig loading.
//!
//! The renderer parses the actual model file. It exports a small manifest next
//! to it listing which humanoid bones and expressions the model has, so the
//! engine only writes to parts that exist.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use anyhow::Context;
use serde::Deserialize;
use tracing::{debug, info};

use super::{Bone, HumanoidRig, Rig};

/// Produces a rig for a model id (dyn-compatible).
pub trait RigLoader: Send + Sync {
    fn load<'a>(
        &'a self,
        model_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Box<dyn Rig>>> + Send + 'a>>;
}

/// `<model>.rig.json` contents.
#[derive(Debug, Deserialize)]
struct RigManifest {
    #[serde(default)]
    bones: Vec<String>,
    #[serde(default)]
    expressions: Vec<String>,
}

/// Loads `<asset_dir>/<model>.rig.json`, falling back to the standard humanoid
/// when the model ships without a manifest.
pub struct ManifestRigLoader {
    asset_dir: PathBuf,
}

impl ManifestRigLoader {
    pub fn new(asset_dir: impl Into<PathBuf>) -> Self {
        Self {
            asset_dir: asset_dir.into(),
        }
    }

    fn manifest_path(&self, model_id: &str) -> PathBuf {
        let stem = model_id.strip_suffix(".vrm").unwrap_or(model_id);
        self.asset_dir.join(format!("{}.rig.json", stem))
    }
}

impl RigLoader for ManifestRigLoader {
    fn load<'a>(
        &'a self,
        model_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Box<dyn Rig>>> + Send + 'a>> {
        Box::pin(async move {
            let path = self.manifest_path(model_id);
            let rig = match tokio::fs::read_to_string(&path).await {
                Ok(contents) => parse_manifest(&path, &contents)?,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    debug!(path = %path.display(), "No rig manifest, using standard humanoid");
                    HumanoidRig::standard()
                }
                Err(e) => {
                    return Err(e).with_context(|| format!("failed to read {}", path.display()))
                }
            };
            info!(model = model_id, "Rig loaded");
            Ok(Box::new(rig) as Box<dyn Rig>)
        })
    }
}

fn parse_manifest(path: &Path, contents: &str) -> anyhow::Result<HumanoidRig> {
    let manifest: RigManifest = serde_json::from_str(contents)
        .with_context(|| format!("invalid rig manifest {}", path.display()))?;

    // Bones outside the animated set (toes, fingers, ...) are irrelevant here.
    let bones = manifest
        .bones
        .into_iter()
        .filter_map(|name| serde_json::from_value::<Bone>(serde_json::Value::String(name)).ok());

    Ok(HumanoidRig::new(bones, manifest.expressions))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("vchat-rig-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[tokio::test]
    async fn test_missing_manifest_yields_standard_rig() {
        let dir = temp_dir();
        let loader = ManifestRigLoader::new(&dir);
        let mut rig = loader.load("carlotta.vrm").await.unwrap();
        for bone in Bone::ALL {
            assert!(rig.joint_mut(bone).is_some());
        }
        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn test_manifest_limits_bones_and_expressions() {
        let dir = temp_dir();
        std::fs::write(
            dir.join("phoebe.rig.json"),
            r#"{"bones": ["hips", "head", "leftToes"], "expressions": ["aa", "happy"]}"#,
        )
        .unwrap();

        let loader = ManifestRigLoader::new(&dir);
        let mut rig = loader.load("phoebe.vrm").await.unwrap();
        assert!(rig.joint_mut(Bone::Hips).is_some());
        assert!(rig.joint_mut(Bone::Head).is_some());
        assert!(rig.joint_mut(Bone::Spine).is_none());
        assert_eq!(rig.expression("happy"), Some(0.0));
        assert_eq!(rig.expression("blink"), None);
        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn test_invalid_manifest_is_error() {
        let dir = temp_dir();
        std::fs::write(dir.join("jinshi.rig.json"), "not json").unwrap();
        let loader = ManifestRigLoader::new(&dir);
        assert!(loader.load("jinshi.vrm").await.is_err());
        let _ = std::fs::remove_dir_all(dir);
    }
}
