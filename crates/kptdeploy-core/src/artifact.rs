//! Build artifacts tracked after a deploy

use serde::{Deserialize, Serialize};

/// A built image: the name used in manifests and the tag that was deployed
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    /// Image name as referenced by manifests, without tag or digest
    pub image_name: String,

    /// Fully qualified reference that was built and pushed
    pub tag: String,
}

impl Artifact {
    pub fn new(image_name: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            image_name: image_name.into(),
            tag: tag.into(),
        }
    }

    /// Build an artifact from a full image reference such as
    /// `gcr.io/proj/app:v1` or `app@sha256:...`
    pub fn from_reference(reference: &str) -> Self {
        Self {
            image_name: image_name(reference).to_string(),
            tag: reference.to_string(),
        }
    }

    /// Image name with any tag or digest removed
    pub fn sanitized_name(&self) -> &str {
        image_name(&self.image_name)
    }
}

/// Strip the tag and digest from an image reference
///
/// A colon only separates a tag when it comes after the last `/`, so
/// registry ports (`localhost:5000/app`) are kept.
pub fn image_name(reference: &str) -> &str {
    let without_digest = reference.split('@').next().unwrap_or(reference);
    let name_start = without_digest.rfind('/').map_or(0, |i| i + 1);
    match without_digest[name_start..].rfind(':') {
        Some(i) => &without_digest[..name_start + i],
        None => without_digest,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_name() {
        assert_eq!(image_name("nginx"), "nginx");
        assert_eq!(image_name("nginx:1.25"), "nginx");
        assert_eq!(image_name("gcr.io/proj/app:v1"), "gcr.io/proj/app");
        assert_eq!(image_name("localhost:5000/app"), "localhost:5000/app");
        assert_eq!(image_name("localhost:5000/app:dev"), "localhost:5000/app");
        assert_eq!(image_name("app@sha256:abcd"), "app");
        assert_eq!(image_name("app:v1@sha256:abcd"), "app");
    }

    #[test]
    fn test_from_reference() {
        let artifact = Artifact::from_reference("gcr.io/proj/app:v2");
        assert_eq!(artifact.image_name, "gcr.io/proj/app");
        assert_eq!(artifact.tag, "gcr.io/proj/app:v2");
    }

    #[test]
    fn test_artifact_json_shape() {
        let artifact: Artifact =
            serde_yaml::from_str("imageName: app\ntag: app:abc123\n").unwrap();
        assert_eq!(artifact, Artifact::new("app", "app:abc123"));
    }
}
