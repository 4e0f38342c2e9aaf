//! Image selector used to find the pods of a deploy
//!
//! Log, debug and port-forward collaborators pick pods whose images carry
//! one of the tags in the selector. Tags are added after a successful apply.

use std::collections::BTreeSet;

use kptdeploy_core::Artifact;

/// Set of image tags belonging to the current deploy
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageSelector {
    tags: BTreeSet<String>,
}

impl ImageSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, tag: impl Into<String>) {
        self.tags.insert(tag.into());
    }

    /// Whether a pod running `image` belongs to the deploy
    pub fn select(&self, image: &str) -> bool {
        self.tags.contains(image)
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.tags.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

/// Add the tags of artifacts whose image is used by the deployed manifests
///
/// `deployed_images` is `None` when the manifests could not be read; every
/// artifact is tracked in that case.
pub fn add_tags_to_selector(
    artifacts: &[Artifact],
    deployed_images: Option<&[String]>,
    selector: &mut ImageSelector,
) {
    for artifact in artifacts {
        let name = artifact.sanitized_name();
        let deployed = deployed_images.is_none_or(|images| images.iter().any(|i| i == name));
        if deployed {
            selector.add(artifact.tag.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifacts() -> Vec<Artifact> {
        vec![
            Artifact::new("gcr.io/proj/web", "gcr.io/proj/web:abc"),
            Artifact::new("gcr.io/proj/worker", "gcr.io/proj/worker:def"),
        ]
    }

    #[test]
    fn test_only_deployed_images_are_tracked() {
        let mut selector = ImageSelector::new();
        let deployed = vec!["gcr.io/proj/web".to_string()];
        add_tags_to_selector(&artifacts(), Some(&deployed), &mut selector);

        assert_eq!(selector.tags().collect::<Vec<_>>(), vec!["gcr.io/proj/web:abc"]);
        assert!(selector.select("gcr.io/proj/web:abc"));
        assert!(!selector.select("gcr.io/proj/worker:def"));
    }

    #[test]
    fn test_unknown_images_track_everything() {
        let mut selector = ImageSelector::new();
        add_tags_to_selector(&artifacts(), None, &mut selector);
        assert_eq!(selector.len(), 2);
    }

    #[test]
    fn test_tagged_image_names_are_sanitized() {
        let mut selector = ImageSelector::new();
        let deployed = vec!["app".to_string()];
        add_tags_to_selector(&[Artifact::new("app:latest", "app:v9")], Some(&deployed), &mut selector);
        assert!(selector.select("app:v9"));
    }
}
