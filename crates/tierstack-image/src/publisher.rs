//! Repository creation and image publishing.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tierstack_common::error::{OutputError, Result, StackError};
use tierstack_common::types::{RegistryCredential, ResourceId};
use tierstack_provider::spec::{ImageBuildSpec, RepositorySpec};
use tierstack_provider::{ImageBuilder, Output, RegistryApi};

use crate::credential::CredentialResolver;

/// A published image.
#[derive(Debug, Clone)]
pub struct ImageReference {
    /// Repository the image was pushed to.
    pub repository_name: String,
    /// Repository identifier.
    pub repository_id: ResourceId,
    /// Image resource identifier.
    pub image_id: ResourceId,
    /// Build context directory.
    pub build_context: PathBuf,
    /// Dockerfile used for the build.
    pub dockerfile: PathBuf,
    /// Pullable image name, known once the push completes.
    pub image_name: Output<String>,
    /// Content-addressed reference, known once the push completes.
    pub repo_digest: Output<String>,
}

/// Returns `<context>/<repository>/Dockerfile`.
#[must_use]
pub fn dockerfile_path(build_context: &Path, repository_name: &str) -> PathBuf {
    build_context.join(repository_name).join("Dockerfile")
}

fn validate_repository_name(name: &str) -> Result<()> {
    let valid_chars = name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '-' | '_' | '.' | '/'));
    let valid_edges = name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphanumeric())
        && !name.ends_with(['/', '-', '_', '.']);
    if valid_chars && valid_edges {
        Ok(())
    } else {
        Err(StackError::Config {
            message: format!(
                "repository name \"{name}\" must be lowercase alphanumerics separated by '-', '_', '.' or '/'"
            ),
        })
    }
}

/// Creates repositories and pushes images into them.
#[derive(Debug)]
pub struct ImagePublisher<P: ?Sized> {
    provider: Arc<P>,
}

impl<P> ImagePublisher<P>
where
    P: RegistryApi + ImageBuilder + ?Sized + 'static,
{
    /// Creates a publisher backed by `provider`.
    #[must_use]
    pub const fn new(provider: Arc<P>) -> Self {
        Self { provider }
    }

    /// Creates (or reuses) a force-deletable repository named `repository_name`, then
    /// builds `<build_context>/<repository_name>/Dockerfile` and pushes it.
    ///
    /// The push credential is requested once the repository's registry id
    /// is known. A token is fetched on every call; nothing is cached.
    /// Returns without waiting for the push: a malformed token surfaces as a
    /// failure of the returned image name.
    ///
    /// # Errors
    ///
    /// Returns `StackError::Config` for an invalid repository name, or the
    /// provider's error if the repository or image cannot be declared.
    pub async fn publish(
        &self,
        repository_name: &str,
        build_context: &Path,
    ) -> Result<ImageReference> {
        validate_repository_name(repository_name)?;
        let repository = self
            .provider
            .create_repository(&RepositorySpec {
                name: repository_name.into(),
                force_delete: true,
            })
            .await?;
        tracing::info!(repository = repository_name, id = %repository.id, "repository declared");

        let registry = Arc::clone(&self.provider);
        let credential: Output<RegistryCredential> =
            repository.registry_id.then(move |registry_id| async move {
                CredentialResolver::new(registry)
                    .resolve(&registry_id)
                    .await
                    .map_err(OutputError::from)
            });

        let dockerfile = dockerfile_path(build_context, repository_name);
        let pushed = self
            .provider
            .build_and_push(ImageBuildSpec {
                name: repository_name.into(),
                repository_id: repository.id.clone(),
                context: build_context.to_path_buf(),
                dockerfile: dockerfile.clone(),
                image_name: repository.url.clone(),
                registry: credential,
            })
            .await?;
        tracing::info!(
            repository = repository_name,
            dockerfile = %dockerfile.display(),
            "image build declared"
        );

        Ok(ImageReference {
            repository_name: repository_name.into(),
            repository_id: repository.id,
            image_id: pushed.id,
            build_context: build_context.to_path_buf(),
            dockerfile,
            image_name: pushed.image_name,
            repo_digest: pushed.repo_digest,
        })
    }
}
