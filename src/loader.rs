//! Loading the configured models into a [`SceneSession`].
//!
//! Every placement becomes one [`LoadTask`]. Tasks run concurrently and
//! independently; each finishes with a [`LoadCompletion`] that is handed to
//! [`complete`] on the thread that owns the session, in whatever order the
//! loads settle. A failed load is logged and recorded, and never affects the
//! other tasks.

use futures::{StreamExt, stream::FuturesUnordered};
use thiserror::Error;

use crate::{
    config::ModelPlacement,
    resources::{AssetFetcher, ModelAsset, load_model},
    session::SceneSession,
};

/// A model that could not be fetched or parsed. The placement is skipped for
/// the rest of the session.
#[derive(Debug, Error)]
#[error("failed to load model {folder}")]
pub struct AssetLoadFailure {
    pub folder: String,
    #[source]
    pub source: anyhow::Error,
}

/// One pending model load.
#[derive(Debug, Clone)]
pub struct LoadTask {
    pub placement: ModelPlacement,
}

/// The settled outcome of a [`LoadTask`].
#[derive(Debug)]
pub struct LoadCompletion {
    pub placement: ModelPlacement,
    pub outcome: anyhow::Result<ModelAsset>,
}

impl LoadTask {
    pub fn new(placement: ModelPlacement) -> Self {
        Self { placement }
    }

    /// Fetches and parses the model. Never fails; errors end up in the completion.
    pub async fn run<F: AssetFetcher>(self, fetcher: &F) -> LoadCompletion {
        let outcome = load_model(fetcher, &self.placement).await;
        LoadCompletion {
            placement: self.placement,
            outcome,
        }
    }
}

/// Applies a settled load to the session: attaches the model on success,
/// logs and records an [`AssetLoadFailure`] otherwise.
pub fn complete(session: &mut SceneSession, completion: LoadCompletion) {
    let LoadCompletion { placement, outcome } = completion;
    match outcome {
        Ok(asset) => {
            session.attach_model(&placement, asset);
        }
        Err(source) => {
            log::error!("Failed to load model {}: {:#}", placement.folder, source);
            session.record_failure(AssetLoadFailure {
                folder: placement.folder,
                source,
            });
        }
    }
}

/// Starts one load per placement (in configuration order) and calls
/// `on_complete` for each as soon as it settles.
pub async fn load_each<F, C>(fetcher: &F, placements: Vec<ModelPlacement>, mut on_complete: C)
where
    F: AssetFetcher,
    C: FnMut(LoadCompletion),
{
    log::info!("Loading {} models", placements.len());
    let mut pending: FuturesUnordered<_> = placements
        .into_iter()
        .map(|placement| LoadTask::new(placement).run(fetcher))
        .collect();
    while let Some(completion) = pending.next().await {
        on_complete(completion);
    }
}

/// Loads every placement straight into `session`.
pub async fn load_all<F: AssetFetcher>(
    fetcher: &F,
    placements: Vec<ModelPlacement>,
    session: &mut SceneSession,
) {
    load_each(fetcher, placements, |completion| complete(session, completion)).await;
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use super::*;

    #[test]
    fn failure_is_recorded_with_its_folder() {
        let mut session = SceneSession::new();
        complete(
            &mut session,
            LoadCompletion {
                placement: ModelPlacement::new("missing", [1.0; 3], [0.0; 3]),
                outcome: Err(anyhow::anyhow!("not found")),
            },
        );
        assert!(session.active_models().is_empty());
        assert_eq!(session.scene().len(), 1);
        let failure = &session.failures()[0];
        assert_eq!(failure.folder, "missing");
        assert_eq!(failure.to_string(), "failed to load model missing");
        assert_eq!(failure.source().map(|e| e.to_string()).as_deref(), Some("not found"));
    }

    #[test]
    fn success_is_tracked() {
        let mut session = SceneSession::new();
        complete(
            &mut session,
            LoadCompletion {
                placement: ModelPlacement::new("empty", [1.0; 3], [1.0, 2.0, 3.0]),
                outcome: Ok(ModelAsset::default()),
            },
        );
        assert_eq!(session.active_models().len(), 1);
        assert!(session.failures().is_empty());
    }
}
