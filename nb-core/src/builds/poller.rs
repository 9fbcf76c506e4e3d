use async_trait::async_trait;
use nb_api::v1::{
    Build,
    BuildStatus,
};
use tracing::*;

use super::{
    BuildError,
    LogTailer,
};
use crate::errors::*;
use crate::services::{
    BuildsApi,
    StorageApi,
};
use crate::waiter::OperationPoller;

/// Waits for a build to reach a terminal status, tailing its log after every poll when a
/// tailer is attached.
pub struct BuildPoller<'a, B: BuildsApi + ?Sized, S: StorageApi + ?Sized> {
    api: &'a B,
    project: String,
    id: String,
    name: String,
    tailer: Option<LogTailer<'a, S>>,
}

impl<'a, B: BuildsApi + ?Sized, S: StorageApi + ?Sized> BuildPoller<'a, B, S> {
    pub fn new(api: &'a B, project: &str, id: &str) -> BuildPoller<'a, B, S> {
        BuildPoller {
            api,
            project: project.into(),
            id: id.into(),
            name: format!("build {id}"),
            tailer: None,
        }
    }

    pub fn with_tailer(mut self, tailer: Option<LogTailer<'a, S>>) -> Self {
        self.tailer = tailer;
        self
    }
}

#[async_trait]
impl<B: BuildsApi + ?Sized, S: StorageApi + ?Sized> OperationPoller for BuildPoller<'_, B, S> {
    type State = Build;
    type Output = Build;

    fn name(&self) -> &str {
        &self.name
    }

    async fn poll(&mut self) -> anyhow::Result<Build> {
        self.api.get_build(&self.project, &self.id).await
    }

    fn is_done(&self, build: &Build) -> bool {
        build.status.is_terminal()
    }

    fn get_result(&self, build: Build) -> anyhow::Result<Build> {
        match build.status {
            BuildStatus::Success => Ok(build),
            BuildStatus::Cancelled => Err(BuildError::cancelled(&build.id)),
            status => {
                let mut msg = format!("build {} completed with status \"{status}\"", build.id);
                if let Some(detail) = &build.status_detail {
                    msg = format!("{msg}: {detail}");
                }
                Err(BuildError::build_failed(&msg))
            },
        }
    }

    async fn cancel(&mut self) -> EmptyResult {
        let build = self.api.cancel_build(&self.project, &self.id).await?;
        info!("cancel requested for build {}, status is now {}", build.id, build.status);
        Ok(())
    }

    fn status_detail(&self, build: &Build) -> Option<String> {
        Some(build.status.to_string())
    }

    async fn on_poll(&mut self, _build: &Build) {
        if let Some(tailer) = self.tailer.as_mut()
            && let Err(err) = tailer.poll(false).await
        {
            warn!("could not write build log: {err}");
        }
    }

    async fn finish(&mut self) {
        let Some(tailer) = self.tailer.as_mut() else {
            return;
        };

        if let Err(err) = tailer.poll(true).await {
            warn!("could not write build log: {err}");
        }
        if let Err(err) = tailer.finish() {
            warn!("could not write build log: {err}");
        }
    }
}
