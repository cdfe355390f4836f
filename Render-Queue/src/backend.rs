use std::future::Future;
use std::sync::Arc;

use easy_diffusion_rs::{
    BackendSupervisor, EasyDiffusionClient, RenderRequest, Result, TaskProgress,
};

/// The image generation service the queue renders on.
///
/// Implemented for [`EasyDiffusionClient`]; tests plug in fakes.
pub trait RenderBackend: Send + Sync + 'static {
    /// Submit a job and return the backend's task id.
    fn submit(&self, request: &RenderRequest) -> impl Future<Output = Result<u64>> + Send;

    /// Read progress for a task. Images are present once it has finished.
    fn poll(&self, task_id: u64) -> impl Future<Output = Result<TaskProgress>> + Send;

    /// Best-effort stop. Failures are not reported.
    fn stop(&self, task_id: u64) -> impl Future<Output = ()> + Send;
}

/// Brings the backend up when a submission finds it unreachable.
pub trait Supervisor: Send + Sync + 'static {
    fn ensure_running(&self) -> impl Future<Output = Result<()>> + Send;
}

impl RenderBackend for EasyDiffusionClient {
    async fn submit(&self, request: &RenderRequest) -> Result<u64> {
        self.render(request).await
    }

    async fn poll(&self, task_id: u64) -> Result<TaskProgress> {
        self.progress(task_id).await
    }

    async fn stop(&self, task_id: u64) {
        EasyDiffusionClient::stop(self, task_id).await
    }
}

impl Supervisor for BackendSupervisor {
    async fn ensure_running(&self) -> Result<()> {
        BackendSupervisor::ensure_running(self).await
    }
}

impl<T: RenderBackend> RenderBackend for Arc<T> {
    fn submit(&self, request: &RenderRequest) -> impl Future<Output = Result<u64>> + Send {
        (**self).submit(request)
    }

    fn poll(&self, task_id: u64) -> impl Future<Output = Result<TaskProgress>> + Send {
        (**self).poll(task_id)
    }

    fn stop(&self, task_id: u64) -> impl Future<Output = ()> + Send {
        (**self).stop(task_id)
    }
}

impl<T: Supervisor> Supervisor for Arc<T> {
    fn ensure_running(&self) -> impl Future<Output = Result<()>> + Send {
        (**self).ensure_running()
    }
}
