//! Cancel a render a few seconds after it starts.
//!
//! ```sh
//! cargo run --example with_cancellation
//! ```

use std::time::Duration;

use easy_diffusion_rs::{BackendSupervisor, EasyDiffusionClient, RenderRequest};
use render_queue::*;

struct PrintNotifier;

impl Notifier for PrintNotifier {
    type Handle = ();

    async fn announce(&self, _origin: &Origin, text: &str) -> anyhow::Result<()> {
        println!("{}", text);
        Ok(())
    }

    async fn update(&self, _handle: &(), text: &str) -> anyhow::Result<()> {
        println!("{}", text);
        Ok(())
    }

    async fn delete_status(&self, _handle: &()) -> anyhow::Result<()> {
        Ok(())
    }

    async fn deliver_images(
        &self,
        _origin: &Origin,
        images: &[Vec<u8>],
        _caption: &str,
    ) -> anyhow::Result<()> {
        println!("got {} images", images.len());
        Ok(())
    }
}

#[tokio::main]
async fn main() {
    let client = EasyDiffusionClient::default();
    let supervisor = BackendSupervisor::new(client.clone(), "start.sh");
    let queue = RenderQueue::new(client, supervisor, PrintNotifier, QueueConfig::default());
    let _worker = queue.spawn();

    // Nothing is rendering yet.
    assert!(matches!(
        queue.cancel_active(),
        Err(QueueError::NothingToCancel)
    ));

    let request = RenderRequest::builder("a very detailed cathedral interior")
        .inference_steps(150)
        .build()
        .unwrap();
    queue.submit(request, Origin::private(1, 1)).await;

    tokio::time::sleep(Duration::from_secs(3)).await;
    match queue.cancel_active() {
        Ok(()) => println!("cancel requested"),
        Err(e) => println!("could not cancel: {}", e),
    }

    // The worker reports "canceled" and asks Easy Diffusion to stop the task.
    while !queue.is_empty() {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}
