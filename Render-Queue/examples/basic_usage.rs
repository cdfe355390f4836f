//! Queue two renders on a local Easy Diffusion server.
//!
//! ```sh
//! EASY_DIFFUSION_PATH=/opt/easy-diffusion/start.sh cargo run --example basic_usage
//! ```

use std::time::Duration;

use easy_diffusion_rs::{BackendSupervisor, EasyDiffusionClient, RenderRequest, Sampler};
use render_queue::*;

struct PrintNotifier;

impl Notifier for PrintNotifier {
    type Handle = i64;

    async fn announce(&self, origin: &Origin, text: &str) -> anyhow::Result<i64> {
        println!("[#{}] {}", origin.message_id, text);
        Ok(origin.message_id)
    }

    async fn update(&self, handle: &i64, text: &str) -> anyhow::Result<()> {
        println!("[#{}] {}", handle, text);
        Ok(())
    }

    async fn delete_status(&self, _handle: &i64) -> anyhow::Result<()> {
        Ok(())
    }

    async fn deliver_images(
        &self,
        origin: &Origin,
        images: &[Vec<u8>],
        caption: &str,
    ) -> anyhow::Result<()> {
        for (i, bytes) in images.iter().enumerate() {
            std::fs::write(format!("{}-{}.jpg", origin.message_id, i), bytes)?;
        }
        println!("[#{}] {} images: {}", origin.message_id, images.len(), caption);
        Ok(())
    }
}

#[tokio::main]
async fn main() {
    let client = EasyDiffusionClient::default();
    let launch_path = std::env::var("EASY_DIFFUSION_PATH").unwrap_or_default();
    let supervisor = BackendSupervisor::new(client.clone(), launch_path);

    let queue = RenderQueue::new(client, supervisor, PrintNotifier, QueueConfig::default());
    let _worker = queue.spawn();

    let fox = RenderRequest::builder("a red fox in the snow").build().unwrap();
    let city = RenderRequest::builder("a city at night, neon, rain")
        .sampler(Sampler::Dpmpp2m)
        .inference_steps(30)
        .num_outputs(2)
        .build()
        .unwrap();

    // The second request is told it is at position #1.
    queue.submit(fox, Origin::private(1, 1)).await;
    queue.submit(city, Origin::private(1, 2)).await;

    while !queue.is_empty() {
        tokio::time::sleep(Duration::from_millis(250)).await;
    }
}
