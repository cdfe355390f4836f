//! Render one prompt and save the images.
//!
//! Starts Easy Diffusion first if it is not running.
//!
//! ```sh
//! EASY_DIFFUSION_PATH=/opt/easy-diffusion/start.sh cargo run --example simple_render
//! ```

use easy_diffusion_rs::{BackendSupervisor, EasyDiffusionClient, RenderRequest};
use std::time::Duration;

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let client = EasyDiffusionClient::new("http://localhost:9000");
    let launch_path = std::env::var("EASY_DIFFUSION_PATH").unwrap_or_default();
    BackendSupervisor::new(client.clone(), launch_path)
        .ensure_running()
        .await?;

    let request = RenderRequest::builder("a lighthouse on a cliff, oil painting")
        .num_outputs(2)
        .build()?;
    let task = client.render(&request).await?;
    println!("Task: {}", task);

    let images = loop {
        tokio::time::sleep(Duration::from_millis(500)).await;
        if let Some(images) = client.progress(task).await?.images {
            break images;
        }
    };

    for (i, bytes) in images.iter().enumerate() {
        let path = format!("{:x}-{}.jpg", request.seed(), i);
        std::fs::write(&path, bytes)?;
        println!("Saved {}", path);
    }
    Ok(())
}
