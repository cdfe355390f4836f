//! Render a prompt and print progress, stopping the task after a deadline.
//!
//! ```sh
//! cargo run --example progress_tracking
//! ```

use easy_diffusion_rs::{EasyDiffusionClient, RenderRequest, Sampler};
use std::time::{Duration, Instant};

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let client = EasyDiffusionClient::default();
    if !client.ping().await? {
        eprintln!("Easy Diffusion is not ready");
        return Ok(());
    }

    let request = RenderRequest::builder("a cat wearing a tiny hat, digital art")
        .inference_steps(30)
        .sampler(Sampler::Dpmpp2m)
        .build()?;
    let task = client.render(&request).await?;

    let deadline = Instant::now() + Duration::from_secs(120);
    let mut last = 0;
    loop {
        if Instant::now() > deadline {
            client.stop(task).await;
            eprintln!("Timed out, task stopped");
            break;
        }
        let progress = client.progress(task).await?;
        if progress.percent > last {
            last = progress.percent;
            println!("  {}%", last);
        }
        if let Some(images) = progress.images {
            println!("Done! Generated {} image(s)", images.len());
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    Ok(())
}
