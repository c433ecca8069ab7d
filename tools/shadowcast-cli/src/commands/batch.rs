//! Render several clips into one merged video.

use std::path::PathBuf;

use shadowcast_common::config::AppConfig;

pub async fn run(
    config: &AppConfig,
    clip_ids: Vec<String>,
    clips: PathBuf,
    template: PathBuf,
) -> anyhow::Result<()> {
    let template = super::load_template(&template)?;
    let service = super::open_service(config, &clips).await?;

    let id = service.submit_batch(&clip_ids, &template).await?;
    let view = service.status(&id).await?;
    println!(
        "Rendering batch of {} clips with template '{}'",
        clip_ids.len(),
        template.id
    );
    println!("  Job: {id}");
    println!("  Clips: {}", clip_ids.join(", "));
    println!("  Estimated duration: {:.2}s", view.estimated_duration_secs);

    let job = super::follow(&service, &id).await?;
    super::report(&job)
}
