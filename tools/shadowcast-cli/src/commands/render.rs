//! Render a single clip.

use std::path::PathBuf;

use shadowcast_common::config::AppConfig;

pub async fn run(
    config: &AppConfig,
    clip: String,
    clips: PathBuf,
    template: PathBuf,
) -> anyhow::Result<()> {
    let template = super::load_template(&template)?;
    let service = super::open_service(config, &clips).await?;

    let id = service.submit(&clip, &template).await?;
    let view = service.status(&id).await?;
    println!("Rendering clip '{clip}' with template '{}'", template.id);
    println!("  Job: {id}");
    println!(
        "  Resolution: {} ({:?})",
        template.resolution(),
        template.aspect_ratio
    );
    println!("  Repeats: {}", template.pattern.repeat_count());
    println!("  Estimated duration: {:.2}s", view.estimated_duration_secs);

    let job = super::follow(&service, &id).await?;
    super::report(&job)
}
