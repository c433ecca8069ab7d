//! Print the transcoder invocation for a clip.

use std::path::PathBuf;

use shadowcast_common::config::AppConfig;
use shadowcast_render_engine::compile;
use shadowcast_render_service::ClipCatalog;

pub async fn run(
    config: &AppConfig,
    clip: String,
    clips: PathBuf,
    template: PathBuf,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let template = super::load_template(&template)?;
    let catalog = super::load_catalog(&clips)?;
    let clip = catalog.clip(&clip).await?;

    let output = output.unwrap_or_else(|| {
        config
            .output_dir
            .join(format!("{}.{}", clip.id, template.format.extension()))
    });
    let spec = compile(&clip, &template, &output)?;

    println!("{}", spec.command_line(&config.transcoder.ffmpeg_path));
    eprintln!();
    eprintln!("Estimated duration: {:.2}s", spec.estimated_duration_secs);
    if let Some(graph) = &spec.filter_graph {
        eprintln!("Filter graph:");
        eprintln!("  {graph}");
    }
    Ok(())
}
