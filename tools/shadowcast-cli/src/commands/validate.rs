//! Validate a template.

use std::path::{Path, PathBuf};

use shadowcast_render_engine::compile;
use shadowcast_render_model::load_clips;

pub fn run(template_path: PathBuf, clips: Option<PathBuf>) -> anyhow::Result<()> {
    println!("Validating template at: {}", template_path.display());

    let template = super::load_template(&template_path)?;
    println!("  Id: {}", template.id);
    if !template.name.is_empty() {
        println!("  Name: {}", template.name);
    }
    println!(
        "  Resolution: {} ({:?})",
        template.resolution(),
        template.aspect_ratio
    );
    println!(
        "  Encoding: {} / {:?} quality",
        template.format.video_codec(),
        template.quality
    );
    println!("  Repeats: {}", template.pattern.repeat_count());
    if let Some(font) = &template.font.file {
        if !font.exists() {
            println!("  Font file: {} (missing)", font.display());
        }
    }

    let Some(clips) = clips else {
        println!("\nTemplate is valid.");
        return Ok(());
    };

    let clips = load_clips(&clips)
        .map_err(|e| anyhow::anyhow!("Failed to load clips {}: {e}", clips.display()))?;
    let scratch = Path::new("validate.out").with_extension(template.format.extension());

    let mut issues = Vec::new();
    let mut total_secs = 0.0;
    for clip in &clips {
        match compile(clip, &template, &scratch) {
            Ok(spec) => total_secs += spec.estimated_duration_secs,
            Err(e) => issues.push(format!("{}: {e}", clip.id)),
        }
        if !clip.media_path.exists() {
            issues.push(format!(
                "{}: media {} not found",
                clip.id,
                clip.media_path.display()
            ));
        }
    }

    println!("  Clips checked: {}", clips.len());
    println!("  Total estimated duration: {total_secs:.2}s");
    if issues.is_empty() {
        println!("\nTemplate is valid for all clips.");
        Ok(())
    } else {
        println!("\nValidation issues:");
        for issue in &issues {
            println!("  - {issue}");
        }
        Err(anyhow::anyhow!("{} issue(s) found", issues.len()))
    }
}
