//! Write a starter template.

use std::path::PathBuf;

use shadowcast_render_model::{
    AspectRatio, LayerVisibility, RenderTemplate, RepeatPattern, RepeatSlot, TextLayer,
};

pub fn run(
    path: PathBuf,
    id: String,
    aspect: String,
    repeats: u32,
    pause: f64,
    progressive: bool,
) -> anyhow::Result<()> {
    let aspect_ratio = match aspect.as_str() {
        "vertical" | "9:16" => AspectRatio::Vertical,
        "widescreen" | "16:9" => AspectRatio::Widescreen,
        _ => {
            return Err(anyhow::anyhow!(
                "Unknown aspect ratio: {aspect}. Use: vertical, widescreen"
            ));
        }
    };
    if repeats == 0 {
        return Err(anyhow::anyhow!("--repeats must be at least 1"));
    }
    if !pause.is_finite() || pause < 0.0 {
        return Err(anyhow::anyhow!("--pause must be a non-negative number"));
    }

    let pattern = if progressive {
        RepeatPattern::Custom {
            repeats: (0..repeats)
                .map(|i| RepeatSlot {
                    layers: progressive_layers(i, repeats),
                    pause_secs: pause,
                })
                .collect(),
        }
    } else {
        RepeatPattern::Fixed {
            count: repeats,
            layers: LayerVisibility::only(&[TextLayer::English, TextLayer::Korean]),
            pause_secs: pause,
        }
    };

    if path.exists() {
        return Err(anyhow::anyhow!("{} already exists", path.display()));
    }
    let template = RenderTemplate::new(&id, aspect_ratio, pattern);
    template
        .save(&path)
        .map_err(|e| anyhow::anyhow!("Failed to write template: {e}"))?;

    println!("Template '{}' written to {}", id, path.display());
    println!("  Resolution: {}", template.resolution());
    println!("  Format: {}", template.format.extension());
    for (i, slot) in template.pattern.slots().iter().enumerate() {
        let layers: Vec<&str> = slot.layers.enabled().iter().map(|l| l.as_str()).collect();
        println!(
            "  Repeat {}: {}",
            i + 1,
            if layers.is_empty() {
                "no subtitles".to_string()
            } else {
                layers.join(" + ")
            }
        );
    }
    println!("  Pause between repeats: {pause:.1}s");
    Ok(())
}

/// Listen first, then Korean, then everything on the final repeat.
fn progressive_layers(index: u32, total: u32) -> LayerVisibility {
    if total == 1 || index + 1 == total {
        LayerVisibility::only(&TextLayer::ALL)
    } else if index == 0 {
        LayerVisibility::none()
    } else {
        LayerVisibility::only(&[TextLayer::Korean])
    }
}
