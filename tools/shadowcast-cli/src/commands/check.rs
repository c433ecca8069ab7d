//! Check transcoder availability.

use shadowcast_common::config::AppConfig;
use shadowcast_render_engine::command_exists;

pub fn run(config: &AppConfig) -> anyhow::Result<()> {
    println!("Shadowcast System Check");
    println!("{}", "=".repeat(50));

    let ffmpeg = &config.transcoder.ffmpeg_path;
    let ffmpeg_ok = command_exists(ffmpeg);
    if ffmpeg_ok {
        println!("[OK] ffmpeg: {}", ffmpeg.display());
    } else {
        println!("[MISSING] ffmpeg: {}", ffmpeg.display());
        println!("     Install ffmpeg or set FFMPEG_PATH / transcoder.ffmpeg_path");
    }

    match &config.transcoder.ffprobe_path {
        Some(ffprobe) if command_exists(ffprobe) => {
            println!("[OK] ffprobe: {}", ffprobe.display())
        }
        Some(ffprobe) => {
            println!("[WARN] ffprobe: {} not found", ffprobe.display());
            println!("     Output durations will not be verified");
        }
        None => println!("[WARN] ffprobe: disabled; output durations will not be verified"),
    }

    println!();
    println!("Directories:");
    println!("  Output: {}", config.output_dir.display());
    println!("  Temp:   {}", config.temp_dir.display());
    println!("  State:  {}", config.state_dir.display());
    println!();
    println!("Limits:");
    println!(
        "  Concurrent renders: {}",
        config.scheduler.max_concurrent_renders
    );
    println!("  Batch clips: {}", config.scheduler.max_batch_clips);
    println!("  Transcoder timeout: {}s", config.transcoder.timeout_secs);

    println!();
    if ffmpeg_ok {
        println!("Shadowcast is ready to render.");
    } else {
        println!("ffmpeg is required. See above for fixes.");
    }
    Ok(())
}
