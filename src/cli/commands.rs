//! CLI Command Implementations
//!
//! Implements the actual logic for each CLI command.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use log::{info, warn};
use walkdir::WalkDir;

use crate::cli::LoopArgs;
use crate::dsp::{FadeCurve, FadeDirection, FadeSettings};
use crate::engine::buffer::{calculate_peak, calculate_rms};
use crate::engine::{
    export_wav, import_audio, AudioBuffer, LoopPlaybackScheduler, OfflineHost, TrackId,
};
use crate::project::{ExportManifest, LoopProject};

/// Load a source and apply the command-line loop parameters
fn open_project(input: &Path, args: &LoopArgs) -> Result<LoopProject> {
    let source = import_audio(input)
        .with_context(|| format!("Failed to import {}", input.display()))?;
    let settings = args.resolve(source.duration_secs())?;
    let project = LoopProject::new(source, settings)?;
    Ok(project.with_source_name(input.display().to_string()))
}

/// Path with `suffix` appended to the file stem, e.g. `loop_track1.wav`
fn with_stem_suffix(path: &Path, suffix: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "loop".to_string());
    path.with_file_name(format!("{}_{}.wav", stem, suffix))
}

/// Build a loop from `input` and export it.
pub fn render(
    input: &Path,
    output: &Path,
    args: &LoopArgs,
    write_tracks: bool,
    write_manifest: bool,
    save_settings: Option<&Path>,
) -> Result<ExportManifest> {
    info!("Rendering loop from: {}", input.display());

    let project = open_project(input, args)?;
    let manifest = project
        .export_wav(output)
        .with_context(|| format!("Failed to export {}", output.display()))?;

    println!(
        "Loop written: {} ({} frames, {:.3}s)",
        output.display(),
        manifest.frames,
        manifest.duration_secs
    );

    if write_tracks {
        let tracks = project.tracks();
        for (suffix, buffer) in [("track1", &tracks.track1), ("track2", &tracks.track2)] {
            let path = with_stem_suffix(output, suffix);
            export_wav(buffer, &path)?;
            println!("Track written: {}", path.display());
        }
    }

    if write_manifest {
        let path = ExportManifest::sidecar_path(output);
        manifest.save(&path)?;
        println!("Manifest written: {}", path.display());
    }

    if let Some(path) = save_settings {
        project.settings().save(path)?;
        println!("Settings written: {}", path.display());
    }

    Ok(manifest)
}

/// Show format and level information.
pub fn show_info(input: &Path) -> Result<()> {
    let buffer = import_audio(input)?;
    print_buffer_info(input, &buffer);
    Ok(())
}

fn print_buffer_info(path: &Path, buffer: &AudioBuffer) {
    println!("File:        {}", path.display());
    println!("Channels:    {}", buffer.num_channels());
    println!("Sample rate: {} Hz", buffer.sample_rate());
    println!("Frames:      {}", buffer.len());
    println!("Duration:    {:.3}s", buffer.duration_secs());
    println!("Peak:        {:.1} dBFS", calculate_peak(buffer));
    println!("RMS:         {:.1} dBFS", calculate_rms(buffer));
}

/// Print the sampled gain curve of a fade mode.
pub fn show_curve(
    mode: &str,
    point: Option<(f64, f64)>,
    fade_out: bool,
    steps: usize,
) -> Result<()> {
    let mut fade = FadeSettings::new(FadeCurve::from_name(mode));
    if let Some((x, y)) = point {
        fade = fade.with_control_point(x, y);
    }
    let direction = if fade_out {
        FadeDirection::Out
    } else {
        FadeDirection::In
    };

    println!(
        "Curve: {} ({}), control point ({:.2}, {:.2})",
        fade.curve,
        if fade_out { "fade-out" } else { "fade-in" },
        fade.control_x,
        fade.control_y
    );
    println!("{:-<40}", "");
    for (t, gain) in fade.sample_curve(steps, direction) {
        let bar = "#".repeat((gain * 30.0).round() as usize);
        println!("{:>5.2}  {:>6.4}  {}", t, gain, bar);
    }
    let (ax, ay) = fade.anchor(direction);
    println!("{:-<40}", "");
    println!("Anchor: ({:.2}, {:.4})", ax, ay);
    Ok(())
}

/// Render every WAV file under `dir` into `output_dir`.
///
/// Outputs keep their path relative to `dir`. Files that fail are reported and skipped. Returns the number written.
pub fn batch(dir: &Path, output_dir: &Path, args: &LoopArgs) -> Result<usize> {
    if !dir.is_dir() {
        bail!("{} is not a directory", dir.display());
    }
    fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;

    let inputs: Vec<PathBuf> = WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            path.extension()
                .map(|ext| ext.eq_ignore_ascii_case("wav"))
                .unwrap_or(false)
        })
        .filter(|path| !path.starts_with(output_dir))
        .collect();

    info!("Batch rendering {} files from {}", inputs.len(), dir.display());

    let mut written = 0;
    for input in &inputs {
        // outputs mirror the source tree
        let Ok(relative) = input.strip_prefix(dir) else {
            continue;
        };
        let output = output_dir.join(relative);
        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        match render(input, &output, args, false, true, None) {
            Ok(_) => written += 1,
            Err(e) => warn!("Skipping {}: {:#}", input.display(), e),
        }
    }

    println!("Rendered {} of {} files into {}", written, inputs.len(), output_dir.display());
    Ok(written)
}

/// Render `loops` passes of the preview through an offline scheduler.
pub fn preview(
    input: &Path,
    output: &Path,
    loops: u32,
    offset: f64,
    mute: &[u8],
    args: &LoopArgs,
) -> Result<AudioBuffer> {
    let project = open_project(input, args)?;
    let tracks = project.tracks();
    let host = OfflineHost::new(tracks.track1.sample_rate(), tracks.track1.num_channels());
    let mut scheduler = LoopPlaybackScheduler::new(host);

    project.play(&mut scheduler, offset)?;
    for &number in mute {
        let Some(track) = TrackId::from_number(number) else {
            bail!("no track {} (expected 1 or 2)", number);
        };
        scheduler.set_track_mute(track, true);
    }

    let frames = tracks.frames() * loops as usize;
    let rendered = scheduler.host_mut().render(frames);
    let levels = TrackId::BOTH.map(|track| scheduler.level(track));
    scheduler.stop();

    export_wav(&rendered, output)?;
    println!(
        "Preview written: {} ({} loops, {:.3}s)",
        output.display(),
        loops,
        rendered.duration_secs()
    );
    println!("Final levels: track 1 {:.3}, track 2 {:.3}", levels[0], levels[1]);
    Ok(rendered)
}

/// Play the loop on an audio device for `seconds`.
#[cfg(feature = "device")]
pub fn play(input: &Path, seconds: f64, device: Option<&str>, args: &LoopArgs) -> Result<()> {
    use std::time::{Duration, Instant};

    use crate::engine::DeviceHost;

    let project = open_project(input, args)?;
    let host = DeviceHost::open(device, Some(project.tracks().track1.sample_rate()))?;
    info!("Playing on {}", host.device_name());

    let mut scheduler = LoopPlaybackScheduler::new(host);
    project.play(&mut scheduler, 0.0)?;

    let started = Instant::now();
    while started.elapsed().as_secs_f64() < seconds {
        std::thread::sleep(Duration::from_millis(250));
        if let Some(position) = scheduler.current_position() {
            println!(
                "{:>8.3}s  L1 {:.3}  L2 {:.3}",
                position,
                scheduler.level(TrackId::Track1),
                scheduler.level(TrackId::Track2)
            );
        }
        if scheduler.host().has_error() {
            warn!("Output stream reported an error, stopping");
            break;
        }
    }

    scheduler.stop();
    Ok(())
}
