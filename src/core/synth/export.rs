use anyhow::{Context, Result};
use std::path::Path;

use super::RenderedTone;

/// Write a rendered tone to a 16-bit stereo WAV file.
///
/// Samples are clamped to -1.0..=1.0 before conversion; the tone is not
/// normalised here.
pub fn render_to_wav(tone: &RenderedTone, path: &Path) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 2,
        sample_rate: tone.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec)
        .with_context(|| format!("Failed to create WAV file {}", path.display()))?;

    for frame in &tone.frames {
        for &sample in frame {
            let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
            writer.write_sample(value)?;
        }
    }

    writer.finalize()?;
    log::info!(
        "Wrote {} ({} frames) to {}",
        tone.note,
        tone.frames.len(),
        path.display()
    );
    Ok(())
}
