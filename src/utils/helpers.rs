/// Scale a buffer of stereo frames so its peak sits at `target` (linear).
/// Silent buffers are left untouched. Returns the gain that was applied.
pub fn normalize_frames(frames: &mut [[f32; 2]], target: f32) -> f32 {
    let max_abs = peak_amplitude(frames);

    if max_abs <= 0.0 {
        return 1.0;
    }

    let gain = target / max_abs;
    for frame in frames.iter_mut() {
        frame[0] *= gain;
        frame[1] *= gain;
    }
    gain
}

/// Largest absolute sample value across both channels
pub fn peak_amplitude(frames: &[[f32; 2]]) -> f32 {
    frames
        .iter()
        .fold(0.0f32, |max, frame| max.max(frame[0].abs()).max(frame[1].abs()))
}

/// Format a frequency value with appropriate unit suffix (Hz, kHz)
pub fn format_frequency(freq: f32) -> String {
    if freq >= 1000.0 {
        format!("{:.2} kHz", freq / 1000.0)
    } else {
        format!("{:.1} Hz", freq)
    }
}

/// Format a time value with appropriate unit suffix (ms, s)
pub fn format_time(time_in_seconds: f32) -> String {
    if time_in_seconds >= 1.0 {
        format!("{:.2} s", time_in_seconds)
    } else {
        format!("{:.0} ms", time_in_seconds * 1000.0)
    }
}

/// Convert a MIDI note number to its equal-tempered frequency in Hz
pub fn midi_note_to_freq(note: u8) -> f32 {
    // A4 (note 69) is 440 Hz
    440.0 * 2.0f32.powf((note as f32 - 69.0) / 12.0)
}

/// Calculate decibels from a linear amplitude value
pub fn amplitude_to_db(amplitude: f32) -> f32 {
    // Avoid log of zero
    if amplitude <= 0.0 {
        -96.0 // Minimum dB value (near silence)
    } else {
        20.0 * amplitude.log10()
    }
}

/// Convert decibels to a linear amplitude value
pub fn db_to_amplitude(db: f32) -> f32 {
    10.0f32.powf(db / 20.0)
}
