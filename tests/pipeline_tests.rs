//! Pipeline Tests
//!
//! End-to-end tests for loop synthesis: range extraction, head and tail
//! tracks, mixdown and WAV export.

use approx::assert_relative_eq;
use pretty_assertions::assert_eq;
use tempfile::tempdir;
use test_case::test_case;

use loopmaker::dsp::{
    extract, mix, synthesize_head, synthesize_tail, FadeCurve, FadeSettings, LoopTracks,
    OverlapRatio, UsableRange,
};
use loopmaker::engine::{export_wav, generate_test_tone, import_audio, wav, AudioBuffer};
use loopmaker::{LoopError, LoopProject, LoopSettings};

const RATE: u32 = 44100;

/// Helper to create a mono buffer holding one constant value
fn constant(value: f32, secs: f64) -> AudioBuffer {
    let frames = (secs * RATE as f64) as usize;
    AudioBuffer::from_channels(vec![vec![value; frames]], RATE).unwrap()
}

// === Track Synthesis ===

#[test]
fn test_four_second_source_at_quarter_overlap() {
    let source = generate_test_tone(220.0, 4.0, RATE);
    let overlap = OverlapRatio::new(25.0).unwrap();
    let fade = FadeSettings::default();

    let head = synthesize_head(&source, overlap, &fade);
    let tail = synthesize_tail(&source, overlap, head.len(), &fade);

    assert_eq!(head.len(), 132300);
    assert_eq!(tail.len(), 132300);

    // first second: the source's last second, fading out
    let source_samples = source.channel(0);
    let tail_samples = tail.channel(0);
    assert_eq!(tail_samples[0], source_samples[132300]);
    assert!(tail_samples[..44100]
        .iter()
        .zip(&source_samples[132300..])
        .all(|(t, s)| t.abs() <= s.abs()));
    // remaining two seconds silent
    assert!(tail_samples[44100..].iter().all(|&s| s == 0.0));

    // head keeps the source untouched after its fade-in
    assert_eq!(&head.channel(0)[44100..], &source_samples[44100..132300]);
}

#[test]
fn test_linear_crossfade_keeps_constant_level() {
    let source = constant(0.5, 4.0);
    let fade = FadeSettings::new(FadeCurve::Linear);
    let tracks = LoopTracks::synthesize(&source, OverlapRatio::new(25.0).unwrap(), &fade, &fade);

    let mixed = tracks.mixdown().unwrap();
    assert_eq!(mixed.len(), 132300);
    for &sample in mixed.channel(0) {
        assert_relative_eq!(sample, 0.5, epsilon = 1e-5);
    }
}

#[test_case(0.0 ; "no overlap")]
#[test_case(10.0 ; "ten percent")]
#[test_case(33.3 ; "a third")]
#[test_case(50.0 ; "maximum")]
fn test_tracks_always_share_frame_count(percent: f64) {
    let source = generate_test_tone(440.0, 2.5, RATE);
    for curve in FadeCurve::ALL {
        let fade = FadeSettings::new(curve);
        let tracks =
            LoopTracks::synthesize(&source, OverlapRatio::new(percent).unwrap(), &fade, &fade);
        assert_eq!(tracks.track1.len(), tracks.track2.len());
        assert_eq!(tracks.track1.num_channels(), tracks.track2.num_channels());
        assert!(mix(&tracks.track1, &tracks.track2).is_ok());
    }
}

#[test]
fn test_zero_overlap_is_plain_repeat() {
    let source = generate_test_tone(100.0, 1.0, RATE);
    let tracks = LoopTracks::synthesize(
        &source,
        OverlapRatio::NONE,
        &FadeSettings::default(),
        &FadeSettings::default(),
    );
    assert_eq!(tracks.mixdown().unwrap(), source);
}

#[test]
fn test_mixing_unequal_tracks_fails() {
    let err = mix(&constant(0.1, 1.0), &constant(0.1, 2.0)).unwrap_err();
    assert!(matches!(err, LoopError::LengthMismatch { .. }));
    assert!(!err.is_recoverable());
}

// === Range Extraction ===

#[test]
fn test_range_then_synthesis() {
    let source = generate_test_tone(330.0, 5.0, RATE);
    let extracted = extract(&source, 0.5, 4.5);
    assert_eq!(extracted.len(), 4 * RATE as usize);
    assert_eq!(extracted.channel(0)[0], source.channel(0)[22050]);

    let fade = FadeSettings::default();
    let head = synthesize_head(&extracted, OverlapRatio::new(25.0).unwrap(), &fade);
    assert_eq!(head.len(), 132300);
}

#[test]
fn test_inverted_range_gives_empty_buffer() {
    let source = AudioBuffer::silent(2, RATE as usize, RATE);
    let extracted = extract(&source, 0.8, 0.2);
    assert!(extracted.is_empty());
    assert_eq!(extracted.num_channels(), 2);
    assert_eq!(extracted.sample_rate(), RATE);
}

// === Project and Export ===

#[test]
fn test_project_export_roundtrip() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("source.wav");
    let output = dir.path().join("loop.wav");
    export_wav(&generate_test_tone(440.0, 3.0, RATE), &input).unwrap();

    let settings = LoopSettings {
        overlap_ratio: 20.0,
        range: Some(UsableRange::new(0.5, 2.5)),
        ..Default::default()
    };
    let project = LoopProject::open(&input, settings).unwrap();
    let manifest = project.export_wav(&output).unwrap();

    let exported = import_audio(&output).unwrap();
    assert_eq!(exported.len(), manifest.frames);
    assert_eq!(exported.len(), project.tracks().frames());
    assert_eq!(manifest.source.as_deref(), Some(input.display().to_string().as_str()));
    assert_eq!(manifest.settings, *project.settings());
}

#[test]
fn test_export_matches_encoder_bytes() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("loop.wav");
    let project = LoopProject::new(
        generate_test_tone(200.0, 1.0, RATE),
        LoopSettings {
            overlap_ratio: 15.0,
            ..Default::default()
        },
    )
    .unwrap();

    project.export_wav(&path).unwrap();
    let expected = wav::encode(&project.mixdown().unwrap()).unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), expected);
}

#[test]
fn test_hot_mixdown_is_clipped_on_export() {
    // two full-scale tracks sum above 1.0 before serialization
    let loud = constant(0.9, 0.1);
    let mixed = mix(&loud, &loud).unwrap();
    assert!(mixed.channel(0).iter().all(|&s| s > 1.0));

    let bytes = wav::encode(&mixed).unwrap();
    let first = i16::from_le_bytes([bytes[wav::HEADER_LEN], bytes[wav::HEADER_LEN + 1]]);
    assert_eq!(first, i16::MAX);
}
