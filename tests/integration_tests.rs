//! Integration Tests
//!
//! End-to-end tests for the Endless synthesis pipeline.

use std::fs;

use approx::assert_abs_diff_eq;
use hound::WavReader;
use pretty_assertions::assert_eq;
use rustfft::{num_complex::Complex, FftPlanner};
use tempfile::tempdir;

use endless::cli::commands::render_all;
use endless::dsp::mixer::mix;
use endless::engine::io::ExportFormat;
use endless::engine::{render, BatchFile, ControlRequest, Request, SignalBuffer, StimulusConfig};
use endless::layers::{
    EventLayer, LawKind, LayerSpacing, Onset, OscillatorLayer, PitchRamp, TempoRamp,
};
use endless::{Result, SynthError};

/// Fraction of spectral energy between `lo_hz` and `hi_hz`
fn band_energy_fraction(samples: &[f32], sample_rate: u32, lo_hz: f64, hi_hz: f64) -> f64 {
    let n = samples.len();
    let denom = (n - 1) as f64;
    let mut spectrum: Vec<Complex<f64>> = samples
        .iter()
        .enumerate()
        .map(|(i, &s)| {
            let window = 0.5 - 0.5 * (2.0 * std::f64::consts::PI * i as f64 / denom).cos();
            Complex::new(s as f64 * window, 0.0)
        })
        .collect();

    let mut planner = FftPlanner::new();
    planner.plan_fft_forward(n).process(&mut spectrum);

    let bin_hz = sample_rate as f64 / n as f64;
    let mut total = 0.0;
    let mut band = 0.0;
    for (k, c) in spectrum.iter().take(n / 2 + 1).enumerate() {
        let energy = c.norm_sqr();
        total += energy;
        let freq = k as f64 * bin_hz;
        if freq >= lo_hz && freq <= hi_hz {
            band += energy;
        }
    }
    band / total
}

fn onsets_of(layer: &EventLayer) -> Vec<Onset> {
    layer
        .onsets()
        .unwrap()
        .collect::<Result<Vec<_>>>()
        .unwrap()
}

// ============================================================================
// Full Pipeline Tests
// ============================================================================

#[test]
fn test_shepard_tone_pipeline() {
    let mut config = StimulusConfig::shepard_tone(1.0, 55.0, 4);
    config.sample_rate = 16000;
    let rendered = render(&Request::Illusion(config)).unwrap();

    assert_eq!(rendered.name, "shepard_rising_1s_55Hz_4layers");
    assert_eq!(rendered.buffer().len(), 16000);
    assert!(rendered.buffer().is_finite());
    assert_abs_diff_eq!(rendered.buffer().peak(), 0.8, epsilon = 1e-6);
    assert!(rendered.mix.peak_before_normalize > 0.0);
}

#[test]
fn test_risset_rhythm_pipeline() {
    let mut config = StimulusConfig::risset_rhythm(10.0, 80.0, 3);
    config.sample_rate = 8000;
    let rendered = render(&Request::Illusion(config)).unwrap();

    assert_eq!(rendered.buffer().len(), 80000);
    assert_abs_diff_eq!(rendered.buffer().peak(), 1.0, epsilon = 1e-6);
}

#[test]
fn test_stronger_rhythm_pipeline() {
    let mut config = StimulusConfig::risset_rhythm(10.0, 80.0, 3).stronger(3.0);
    config.sample_rate = 8000;
    let rendered = render(&Request::Illusion(config)).unwrap();
    assert!(rendered.buffer().is_finite());
    assert_abs_diff_eq!(rendered.buffer().peak(), 1.0, epsilon = 1e-6);
}

// ============================================================================
// Phase Continuity Tests
// ============================================================================

#[test]
fn test_sweep_energy_stays_in_band() {
    // 500 -> 600 Hz over 8192 samples. Integrating phase keeps the energy in
    // the swept band; sin(2π f(t) t) would spread it up to 700 Hz.
    let buffer = PitchRamp::new(500.0, 600.0, 8192.0 / 8000.0)
        .generate(8000)
        .unwrap();
    assert_eq!(buffer.len(), 8192);

    let fraction = band_energy_fraction(buffer.samples(), 8000, 478.0, 616.0);
    assert!(fraction > 0.99, "only {:.4} of the energy in band", fraction);
}

#[test]
fn test_shepard_layer_has_no_phase_jumps() {
    let mut config = StimulusConfig::shepard_tone(1.0, 55.0, 6);
    config.sample_rate = 44100;
    let spec = config.layer_spec().for_layer(5);
    let buffer = OscillatorLayer::shepard(spec, 44100).generate().unwrap();

    // Top layer ends at 55 · 2^6 = 3520 Hz
    let max_step = 2.0 * std::f64::consts::PI * 3520.0 / 44100.0;
    for pair in buffer.samples().windows(2) {
        assert!(((pair[1] - pair[0]) as f64).abs() <= max_step + 1e-6);
    }
}

// ============================================================================
// Event Clock Tests
// ============================================================================

#[test]
fn test_exponential_and_linear_laws_differ() {
    let mut config = StimulusConfig::risset_rhythm(20.0, 80.0, 1);
    config.octave_range = 3.0;
    let spec = config.layer_spec();

    let exponential = EventLayer::risset(spec, config.hit(), 8000);
    let linear = EventLayer::risset(
        endless::layers::LayerSpec {
            law: LawKind::Linear,
            ..spec
        },
        config.hit(),
        8000,
    );

    let count_before = |onsets: &[Onset]| onsets.iter().filter(|o| o.time < 10.0).count();
    let exp_onsets = onsets_of(&exponential);
    let lin_onsets = onsets_of(&linear);
    assert_eq!(count_before(&exp_onsets), 23);
    assert_eq!(count_before(&lin_onsets), 36);
}

#[test]
fn test_cyclic_rhythm_loops_seamlessly() {
    // Defaults of the loopable generator: 6 layers, 90 BPM, 6s cycles
    let config = StimulusConfig::risset_rhythm(30.0, 90.0, 6).cyclic(6.0);
    let spec = config.layer_spec();
    assert_eq!(config.spacing(), LayerSpacing::Fractional);

    for layer_index in 0..6 {
        let layer = EventLayer::risset(spec.for_layer(layer_index), config.hit(), 44100);
        let onsets = onsets_of(&layer);

        let first: Vec<&Onset> = onsets.iter().filter(|o| o.time < 6.0).collect();
        let second: Vec<&Onset> = onsets
            .iter()
            .filter(|o| o.time >= 6.0 && o.time < 12.0)
            .collect();
        assert_eq!(first.len(), second.len(), "layer {}", layer_index);
        for (a, b) in first.iter().zip(&second) {
            assert_abs_diff_eq!(b.time - 6.0, a.time, epsilon = 1e-9);
            assert_abs_diff_eq!(b.gain, a.gain, epsilon = 1e-12);
        }

        // No double hit where one cycle hands over to the next
        let last = first[first.len() - 1];
        let seam_gap = second[0].time - last.time;
        assert!(
            seam_gap * last.rate > 0.9,
            "layer {}: {:.4}s gap at the seam",
            layer_index,
            seam_gap
        );
    }
}

#[test]
fn test_tempo_ramp_first_beep_at_zero() {
    let mut request = ControlRequest::new(TempoRamp::new(60.0, 100.0, 8.0));
    request.sample_rate = 8000;
    let rendered = render(&Request::TempoRamp(request)).unwrap();
    // A beep starts at sample 0, so the first 800 samples carry signal
    assert!(rendered.buffer().samples()[..800].iter().any(|s| s.abs() > 0.5));
}

// ============================================================================
// Mixer Tests
// ============================================================================

#[test]
fn test_silent_layers_mix_to_silence() {
    let layers = vec![SignalBuffer::silence(1000, 44100); 3];
    let result = mix(&layers, 0.8).unwrap();
    assert!(result.buffer.samples().iter().all(|s| *s == 0.0));
    assert_eq!(result.peak_before_normalize, 0.0);
}

#[test]
fn test_mixer_contract_violations() {
    assert!(matches!(mix(&[], 0.8), Err(SynthError::EmptyMix)));

    let a = SignalBuffer::silence(10, 44100);
    let b = SignalBuffer::silence(11, 44100);
    assert!(matches!(
        mix(&[a, b], 0.8),
        Err(SynthError::LengthMismatch { .. })
    ));
}

// ============================================================================
// Batch / Export Tests
// ============================================================================

#[test]
fn test_batch_to_wav() {
    let dir = tempdir().unwrap();
    let json = r#"{
        "requests": [
            {"type": "pitch_ramp", "start_hz": 200, "end_hz": 400, "duration_secs": 0.5,
             "sample_rate": 8000},
            {"type": "illusion", "kind": "shepard_tone", "duration_secs": 0.5, "base": 55,
             "layer_count": 3, "sample_rate": 8000, "direction": "falling"}
        ]
    }"#;
    let batch: BatchFile = serde_json::from_str(json).unwrap();
    render_all(&batch.all_requests(), dir.path(), ExportFormat::float()).unwrap();

    let reader = WavReader::open(dir.path().join("pitch_200to400_0.5s.wav")).unwrap();
    assert_eq!(reader.spec().sample_rate, 8000);
    assert_eq!(reader.duration(), 4000);

    let mut reader =
        WavReader::open(dir.path().join("shepard_falling_0.5s_55Hz_3layers.wav")).unwrap();
    let peak = reader
        .samples::<f32>()
        .map(|s| s.unwrap().abs())
        .fold(0.0_f32, f32::max);
    assert_abs_diff_eq!(peak, 0.8, epsilon = 1e-6);

    let manifest = fs::read_to_string(dir.path().join("manifest.json")).unwrap();
    assert!(manifest.contains("sha256"));
}

#[test]
fn test_invalid_request_writes_nothing() {
    let dir = tempdir().unwrap();
    let request = Request::Illusion(StimulusConfig::shepard_tone(0.0, 55.0, 4));
    let result = render_all(&[request], dir.path(), ExportFormat::default());
    assert!(matches!(result, Err(SynthError::InvalidParameter { .. })));
    assert!(!dir.path().join("manifest.json").exists());
}
