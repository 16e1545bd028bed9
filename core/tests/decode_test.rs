mod common;

use common::{noise, TapeSynth};
use tapedump_core::{Decoder, DecoderConfig, FrameFormat, Parity};

const RATE: f64 = 44100.0;

fn decode(config: DecoderConfig, samples: &[f32]) -> tapedump_core::DecodeOutput {
    Decoder::new(config, RATE)
        .expect("decoder construction failed")
        .decode(samples)
        .expect("decode failed")
}

#[test]
fn test_two_bytes_kept_only_with_keep_all() {
    let mut synth = TapeSynth::kcs(RATE);
    synth.carrier(30);
    synth.bytes(b"HI");
    synth.carrier(24);
    let samples = synth.finish();

    let mut config = DecoderConfig::kcs();
    config.keep_all = true;
    let output = decode(config, &samples);
    assert_eq!(output.files.len(), 1);
    assert_eq!(output.files[0], b"HI");

    // Two bytes are below the noise floor without keep-all.
    let output = decode(DecoderConfig::kcs(), &samples);
    assert!(output.files.is_empty());
    assert_eq!(output.report.frames, 2);
}

#[test]
fn test_clean_run_of_25_bytes() {
    let mut synth = TapeSynth::kcs(RATE);
    synth.carrier(30);
    synth.bytes(&[0x41; 25]);
    synth.carrier(24);
    let output = decode(DecoderConfig::kcs(), &synth.finish());

    assert_eq!(output.files.len(), 1);
    assert_eq!(output.files[0], vec![0x41; 25]);
    assert!(
        output.report.stop_bit_errors.is_empty(),
        "unexpected stop bit errors: {:?}",
        output.report.stop_bit_errors
    );
    assert!(output.report.max_variance < 0.2);
}

#[test]
fn test_carrier_gap_splits_files() {
    let first: Vec<u8> = (0..30).map(|i| b'A' + (i % 26)).collect();
    let second: Vec<u8> = (0..30).map(|i| b'a' + (i % 26)).collect();

    let mut synth = TapeSynth::kcs(RATE);
    synth.carrier(30);
    synth.bytes(&first);
    // Twelve frames of carrier is past the eleven-frame file boundary.
    synth.carrier(12 * 11);
    synth.bytes(&second);
    synth.carrier(24);
    let output = decode(DecoderConfig::kcs(), &synth.finish());

    assert_eq!(output.files.len(), 2);
    assert_eq!(output.files[0], first);
    assert_eq!(output.files[1], second);
    assert_eq!(output.report.file_breaks.len(), 1);
}

#[test]
fn test_corrupted_middle_keeps_flanks() {
    let data: Vec<u8> = (0..60).map(|i| b'A' + (i % 26)).collect();
    let mut synth = TapeSynth::kcs(RATE);
    synth.carrier(30);
    synth.bytes(&data);
    synth.carrier(24);
    let mut samples = synth.finish();

    // Overwrite the middle 5% with noise.
    let len = samples.len();
    let from = len * 475 / 1000;
    let to = len * 525 / 1000;
    for i in from..to {
        samples[i] = noise(i) * 0.8;
    }

    let output = decode(DecoderConfig::kcs(), &samples);
    // The gap is well under eleven frame widths, so both flanks land in one
    // file; the corrupted stretch costs bytes but not the recording.
    assert_eq!(output.files.len(), 1);
    let decoded = &output.files[0];
    assert!(decoded.len() <= 65, "decoded {} bytes", decoded.len());
    assert!(decoded.len() >= 45, "decoded only {} bytes", decoded.len());
    assert_eq!(&decoded[..15], &data[..15]);
    assert_eq!(&decoded[decoded.len() - 15..], &data[data.len() - 15..]);
}

#[test]
fn test_fast_tape_tracked_by_bit_width() {
    // Tape played 5% fast: baud and both tones scale together. The short
    // leader keeps the first frame inside the two-frame gap window, so the
    // decoder locks before its tracked widths have adapted.
    let mut synth = TapeSynth::new(RATE, 1260.0, 2520.0, 315.0);
    synth.carrier(18);
    let data: Vec<u8> = (0..40).map(|i| 0x80 | (i * 3 % 0x7f) as u8).collect();
    synth.bytes(&data);
    synth.carrier(24);
    let output = decode(DecoderConfig::kcs(), &synth.finish());

    assert_eq!(output.files.len(), 1);
    assert_eq!(output.files[0], data);
    assert!(
        output.report.max_variance > 0.04 && output.report.max_variance < 0.1,
        "max variance {} outside the expected 5% band",
        output.report.max_variance
    );
}

#[test]
fn test_cuts_preset_alternating_pattern() {
    let data: Vec<u8> = (0..100)
        .map(|i| if i % 2 == 0 { 0x55 } else { 0xAA })
        .collect();
    let mut synth = TapeSynth::cuts(RATE);
    synth.carrier(40);
    synth.bytes(&data);
    synth.carrier(30);
    let output = decode(DecoderConfig::cuts(), &synth.finish());

    assert_eq!(output.files.len(), 1);
    let decoded = &output.files[0];
    assert!(
        (98..=102).contains(&decoded.len()),
        "decoded {} bytes",
        decoded.len()
    );
    let compared = decoded.len().min(data.len());
    let matching = decoded
        .iter()
        .zip(&data)
        .filter(|(a, b)| a == b)
        .count();
    assert!(
        matching * 100 >= compared * 90,
        "only {matching} of {compared} bytes match"
    );
}

#[test]
fn test_noise_at_20db_snr() {
    let data: Vec<u8> = (0..100).map(|i| (i * 7) as u8).collect();
    let mut synth = TapeSynth::kcs(RATE);
    synth.carrier(30);
    synth.bytes(&data);
    synth.carrier(24);
    let mut samples = synth.finish();
    for (i, s) in samples.iter_mut().enumerate() {
        *s += noise(i) * 0.08;
    }

    let output = decode(DecoderConfig::kcs(), &samples);
    assert_eq!(output.files.len(), 1);
    let decoded = &output.files[0];
    assert_eq!(decoded.len(), data.len());
    let matching = decoded.iter().zip(&data).filter(|(a, b)| a == b).count();
    assert!(matching >= 99, "only {matching} of 100 bytes survived noise");
}

#[test]
fn test_seven_bit_frames() {
    let data: Vec<u8> = (0..40).map(|i| ((i * 3) % 128) as u8).collect();
    let mut synth = TapeSynth::kcs(RATE);
    synth.carrier(30);
    for &b in &data {
        synth.frame(b, 7, 1);
    }
    synth.carrier(24);

    let mut config = DecoderConfig::kcs();
    config.frame = FrameFormat {
        data_bits: 7,
        parity: Parity::None,
        stop_bits: 1,
    };
    let output = decode(config, &synth.finish());

    assert_eq!(output.files.len(), 1);
    assert_eq!(output.files[0], data);
    assert!(output.files[0].iter().all(|&b| b < 128));
}

#[test]
fn test_bit_stream_echo() {
    let mut synth = TapeSynth::kcs(RATE);
    synth.carrier(30);
    synth.bytes(&[0x41; 25]);
    synth.carrier(24);

    let mut config = DecoderConfig::kcs();
    config.emit_bits = true;
    let output = decode(config, &synth.finish());

    let stream = output.bit_stream.expect("bit stream requested");
    assert!(stream.chars().all(|c| c == '0' || c == '1'));
    // 0x41 LSB-first is 10000010; each frame echoes start bit, data bits and
    // the first stop bit.
    assert_eq!(stream.matches("0100000101").count(), 25);
}

#[test]
fn test_continuous_carrier_yields_no_files() {
    let mut synth = TapeSynth::kcs(RATE);
    synth.carrier(300);

    let mut config = DecoderConfig::kcs();
    config.emit_bits = true;
    let output = decode(config, &synth.finish());

    // With no low tone anywhere, the class averages collapse onto spectral
    // leakage and stray zero steps are possible; nothing long enough to
    // count as a file may come out of it.
    assert!(output.files.is_empty());
    let stream = output.bit_stream.expect("bit stream requested");
    assert!(!stream.is_empty());
    let ones = stream.chars().filter(|&c| c == '1').count();
    assert!(
        ones * 10 >= stream.len() * 6,
        "carrier stream is only {ones}/{} ones",
        stream.len()
    );
}

#[test]
fn test_all_silence_input() {
    let output = decode(DecoderConfig::kcs(), &vec![0.0; 44100]);
    assert!(output.files.is_empty());
    assert_eq!(output.report.frames, 0);
}

#[test]
fn test_empty_input() {
    let output = decode(DecoderConfig::kcs(), &[]);
    assert!(output.files.is_empty());
    assert_eq!(output.report.steps, 0);
}

#[test]
fn test_nineteen_bytes_discarded_without_keep_all() {
    let data = [0x2A; 19];
    let mut synth = TapeSynth::kcs(RATE);
    synth.carrier(30);
    synth.bytes(&data);
    synth.carrier(24);
    let samples = synth.finish();

    let output = decode(DecoderConfig::kcs(), &samples);
    assert!(output.files.is_empty());
    assert_eq!(output.report.frames, 19);

    let mut config = DecoderConfig::kcs();
    config.keep_all = true;
    let output = decode(config, &samples);
    assert_eq!(output.files.len(), 1);
    assert_eq!(output.files[0], data);
}

#[test]
fn test_silence_edges_are_trimmed() {
    let data: Vec<u8> = (0..30).map(|i| b'A' + (i % 26)).collect();
    let mut synth = TapeSynth::kcs(RATE);
    synth.silence(20);
    synth.carrier(20);
    synth.bytes(&data);
    synth.carrier(20);
    synth.silence(20);
    let output = decode(DecoderConfig::kcs(), &synth.finish());

    assert!(output.report.trimmed_head > 0);
    assert!(output.report.trimmed_tail > 0);
    assert_eq!(output.files.len(), 1);
    assert_eq!(output.files[0], data);
}

#[test]
fn test_graph_output_matches_timeline_length() {
    let mut synth = TapeSynth::kcs(RATE);
    synth.carrier(30);
    synth.bytes(&[0x41; 25]);
    synth.carrier(24);

    let mut config = DecoderConfig::kcs();
    config.graph = true;
    let output = decode(config, &synth.finish());

    let graph = output.graph.expect("graph requested");
    assert_eq!(graph.len(), output.report.steps);
    // Carrier steps lean high (positive), start bits lean low (negative).
    assert!(graph.iter().any(|&(_, v)| v > 0.0));
    assert!(graph.iter().any(|&(_, v)| v < 0.0));
    // Decoding still works while graphing.
    assert_eq!(output.files.len(), 1);
}

#[test]
fn test_window_functions_all_decode() {
    use tapedump_core::WindowKind;
    let data: Vec<u8> = (0..25).map(|i| b'A' + (i % 26)).collect();
    let mut synth = TapeSynth::kcs(RATE);
    synth.carrier(30);
    synth.bytes(&data);
    synth.carrier(24);
    let samples = synth.finish();

    for kind in [
        WindowKind::None,
        WindowKind::Bartlett,
        WindowKind::Welch,
        WindowKind::Hann,
    ] {
        let mut config = DecoderConfig::kcs();
        config.window = kind;
        let output = decode(config, &samples);
        assert_eq!(output.files.len(), 1, "window {kind:?}");
        assert_eq!(output.files[0], data, "window {kind:?}");
    }
}

#[test]
fn test_resampled_integer_bins() {
    // Resample to 32 samples per bit (9600 Hz); both tones land on exact
    // bins and the sum-of-three rule engages.
    let data: Vec<u8> = (0..30).map(|i| b'A' + (i % 26)).collect();
    let mut synth = TapeSynth::kcs(RATE);
    synth.carrier(30);
    synth.bytes(&data);
    synth.carrier(24);
    let samples = tapedump_core::resample(&synth.finish(), RATE, 9600.0);

    let mut config = DecoderConfig::kcs();
    config.assume_resampled = true;
    let decoder = Decoder::new(config, 9600.0).unwrap();
    assert_eq!(decoder.fft_width(), 32);
    assert!(decoder.lo_bin().is_integral());
    assert!(decoder.hi_bin().is_integral());

    let output = decoder.decode(&samples).unwrap();
    assert_eq!(output.files.len(), 1);
    assert_eq!(output.files[0], data);
}
