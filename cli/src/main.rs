use clap::Parser;
use std::fs;
use std::path::PathBuf;
use tapedump_core::{
    reduce_channels, resample, Channel, DecodeOutput, DecodeReport, Decoder, DecoderConfig,
    FrameFormat, TapeError, WindowKind,
};

#[derive(Parser)]
#[command(name = "tapedump")]
#[command(about = "Decode Kansas City Standard cassette audio into byte files")]
#[command(version)]
struct Cli {
    /// Input WAV recording of the tape
    #[arg(value_name = "INPUT.WAV")]
    input: PathBuf,

    /// High ("1") tone frequency in Hz
    #[arg(long, default_value_t = 2400.0)]
    hi: f64,

    /// Low ("0") tone frequency in Hz
    #[arg(long, default_value_t = 1200.0)]
    lo: f64,

    /// Baud rate
    #[arg(long, default_value_t = 300.0)]
    baud: f64,

    /// CUTS preset: hi=1200, lo=600, baud=1200
    #[arg(long)]
    cuts: bool,

    /// Frame layout: data bits, parity (N/E/O), stop bits
    #[arg(long, default_value = "8N2")]
    frame: FrameFormat,

    /// Stop reading after this many input samples
    #[arg(long)]
    max: Option<usize>,

    /// Analysis steps per bit
    #[arg(long, default_value_t = 8)]
    steps: u32,

    /// FFT window function: none, bartlett, welch or hann
    #[arg(long, default_value = "none")]
    window: WindowKind,

    /// Resample to this many samples per bit before decoding
    #[arg(long)]
    resample: Option<u32>,

    /// Keep decoded files shorter than 20 bytes
    #[arg(long)]
    keep: bool,

    /// Write <basename>.dat with per-step tone balance for plotting
    #[arg(long)]
    graph: bool,

    /// Stereo channel to decode: L, R or A (sum of both)
    #[arg(long, default_value = "L")]
    channel: Channel,

    /// Write <basename>.bit with the raw sampled bit stream
    #[arg(long)]
    bit: bool,

    /// Echo the decoded bytes of each file to stdout
    #[arg(long)]
    print_data: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let (hi, lo, baud) = if cli.cuts {
        (1200.0, 600.0, 1200.0)
    } else {
        (cli.hi, cli.lo, cli.baud)
    };

    let mut reader = hound::WavReader::open(&cli.input)?;
    let spec = reader.spec();
    println!(
        "Read WAV: {} Hz, {} channels, {} bits",
        spec.sample_rate, spec.channels, spec.bits_per_sample
    );

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Int => {
            let full_scale = (1u32 << (spec.bits_per_sample - 1)) as f32;
            let samples: Result<Vec<i32>, _> = reader.samples::<i32>().collect();
            samples?.into_iter().map(|s| s as f32 / full_scale).collect()
        }
        hound::SampleFormat::Float => {
            let samples: Result<Vec<f32>, _> = reader.samples::<f32>().collect();
            samples?
        }
    };
    if interleaved.is_empty() {
        return Err(TapeError::EmptyWaveform.into());
    }

    let mut samples = reduce_channels(&interleaved, spec.channels, cli.channel, cli.max)?;
    println!("Decoding {} samples", samples.len());

    let mut sample_rate = spec.sample_rate as f64;
    let assume_resampled = cli.resample.is_some();
    if let Some(per_bit) = cli.resample {
        let target = per_bit as f64 * baud;
        samples = resample(&samples, sample_rate, target);
        sample_rate = target;
        println!("Resampled to {target} Hz ({per_bit} samples per bit)");
    }

    let config = DecoderConfig {
        lo_hz: lo,
        hi_hz: hi,
        baud,
        frame: cli.frame,
        window: cli.window,
        steps: cli.steps,
        channel: cli.channel,
        keep_all: cli.keep,
        assume_resampled,
        emit_bits: cli.bit,
        graph: cli.graph,
        max_samples: cli.max,
    };
    let decoder = Decoder::new(config, sample_rate)?;
    let lo_bin = decoder.lo_bin();
    let hi_bin = decoder.hi_bin();
    println!(
        "FFT width {}, step {} samples, {:.3} steps per bit",
        decoder.fft_width(),
        decoder.step(),
        decoder.bit_width()
    );
    println!(
        "Low tone {lo} Hz: bins {}/{} weights {:.3}/{:.3}",
        lo_bin.n1, lo_bin.n2, lo_bin.a1, lo_bin.a2
    );
    println!(
        "High tone {hi} Hz: bins {}/{} weights {:.3}/{:.3}",
        hi_bin.n1, hi_bin.n2, hi_bin.a1, hi_bin.a2
    );

    let output = decoder.decode(&samples)?;
    print_report(&output.report);

    let base = cli.input.with_extension("");
    let base = base.to_string_lossy();
    write_outputs(&output, &base, cli.print_data)?;

    println!(
        "Done: {} frames, {} file(s), max speed variance {:.4}",
        output.report.frames,
        output.files.len(),
        output.report.max_variance
    );
    Ok(())
}

fn print_report(report: &DecodeReport) {
    println!(
        "Trimmed {} leading and {} trailing quiet steps; {} steps remain",
        report.trimmed_head, report.trimmed_tail, report.steps
    );
    for (i, pass) in report.refine_passes.iter().enumerate() {
        println!(
            "Threshold pass {}: low avg {:.4} ({} steps), high avg {:.4} ({} steps)",
            i + 1,
            pass.avlo,
            pass.low_count,
            pass.avhi,
            pass.high_count
        );
    }
    if report.thresholds_reverted {
        println!("Threshold refinement underflowed; using global averages");
    }
    for reset in &report.speed_resets {
        println!(
            "Speed reset at step {}: gap of {:.2} frame widths",
            reset.step, reset.gap_frames
        );
    }
    for err in &report.stop_bit_errors {
        println!(
            "Bad stop bit {} near sample {}",
            err.stop_index, err.sample_offset
        );
    }
    for step in &report.file_breaks {
        println!("Starting new file at step {step}");
    }
}

fn write_outputs(
    output: &DecodeOutput,
    base: &str,
    print_data: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    for (index, file) in output.files.iter().enumerate() {
        let path = format!("{}-{:03}.txt", base, index + 1);
        fs::write(&path, file)?;
        println!("Wrote {} bytes to {}", file.len(), path);
        if print_data {
            println!("{}", render_bytes(file));
        }
    }
    if let Some(stream) = &output.bit_stream {
        let path = format!("{base}.bit");
        fs::write(&path, stream)?;
        println!("Wrote bit stream to {path}");
    }
    if let Some(points) = &output.graph {
        let path = format!("{base}.dat");
        let mut data = String::new();
        for (step, balance) in points {
            data.push_str(&format!("{step} {balance:.4}\n"));
        }
        fs::write(&path, data)?;
        println!("Wrote graph data to {path}");
    }
    Ok(())
}

/// Render decoded bytes for the terminal: printable ASCII verbatim, LF kept,
/// NUL and CR dropped, everything else as a hex escape.
fn render_bytes(bytes: &[u8]) -> String {
    let mut out = String::new();
    for &b in bytes {
        match b {
            0 | 13 => {}
            10 => out.push('\n'),
            0x20..=0x7e => out.push(b as char),
            other => out.push_str(&format!("<{other:02X}>")),
        }
    }
    out
}
