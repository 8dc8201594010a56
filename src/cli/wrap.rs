use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

use iecburst::engine::{CodecId, DeviceCaps, DtsLevel, PassthroughEngine, StreamHints};
use iecburst::sync::probe;

use super::caps::load_caps;
use super::command::{Cli, OutputFormat, WrapArgs};
use crate::input::InputReader;
use crate::wav::WavWriter;

const CHUNK_SIZE: usize = 64 * 1024;

/// Bytes examined when the codec is not given on the command line.
const PROBE_WINDOW: usize = 256 * 1024;

pub fn cmd_wrap(args: &WrapArgs, _cli: &Cli, multi: Option<&MultiProgress>) -> Result<()> {
    let mut caps = match &args.caps {
        Some(path) => load_caps(path)?,
        None => DeviceCaps::all(),
    };
    if let Some(level) = args.dts_level {
        caps.dts_level = Some(DtsLevel::from(level));
    }
    if args.no_dts_core_fallback {
        caps.dts_core_fallback = false;
    }

    let mut input = InputReader::new(&args.input)?;

    // Either trust the command line or sniff the stream's first window.
    let (codec, carry) = match args.codec {
        Some(codec) => (CodecId::from(codec), Vec::new()),
        None => {
            let mut window = vec![0u8; PROBE_WINDOW];
            let mut filled = 0;
            while filled < window.len() {
                let n = input.read_chunk(&mut window[filled..])?;
                if n == 0 {
                    break;
                }
                filled += n;
            }
            window.truncate(filled);

            let Some(codec) = probe(&window) else {
                bail!(
                    "no recognizable elementary stream in {}; pass --codec explicitly",
                    args.input.display()
                );
            };
            log::info!("probed {:?} from the first {} bytes", codec, filled);
            (codec, window)
        }
    };

    let mut hints = StreamHints::new(codec);
    hints.channels = args.channels;
    hints.sample_rate = args.sample_rate;

    let mut engine =
        PassthroughEngine::open(hints, &caps).context("opening the passthrough engine")?;

    let output_path = args.output.clone().unwrap_or_else(|| {
        let mut path: PathBuf = args.input.clone();
        path.set_extension(match args.format {
            OutputFormat::Raw => "spdif",
            OutputFormat::Wav => "wav",
        });
        path
    });
    let file = File::create(&output_path)
        .with_context(|| format!("creating {}", output_path.display()))?;

    let mut sink = match args.format {
        OutputFormat::Raw => Sink::Raw(file),
        OutputFormat::Wav => {
            let mut writer = WavWriter::new(file);
            let rate = match engine.sample_rate() {
                0 => 48000,
                rate => rate,
            };
            writer.configure(rate, 2)?;
            writer.write_header()?;
            Sink::Wav(writer)
        }
    };

    let pb = multi.map(|multi| {
        let pb = multi.add(ProgressBar::new_spinner());
        if let Ok(style) = ProgressStyle::with_template("{spinner:.green} {msg}") {
            pb.set_style(style);
        }
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb
    });

    let mut bytes_in = 0usize;
    let mut bytes_out = 0usize;

    // `pending` holds input the engine has not consumed yet; the engine
    // reports partial consumption and expects resubmission.
    let mut pending = carry;
    let mut drain =
        |pending: &mut Vec<u8>, engine: &mut PassthroughEngine, sink: &mut Sink| -> Result<usize> {
            let mut total = 0;
            loop {
                let used = engine.decode(pending)?;
                pending.drain(..used);
                total += used;

                let burst = engine.get_data();
                if !burst.is_empty() {
                    sink.write_all(&burst)?;
                    bytes_out += burst.len();
                }

                if used == 0 || pending.is_empty() {
                    break;
                }
            }
            Ok(total)
        };

    bytes_in += pending.len();
    drain(&mut pending, &mut engine, &mut sink)?;

    input.process_chunks(CHUNK_SIZE, |chunk| {
        bytes_in += chunk.len();
        pending.extend_from_slice(chunk);
        drain(&mut pending, &mut engine, &mut sink)?;

        if let Some(pb) = &pb {
            pb.set_message(format!("wrapped {bytes_in} bytes"));
        }
        Ok(true)
    })?;

    if let Sink::Wav(writer) = &mut sink {
        writer.finish()?;
    }

    let stream_type = engine.stream_type();
    engine.close();

    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    match stream_type {
        Some(kind) => log::info!(
            "wrapped {bytes_in} bytes of {kind} into {bytes_out} burst bytes ({})",
            output_path.display()
        ),
        None => log::info!(
            "wrapped {bytes_in} bytes into {bytes_out} burst bytes ({})",
            output_path.display()
        ),
    }
    if !pending.is_empty() {
        log::warn!("{} trailing bytes did not form a complete frame", pending.len());
    }

    Ok(())
}

enum Sink {
    Raw(File),
    Wav(WavWriter<File>),
}

impl Sink {
    fn write_all(&mut self, data: &[u8]) -> Result<()> {
        match self {
            Sink::Raw(file) => file.write_all(data)?,
            Sink::Wav(writer) => writer.write_data(data)?,
        }
        Ok(())
    }
}
