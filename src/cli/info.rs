use anyhow::Result;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use serde::Serialize;

use iecburst::engine::CodecId;
use iecburst::sync::{Ac3Sync, AacSync, DtsSync, FrameSync, MlpSync, SyncState, probe};

use super::command::{Cli, InfoArgs, ReportFormat};
use crate::input::InputReader;

/// Bytes examined for classification and frame statistics.
const ANALYSIS_WINDOW: usize = 4 * 1024 * 1024;

pub fn cmd_info(args: &InfoArgs, _cli: &Cli, multi: Option<&MultiProgress>) -> Result<()> {
    log::info!("analyzing elementary stream: {}", args.input.display());

    let pb = multi.map(|multi| {
        let pb = multi.add(ProgressBar::new_spinner());
        if let Ok(style) = ProgressStyle::with_template("{spinner:.green} {msg}") {
            pb.set_style(style);
        }
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb.set_message("analyzing frames...");
        pb
    });

    let mut input = InputReader::new(&args.input)?;
    let mut window = vec![0u8; ANALYSIS_WINDOW];
    let mut filled = 0;
    while filled < window.len() {
        let n = input.read_chunk(&mut window[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    window.truncate(filled);

    let report = analyze(&window);

    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    match report {
        None => {
            println!("No recognizable compressed audio stream found.");
            println!("The input does not start with a known sync pattern.");
        }
        Some(report) => match args.report {
            ReportFormat::Yaml => print!("{}", serde_yaml_ng::to_string(&report)?),
            ReportFormat::Text => {
                println!("Codec:            {:?}", report.codec);
                println!("Stream type:      {}", report.stream_type);
                println!("Sample rate:      {} Hz", report.sample_rate);
                println!("Frame size:       {} bytes in, {} bytes out", report.frame_bytes_in, report.frame_bytes_out);
                println!("Samples/frame:    {}", report.samples_per_frame);
                println!("Frames seen:      {}", report.frames_seen);
                println!("Bytes scanned:    {}", report.bytes_scanned);
            }
        },
    }

    Ok(())
}

#[derive(Debug, Serialize)]
pub struct StreamReport {
    #[serde(serialize_with = "codec_name")]
    pub codec: CodecId,
    pub stream_type: String,
    pub sample_rate: u32,
    pub frame_bytes_in: usize,
    pub frame_bytes_out: usize,
    pub samples_per_frame: usize,
    pub frames_seen: usize,
    pub bytes_scanned: usize,
}

fn codec_name<S: serde::Serializer>(codec: &CodecId, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format!("{codec:?}"))
}

/// Classifies the stream, then walks frame to frame collecting statistics.
fn analyze(window: &[u8]) -> Option<StreamReport> {
    let codec = probe(window)?;

    let mut sync = match codec {
        CodecId::Ac3 | CodecId::Eac3 => FrameSync::Ac3(Ac3Sync::default()),
        CodecId::Dts => FrameSync::Dts(DtsSync::new(false)),
        CodecId::Aac => FrameSync::Aac(AacSync::default()),
        CodecId::Mlp | CodecId::TrueHd => FrameSync::Mlp(MlpSync::default()),
        _ => return None,
    };

    let mut state = SyncState::new(0);
    let mut pos = 0;
    let mut frames = 0;
    let mut first_frame = (0, 0, 0);

    while pos < window.len() {
        let skip = sync.scan(&mut state, &window[pos..]);
        pos += skip;

        if state.lost_sync || state.in_frame_size == 0 {
            if skip == 0 {
                break;
            }
            continue;
        }

        if frames == 0 {
            first_frame = (
                state.in_frame_size,
                state.out_frame_size,
                state.frame_samples,
            );
        }
        frames += 1;

        if window.len() - pos < state.in_frame_size {
            break;
        }
        pos += state.in_frame_size;
        state.in_frame_size = 0;
    }

    if frames == 0 {
        return None;
    }

    Some(StreamReport {
        codec,
        stream_type: state
            .stream_type
            .map_or_else(|| "unclassified".to_string(), |kind| kind.to_string()),
        sample_rate: state.sample_rate,
        frame_bytes_in: first_frame.0,
        frame_bytes_out: first_frame.1,
        samples_per_frame: first_frame.2,
        frames_seen: frames,
        bytes_scanned: window.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analyze_rejects_unknown_input() {
        let noise: Vec<u8> = (0..1024).map(|i| (i * 89 + 3) as u8).collect();
        assert!(analyze(&noise).is_none());
    }
}
