use std::path::PathBuf;

use clap::{Args, Parser as ClapParser, Subcommand, ValueEnum};
use iecburst::engine::{CodecId, DtsLevel};

#[derive(Debug, ClapParser)]
#[command(
    name       = env!("CARGO_PKG_NAME"),
    version    = env!("CARGO_PKG_VERSION"),
    long_version = concat!(
        env!("CARGO_PKG_VERSION"),
        " (engine ", env!("IECBURST_VERSION"),
        ", built ", env!("BUILD_TIMESTAMP"), ")",
    ),
    author     = env!("CARGO_PKG_AUTHORS"),
    about      = "Tools for wrapping compressed audio bitstreams into IEC 61937 bursts",
    long_about = None,
)]
pub struct Cli {
    /// Set the log level
    #[arg(long, global = true, value_enum, default_value_t = LogLevel::Info)]
    pub loglevel: LogLevel,

    /// Log output format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Plain)]
    pub log_format: LogFormat,

    /// Show progress bars during operations.
    #[arg(long, global = true)]
    pub progress: bool,

    /// Choose an operation to perform.
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Wrap an elementary stream into an IEC 61937 burst stream.
    Wrap(WrapArgs),

    /// Print stream information
    Info(InfoArgs),
}

#[derive(Debug, Args)]
pub struct WrapArgs {
    /// Input elementary stream (use "-" for stdin).
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Output path for the burst stream; defaults to INPUT with ".spdif".
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Source codec; probed from the stream when omitted.
    #[arg(long, value_enum)]
    pub codec: Option<CodecArg>,

    /// Container for the burst stream.
    #[arg(long, value_enum, default_value_t = OutputFormat::Raw)]
    pub format: OutputFormat,

    /// YAML device capability profile.
    #[arg(long, value_name = "PATH")]
    pub caps: Option<PathBuf>,

    /// Highest DTS level the device decodes.
    #[arg(long, value_enum)]
    pub dts_level: Option<DtsLevelArg>,

    /// Fail a DTS request above the device ceiling instead of degrading it
    /// to the highest supported core level.
    #[arg(long)]
    pub no_dts_core_fallback: bool,

    /// Source channel count hint.
    #[arg(long, default_value_t = 2)]
    pub channels: usize,

    /// Source sample rate hint.
    #[arg(long, default_value_t = 48000)]
    pub sample_rate: u32,
}

#[derive(Debug, Args)]
pub struct InfoArgs {
    /// Input elementary stream.
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Report format.
    #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
    pub report: ReportFormat,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogLevel {
    /// Disable logging output.
    Off,
    /// No output except errors.
    Error,
    /// Show warnings and errors.
    Warn,
    /// Show info, warnings and errors (default).
    Info,
    /// Show debug, info, warnings and errors.
    Debug,
    /// Show all log messages including trace.
    Trace,
}

impl LogLevel {
    /// Convert LogLevel to log::LevelFilter
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Off => log::LevelFilter::Off,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogFormat {
    /// Colorized human-readable text.
    Plain,
    /// Structured JSON per log record.
    Json,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq)]
pub enum OutputFormat {
    /// Bare burst stream.
    Raw,
    /// Burst stream inside a 16-bit stereo PCM WAV container.
    Wav,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CodecArg {
    Ac3,
    Eac3,
    Dts,
    Aac,
    Mp1,
    Mp2,
    Mp3,
    Truehd,
    Mlp,
}

impl From<CodecArg> for CodecId {
    fn from(arg: CodecArg) -> Self {
        match arg {
            CodecArg::Ac3 => CodecId::Ac3,
            CodecArg::Eac3 => CodecId::Eac3,
            CodecArg::Dts => CodecId::Dts,
            CodecArg::Aac => CodecId::Aac,
            CodecArg::Mp1 => CodecId::Mp1,
            CodecArg::Mp2 => CodecId::Mp2,
            CodecArg::Mp3 => CodecId::Mp3,
            CodecArg::Truehd => CodecId::TrueHd,
            CodecArg::Mlp => CodecId::Mlp,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum DtsLevelArg {
    Core,
    Es,
    #[value(name = "96-24")]
    Hd9624,
    HdHra,
    HdMa,
}

impl From<DtsLevelArg> for DtsLevel {
    fn from(arg: DtsLevelArg) -> Self {
        match arg {
            DtsLevelArg::Core => DtsLevel::Core,
            DtsLevelArg::Es => DtsLevel::Es,
            DtsLevelArg::Hd9624 => DtsLevel::Hd9624,
            DtsLevelArg::HdHra => DtsLevel::HdHra,
            DtsLevelArg::HdMa => DtsLevel::HdMa,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq)]
pub enum ReportFormat {
    /// Human-readable summary.
    Text,
    /// Machine-readable YAML report.
    Yaml,
}
