use crate::engine::CodecId;

#[derive(thiserror::Error, Debug)]
pub enum OpenError {
    #[error("no passthrough path for {0:?} with the supplied device capabilities")]
    UnsupportedFormat(CodecId),

    #[error("transcode fallback is pointless for {0} channel sources")]
    TranscodeChannelCount(usize),

    #[error("transcode fallback requires AC-3 output capability")]
    TranscodeUnavailable,

    #[error("AAC extradata does not carry a readable audio specific config")]
    InvalidExtradata,
}

#[derive(thiserror::Error, Debug)]
pub enum DecodeError {
    #[error("coded frame of {size} bytes exceeds the {capacity} byte working buffer")]
    FrameExceedsBuffer { size: usize, capacity: usize },

    #[error("failed to initialize the fallback encoder")]
    EncoderSetup(#[source] anyhow::Error),

    #[error(transparent)]
    Fallback(anyhow::Error),
}
