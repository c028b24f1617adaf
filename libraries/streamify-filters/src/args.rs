//! Transcoder argument vector

use crate::output::OutputConfig;
use crate::stages::build_stages;
use std::path::PathBuf;
use streamify_core::FilterConfig;

/// Where the transcoder reads its input from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscoderInput {
    /// Standard input, fed by the extractor
    Pipe,
    /// A local file, optionally starting at an offset
    File { path: PathBuf, seek_ms: u64 },
}

/// The `-af` value for `filters`, if any stage is active
pub fn filter_chain(filters: &FilterConfig) -> Option<String> {
    let stages = build_stages(filters);
    (!stages.is_empty()).then(|| stages.join(","))
}

/// Build the full transcoder argument vector
///
/// ```text
/// [-ss <secs>] -i <input> -vn [-af <chain>] -acodec <codec> -b:a <bitrate> -f <container> -
/// ```
///
/// The offset is only applied for file input. Piped input is already trimmed
/// at the source, so seeking here would skip the same span twice.
pub fn build_transcoder_args(
    filters: &FilterConfig,
    output: &OutputConfig,
    input: &TranscoderInput,
) -> Vec<String> {
    let mut args: Vec<String> = Vec::with_capacity(16);

    match input {
        TranscoderInput::Pipe => {
            args.extend(["-i".to_string(), "pipe:0".to_string()]);
        }
        TranscoderInput::File { path, seek_ms } => {
            if *seek_ms > 0 {
                args.extend(["-ss".to_string(), format!("{:.3}", *seek_ms as f64 / 1000.0)]);
            }
            args.extend(["-i".to_string(), path.to_string_lossy().into_owned()]);
        }
    }
    args.push("-vn".to_string());

    if let Some(chain) = filter_chain(filters) {
        args.extend(["-af".to_string(), chain]);
    }

    args.extend([
        "-acodec".to_string(),
        output.format.codec().to_string(),
        "-b:a".to_string(),
        output.bitrate.clone(),
        "-f".to_string(),
        output.format.container().to_string(),
        "-".to_string(),
    ]);

    args
}
