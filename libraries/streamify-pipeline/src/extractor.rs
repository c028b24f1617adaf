//! Extractor invocation
//!
//! Builds the argument vector for a yt-dlp compatible extractor that writes
//! the raw audio stream to stdout.

use crate::config::ExtractorSettings;
use streamify_core::{Track, TrackSource};

const YOUTUBE_FORMAT: &str = "18/22/bestaudio[ext=webm]/bestaudio/best";
const GENERIC_FORMAT: &str = "bestaudio/best";
const LIVE_FORMAT: &str = "bestaudio*/best";

/// The url the extractor should fetch for `track`
///
/// `id` is the playable id, which for Spotify tracks is the resolved
/// YouTube id.
pub fn source_url(track: &Track, id: &str) -> String {
    match track.source {
        TrackSource::Youtube | TrackSource::Spotify => {
            format!("https://www.youtube.com/watch?v={id}")
        }
        TrackSource::Soundcloud => track
            .uri
            .clone()
            .or_else(|| track.stream_url.clone())
            .unwrap_or_else(|| format!("https://api.soundcloud.com/tracks/{id}/stream")),
        TrackSource::Twitch => track
            .uri
            .clone()
            .unwrap_or_else(|| format!("https://www.twitch.tv/{id}")),
        TrackSource::Bandcamp | TrackSource::Http | TrackSource::Local => {
            track.uri.clone().unwrap_or_else(|| id.to_string())
        }
    }
}

/// Format selector for `track`
///
/// Live streams need a selector that accepts muxed formats, since many live
/// sources have no audio-only rendition.
pub fn format_selector(track: &Track, settings: &ExtractorSettings) -> String {
    if track.is_indeterminate() {
        return LIVE_FORMAT.to_string();
    }
    if let Some(format) = &settings.format {
        return format.clone();
    }
    if track.source.is_youtube_family() {
        YOUTUBE_FORMAT.to_string()
    } else {
        GENERIC_FORMAT.to_string()
    }
}

/// Build the extractor argument vector
///
/// A non-zero `seek_ms` becomes a source-side time range. It is dropped for
/// live tracks, which cannot be seeked.
pub fn extractor_args(
    track: &Track,
    id: &str,
    seek_ms: u64,
    settings: &ExtractorSettings,
) -> Vec<String> {
    let live = track.is_indeterminate();
    let youtube = track.source.is_youtube_family();

    let mut args = Vec::with_capacity(24);

    if let Some(cookies) = &settings.cookies_path {
        args.push("--cookies".to_string());
        args.push(cookies.to_string_lossy().into_owned());
    }

    args.extend([
        "-f".to_string(),
        format_selector(track, settings),
        "--no-playlist".to_string(),
        "--no-check-certificates".to_string(),
        "--no-warnings".to_string(),
        "--retries".to_string(),
        settings.retries.to_string(),
        "--fragment-retries".to_string(),
        settings.fragment_retries.to_string(),
        "-o".to_string(),
        "-".to_string(),
        source_url(track, id),
    ]);

    if live {
        args.push("--no-live-from-start".to_string());
    } else if youtube {
        args.push("--extractor-args".to_string());
        args.push("youtube:player_client=web_creator".to_string());
    }

    if seek_ms > 0 && !live {
        args.push("--download-sections".to_string());
        args.push(format!("*{}-", seek_ms / 1000));
    }

    if youtube && !live && settings.sponsorblock.enabled && !settings.sponsorblock.categories.is_empty()
    {
        args.push("--sponsorblock-remove".to_string());
        args.push(settings.sponsorblock.categories.join(","));
    }

    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;

    fn youtube() -> Track {
        Track::new("abc123", "Song", TrackSource::Youtube).with_duration(Duration::from_secs(180))
    }

    fn has_pair(args: &[String], flag: &str, value: &str) -> bool {
        args.windows(2).any(|w| w[0] == flag && w[1] == value)
    }

    #[test]
    fn youtube_track_uses_watch_url_and_client_args() {
        let args = extractor_args(&youtube(), "abc123", 0, &ExtractorSettings::default());

        assert!(args.contains(&"https://www.youtube.com/watch?v=abc123".to_string()));
        assert!(has_pair(&args, "-f", YOUTUBE_FORMAT));
        assert!(has_pair(&args, "--extractor-args", "youtube:player_client=web_creator"));
        assert!(has_pair(&args, "--sponsorblock-remove", "sponsor,selfpromo"));
        assert!(has_pair(&args, "-o", "-"));
        assert!(!args.contains(&"--download-sections".to_string()));
    }

    #[test]
    fn seek_becomes_download_section_in_whole_seconds() {
        let args = extractor_args(&youtube(), "abc123", 95_750, &ExtractorSettings::default());
        assert!(has_pair(&args, "--download-sections", "*95-"));
    }

    #[test]
    fn live_track_omits_seek_and_uses_live_selector() {
        let track = Track::new("chan", "Live", TrackSource::Twitch)
            .with_uri("https://www.twitch.tv/chan")
            .live();
        let args = extractor_args(&track, "chan", 60_000, &ExtractorSettings::default());

        assert!(has_pair(&args, "-f", LIVE_FORMAT));
        assert!(args.contains(&"--no-live-from-start".to_string()));
        assert!(!args.contains(&"--download-sections".to_string()));
        assert!(!args.contains(&"--sponsorblock-remove".to_string()));
    }

    #[test]
    fn cookies_come_first() {
        let settings = ExtractorSettings {
            cookies_path: Some(PathBuf::from("/etc/cookies.txt")),
            ..Default::default()
        };
        let args = extractor_args(&youtube(), "abc123", 0, &settings);
        assert_eq!(&args[..2], ["--cookies", "/etc/cookies.txt"]);
    }

    #[test]
    fn sponsorblock_can_be_disabled() {
        let mut settings = ExtractorSettings::default();
        settings.sponsorblock.enabled = false;
        let args = extractor_args(&youtube(), "abc123", 0, &settings);
        assert!(!args.contains(&"--sponsorblock-remove".to_string()));
    }

    #[test]
    fn soundcloud_prefers_uri_then_api_stream() {
        let track = Track::new("42", "Loop", TrackSource::Soundcloud);
        assert_eq!(
            source_url(&track, "42"),
            "https://api.soundcloud.com/tracks/42/stream"
        );

        let track = track.with_uri("https://soundcloud.com/artist/loop");
        assert_eq!(source_url(&track, "42"), "https://soundcloud.com/artist/loop");

        let args = extractor_args(
            &track.with_duration(Duration::from_secs(60)),
            "42",
            0,
            &ExtractorSettings::default(),
        );
        assert!(has_pair(&args, "-f", GENERIC_FORMAT));
    }

    #[test]
    fn resolved_spotify_track_extracts_from_youtube() {
        let track =
            Track::new("sp", "Song", TrackSource::Spotify).with_duration(Duration::from_secs(200));
        track.set_resolved_id("yt42");
        let id = track.playable_id().unwrap();
        assert_eq!(source_url(&track, id), "https://www.youtube.com/watch?v=yt42");
    }
}
