//! Turning command-line inputs into tracks

use std::path::Path;
use streamify_core::{Track, TrackSource};

const REQUESTER: &str = "cli";

/// Parse a source name for `--source`
pub fn parse_source(value: &str) -> Result<TrackSource, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "youtube" | "yt" => Ok(TrackSource::Youtube),
        "soundcloud" | "sc" => Ok(TrackSource::Soundcloud),
        "twitch" => Ok(TrackSource::Twitch),
        "bandcamp" => Ok(TrackSource::Bandcamp),
        "http" | "url" => Ok(TrackSource::Http),
        "local" | "file" => Ok(TrackSource::Local),
        other => Err(format!(
            "unknown source '{other}' (expected youtube, soundcloud, twitch, bandcamp, http or local)"
        )),
    }
}

/// Build a track from a path, url or bare id
///
/// An existing file is played locally. Urls are matched to a source by host
/// unless `source` overrides it. Anything else is taken as an id for
/// `source`, YouTube by default.
pub fn parse_track(input: &str, source: Option<TrackSource>) -> Track {
    let input = input.trim();

    let track = if source == Some(TrackSource::Local)
        || (source.is_none() && Path::new(input).is_file())
    {
        local_track(input)
    } else if let Some(rest) = input
        .strip_prefix("https://")
        .or_else(|| input.strip_prefix("http://"))
    {
        url_track(input, rest, source)
    } else {
        Track::new(input, input, source.unwrap_or_default())
    };

    track.with_requester(REQUESTER)
}

fn local_track(input: &str) -> Track {
    let path = Path::new(input);
    let title = path
        .file_stem()
        .map_or_else(|| input.to_string(), |stem| stem.to_string_lossy().into_owned());
    Track::new(input, title, TrackSource::Local).with_local_path(path)
}

fn url_track(url: &str, rest: &str, source: Option<TrackSource>) -> Track {
    let (host, path) = rest.split_once('/').unwrap_or((rest, ""));
    let host = host.to_ascii_lowercase();
    let host = host
        .strip_prefix("www.")
        .or_else(|| host.strip_prefix("m."))
        .unwrap_or(&host);

    let source = source.unwrap_or(match host {
        "youtube.com" | "music.youtube.com" | "youtu.be" => TrackSource::Youtube,
        "soundcloud.com" => TrackSource::Soundcloud,
        "twitch.tv" => TrackSource::Twitch,
        h if h.ends_with("bandcamp.com") => TrackSource::Bandcamp,
        _ => TrackSource::Http,
    });

    if source == TrackSource::Youtube {
        if let Some(id) = youtube_id(host, path) {
            return Track::new(id, url, source).with_uri(url);
        }
    }

    let id = path
        .split('?')
        .next()
        .unwrap_or_default()
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty())
        .unwrap_or(url);

    let track = Track::new(id, url, source).with_uri(url);
    if source == TrackSource::Twitch {
        track.live()
    } else {
        track
    }
}

fn youtube_id(host: &str, path: &str) -> Option<String> {
    let id = if host == "youtu.be" {
        path.split(['?', '/']).next()
    } else {
        path.split_once('?')
            .map(|(_, query)| query)?
            .split('&')
            .find_map(|pair| pair.strip_prefix("v="))
    };
    id.filter(|id| !id.is_empty()).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_id_defaults_to_youtube() {
        let track = parse_track("dQw4w9WgXcQ", None);
        assert_eq!(track.id, "dQw4w9WgXcQ");
        assert_eq!(track.source, TrackSource::Youtube);
        assert_eq!(track.requested_by.as_deref(), Some("cli"));
    }

    #[test]
    fn youtube_urls_yield_ids() {
        let watch = parse_track("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=10", None);
        assert_eq!(watch.id, "dQw4w9WgXcQ");
        assert_eq!(watch.source, TrackSource::Youtube);

        let short = parse_track("https://youtu.be/dQw4w9WgXcQ?si=abc", None);
        assert_eq!(short.id, "dQw4w9WgXcQ");
    }

    #[test]
    fn hosts_pick_sources() {
        let sc = parse_track("https://soundcloud.com/artist/song", None);
        assert_eq!(sc.source, TrackSource::Soundcloud);
        assert_eq!(sc.id, "song");
        assert_eq!(sc.uri.as_deref(), Some("https://soundcloud.com/artist/song"));

        let twitch = parse_track("https://www.twitch.tv/somechannel", None);
        assert_eq!(twitch.source, TrackSource::Twitch);
        assert!(twitch.is_indeterminate());

        let bc = parse_track("https://artist.bandcamp.com/track/tune", None);
        assert_eq!(bc.source, TrackSource::Bandcamp);

        let http = parse_track("http://radio.example.com/stream.mp3", None);
        assert_eq!(http.source, TrackSource::Http);
        assert_eq!(http.id, "stream.mp3");
    }

    #[test]
    fn existing_file_is_local() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let path = file.path().to_string_lossy().into_owned();

        let track = parse_track(&path, None);
        assert_eq!(track.source, TrackSource::Local);
        assert!(track.is_local());
        assert_eq!(track.local_path.as_deref(), Some(file.path()));
    }

    #[test]
    fn source_override_wins() {
        let track = parse_track("https://example.com/a.mp3", Some(TrackSource::Soundcloud));
        assert_eq!(track.source, TrackSource::Soundcloud);
    }

    #[test]
    fn source_names() {
        assert_eq!(parse_source("YT"), Ok(TrackSource::Youtube));
        assert_eq!(parse_source("file"), Ok(TrackSource::Local));
        assert!(parse_source("spotify").is_err());
    }
}
