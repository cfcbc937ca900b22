//! Parser for the play-URL payload carried by every listing.
//!
//! Format: sources separated by `$$$`, episodes within a source by `#`, and
//! each episode is `title$url` or a bare `url`. Only `.m3u8` URLs are playable.

use serde::{Deserialize, Serialize};

const SOURCE_SEPARATOR: &str = "$$$";
const EPISODE_SEPARATOR: char = '#';
const TITLE_SEPARATOR: char = '$';
const PLAYABLE_MARKER: &str = ".m3u8";
const IMPLIED_TITLE: &str = "正片";
const PRIMARY_SOURCE_NAME: &str = "默认源";
const BACKUP_SOURCE_PREFIX: &str = "备用源 ";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayEpisode {
    pub title: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaySource {
    pub name: String,
    pub episodes: Vec<PlayEpisode>,
}

fn parse_episode(segment: &str) -> Option<PlayEpisode> {
    let mut parts = segment.split(TITLE_SEPARATOR);
    let first = parts.next()?;
    let (title, url) = match parts.next() {
        Some(url) => (first, url),
        None => (IMPLIED_TITLE, first),
    };

    if !url.contains(PLAYABLE_MARKER) {
        return None;
    }
    Some(PlayEpisode {
        title: title.to_string(),
        url: url.to_string(),
    })
}

fn source_name(index: usize) -> String {
    if index == 0 {
        return PRIMARY_SOURCE_NAME.to_string();
    }
    // Past 'Z' this keeps counting code points.
    let letter = char::from_u32('A' as u32 + index as u32).unwrap_or('?');
    format!("{}{}", BACKUP_SOURCE_PREFIX, letter)
}

/// Parse a play-URL payload into named sources with playable episodes.
///
/// Sources without any playable episode are skipped and do not consume a name.
pub fn parse_play_url(payload: &str) -> Vec<PlaySource> {
    let mut sources: Vec<PlaySource> = Vec::new();

    for segment in payload.split(SOURCE_SEPARATOR) {
        if segment.is_empty() {
            continue;
        }

        let episodes: Vec<PlayEpisode> = segment
            .split(EPISODE_SEPARATOR)
            .filter(|ep| !ep.is_empty())
            .filter_map(parse_episode)
            .collect();

        if episodes.is_empty() {
            continue;
        }

        sources.push(PlaySource {
            name: source_name(sources.len()),
            episodes,
        });
    }

    sources
}

/// True if the payload has at least one playable episode.
pub fn has_playable_episode(payload: &str) -> bool {
    payload
        .split(SOURCE_SEPARATOR)
        .flat_map(|segment| segment.split(EPISODE_SEPARATOR))
        .filter(|ep| !ep.is_empty())
        .any(|ep| parse_episode(ep).is_some())
}
