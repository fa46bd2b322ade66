//! Plex Media Server API client.
//!
//! Plex answers in JSON when asked (`Accept: application/json` header) and
//! wraps every payload in a `MediaContainer` envelope. Authentication is the
//! `X-Plex-Token` header. The server's own playlist records are the only
//! durable state this service has; there is no local database.

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::scheduler::model::{EpisodeCandidate, PersistedPlaylist, Show};
use crate::services::rate_limiter::RateLimitedClient;

/// Failure classes for catalog calls. Reads that cannot complete leave the
/// run un-applied; a rejected write is local to one playlist and the caller
/// decides whether to continue.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Connection, auth, or malformed-payload failure.
    #[error("catalog unavailable: {0}")]
    Unavailable(String),
    /// The catalog rejected a playlist write.
    #[error("catalog write failed: {0}")]
    WriteFailed(String),
}

/// The catalog operations the generation pipeline needs. The engine owns an
/// explicit handle to an implementation; there is no ambient connection
/// state.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Pull all shows (with nested episode candidates) visible in the named
    /// library sections.
    async fn fetch_library_snapshot(&self, libraries: &[String]) -> Result<Vec<Show>, CatalogError>;

    /// List playlists whose title starts with `title_prefix`.
    async fn list_playlists(&self, title_prefix: &str) -> Result<Vec<PersistedPlaylist>, CatalogError>;

    /// Ordered item keys currently held by a playlist.
    async fn playlist_items(&self, handle: &str) -> Result<Vec<String>, CatalogError>;

    /// Create a playlist holding the given items, in order.
    async fn create_playlist(&self, title: &str, item_keys: &[String]) -> Result<(), CatalogError>;

    /// Delete a playlist. Deleting an already-removed playlist succeeds.
    async fn delete_playlist(&self, handle: &str) -> Result<(), CatalogError>;
}

/// Connection summary for the status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ServerStatus {
    pub server_name: String,
    pub version: String,
    pub platform: Option<String>,
    pub libraries: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(rename = "MediaContainer")]
    media_container: T,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServerContainer {
    friendly_name: Option<String>,
    machine_identifier: Option<String>,
    version: Option<String>,
    platform: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SectionsContainer {
    #[serde(rename = "Directory", default)]
    directories: Vec<SectionDirectory>,
}

#[derive(Debug, Clone, Deserialize)]
struct SectionDirectory {
    key: String,
    title: String,
    #[serde(rename = "type")]
    section_type: String,
}

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct MetadataContainer<T> {
    #[serde(rename = "Metadata", default)]
    metadata: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ShowMetadata {
    rating_key: String,
    title: String,
    content_rating: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EpisodeMetadata {
    rating_key: String,
    title: Option<String>,
    /// Season number.
    parent_index: Option<u32>,
    /// Episode number within the season.
    index: Option<u32>,
    originally_available_at: Option<String>,
    /// Runtime in milliseconds.
    duration: Option<i64>,
    #[serde(rename = "Media", default)]
    media: Vec<MediaInfo>,
}

#[derive(Debug, Deserialize)]
struct MediaInfo {
    bitrate: Option<u64>,
    #[serde(rename = "Part", default)]
    parts: Vec<PartInfo>,
}

#[derive(Debug, Deserialize)]
struct PartInfo {
    size: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistMetadata {
    rating_key: String,
    title: String,
    leaf_count: Option<u64>,
    duration: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItemMetadata {
    rating_key: String,
}

/// Plex API client
pub struct PlexClient {
    http: RateLimitedClient,
    base_url: String,
    token: String,
    /// Server identity needed for playlist create URIs, fetched on first use.
    machine_identifier: OnceCell<String>,
}

impl PlexClient {
    pub fn new(base_url: String, token: String) -> Self {
        Self {
            http: RateLimitedClient::for_plex(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            machine_identifier: OnceCell::new(),
        }
    }

    fn auth_headers(&self) -> [(&str, &str); 2] {
        [
            ("X-Plex-Token", self.token.as_str()),
            ("Accept", "application/json"),
        ]
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, CatalogError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .http
            .get(&url, &self.auth_headers(), query)
            .await
            .map_err(|e| CatalogError::Unavailable(format!("GET {path}: {e:#}")))?;

        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(CatalogError::Unavailable(
                "authentication rejected (check PLEX_TOKEN)".to_string(),
            ));
        }
        if !response.status().is_success() {
            return Err(CatalogError::Unavailable(format!(
                "GET {path} returned {}",
                response.status()
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| CatalogError::Unavailable(format!("failed to parse {path} response: {e}")))
    }

    async fn machine_identifier(&self) -> Result<&str, CatalogError> {
        self.machine_identifier
            .get_or_try_init(|| async {
                let envelope: Envelope<ServerContainer> = self.get_json("/", &[]).await?;
                envelope
                    .media_container
                    .machine_identifier
                    .ok_or_else(|| {
                        CatalogError::Unavailable(
                            "server identity response has no machineIdentifier".to_string(),
                        )
                    })
            })
            .await
            .map(String::as_str)
    }

    async fn sections(&self) -> Result<Vec<SectionDirectory>, CatalogError> {
        let envelope: Envelope<SectionsContainer> =
            self.get_json("/library/sections", &[]).await?;
        Ok(envelope.media_container.directories)
    }

    /// Test the connection and report server identity plus library sections.
    pub async fn server_status(&self) -> Result<ServerStatus, CatalogError> {
        let envelope: Envelope<ServerContainer> = self.get_json("/", &[]).await?;
        let server = envelope.media_container;
        let libraries = self.sections().await?.into_iter().map(|s| s.title).collect();

        Ok(ServerStatus {
            server_name: server.friendly_name.unwrap_or_else(|| "unknown".to_string()),
            version: server.version.unwrap_or_else(|| "unknown".to_string()),
            platform: server.platform,
            libraries,
        })
    }
}

fn candidate_from_metadata(episode: EpisodeMetadata, library_id: &str) -> Option<EpisodeCandidate> {
    // An episode the server cannot place in a season has no schedule identity.
    let season = episode.parent_index?;
    let number = episode.index?;

    let bitrate = episode.media.iter().filter_map(|m| m.bitrate).max();
    let file_size = episode
        .media
        .iter()
        .flat_map(|m| m.parts.iter())
        .filter_map(|p| p.size)
        .max();
    let air_date = episode
        .originally_available_at
        .as_deref()
        .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok());

    Some(EpisodeCandidate {
        rating_key: episode.rating_key,
        title: episode.title.unwrap_or_default(),
        season,
        number,
        air_date,
        bitrate,
        file_size,
        duration_ms: episode.duration,
        library_id: library_id.to_string(),
    })
}

#[async_trait]
impl Catalog for PlexClient {
    async fn fetch_library_snapshot(&self, libraries: &[String]) -> Result<Vec<Show>, CatalogError> {
        let sections = self.sections().await?;
        let mut shows = Vec::new();

        for name in libraries {
            let section = sections
                .iter()
                .find(|s| &s.title == name)
                .ok_or_else(|| {
                    let available: Vec<&str> =
                        sections.iter().map(|s| s.title.as_str()).collect();
                    CatalogError::Unavailable(format!(
                        "library section '{}' not found; available: {}",
                        name,
                        available.join(", ")
                    ))
                })?;
            if section.section_type != "show" {
                return Err(CatalogError::Unavailable(format!(
                    "library section '{}' is type '{}', expected a TV library",
                    name, section.section_type
                )));
            }

            let listing: Envelope<MetadataContainer<ShowMetadata>> = self
                .get_json(&format!("/library/sections/{}/all", section.key), &[])
                .await?;

            info!(
                library = %name,
                shows = listing.media_container.metadata.len(),
                "Pulled show listing"
            );

            for entry in listing.media_container.metadata {
                let leaves: Envelope<MetadataContainer<EpisodeMetadata>> = self
                    .get_json(&format!("/library/metadata/{}/allLeaves", entry.rating_key), &[])
                    .await?;

                let candidates: Vec<EpisodeCandidate> = leaves
                    .media_container
                    .metadata
                    .into_iter()
                    .filter_map(|ep| candidate_from_metadata(ep, &section.key))
                    .collect();

                debug!(
                    show = %entry.title,
                    library = %name,
                    episodes = candidates.len(),
                    "Collected episode candidates"
                );

                shows.push(Show {
                    rating_key: entry.rating_key,
                    title: entry.title,
                    library: name.clone(),
                    content_rating: entry.content_rating,
                    candidates,
                });
            }
        }

        Ok(shows)
    }

    async fn list_playlists(&self, title_prefix: &str) -> Result<Vec<PersistedPlaylist>, CatalogError> {
        let envelope: Envelope<MetadataContainer<PlaylistMetadata>> = self
            .get_json("/playlists", &[("playlistType", "video")])
            .await?;

        let playlists: Vec<PersistedPlaylist> = envelope
            .media_container
            .metadata
            .into_iter()
            .filter(|p| p.title.starts_with(title_prefix))
            .map(|p| PersistedPlaylist {
                handle: p.rating_key,
                title: p.title,
                item_count: p.leaf_count.unwrap_or(0),
                duration_ms: p.duration.unwrap_or(0),
            })
            .collect();

        debug!(
            prefix = %title_prefix,
            count = playlists.len(),
            "Listed existing playlists"
        );
        Ok(playlists)
    }

    async fn playlist_items(&self, handle: &str) -> Result<Vec<String>, CatalogError> {
        let envelope: Envelope<MetadataContainer<ItemMetadata>> = self
            .get_json(&format!("/playlists/{handle}/items"), &[])
            .await?;
        Ok(envelope
            .media_container
            .metadata
            .into_iter()
            .map(|item| item.rating_key)
            .collect())
    }

    async fn create_playlist(&self, title: &str, item_keys: &[String]) -> Result<(), CatalogError> {
        let machine = self.machine_identifier().await.map_err(|e| match e {
            CatalogError::Unavailable(msg) | CatalogError::WriteFailed(msg) => {
                CatalogError::WriteFailed(msg)
            }
        })?;
        let uri = format!(
            "server://{}/com.plexapp.plugins.library/library/metadata/{}",
            machine,
            item_keys.join(",")
        );

        let url = format!("{}/playlists", self.base_url);
        let response = self
            .http
            .post(
                &url,
                &self.auth_headers(),
                &[
                    ("type", "video"),
                    ("smart", "0"),
                    ("title", title),
                    ("uri", uri.as_str()),
                ],
            )
            .await
            .map_err(|e| CatalogError::WriteFailed(format!("create '{title}': {e:#}")))?;

        if !response.status().is_success() {
            return Err(CatalogError::WriteFailed(format!(
                "create '{title}' returned {}",
                response.status()
            )));
        }

        info!(title = %title, items = item_keys.len(), "Created playlist");
        Ok(())
    }

    async fn delete_playlist(&self, handle: &str) -> Result<(), CatalogError> {
        let url = format!("{}/playlists/{handle}", self.base_url);
        let response = self
            .http
            .delete(&url, &self.auth_headers())
            .await
            .map_err(|e| CatalogError::WriteFailed(format!("delete playlist {handle}: {e:#}")))?;

        // Already gone is fine; delete exists to make room for a recreate.
        if !response.status().is_success() && response.status() != StatusCode::NOT_FOUND {
            return Err(CatalogError::WriteFailed(format!(
                "delete playlist {handle} returned {}",
                response.status()
            )));
        }

        debug!(handle = %handle, "Deleted playlist");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_episode_metadata() {
        let payload = r#"{
            "MediaContainer": {
                "size": 1,
                "Metadata": [{
                    "ratingKey": "4402",
                    "title": "Don't Give Up the Ship",
                    "parentIndex": 1,
                    "index": 1,
                    "originallyAvailableAt": "1987-09-18",
                    "duration": 1320000,
                    "Media": [
                        {"bitrate": 8000, "Part": [{"size": 120000000}]},
                        {"bitrate": 5000, "Part": [{"size": 90000000}]}
                    ]
                }]
            }
        }"#;
        let envelope: Envelope<MetadataContainer<EpisodeMetadata>> =
            serde_json::from_str(payload).unwrap();
        let episode = envelope.media_container.metadata.into_iter().next().unwrap();
        let candidate = candidate_from_metadata(episode, "2").unwrap();

        assert_eq!(candidate.rating_key, "4402");
        assert_eq!(candidate.season, 1);
        assert_eq!(candidate.number, 1);
        assert_eq!(candidate.bitrate, Some(8000));
        assert_eq!(candidate.file_size, Some(120_000_000));
        assert_eq!(
            candidate.air_date,
            NaiveDate::from_ymd_opt(1987, 9, 18)
        );
        assert_eq!(candidate.library_id, "2");
    }

    #[test]
    fn test_episode_without_season_is_skipped() {
        let episode = EpisodeMetadata {
            rating_key: "9".to_string(),
            title: None,
            parent_index: None,
            index: Some(3),
            originally_available_at: None,
            duration: None,
            media: vec![],
        };
        assert!(candidate_from_metadata(episode, "1").is_none());
    }

    #[test]
    fn test_parse_sections() {
        let payload = r#"{
            "MediaContainer": {
                "Directory": [
                    {"key": "1", "title": "Movies", "type": "movie"},
                    {"key": "2", "title": "TV Shows", "type": "show"}
                ]
            }
        }"#;
        let envelope: Envelope<SectionsContainer> = serde_json::from_str(payload).unwrap();
        let sections = envelope.media_container.directories;
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[1].key, "2");
        assert_eq!(sections[1].section_type, "show");
    }

    #[test]
    fn test_parse_playlists() {
        let payload = r#"{
            "MediaContainer": {
                "Metadata": [{
                    "ratingKey": "31337",
                    "title": "Saturday Morning - Year 1 Week 01",
                    "leafCount": 3,
                    "duration": 3960000,
                    "playlistType": "video"
                }]
            }
        }"#;
        let envelope: Envelope<MetadataContainer<PlaylistMetadata>> =
            serde_json::from_str(payload).unwrap();
        let playlist = &envelope.media_container.metadata[0];
        assert_eq!(playlist.rating_key, "31337");
        assert_eq!(playlist.leaf_count, Some(3));
    }
}
