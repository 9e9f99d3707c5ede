//! Wire models for the playback metadata service

use crate::types::{PlayerLicense, VideoDetails};
use serde::{Deserialize, Serialize};

/// `GET /entry/{id}` response body
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackResponse {
    pub message: Option<String>,
    pub reason: Option<String>,
    pub id: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub thumbnail: Option<String>,
    /// Sent as either a string or a number depending on the backend
    pub duration: Option<serde_json::Value>,
    pub media: Option<Media>,
    pub play_from: Option<i64>,
    pub adverts: Option<Vec<Advert>>,
    pub cover_img: Option<CoverImages>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Media {
    pub hls: Option<String>,
    pub mpegdash: Option<String>,
    pub applehttp: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Advert {
    pub ad_type: Option<String>,
    pub id: Option<String>,
    pub position: Option<String>,
    pub persistent: Option<bool>,
    pub discard_after_playback: Option<bool>,
    pub url: Option<String>,
    pub preload_offset: Option<i64>,
    pub skippable_after: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoverImages {
    #[serde(rename = "360")]
    pub res_360: Option<String>,
    #[serde(rename = "720")]
    pub res_720: Option<String>,
    #[serde(rename = "1080")]
    pub res_1080: Option<String>,
}

impl PlaybackResponse {
    /// Convert to [`VideoDetails`] for the entry that was requested
    pub fn into_video_details(self, entry_id: &str) -> VideoDetails {
        VideoDetails {
            id: entry_id.to_string(),
            url: self.media.and_then(|m| m.hls),
            title: self.name,
            thumbnail: self.cover_img.and_then(|c| c.res_360),
            description: self.description,
        }
    }
}

/// Body returned alongside non-2xx statuses
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    pub message: Option<String>,
    pub reason: Option<String>,
}

/// `GET /player` response body
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlayerInformationResponse {
    pub player: Option<PlayerInfo>,
    pub defaults: Option<Defaults>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub bitmovin: Option<EngineInfo>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineInfo {
    pub license: Option<String>,
    pub integrations: Option<Integrations>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Integrations {
    pub mux: Option<Mux>,
    pub resume: Option<Resume>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mux {
    pub player_name: Option<String>,
    pub env_key: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Resume {
    pub enabled: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Defaults {
    pub player: Option<String>,
}

impl PlayerInformationResponse {
    /// Extract the player license. `None` when the license is absent or empty.
    pub fn license(&self) -> Option<PlayerLicense> {
        let engine = self.player.as_ref()?.bitmovin.as_ref()?;
        let key = engine.license.as_deref().filter(|k| !k.is_empty())?;
        let mux = engine.integrations.as_ref().and_then(|i| i.mux.as_ref());

        Some(PlayerLicense {
            license_key: key.to_string(),
            analytics_key: mux.and_then(|m| m.env_key.clone()),
            player_name: mux.and_then(|m| m.player_name.clone()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_response_to_details() {
        let body = r#"{
            "id": "server-id",
            "name": "Cup Final",
            "description": "Extended highlights",
            "duration": 5400,
            "media": {"hls": "https://cdn.example.com/final/master.m3u8?ks=abc"},
            "coverImg": {"360": "https://img.example.com/360.jpg", "720": "https://img.example.com/720.jpg"},
            "adverts": [{"adType": "preroll", "skippableAfter": 5}],
            "somethingNew": true
        }"#;
        let response: PlaybackResponse = serde_json::from_str(body).unwrap();
        let details = response.into_video_details("0_final");

        assert_eq!(details.id, "0_final");
        assert_eq!(
            details.url.as_deref(),
            Some("https://cdn.example.com/final/master.m3u8?ks=abc")
        );
        assert_eq!(details.title.as_deref(), Some("Cup Final"));
        assert_eq!(details.thumbnail.as_deref(), Some("https://img.example.com/360.jpg"));
        assert_eq!(details.description.as_deref(), Some("Extended highlights"));
    }

    #[test]
    fn test_entry_response_without_media() {
        let response: PlaybackResponse = serde_json::from_str(r#"{"name":"Pending"}"#).unwrap();
        let details = response.into_video_details("0_pending");
        assert!(!details.is_playable());
    }

    #[test]
    fn test_player_information_license() {
        let body = r#"{
            "player": {"bitmovin": {
                "license": "lic-123",
                "integrations": {"mux": {"playerName": "amg", "envKey": "mux-env"}, "resume": {"enabled": true}}
            }},
            "defaults": {"player": "bitmovin"}
        }"#;
        let info: PlayerInformationResponse = serde_json::from_str(body).unwrap();
        let license = info.license().unwrap();
        assert_eq!(license.license_key, "lic-123");
        assert_eq!(license.analytics_key.as_deref(), Some("mux-env"));
        assert_eq!(license.player_name.as_deref(), Some("amg"));
    }

    #[test]
    fn test_player_information_empty_license() {
        let info: PlayerInformationResponse =
            serde_json::from_str(r#"{"player":{"bitmovin":{"license":""}}}"#).unwrap();
        assert!(info.license().is_none());

        let info: PlayerInformationResponse = serde_json::from_str(r#"{}"#).unwrap();
        assert!(info.license().is_none());
    }
}
