use serde::{Deserialize, Serialize};
use spotwatch_common::{SpotRecord, SpotSource};

use crate::module::spot::SpotChange;
use crate::module::stats::ActivatorStats;

const EMBED_COLOR: u32 = 2326507;
const QRT_COLOR: u32 = 9807270;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub inline: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thumbnail {
    pub url: String,
}

/// A Discord embed ("card").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embed {
    pub title: String,
    pub description: String,
    pub color: u32,
    pub fields: Vec<EmbedField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<Thumbnail>,
}

fn field(name: &str, value: impl Into<String>) -> EmbedField {
    EmbedField {
        name: name.to_string(),
        value: value.into(),
        inline: false,
    }
}

fn count(value: Option<u64>) -> String {
    value.map_or_else(|| "?".to_string(), |v| v.to_string())
}

fn activator_line(stats: &ActivatorStats) -> String {
    format!(
        "_{}_   ( **{}** actx / **{}** qs )",
        stats.name,
        count(stats.activations),
        count(stats.qsos)
    )
}

/// Message text sent alongside the card, with an optional role ping.
pub fn spot_content(ping_role_id: Option<u64>) -> String {
    match ping_role_id {
        Some(role) => format!("<@&{}> POTA SPOT", role),
        None => "POTA SPOT".to_string(),
    }
}

/// Render the card for one spot notification.
pub fn spot_embed(spot: &SpotRecord, change: SpotChange, stats: &ActivatorStats) -> Embed {
    let base = spot.base_identifier();
    let timestamp = spot.timestamp.format("%Y-%m-%d %H:%M");
    let profile_url = format!("https://pota.app/#/profile/{}", base);
    let qrz_url = format!("https://www.qrz.com/db/{}", base);
    let freq = format!("{} kHz", spot.raw_frequency);

    let (mut title, description, fields) = match spot.source {
        SpotSource::Primary => {
            let park_url = format!("https://pota.app/#/park/{}", spot.reference);
            (
                format!(
                    "{} — *{}*  —  {} ({})",
                    spot.identifier, spot.reference, freq, spot.mode
                ),
                format!(
                    "{} • [park]({}) • [profile]({}) • [qrz]({})",
                    timestamp, park_url, profile_url, qrz_url
                ),
                vec![
                    field("Activator", activator_line(stats)),
                    field("Location", format!("{}\n{}", spot.display_name, spot.location)),
                    field("Comments", spot.comment.clone()),
                ],
            )
        }
        SpotSource::Secondary => (
            format!("{} — {} ({}) via skimmer", spot.identifier, freq, spot.mode),
            format!(
                "{} • [profile]({}) • [qrz]({})",
                timestamp, profile_url, qrz_url
            ),
            vec![
                field("Activator", activator_line(stats)),
                field("Signal", format!("{} @ {}", spot.reference, spot.display_name)),
                field("Heard", spot.location.clone()),
            ],
        ),
    };

    if change == SpotChange::Ended {
        title = format!("QRT · {}", title);
    }

    Embed {
        title,
        description,
        color: if change == SpotChange::Ended { QRT_COLOR } else { EMBED_COLOR },
        fields,
        thumbnail: stats.gravatar.as_ref().map(|id| Thumbnail {
            url: format!("https://gravatar.com/avatar/{}?d=identicon", id),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn pota_spot() -> SpotRecord {
        SpotRecord {
            identifier: "W4/N7OOS".to_string(),
            frequency_mhz: Some(14.285),
            raw_frequency: "14285".to_string(),
            mode: "SSB".to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 14, 50, 0).unwrap(),
            location: "US-FL".to_string(),
            reference: "US-11254".to_string(),
            display_name: "Test State Park".to_string(),
            comment: "cq pota".to_string(),
            source: SpotSource::Primary,
        }
    }

    fn stats() -> ActivatorStats {
        ActivatorStats {
            name: "Jim Vaughn".to_string(),
            activations: Some(120),
            qsos: Some(4321),
            gravatar: Some("f956ca".to_string()),
        }
    }

    #[test]
    fn test_primary_card() {
        let embed = spot_embed(&pota_spot(), SpotChange::New, &stats());
        assert_eq!(embed.title, "W4/N7OOS — *US-11254*  —  14285 kHz (SSB)");
        assert_eq!(
            embed.description,
            "2024-01-01 14:50 • [park](https://pota.app/#/park/US-11254) • \
             [profile](https://pota.app/#/profile/N7OOS) • [qrz](https://www.qrz.com/db/N7OOS)"
        );
        assert_eq!(embed.fields[0].value, "_Jim Vaughn_   ( **120** actx / **4321** qs )");
        assert_eq!(embed.fields[1].value, "Test State Park\nUS-FL");
        assert_eq!(embed.fields[2].value, "cq pota");
        assert_eq!(
            embed.thumbnail.unwrap().url,
            "https://gravatar.com/avatar/f956ca?d=identicon"
        );
        assert_eq!(embed.color, EMBED_COLOR);
    }

    #[test]
    fn test_qrt_card_with_unknown_stats() {
        let embed = spot_embed(&pota_spot(), SpotChange::Ended, &ActivatorStats::unknown());
        assert!(embed.title.starts_with("QRT · W4/N7OOS"));
        assert_eq!(embed.fields[0].value, "_Unknown_   ( **?** actx / **?** qs )");
        assert!(embed.thumbnail.is_none());
        assert_eq!(embed.color, QRT_COLOR);
    }

    #[test]
    fn test_secondary_card() {
        let mut spot = pota_spot();
        spot.source = SpotSource::Secondary;
        spot.mode = "CW".to_string();
        spot.reference = "12 dB".to_string();
        spot.display_name = "22 WPM".to_string();
        spot.location = "de W3LPL-#".to_string();

        let embed = spot_embed(&spot, SpotChange::New, &stats());
        assert_eq!(embed.title, "W4/N7OOS — 14285 kHz (CW) via skimmer");
        assert!(!embed.description.contains("park"));
        assert_eq!(embed.fields[1].value, "12 dB @ 22 WPM");
        assert_eq!(embed.fields[2].value, "de W3LPL-#");
    }

    #[test]
    fn test_spot_content() {
        assert_eq!(spot_content(Some(42)), "<@&42> POTA SPOT");
        assert_eq!(spot_content(None), "POTA SPOT");
    }
}
