//! HLS master playlist parsing

use crate::error::{Error, Result};
use crate::types::{AudioCodec, QualityLevel, Resolution, VideoCodec};
use m3u8_rs::MasterPlaylist;
use tracing::debug;

/// Check whether the content is a master (multi-variant) playlist
pub fn is_master_playlist(content: &str) -> bool {
    content.contains("#EXT-X-STREAM-INF")
}

/// Parse the quality levels of a master playlist, lowest bandwidth first.
///
/// I-frame only variants are skipped.
pub fn parse_quality_levels(content: &str) -> Result<Vec<QualityLevel>> {
    if !is_master_playlist(content) {
        return Err(Error::ManifestParse("not an HLS master playlist".into()));
    }

    let master = m3u8_rs::parse_master_playlist_res(content.as_bytes())
        .map_err(|e| Error::ManifestParse(format!("Failed to parse HLS master: {:?}", e)))?;

    let levels = extract_levels(&master);
    debug!(levels = levels.len(), "Parsed HLS master playlist");
    Ok(levels)
}

fn extract_levels(master: &MasterPlaylist) -> Vec<QualityLevel> {
    let mut levels: Vec<QualityLevel> = master
        .variants
        .iter()
        .filter(|variant| !variant.is_i_frame)
        .map(|variant| QualityLevel {
            bandwidth: variant.bandwidth,
            resolution: variant
                .resolution
                .map(|r| Resolution::new(r.width as u32, r.height as u32)),
            video_codec: variant.codecs.as_deref().and_then(VideoCodec::from_codecs),
            audio_codec: variant.codecs.as_deref().and_then(AudioCodec::from_codecs),
            frame_rate: variant.frame_rate,
            uri: variant.uri.clone(),
        })
        .collect();

    // Sort by bandwidth
    levels.sort_by_key(|l| l.bandwidth);
    levels
}

#[cfg(test)]
mod tests {
    use super::*;

    const MASTER: &str = "#EXTM3U
#EXT-X-VERSION:6
#EXT-X-STREAM-INF:BANDWIDTH=5000000,RESOLUTION=1920x1080,CODECS=\"avc1.640028,mp4a.40.2\",FRAME-RATE=24.000
1080p.m3u8
#EXT-X-STREAM-INF:BANDWIDTH=800000,RESOLUTION=640x360,CODECS=\"avc1.4d401e,mp4a.40.2\"
360p.m3u8
#EXT-X-I-FRAME-STREAM-INF:BANDWIDTH=90000,URI=\"iframe.m3u8\"
";

    #[test]
    fn test_parse_quality_levels() {
        let levels = parse_quality_levels(MASTER).unwrap();
        assert_eq!(levels.len(), 2);

        assert_eq!(levels[0].bandwidth, 800_000);
        assert_eq!(levels[0].uri, "360p.m3u8");
        assert_eq!(levels[0].resolution, Some(Resolution::new(640, 360)));

        assert_eq!(levels[1].video_codec, Some(VideoCodec::H264));
        assert_eq!(levels[1].audio_codec, Some(AudioCodec::Aac));
        assert_eq!(levels[1].frame_rate, Some(24.0));
        assert_eq!(levels[1].display_name(), "1080p (5000 kbps)");
    }

    #[test]
    fn test_media_playlist_rejected() {
        let media = "#EXTM3U\n#EXT-X-TARGETDURATION:6\n#EXTINF:6.0,\nseg0.ts\n#EXT-X-ENDLIST\n";
        assert!(!is_master_playlist(media));
        assert!(matches!(
            parse_quality_levels(media),
            Err(Error::ManifestParse(_))
        ));
    }
}
