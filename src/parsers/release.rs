use crate::json;
use crate::models::ReleaseInfo;
use crate::outcome::ApiError;

/// Parse a `releases/latest` response.
///
/// `download_url` is the first asset whose `browser_download_url` ends with
/// `extension`.
pub fn parse_release(body: &str, extension: &str) -> Result<ReleaseInfo, ApiError> {
    let assets = json::find_array(body, "assets");

    // Asset objects carry their own "name"; only look at release-level fields
    let release_fields = match assets {
        Some(assets) => body.replacen(assets, "[]", 1),
        None => body.to_string(),
    };

    let tag = json::find_string_field(&release_fields, "tag_name")
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| ApiError::Parse("no tag_name in release response".to_string()))?;
    let version = tag
        .trim()
        .strip_prefix('v')
        .or_else(|| tag.trim().strip_prefix('V'))
        .unwrap_or(tag.trim())
        .to_string();

    let download_url = assets.and_then(|assets| {
        json::split_top_level_objects(assets)
            .into_iter()
            .filter_map(|asset| json::find_string_field(asset, "browser_download_url"))
            .find(|url| url.ends_with(extension))
    });

    Ok(ReleaseInfo {
        name: json::find_string_field(&release_fields, "name").unwrap_or_else(|| tag.clone()),
        notes: json::find_string_field(&release_fields, "body").unwrap_or_default(),
        version,
        download_url,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const RELEASE: &str = r#"{
        "url": "https://api.github.com/repos/org/plugin/releases/1",
        "author": {"login": "maintainer", "id": 1},
        "tag_name": "v3.2.0",
        "assets": [
            {"name": "checksums.txt", "browser_download_url": "https://github.com/org/plugin/releases/download/v3.2.0/checksums.txt"},
            {"name": "plugin.jar", "browser_download_url": "https://github.com/org/plugin/releases/download/v3.2.0/plugin.jar"},
            {"name": "plugin-src.jar", "browser_download_url": "https://github.com/org/plugin/releases/download/v3.2.0/plugin-src.jar"}
        ],
        "name": "Validation tools 3.2.0",
        "body": "Fixes:\n- \"Submit\" button state"
    }"#;

    #[test]
    fn test_parse_release() {
        let release = parse_release(RELEASE, ".jar").unwrap();
        assert_eq!(release.version, "3.2.0");
        assert_eq!(release.name, "Validation tools 3.2.0");
        assert_eq!(release.notes, "Fixes:\n- \"Submit\" button state");
        assert_eq!(
            release.download_url.as_deref(),
            Some("https://github.com/org/plugin/releases/download/v3.2.0/plugin.jar")
        );
    }

    #[test]
    fn test_parse_release_without_matching_asset() {
        let release = parse_release(RELEASE, ".zip").unwrap();
        assert_eq!(release.download_url, None);
    }

    #[test]
    fn test_parse_release_minimal() {
        let release = parse_release(r#"{"tag_name":"2.0.1"}"#, ".jar").unwrap();
        assert_eq!(release.version, "2.0.1");
        assert_eq!(release.name, "2.0.1");
        assert_eq!(release.notes, "");
        assert_eq!(release.download_url, None);
    }

    #[test]
    fn test_parse_release_missing_tag() {
        assert!(matches!(
            parse_release(r#"{"message":"Not Found"}"#, ".jar"),
            Err(ApiError::Parse(_))
        ));
    }
}
