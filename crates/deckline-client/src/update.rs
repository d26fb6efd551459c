//! Update check against a published properties file.

/// Property key carrying the published version code.
pub const VERSION_PROPERTY: &str = "plugin.version";

#[derive(Debug, thiserror::Error)]
pub enum UpdateCheckError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("remote properties have no {VERSION_PROPERTY} entry")]
    MissingVersion,

    #[error("unparsable version: {0:?}")]
    BadVersion(String),
}

/// Fetch the published version from a remote properties URL and compare it
/// against the running version. Failures log a warning and report "no
/// update" rather than surfacing an error.
pub async fn is_update_available(config_url: &str, current_version: u64) -> bool {
    match fetch_published_version(config_url).await {
        Ok(published) => published > current_version,
        Err(e) => {
            tracing::warn!(url = config_url, error = %e, "Update check failed");
            false
        }
    }
}

async fn fetch_published_version(config_url: &str) -> Result<u64, UpdateCheckError> {
    let body = reqwest::get(config_url)
        .await?
        .error_for_status()?
        .text()
        .await?;
    parse_published_version(&body)
}

fn parse_published_version(properties: &str) -> Result<u64, UpdateCheckError> {
    let raw = properties
        .lines()
        .map(str::trim)
        .filter(|line| !line.starts_with('#'))
        .find_map(|line| {
            line.split_once('=')
                .filter(|(key, _)| key.trim() == VERSION_PROPERTY)
                .map(|(_, value)| value.trim())
        })
        .ok_or(UpdateCheckError::MissingVersion)?;

    raw.parse::<u64>()
        .map_err(|_| UpdateCheckError::BadVersion(raw.to_owned()))
}
