use crate::error::UpgradeError;
use crate::http::Transport;

/// Finds the newest release by following the host's "latest" redirect.
pub struct ReleaseResolver<'a, T: Transport> {
    release_url: &'a str,
    transport: &'a T,
}

impl<'a, T: Transport> ReleaseResolver<'a, T> {
    pub fn new(release_url: &'a str, transport: &'a T) -> Self {
        Self {
            release_url,
            transport,
        }
    }

    pub fn get_latest(&self) -> Result<String, UpgradeError> {
        let resolved = self.transport.resolve(self.release_url)?;
        if resolved.trim_end_matches('/') == self.release_url.trim_end_matches('/') {
            return Err(UpgradeError::parse(
                "release redirect",
                format!("{} did not redirect to a tagged release", self.release_url),
            ));
        }
        parse_release_tag(&resolved)
    }
}

/// Last path segment of `url` with leading `v`s removed.
pub fn parse_release_tag(url: &str) -> Result<String, UpgradeError> {
    let path = url
        .split(['?', '#'])
        .next()
        .unwrap_or_default();
    let segment = path.rsplit('/').next().unwrap_or_default();
    let tag = segment.trim_start_matches('v');
    if tag.is_empty() {
        return Err(UpgradeError::parse(
            "release URL",
            format!("no version tag at the end of {url}"),
        ));
    }
    Ok(tag.to_string())
}
