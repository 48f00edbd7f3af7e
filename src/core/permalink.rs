//! Pulls the deployment permalink out of captured provisioning output.

use crate::error::{Error, Result};
use crate::output::ExternalUrl;
use crate::utils::parser;

/// Marker the provisioning tool prints before the update URL.
pub const PERMALINK_LABEL: &str = "Permalink";

/// Return the value of the first `Permalink:` line in `output`.
///
/// The marker is matched case-insensitively and the value is trimmed. A
/// marker with nothing after it counts as absent.
pub fn extract(output: &str) -> Result<String> {
    parser::labeled_value(output, PERMALINK_LABEL).ok_or_else(|| {
        Error::permalink_not_found(PERMALINK_LABEL, parser::count_lines(output))
    })
}

/// Wrap an extracted permalink as a labelled link for the result.
pub fn external_url(output: &str) -> Result<ExternalUrl> {
    let url = extract(output)?;
    tracing::debug!(%url, "permalink found");
    Ok(ExternalUrl::new(PERMALINK_LABEL, url))
}
