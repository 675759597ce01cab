use std::path::Path;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub display_name: Option<String>,
    /// `data:` URL of the profile picture.
    pub photo: Option<String>,
}

fn mime_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}

/// Encode raw image bytes as a `data:` URL, guessing the type from the file name.
pub fn photo_data_url(path: &Path, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime_for(path), STANDARD.encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_url_uses_extension_mime() {
        let url = photo_data_url(Path::new("me.PNG"), b"abc");
        assert_eq!(url, "data:image/png;base64,YWJj");

        let url = photo_data_url(Path::new("avatar"), b"");
        assert_eq!(url, "data:application/octet-stream;base64,");
    }
}
