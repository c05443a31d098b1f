//! PEM framing for certificate and key material.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::core::constants::PEM_LINE_WIDTH;

/// Block label written in the `BEGIN`/`END` markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PemLabel {
    Certificate,
    PrivateKey,
}

impl PemLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            PemLabel::Certificate => "CERTIFICATE",
            PemLabel::PrivateKey => "PRIVATE KEY",
        }
    }
}

/// Encode raw bytes as a PEM block with 64-column base64 lines.
pub fn format_pem(bytes: &[u8], label: PemLabel) -> String {
    let encoded = STANDARD.encode(bytes);
    let mut out = format!("-----BEGIN {}-----\n", label.as_str());

    // base64 output is ASCII, so byte chunks are valid str boundaries
    for line in encoded.as_bytes().chunks(PEM_LINE_WIDTH) {
        out.push_str(&String::from_utf8_lossy(line));
        out.push('\n');
    }

    out.push_str(&format!("-----END {}-----\n", label.as_str()));
    out
}

/// Whether `bytes` is PEM-armored text.
pub fn is_armored(bytes: &[u8]) -> bool {
    std::str::from_utf8(bytes)
        .map(|text| text.trim_start().starts_with("-----BEGIN "))
        .unwrap_or(false)
}

/// Decode the body of the first PEM block in `bytes`.
///
/// Returns `None` when the input is not armored or the body is not base64.
pub fn decode_armored(bytes: &[u8]) -> Option<Vec<u8>> {
    let text = std::str::from_utf8(bytes).ok()?;
    let mut lines = text.lines().map(str::trim).skip_while(|l| l.is_empty());

    if !lines.next()?.starts_with("-----BEGIN ") {
        return None;
    }

    let mut body = String::new();
    for line in lines {
        if line.starts_with("-----END ") {
            return STANDARD.decode(body).ok();
        }
        // Skip RFC 1421 headers such as Proc-Type
        if line.contains(':') {
            continue;
        }
        body.push_str(line);
    }

    None
}
