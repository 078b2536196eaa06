//! Read-only view of an X.509 certificate.

use crate::error::{Error, Result};
use x509_parser::prelude::*;

/// Subject, issuer and validity details of a certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateSummary {
    /// Subject common name, if present
    pub common_name: Option<String>,
    /// Subject email address attribute, if present
    pub email: Option<String>,
    /// Subject country, if present
    pub country: Option<String>,
    /// Subject state or province, if present
    pub state: Option<String>,
    /// Subject locality, if present
    pub locality: Option<String>,
    /// Subject organization, if present
    pub organization: Option<String>,
    /// Subject distinguished name in RFC 4514 form
    pub subject: String,
    /// Issuer distinguished name in RFC 4514 form
    pub issuer: String,
    /// Serial number as colon-separated hex
    pub serial: String,
    /// Start of validity, seconds since the Unix epoch
    pub not_before: i64,
    /// End of validity, seconds since the Unix epoch
    pub not_after: i64,
    /// Issuer and subject are byte-identical
    pub self_issued: bool,
}

impl CertificateSummary {
    /// Inspect a DER-encoded certificate.
    pub fn from_der(der: &[u8]) -> Result<Self> {
        let (_, cert) = parse_x509_certificate(der)
            .map_err(|e| Error::credentials("unparseable certificate", e))?;

        let subject = cert.subject();

        Ok(Self {
            common_name: first(subject.iter_common_name()),
            email: first(subject.iter_email()),
            country: first(subject.iter_country()),
            state: first(subject.iter_state_or_province()),
            locality: first(subject.iter_locality()),
            organization: first(subject.iter_organization()),
            subject: subject.to_string(),
            issuer: cert.issuer().to_string(),
            serial: cert.raw_serial_as_string(),
            not_before: cert.validity().not_before.timestamp(),
            not_after: cert.validity().not_after.timestamp(),
            self_issued: cert.issuer().as_raw() == subject.as_raw(),
        })
    }

    /// Length of the validity window in seconds.
    pub fn validity_seconds(&self) -> i64 {
        self.not_after - self.not_before
    }

    /// Whether `unix_time` falls inside the validity window.
    pub fn is_valid_at(&self, unix_time: i64) -> bool {
        self.not_before <= unix_time && unix_time <= self.not_after
    }
}

fn first<'a, 'b: 'a>(
    mut attrs: impl Iterator<Item = &'a AttributeTypeAndValue<'b>>,
) -> Option<String> {
    attrs.next().and_then(|a| a.as_str().ok()).map(str::to_string)
}

/// Format a Unix timestamp as RFC 3339 UTC.
pub(crate) fn format_timestamp(unix_time: i64) -> String {
    chrono::DateTime::from_timestamp(unix_time, 0)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_else(|| unix_time.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_garbage() {
        let err = CertificateSummary::from_der(b"not a certificate").unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Input);
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0), "1970-01-01T00:00:00Z");
        assert_eq!(format_timestamp(86_400 * 30), "1970-01-31T00:00:00Z");
    }
}
