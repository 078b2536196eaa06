//! Subject distinguished name of a signing identity.

use crate::error::{Error, Result};
use const_oid::ObjectIdentifier;
use der::asn1::{Any, Ia5StringRef, PrintableStringRef, SetOfVec, Utf8StringRef};
use x509_cert::attr::AttributeTypeAndValue;
use x509_cert::name::{Name, RdnSequence, RelativeDistinguishedName};

const OID_COMMON_NAME: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.3");
const OID_COUNTRY: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.6");
const OID_LOCALITY: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.7");
const OID_STATE: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.8");
const OID_ORGANIZATION: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.10");
const OID_EMAIL: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.1");

// RFC 5280 upper bounds
const UB_COMMON_NAME: usize = 64;
const UB_ORGANIZATION: usize = 64;
const UB_STATE_OR_LOCALITY: usize = 128;
const UB_EMAIL: usize = 255;

/// Distinguished-name attributes supplied by the operator.
///
/// ```
/// use certigo::identity::SubjectDetails;
///
/// let subject = SubjectDetails::new("Alice Corp")
///     .email("a@x.com")
///     .country("us")
///     .organization("Alice Inc")
///     .validate()?;
/// assert_eq!(subject.country, "US");
/// # Ok::<(), certigo::Error>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubjectDetails {
    /// Common name (CN), required
    pub common_name: String,
    /// Email address (emailAddress)
    pub email: String,
    /// Two-letter country code (C)
    pub country: String,
    /// State or province (ST)
    pub state: String,
    /// City or locality (L)
    pub locality: String,
    /// Organization (O)
    pub organization: String,
}

impl SubjectDetails {
    /// Start a subject with its common name.
    pub fn new(common_name: impl Into<String>) -> Self {
        Self {
            common_name: common_name.into(),
            ..Self::default()
        }
    }

    /// Set the email address.
    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = email.into();
        self
    }

    /// Set the country code.
    pub fn country(mut self, country: impl Into<String>) -> Self {
        self.country = country.into();
        self
    }

    /// Set the state or province.
    pub fn state(mut self, state: impl Into<String>) -> Self {
        self.state = state.into();
        self
    }

    /// Set the city or locality.
    pub fn locality(mut self, locality: impl Into<String>) -> Self {
        self.locality = locality.into();
        self
    }

    /// Set the organization.
    pub fn organization(mut self, organization: impl Into<String>) -> Self {
        self.organization = organization.into();
        self
    }

    /// Trim every attribute, upper-case the country and check the result.
    ///
    /// The common name and a country of exactly two ASCII letters are
    /// required. The email must be ASCII.
    pub fn validate(&self) -> Result<Self> {
        let subject = Self {
            common_name: self.common_name.trim().to_string(),
            email: self.email.trim().to_string(),
            country: self.country.trim().to_ascii_uppercase(),
            state: self.state.trim().to_string(),
            locality: self.locality.trim().to_string(),
            organization: self.organization.trim().to_string(),
        };

        if subject.common_name.is_empty() {
            return Err(Error::InvalidSubject("common name is required".to_string()));
        }
        let country_ok =
            subject.country.len() == 2 && subject.country.bytes().all(|b| b.is_ascii_uppercase());
        if !country_ok {
            return Err(Error::InvalidSubject(format!(
                "country must be a two-letter code, got {:?}",
                subject.country
            )));
        }
        if !subject.email.is_ascii() {
            return Err(Error::InvalidSubject("email address must be ASCII".to_string()));
        }

        for (label, value, limit) in [
            ("common name", &subject.common_name, UB_COMMON_NAME),
            ("organization", &subject.organization, UB_ORGANIZATION),
            ("state", &subject.state, UB_STATE_OR_LOCALITY),
            ("locality", &subject.locality, UB_STATE_OR_LOCALITY),
            ("email", &subject.email, UB_EMAIL),
        ] {
            if value.chars().count() > limit {
                return Err(Error::InvalidSubject(format!(
                    "{} longer than {} characters",
                    label, limit
                )));
            }
        }

        Ok(subject)
    }

    /// Encode as an X.509 name in the order CN, emailAddress, C, ST, L, O.
    ///
    /// Empty optional attributes are left out.
    pub(crate) fn to_name(&self) -> Result<Name> {
        let mut rdns = vec![rdn(OID_COMMON_NAME, utf8(&self.common_name)?)?];
        if !self.email.is_empty() {
            let value = Ia5StringRef::new(&self.email).map_err(invalid)?;
            rdns.push(rdn(OID_EMAIL, Any::encode_from(&value).map_err(invalid)?)?);
        }
        if !self.country.is_empty() {
            let value = PrintableStringRef::new(&self.country).map_err(invalid)?;
            rdns.push(rdn(OID_COUNTRY, Any::encode_from(&value).map_err(invalid)?)?);
        }
        for (oid, value) in [
            (OID_STATE, &self.state),
            (OID_LOCALITY, &self.locality),
            (OID_ORGANIZATION, &self.organization),
        ] {
            if !value.is_empty() {
                rdns.push(rdn(oid, utf8(value)?)?);
            }
        }
        Ok(RdnSequence(rdns))
    }
}

fn invalid(err: der::Error) -> Error {
    Error::InvalidSubject(err.to_string())
}

fn utf8(value: &str) -> Result<Any> {
    let value = Utf8StringRef::new(value).map_err(invalid)?;
    Any::encode_from(&value).map_err(invalid)
}

fn rdn(oid: ObjectIdentifier, value: Any) -> Result<RelativeDistinguishedName> {
    let atv = AttributeTypeAndValue { oid, value };
    SetOfVec::try_from(vec![atv])
        .map(RelativeDistinguishedName)
        .map_err(invalid)
}
