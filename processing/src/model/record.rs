use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Beneficiary as it arrives at the boundary: every field optional, age in
/// whatever shape the client sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawBeneficiaryRecord {
    #[serde(default, deserialize_with = "identifier")]
    pub bank_account: Option<String>,
    #[serde(default, deserialize_with = "identifier")]
    pub mobile: Option<String>,
    pub age: Option<RawAge>,
    pub scheme_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawAge {
    Integer(i64),
    Float(f64),
    Text(String),
}

/// Account and mobile numbers are often sent as JSON numbers.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawIdentifier {
    Text(String),
    Unsigned(u64),
    Integer(i64),
}

fn identifier<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<RawIdentifier>::deserialize(deserializer)?.map(|id| match id {
        RawIdentifier::Text(text) => text,
        RawIdentifier::Unsigned(n) => n.to_string(),
        RawIdentifier::Integer(n) => n.to_string(),
    }))
}

impl fmt::Display for RawAge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawAge::Integer(v) => write!(f, "{}", v),
            RawAge::Float(v) => write!(f, "{}", v),
            RawAge::Text(v) => write!(f, "{}", v),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Missing fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    #[error("Invalid age '{0}': expected a non-negative whole number")]
    InvalidAge(String),
}

/// A beneficiary that passed presence and type validation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BeneficiaryRecord {
    bank_account: String,
    mobile: String,
    age: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    scheme_id: Option<String>,
}

impl BeneficiaryRecord {
    pub fn new(
        bank_account: impl Into<String>,
        mobile: impl Into<String>,
        age: u32,
    ) -> Result<Self, ValidationError> {
        RawBeneficiaryRecord {
            bank_account: Some(bank_account.into()),
            mobile: Some(mobile.into()),
            age: Some(RawAge::Integer(i64::from(age))),
            scheme_id: None,
        }
        .validate()
    }

    pub fn with_scheme_id(mut self, scheme_id: impl Into<String>) -> Self {
        let scheme_id: String = scheme_id.into();
        self.scheme_id = non_blank(Some(scheme_id.as_str()));
        self
    }

    pub fn bank_account(&self) -> &str {
        &self.bank_account
    }

    pub fn mobile(&self) -> &str {
        &self.mobile
    }

    pub fn age(&self) -> u32 {
        self.age
    }

    pub fn scheme_id(&self) -> Option<&str> {
        self.scheme_id.as_deref()
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

impl RawBeneficiaryRecord {
    /// Checks presence of every required field, then the age domain.
    ///
    /// All missing fields are reported together so the caller can fix the
    /// input in one round trip.
    pub fn validate(&self) -> Result<BeneficiaryRecord, ValidationError> {
        let bank_account = non_blank(self.bank_account.as_deref());
        let mobile = non_blank(self.mobile.as_deref());
        let age = match &self.age {
            Some(RawAge::Text(text)) if text.trim().is_empty() => None,
            other => other.as_ref(),
        };

        let mut missing = Vec::new();
        if bank_account.is_none() {
            missing.push("bankAccount");
        }
        if mobile.is_none() {
            missing.push("mobile");
        }
        if age.is_none() {
            missing.push("age");
        }

        match (bank_account, mobile, age) {
            (Some(bank_account), Some(mobile), Some(age)) => Ok(BeneficiaryRecord {
                bank_account,
                mobile,
                age: parse_age(age)?,
                scheme_id: non_blank(self.scheme_id.as_deref()),
            }),
            _ => Err(ValidationError::MissingFields(missing)),
        }
    }
}

fn parse_age(age: &RawAge) -> Result<u32, ValidationError> {
    let invalid = || ValidationError::InvalidAge(age.to_string());
    match age {
        RawAge::Integer(v) => u32::try_from(*v).map_err(|_| invalid()),
        RawAge::Float(v) => {
            if v.is_finite() && v.fract() == 0.0 && *v >= 0.0 && *v <= f64::from(u32::MAX) {
                Ok(*v as u32)
            } else {
                Err(invalid())
            }
        }
        RawAge::Text(text) => text.trim().parse::<u32>().map_err(|_| invalid()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(bank: Option<&str>, mobile: Option<&str>, age: Option<RawAge>) -> RawBeneficiaryRecord {
        RawBeneficiaryRecord {
            bank_account: bank.map(str::to_string),
            mobile: mobile.map(str::to_string),
            age,
            scheme_id: None,
        }
    }

    #[test]
    fn complete_record_validates_and_trims() {
        let record = raw(Some(" 123456 "), Some("9876543210"), Some(RawAge::Integer(45)))
            .validate()
            .unwrap();
        assert_eq!(record.bank_account(), "123456");
        assert_eq!(record.mobile(), "9876543210");
        assert_eq!(record.age(), 45);
        assert_eq!(record.scheme_id(), None);
    }

    #[test]
    fn every_missing_field_is_reported() {
        let err = raw(None, Some("  "), None).validate().unwrap_err();
        assert_eq!(
            err,
            ValidationError::MissingFields(vec!["bankAccount", "mobile", "age"])
        );
        assert_eq!(err.to_string(), "Missing fields: bankAccount, mobile, age");
    }

    #[test]
    fn age_shapes() {
        let ok = |age| raw(Some("1"), Some("2"), Some(age)).validate().map(|r| r.age());
        assert_eq!(ok(RawAge::Integer(0)), Ok(0));
        assert_eq!(ok(RawAge::Float(101.0)), Ok(101));
        assert_eq!(ok(RawAge::Text(" 100 ".to_string())), Ok(100));
        assert!(matches!(ok(RawAge::Integer(-1)), Err(ValidationError::InvalidAge(_))));
        assert!(matches!(ok(RawAge::Float(45.5)), Err(ValidationError::InvalidAge(_))));
        assert!(matches!(ok(RawAge::Text("old".to_string())), Err(ValidationError::InvalidAge(_))));
        assert!(matches!(
            ok(RawAge::Text(String::new())),
            Err(ValidationError::MissingFields(fields)) if fields == vec!["age"]
        ));
    }

    #[test]
    fn json_body_deserializes_with_missing_fields() {
        let raw: RawBeneficiaryRecord =
            serde_json::from_str(r#"{"bankAccount":"123456","age":45}"#).unwrap();
        assert_eq!(raw.mobile, None);
        assert_eq!(raw.age, Some(RawAge::Integer(45)));
        assert_eq!(
            raw.validate().unwrap_err(),
            ValidationError::MissingFields(vec!["mobile"])
        );
    }

    #[test]
    fn numeric_identifiers_are_accepted() {
        let raw: RawBeneficiaryRecord =
            serde_json::from_str(r#"{"bankAccount":123456,"mobile":9876543210,"age":45,"schemeId":null}"#).unwrap();
        let record = raw.validate().unwrap();
        assert_eq!(record.bank_account(), "123456");
        assert_eq!(record.mobile(), "9876543210");

        let raw: RawBeneficiaryRecord = serde_json::from_str(r#"{"bankAccount":null,"mobile":"9"}"#).unwrap();
        assert_eq!(raw.bank_account, None);
        assert!(serde_json::from_str::<RawBeneficiaryRecord>(r#"{"bankAccount":true}"#).is_err());
    }
}
