//! Customer profiles.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{CustomerId, Email, SubjectId};

/// Delivery address fields, stored flat on customer documents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostalAddress {
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub district: String,
    #[serde(default)]
    pub province: String,
    #[serde(default)]
    pub postal_code: String,
}

impl PostalAddress {
    /// Single-line form used on booking records, e.g.
    /// `99/1 Sukhumvit Rd, Khlong Toei, Bangkok, 10110`.
    #[must_use]
    pub fn one_line(&self) -> String {
        [&self.address, &self.district, &self.province, &self.postal_code]
            .iter()
            .map(|part| part.trim())
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// A customer profile, one per identity subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: CustomerId,
    /// The identity-provider subject this profile belongs to.
    pub user_id: SubjectId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<Email>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    #[serde(flatten)]
    pub address: PostalAddress,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Profile seeded from an identity subject on first sign-in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewCustomer {
    pub name: String,
    pub phone: String,
    pub email: Option<Email>,
    pub photo_url: Option<String>,
}

impl Customer {
    /// Build a fresh profile document.
    #[must_use]
    pub fn create(id: CustomerId, user_id: SubjectId, new: NewCustomer, now: DateTime<Utc>) -> Self {
        Self {
            id,
            user_id,
            name: new.name,
            phone: new.phone,
            email: new.email,
            line_id: None,
            photo_url: new.photo_url,
            address: PostalAddress::default(),
            created_at: now,
            updated_at: None,
        }
    }
}

/// Editable profile fields from the account page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub name: String,
    pub phone: String,
    pub email: Option<Email>,
    pub line_id: Option<String>,
    #[serde(flatten)]
    pub address: PostalAddress,
}

impl ProfileUpdate {
    /// Names of required fields left blank.
    #[must_use]
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.name.trim().is_empty() {
            missing.push("name");
        }
        if self.phone.trim().is_empty() {
            missing.push("phone");
        }
        missing
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sample() -> Customer {
        let mut customer = Customer::create(
            CustomerId::new("c1"),
            SubjectId::new("uid-1"),
            NewCustomer {
                name: "Malee".to_owned(),
                email: Some(Email::parse("malee@example.com").unwrap()),
                ..NewCustomer::default()
            },
            DateTime::from_timestamp_millis(1_700_000_000_000).unwrap(),
        );
        customer.address = PostalAddress {
            address: "99/1 Sukhumvit Rd".to_owned(),
            district: "Khlong Toei".to_owned(),
            province: "Bangkok".to_owned(),
            postal_code: "10110".to_owned(),
        };
        customer
    }

    #[test]
    fn address_is_stored_flat() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["userId"], "uid-1");
        assert_eq!(json["postalCode"], "10110");
        assert_eq!(json["createdAt"], 1_700_000_000_000_i64);
        assert!(json.get("address").unwrap().is_string());
        let back: Customer = serde_json::from_value(json).unwrap();
        assert_eq!(back, sample());
    }

    #[test]
    fn one_line_skips_blank_parts() {
        assert_eq!(
            sample().address.one_line(),
            "99/1 Sukhumvit Rd, Khlong Toei, Bangkok, 10110"
        );
        let partial = PostalAddress {
            province: "Chiang Mai".to_owned(),
            ..PostalAddress::default()
        };
        assert_eq!(partial.one_line(), "Chiang Mai");
    }

    #[test]
    fn profile_requires_name_and_phone() {
        let update = ProfileUpdate {
            name: "Malee".to_owned(),
            ..ProfileUpdate::default()
        };
        assert_eq!(update.missing_fields(), ["phone"]);
    }
}
