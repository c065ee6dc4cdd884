//! Person record types.
//!
//! `Person` is the record kept in the primary store. Every descriptive field is optional so
//! that a partial person (as received by an upsert) can express "leave this field alone".

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A geographic point, stored as latitude/longitude.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

/// Postal address of a person.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Address {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub countrycode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zipcode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoPoint>,
}

impl Address {
    /// Overwrite every field that is set on `incoming`. Unset fields are left untouched.
    pub fn merge_from(&mut self, incoming: &Address) {
        if let Some(ref country) = incoming.country {
            self.country = Some(country.clone());
        }
        if let Some(ref countrycode) = incoming.countrycode {
            self.countrycode = Some(countrycode.clone());
        }
        if let Some(ref city) = incoming.city {
            self.city = Some(city.clone());
        }
        if let Some(ref zipcode) = incoming.zipcode {
            self.zipcode = Some(zipcode.clone());
        }
        if let Some(location) = incoming.location {
            self.location = Some(location);
        }
    }
}

/// A person as stored in the primary store.
///
/// # Fields
///
/// - `id`: Store-assigned primary key; `None` until the person has been persisted
/// - `name`: Full display name (boosted search field)
/// - `date_of_birth`: Used by the yearly histograms
/// - `gender`: Free-form gender label
/// - `children`: Number of children (averaged per decade bucket)
/// - `address`: Optional postal address
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
}

impl Person {
    /// Create a person with only a name set.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    /// The reference used as the document id in the search index.
    ///
    /// Returns `None` for a person that has not been persisted yet.
    pub fn reference(&self) -> Option<String> {
        self.id.map(|id| id.to_string())
    }

    /// Field-by-field merge of `incoming` onto `self`.
    ///
    /// Fields set on `incoming` overwrite the current value; unset fields are left untouched.
    /// The address is merged field by field as well. The id is never copied: callers decide
    /// which id the merged record keeps.
    pub fn merge_from(&mut self, incoming: &Person) {
        if let Some(ref name) = incoming.name {
            self.name = Some(name.clone());
        }
        if let Some(date_of_birth) = incoming.date_of_birth {
            self.date_of_birth = Some(date_of_birth);
        }
        if let Some(ref gender) = incoming.gender {
            self.gender = Some(gender.clone());
        }
        if let Some(children) = incoming.children {
            self.children = Some(children);
        }
        if let Some(ref address) = incoming.address {
            match self.address {
                Some(ref mut existing) => existing.merge_from(address),
                None => self.address = Some(address.clone()),
            }
        }
    }

    /// The text indexed in the default full-text field.
    ///
    /// Joins name, gender, country and city with single spaces, skipping unset values.
    pub fn fulltext(&self) -> String {
        let address = self.address.as_ref();
        [
            self.name.as_deref(),
            self.gender.as_deref(),
            address.and_then(|a| a.country.as_deref()),
            address.and_then(|a| a.city.as_deref()),
        ]
        .into_iter()
        .flatten()
        .filter(|s| !s.trim().is_empty())
        .collect::<Vec<_>>()
        .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn joe() -> Person {
        Person {
            id: Some(1),
            name: Some("Joe Smith".to_string()),
            date_of_birth: NaiveDate::from_ymd_opt(1971, 12, 26),
            gender: Some("male".to_string()),
            children: Some(2),
            address: Some(Address {
                country: Some("France".to_string()),
                countrycode: Some("FR".to_string()),
                city: Some("Paris".to_string()),
                zipcode: None,
                location: Some(GeoPoint {
                    lat: 48.85,
                    lon: 2.35,
                }),
            }),
        }
    }

    #[test]
    fn test_reference_follows_id() {
        assert_eq!(joe().reference(), Some("1".to_string()));
        assert_eq!(Person::named("Nobody").reference(), None);
    }

    #[test]
    fn test_merge_only_name() {
        let mut existing = joe();
        existing.merge_from(&Person::named("Joe Bar"));

        assert_eq!(existing.name.as_deref(), Some("Joe Bar"));
        let address = existing.address.unwrap();
        assert_eq!(address.country.as_deref(), Some("France"));
        assert_eq!(address.city.as_deref(), Some("Paris"));
        assert_eq!(existing.children, Some(2));
        assert_eq!(existing.id, Some(1));
    }

    #[test]
    fn test_merge_nested_address() {
        let mut existing = joe();
        let incoming = Person {
            address: Some(Address {
                city: Some("Lyon".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        existing.merge_from(&incoming);

        let address = existing.address.unwrap();
        assert_eq!(address.city.as_deref(), Some("Lyon"));
        assert_eq!(address.country.as_deref(), Some("France"));
        assert_eq!(address.countrycode.as_deref(), Some("FR"));
    }

    #[test]
    fn test_merge_does_not_copy_id() {
        let mut existing = joe();
        let incoming = Person {
            id: Some(99),
            gender: Some("female".to_string()),
            ..Default::default()
        };
        existing.merge_from(&incoming);

        assert_eq!(existing.id, Some(1));
        assert_eq!(existing.gender.as_deref(), Some("female"));
    }

    #[test]
    fn test_merge_address_onto_missing_address() {
        let mut existing = Person::named("Jane");
        let incoming = Person {
            address: Some(Address {
                country: Some("Italy".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        existing.merge_from(&incoming);

        assert_eq!(
            existing.address.and_then(|a| a.country),
            Some("Italy".to_string())
        );
    }

    #[test]
    fn test_fulltext() {
        assert_eq!(joe().fulltext(), "Joe Smith male France Paris");
        assert_eq!(Person::named("France Gall").fulltext(), "France Gall");
        assert_eq!(Person::default().fulltext(), "");
    }

    #[test]
    fn test_serialization_uses_camel_case() {
        let json = serde_json::to_value(joe()).unwrap();
        assert_eq!(json["dateOfBirth"], "1971-12-26");
        assert_eq!(json["address"]["countrycode"], "FR");
        assert!(json.get("date_of_birth").is_none());
    }
}
