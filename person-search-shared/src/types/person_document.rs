//! Person document types for the search index.
//!
//! This module defines the document structure that is indexed in the search engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::person::Person;

/// Document representation of a person for the search index.
///
/// The document carries every field of the persisted [`Person`] (flattened at the top
/// level of the document) plus the derived `fulltext` field used by the default
/// free-text query, and the time the document was built.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PersonDocument {
    #[serde(flatten)]
    pub person: Person,
    pub fulltext: String,
    pub indexed_at: DateTime<Utc>,
}

impl PersonDocument {
    /// Build the document for a persisted person.
    ///
    /// # Example
    ///
    /// ```
    /// use person_search_shared::{Person, PersonDocument};
    ///
    /// let mut person = Person::named("Joe Smith");
    /// person.id = Some(7);
    /// let doc = PersonDocument::from_person(&person);
    /// assert_eq!(doc.fulltext, "Joe Smith");
    /// assert_eq!(doc.document_id().as_deref(), Some("7"));
    /// ```
    pub fn from_person(person: &Person) -> Self {
        Self {
            person: person.clone(),
            fulltext: person.fulltext(),
            indexed_at: Utc::now(),
        }
    }

    /// Generate the document ID used in the search index.
    pub fn document_id(&self) -> Option<String> {
        self.person.reference()
    }
}
