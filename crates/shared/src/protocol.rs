use serde::{Deserialize, Serialize};

/// Person record returned by the people lookup service.
///
/// Only the fields the forms need are typed; the service sends more.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonRecord {
    pub name: String,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub birth_year: Option<String>,
    #[serde(default)]
    pub height: Option<String>,
    #[serde(default)]
    pub mass: Option<String>,
    #[serde(default)]
    pub homeworld: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}
