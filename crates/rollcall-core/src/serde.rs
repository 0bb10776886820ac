use serde::de::{DeserializeOwned, IntoDeserializer};
use serde::{Deserialize, Deserializer};

/// Deserializes an optional query value, treating an empty string as absent.
///
/// Works for anything that deserializes from a string: UUIDs, dates and
/// unit-variant enums. Needed for filter structs that flatten pagination,
/// since flattening hands every value over as a string.
pub fn empty_string_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    match opt.as_deref() {
        None | Some("") => Ok(None),
        Some(s) => T::deserialize(s.into_deserializer()).map(Some),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    #[serde(rename_all = "lowercase")]
    enum Colour {
        Red,
        Blue,
    }

    #[derive(Debug, Deserialize)]
    struct Filters {
        #[serde(default, deserialize_with = "empty_string_as_none")]
        id: Option<uuid::Uuid>,
        #[serde(default, deserialize_with = "empty_string_as_none")]
        colour: Option<Colour>,
    }

    #[test]
    fn test_parses_present_values() {
        let id = uuid::Uuid::new_v4();
        let json = format!(r#"{{"id":"{}","colour":"blue"}}"#, id);
        let f: Filters = serde_json::from_str(&json).unwrap();
        assert_eq!(f.id, Some(id));
        assert_eq!(f.colour, Some(Colour::Blue));
    }

    #[test]
    fn test_empty_and_missing_are_none() {
        let f: Filters = serde_json::from_str(r#"{"id":""}"#).unwrap();
        assert!(f.id.is_none());
        assert!(f.colour.is_none());

        let f: Filters = serde_json::from_str(r#"{"colour":"red"}"#).unwrap();
        assert_eq!(f.colour, Some(Colour::Red));
    }

    #[test]
    fn test_invalid_value_is_error() {
        assert!(serde_json::from_str::<Filters>(r#"{"colour":"green"}"#).is_err());
        assert!(serde_json::from_str::<Filters>(r#"{"id":"nope"}"#).is_err());
    }
}
