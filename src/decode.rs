//! Error-aware response decoding.
//!
//! The API reports failures of single-object endpoints inline, as an object
//! with an `error` member. Collection endpoints answer with bare arrays,
//! which cannot carry that signal. The two shapes therefore get separate
//! entry points, picked by the caller from the shape it asked for:
//!
//! - [`decode`] for single objects: checks for `error` before decoding.
//! - [`decode_list`] for arrays: decodes element by element.
//!
//! Both attach the source text to every decoded entity.

use crate::error::{ApiError, DecodeError};
use serde::de::DeserializeOwned;
use serde_json::value::RawValue;

/// A decodable API entity that remembers the JSON it was decoded from.
pub trait Entity: DeserializeOwned {
    /// The JSON text this value was decoded from, if known.
    fn raw_json(&self) -> Option<&str>;

    /// Attach the JSON text this value was decoded from.
    fn set_raw_json(&mut self, raw: String);
}

/// Decode a single-object response body.
///
/// An object with an `error` member becomes [`DecodeError::Api`] whatever
/// `T` is.
pub fn decode<T: Entity>(text: &str) -> Result<T, DecodeError> {
    let value: serde_json::Value = serde_json::from_str(text).map_err(DecodeError::Malformed)?;

    if has_error_member(&value) {
        return Err(DecodeError::Api(ApiError::from_object(value)));
    }

    let mut entity: T = serde_json::from_value(value).map_err(DecodeError::Mismatch)?;
    entity.set_raw_json(text.to_string());
    Ok(entity)
}

/// Decode an array response body element by element.
///
/// The array itself is never inspected for an `error` member. A body that
/// is not an array at all but is an error object still yields
/// [`DecodeError::Api`], since that is how servers reject collection
/// requests (together with a non-success status).
pub fn decode_list<T: Entity>(text: &str) -> Result<Vec<T>, DecodeError> {
    let raw: &RawValue = serde_json::from_str(text).map_err(DecodeError::Malformed)?;

    let elements: Vec<&RawValue> = match serde_json::from_str(raw.get()) {
        Ok(elements) => elements,
        Err(err) => {
            let value: serde_json::Value =
                serde_json::from_str(raw.get()).map_err(DecodeError::Malformed)?;
            if has_error_member(&value) {
                return Err(DecodeError::Api(ApiError::from_object(value)));
            }
            return Err(DecodeError::Mismatch(err));
        }
    };

    elements
        .into_iter()
        .map(|element| {
            let mut entity: T =
                serde_json::from_str(element.get()).map_err(DecodeError::Mismatch)?;
            entity.set_raw_json(element.get().to_string());
            Ok(entity)
        })
        .collect()
}

/// Presence of the member is what counts, even `{"error": null}`.
fn has_error_member(value: &serde_json::Value) -> bool {
    value
        .as_object()
        .is_some_and(|object| object.contains_key("error"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Item {
        id: u64,
        #[serde(default)]
        content: Option<String>,
        #[serde(skip)]
        raw_json: Option<String>,
    }

    impl Entity for Item {
        fn raw_json(&self) -> Option<&str> {
            self.raw_json.as_deref()
        }

        fn set_raw_json(&mut self, raw: String) {
            self.raw_json = Some(raw);
        }
    }

    #[test]
    fn test_decode_object_attaches_raw_text() {
        let text = r#"{"id": 7, "content": "hello"}"#;
        let item: Item = decode(text).unwrap();
        assert_eq!(item.id, 7);
        assert_eq!(item.content.as_deref(), Some("hello"));
        assert_eq!(item.raw_json(), Some(text));
    }

    #[test]
    fn test_decode_error_object_regardless_of_type() {
        let text = r#"{"error": "Record not found"}"#;

        match decode::<Item>(text) {
            Err(DecodeError::Api(err)) => {
                assert_eq!(err.description, "Record not found");
                assert_eq!(err.raw["error"], "Record not found");
            }
            other => panic!("expected api error, got {:?}", other),
        }

        // Even a type that would happily accept the object
        #[derive(Debug, Deserialize)]
        struct Anything {
            #[serde(skip)]
            raw_json: Option<String>,
        }
        impl Entity for Anything {
            fn raw_json(&self) -> Option<&str> {
                self.raw_json.as_deref()
            }
            fn set_raw_json(&mut self, raw: String) {
                self.raw_json = Some(raw);
            }
        }
        assert!(matches!(decode::<Anything>(text), Err(DecodeError::Api(_))));
    }

    #[test]
    fn test_decode_error_member_presence_is_enough() {
        let err = decode::<Item>(r#"{"id": 1, "error": null}"#).unwrap_err();
        assert!(err.api_error().is_some());
    }

    #[test]
    fn test_decode_malformed_is_not_api_error() {
        let err = decode::<Item>("<html>502 Bad Gateway</html>").unwrap_err();
        assert!(matches!(err, DecodeError::Malformed(_)));
        assert!(err.api_error().is_none());
    }

    #[test]
    fn test_decode_shape_mismatch() {
        let err = decode::<Item>(r#"{"content": "no id"}"#).unwrap_err();
        assert!(matches!(err, DecodeError::Mismatch(_)));
    }

    #[test]
    fn test_decode_list_element_wise() {
        let text = r#"[{"id": 1}, {"id": 2, "content": "b"}]"#;
        let items: Vec<Item> = decode_list(text).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id, 1);
        assert_eq!(items[0].raw_json(), Some(r#"{"id": 1}"#));
        assert_eq!(items[1].raw_json(), Some(r#"{"id": 2, "content": "b"}"#));
    }

    #[test]
    fn test_decode_list_never_checks_elements_for_error() {
        let err = decode_list::<Item>(r#"[{"error": "x"}]"#).unwrap_err();
        assert!(matches!(err, DecodeError::Mismatch(_)));
    }

    #[test]
    fn test_decode_list_empty() {
        let items: Vec<Item> = decode_list("[]").unwrap();
        assert!(items.is_empty());
    }

    #[test]
    fn test_decode_list_rejections() {
        let err = decode_list::<Item>(r#"{"error": "The access token is invalid"}"#).unwrap_err();
        assert_eq!(err.api_error().unwrap().description, "The access token is invalid");

        let err = decode_list::<Item>(r#"{"id": 1}"#).unwrap_err();
        assert!(matches!(err, DecodeError::Mismatch(_)));

        let err = decode_list::<Item>("[{").unwrap_err();
        assert!(matches!(err, DecodeError::Malformed(_)));
    }
}
