//! Page data model and merge precedence.
//!
//! Render-time data comes from three layers, later layers overwriting
//! earlier ones on key collision:
//!
//! 1. base-layout data providers, in registration order
//! 2. (context, layout) data providers, in registration order
//! 3. caller-supplied page data
//!
//! Page data carries its shape explicitly as [`PageData`] instead of being
//! inspected at runtime: a mapping merges key by key, a record lands under
//! its own name, a collection under its pluralized element name. Fragment
//! and component renders skip the naming convenience and receive the value
//! as-is, since fragments take pre-shaped data from the caller.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::error::RenderError;

/// The name->value mapping handed to template execution.
pub type DataMap = serde_json::Map<String, Value>;

/// What a data provider returns.
pub type DataResult = Result<DataMap, Box<dyn std::error::Error + Send + Sync>>;

/// A registered data-producing callback, run on every applicable render.
pub(crate) type DataProvider = Arc<dyn Fn() -> DataResult + Send + Sync>;

/// Caller-supplied page data with an explicit shape.
#[derive(Debug, Clone, PartialEq)]
pub enum PageData {
    /// A single value, only meaningful for fragment renders.
    Scalar(Value),
    /// One record, inserted under `name`.
    Record { name: String, value: Value },
    /// A uniform sequence, inserted under `element` + `"s"`.
    Collection { element: String, items: Vec<Value> },
    /// Key-value entries, merged individually.
    Mapping(DataMap),
}

impl PageData {
    pub fn scalar(value: impl Into<Value>) -> Self {
        PageData::Scalar(value.into())
    }

    /// A record under its type name: `PageData::record("User", user)`.
    pub fn record(
        name: impl Into<String>,
        value: impl Serialize,
    ) -> Result<Self, serde_json::Error> {
        Ok(PageData::Record {
            name: name.into(),
            value: serde_json::to_value(value)?,
        })
    }

    /// A collection under the pluralized element name:
    /// `PageData::collection("User", users)` lands under `Users`.
    pub fn collection<T: Serialize>(
        element: impl Into<String>,
        items: impl IntoIterator<Item = T>,
    ) -> Result<Self, serde_json::Error> {
        let items = items
            .into_iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<Value>, _>>()?;
        Ok(PageData::Collection {
            element: element.into(),
            items,
        })
    }

    pub fn mapping<K: Into<String>, V: Into<Value>>(
        entries: impl IntoIterator<Item = (K, V)>,
    ) -> Self {
        PageData::Mapping(
            entries
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

impl From<DataMap> for PageData {
    fn from(map: DataMap) -> Self {
        PageData::Mapping(map)
    }
}

/// Merge provider output and page data into one execution value.
///
/// With `raw_page_data` set (fragment and component renders), non-mapping
/// page data short-circuits the merge and is returned unchanged.
pub(crate) fn merge(
    base_providers: &[DataProvider],
    layout_providers: &[DataProvider],
    raw_page_data: bool,
    page_data: Option<PageData>,
) -> Result<Value, RenderError> {
    if raw_page_data {
        match page_data {
            Some(PageData::Scalar(value)) | Some(PageData::Record { value, .. }) => {
                return Ok(value);
            }
            Some(PageData::Collection { items, .. }) => return Ok(Value::Array(items)),
            Some(PageData::Mapping(_)) | None => {}
        }
    }

    let mut merged = DataMap::new();

    for provider in base_providers.iter().chain(layout_providers) {
        let produced = provider().map_err(RenderError::Data)?;
        merged.extend(produced);
    }

    match page_data {
        None => {}
        Some(PageData::Mapping(entries)) => merged.extend(entries),
        Some(PageData::Record { name, value }) => {
            merged.insert(name, value);
        }
        Some(PageData::Collection { element, items }) => {
            merged.insert(format!("{element}s"), Value::Array(items));
        }
        // a bare scalar has no name to merge under; page renders drop it
        Some(PageData::Scalar(_)) => {}
    }

    Ok(Value::Object(merged))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn provider(entries: &[(&str, &str)]) -> DataProvider {
        let map: DataMap = entries
            .iter()
            .map(|(k, v)| ((*k).to_owned(), Value::String((*v).to_owned())))
            .collect();
        Arc::new(move || Ok(map.clone()))
    }

    #[test]
    fn test_merge_empty() {
        let merged = merge(&[], &[], false, None).unwrap();
        assert_eq!(merged, json!({}));
    }

    #[test]
    fn test_merge_provider_order() {
        let base = vec![
            provider(&[("title", "first"), ("base", "base")]),
            provider(&[("title", "second")]),
        ];
        let merged = merge(&base, &[], false, None).unwrap();
        assert_eq!(merged, json!({"title": "second", "base": "base"}));
    }

    #[test]
    fn test_merge_layout_overrides_base() {
        let base = vec![provider(&[("title", "base")])];
        let layout = vec![provider(&[("title", "layout")])];
        let merged = merge(&base, &layout, false, None).unwrap();
        assert_eq!(merged, json!({"title": "layout"}));
    }

    #[test]
    fn test_merge_page_data_wins() {
        let base = vec![provider(&[("title", "base")])];
        let layout = vec![provider(&[("title", "layout")])];
        let page = PageData::mapping([("title", "page")]);
        let merged = merge(&base, &layout, false, Some(page)).unwrap();
        assert_eq!(merged, json!({"title": "page"}));
    }

    #[test]
    fn test_merge_record_lands_under_its_name() {
        let page = PageData::record("User", json!({"Name": "ada"})).unwrap();
        let merged = merge(&[], &[], false, Some(page)).unwrap();
        assert_eq!(merged, json!({"User": {"Name": "ada"}}));
    }

    #[test]
    fn test_merge_collection_is_pluralized() {
        let page = PageData::collection("User", [json!({"Name": "ada"})]).unwrap();
        let merged = merge(&[], &[], false, Some(page)).unwrap();
        assert_eq!(merged, json!({"Users": [{"Name": "ada"}]}));
    }

    #[test]
    fn test_merge_scalar_dropped_for_pages() {
        let merged = merge(&[], &[], false, Some(PageData::scalar(42))).unwrap();
        assert_eq!(merged, json!({}));
    }

    #[test]
    fn test_fragment_gets_raw_value() {
        let page = PageData::record("User", json!({"Name": "ada"})).unwrap();
        let merged = merge(&[], &[], true, Some(page)).unwrap();
        assert_eq!(merged, json!({"Name": "ada"}));

        let merged = merge(&[], &[], true, Some(PageData::scalar("raw"))).unwrap();
        assert_eq!(merged, json!("raw"));
    }

    #[test]
    fn test_fragment_mapping_still_merges() {
        let base = vec![provider(&[("title", "base")])];
        let page = PageData::mapping([("extra", "x")]);
        let merged = merge(&base, &[], true, Some(page)).unwrap();
        assert_eq!(merged, json!({"title": "base", "extra": "x"}));
    }

    #[test]
    fn test_provider_error_aborts() {
        let failing: DataProvider = Arc::new(|| Err("boom".into()));
        let err = merge(&[failing], &[], false, None).unwrap_err();
        assert!(matches!(err, RenderError::Data(_)));
    }
}
