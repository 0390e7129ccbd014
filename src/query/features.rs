use std::marker::PhantomData;

use bson::{doc, Document};

use crate::db::find_query::{FindQuery, Projection};
use crate::db::models::Schema;
use crate::error::AppError;
use crate::query::filter::Filter;

pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_LIMIT: u64 = 50;

/// Largest skip or limit the server accepts.
const MAX_COUNT: u64 = i64::MAX as u64;

/// Internal revision counter, hidden unless the caller asks for fields.
const REVISION_FIELD: &str = "__v";

/// Raw query-string parameters, in the order they were sent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryParams(Vec<(String, String)>);

impl QueryParams {
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Last value sent for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Replace every value of `key` with a single one.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.0.retain(|(k, _)| k != key);
        self.0.push((key.to_string(), value.into()));
    }

    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }
}

impl From<Vec<(String, String)>> for QueryParams {
    fn from(pairs: Vec<(String, String)>) -> Self {
        Self(pairs)
    }
}

/// Narrows a base find query with the generic list-endpoint features.
///
/// The four stages (`filter`, `sort`, `limit_fields`, `paginate`) each
/// return the features value so they chain:
///
/// ```ignore
/// let query = QueryFeatures::<Tour>::new(visible_tours(), params)
///     .filter()?
///     .sort()
///     .limit_fields()?
///     .paginate()
///     .into_query();
/// ```
pub struct QueryFeatures<S> {
    query: FindQuery,
    params: QueryParams,
    _schema: PhantomData<S>,
}

impl<S: Schema> QueryFeatures<S> {
    pub fn new(query: FindQuery, params: QueryParams) -> Self {
        Self {
            query,
            params,
            _schema: PhantomData,
        }
    }

    /// Every non-reserved parameter becomes a predicate of the find filter.
    pub fn filter(mut self) -> Result<Self, AppError> {
        let filter = Filter::parse::<S>(&self.params)?;
        self.query = self.query.find(filter.to_document());
        Ok(self)
    }

    /// `sort=price,-ratingAverage` sorts ascending by price, then descending
    /// by rating. Without it the newest documents come first.
    pub fn sort(mut self) -> Self {
        let mut sort = match self.params.get("sort").map(split_list) {
            Some(fields) if !fields.is_empty() => {
                let mut sort = Document::new();
                for field in fields {
                    match field.strip_prefix('-') {
                        Some(name) => sort.insert(name, -1),
                        None => sort.insert(field, 1),
                    };
                }
                sort
            }
            _ => doc! { "createdAt": -1 },
        };
        if !sort.contains_key("_id") {
            sort.insert("_id", 1);
        }
        self.query = self.query.sort(sort);
        self
    }

    /// `fields=name,price` keeps only those fields, `fields=-summary` drops
    /// one. Without it every field but the revision counter is returned.
    pub fn limit_fields(mut self) -> Result<Self, AppError> {
        let fields = self
            .params
            .get("fields")
            .map(split_list)
            .unwrap_or_default();

        let projection = if fields.is_empty() {
            Projection::Exclude(vec![REVISION_FIELD.to_string()])
        } else if fields.iter().all(|f| f.starts_with('-')) {
            Projection::Exclude(
                fields
                    .iter()
                    .map(|f| f.trim_start_matches('-').to_string())
                    .collect(),
            )
        } else if fields.iter().any(|f| f.starts_with('-')) {
            return Err(AppError::bad_request(
                "Cannot mix included and excluded fields in 'fields'",
            ));
        } else {
            Projection::Include(fields.iter().map(|f| f.to_string()).collect())
        };

        self.query = self.query.select(projection);
        Ok(self)
    }

    /// `page` and `limit` (defaults 1 and 50) become skip + limit. Paging
    /// past the end simply matches nothing.
    pub fn paginate(mut self) -> Self {
        let page = positive(self.params.get("page")).unwrap_or(DEFAULT_PAGE);
        let limit = positive(self.params.get("limit")).unwrap_or(DEFAULT_LIMIT);
        let skip = (page - 1).saturating_mul(limit).min(MAX_COUNT);

        self.query = self
            .query
            .skip(skip)
            .limit(i64::try_from(limit).unwrap_or(i64::MAX));
        self
    }

    pub fn query(&self) -> &FindQuery {
        &self.query
    }

    pub fn into_query(self) -> FindQuery {
        self.query
    }
}

fn split_list(value: &str) -> Vec<&str> {
    value
        .split(',')
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .collect()
}

fn positive(value: Option<&str>) -> Option<u64> {
    value
        .and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|n| *n > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::Tour;

    fn params(pairs: &[(&str, &str)]) -> QueryParams {
        QueryParams::from(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<Vec<_>>(),
        )
    }

    fn features(pairs: &[(&str, &str)]) -> QueryFeatures<Tour> {
        QueryFeatures::new(FindQuery::new(), params(pairs))
    }

    #[test]
    fn test_full_chain() {
        let query = features(&[
            ("difficulty", "easy"),
            ("price[lt]", "1500"),
            ("sort", "-price,name"),
            ("fields", "name,price"),
            ("page", "3"),
            ("limit", "10"),
        ])
        .filter()
        .unwrap()
        .sort()
        .limit_fields()
        .unwrap()
        .paginate()
        .into_query();

        assert_eq!(
            query.filter(),
            doc! { "difficulty": "easy", "price": { "$lt": 1500.0 } }
        );
        assert_eq!(
            query.sort_spec(),
            Some(&doc! { "price": -1, "name": 1, "_id": 1 })
        );
        assert_eq!(
            query.projection(),
            &Projection::Include(vec!["name".into(), "price".into()])
        );
        assert_eq!(query.skip_count(), Some(20));
        assert_eq!(query.limit_count(), Some(10));
    }

    #[test]
    fn test_filter_keeps_base_query() {
        let base = FindQuery::new().find(doc! { "secretTour": { "$ne": true } });
        let query = QueryFeatures::<Tour>::new(base, params(&[("difficulty", "easy")]))
            .filter()
            .unwrap()
            .into_query();
        assert_eq!(
            query.filter(),
            doc! { "$and": [
                { "secretTour": { "$ne": true } },
                { "difficulty": "easy" }
            ] }
        );
    }

    #[test]
    fn test_default_sort_is_newest_first() {
        let features = features(&[]).sort();
        assert_eq!(
            features.query().sort_spec(),
            Some(&doc! { "createdAt": -1, "_id": 1 })
        );
    }

    #[test]
    fn test_empty_sort_falls_back_to_default() {
        let features = features(&[("sort", " , ")]).sort();
        assert_eq!(
            features.query().sort_spec(),
            Some(&doc! { "createdAt": -1, "_id": 1 })
        );
    }

    #[test]
    fn test_explicit_id_sort_is_not_duplicated() {
        let features = features(&[("sort", "-_id")]).sort();
        assert_eq!(features.query().sort_spec(), Some(&doc! { "_id": -1 }));
    }

    #[test]
    fn test_default_fields_hide_only_revision() {
        let features = features(&[]).limit_fields().unwrap();
        assert_eq!(
            features.query().projection(),
            &Projection::Exclude(vec!["__v".into()])
        );
    }

    #[test]
    fn test_exclusion_fields() {
        let features = features(&[("fields", "-summary,-description")])
            .limit_fields()
            .unwrap();
        assert_eq!(
            features.query().projection(),
            &Projection::Exclude(vec!["summary".into(), "description".into()])
        );
    }

    #[test]
    fn test_mixed_fields_rejected() {
        let result = features(&[("fields", "name,-price")]).limit_fields();
        match result {
            Err(err) => assert_eq!(err.code(), 400),
            Ok(_) => panic!("Expected mixed projection to be rejected"),
        }
    }

    #[test]
    fn test_default_pagination() {
        let features = features(&[]).paginate();
        assert_eq!(features.query().skip_count(), Some(0));
        assert_eq!(features.query().limit_count(), Some(DEFAULT_LIMIT as i64));
    }

    #[test]
    fn test_invalid_pagination_falls_back_to_defaults() {
        let features = features(&[("page", "0"), ("limit", "lots")]).paginate();
        assert_eq!(features.query().skip_count(), Some(0));
        assert_eq!(features.query().limit_count(), Some(50));

        let features = features_with_negative_page();
        assert_eq!(features.query().skip_count(), Some(0));
    }

    #[test]
    fn test_huge_page_clamps_skip_to_driver_range() {
        let features = features(&[("page", "200000000000000000"), ("limit", "50")]).paginate();
        assert_eq!(features.query().skip_count(), Some(i64::MAX as u64));

        let mut options = mongodb::options::FindOptions::default();
        options.skip = features.query().skip_count();
        options.limit = features.query().limit_count();
        assert!(bson::to_document(&options).is_ok());
    }

    fn features_with_negative_page() -> QueryFeatures<Tour> {
        features(&[("page", "-2"), ("limit", "5")]).paginate()
    }

    #[test]
    fn test_query_params_last_value_wins() {
        let params = params(&[("sort", "price"), ("sort", "-price")]);
        assert_eq!(params.get("sort"), Some("-price"));
        assert_eq!(params.get("fields"), None);
    }

    #[test]
    fn test_query_params_set_overrides() {
        let params = params(&[("limit", "100"), ("difficulty", "easy")])
            .with("limit", "5")
            .with("sort", "price,ratingAverage");
        assert_eq!(params.get("limit"), Some("5"));
        assert_eq!(params.iter().filter(|(k, _)| *k == "limit").count(), 1);
        assert_eq!(params.get("difficulty"), Some("easy"));
        assert_eq!(params.get("sort"), Some("price,ratingAverage"));
    }
}
