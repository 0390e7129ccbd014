use bson::{doc, Bson, Document};

/// Which fields a query returns.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Projection {
    /// Every stored field.
    #[default]
    All,
    /// Only the listed fields (plus `_id`).
    Include(Vec<String>),
    /// Every field except the listed ones.
    Exclude(Vec<String>),
}

impl Projection {
    /// Add fields that must stay hidden unless explicitly included.
    ///
    /// Inclusion projections are left untouched: a hidden field only shows up
    /// there when the caller asked for it.
    pub fn hiding(self, hidden: &[&str]) -> Self {
        match self {
            Projection::Include(fields) => Projection::Include(fields),
            Projection::All => {
                Projection::Exclude(hidden.iter().map(|f| f.to_string()).collect())
            }
            Projection::Exclude(mut fields) => {
                for field in hidden {
                    if !fields.iter().any(|f| f == field) {
                        fields.push(field.to_string());
                    }
                }
                Projection::Exclude(fields)
            }
        }
    }

    pub fn to_document(&self) -> Option<Document> {
        match self {
            Projection::All => None,
            Projection::Include(fields) => Some(
                fields
                    .iter()
                    .map(|f| (f.clone(), Bson::Int32(1)))
                    .collect(),
            ),
            Projection::Exclude(fields) => Some(
                fields
                    .iter()
                    .map(|f| (f.clone(), Bson::Int32(0)))
                    .collect(),
            ),
        }
    }
}

/// A chainable find query.
///
/// Every call narrows the query: `find` adds a filter that is AND-ed with the
/// previous ones, the other methods replace their setting.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FindQuery {
    filters: Vec<Document>,
    sort: Option<Document>,
    projection: Projection,
    skip: Option<u64>,
    limit: Option<i64>,
}

impl FindQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn find(mut self, filter: Document) -> Self {
        if !filter.is_empty() {
            self.filters.push(filter);
        }
        self
    }

    pub fn sort(mut self, sort: Document) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn select(mut self, projection: Projection) -> Self {
        self.projection = projection;
        self
    }

    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// The combined filter of every `find` call.
    pub fn filter(&self) -> Document {
        match self.filters.as_slice() {
            [] => Document::new(),
            [single] => single.clone(),
            many => doc! { "$and": many.to_vec() },
        }
    }

    pub fn sort_spec(&self) -> Option<&Document> {
        self.sort.as_ref()
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    pub fn skip_count(&self) -> Option<u64> {
        self.skip
    }

    pub fn limit_count(&self) -> Option<i64> {
        self.limit
    }
}
