use serde::{Deserialize, Serialize};

use super::predicate::Predicate;

/// Ordered list of predicates.
///
/// Predicates are split into two buckets by connector and the clause reads
/// `(AND of the AND bucket) AND (OR of the OR bucket)`. OR predicates are
/// grouped together; they never OR against the whole AND bucket. There is no
/// general boolean tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Where(Vec<Predicate>);

/// The two buckets of a [`Where`].
#[derive(Debug, Default)]
pub struct Groups<'a> {
    pub all: Vec<&'a Predicate>,
    pub any: Vec<&'a Predicate>,
}

impl Where {
    /// Matches every row.
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn with(mut self, predicate: Predicate) -> Self {
        self.0.push(predicate);
        self
    }

    pub fn push(&mut self, predicate: Predicate) {
        self.0.push(predicate);
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Predicate> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn groups(&self) -> Groups<'_> {
        let (any, all) = self.0.iter().partition(|p| p.is_or());
        Groups { all, any }
    }
}

impl From<Predicate> for Where {
    fn from(predicate: Predicate) -> Self {
        Self(vec![predicate])
    }
}

impl From<Vec<Predicate>> for Where {
    fn from(predicates: Vec<Predicate>) -> Self {
        Self(predicates)
    }
}

impl FromIterator<Predicate> for Where {
    fn from_iter<T: IntoIterator<Item = Predicate>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Where {
    type Item = &'a Predicate;
    type IntoIter = std::slice::Iter<'a, Predicate>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

/// Single-key sort.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: String,
    #[serde(default)]
    pub direction: Direction,
}

impl SortSpec {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Desc,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl Page {
    pub const DEFAULT_LIMIT: usize = 100;

    pub fn resolve(&self, default_limit: usize) -> Window {
        Window {
            limit: self.limit.unwrap_or(default_limit),
            offset: self.offset.unwrap_or(0),
        }
    }
}

/// Resolved pagination bounds handed to backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub limit: usize,
    pub offset: usize,
}

impl Window {
    pub fn apply<T>(&self, rows: Vec<T>) -> Vec<T> {
        rows.into_iter().skip(self.offset).take(self.limit).collect()
    }
}

/// Output projection over logical field names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Select {
    pub fields: Vec<String>,
    /// Drop the id even though it is always kept otherwise.
    #[serde(default)]
    pub exclude_id: bool,
}

impl Select {
    pub fn fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
            exclude_id: false,
        }
    }

    pub fn exclude_id(mut self) -> Self {
        self.exclude_id = true;
        self
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f == field)
    }
}

/// Arguments of `find_many`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindMany {
    #[serde(default, rename = "where")]
    pub filter: Where,
    #[serde(default)]
    pub sort_by: Option<SortSpec>,
    #[serde(flatten)]
    pub page: Page,
    #[serde(default)]
    pub select: Option<Select>,
}

impl FindMany {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: impl Into<Where>) -> Self {
        self.filter = filter.into();
        self
    }

    pub fn with(mut self, predicate: Predicate) -> Self {
        self.filter.push(predicate);
        self
    }

    pub fn sort_by(mut self, sort: SortSpec) -> Self {
        self.sort_by = Some(sort);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.page.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.page.offset = Some(offset);
        self
    }

    pub fn select(mut self, select: Select) -> Self {
        self.select = Some(select);
        self
    }
}
