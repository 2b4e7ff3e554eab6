//! Typed search filter builder.
//!
//! Search inputs are turned into a list of [`Condition`]s over a closed set of
//! [`Column`]s and rendered into a `WHERE` clause made only of fixed column
//! expressions and `?` placeholders. User values always travel as bound
//! parameters.

use serde::{Deserialize, Serialize};

use super::models::non_blank;

/// Inclusive bounds for the year and creation-month filters.
///
/// Both bounds compare as `BETWEEN`, a lone start is an exact match and a lone
/// end applies no filter at all.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeFilter {
    pub start: Option<String>,
    pub end: Option<String>,
}

impl RangeFilter {
    pub fn new<S: AsRef<str>>(start: Option<S>, end: Option<S>) -> Self {
        Self {
            start: non_blank(start),
            end: non_blank(end),
        }
    }

    fn condition(&self, column: Column) -> Option<Condition> {
        match (&self.start, &self.end) {
            (Some(start), Some(end)) => Some(Condition::Between(column, start.clone(), end.clone())),
            (Some(start), None) => Some(Condition::Equals(column, start.clone())),
            (None, _) => None,
        }
    }
}

/// Search inputs, every one optional and ANDed with the others.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchFilters {
    /// Substring of artist or album.
    pub text: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    /// Exact genre.
    pub genre: Option<String>,
    /// Exact store.
    pub store: Option<String>,
    pub year: RangeFilter,
    /// Creation month range, `YYYY-MM`.
    pub created_month: RangeFilter,
}

impl SearchFilters {
    /// Trims every input and drops blank ones.
    pub fn normalized(self) -> Self {
        Self {
            text: non_blank(self.text),
            artist: non_blank(self.artist),
            album: non_blank(self.album),
            genre: non_blank(self.genre),
            store: non_blank(self.store),
            year: RangeFilter::new(self.year.start, self.year.end),
            created_month: RangeFilter::new(self.created_month.start, self.created_month.end),
        }
    }

    pub fn to_filter_expr(&self) -> FilterExpr {
        let mut expr = FilterExpr::default();
        if let Some(text) = &self.text {
            expr = expr.and(Condition::AnyContains(
                vec![Column::Artist, Column::Album],
                text.clone(),
            ));
        }
        if let Some(artist) = &self.artist {
            expr = expr.and(Condition::Contains(Column::Artist, artist.clone()));
        }
        if let Some(album) = &self.album {
            expr = expr.and(Condition::Contains(Column::Album, album.clone()));
        }
        if let Some(genre) = &self.genre {
            expr = expr.and(Condition::Equals(Column::Genre, genre.clone()));
        }
        if let Some(condition) = self.year.condition(Column::Year) {
            expr = expr.and(condition);
        }
        if let Some(store) = &self.store {
            expr = expr.and(Condition::Equals(Column::Store, store.clone()));
        }
        if let Some(condition) = self.created_month.condition(Column::CreatedMonth) {
            expr = expr.and(condition);
        }
        expr
    }
}

/// Record columns that can be filtered on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Column {
    Artist,
    Album,
    Genre,
    Year,
    Store,
    /// `created_at` truncated to `YYYY-MM`.
    CreatedMonth,
}

impl Column {
    fn sql(&self) -> &'static str {
        match self {
            Column::Artist => "artist",
            Column::Album => "album",
            Column::Genre => "genre",
            Column::Year => "year",
            Column::Store => "store",
            Column::CreatedMonth => "substr(created_at, 1, 7)",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Condition {
    /// Case-insensitive substring match.
    Contains(Column, String),
    /// Case-insensitive substring match on any of the columns.
    AnyContains(Vec<Column>, String),
    /// Case-sensitive equality.
    Equals(Column, String),
    /// Inclusive lexical range.
    Between(Column, String, String),
}

const LIKE_ESCAPE: char = '\\';

fn like_pattern(value: &str) -> String {
    let mut pattern = String::with_capacity(value.len() + 2);
    pattern.push('%');
    for c in value.chars() {
        if c == '%' || c == '_' || c == LIKE_ESCAPE {
            pattern.push(LIKE_ESCAPE);
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

fn like_clause(column: Column) -> String {
    format!("{} LIKE ? ESCAPE '{}'", column.sql(), LIKE_ESCAPE)
}

impl Condition {
    fn render(&self, params: &mut Vec<String>) -> String {
        match self {
            Condition::Contains(column, value) => {
                params.push(like_pattern(value));
                like_clause(*column)
            }
            Condition::AnyContains(columns, value) => {
                let pattern = like_pattern(value);
                let clauses: Vec<String> = columns
                    .iter()
                    .map(|column| {
                        params.push(pattern.clone());
                        like_clause(*column)
                    })
                    .collect();
                format!("({})", clauses.join(" OR "))
            }
            Condition::Equals(column, value) => {
                params.push(value.clone());
                format!("{} = ?", column.sql())
            }
            Condition::Between(column, start, end) => {
                params.push(start.clone());
                params.push(end.clone());
                format!("{} BETWEEN ? AND ?", column.sql())
            }
        }
    }
}

/// Conjunction of conditions.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FilterExpr {
    conditions: Vec<Condition>,
}

/// Rendered filter: a `WHERE` clause (empty when unfiltered) and its
/// positional parameters.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SqlFilter {
    pub where_clause: String,
    pub params: Vec<String>,
}

impl FilterExpr {
    pub fn and(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn to_sql(&self) -> SqlFilter {
        if self.conditions.is_empty() {
            return SqlFilter::default();
        }
        let mut params = Vec::new();
        let clauses: Vec<String> = self
            .conditions
            .iter()
            .map(|condition| condition.render(&mut params))
            .collect();
        SqlFilter {
            where_clause: format!(" WHERE {}", clauses.join(" AND ")),
            params,
        }
    }
}
