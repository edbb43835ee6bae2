use chrono::{DateTime, NaiveDateTime, Utc};
use diesel::sql_types::{BigInt, Bool, Integer, Text, Timestamp};
use diesel::QueryableByName;
use std::fmt;

use crate::domain::bookmark::Bookmark;
use crate::domain::error::DomainResult;

#[derive(QueryableByName, Debug)]
pub struct IdResult {
    #[diesel(sql_type = Integer)]
    pub id: i32,
}

#[derive(QueryableByName, Debug)]
pub struct CountResult {
    #[diesel(sql_type = BigInt)]
    pub count: i64,
}

#[derive(QueryableByName, Debug)]
pub struct SizeResult {
    #[diesel(sql_type = BigInt)]
    pub size: i64,
}

/// Tag usage for aggregation queries
#[derive(QueryableByName, Debug)]
pub struct TagsFrequency {
    #[diesel(sql_type = Text)]
    pub tag: String,

    #[diesel(sql_type = BigInt)]
    pub n: i64,
}

/// A bookmark row as read by raw, table-parametric queries.
#[derive(QueryableByName, Clone)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct DbBookmark {
    #[diesel(sql_type = Integer)]
    pub id: i32,
    #[diesel(sql_type = Text)]
    pub url: String,
    #[diesel(sql_type = Text)]
    pub title: String,
    #[diesel(sql_type = Text)]
    pub tags: String,
    #[diesel(sql_type = Text)]
    pub desc: String,
    #[diesel(sql_type = Timestamp)]
    pub created_at: NaiveDateTime,
    #[diesel(sql_type = Timestamp)]
    pub last_visit: NaiveDateTime,
    #[diesel(sql_type = Timestamp)]
    pub updated_at: NaiveDateTime,
    #[diesel(sql_type = Integer)]
    pub visit_count: i32,
    #[diesel(sql_type = Bool)]
    pub favorite: bool,
}

impl DbBookmark {
    pub fn into_domain(self) -> DomainResult<Bookmark> {
        Bookmark::from_storage(
            self.id,
            self.url,
            self.title,
            self.desc,
            self.tags,
            DateTime::<Utc>::from_naive_utc_and_offset(self.created_at, Utc),
            DateTime::<Utc>::from_naive_utc_and_offset(self.updated_at, Utc),
            DateTime::<Utc>::from_naive_utc_and_offset(self.last_visit, Utc),
            self.visit_count,
            self.favorite,
        )
    }
}

impl fmt::Display for DbBookmark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "id: {}, url: {}, title: {}, tags: {}, desc: {}, created_at: {}, last_visit: {}, updated_at: {}, visit_count: {}, favorite: {}",
            self.id,
            self.url,
            self.title,
            self.tags,
            self.desc,
            self.created_at,
            self.last_visit,
            self.updated_at,
            self.visit_count,
            self.favorite
        )
    }
}

impl fmt::Debug for DbBookmark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Use the same format as Display
        write!(f, "{}", self)
    }
}
