//! Descending keyset pagination shared by every list operation.
//!
//! A page query asks the store for `limit + 1` rows ordered by
//! `(timestamp DESC, id DESC)`. When the extra row comes back it is dropped
//! and the `(timestamp, id)` of the last kept row becomes the next cursor.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, SecondsFormat, Utc};
use sea_orm::{ColumnTrait, Condition};
use serde::Serialize;

use crate::error::{Error, Result};

pub const DEFAULT_LIMIT: u64 = 50;
pub const MAX_LIMIT: u64 = 500;

const SEPARATOR: char = '|';

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Cursor {
    pub timestamp: DateTime<Utc>,
    pub id: i32,
}

impl Cursor {
    pub fn new(timestamp: DateTime<Utc>, id: i32) -> Self {
        Cursor { timestamp, id }
    }

    pub fn encode(&self) -> String {
        let raw = format!(
            "{}{}{}",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true),
            SEPARATOR,
            self.id
        );
        URL_SAFE_NO_PAD.encode(raw.as_bytes())
    }

    pub fn decode(token: &str) -> Result<Self> {
        let bytes = URL_SAFE_NO_PAD
            .decode(token.trim())
            .map_err(|_| invalid_cursor("cursor is not valid base64"))?;
        let raw =
            String::from_utf8(bytes).map_err(|_| invalid_cursor("cursor is not valid text"))?;
        let fields: Vec<&str> = raw.split(SEPARATOR).collect();
        if fields.len() != 2 {
            return Err(invalid_cursor("cursor must carry a timestamp and an id"));
        }
        let timestamp = DateTime::parse_from_rfc3339(fields[0])
            .map_err(|_| invalid_cursor("cursor timestamp is not RFC 3339"))?
            .with_timezone(&Utc);
        let id = fields[1]
            .parse::<i32>()
            .map_err(|_| invalid_cursor("cursor id is not an integer"))?;
        Ok(Cursor { timestamp, id })
    }
}

fn invalid_cursor(message: &str) -> Error {
    Error::validation("invalid_cursor", message)
}

/// Caller supplied position and page size, already validated.
#[derive(Clone, Copy, Debug, Default)]
pub struct PageRequest {
    pub cursor: Option<Cursor>,
    pub limit: u64,
}

impl PageRequest {
    pub fn parse(cursor: Option<&str>, limit: Option<u64>) -> Result<Self> {
        let cursor = match cursor {
            Some(token) if !token.trim().is_empty() => Some(Cursor::decode(token)?),
            _ => None,
        };
        Ok(PageRequest {
            cursor,
            limit: clamp_limit(limit)?,
        })
    }

    // Number of rows to ask the store for.
    pub fn fetch_limit(&self) -> u64 {
        self.limit + 1
    }
}

pub fn clamp_limit(limit: Option<u64>) -> Result<u64> {
    match limit {
        None => Ok(DEFAULT_LIMIT),
        Some(0) => Err(Error::validation(
            "invalid_limit",
            "limit must be at least 1",
        )),
        Some(n) => Ok(n.min(MAX_LIMIT)),
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

impl<T> Page<T> {
    // Trim the look-ahead row and derive the cursor from the new last row.
    pub fn from_rows<F>(mut rows: Vec<T>, limit: u64, key: F) -> Page<T>
    where
        F: Fn(&T) -> (DateTime<Utc>, i32),
    {
        let limit = limit as usize;
        if rows.len() > limit {
            rows.truncate(limit);
            let next_cursor = rows.last().map(|row| {
                let (timestamp, id) = key(row);
                Cursor::new(timestamp, id).encode()
            });
            Page {
                items: rows,
                next_cursor,
            }
        } else {
            Page {
                items: rows,
                next_cursor: None,
            }
        }
    }

    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            next_cursor: self.next_cursor,
        }
    }
}

// Rows strictly after the cursor in (timestamp DESC, id DESC) order.
pub fn after_cursor<T, I>(timestamp_col: T, id_col: I, cursor: &Cursor) -> Condition
where
    T: ColumnTrait,
    I: ColumnTrait,
{
    Condition::any()
        .add(timestamp_col.lt(cursor.timestamp))
        .add(
            Condition::all()
                .add(timestamp_col.eq(cursor.timestamp))
                .add(id_col.lt(cursor.id)),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(nanos: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap() + chrono::Duration::nanoseconds(nanos as i64)
    }

    #[test]
    fn cursor_keeps_nanosecond_precision() {
        let cursor = Cursor::new(at(123_456_789), 42);
        let token = cursor.encode();
        assert!(!token.contains('='));
        assert!(!token.contains('+'));
        assert_eq!(Cursor::decode(&token).unwrap(), cursor);
    }

    #[test]
    fn malformed_cursors_are_client_errors() {
        let bad_encoding = Cursor::decode("not base64 !!").unwrap_err();
        assert_eq!(bad_encoding.code(), "invalid_cursor");

        let wrong_fields = URL_SAFE_NO_PAD.encode("2025-03-01T12:00:00Z|1|2");
        assert_eq!(Cursor::decode(&wrong_fields).unwrap_err().status(), 400);

        let bad_time = URL_SAFE_NO_PAD.encode("yesterday|1");
        assert_eq!(Cursor::decode(&bad_time).unwrap_err().status(), 400);

        let bad_id = URL_SAFE_NO_PAD.encode("2025-03-01T12:00:00Z|seven");
        assert_eq!(Cursor::decode(&bad_id).unwrap_err().code(), "invalid_cursor");
    }

    #[test]
    fn page_drops_lookahead_row() {
        let rows: Vec<(DateTime<Utc>, i32)> = (0..4).rev().map(|i| (at(i as u32), i)).collect();
        let page = Page::from_rows(rows, 3, |row| *row);
        assert_eq!(page.items.len(), 3);
        let cursor = Cursor::decode(page.next_cursor.as_deref().unwrap()).unwrap();
        assert_eq!(cursor, Cursor::new(at(1), 1));
    }

    #[test]
    fn short_page_has_no_cursor() {
        let rows = vec![(at(0), 1)];
        let page = Page::from_rows(rows, 3, |row| *row);
        assert_eq!(page.items.len(), 1);
        assert!(page.next_cursor.is_none());
    }

    #[test]
    fn limit_is_clamped_not_loosened() {
        assert_eq!(clamp_limit(None).unwrap(), DEFAULT_LIMIT);
        assert_eq!(clamp_limit(Some(10_000)).unwrap(), MAX_LIMIT);
        assert_eq!(clamp_limit(Some(0)).unwrap_err().code(), "invalid_limit");
    }

    #[test]
    fn blank_cursor_means_first_page() {
        let request = PageRequest::parse(Some("  "), Some(5)).unwrap();
        assert!(request.cursor.is_none());
        assert_eq!(request.fetch_limit(), 6);
    }
}
