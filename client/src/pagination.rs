//! `Content-Range` pagination.
//!
//! Collection endpoints accept `?page=&limit=` and advertise the total in a
//! `Content-Range: min-max/total` response header. Listing is a `limit=1`
//! probe for the total, then `ceil(total / limit)` sequential page fetches.

use std::future::Future;

use regex::Regex;

use crate::error::ApiError;

/// Largest page size the platform accepts.
pub const MAX_LIMIT: u64 = 50;

/// Total item count out of a `Content-Range` header value.
///
/// `"0-0/0"` is zero items, `"0-49/500"` is five hundred. A missing or
/// non-numeric total (`"0-0/*"`, RFC 7233's unknown-length form) is a hard
/// error: paging through a collection of unknown size would never terminate.
pub fn parse_content_range(raw: &str) -> Result<u64, ApiError> {
    let re = Regex::new(r"^(?P<min>\d+)\s?-\s?(?P<max>\d+)?\s?/?\s?(?P<total>\d+|\*)?").unwrap();
    let caps = re.captures(raw).ok_or_else(|| {
        ApiError::InvalidContentRange(format!(
            "Invalid Content-Range {raw}, not min-max/total as expected"
        ))
    })?;
    match caps.name("total") {
        Some(total) if total.as_str() != "*" => total.as_str().parse().map_err(|_| {
            ApiError::InvalidContentRange(format!("Invalid Content-Range {raw}, total out of range"))
        }),
        _ => Err(ApiError::InvalidContentRange(format!(
            "Invalid Content-Range {raw}, total is missing or not numeric"
        ))),
    }
}

pub fn page_count(total: u64, limit: u64) -> u64 {
    total.div_ceil(limit)
}

/// Fetch every page of a collection, in page order, pages numbered from 1.
/// A zero total issues no request at all.
pub async fn collect_pages<T, F, Fut>(total: u64, limit: u64, mut fetch: F) -> Result<Vec<T>, ApiError>
where
    F: FnMut(u64, u64) -> Fut,
    Fut: Future<Output = Result<Vec<T>, ApiError>>,
{
    let mut items = Vec::new();
    for page in 1..=page_count(total, limit) {
        items.extend(fetch(page, limit).await?);
    }
    Ok(items)
}

/// Same, for text pages (execution logs): concatenation in page order
/// reproduces the unpaginated byte sequence.
pub async fn collect_log_pages<F, Fut>(total: u64, limit: u64, mut fetch: F) -> Result<String, ApiError>
where
    F: FnMut(u64, u64) -> Fut,
    Fut: Future<Output = Result<String, ApiError>>,
{
    let mut logs = String::new();
    for page in 1..=page_count(total, limit) {
        logs.push_str(&fetch(page, limit).await?);
    }
    Ok(logs)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;

    #[test]
    fn content_range_totals() {
        assert_eq!(parse_content_range("0-0/0").unwrap(), 0);
        assert_eq!(parse_content_range("0-49/500").unwrap(), 500);
        assert_eq!(parse_content_range("0 - 0 / 3").unwrap(), 3);
        assert!(matches!(
            parse_content_range("0-0/*"),
            Err(ApiError::InvalidContentRange(_))
        ));
        assert!(matches!(
            parse_content_range("0-0"),
            Err(ApiError::InvalidContentRange(_))
        ));
        assert!(matches!(
            parse_content_range("items 0-0/0"),
            Err(ApiError::InvalidContentRange(_))
        ));
    }

    #[test]
    fn page_count_is_ceiling() {
        assert_eq!(page_count(0, 50), 0);
        assert_eq!(page_count(1, 50), 1);
        assert_eq!(page_count(50, 50), 1);
        assert_eq!(page_count(51, 50), 2);
        assert_eq!(page_count(500, 50), 10);
        assert_eq!(page_count(3, 1), 3);
    }

    #[tokio::test]
    async fn collects_every_page_in_order() {
        let calls = RefCell::new(Vec::new());
        let items = collect_pages(120, 50, |page, limit| {
            calls.borrow_mut().push((page, limit));
            async move {
                let count = if page == 3 { 20 } else { 50 };
                Ok((0..count).map(|i| (page, i)).collect())
            }
        })
        .await
        .unwrap();
        assert_eq!(*calls.borrow(), vec![(1, 50), (2, 50), (3, 50)]);
        assert_eq!(items.len(), 120);
        assert_eq!(items[0], (1, 0));
        assert_eq!(items[119], (3, 19));
    }

    #[tokio::test]
    async fn zero_total_issues_no_request() {
        let calls = RefCell::new(0u32);
        let items: Vec<u8> = collect_pages(0, 50, |_, _| {
            *calls.borrow_mut() += 1;
            async { Ok(Vec::new()) }
        })
        .await
        .unwrap();
        assert!(items.is_empty());
        assert_eq!(*calls.borrow(), 0);
    }

    #[tokio::test]
    async fn log_pages_concatenate_byte_exact() {
        let full = "line 1\nline 2\nline 3\nline 4\nline 5\n";
        let pages: Vec<String> = full
            .as_bytes()
            .chunks(14)
            .map(|c| String::from_utf8(c.to_vec()).unwrap())
            .collect();
        let total = pages.len() as u64;
        let pages_ref = &pages;
        let rebuilt = collect_log_pages(total, 1, |page, _| async move {
            Ok(pages_ref[(page - 1) as usize].clone())
        })
        .await
        .unwrap();
        assert_eq!(rebuilt, full);
    }

    #[tokio::test]
    async fn fetch_error_stops_the_walk() {
        let calls = RefCell::new(0u32);
        let res: Result<Vec<u8>, _> = collect_pages(150, 50, |page, _| {
            *calls.borrow_mut() += 1;
            async move {
                if page == 2 {
                    Err(ApiError::Transport("connection reset".to_string()))
                } else {
                    Ok(vec![0u8; 50])
                }
            }
        })
        .await;
        assert!(res.is_err());
        assert_eq!(*calls.borrow(), 2);
    }
}
