use serde::Serialize;

use crate::constants::MAX_PAGE_SIZE;

use super::{
    error::{Error, HtmlError},
    filters::QueryParams,
};

/// Page-number pagination read from `?page=N&limit=M`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
}

impl Pagination {
    pub fn from_params(params: &QueryParams, default_limit: i64) -> Result<Self, Error> {
        let limit = params
            .get("limit")
            .and_then(|limit| limit.parse::<i64>().ok())
            .filter(|limit| *limit >= 1)
            .unwrap_or(default_limit)
            .min(MAX_PAGE_SIZE);

        let page = match params.get("page") {
            Some(page) => page.parse::<i64>().ok(),
            None => Some(1),
        };

        // the offset must fit in a BIGINT
        match page {
            Some(page)
                if page >= 1 && (page - 1).checked_mul(limit).is_some() =>
            {
                Ok(Self { page, limit })
            }
            _ => Err(HtmlError::NotFound.new("Invalid page.")),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.limit
    }
}

#[derive(Serialize, Debug)]
pub struct PageContext<T> {
    pub count: i64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<T> PageContext<T> {
    /// `total_rows` is the size of the whole listing, usually read from a
    /// `COUNT(*) OVER()` column of the first row.
    pub fn from_rows(
        rows: Vec<T>,
        total_rows: i64,
        pagination: Pagination,
        params: &QueryParams,
        base_path: &str,
    ) -> Result<Self, Error> {
        if rows.is_empty() && pagination.page > 1 {
            return Err(HtmlError::NotFound.new("Invalid page."));
        }

        let page_count = (total_rows + pagination.limit - 1) / pagination.limit;

        let link = |page: i64| {
            let params = params
                .with("page", &page.to_string())
                .with("limit", &pagination.limit.to_string());
            format!("{base_path}?{}", params.to_query_string())
        };

        let next = (pagination.page < page_count).then(|| link(pagination.page + 1));
        let previous = (pagination.page > 1).then(|| link(pagination.page - 1));

        Ok(Self {
            count: total_rows,
            next,
            previous,
            results: rows,
        })
    }

    pub fn map<U, F>(self, f: F) -> PageContext<U>
    where
        F: FnMut(T) -> U,
    {
        PageContext {
            count: self.count,
            next: self.next,
            previous: self.previous,
            results: self.results.into_iter().map(f).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> QueryParams {
        QueryParams::new(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn defaults_to_first_page() {
        let pagination = Pagination::from_params(&params(&[]), 6).unwrap();
        assert_eq!(pagination, Pagination { page: 1, limit: 6 });
        assert_eq!(pagination.offset(), 0);
    }

    #[test]
    fn offset_follows_page_and_limit() {
        let pagination =
            Pagination::from_params(&params(&[("page", "3"), ("limit", "10")]), 6).unwrap();
        assert_eq!(pagination.offset(), 20);
    }

    #[test]
    fn invalid_page_is_not_found() {
        assert!(Pagination::from_params(&params(&[("page", "0")]), 6).is_err());
        assert!(Pagination::from_params(&params(&[("page", "abc")]), 6).is_err());
    }

    #[test]
    fn page_with_overflowing_offset_is_not_found() {
        let page = i64::MAX.to_string();
        let error = Pagination::from_params(&params(&[("page", page.as_str())]), 6).unwrap_err();
        assert_eq!(error.code, warp::http::StatusCode::NOT_FOUND);
        assert_eq!(error.info.as_deref(), Some("Invalid page."));

        let last = (i64::MAX / 6 + 1).to_string();
        let pagination = Pagination::from_params(&params(&[("page", last.as_str())]), 6).unwrap();
        assert!(pagination.offset() >= 0);
    }

    #[test]
    fn invalid_limit_falls_back_to_default() {
        let pagination = Pagination::from_params(&params(&[("limit", "-1")]), 6).unwrap();
        assert_eq!(pagination.limit, 6);
        let pagination = Pagination::from_params(&params(&[("limit", "100000")]), 6).unwrap();
        assert_eq!(pagination.limit, MAX_PAGE_SIZE);
    }

    #[test]
    fn links_keep_filters() {
        let query = params(&[("tags", "hot"), ("page", "2"), ("limit", "2")]);
        let pagination = Pagination::from_params(&query, 6).unwrap();

        let page =
            PageContext::from_rows(vec![3, 4], 5, pagination, &query, "/api/recipes/").unwrap();

        assert_eq!(page.count, 5);
        assert_eq!(
            page.next.as_deref(),
            Some("/api/recipes/?tags=hot&page=3&limit=2")
        );
        assert_eq!(
            page.previous.as_deref(),
            Some("/api/recipes/?tags=hot&page=1&limit=2")
        );
    }

    #[test]
    fn last_page_has_no_next() {
        let query = params(&[]);
        let pagination = Pagination { page: 1, limit: 6 };
        let page = PageContext::from_rows(vec![1, 2], 2, pagination, &query, "/api/users/").unwrap();
        assert!(page.next.is_none());
        assert!(page.previous.is_none());
    }

    #[test]
    fn empty_page_past_the_end_is_not_found() {
        let query = params(&[]);
        let pagination = Pagination { page: 4, limit: 6 };
        assert!(PageContext::<i32>::from_rows(vec![], 0, pagination, &query, "/").is_err());
    }

    #[test]
    fn empty_first_page_is_allowed() {
        let query = params(&[]);
        let page =
            PageContext::<i32>::from_rows(vec![], 0, Pagination { page: 1, limit: 6 }, &query, "/")
                .unwrap();
        assert_eq!(page.count, 0);
        assert!(page.results.is_empty());
    }
}
