/// Query arguments for one endpoint call.
///
/// The iterator keeps a copy of the original arguments and replays them with
/// an updated cursor for every follow-up page.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListParams {
    pub names: Vec<String>,
    pub ids: Vec<String>,
    pub filter: Option<String>,
    pub sort: Vec<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub continuation_token: Option<String>,
    pub total_item_count: Option<bool>,
    /// Correlation id sent as `X-Request-ID`; generated when absent.
    pub x_request_id: Option<String>,
    /// Endpoint-specific parameters passed through verbatim.
    pub extra: Vec<(String, String)>,
}

impl ListParams {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.names = names.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ids = ids.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Sort keys, e.g. `name` or `size-`.
    ///
    /// Sorted queries page by offset because targets do not hand out
    /// continuation tokens for them.
    #[must_use]
    pub fn sort<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sort = keys.into_iter().map(Into::into).collect();
        self
    }

    /// Caps the total number of items the iterator yields.
    #[must_use]
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    #[must_use]
    pub fn continuation_token(mut self, token: impl Into<String>) -> Self {
        self.continuation_token = Some(token.into());
        self
    }

    /// Asks the target to report `total_item_count`.
    #[must_use]
    pub fn total_item_count(mut self, enabled: bool) -> Self {
        self.total_item_count = Some(enabled);
        self
    }

    #[must_use]
    pub fn x_request_id(mut self, id: impl Into<String>) -> Self {
        self.x_request_id = Some(id.into());
        self
    }

    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.push((key.into(), value.into()));
        self
    }

    pub(crate) fn is_sorted(&self) -> bool {
        !self.sort.is_empty()
    }

    /// Renders the arguments as query pairs. List values are comma-joined and
    /// `x_request_id` is left out since it travels as a header.
    pub(crate) fn to_query(&self) -> Vec<(String, String)> {
        let mut query = Vec::new();
        if !self.names.is_empty() {
            query.push(("names".to_owned(), self.names.join(",")));
        }
        if !self.ids.is_empty() {
            query.push(("ids".to_owned(), self.ids.join(",")));
        }
        if let Some(filter) = &self.filter {
            query.push(("filter".to_owned(), filter.clone()));
        }
        if !self.sort.is_empty() {
            query.push(("sort".to_owned(), self.sort.join(",")));
        }
        if let Some(limit) = self.limit {
            query.push(("limit".to_owned(), limit.to_string()));
        }
        if let Some(offset) = self.offset {
            query.push(("offset".to_owned(), offset.to_string()));
        }
        if let Some(token) = &self.continuation_token {
            query.push(("continuation_token".to_owned(), token.clone()));
        }
        if let Some(total) = self.total_item_count {
            query.push(("total_item_count".to_owned(), total.to_string()));
        }
        query.extend(self.extra.iter().cloned());
        query
    }
}
