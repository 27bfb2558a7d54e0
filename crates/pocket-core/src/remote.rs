use std::future::Future;

use chrono::{DateTime, Utc};
use pocket_client::{ClientError, Credentials, FetchWindow, PocketClient, RawRecord};

/// The bookmarking service as the sync engine sees it: one fetch call.
pub trait RemoteClient {
    /// Records changed after `since`, or the newest `limit` records when
    /// `since` is `None`. `limit` is ignored when `since` is given.
    fn fetch(
        &self,
        credentials: &Credentials,
        limit: u32,
        since: Option<DateTime<Utc>>,
    ) -> impl Future<Output = Result<Vec<RawRecord>, ClientError>>;
}

/// The window sent to the service for a fetch.
pub fn fetch_window(limit: u32, since: Option<DateTime<Utc>>) -> FetchWindow {
    match since {
        Some(ts) => FetchWindow::Since(ts.timestamp()),
        None => FetchWindow::Newest { count: limit },
    }
}

impl RemoteClient for PocketClient {
    fn fetch(
        &self,
        credentials: &Credentials,
        limit: u32,
        since: Option<DateTime<Utc>>,
    ) -> impl Future<Output = Result<Vec<RawRecord>, ClientError>> {
        let window = fetch_window(limit, since);
        async move { self.fetch_items(credentials, &window).await }
    }
}
