use crate::error::DataResult;
use crate::models::Quote;

use super::{BaseRepository, ModelFilter};

pub type QuoteRepository = BaseRepository<Quote>;

impl BaseRepository<Quote> {
    pub async fn list_for_request(&self, request_id: &str) -> DataResult<Vec<Quote>> {
        let filter = ModelFilter::eq("requestId", request_id);
        self.list_all(Some(&filter)).await
    }
}
