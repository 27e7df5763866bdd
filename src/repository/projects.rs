use crate::error::DataResult;
use crate::models::Project;

use super::{BaseRepository, ModelFilter};

pub type ProjectRepository = BaseRepository<Project>;

impl BaseRepository<Project> {
    pub async fn find_by_quote(&self, quote_id: &str) -> DataResult<Option<Project>> {
        let filter = ModelFilter::eq("quoteId", quote_id);
        Ok(self.list_all(Some(&filter)).await?.into_iter().next())
    }
}
