use crate::error::DataResult;
use crate::models::Property;

use super::{BaseRepository, ModelFilter};

pub type PropertyRepository = BaseRepository<Property>;

impl BaseRepository<Property> {
    pub async fn find_by_address_key(&self, address_key: &str) -> DataResult<Option<Property>> {
        let filter = ModelFilter::eq("addressKey", address_key);
        let mut matches = self.list_all(Some(&filter)).await?;
        matches.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(matches.into_iter().next())
    }
}
