use crate::error::DataResult;
use crate::models::AccountExecutive;

use super::BaseRepository;

pub type AssigneeRepository = BaseRepository<AccountExecutive>;

impl BaseRepository<AccountExecutive> {
    /// Every row, sentinel included, ordered by `order` then id.
    pub async fn list_pool(&self) -> DataResult<Vec<AccountExecutive>> {
        let mut pool = self.list_all(None).await?;
        pool.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.id.cmp(&b.id)));
        Ok(pool)
    }
}
