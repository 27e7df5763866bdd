use crate::error::DataResult;
use crate::models::Contact;

use super::{BaseRepository, ModelFilter};

pub type ContactRepository = BaseRepository<Contact>;

impl BaseRepository<Contact> {
    /// Expects an already-normalized email. Legacy duplicates resolve to the oldest row.
    pub async fn find_by_email(&self, email: &str) -> DataResult<Option<Contact>> {
        let filter = ModelFilter::eq("email", email);
        let mut matches = self.list_all(Some(&filter)).await?;
        matches.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(matches.into_iter().next())
    }
}
