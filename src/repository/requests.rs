use serde::Serialize;

use crate::error::DataResult;
use crate::models::{Contact, Property, Request, RequestStatus};

use super::{resolve_references, BaseRepository, ModelFilter};
use super::{contacts::ContactRepository, properties::PropertyRepository};

pub type RequestRepository = BaseRepository<Request>;

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestDetails {
    #[serde(flatten)]
    pub request: Request,
    pub agent: Option<Contact>,
    pub homeowner: Option<Contact>,
    pub property: Option<Property>,
}

impl BaseRepository<Request> {
    pub async fn list_by_status(&self, status: RequestStatus) -> DataResult<Vec<Request>> {
        let filter = ModelFilter::eq("status", status.as_str());
        self.list_all(Some(&filter)).await
    }

    pub async fn list_by_assignee(&self, assignee_id: &str) -> DataResult<Vec<Request>> {
        let filter = ModelFilter::eq("assignedTo", assignee_id);
        self.list_all(Some(&filter)).await
    }

    /// Attaches contacts and properties with one batched lookup per related model.
    pub async fn with_relations(
        &self,
        requests: Vec<Request>,
        contacts: &ContactRepository,
        properties: &PropertyRepository,
    ) -> DataResult<Vec<RequestDetails>> {
        let contact_map = resolve_references(contacts, &requests, |request| {
            request
                .agent_contact_id
                .iter()
                .chain(request.homeowner_contact_id.iter())
                .cloned()
                .collect()
        })
        .await?;
        let property_map = resolve_references(properties, &requests, |request| {
            request.address_id.iter().cloned().collect()
        })
        .await?;

        Ok(requests
            .into_iter()
            .map(|request| {
                let lookup_contact = |id: &Option<String>| {
                    id.as_ref().and_then(|id| contact_map.get(id)).cloned()
                };
                RequestDetails {
                    agent: lookup_contact(&request.agent_contact_id),
                    homeowner: lookup_contact(&request.homeowner_contact_id),
                    property: request
                        .address_id
                        .as_ref()
                        .and_then(|id| property_map.get(id))
                        .cloned(),
                    request,
                }
            })
            .collect())
    }
}
