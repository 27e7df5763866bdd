use chrono::Utc;
use tracing::{info, warn};

use crate::error::{DataError, DataResult, ValidationErrors};
use crate::events::{BusinessEvent, EventBus};
use crate::models::{
    new_id, Milestone, NewProject, Project, ProjectComment, ProjectPatch, ProjectStatus,
    QuotePatch, QuoteStatus,
};
use crate::repository::quotes::QuoteRepository;
use crate::repository::Repositories;
use crate::validation::{check_id, require};

use super::base::{BaseService, Validate};
use super::check_strictly_increasing;
use super::quotes::check_payment_terms;

const MAX_COMMENT_LEN: usize = 4000;

fn check_milestones(errors: &mut ValidationErrors, milestones: &[Milestone]) {
    for (index, milestone) in milestones.iter().enumerate() {
        if milestone.name.trim().is_empty() {
            errors.add(format!("milestones[{index}].name"), "is required");
        }
    }
    check_strictly_increasing(
        errors,
        "milestones",
        milestones.iter().map(|milestone| milestone.order),
    );
}

impl Validate for NewProject {
    fn validate(&self) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        require(&mut errors, "title", Some(self.title.as_str()));
        check_id(&mut errors, "quoteId", self.quote_id.as_deref());
        check_id(&mut errors, "requestId", self.request_id.as_deref());
        check_id(&mut errors, "contactId", self.contact_id.as_deref());
        check_id(&mut errors, "addressId", self.address_id.as_deref());
        check_milestones(&mut errors, &self.milestones);
        check_payment_terms(&mut errors, &self.payment_terms);
        errors
    }
}

impl Validate for ProjectPatch {
    fn validate(&self) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        if let Some(title) = &self.title {
            require(&mut errors, "title", Some(title.as_str()));
        }
        if self.comments.is_some() {
            errors.add("comments", "comments are append-only");
        }
        if let Some(milestones) = &self.milestones {
            check_milestones(&mut errors, milestones);
        }
        if let Some(terms) = &self.payment_terms {
            check_payment_terms(&mut errors, terms);
        }
        errors
    }
}

#[derive(Clone)]
pub struct ProjectService {
    base: BaseService<Project>,
    quotes: QuoteRepository,
}

impl ProjectService {
    pub fn new(repositories: &Repositories, events: EventBus) -> Self {
        Self {
            base: BaseService::new(repositories.projects.clone(), events),
            quotes: repositories.quotes.clone(),
        }
    }

    pub fn base(&self) -> &BaseService<Project> {
        &self.base
    }

    pub async fn create(&self, mut input: NewProject) -> DataResult<Project> {
        if input.id.is_empty() {
            input.id = new_id();
        }
        self.base.create(&input).await
    }

    pub async fn update(&self, id: &str, patch: &ProjectPatch) -> DataResult<Project> {
        self.base.update(id, patch).await
    }

    /// Starts the engagement for a signed quote. Calling it again for the same
    /// quote returns the project that already exists.
    pub async fn create_from_quote(&self, quote_id: &str) -> DataResult<Project> {
        let quote = match self.quotes.find(quote_id).await? {
            Some(quote) => quote,
            None => return Err(DataError::invalid("quoteId", "quote does not exist")),
        };
        if quote.status != QuoteStatus::Signed {
            return Err(DataError::invalid(
                "quoteId",
                format!("only signed quotes can start a project (quote is {})", quote.status),
            ));
        }
        if let Some(existing) = self.base.repository().find_by_quote(quote_id).await? {
            warn!(quote_id, project_id = %existing.id, "project already exists for quote");
            return Ok(existing);
        }

        let input = NewProject {
            id: new_id(),
            title: quote
                .title
                .clone()
                .filter(|title| !title.trim().is_empty())
                .unwrap_or_else(|| format!("Project for quote {quote_id}")),
            status: ProjectStatus::Active,
            quote_id: Some(quote.id.clone()),
            request_id: quote.request_id.clone(),
            contact_id: quote.contact_id.clone(),
            address_id: None,
            milestones: Vec::new(),
            payment_terms: quote.payment_terms.clone(),
        };
        let project = self.base.create(&input).await?;

        let link = QuotePatch {
            project_id: Some(project.id.clone()),
            ..QuotePatch::default()
        };
        self.quotes.update(quote_id, &link).await?;
        info!(quote_id, project_id = %project.id, "project started from signed quote");
        Ok(project)
    }

    pub async fn add_milestone(&self, project_id: &str, milestone: Milestone) -> DataResult<Project> {
        let mut errors = ValidationErrors::new();
        require(&mut errors, "name", Some(milestone.name.as_str()));
        errors.into_result()?;

        let project = self.base.get(project_id).await?;
        if project.milestones.iter().any(|m| m.order == milestone.order) {
            return Err(DataError::invalid(
                "order",
                format!("a milestone with order {} already exists", milestone.order),
            ));
        }

        let order = milestone.order;
        let mut milestones = project.milestones;
        milestones.push(milestone);
        milestones.sort_by_key(|m| m.order);
        let patch = ProjectPatch {
            milestones: Some(milestones),
            ..ProjectPatch::default()
        };
        let updated = self.base.update(project_id, &patch).await?;
        self.base.events().emit(BusinessEvent::ProjectMilestoneAdded {
            project_id: project_id.to_string(),
            order,
        });
        Ok(updated)
    }

    pub async fn add_comment(&self, project_id: &str, author: &str, body: &str) -> DataResult<Project> {
        let mut errors = ValidationErrors::new();
        require(&mut errors, "author", Some(author));
        require(&mut errors, "body", Some(body));
        if body.chars().count() > MAX_COMMENT_LEN {
            errors.add("body", format!("must be at most {MAX_COMMENT_LEN} characters"));
        }
        errors.into_result()?;

        let project = self.base.get(project_id).await?;
        let mut comments = project.comments;
        comments.push(ProjectComment {
            author: author.trim().to_string(),
            body: body.trim().to_string(),
            created_at: Utc::now(),
        });
        let patch = ProjectPatch {
            comments: Some(comments),
            ..ProjectPatch::default()
        };
        let updated = self.base.persist_update(project_id, &patch).await?;
        self.base.events().emit(BusinessEvent::ProjectCommentAdded {
            project_id: project_id.to_string(),
        });
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn milestone(name: &str, order: i32) -> Milestone {
        Milestone {
            name: name.into(),
            order,
            completed: false,
            due_date: None,
        }
    }

    #[test]
    fn milestones_must_be_strictly_increasing() {
        let patch = ProjectPatch {
            milestones: Some(vec![milestone("Demo", 1), milestone("Framing", 1)]),
            ..ProjectPatch::default()
        };
        assert!(patch.validate().has_field("milestones"));

        let patch = ProjectPatch {
            milestones: Some(vec![milestone("Demo", 1), milestone("Framing", 3)]),
            ..ProjectPatch::default()
        };
        assert!(patch.validate().is_empty());
    }

    #[test]
    fn comments_cannot_be_rewritten_through_update() {
        let patch = ProjectPatch {
            comments: Some(Vec::new()),
            ..ProjectPatch::default()
        };
        assert!(patch.validate().has_field("comments"));
    }
}
