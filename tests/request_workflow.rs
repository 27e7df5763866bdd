mod common;

use anyhow::Result;
use backoffice::error::{DataError, ErrorKind};
use backoffice::models::{
    Milestone, NewQuote, NewRequest, PaymentTerm, QuotePatch, QuoteStatus, RequestPatch,
    RequestStatus,
};
use backoffice::services::Services;
use common::TestApp;
use serde_json::json;

fn seed_parties(app: &TestApp) {
    app.backend.seed(
        "Contacts",
        json!({ "id": "agent-1", "email": "agent@example.com", "fullName": "Riley Agent" }),
    );
    app.backend.seed(
        "Contacts",
        json!({ "id": "owner-1", "email": "owner@example.com", "fullName": "Pat Owner" }),
    );
    app.backend.seed(
        "Properties",
        json!({
            "id": "prop-1",
            "propertyFullAddress": "9 Birch Rd, Madison, WI 53703",
            "addressKey": "9 birch rd, madison, wi 53703",
        }),
    );
    app.seed_executive("ae-1", "Morgan Lee", true, 1);
}

async fn create_request(services: &Services) -> Result<String> {
    let request = services
        .requests
        .create(NewRequest {
            agent_contact_id: Some("agent-1".to_string()),
            homeowner_contact_id: Some("owner-1".to_string()),
            address_id: Some("prop-1".to_string()),
            lead_source: Some("referral".to_string()),
            budget: Some("$120,000".to_string()),
            ..NewRequest::default()
        })
        .await?;
    Ok(request.id)
}

fn assert_validation_on(err: DataError, field: &str) {
    match err {
        DataError::Validation(errors) => assert!(
            errors.has_field(field),
            "expected a {field} error, got {errors}"
        ),
        other => panic!("expected validation error, got {other}"),
    }
}

#[tokio::test]
async fn status_moves_one_step_at_a_time() -> Result<()> {
    let app = TestApp::new();
    seed_parties(&app);
    let services = app.state.public_services();
    let id = create_request(&services).await?;

    let err = services
        .requests
        .transition_status(&id, RequestStatus::Closed)
        .await
        .unwrap_err();
    assert_validation_on(err, "status");

    let err = services
        .requests
        .transition_status(&id, RequestStatus::Assigned)
        .await
        .unwrap_err();
    assert_validation_on(err, "status");

    services.assignment.assign(&id, "ae-1").await?;
    services
        .requests
        .transition_status(&id, RequestStatus::InProgress)
        .await?;
    let quoted = services
        .requests
        .transition_status(&id, RequestStatus::Quoted)
        .await?;
    assert_eq!(quoted.status, RequestStatus::Quoted);

    let closed = services
        .requests
        .transition_status(&id, RequestStatus::Closed)
        .await?;
    assert_eq!(closed.status, RequestStatus::Closed);

    let reopened = services.requests.reopen(&id).await?;
    assert_eq!(reopened.status, RequestStatus::InProgress);
    Ok(())
}

#[tokio::test]
async fn new_requests_cannot_be_reopened() -> Result<()> {
    let app = TestApp::new();
    seed_parties(&app);
    let services = app.state.public_services();
    let id = create_request(&services).await?;

    let err = services.requests.reopen(&id).await.unwrap_err();
    assert_validation_on(err, "status");
    Ok(())
}

#[tokio::test]
async fn generic_update_cannot_change_status_or_assignee() -> Result<()> {
    let app = TestApp::new();
    seed_parties(&app);
    let services = app.state.public_services();
    let id = create_request(&services).await?;

    let err = services
        .requests
        .update(
            &id,
            &RequestPatch {
                status: Some(RequestStatus::Closed),
                ..RequestPatch::default()
            },
        )
        .await
        .unwrap_err();
    assert_validation_on(err, "status");

    let updated = services
        .requests
        .update(
            &id,
            &RequestPatch {
                message: Some("Please call after 5pm".to_string()),
                ..RequestPatch::default()
            },
        )
        .await?;
    assert_eq!(updated.message.as_deref(), Some("Please call after 5pm"));
    assert_eq!(updated.status, RequestStatus::New);
    Ok(())
}

#[tokio::test]
async fn create_scores_the_lead_and_checks_the_property() -> Result<()> {
    let app = TestApp::new();
    seed_parties(&app);
    let services = app.state.public_services();

    let id = create_request(&services).await?;
    let stored = services.requests.base().get(&id).await?;
    assert_eq!(stored.status, RequestStatus::New);
    assert_eq!(stored.lead_score, Some(80));

    let err = services
        .requests
        .create(NewRequest {
            agent_contact_id: Some("agent-1".to_string()),
            address_id: Some("prop-missing".to_string()),
            ..NewRequest::default()
        })
        .await
        .unwrap_err();
    assert_validation_on(err, "addressId");
    Ok(())
}

#[tokio::test]
async fn details_resolve_related_records() -> Result<()> {
    let app = TestApp::new();
    seed_parties(&app);
    let services = app.state.public_services();
    let id = create_request(&services).await?;

    let details = services.requests.details(&id).await?;
    assert_eq!(details.request.id, id);
    assert_eq!(details.agent.map(|c| c.email).as_deref(), Some("agent@example.com"));
    assert_eq!(details.homeowner.map(|c| c.email).as_deref(), Some("owner@example.com"));
    assert_eq!(
        details.property.map(|p| p.property_full_address).as_deref(),
        Some("9 Birch Rd, Madison, WI 53703")
    );

    let listed = services.requests.list_details(Some(RequestStatus::New)).await?;
    assert_eq!(listed.len(), 1);
    assert!(services
        .requests
        .list_details(Some(RequestStatus::Closed))
        .await?
        .is_empty());
    Ok(())
}

fn quote_input(request_id: &str) -> NewQuote {
    NewQuote {
        id: String::new(),
        request_id: Some(request_id.to_string()),
        project_id: None,
        contact_id: Some("owner-1".to_string()),
        title: Some("Kitchen remodel".to_string()),
        amount: 42_000.0,
        status: QuoteStatus::Signed,
        payment_terms: vec![
            PaymentTerm {
                name: "Deposit".to_string(),
                amount: 12_000.0,
                order: 1,
                paid: false,
            },
            PaymentTerm {
                name: "Completion".to_string(),
                amount: 30_000.0,
                order: 2,
                paid: false,
            },
        ],
        expires_at: None,
    }
}

#[tokio::test]
async fn quotes_follow_their_lifecycle_and_freeze_once_signed() -> Result<()> {
    let app = TestApp::new();
    seed_parties(&app);
    let services = app.state.public_services();
    let request_id = create_request(&services).await?;

    let quote = services.quotes.create(quote_input(&request_id)).await?;
    assert_eq!(quote.status, QuoteStatus::Draft);

    let err = services
        .quotes
        .transition(&quote.id, QuoteStatus::Signed)
        .await
        .unwrap_err();
    assert_validation_on(err, "status");

    let sent = services.quotes.transition(&quote.id, QuoteStatus::Sent).await?;
    assert!(sent.sent_at.is_some());
    services.quotes.transition(&quote.id, QuoteStatus::Viewed).await?;
    let signed = services.quotes.transition(&quote.id, QuoteStatus::Signed).await?;
    assert!(signed.signed_at.is_some());

    let err = services
        .quotes
        .update(
            &quote.id,
            &QuotePatch {
                amount: Some(1.0),
                ..QuotePatch::default()
            },
        )
        .await
        .unwrap_err();
    assert_validation_on(err, "status");

    let listed = services.quotes.list_for_request(&request_id).await?;
    assert_eq!(listed.len(), 1);
    Ok(())
}

#[tokio::test]
async fn payment_terms_must_be_strictly_ordered() -> Result<()> {
    let app = TestApp::new();
    seed_parties(&app);
    let services = app.state.public_services();
    let request_id = create_request(&services).await?;

    let mut input = quote_input(&request_id);
    input.payment_terms[1].order = 1;
    let err = services.quotes.create(input).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(app.backend.rows("Quotes").is_empty());
    Ok(())
}

#[tokio::test]
async fn signed_quote_starts_exactly_one_project() -> Result<()> {
    let app = TestApp::new();
    seed_parties(&app);
    let services = app.state.public_services();
    let request_id = create_request(&services).await?;
    let quote = services.quotes.create(quote_input(&request_id)).await?;

    let err = services
        .projects
        .create_from_quote(&quote.id)
        .await
        .unwrap_err();
    assert_validation_on(err, "quoteId");

    for status in [QuoteStatus::Sent, QuoteStatus::Viewed, QuoteStatus::Signed] {
        services.quotes.transition(&quote.id, status).await?;
    }
    let project = services.projects.create_from_quote(&quote.id).await?;
    assert_eq!(project.title, "Kitchen remodel");
    assert_eq!(project.payment_terms.len(), 2);
    assert_eq!(project.request_id.as_deref(), Some(request_id.as_str()));

    let again = services.projects.create_from_quote(&quote.id).await?;
    assert_eq!(again.id, project.id);
    assert_eq!(app.backend.rows("Projects").len(), 1);

    let linked = services.quotes.base().get(&quote.id).await?;
    assert_eq!(linked.project_id.as_deref(), Some(project.id.as_str()));
    Ok(())
}

#[tokio::test]
async fn milestones_stay_sorted_and_comments_append() -> Result<()> {
    let app = TestApp::new();
    seed_parties(&app);
    let services = app.state.public_services();
    let request_id = create_request(&services).await?;
    let quote = services.quotes.create(quote_input(&request_id)).await?;
    for status in [QuoteStatus::Sent, QuoteStatus::Viewed, QuoteStatus::Signed] {
        services.quotes.transition(&quote.id, status).await?;
    }
    let project = services.projects.create_from_quote(&quote.id).await?;

    let milestone = |name: &str, order| Milestone {
        name: name.to_string(),
        order,
        completed: false,
        due_date: None,
    };
    services
        .projects
        .add_milestone(&project.id, milestone("Cabinets", 2))
        .await?;
    let updated = services
        .projects
        .add_milestone(&project.id, milestone("Demolition", 1))
        .await?;
    let names: Vec<&str> = updated.milestones.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["Demolition", "Cabinets"]);

    let err = services
        .projects
        .add_milestone(&project.id, milestone("Duplicate", 2))
        .await
        .unwrap_err();
    assert_validation_on(err, "order");

    services
        .projects
        .add_comment(&project.id, "Morgan", "Site visit booked")
        .await?;
    let commented = services
        .projects
        .add_comment(&project.id, "Pat", " Thanks! ")
        .await?;
    assert_eq!(commented.comments.len(), 2);
    assert_eq!(commented.comments[1].body, "Thanks!");
    Ok(())
}
