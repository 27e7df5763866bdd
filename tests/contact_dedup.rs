mod common;

use anyhow::Result;
use backoffice::error::ErrorKind;
use backoffice::models::{ContactPatch, ContactRole};
use backoffice::services::{ContactInput, PropertyInput, UpsertOutcome};
use common::TestApp;

#[tokio::test]
async fn email_case_and_whitespace_resolve_to_one_contact() -> Result<()> {
    let app = TestApp::new();
    let contacts = app.state.public_services().contacts;

    let first = contacts
        .upsert(&ContactInput {
            email: "A@x.com".to_string(),
            first_name: Some("Ana".to_string()),
            ..ContactInput::default()
        })
        .await?;
    assert_eq!(first.outcome, UpsertOutcome::Created);
    assert_eq!(first.entity.email, "a@x.com");

    let second = contacts
        .upsert(&ContactInput {
            email: "a@x.com ".to_string(),
            phone: Some("555".to_string()),
            ..ContactInput::default()
        })
        .await?;
    assert_eq!(second.outcome, UpsertOutcome::Merged);
    assert_eq!(second.entity.id, first.entity.id);

    let rows = app.backend.rows("Contacts");
    assert_eq!(rows.len(), 1);
    let stored = contacts.base().get(&first.entity.id).await?;
    assert_eq!(stored.phone.as_deref(), Some("555"));
    assert_eq!(stored.first_name.as_deref(), Some("Ana"));
    Ok(())
}

#[tokio::test]
async fn latest_submission_wins_for_supplied_fields() -> Result<()> {
    let app = TestApp::new();
    let contacts = app.state.public_services().contacts;

    contacts
        .upsert(&ContactInput {
            email: "lee@example.com".to_string(),
            full_name: Some("Lee Park".to_string()),
            company: Some("Harbor Homes".to_string()),
            role: Some(ContactRole::Agent),
            ..ContactInput::default()
        })
        .await?;
    let merged = contacts
        .upsert(&ContactInput {
            email: "LEE@example.com".to_string(),
            company: Some("Summit Realty".to_string()),
            ..ContactInput::default()
        })
        .await?
        .entity;

    assert_eq!(merged.company.as_deref(), Some("Summit Realty"));
    assert_eq!(merged.full_name.as_deref(), Some("Lee Park"));
    assert_eq!(merged.role, ContactRole::Agent);
    Ok(())
}

#[tokio::test]
async fn identical_resubmission_writes_nothing() -> Result<()> {
    let app = TestApp::new();
    let contacts = app.state.public_services().contacts;
    let input = ContactInput {
        email: "sam@example.com".to_string(),
        full_name: Some("Sam Ortiz".to_string()),
        ..ContactInput::default()
    };

    contacts.upsert(&input).await?;
    let again = contacts.upsert(&input).await?;

    assert_eq!(again.outcome, UpsertOutcome::Unchanged);
    assert_eq!(app.backend.calls("updateContacts"), 0);
    Ok(())
}

#[tokio::test]
async fn invalid_email_is_rejected_before_any_write() -> Result<()> {
    let app = TestApp::new();
    let err = app
        .state
        .public_services()
        .contacts
        .upsert(&ContactInput {
            email: "not-an-email".to_string(),
            ..ContactInput::default()
        })
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(app.backend.total_calls(), 0);
    Ok(())
}

#[tokio::test]
async fn email_change_cannot_take_another_contacts_address() -> Result<()> {
    let app = TestApp::new();
    let contacts = app.state.public_services().contacts;
    let first = contacts
        .upsert(&ContactInput {
            email: "one@example.com".to_string(),
            ..ContactInput::default()
        })
        .await?
        .entity;
    contacts
        .upsert(&ContactInput {
            email: "two@example.com".to_string(),
            ..ContactInput::default()
        })
        .await?;

    let err = contacts
        .update(
            &first.id,
            &ContactPatch {
                email: Some(" Two@Example.com".to_string()),
                ..ContactPatch::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let renamed = contacts
        .update(
            &first.id,
            &ContactPatch {
                email: Some("ONE.NEW@example.com".to_string()),
                ..ContactPatch::default()
            },
        )
        .await?;
    assert_eq!(renamed.email, "one.new@example.com");
    Ok(())
}

#[tokio::test]
async fn properties_dedup_on_normalized_address() -> Result<()> {
    let app = TestApp::new();
    let properties = app.state.public_services().properties;

    let first = properties
        .upsert(&PropertyInput {
            property_full_address: Some("12 Oak St, Springfield, IL 62701".to_string()),
            bedrooms: Some(3),
            ..PropertyInput::default()
        })
        .await?;
    assert_eq!(first.outcome, UpsertOutcome::Created);

    let second = properties
        .upsert(&PropertyInput {
            property_full_address: Some("12  oak st,  SPRINGFIELD, il 62701 ".to_string()),
            year_built: Some(1998),
            ..PropertyInput::default()
        })
        .await?;

    assert_eq!(second.entity.id, first.entity.id);
    assert_eq!(app.backend.rows("Properties").len(), 1);
    assert_eq!(second.entity.bedrooms, Some(3));
    assert_eq!(second.entity.year_built, Some(1998));
    Ok(())
}

#[tokio::test]
async fn address_parts_compose_the_full_address() -> Result<()> {
    let app = TestApp::new();
    let property = app
        .state
        .public_services()
        .properties
        .upsert(&PropertyInput {
            house_address: Some("4 Elm Ave".to_string()),
            city: Some("Dayton".to_string()),
            state: Some("OH".to_string()),
            zip: Some("45402".to_string()),
            ..PropertyInput::default()
        })
        .await?
        .entity;

    assert_eq!(property.property_full_address, "4 Elm Ave, Dayton, OH 45402");
    assert_eq!(property.address_key, "4 elm ave, dayton, oh 45402");
    Ok(())
}
