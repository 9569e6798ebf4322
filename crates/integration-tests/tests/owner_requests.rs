//! Integration tests for owner upgrade requests and their admin review.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use minefornow_core::{UserId, UserRole};
use minefornow_integration_tests::StubApi;
use minefornow_session::role_gate::{self, DashboardTab, OwnerCallToAction};
use minefornow_session::{
    ApiClient, MemoryStorage, OwnerUpgradeForm, ProfileUpdate, SessionContext, SessionError,
};
use secrecy::SecretString;

struct Fixture {
    stub: StubApi,
    renter_id: UserId,
}

async fn fixture() -> Fixture {
    let stub = StubApi::start().await.unwrap();
    let renter_id = stub.add_user("Rui Costa", "rui@example.com", "Secret123", "RENTER");
    stub.add_user("Admin", "admin@example.com", "Admin1234", "ADMIN");
    Fixture { stub, renter_id }
}

async fn signed_in(stub: &StubApi, email: &str, password: &str) -> SessionContext<ApiClient> {
    let ctx = stub.session(Arc::new(MemoryStorage::new())).unwrap();
    ctx.login(email, &SecretString::from(password.to_string()))
        .await
        .unwrap();
    ctx
}

fn upgrade_form() -> OwnerUpgradeForm {
    OwnerUpgradeForm {
        phone: "912345678".to_string(),
        citizen_card_number: "12345678".to_string(),
        driving_license: "AB123456".to_string(),
        motivation: "O meu carro passa a semana parado".to_string(),
    }
}

// =============================================================================
// Owner upgrade
// =============================================================================

#[tokio::test]
async fn test_upgrade_request_moves_role_to_pending() {
    let f = fixture().await;
    let renter = signed_in(&f.stub, "rui@example.com", "Secret123").await;

    let user = renter.request_owner_upgrade(&upgrade_form()).await.unwrap();

    assert_eq!(user.role, UserRole::PendingOwner);
    assert_eq!(renter.current_user().unwrap().role, UserRole::PendingOwner);
    assert_eq!(
        role_gate::owner_call_to_action(Some(&user)),
        OwnerCallToAction::PendingReview
    );
    assert_eq!(
        role_gate::dashboard_tabs(Some(&user)),
        vec![DashboardTab::Reservations, DashboardTab::Settings]
    );
}

#[tokio::test]
async fn test_upgrade_request_with_bad_license_never_reaches_server() {
    let f = fixture().await;
    let renter = signed_in(&f.stub, "rui@example.com", "Secret123").await;

    let form = OwnerUpgradeForm {
        driving_license: "12345".to_string(),
        ..upgrade_form()
    };
    let err = renter.request_owner_upgrade(&form).await.unwrap_err();

    assert!(matches!(err, SessionError::Validation(_)));
    assert_eq!(f.stub.role_of("rui@example.com").as_deref(), Some("RENTER"));
}

#[tokio::test]
async fn test_duplicate_upgrade_surfaces_conflict_message() {
    let f = fixture().await;
    let renter = signed_in(&f.stub, "rui@example.com", "Secret123").await;
    let other_device = signed_in(&f.stub, "rui@example.com", "Secret123").await;

    renter.request_owner_upgrade(&upgrade_form()).await.unwrap();
    // The second device still believes the user is a renter.
    let err = other_device
        .request_owner_upgrade(&upgrade_form())
        .await
        .unwrap_err();

    assert!(matches!(&err, SessionError::Validation(m) if m == "Pedido já submetido"));
    assert!(other_device.is_authenticated());
}

#[tokio::test]
async fn test_profile_update_keeps_identity() {
    let f = fixture().await;
    let renter = signed_in(&f.stub, "rui@example.com", "Secret123").await;

    let user = renter
        .update_profile(&ProfileUpdate {
            phone: Some("912345678".to_string()),
            driving_license: Some("AB123456".to_string()),
        })
        .await
        .unwrap();

    assert_eq!(user.id, f.renter_id);
    assert_eq!(user.role, UserRole::Renter);
}

// =============================================================================
// Admin review
// =============================================================================

#[tokio::test]
async fn test_admin_approves_request() {
    let f = fixture().await;
    let renter = signed_in(&f.stub, "rui@example.com", "Secret123").await;
    renter.request_owner_upgrade(&upgrade_form()).await.unwrap();

    let admin = signed_in(&f.stub, "admin@example.com", "Admin1234").await;
    let pending = admin.pending_owner_requests().await.unwrap();

    assert_eq!(pending.len(), 1);
    let request = pending.first().unwrap();
    assert_eq!(request.id, f.renter_id);
    assert_eq!(request.driving_license.as_deref(), Some("AB123456"));
    assert_eq!(request.role, Some(UserRole::PendingOwner));

    let message = admin.approve_owner_request(f.renter_id).await.unwrap();
    assert_eq!(message, "Pedido aprovado");
    assert!(admin.pending_owner_requests().await.unwrap().is_empty());

    let user = renter.refresh().await.unwrap();
    assert_eq!(user.role, UserRole::Owner);
    assert_eq!(role_gate::default_tab(Some(&user)), Some(DashboardTab::Cars));
}

#[tokio::test]
async fn test_admin_rejects_request() {
    let f = fixture().await;
    let renter = signed_in(&f.stub, "rui@example.com", "Secret123").await;
    renter.request_owner_upgrade(&upgrade_form()).await.unwrap();

    let admin = signed_in(&f.stub, "admin@example.com", "Admin1234").await;
    admin.reject_owner_request(f.renter_id).await.unwrap();

    assert_eq!(renter.refresh().await.unwrap().role, UserRole::Renter);
}

#[tokio::test]
async fn test_review_of_unknown_request_is_validation_error() {
    let f = fixture().await;
    let admin = signed_in(&f.stub, "admin@example.com", "Admin1234").await;

    let err = admin
        .approve_owner_request(UserId::new(999))
        .await
        .unwrap_err();

    assert!(matches!(err, SessionError::Validation(_)));
    assert!(admin.is_authenticated());
}

#[tokio::test]
async fn test_renter_cannot_review_requests() {
    let f = fixture().await;
    let renter = signed_in(&f.stub, "rui@example.com", "Secret123").await;

    let err = renter.pending_owner_requests().await.unwrap_err();

    assert!(matches!(err, SessionError::Forbidden(_)));
    assert!(renter.is_authenticated());
}
