/// End-to-end resolution tests against PostgreSQL
///
/// Covers identity claims, delegation windows, the task visibility union and
/// the single-task access gate.
/// Run with: DATABASE_URL=postgresql://... cargo test --test resolution_tests
mod common;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use taskline_shared::auth::authorization::{can_access_task, require_task_access, AuthzError};
use taskline_shared::auth::delegation::{
    create_delegation, list_active_delegations, revoke_delegation, DelegationError,
};
use taskline_shared::auth::identity::{find_or_invite, IdentityResolver};
use taskline_shared::auth::issuer::{IdentityAssertion, IdentityIssuer, IssuerError};
use taskline_shared::auth::role::{evaluate, EffectiveRole};
use taskline_shared::auth::super_admin::SuperAdminList;
use taskline_shared::models::account::{Account, AccountStatus, Role};
use taskline_shared::models::membership::{Membership, MembershipRole};
use taskline_shared::models::task_assignment::TaskAssignment;
use taskline_shared::models::task_collaborator::{CollaboratorAccess, TaskCollaborator};
use taskline_shared::models::tenant::DEFAULT_TENANT_ID;
use taskline_shared::visibility::{list_visible_tasks, AccessSource, TaskFilter};
use uuid::Uuid;

/// Issuer that knows no subjects
struct OfflineIssuer;

#[async_trait]
impl IdentityIssuer for OfflineIssuer {
    async fn verify(&self, _credential: &str) -> Result<IdentityAssertion, IssuerError> {
        Err(IssuerError::Invalid("offline".to_string()))
    }

    async fn lookup_subject(&self, _subject: &str) -> Result<Option<IdentityAssertion>, IssuerError> {
        Ok(None)
    }
}

fn assertion(subject: &str, email: Option<&str>, name: Option<&str>) -> IdentityAssertion {
    IdentityAssertion {
        subject: subject.to_string(),
        email: email.map(str::to_string),
        name: name.map(str::to_string),
        avatar_url: None,
    }
}

fn resolver(super_admins: &[&str]) -> IdentityResolver {
    IdentityResolver::new(SuperAdminList::new(super_admins.iter().copied()), DEFAULT_TENANT_ID)
}

#[tokio::test]
async fn test_ghost_claim_keeps_id_and_grants() {
    let Some(pool) = common::test_pool().await else {
        return;
    };
    let email = common::unique_email("bob");

    let mut conn = pool.acquire().await.unwrap();
    let (ghost, created) = find_or_invite(&mut conn, &email, Some("Bob".to_string()), None)
        .await
        .unwrap();
    drop(conn);
    assert!(created);
    assert!(ghost.is_ghost());

    let tenant = common::create_tenant(&pool).await;
    let owner = common::create_account(&pool, &common::unique_email("owner"), Role::User, None).await;
    common::join(&pool, tenant.id, owner.id, MembershipRole::Owner).await;
    let task = common::create_task(&pool, tenant.id, owner.id, "Shared").await;
    TaskCollaborator::upsert(&pool, task.id, ghost.id, CollaboratorAccess::Free, Some(owner.id))
        .await
        .unwrap();

    let subject = format!("sub-{}", Uuid::new_v4());
    let claimed = resolver(&[])
        .resolve(&pool, &OfflineIssuer, &assertion(&subject, Some(&email.to_uppercase()), Some("Robert")))
        .await
        .unwrap();

    assert_eq!(claimed.id, ghost.id);
    assert_eq!(claimed.auth_subject.as_deref(), Some(subject.as_str()));
    assert_eq!(claimed.status, AccountStatus::Active);
    assert_eq!(claimed.name.as_deref(), Some("Bob"));
    assert!(TaskCollaborator::exists(&pool, task.id, claimed.id).await.unwrap());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_first_logins_share_one_account() {
    let Some(pool) = common::test_pool().await else {
        return;
    };
    let resolver = Arc::new(resolver(&[]));

    for _ in 0..5 {
        let email = common::unique_email("racer");
        let login = Arc::new(assertion(&format!("sub-{}", Uuid::new_v4()), Some(&email), None));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let pool = pool.clone();
                let resolver = Arc::clone(&resolver);
                let login = Arc::clone(&login);
                tokio::spawn(async move { resolver.resolve(&pool, &OfflineIssuer, &login).await })
            })
            .collect();

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap().unwrap().id);
        }
        ids.dedup();
        assert_eq!(ids.len(), 1);

        let stored = Account::find_by_email(&pool, &email).await.unwrap().unwrap();
        assert_eq!(stored.id, ids[0]);
    }
}

#[tokio::test]
async fn test_resolve_is_idempotent() {
    let Some(pool) = common::test_pool().await else {
        return;
    };
    let email = common::unique_email("carol");
    let subject = format!("sub-{}", Uuid::new_v4());
    let resolver = resolver(&[]);
    let assertion = assertion(&subject, Some(&email), Some("Carol"));

    let first = resolver.resolve(&pool, &OfflineIssuer, &assertion).await.unwrap();
    let second = resolver.resolve(&pool, &OfflineIssuer, &assertion).await.unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(first.role, Role::User);
    assert_eq!(first.tenant_id, Some(DEFAULT_TENANT_ID));
    assert!(Membership::find(&pool, DEFAULT_TENANT_ID, first.id)
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn test_missing_email_uses_placeholder() {
    let Some(pool) = common::test_pool().await else {
        return;
    };
    let subject = format!("sub-{}", Uuid::new_v4());

    let account = resolver(&[])
        .resolve(&pool, &OfflineIssuer, &assertion(&subject, None, None))
        .await
        .unwrap();

    assert_eq!(account.email, format!("{}@placeholder", subject.to_lowercase()));
}

#[tokio::test]
async fn test_super_admin_is_provisioned_and_healed_as_god() {
    let Some(pool) = common::test_pool().await else {
        return;
    };
    let fresh = common::unique_email("root");
    let drifted = common::unique_email("ops");
    let resolver = resolver(&[fresh.as_str(), drifted.as_str()]);

    let account = resolver
        .resolve(&pool, &OfflineIssuer, &assertion(&format!("sub-{}", Uuid::new_v4()), Some(&fresh), None))
        .await
        .unwrap();
    assert_eq!(account.role, Role::God);

    let mut existing = common::create_account(&pool, &drifted, Role::User, None).await;
    let role = evaluate(&pool, &mut existing, resolver.super_admins(), Utc::now())
        .await
        .unwrap();
    assert_eq!(role.role, Role::God);

    let stored = Account::find_by_id(&pool, existing.id).await.unwrap().unwrap();
    assert_eq!(stored.role, Role::God);
}

#[tokio::test]
async fn test_delegation_window() {
    let Some(pool) = common::test_pool().await else {
        return;
    };
    let tenant = common::create_tenant(&pool).await;
    let admin = common::create_account(&pool, &common::unique_email("admin"), Role::Admin, Some(tenant.id)).await;
    let mut delegate = common::create_account(&pool, &common::unique_email("user"), Role::User, Some(tenant.id)).await;
    let admins = SuperAdminList::default();
    let t0 = Utc::now();

    let grant = create_delegation(
        &pool,
        admin.id,
        &EffectiveRole::stored(Role::Admin),
        delegate.id,
        tenant.id,
        1,
        t0,
    )
    .await
    .unwrap();
    assert_eq!(grant.role, Role::Admin);

    let during = evaluate(&pool, &mut delegate, &admins, t0 + Duration::hours(23))
        .await
        .unwrap();
    assert_eq!(during.role, Role::Admin);
    assert!(during.is_delegated);
    assert_eq!(during.expires_at, Some(grant.expires_at));

    let after = evaluate(&pool, &mut delegate, &admins, t0 + Duration::hours(25))
        .await
        .unwrap();
    assert_eq!(after, EffectiveRole::stored(Role::User));

    let active = list_active_delegations(&pool, tenant.id, t0 + Duration::hours(1))
        .await
        .unwrap();
    assert!(active.iter().any(|g| g.id == grant.id));
}

#[tokio::test]
async fn test_delegation_requires_elevated_role_and_positive_days() {
    let Some(pool) = common::test_pool().await else {
        return;
    };
    let tenant = common::create_tenant(&pool).await;
    let user = common::create_account(&pool, &common::unique_email("u"), Role::User, Some(tenant.id)).await;
    let other = common::create_account(&pool, &common::unique_email("v"), Role::User, Some(tenant.id)).await;

    let err = create_delegation(&pool, user.id, &EffectiveRole::stored(Role::User), other.id, tenant.id, 1, Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, DelegationError::Forbidden(_)));

    let err = create_delegation(&pool, user.id, &EffectiveRole::stored(Role::Admin), other.id, tenant.id, 0, Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, DelegationError::InvalidDuration(0)));

    let err = create_delegation(&pool, user.id, &EffectiveRole::stored(Role::God), Uuid::new_v4(), tenant.id, 1, Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, DelegationError::DelegateNotFound(_)));
}

#[tokio::test]
async fn test_revoke_twice_and_missing_grant() {
    let Some(pool) = common::test_pool().await else {
        return;
    };
    let tenant = common::create_tenant(&pool).await;
    let admin = common::create_account(&pool, &common::unique_email("admin"), Role::Admin, Some(tenant.id)).await;
    let mut delegate = common::create_account(&pool, &common::unique_email("user"), Role::User, Some(tenant.id)).await;
    let admin_role = EffectiveRole::stored(Role::Admin);
    let now = Utc::now();

    let grant = create_delegation(&pool, admin.id, &admin_role, delegate.id, tenant.id, 3, now)
        .await
        .unwrap();

    revoke_delegation(&pool, &admin_role, tenant.id, grant.id).await.unwrap();
    revoke_delegation(&pool, &admin_role, tenant.id, grant.id).await.unwrap();

    let role = evaluate(&pool, &mut delegate, &SuperAdminList::default(), now + Duration::hours(1))
        .await
        .unwrap();
    assert_eq!(role.role, Role::User);

    let err = revoke_delegation(&pool, &admin_role, tenant.id, Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, DelegationError::NotFound));
}

#[tokio::test]
async fn test_visibility_union_across_tenants() {
    let Some(pool) = common::test_pool().await else {
        return;
    };
    let tenant_a = common::create_tenant(&pool).await;
    let tenant_b = common::create_tenant(&pool).await;
    let alice = common::create_account(&pool, &common::unique_email("alice"), Role::User, None).await;
    let bob = common::create_account(&pool, &common::unique_email("bob"), Role::User, None).await;
    let dave = common::create_account(&pool, &common::unique_email("dave"), Role::User, None).await;
    let loner = common::create_account(&pool, &common::unique_email("loner"), Role::User, None).await;
    common::join(&pool, tenant_a.id, alice.id, MembershipRole::Owner).await;
    common::join(&pool, tenant_b.id, bob.id, MembershipRole::Member).await;

    let task = common::create_task(&pool, tenant_a.id, alice.id, "Plan launch").await;
    TaskCollaborator::upsert(&pool, task.id, bob.id, CollaboratorAccess::Paid, Some(alice.id))
        .await
        .unwrap();
    TaskAssignment::insert_many(&pool, task.id, &[dave.id]).await.unwrap();

    let user = EffectiveRole::stored(Role::User);
    let filter = TaskFilter::default();

    let for_alice = list_visible_tasks(&pool, alice.id, &user, &filter).await.unwrap();
    let seen = for_alice.iter().find(|t| t.task.id == task.id).unwrap();
    assert_eq!(seen.access_source, AccessSource::Owner);
    assert!(seen.is_owner);
    assert_eq!(seen.assigned_to, vec![dave.id]);

    let for_bob = list_visible_tasks(&pool, bob.id, &user, &filter).await.unwrap();
    let seen = for_bob.iter().find(|t| t.task.id == task.id).unwrap();
    assert_eq!(seen.access_source, AccessSource::CollaboratorPaid);
    assert!(!seen.is_owner);

    let for_dave = list_visible_tasks(&pool, dave.id, &user, &filter).await.unwrap();
    assert_eq!(for_dave.len(), 1);
    assert_eq!(for_dave[0].access_source, AccessSource::Assignee);

    let for_loner = list_visible_tasks(&pool, loner.id, &user, &filter).await.unwrap();
    assert!(for_loner.is_empty());

    let for_god = list_visible_tasks(&pool, loner.id, &EffectiveRole::stored(Role::God), &filter)
        .await
        .unwrap();
    let seen = for_god.iter().find(|t| t.task.id == task.id).unwrap();
    assert_eq!(seen.access_source, AccessSource::God);
    assert!(!seen.is_owner);
}

#[tokio::test]
async fn test_access_gate() {
    let Some(pool) = common::test_pool().await else {
        return;
    };
    let home = common::create_tenant(&pool).await;
    let elsewhere = common::create_tenant(&pool).await;
    let owner = common::create_account(&pool, &common::unique_email("owner"), Role::User, None).await;
    let guest = common::create_account(&pool, &common::unique_email("guest"), Role::User, None).await;
    let outsider = common::create_account(&pool, &common::unique_email("out"), Role::Admin, Some(elsewhere.id)).await;
    common::join(&pool, home.id, owner.id, MembershipRole::Owner).await;

    let task = common::create_task(&pool, home.id, owner.id, "Gate").await;
    TaskCollaborator::upsert(&pool, task.id, guest.id, CollaboratorAccess::Free, Some(owner.id))
        .await
        .unwrap();

    let user = EffectiveRole::stored(Role::User);
    assert!(can_access_task(&pool, owner.id, &user, task.id).await.unwrap());
    assert!(can_access_task(&pool, guest.id, &user, task.id).await.unwrap());
    assert!(!can_access_task(&pool, outsider.id, &EffectiveRole::stored(Role::Admin), task.id)
        .await
        .unwrap());
    assert!(can_access_task(&pool, outsider.id, &EffectiveRole::stored(Role::God), task.id)
        .await
        .unwrap());

    let err = can_access_task(&pool, owner.id, &user, Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, AuthzError::NotFound(_)));

    // A task outside the caller's view reads the same as a missing one
    let admin = EffectiveRole::stored(Role::Admin);
    let hidden = require_task_access(&pool, outsider.id, &admin, task.id).await.unwrap_err();
    assert!(matches!(hidden, AuthzError::NotFound("Task")));
    let missing = require_task_access(&pool, outsider.id, &admin, Uuid::new_v4()).await.unwrap_err();
    assert_eq!(hidden.to_string(), missing.to_string());

    // An assignee sees the task but cannot change it
    TaskAssignment::insert_many(&pool, task.id, &[outsider.id]).await.unwrap();
    let denied = require_task_access(&pool, outsider.id, &admin, task.id).await.unwrap_err();
    assert!(matches!(denied, AuthzError::Forbidden(_)));

    require_task_access(&pool, guest.id, &user, task.id).await.unwrap();
}
