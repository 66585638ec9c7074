//! End-to-end flows over the in-memory store: login, refresh, revocation,
//! token-version invalidation, and federated reconciliation.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use token_codec::Claims;
use tower::ServiceExt;

use crate::error::AuthError;
use crate::models::{ChangePasswordRequest, LoginRequest, RegisterRequest, Role};
use crate::routes::build_router;
use crate::services::IdentityReconciler;
use crate::tests::fixtures::{
    app_state, google_callback, service_stack, OTHER_STRONG_PASSWORD, STRONG_PASSWORD,
};

fn login_request(identifier: &str, password: &str) -> LoginRequest {
    LoginRequest {
        identifier: identifier.to_string(),
        password: password.to_string(),
    }
}

#[tokio::test]
async fn test_login_issues_validatable_access_token() {
    // GIVEN: An account with the USER role
    let (store, tokens, _, auth) = service_stack();
    store.add_local_account("alice", "alice@example.com", STRONG_PASSWORD);

    // WHEN: She logs in and the access token is validated
    let (_, pair) = auth
        .login(&login_request("alice", STRONG_PASSWORD))
        .await
        .unwrap();
    let claims = tokens.validate_and_extract(&pair.access_token).await.unwrap();

    // THEN: The claims carry her subject, roles, and version snapshot
    assert_eq!(claims.sub, "alice");
    assert_eq!(claims.roles, Some(vec!["USER".to_string()]));
    assert_eq!(claims.tv, Some(0));
    assert_eq!(pair.token_type, "Bearer");
    assert_eq!(pair.expires_in, 900);
}

#[tokio::test]
async fn test_login_accepts_email_as_identifier() {
    let (store, _, _, auth) = service_stack();
    store.add_local_account("alice", "alice@example.com", STRONG_PASSWORD);

    let result = auth
        .login(&login_request("alice@example.com", STRONG_PASSWORD))
        .await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_login_failure_modes() {
    let (store, _, _, auth) = service_stack();
    store.add_local_account("alice", "alice@example.com", STRONG_PASSWORD);

    // Unknown identifier and wrong password are distinct variants internally.
    let unknown = auth.login(&login_request("nobody", STRONG_PASSWORD)).await;
    assert!(matches!(unknown, Err(AuthError::AccountNotFound)));

    let wrong = auth.login(&login_request("alice", "Wr0ng!Entirely")).await;
    assert!(matches!(wrong, Err(AuthError::BadCredentials)));
}

#[tokio::test]
async fn test_federated_only_account_rejects_password_login() {
    // GIVEN: An account created through a provider, so no password hash
    let (store, _, _, auth) = service_stack();
    let reconciler = IdentityReconciler::new(store.clone());
    reconciler
        .reconcile(&google_callback("g-100", "fed@example.com"))
        .await
        .unwrap();

    // THEN: A password login against it cannot succeed
    let result = auth
        .login(&login_request("fed@example.com", STRONG_PASSWORD))
        .await;
    assert!(matches!(result, Err(AuthError::BadCredentials)));
}

#[tokio::test]
async fn test_register_then_login_round_trip() {
    let (_, _, _, auth) = service_stack();

    let request = RegisterRequest {
        email: "bob@example.com".to_string(),
        username: "bob".to_string(),
        password: STRONG_PASSWORD.to_string(),
    };
    let (identity, _) = auth.register(&request).await.unwrap();
    assert_eq!(identity.role_names(), vec!["USER".to_string()]);

    let result = auth.login(&login_request("bob", STRONG_PASSWORD)).await;
    assert!(result.is_ok());

    // Same email again is a conflict, not a second account.
    let duplicate = RegisterRequest {
        email: "bob@example.com".to_string(),
        username: "bob2".to_string(),
        password: STRONG_PASSWORD.to_string(),
    };
    assert!(matches!(
        auth.register(&duplicate).await,
        Err(AuthError::EmailTaken)
    ));
}

#[tokio::test]
async fn test_version_bump_invalidates_outstanding_access_tokens() {
    // GIVEN: A logged-in account holding a valid access token
    let (store, tokens, _, auth) = service_stack();
    store.add_local_account("alice", "alice@example.com", STRONG_PASSWORD);
    let (_, pair) = auth
        .login(&login_request("alice", STRONG_PASSWORD))
        .await
        .unwrap();
    assert!(tokens.validate_and_extract(&pair.access_token).await.is_ok());

    // WHEN: Any credential-affecting change bumps the version
    store.bump_token_version("alice");

    // THEN: The token's snapshot no longer matches
    let result = tokens.validate_and_extract(&pair.access_token).await;
    assert!(matches!(result, Err(AuthError::TokenStaleVersion)));
}

#[tokio::test]
async fn test_logout_revokes_access_but_not_refresh() {
    // GIVEN: A logged-in account
    let (store, _, revocations, auth) = service_stack();
    store.add_local_account("alice", "alice@example.com", STRONG_PASSWORD);
    let (_, pair) = auth
        .login(&login_request("alice", STRONG_PASSWORD))
        .await
        .unwrap();

    // WHEN: She logs out with her access token
    auth.logout(&pair.access_token).await.unwrap();

    // THEN: The access token sits in the revocation store for its lifetime,
    // while the refresh token still mints fresh access tokens
    assert!(revocations.is_revoked(&pair.access_token));
    assert!(!revocations.is_revoked(&pair.refresh_token));
    assert!(auth.refresh(&pair.refresh_token).await.is_ok());
}

#[tokio::test]
async fn test_logout_with_unverifiable_token_is_silent() {
    let (_, _, revocations, auth) = service_stack();

    // Garbage never enters the store, and the caller sees success either way.
    auth.logout("definitely-not-a-token").await.unwrap();
    assert!(revocations.is_empty());
}

#[tokio::test]
async fn test_refresh_reflects_role_changes_made_mid_session() {
    // GIVEN: alice logged in with USER, then granted ADMIN afterwards
    let (store, tokens, _, auth) = service_stack();
    store.add_local_account("alice", "alice@example.com", STRONG_PASSWORD);
    let (_, pair) = auth
        .login(&login_request("alice", STRONG_PASSWORD))
        .await
        .unwrap();
    store.set_roles("alice", vec![Role::User, Role::Admin]);

    // THEN: A role grant alone does not touch the token version, so the
    // original access token stays valid and keeps advertising its
    // login-time roles until it is refreshed or expires
    let stale = tokens
        .validate_and_extract(&pair.access_token)
        .await
        .unwrap();
    assert_eq!(stale.roles, Some(vec!["USER".to_string()]));
    assert_eq!(stale.tv, Some(0));

    // WHEN: Her refresh token mints a new access token
    let refreshed = auth.refresh(&pair.refresh_token).await.unwrap();
    let claims = tokens.validate_and_extract(&refreshed).await.unwrap();

    // THEN: The new token carries the current role set, not the login-time one
    assert_eq!(
        claims.roles,
        Some(vec!["USER".to_string(), "ADMIN".to_string()])
    );
}

#[tokio::test]
async fn test_refresh_rejects_access_tokens() {
    let (store, _, _, auth) = service_stack();
    store.add_local_account("alice", "alice@example.com", STRONG_PASSWORD);
    let (_, pair) = auth
        .login(&login_request("alice", STRONG_PASSWORD))
        .await
        .unwrap();

    // A perfectly valid access token is still the wrong kind of token here.
    let result = auth.refresh(&pair.access_token).await;
    assert!(matches!(result, Err(AuthError::RefreshInvalid)));
}

#[tokio::test]
async fn test_refresh_rejects_expired_and_garbage_tokens() {
    let (store, tokens, _, auth) = service_stack();
    store.add_local_account("alice", "alice@example.com", STRONG_PASSWORD);

    // Hand-craft a refresh token whose exp has already passed.
    let now = chrono::Utc::now().timestamp();
    let expired = tokens
        .codec()
        .sign(&Claims {
            sub: "alice".to_string(),
            roles: None,
            tv: None,
            iat: now - 120,
            exp: now - 60,
        })
        .unwrap();

    assert!(matches!(
        auth.refresh(&expired).await,
        Err(AuthError::RefreshExpired)
    ));
    assert!(matches!(
        auth.refresh("garbage").await,
        Err(AuthError::RefreshInvalid)
    ));
}

#[tokio::test]
async fn test_refresh_rejects_tokens_for_deleted_accounts() {
    let (_, tokens, _, auth) = service_stack();

    // Valid signature, but no such account behind the subject.
    let now = chrono::Utc::now().timestamp();
    let orphaned = tokens
        .codec()
        .sign(&Claims {
            sub: "ghost".to_string(),
            roles: None,
            tv: None,
            iat: now,
            exp: now + 3600,
        })
        .unwrap();

    assert!(matches!(
        auth.refresh(&orphaned).await,
        Err(AuthError::RefreshInvalid)
    ));
}

#[tokio::test]
async fn test_change_password_invalidates_old_access_tokens() {
    // GIVEN: A logged-in account
    let (store, tokens, _, auth) = service_stack();
    store.add_local_account("alice", "alice@example.com", STRONG_PASSWORD);
    let (identity, pair) = auth
        .login(&login_request("alice", STRONG_PASSWORD))
        .await
        .unwrap();

    // Wrong old password never gets as far as the store.
    let bad = ChangePasswordRequest {
        old_password: "N0t!TheRightOne".to_string(),
        new_password: OTHER_STRONG_PASSWORD.to_string(),
    };
    assert!(matches!(
        auth.change_password(&identity, &bad).await,
        Err(AuthError::BadCredentials)
    ));

    // WHEN: The password actually changes
    let good = ChangePasswordRequest {
        old_password: STRONG_PASSWORD.to_string(),
        new_password: OTHER_STRONG_PASSWORD.to_string(),
    };
    auth.change_password(&identity, &good).await.unwrap();

    // THEN: The pre-change access token is stale and only the new password
    // logs in
    assert!(matches!(
        tokens.validate_and_extract(&pair.access_token).await,
        Err(AuthError::TokenStaleVersion)
    ));
    assert!(matches!(
        auth.login(&login_request("alice", STRONG_PASSWORD)).await,
        Err(AuthError::BadCredentials)
    ));
    assert!(auth
        .login(&login_request("alice", OTHER_STRONG_PASSWORD))
        .await
        .is_ok());
}

#[tokio::test]
async fn test_validate_rejects_tokens_missing_version_claim() {
    let (store, tokens, _, _) = service_stack();
    store.add_local_account("alice", "alice@example.com", STRONG_PASSWORD);

    // A refresh-shaped token (no tv claim) is never a valid access token.
    let now = chrono::Utc::now().timestamp();
    let refresh_shaped = tokens
        .codec()
        .sign(&Claims {
            sub: "alice".to_string(),
            roles: None,
            tv: None,
            iat: now,
            exp: now + 900,
        })
        .unwrap();

    assert!(matches!(
        tokens.validate_and_extract(&refresh_shaped).await,
        Err(AuthError::TokenMalformed)
    ));
}

#[tokio::test]
async fn test_reconcile_creates_account_then_resolves_by_link() {
    // GIVEN: A first-ever callback from Google
    let (store, _, _, _) = service_stack();
    let reconciler = IdentityReconciler::new(store.clone());
    let callback = google_callback("g-42", "carol@example.com");

    // WHEN: It is reconciled twice
    let (first, created_first) = reconciler.reconcile(&callback).await.unwrap();
    let (second, created_second) = reconciler.reconcile(&callback).await.unwrap();

    // THEN: One federated-only account, resolved by link on the repeat visit
    assert!(created_first);
    assert!(!created_second);
    assert_eq!(first.account().id, second.account().id);
    assert!(first.account().is_federated_only());
    assert_eq!(first.role_names(), vec!["USER".to_string()]);
    assert_eq!(store.link_count(), 1);
}

#[tokio::test]
async fn test_reconcile_links_to_existing_account_by_email() {
    // GIVEN: A local account whose email matches the provider callback
    let (store, _, _, _) = service_stack();
    let local = store.add_local_account("alice", "alice@example.com", STRONG_PASSWORD);
    let reconciler = IdentityReconciler::new(store.clone());

    // WHEN: Her Google identity arrives for the first time
    let (identity, created) = reconciler
        .reconcile(&google_callback("g-7", "alice@example.com"))
        .await
        .unwrap();

    // THEN: It attaches to the existing account instead of creating one
    assert!(!created);
    assert_eq!(identity.account().id, local.id);
    assert_eq!(store.link_count(), 1);

    // And the link, not the email, resolves subsequent visits.
    let (repeat, created_again) = reconciler
        .reconcile(&google_callback("g-7", "alice@example.com"))
        .await
        .unwrap();
    assert!(!created_again);
    assert_eq!(repeat.account().id, local.id);
    assert_eq!(store.link_count(), 1);
}

fn get_me(token: &str) -> Request<Body> {
    Request::builder()
        .uri("/api/v1/auth/me")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_revoked_token_is_unauthenticated_at_the_router() {
    // GIVEN: A logged-in account whose access token authenticates requests
    let (store, state) = app_state();
    store.add_local_account("alice", "alice@example.com", STRONG_PASSWORD);
    let (_, pair) = state
        .auth
        .login(&login_request("alice", STRONG_PASSWORD))
        .await
        .unwrap();
    let app = build_router(state);

    let before = app
        .clone()
        .oneshot(get_me(&pair.access_token))
        .await
        .unwrap();
    assert_eq!(before.status(), StatusCode::OK);

    // WHEN: She logs out through the API with that token
    let logout = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/auth/logout")
                .header(
                    header::AUTHORIZATION,
                    format!("Bearer {}", pair.access_token),
                )
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(logout.status(), StatusCode::OK);

    // THEN: Every subsequent request presenting that token is treated as
    // unauthenticated
    let after = app.oneshot(get_me(&pair.access_token)).await.unwrap();
    assert_eq!(after.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_protected_route_rejects_missing_and_garbage_tokens() {
    let (_, state) = app_state();
    let app = build_router(state);

    let bare = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/v1/auth/me")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(bare.status(), StatusCode::UNAUTHORIZED);

    let garbage = app.oneshot(get_me("not-a-token")).await.unwrap();
    assert_eq!(garbage.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_reconcile_without_email_never_matches_by_email() {
    // GIVEN: A provider callback carrying no email at all
    let (store, _, _, _) = service_stack();
    store.add_local_account("alice", "alice@example.com", STRONG_PASSWORD);
    let reconciler = IdentityReconciler::new(store.clone());

    let mut callback = google_callback("g-9", "");
    callback.email.clear();

    // THEN: A fresh account is created rather than guessing a match
    let (identity, created) = reconciler.reconcile(&callback).await.unwrap();
    assert!(created);
    assert_ne!(identity.username(), "alice");
}
