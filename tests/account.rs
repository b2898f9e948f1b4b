use std::sync::Arc;

use serde_json::json;

use aws_cognito_auth::{
    Action, AuthFlowResponse, AuthFlowType, AuthenticationDetails, MemoryStorage, MfaSettings,
    Storage, UserAttribute,
};

mod common;

use common::{jwt, ScriptedIdp};

fn seed_session(storage: &MemoryStorage, username: &str) {
    storage.set_item(
        &common::user_key(username, "idToken"),
        &jwt::id_token(username),
    );
    storage.set_item(
        &common::user_key(username, "accessToken"),
        &jwt::access_token(username),
    );
    storage.set_item(&common::user_key(username, "refreshToken"), "refresh");
    storage.set_item(&common::user_key(username, "clockDrift"), "0");
}

#[tokio::test]
async fn test_sign_up_confirm_authenticate_round_trip() {
    let idp = Arc::new(ScriptedIdp::new());
    idp.respond(json!({
        "UserConfirmed": false,
        "UserSub": "11111111-2222-3333-4444-555555555555",
        "CodeDeliveryDetails": {
            "Destination": "c***@e***",
            "DeliveryMedium": "EMAIL",
            "AttributeName": "email",
        },
    }));
    idp.respond(json!({}));
    idp.respond(json!({
        "AuthenticationResult": {
            "IdToken": jwt::id_token("carol"),
            "AccessToken": jwt::access_token("carol"),
            "RefreshToken": "refresh-token",
        },
    }));

    let pool = common::pool(&idp);

    let result = pool
        .sign_up(
            "carol",
            "InitialPassword1!",
            &[UserAttribute::new("email", "carol@example.com")],
            &[],
            None,
        )
        .await
        .unwrap();

    assert!(!result.user_confirmed);
    assert_eq!(result.user_sub, "11111111-2222-3333-4444-555555555555");

    pool.confirm_registration("carol", "123456", false, None)
        .await
        .unwrap();

    let mut user = result.user;
    user.set_auth_flow(AuthFlowType::UserPasswordAuth);
    let response = user
        .authenticate_user(&AuthenticationDetails::from_password("InitialPassword1!"))
        .await
        .unwrap();

    let AuthFlowResponse::Done { session, .. } = response else {
        panic!("expected a completed session, got {response:?}");
    };
    assert!(session.is_valid());

    let requests = idp.requests();
    assert_eq!(requests.len(), 3);

    let (action, sign_up) = &requests[0];
    assert_eq!(*action, Action::SignUp);
    assert_eq!(sign_up["Username"], "carol");
    assert_eq!(sign_up["UserAttributes"][0]["Name"], "email");
    assert_eq!(sign_up["UserAttributes"][0]["Value"], "carol@example.com");

    let (action, confirm) = &requests[1];
    assert_eq!(*action, Action::ConfirmSignUp);
    assert_eq!(confirm["ConfirmationCode"], "123456");
    assert_eq!(confirm["ForceAliasCreation"], false);
}

#[tokio::test]
async fn test_resend_confirmation_code_returns_delivery_details() {
    let idp = Arc::new(ScriptedIdp::new());
    idp.respond(json!({
        "CodeDeliveryDetails": {
            "Destination": "+********1234",
            "DeliveryMedium": "SMS",
            "AttributeName": "phone_number",
        },
    }));

    let pool = common::pool(&idp);
    let details = pool
        .resend_confirmation_code("carol", None)
        .await
        .unwrap()
        .expect("delivery details should be present");

    assert_eq!(details.delivery_medium.as_deref(), Some("SMS"));
    assert_eq!(idp.requests()[0].0, Action::ResendConfirmationCode);
}

#[tokio::test]
async fn test_change_password_rides_on_the_access_token() {
    let idp = Arc::new(ScriptedIdp::new());
    let storage = Arc::new(MemoryStorage::new());
    seed_session(&storage, "carol");

    idp.respond(json!({}));

    let mut user = common::pool_with_storage(&idp, &storage).user("carol").unwrap();
    user.change_password("old-password", "new-password").await.unwrap();

    let requests = idp.requests();
    assert_eq!(requests[0].0, Action::ChangePassword);
    assert_eq!(requests[0].1["PreviousPassword"], "old-password");
    assert_eq!(requests[0].1["ProposedPassword"], "new-password");
    assert!(requests[0].1["AccessToken"].is_string());
}

#[tokio::test]
async fn test_forgot_password_flow_needs_no_session() {
    let idp = Arc::new(ScriptedIdp::new());
    idp.respond(json!({
        "CodeDeliveryDetails": {
            "Destination": "c***@e***",
            "DeliveryMedium": "EMAIL",
            "AttributeName": "email",
        },
    }));
    idp.respond(json!({}));

    let mut user = common::pool(&idp).user("carol").unwrap();

    let details = user
        .forgot_password(None)
        .await
        .unwrap()
        .expect("delivery details should be present");
    assert_eq!(details.delivery_medium.as_deref(), Some("EMAIL"));

    user.confirm_password("123456", "NewPassword1!", None)
        .await
        .unwrap();

    let requests = idp.requests();
    assert_eq!(requests[0].0, Action::ForgotPassword);
    assert_eq!(requests[0].1["Username"], "carol");
    assert_eq!(requests[1].0, Action::ConfirmForgotPassword);
    assert_eq!(requests[1].1["ConfirmationCode"], "123456");
    assert_eq!(requests[1].1["Password"], "NewPassword1!");
}

#[tokio::test]
async fn test_user_attributes_are_fetched_and_cached() {
    let idp = Arc::new(ScriptedIdp::new());
    let storage = Arc::new(MemoryStorage::new());
    seed_session(&storage, "carol");

    idp.respond(json!({
        "UserAttributes": [
            { "Name": "email", "Value": "carol@example.com" },
            { "Name": "name", "Value": "Carol" },
        ],
    }));

    let mut user = common::pool_with_storage(&idp, &storage).user("carol").unwrap();
    let attributes = user.get_user_attributes().await.unwrap();

    assert_eq!(
        attributes,
        vec![
            UserAttribute::new("email", "carol@example.com"),
            UserAttribute::new("name", "Carol"),
        ]
    );
    assert_eq!(
        storage
            .get_item(&common::user_key("carol", "userAttributes.email"))
            .as_deref(),
        Some("carol@example.com")
    );
}

#[tokio::test]
async fn test_update_and_delete_attributes_maintain_the_cache() {
    let idp = Arc::new(ScriptedIdp::new());
    let storage = Arc::new(MemoryStorage::new());
    seed_session(&storage, "carol");

    idp.respond(json!({
        "CodeDeliveryDetailsList": [{
            "Destination": "c***@e***",
            "DeliveryMedium": "EMAIL",
            "AttributeName": "email",
        }],
    }));
    idp.respond(json!({}));

    let mut user = common::pool_with_storage(&idp, &storage).user("carol").unwrap();

    let details = user
        .update_attributes(&[UserAttribute::new("email", "new@example.com")], None)
        .await
        .unwrap();
    assert_eq!(details.len(), 1);
    assert_eq!(
        storage
            .get_item(&common::user_key("carol", "userAttributes.email"))
            .as_deref(),
        Some("new@example.com")
    );

    user.delete_attributes(&["email".to_string()]).await.unwrap();
    assert_eq!(
        storage.get_item(&common::user_key("carol", "userAttributes.email")),
        None
    );

    let requests = idp.requests();
    assert_eq!(requests[0].0, Action::UpdateUserAttributes);
    assert_eq!(requests[1].0, Action::DeleteUserAttributes);
    assert_eq!(requests[1].1["UserAttributeNames"][0], "email");
}

#[tokio::test]
async fn test_mfa_preference_and_legacy_settings() {
    let idp = Arc::new(ScriptedIdp::new());
    let storage = Arc::new(MemoryStorage::new());
    seed_session(&storage, "carol");

    idp.respond(json!({}));
    idp.respond(json!({}));
    idp.respond(json!({}));

    let mut user = common::pool_with_storage(&idp, &storage).user("carol").unwrap();

    user.set_user_mfa_preference(
        Some(MfaSettings {
            enabled: true,
            preferred_mfa: true,
        }),
        None,
    )
    .await
    .unwrap();
    user.enable_mfa().await.unwrap();
    user.disable_mfa().await.unwrap();

    let requests = idp.requests();
    assert_eq!(requests[0].0, Action::SetUserMfaPreference);
    assert_eq!(requests[0].1["SMSMfaSettings"]["Enabled"], true);
    assert_eq!(requests[0].1["SMSMfaSettings"]["PreferredMfa"], true);
    assert!(requests[0].1.get("SoftwareTokenMfaSettings").is_none());

    assert_eq!(requests[1].0, Action::SetUserSettings);
    assert_eq!(requests[1].1["MFAOptions"][0]["DeliveryMedium"], "SMS");
    assert_eq!(requests[2].1["MFAOptions"], json!([]));
}

#[tokio::test]
async fn test_totp_setup_mid_flow_chains_into_the_challenge() {
    let idp = Arc::new(ScriptedIdp::new());
    idp.respond(json!({
        "ChallengeName": "MFA_SETUP",
        "Session": "setup-session",
        "ChallengeParameters": {},
    }));
    idp.respond(json!({
        "SecretCode": "JBSWY3DPEHPK3PXP",
        "Session": "associate-session",
    }));
    idp.respond(json!({
        "Status": "SUCCESS",
        "Session": "verify-session",
    }));
    idp.respond(json!({
        "AuthenticationResult": {
            "IdToken": jwt::id_token("carol"),
            "AccessToken": jwt::access_token("carol"),
            "RefreshToken": "refresh-token",
        },
    }));

    let mut user = common::pool(&idp).user("carol").unwrap();
    user.set_auth_flow(AuthFlowType::UserPasswordAuth);

    let response = user
        .authenticate_user(&AuthenticationDetails::from_password("password"))
        .await
        .unwrap();
    assert!(matches!(response, AuthFlowResponse::MfaSetup { .. }));

    let secret = user.associate_software_token().await.unwrap();
    assert_eq!(secret, "JBSWY3DPEHPK3PXP");

    let response = user
        .verify_software_token("123456", "carol-phone")
        .await
        .unwrap();
    assert!(matches!(response, AuthFlowResponse::Done { .. }));

    let requests = idp.requests();
    assert_eq!(requests.len(), 4);

    let (action, associate) = &requests[1];
    assert_eq!(*action, Action::AssociateSoftwareToken);
    assert_eq!(associate["Session"], "setup-session");

    let (action, verify) = &requests[2];
    assert_eq!(*action, Action::VerifySoftwareToken);
    assert_eq!(verify["Session"], "associate-session");
    assert_eq!(verify["UserCode"], "123456");
    assert_eq!(verify["FriendlyDeviceName"], "carol-phone");

    let (action, respond) = &requests[3];
    assert_eq!(*action, Action::RespondToAuthChallenge);
    assert_eq!(respond["ChallengeName"], "MFA_SETUP");
    assert_eq!(respond["Session"], "verify-session");
}

#[tokio::test]
async fn test_totp_setup_when_signed_in_skips_the_challenge() {
    let idp = Arc::new(ScriptedIdp::new());
    let storage = Arc::new(MemoryStorage::new());
    seed_session(&storage, "carol");

    idp.respond(json!({ "SecretCode": "JBSWY3DPEHPK3PXP" }));
    idp.respond(json!({ "Status": "SUCCESS" }));

    let mut user = common::pool_with_storage(&idp, &storage).user("carol").unwrap();

    let secret = user.associate_software_token().await.unwrap();
    assert_eq!(secret, "JBSWY3DPEHPK3PXP");

    let response = user
        .verify_software_token("123456", "carol-phone")
        .await
        .unwrap();
    assert!(matches!(response, AuthFlowResponse::Done { .. }));

    let requests = idp.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests[0].1["AccessToken"].is_string());
    assert!(requests[1].1["AccessToken"].is_string());
}

#[tokio::test]
async fn test_delete_user_clears_local_state() {
    let idp = Arc::new(ScriptedIdp::new());
    let storage = Arc::new(MemoryStorage::new());
    seed_session(&storage, "carol");

    idp.respond(json!({}));

    let mut user = common::pool_with_storage(&idp, &storage).user("carol").unwrap();
    user.delete_user().await.unwrap();

    assert_eq!(idp.requests()[0].0, Action::DeleteUser);
    assert!(user.sign_in_session().is_none());
    assert_eq!(storage.get_item(&common::user_key("carol", "idToken")), None);
}

#[tokio::test]
async fn test_list_devices_parses_the_device_page() {
    let idp = Arc::new(ScriptedIdp::new());
    let storage = Arc::new(MemoryStorage::new());
    seed_session(&storage, "carol");

    idp.respond(json!({
        "Devices": [{
            "DeviceKey": "us-east-1_device-one",
            "DeviceAttributes": [
                { "Name": "device_name", "Value": "carol-laptop" },
            ],
            "DeviceCreateDate": 1700000000.123,
        }],
        "PaginationToken": "next-page",
    }));

    let mut user = common::pool_with_storage(&idp, &storage).user("carol").unwrap();
    let page = user.list_devices(Some(10), None).await.unwrap();

    assert_eq!(page.devices.len(), 1);
    assert_eq!(
        page.devices[0].device_key.as_deref(),
        Some("us-east-1_device-one")
    );
    assert_eq!(
        page.devices[0].device_attributes,
        vec![UserAttribute::new("device_name", "carol-laptop")]
    );
    assert_eq!(page.pagination_token.as_deref(), Some("next-page"));
    assert_eq!(idp.requests()[0].1["Limit"], 10);
}
