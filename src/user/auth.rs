use std::collections::HashMap;

use log::{debug, info};
use serde_json::{json, Value};

use crate::cache::DeviceCredentials;
use crate::error::CognitoError;
use crate::idp::Action;
use crate::pool::{ClientMetadata, UserAttribute};
use crate::srp::{SrpClient, TrackedDevice, UntrackedDevice, User};
use crate::user::challenge::{
    AuthFlowResponse, AuthResponse, ChallengeName, MfaType, NewDeviceMetadata,
};
use crate::user::{parse_response, AuthFlowType, AuthenticationDetails, CognitoUser};

/// Wire prefix carried by attribute names inside the `NEW_PASSWORD_REQUIRED`
/// challenge.
const USER_ATTRIBUTE_PREFIX: &str = "userAttributes.";

impl CognitoUser {
    /// Start an authentication flow with the configured [`AuthFlowType`].
    ///
    /// Runs the flow as far as the identity provider allows in one pass: an
    /// SRP exchange answers its own `PASSWORD_VERIFIER` (and any
    /// `DEVICE_SRP_AUTH`) challenge internally, and a new device is confirmed
    /// before returning. Any other challenge is handed back as an
    /// [`AuthFlowResponse`] variant for the caller to answer.
    pub async fn authenticate_user(
        &mut self,
        details: &AuthenticationDetails,
    ) -> Result<AuthFlowResponse, CognitoError> {
        match self.auth_flow {
            AuthFlowType::UserPasswordAuth => self.authenticate_with_password(details).await,
            AuthFlowType::UserSrpAuth | AuthFlowType::CustomAuth => {
                self.authenticate_with_srp(details).await
            }
            flow => Err(CognitoError::InvalidAuthenticationFlow(
                flow.as_str().to_string(),
            )),
        }
    }

    /// Answer an MFA code challenge (`SMS_MFA` or `SOFTWARE_TOKEN_MFA`).
    pub async fn send_mfa_code(
        &mut self,
        code: &str,
        mfa_type: MfaType,
        client_metadata: Option<&ClientMetadata>,
    ) -> Result<AuthFlowResponse, CognitoError> {
        let (challenge, code_key) = match mfa_type {
            MfaType::SmsMfa => (ChallengeName::SmsMfa, "SMS_MFA_CODE"),
            MfaType::SoftwareTokenMfa => {
                (ChallengeName::SoftwareTokenMfa, "SOFTWARE_TOKEN_MFA_CODE")
            }
        };

        let mut challenge_responses = json!({ "USERNAME": self.username });
        challenge_responses[code_key] = json!(code);
        self.attach_challenge_credentials(&mut challenge_responses);

        let response = self
            .respond_to_challenge(
                challenge,
                challenge_responses,
                self.session_token.clone(),
                client_metadata,
            )
            .await?;

        self.route_challenge(response).await
    }

    /// Answer a `CUSTOM_CHALLENGE`.
    pub async fn send_custom_challenge_answer(
        &mut self,
        answer: &str,
        client_metadata: Option<&ClientMetadata>,
    ) -> Result<AuthFlowResponse, CognitoError> {
        let mut challenge_responses = json!({ "USERNAME": self.username, "ANSWER": answer });
        self.attach_challenge_credentials(&mut challenge_responses);

        let response = self
            .respond_to_challenge(
                ChallengeName::CustomChallenge,
                challenge_responses,
                self.session_token.clone(),
                client_metadata,
            )
            .await?;

        self.route_challenge(response).await
    }

    /// Answer a `SELECT_MFA_TYPE` challenge with the chosen factor.
    ///
    /// On success the follow-up challenge surfaces as
    /// [`AuthFlowResponse::SmsMfaRequired`] or
    /// [`AuthFlowResponse::TotpRequired`].
    pub async fn send_mfa_selection_answer(
        &mut self,
        answer: MfaType,
    ) -> Result<AuthFlowResponse, CognitoError> {
        let challenge_responses = json!({
            "USERNAME": self.username,
            "ANSWER": answer.as_str(),
        });

        let response = self
            .respond_to_challenge(
                ChallengeName::SelectMfaType,
                challenge_responses,
                self.session_token.clone(),
                None,
            )
            .await?;

        self.route_challenge(response).await
    }

    /// Answer a `NEW_PASSWORD_REQUIRED` challenge.
    ///
    /// `required_attributes` must cover the names reported by
    /// [`AuthFlowResponse::NewPasswordRequired`].
    pub async fn complete_new_password_challenge(
        &mut self,
        new_password: &str,
        required_attributes: &[UserAttribute],
        client_metadata: Option<&ClientMetadata>,
    ) -> Result<AuthFlowResponse, CognitoError> {
        if new_password.is_empty() {
            return Err(CognitoError::InvalidParameter(
                "New password is required.".to_string(),
            ));
        }

        let mut challenge_responses = json!({
            "USERNAME": self.username,
            "NEW_PASSWORD": new_password,
        });
        for attribute in required_attributes {
            challenge_responses[format!("{USER_ATTRIBUTE_PREFIX}{}", attribute.name)] =
                json!(attribute.value);
        }
        self.attach_challenge_credentials(&mut challenge_responses);

        let response = self
            .respond_to_challenge(
                ChallengeName::NewPasswordRequired,
                challenge_responses,
                self.session_token.clone(),
                client_metadata,
            )
            .await?;

        self.route_challenge(response).await
    }

    /// Begin associating a TOTP authenticator, returning the shared secret to
    /// surface to the user.
    ///
    /// Mid-flow (during `MFA_SETUP`) the association rides on the challenge
    /// session; once signed in it rides on the access token.
    pub async fn associate_software_token(&mut self) -> Result<String, CognitoError> {
        let value = if let Some(session_token) = self.session_token.clone() {
            let value = self
                .pool
                .dispatcher()
                .dispatch(
                    Action::AssociateSoftwareToken,
                    json!({ "Session": session_token }),
                )
                .await?;

            if let Some(session) = value.get("Session").and_then(Value::as_str) {
                self.session_token = Some(session.to_string());
            }

            value
        } else {
            let access_token = self.access_token().await?;

            self.pool
                .dispatcher()
                .dispatch(
                    Action::AssociateSoftwareToken,
                    json!({ "AccessToken": access_token }),
                )
                .await?
        };

        value
            .get("SecretCode")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                CognitoError::InvalidParameter(
                    "AssociateSoftwareToken response is missing SecretCode.".to_string(),
                )
            })
    }

    /// Verify the first code from a newly associated TOTP authenticator.
    ///
    /// Mid-flow this also answers the pending `MFA_SETUP` challenge, so the
    /// result is usually [`AuthFlowResponse::Done`]. Once signed in the
    /// verification stands alone and the current session is returned.
    pub async fn verify_software_token(
        &mut self,
        code: &str,
        friendly_device_name: &str,
    ) -> Result<AuthFlowResponse, CognitoError> {
        if let Some(session_token) = self.session_token.clone() {
            let value = self
                .pool
                .dispatcher()
                .dispatch(
                    Action::VerifySoftwareToken,
                    json!({
                        "Session": session_token,
                        "UserCode": code,
                        "FriendlyDeviceName": friendly_device_name,
                    }),
                )
                .await?;

            let session = value
                .get("Session")
                .and_then(Value::as_str)
                .map(str::to_string);

            let mut challenge_responses = json!({ "USERNAME": self.username });
            self.attach_challenge_credentials(&mut challenge_responses);

            let response = self
                .respond_to_challenge(
                    ChallengeName::MfaSetup,
                    challenge_responses,
                    session,
                    None,
                )
                .await?;

            self.route_challenge(response).await
        } else {
            let session = self.get_session().await?;

            self.pool
                .dispatcher()
                .dispatch(
                    Action::VerifySoftwareToken,
                    json!({
                        "AccessToken": session.access_token().jwt(),
                        "UserCode": code,
                        "FriendlyDeviceName": friendly_device_name,
                    }),
                )
                .await?;

            Ok(AuthFlowResponse::Done {
                session,
                user_confirmation_necessary: false,
            })
        }
    }

    async fn authenticate_with_password(
        &mut self,
        details: &AuthenticationDetails,
    ) -> Result<AuthFlowResponse, CognitoError> {
        let password = details.password.as_deref().ok_or_else(|| {
            CognitoError::InvalidParameter(
                "A password is required for USER_PASSWORD_AUTH.".to_string(),
            )
        })?;

        let mut auth_parameters = json!({
            "USERNAME": self.username,
            "PASSWORD": password,
        });
        if let Some(hash) = self.pool.secret_hash(&self.username) {
            auth_parameters["SECRET_HASH"] = json!(hash);
        }
        if let Some(device_key) = &self.device_key {
            auth_parameters["DEVICE_KEY"] = json!(device_key);
        }
        for (key, value) in &details.auth_parameters {
            auth_parameters[key] = json!(value);
        }

        let response = self.initiate_auth(auth_parameters, details).await?;

        self.route_challenge(response).await
    }

    async fn authenticate_with_srp(
        &mut self,
        details: &AuthenticationDetails,
    ) -> Result<AuthFlowResponse, CognitoError> {
        let password = details.password.as_deref().ok_or_else(|| {
            CognitoError::InvalidParameter(
                "A password is required to start an SRP exchange.".to_string(),
            )
        })?;

        let srp: SrpClient<User> = SrpClient::new(
            User::new(self.pool.pool_name(), &self.username, password),
            self.pool.client_id(),
            self.pool.client_secret(),
        );
        let parameters = srp.get_auth_parameters();

        let mut auth_parameters = json!({
            "USERNAME": self.username,
            "SRP_A": parameters.a,
        });
        if self.auth_flow == AuthFlowType::CustomAuth {
            auth_parameters["CHALLENGE_NAME"] = json!("SRP_A");
        }
        if let Some(hash) = parameters.secret_hash {
            auth_parameters["SECRET_HASH"] = json!(hash);
        }
        if let Some(device_key) = &self.device_key {
            auth_parameters["DEVICE_KEY"] = json!(device_key);
        }
        for (key, value) in &details.auth_parameters {
            auth_parameters[key] = json!(value);
        }

        let response = self.initiate_auth(auth_parameters, details).await?;

        let response = if response.challenge_name.as_deref()
            == Some(ChallengeName::PasswordVerifier.as_str())
        {
            self.respond_to_password_verifier(&srp, response, details)
                .await?
        } else {
            response
        };

        self.route_challenge(response).await
    }

    async fn initiate_auth(
        &mut self,
        auth_parameters: Value,
        details: &AuthenticationDetails,
    ) -> Result<AuthResponse, CognitoError> {
        let mut body = json!({
            "AuthFlow": self.auth_flow.as_str(),
            "ClientId": self.pool.client_id(),
            "AuthParameters": auth_parameters,
        });
        if let Some(validation_data) = &details.validation_data {
            body["ClientMetadata"] = json!(validation_data);
        }
        if let Some(context) = self.pool.user_context_data(&self.username) {
            body["UserContextData"] = context;
        }

        let value = self
            .pool
            .dispatcher()
            .dispatch(Action::InitiateAuth, body)
            .await?;

        parse_response(value)
    }

    async fn respond_to_password_verifier(
        &mut self,
        srp: &SrpClient<User>,
        response: AuthResponse,
        details: &AuthenticationDetails,
    ) -> Result<AuthResponse, CognitoError> {
        let parameters = response.challenge_parameters.unwrap_or_default();

        let user_id = challenge_parameter(&parameters, "USER_ID_FOR_SRP")?.to_string();
        let srp_b = challenge_parameter(&parameters, "SRP_B")?;
        let salt = challenge_parameter(&parameters, "SALT")?;
        let secret_block = challenge_parameter(&parameters, "SECRET_BLOCK")?;

        // The pool resolves aliases here; every subsequent request must use
        // the canonical user id.
        self.username = user_id.clone();

        let verification = srp.verify(secret_block, &user_id, salt, srp_b)?;

        let mut challenge_responses = json!({
            "USERNAME": self.username,
            "PASSWORD_CLAIM_SECRET_BLOCK": verification.password_claim_secret_block,
            "PASSWORD_CLAIM_SIGNATURE": verification.password_claim_signature,
            "TIMESTAMP": verification.timestamp,
        });
        if let Some(hash) = verification.secret_hash {
            challenge_responses["SECRET_HASH"] = json!(hash);
        }
        if let Some(device_key) = &self.device_key {
            challenge_responses["DEVICE_KEY"] = json!(device_key);
        }

        self.respond_to_challenge(
            ChallengeName::PasswordVerifier,
            challenge_responses,
            response.session,
            details.client_metadata.as_ref(),
        )
        .await
    }

    /// Dispatch every `InitiateAuth`/`RespondToAuthChallenge` return to its
    /// handler.
    ///
    /// `DEVICE_SRP_AUTH` is answered internally from the cached device
    /// credentials; a terminal result materialises the session (confirming a
    /// new device first when the pool tracks devices); everything else is
    /// surfaced to the caller.
    pub(crate) async fn route_challenge(
        &mut self,
        response: AuthResponse,
    ) -> Result<AuthFlowResponse, CognitoError> {
        let response = if response.challenge_name.as_deref()
            == Some(ChallengeName::DeviceSrpAuth.as_str())
        {
            self.session_token = response.session.clone();
            self.respond_to_device_challenge().await?
        } else {
            response
        };

        let Some(name) = response.challenge_name.clone() else {
            let result = response.authentication_result.ok_or_else(|| {
                CognitoError::InvalidParameter(
                    "Response carried neither a challenge nor an authentication result."
                        .to_string(),
                )
            })?;

            return self.finish_authentication(result).await;
        };

        debug!(challenge = name.as_str(), username = self.username.as_str(); "Received authentication challenge");

        self.session_token = response.session.clone();
        self.challenge_name = Some(name.clone());
        let parameters = response.challenge_parameters.unwrap_or_default();
        self.challenge_parameters = Some(parameters.clone());

        match ChallengeName::parse(&name) {
            Some(ChallengeName::SmsMfa) => Ok(AuthFlowResponse::SmsMfaRequired { parameters }),
            Some(ChallengeName::SoftwareTokenMfa) => {
                Ok(AuthFlowResponse::TotpRequired { parameters })
            }
            Some(ChallengeName::SelectMfaType) => {
                Ok(AuthFlowResponse::SelectMfaType { parameters })
            }
            Some(ChallengeName::MfaSetup) => Ok(AuthFlowResponse::MfaSetup { parameters }),
            Some(ChallengeName::CustomChallenge) => {
                Ok(AuthFlowResponse::CustomChallenge { parameters })
            }
            Some(ChallengeName::NewPasswordRequired) => {
                Ok(Self::new_password_required(&parameters))
            }
            _ => Err(CognitoError::InvalidParameter(format!(
                "Unsupported challenge received: {name}"
            ))),
        }
    }

    async fn finish_authentication(
        &mut self,
        result: crate::user::challenge::AuthenticationResult,
    ) -> Result<AuthFlowResponse, CognitoError> {
        let session = Self::build_session(&result)?;
        self.sign_in_session = Some(session.clone());
        self.session_token = None;
        self.pool.cache().cache_session(&self.username, &session);

        info!(username = self.username.as_str(); "Authentication completed");

        let user_confirmation_necessary = match result.new_device_metadata {
            Some(metadata) => self.confirm_device(metadata, &session).await?,
            None => false,
        };

        Ok(AuthFlowResponse::Done {
            session,
            user_confirmation_necessary,
        })
    }

    /// Register this device with the pool after a terminal authentication
    /// that returned `NewDeviceMetadata`.
    async fn confirm_device(
        &mut self,
        metadata: NewDeviceMetadata,
        session: &crate::session::UserSession,
    ) -> Result<bool, CognitoError> {
        let (Some(device_key), Some(device_group_key)) =
            (metadata.device_key, metadata.device_group_key)
        else {
            return Ok(false);
        };

        let srp: SrpClient<UntrackedDevice> = SrpClient::new(
            UntrackedDevice::new(&device_group_key, &device_key),
            self.pool.client_id(),
            self.pool.client_secret(),
        );
        let verifier = srp.get_password_verifier();

        let body = json!({
            "AccessToken": session.access_token().jwt(),
            "DeviceKey": device_key,
            "DeviceName": self.pool.device_name(),
            "DeviceSecretVerifierConfig": {
                "Salt": verifier.salt,
                "PasswordVerifier": verifier.verifier,
            },
        });

        let response = self
            .pool
            .dispatcher()
            .dispatch(Action::ConfirmDevice, body)
            .await?;

        info!(device_key = device_key.as_str(); "Confirmed new device");

        self.remember_device(&DeviceCredentials {
            device_key,
            device_group_key,
            device_password: verifier.password,
        });

        Ok(response
            .get("UserConfirmationNecessary")
            .and_then(Value::as_bool)
            .unwrap_or(false))
    }

    /// Answer `DEVICE_SRP_AUTH` and the `DEVICE_PASSWORD_VERIFIER` it leads
    /// to, using the cached device credentials.
    async fn respond_to_device_challenge(&mut self) -> Result<AuthResponse, CognitoError> {
        let (Some(device_key), Some(device_group_key), Some(device_password)) = (
            self.device_key.clone(),
            self.device_group_key.clone(),
            self.device_password.clone(),
        ) else {
            return Err(CognitoError::InvalidParameter(
                "A remembered device is required to answer DEVICE_SRP_AUTH.".to_string(),
            ));
        };

        let srp: SrpClient<TrackedDevice> = SrpClient::new(
            TrackedDevice::new(&device_group_key, &device_key, &device_password),
            self.pool.client_id(),
            self.pool.client_secret(),
        );
        let parameters = srp.get_auth_parameters();

        let mut challenge_responses = json!({
            "USERNAME": self.username,
            "SRP_A": parameters.a,
            "DEVICE_KEY": device_key,
        });
        if let Some(hash) = self.pool.secret_hash(&self.username) {
            challenge_responses["SECRET_HASH"] = json!(hash);
        }

        let response = self
            .respond_to_challenge(
                ChallengeName::DeviceSrpAuth,
                challenge_responses,
                self.session_token.clone(),
                None,
            )
            .await?;

        let challenge_parameters = response.challenge_parameters.unwrap_or_default();
        let srp_b = challenge_parameter(&challenge_parameters, "SRP_B")?;
        let salt = challenge_parameter(&challenge_parameters, "SALT")?;
        let secret_block = challenge_parameter(&challenge_parameters, "SECRET_BLOCK")?;

        let verification = srp.verify(secret_block, salt, srp_b)?;

        let mut challenge_responses = json!({
            "USERNAME": self.username,
            "PASSWORD_CLAIM_SECRET_BLOCK": verification.password_claim_secret_block,
            "PASSWORD_CLAIM_SIGNATURE": verification.password_claim_signature,
            "TIMESTAMP": verification.timestamp,
            "DEVICE_KEY": device_key,
        });
        if let Some(hash) = self.pool.secret_hash(&self.username) {
            challenge_responses["SECRET_HASH"] = json!(hash);
        }

        self.respond_to_challenge(
            ChallengeName::DevicePasswordVerifier,
            challenge_responses,
            response.session,
            None,
        )
        .await
    }

    pub(crate) async fn respond_to_challenge(
        &mut self,
        challenge: ChallengeName,
        challenge_responses: Value,
        session: Option<String>,
        client_metadata: Option<&ClientMetadata>,
    ) -> Result<AuthResponse, CognitoError> {
        let mut body = json!({
            "ChallengeName": challenge.as_str(),
            "ClientId": self.pool.client_id(),
            "ChallengeResponses": challenge_responses,
        });
        if let Some(session) = session {
            body["Session"] = json!(session);
        }
        if let Some(metadata) = client_metadata {
            body["ClientMetadata"] = json!(metadata);
        }
        if let Some(context) = self.pool.user_context_data(&self.username) {
            body["UserContextData"] = context;
        }

        let value = self
            .pool
            .dispatcher()
            .dispatch(Action::RespondToAuthChallenge, body)
            .await?;

        parse_response(value)
    }

    /// Attach `SECRET_HASH` and `DEVICE_KEY` to a challenge response when the
    /// pool configuration carries them.
    fn attach_challenge_credentials(&self, challenge_responses: &mut Value) {
        if let Some(hash) = self.pool.secret_hash(&self.username) {
            challenge_responses["SECRET_HASH"] = json!(hash);
        }
        if let Some(device_key) = &self.device_key {
            challenge_responses["DEVICE_KEY"] = json!(device_key);
        }
    }

    fn new_password_required(parameters: &HashMap<String, String>) -> AuthFlowResponse {
        let user_attributes: HashMap<String, String> = parameters
            .get("userAttributes")
            .and_then(|raw| serde_json::from_str(raw).ok())
            .unwrap_or_default();

        let required_attributes = parameters
            .get("requiredAttributes")
            .and_then(|raw| serde_json::from_str::<Vec<String>>(raw).ok())
            .unwrap_or_default()
            .into_iter()
            .map(|attribute| {
                attribute
                    .strip_prefix(USER_ATTRIBUTE_PREFIX)
                    .map(str::to_string)
                    .unwrap_or(attribute)
            })
            .collect();

        AuthFlowResponse::NewPasswordRequired {
            user_attributes,
            required_attributes,
        }
    }
}

fn challenge_parameter<'a>(
    parameters: &'a HashMap<String, String>,
    name: &str,
) -> Result<&'a str, CognitoError> {
    parameters
        .get(name)
        .map(String::as_str)
        .ok_or_else(|| {
            CognitoError::InvalidParameter(format!("Challenge parameters are missing {name}."))
        })
}
