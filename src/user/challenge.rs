use std::collections::HashMap;

use serde::Deserialize;

use crate::session::UserSession;

/// Challenge names issued by the identity provider between authentication
/// steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeName {
    SmsMfa,
    SoftwareTokenMfa,
    SelectMfaType,
    MfaSetup,
    PasswordVerifier,
    CustomChallenge,
    NewPasswordRequired,
    DeviceSrpAuth,
    DevicePasswordVerifier,
}

impl ChallengeName {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ChallengeName::SmsMfa => "SMS_MFA",
            ChallengeName::SoftwareTokenMfa => "SOFTWARE_TOKEN_MFA",
            ChallengeName::SelectMfaType => "SELECT_MFA_TYPE",
            ChallengeName::MfaSetup => "MFA_SETUP",
            ChallengeName::PasswordVerifier => "PASSWORD_VERIFIER",
            ChallengeName::CustomChallenge => "CUSTOM_CHALLENGE",
            ChallengeName::NewPasswordRequired => "NEW_PASSWORD_REQUIRED",
            ChallengeName::DeviceSrpAuth => "DEVICE_SRP_AUTH",
            ChallengeName::DevicePasswordVerifier => "DEVICE_PASSWORD_VERIFIER",
        }
    }

    pub(crate) fn parse(name: &str) -> Option<Self> {
        match name {
            "SMS_MFA" => Some(ChallengeName::SmsMfa),
            "SOFTWARE_TOKEN_MFA" => Some(ChallengeName::SoftwareTokenMfa),
            "SELECT_MFA_TYPE" => Some(ChallengeName::SelectMfaType),
            "MFA_SETUP" => Some(ChallengeName::MfaSetup),
            "PASSWORD_VERIFIER" => Some(ChallengeName::PasswordVerifier),
            "CUSTOM_CHALLENGE" => Some(ChallengeName::CustomChallenge),
            "NEW_PASSWORD_REQUIRED" => Some(ChallengeName::NewPasswordRequired),
            "DEVICE_SRP_AUTH" => Some(ChallengeName::DeviceSrpAuth),
            "DEVICE_PASSWORD_VERIFIER" => Some(ChallengeName::DevicePasswordVerifier),
            _ => None,
        }
    }
}

/// The MFA factors a user can answer a challenge with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MfaType {
    /// A code delivered over SMS.
    #[default]
    SmsMfa,

    /// A code from an associated TOTP authenticator.
    SoftwareTokenMfa,
}

impl MfaType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            MfaType::SmsMfa => ChallengeName::SmsMfa.as_str(),
            MfaType::SoftwareTokenMfa => ChallengeName::SoftwareTokenMfa.as_str(),
        }
    }
}

/// The outcome of one step of an authentication flow: either a completed
/// session, or the challenge the caller must answer next.
///
/// Device SRP never surfaces here - it is answered internally from the cached
/// device credentials.
#[derive(Debug, Clone)]
#[must_use]
pub enum AuthFlowResponse {
    /// Terminal success. The session has been stored and cached.
    Done {
        session: UserSession,

        /// Set when the pool asks the user to confirm whether the new device
        /// should be remembered.
        user_confirmation_necessary: bool,
    },

    /// An SMS code was sent; answer with
    /// [`send_mfa_code`](crate::CognitoUser::send_mfa_code).
    SmsMfaRequired { parameters: HashMap<String, String> },

    /// A TOTP code is expected; answer with
    /// [`send_mfa_code`](crate::CognitoUser::send_mfa_code).
    TotpRequired { parameters: HashMap<String, String> },

    /// The user must pick an MFA factor; answer with
    /// [`send_mfa_selection_answer`](crate::CognitoUser::send_mfa_selection_answer).
    SelectMfaType { parameters: HashMap<String, String> },

    /// An MFA factor must be associated first; drive
    /// [`associate_software_token`](crate::CognitoUser::associate_software_token)
    /// and [`verify_software_token`](crate::CognitoUser::verify_software_token).
    MfaSetup { parameters: HashMap<String, String> },

    /// An app-defined challenge; answer with
    /// [`send_custom_challenge_answer`](crate::CognitoUser::send_custom_challenge_answer).
    CustomChallenge { parameters: HashMap<String, String> },

    /// The user must set a new password; answer with
    /// [`complete_new_password_challenge`](crate::CognitoUser::complete_new_password_challenge).
    NewPasswordRequired {
        /// The user's current attributes, with the wire prefix stripped.
        user_attributes: HashMap<String, String>,

        /// Names of attributes that must be supplied with the new password.
        required_attributes: Vec<String>,
    },
}

/// Wire shape shared by `InitiateAuth` and `RespondToAuthChallenge` responses.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct AuthResponse {
    pub challenge_name: Option<String>,
    pub session: Option<String>,
    pub challenge_parameters: Option<HashMap<String, String>>,
    pub authentication_result: Option<AuthenticationResult>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct AuthenticationResult {
    pub id_token: Option<String>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub new_device_metadata: Option<NewDeviceMetadata>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct NewDeviceMetadata {
    pub device_key: Option<String>,
    pub device_group_key: Option<String>,
}
