use log::info;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::CognitoError;
use crate::idp::Action;
use crate::pool::{ClientMetadata, CodeDeliveryDetails, UserAttribute};
use crate::user::{parse_response, CognitoUser};

/// Per-factor MFA preference settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct MfaSettings {
    pub enabled: bool,
    pub preferred_mfa: bool,
}

/// A legacy MFA delivery option, as reported by `GetUser`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MfaOption {
    pub delivery_medium: Option<String>,
    pub attribute_name: Option<String>,
}

/// A device tracked for the user.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Device {
    pub device_key: Option<String>,
    #[serde(default)]
    pub device_attributes: Vec<UserAttribute>,
    pub device_create_date: Option<f64>,
    pub device_last_modified_date: Option<f64>,
    pub device_last_authenticated_date: Option<f64>,
}

/// One page of the user's tracked devices.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeviceList {
    #[serde(default)]
    pub devices: Vec<Device>,
    pub pagination_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetUserResponse {
    #[serde(default)]
    user_attributes: Vec<UserAttribute>,
    #[serde(default)]
    mfa_options: Vec<MfaOption>,
}

impl CognitoUser {
    /// Change the signed-in user's password.
    pub async fn change_password(
        &mut self,
        previous_password: &str,
        proposed_password: &str,
    ) -> Result<(), CognitoError> {
        let access_token = self.access_token().await?;

        self.pool
            .dispatcher()
            .dispatch(
                Action::ChangePassword,
                json!({
                    "PreviousPassword": previous_password,
                    "ProposedPassword": proposed_password,
                    "AccessToken": access_token,
                }),
            )
            .await?;

        Ok(())
    }

    /// Start a forgotten-password reset for this username.
    ///
    /// No session is required; the pool sends a confirmation code to a
    /// verified delivery medium.
    pub async fn forgot_password(
        &mut self,
        client_metadata: Option<&ClientMetadata>,
    ) -> Result<Option<CodeDeliveryDetails>, CognitoError> {
        let mut body = json!({
            "ClientId": self.pool.client_id(),
            "Username": self.username,
        });
        if let Some(hash) = self.pool.secret_hash(&self.username) {
            body["SecretHash"] = json!(hash);
        }
        if let Some(metadata) = client_metadata {
            body["ClientMetadata"] = json!(metadata);
        }
        if let Some(context) = self.pool.user_context_data(&self.username) {
            body["UserContextData"] = context;
        }

        let response = self
            .pool
            .dispatcher()
            .dispatch(Action::ForgotPassword, body)
            .await?;

        Ok(response
            .get("CodeDeliveryDetails")
            .cloned()
            .and_then(|details| serde_json::from_value(details).ok()))
    }

    /// Complete a forgotten-password reset with the delivered code.
    pub async fn confirm_password(
        &mut self,
        confirmation_code: &str,
        new_password: &str,
        client_metadata: Option<&ClientMetadata>,
    ) -> Result<(), CognitoError> {
        let mut body = json!({
            "ClientId": self.pool.client_id(),
            "Username": self.username,
            "ConfirmationCode": confirmation_code,
            "Password": new_password,
        });
        if let Some(hash) = self.pool.secret_hash(&self.username) {
            body["SecretHash"] = json!(hash);
        }
        if let Some(metadata) = client_metadata {
            body["ClientMetadata"] = json!(metadata);
        }
        if let Some(context) = self.pool.user_context_data(&self.username) {
            body["UserContextData"] = context;
        }

        self.pool
            .dispatcher()
            .dispatch(Action::ConfirmForgotPassword, body)
            .await?;

        Ok(())
    }

    /// Request a verification code for an attribute (email, phone number).
    pub async fn get_attribute_verification_code(
        &mut self,
        attribute_name: &str,
        client_metadata: Option<&ClientMetadata>,
    ) -> Result<Option<CodeDeliveryDetails>, CognitoError> {
        let access_token = self.access_token().await?;

        let mut body = json!({
            "AttributeName": attribute_name,
            "AccessToken": access_token,
        });
        if let Some(metadata) = client_metadata {
            body["ClientMetadata"] = json!(metadata);
        }

        let response = self
            .pool
            .dispatcher()
            .dispatch(Action::GetUserAttributeVerificationCode, body)
            .await?;

        Ok(response
            .get("CodeDeliveryDetails")
            .cloned()
            .and_then(|details| serde_json::from_value(details).ok()))
    }

    /// Verify an attribute with the delivered code.
    pub async fn verify_attribute(
        &mut self,
        attribute_name: &str,
        confirmation_code: &str,
    ) -> Result<(), CognitoError> {
        let access_token = self.access_token().await?;

        self.pool
            .dispatcher()
            .dispatch(
                Action::VerifyUserAttribute,
                json!({
                    "AttributeName": attribute_name,
                    "Code": confirmation_code,
                    "AccessToken": access_token,
                }),
            )
            .await?;

        Ok(())
    }

    /// Fetch the user's attributes, refreshing the per-attribute cache.
    pub async fn get_user_attributes(&mut self) -> Result<Vec<UserAttribute>, CognitoError> {
        let response = self.get_user().await?;

        self.pool
            .cache()
            .cache_attributes(&self.username, &response.user_attributes);

        Ok(response.user_attributes)
    }

    /// Fetch the user's legacy MFA options.
    pub async fn get_mfa_options(&mut self) -> Result<Vec<MfaOption>, CognitoError> {
        Ok(self.get_user().await?.mfa_options)
    }

    /// Update attributes, returning delivery details for any that now need
    /// verification.
    pub async fn update_attributes(
        &mut self,
        attributes: &[UserAttribute],
        client_metadata: Option<&ClientMetadata>,
    ) -> Result<Vec<CodeDeliveryDetails>, CognitoError> {
        let access_token = self.access_token().await?;

        let mut body = json!({
            "UserAttributes": attributes,
            "AccessToken": access_token,
        });
        if let Some(metadata) = client_metadata {
            body["ClientMetadata"] = json!(metadata);
        }

        let response = self
            .pool
            .dispatcher()
            .dispatch(Action::UpdateUserAttributes, body)
            .await?;

        self.pool.cache().cache_attributes(&self.username, attributes);

        Ok(response
            .get("CodeDeliveryDetailsList")
            .cloned()
            .and_then(|details| serde_json::from_value(details).ok())
            .unwrap_or_default())
    }

    /// Delete attributes from the user.
    pub async fn delete_attributes(
        &mut self,
        attribute_names: &[String],
    ) -> Result<(), CognitoError> {
        let access_token = self.access_token().await?;

        self.pool
            .dispatcher()
            .dispatch(
                Action::DeleteUserAttributes,
                json!({
                    "UserAttributeNames": attribute_names,
                    "AccessToken": access_token,
                }),
            )
            .await?;

        let cache = self.pool.cache();
        for name in attribute_names {
            cache.remove_attribute(&self.username, name);
        }

        Ok(())
    }

    /// Set the user's MFA preference per factor.
    pub async fn set_user_mfa_preference(
        &mut self,
        sms_settings: Option<MfaSettings>,
        software_token_settings: Option<MfaSettings>,
    ) -> Result<(), CognitoError> {
        let access_token = self.access_token().await?;

        let mut body = json!({ "AccessToken": access_token });
        if let Some(settings) = sms_settings {
            body["SMSMfaSettings"] = json!(settings);
        }
        if let Some(settings) = software_token_settings {
            body["SoftwareTokenMfaSettings"] = json!(settings);
        }

        self.pool
            .dispatcher()
            .dispatch(Action::SetUserMfaPreference, body)
            .await?;

        Ok(())
    }

    /// Enable SMS MFA through the legacy user-settings API.
    pub async fn enable_mfa(&mut self) -> Result<(), CognitoError> {
        self.set_user_settings(json!([{
            "DeliveryMedium": "SMS",
            "AttributeName": "phone_number",
        }]))
        .await
    }

    /// Disable MFA through the legacy user-settings API.
    pub async fn disable_mfa(&mut self) -> Result<(), CognitoError> {
        self.set_user_settings(json!([])).await
    }

    /// Delete the signed-in user, then drop all local state for them.
    pub async fn delete_user(&mut self) -> Result<(), CognitoError> {
        let access_token = self.access_token().await?;

        self.pool
            .dispatcher()
            .dispatch(Action::DeleteUser, json!({ "AccessToken": access_token }))
            .await?;

        info!(username = self.username.as_str(); "Deleted user");

        self.sign_out();

        Ok(())
    }

    /// List the devices tracked for the user.
    pub async fn list_devices(
        &mut self,
        limit: Option<u32>,
        pagination_token: Option<&str>,
    ) -> Result<DeviceList, CognitoError> {
        let access_token = self.access_token().await?;

        let mut body = json!({ "AccessToken": access_token });
        if let Some(limit) = limit {
            body["Limit"] = json!(limit);
        }
        if let Some(token) = pagination_token {
            body["PaginationToken"] = json!(token);
        }

        let value = self
            .pool
            .dispatcher()
            .dispatch(Action::ListDevices, body)
            .await?;

        parse_response(value)
    }

    /// Fetch the current (remembered) device.
    pub async fn get_device(&mut self) -> Result<Device, CognitoError> {
        let device_key = self.cached_device_key()?;
        let access_token = self.access_token().await?;

        let value = self
            .pool
            .dispatcher()
            .dispatch(
                Action::GetDevice,
                json!({
                    "AccessToken": access_token,
                    "DeviceKey": device_key,
                }),
            )
            .await?;

        parse_response(
            value
                .get("Device")
                .cloned()
                .unwrap_or(Value::Object(serde_json::Map::new())),
        )
    }

    /// Stop tracking the current device and drop its cached credentials.
    pub async fn forget_device(&mut self) -> Result<(), CognitoError> {
        let device_key = self.cached_device_key()?;
        self.forget_specific_device(&device_key).await?;

        self.device_key = None;
        self.device_group_key = None;
        self.device_password = None;
        self.pool.cache().clear_device(&self.username);

        Ok(())
    }

    /// Stop tracking a device by key.
    pub async fn forget_specific_device(&mut self, device_key: &str) -> Result<(), CognitoError> {
        let access_token = self.access_token().await?;

        self.pool
            .dispatcher()
            .dispatch(
                Action::ForgetDevice,
                json!({
                    "AccessToken": access_token,
                    "DeviceKey": device_key,
                }),
            )
            .await?;

        Ok(())
    }

    /// Mark the current device as remembered.
    pub async fn set_device_status_remembered(&mut self) -> Result<(), CognitoError> {
        self.update_device_status("remembered").await
    }

    /// Mark the current device as not remembered.
    pub async fn set_device_status_not_remembered(&mut self) -> Result<(), CognitoError> {
        self.update_device_status("not_remembered").await
    }

    async fn update_device_status(&mut self, status: &str) -> Result<(), CognitoError> {
        let device_key = self.cached_device_key()?;
        let access_token = self.access_token().await?;

        self.pool
            .dispatcher()
            .dispatch(
                Action::UpdateDeviceStatus,
                json!({
                    "AccessToken": access_token,
                    "DeviceKey": device_key,
                    "DeviceRememberedStatus": status,
                }),
            )
            .await?;

        Ok(())
    }

    async fn set_user_settings(&mut self, mfa_options: Value) -> Result<(), CognitoError> {
        let access_token = self.access_token().await?;

        self.pool
            .dispatcher()
            .dispatch(
                Action::SetUserSettings,
                json!({
                    "MFAOptions": mfa_options,
                    "AccessToken": access_token,
                }),
            )
            .await?;

        Ok(())
    }

    async fn get_user(&mut self) -> Result<GetUserResponse, CognitoError> {
        let access_token = self.access_token().await?;

        let value = self
            .pool
            .dispatcher()
            .dispatch(Action::GetUser, json!({ "AccessToken": access_token }))
            .await?;

        parse_response(value)
    }

    fn cached_device_key(&self) -> Result<String, CognitoError> {
        self.device_key.clone().ok_or_else(|| {
            CognitoError::InvalidParameter(
                "No device key was cached for this user.".to_string(),
            )
        })
    }
}
