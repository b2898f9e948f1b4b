#![crate_name = "aws_cognito_auth"]

//! # AWS Cognito Auth
//!
//! A Rust client for Amazon Cognito user pools.
//!
//! This covers the full client-side authentication surface: the Secure Remote Password (SRP)
//! exchange (`USER_SRP_AUTH` / `PASSWORD_VERIFIER`), the challenge tree (SMS and TOTP MFA,
//! MFA selection and setup, new-password-required, custom challenges), device trust
//! (`ConfirmDevice`, `DEVICE_SRP_AUTH` / `DEVICE_PASSWORD_VERIFIER`), and a locally persisted,
//! silently refreshing session.
//!
//! ## Usage
//!
//! ```toml
//! [dependencies]
//! aws-cognito-auth = "0.1.0"
//! ```
//!
//! ### Signing in
//!
//! The [authentication flow](https://docs.aws.amazon.com/cognito/latest/developerguide/amazon-cognito-user-pools-authentication-flow-methods.html#Built-in-authentication-flow-and-challenges)
//! is described in detail in the AWS Cognito documentation.
//!
//! Each step of a flow returns an [`AuthFlowResponse`]: either the completed session, or the
//! challenge to answer next.
//!
//! ```no_run
//! use aws_cognito_auth::{
//!     AuthFlowResponse, AuthenticationDetails, MfaType, PoolConfig, UserPool,
//! };
//!
//! # async fn example() -> Result<(), aws_cognito_auth::CognitoError> {
//! let pool = UserPool::new(PoolConfig {
//!     // The ID of the AWS Cognito User Pool the user is registered with.
//!     user_pool_id: "us-east-1_SqmNeowUdp".to_string(),
//!
//!     // The app client to authenticate against.
//!     client_id: "<client id>".to_string(),
//!
//!     // Optional: If your App client is configured with a client secret, AWS Cognito
//!     // will require that a secret hash is provided during the authentication flow.
//!     //
//!     // https://docs.aws.amazon.com/cognito/latest/developerguide/signing-up-users-in-your-app.html#cognito-user-pools-computing-secret-hash
//!     client_secret: None,
//!
//!     ..PoolConfig::default()
//! })?;
//!
//! let mut user = pool.user("<username>")?;
//!
//! let response = user
//!     .authenticate_user(&AuthenticationDetails::from_password("<password>"))
//!     .await?;
//!
//! match response {
//!     AuthFlowResponse::Done { session, .. } => {
//!         println!("signed in until {:?}", session.access_token().expiration());
//!     }
//!     AuthFlowResponse::SmsMfaRequired { .. } => {
//!         let code = "<code the user received>";
//!         let _completed = user.send_mfa_code(code, MfaType::SmsMfa, None).await?;
//!     }
//!     other => println!("another challenge: {other:?}"),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ### Silent sign-in
//!
//! Completed sessions are written to the configured [`Storage`] (an in-memory fallback is
//! used when none is injected). [`CognitoUser::get_session`] rebuilds the session from
//! storage and silently refreshes it through `REFRESH_TOKEN_AUTH` when the access token
//! has expired.
//!
//! ```no_run
//! # async fn example(pool: aws_cognito_auth::UserPool) -> Result<(), aws_cognito_auth::CognitoError> {
//! if let Some(mut user) = pool.current_user() {
//!     let session = user.get_session().await?;
//!     assert!(session.is_valid());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ### Device trust
//!
//! When the pool tracks devices, a terminal authentication returns `NewDeviceMetadata`; the
//! device is then confirmed automatically - a random device password is generated, its salted
//! verifier registered through `ConfirmDevice`, and the credentials cached. Later sign-ins
//! answer the `DEVICE_SRP_AUTH` challenge with those credentials, without surfacing it to the
//! caller.
//!
//! ### Injecting transport and storage
//!
//! The identity provider is reached through the [`IdpDispatcher`] trait ([`HttpDispatcher`]
//! by default), and tokens are persisted through the [`Storage`] trait. Both can be replaced
//! via [`PoolConfig`] - tests drive the full state machine against a scripted dispatcher.

#[macro_use]
extern crate lazy_static;

pub use crate::error::{CognitoError, SrpError};
pub use crate::idp::{Action, HttpDispatcher, IdpDispatcher};
pub use crate::pool::{
    ClientMetadata, CodeDeliveryDetails, PoolConfig, SignUpResult, UserAttribute,
    UserContextProvider, UserPool,
};
pub use crate::session::UserSession;
pub use crate::srp::{
    AuthParameters, Credentials, PasswordVerifierParameters, SrpClient, TrackedDevice,
    UntrackedDevice, User, VerificationParameters,
};
pub use crate::storage::{MemoryStorage, Storage};
pub use crate::token::{JwtToken, RefreshToken};
pub use crate::user::{
    AuthFlowResponse, AuthFlowType, AuthenticationDetails, ChallengeName, CognitoUser, Device,
    DeviceList, MfaOption, MfaSettings, MfaType,
};

mod cache;
mod constant;
mod error;
mod idp;
mod pool;
mod session;
mod srp;
mod storage;
mod token;
mod user;
