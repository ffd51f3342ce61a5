// Maps AWS SDK failures onto the deployment error taxonomy

use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use frontdeploy_core::Error;
use std::fmt::Debug;

const TRANSIENT_CODES: &[&str] = &[
    "Throttling",
    "ThrottlingException",
    "ThrottledException",
    "RequestLimitExceeded",
    "TooManyRequestsException",
    "SlowDown",
    "RequestTimeout",
    "RequestTimeoutException",
    "InternalError",
    "InternalFailure",
    "ServiceUnavailable",
    "ServiceUnavailableException",
];

const CREDENTIAL_CODES: &[&str] = &[
    "ExpiredToken",
    "ExpiredTokenException",
    "InvalidAccessKeyId",
    "InvalidClientTokenId",
    "InvalidToken",
    "MissingAuthenticationToken",
    "SignatureDoesNotMatch",
    "UnrecognizedClientException",
];

/// Classify any service SDK error. Transport-level failures are transient;
/// service errors are classified by their error code.
pub(crate) fn classify_sdk_error<E, R>(operation: &str, err: SdkError<E, R>) -> Error
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: Debug,
{
    let detail = DisplayErrorContext(&err).to_string();
    match &err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
            Error::TransientRemote(format!("{}: {}", operation, detail))
        }
        _ => classify_code(operation, err.code(), err.message().unwrap_or(&detail)),
    }
}

pub(crate) fn classify_code(operation: &str, code: Option<&str>, message: &str) -> Error {
    match code {
        Some("TooManyInvalidationsInProgress") => Error::TooManyInvalidations,
        Some("InvalidArgument") => {
            Error::PermanentRemote(format!("Invalid {} request: {}", operation, message))
        }
        Some(code) if TRANSIENT_CODES.contains(&code) => {
            Error::TransientRemote(format!("{}: {} - {}", operation, code, message))
        }
        Some(code) if CREDENTIAL_CODES.contains(&code) => {
            Error::Credential(format!("{}: {} - {}", operation, code, message))
        }
        Some(code) => Error::PermanentRemote(format!("{}: {} - {}", operation, code, message)),
        None => Error::PermanentRemote(format!("{}: {}", operation, message)),
    }
}
