use quizport_canvas::CanvasApi;
use quizport_contract::UploadTarget;
use tracing::info;
use url::Url;

use crate::error::{MigrationError, ResponseStatus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadReceipt {
    Accepted { status: u16 },
    Confirmed { confirmation_url: Url },
}

/// The slot is pre-authorized, so the course credential is not attached.
/// A 301/302 reply is only a success once its `Location` has been fetched
/// with the credential.
pub async fn upload_package<A>(
    api: &A,
    target: &UploadTarget,
    file_name: &str,
    package: Vec<u8>,
) -> Result<UploadReceipt, MigrationError>
where
    A: CanvasApi + ?Sized,
{
    let size = package.len();
    info!(file_name, size, "uploading package");

    let response = api
        .upload_package(target, file_name, package)
        .await
        .map_err(|e| MigrationError::UploadRejected {
            status: ResponseStatus::NoResponse,
            body: e.to_string(),
        })?;

    if response.is_success() {
        info!(status = response.status, "package uploaded");
        return Ok(UploadReceipt::Accepted {
            status: response.status,
        });
    }

    if !response.is_redirect() {
        return Err(MigrationError::UploadRejected {
            status: ResponseStatus::Http(response.status),
            body: response.body,
        });
    }

    let location = response
        .location
        .as_deref()
        .map(str::trim)
        .filter(|location| !location.is_empty())
        .ok_or_else(|| MigrationError::UploadConfirmationFailed {
            status: ResponseStatus::Http(response.status),
            body: "redirect carried no Location header".to_string(),
        })?;

    let confirmation_url = resolve_location(&target.upload_url, location).ok_or_else(|| {
        MigrationError::UploadConfirmationFailed {
            status: ResponseStatus::Http(response.status),
            body: format!("unusable Location header `{location}`"),
        }
    })?;

    let confirmation = api.get_authorized(&confirmation_url).await.map_err(|e| {
        MigrationError::UploadConfirmationFailed {
            status: ResponseStatus::NoResponse,
            body: e.to_string(),
        }
    })?;

    if !confirmation.is_success() {
        return Err(MigrationError::UploadConfirmationFailed {
            status: ResponseStatus::Http(confirmation.status),
            body: confirmation.body,
        });
    }

    info!(confirmation_url = %confirmation_url, "package upload confirmed");
    Ok(UploadReceipt::Confirmed { confirmation_url })
}

// Location may be relative to the upload slot.
fn resolve_location(upload_url: &str, location: &str) -> Option<Url> {
    match Url::parse(location) {
        Ok(url) => Some(url),
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            Url::parse(upload_url).ok()?.join(location).ok()
        }
        Err(_) => None,
    }
}
