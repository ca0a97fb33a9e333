use quizport_canvas::CanvasApi;
use quizport_contract::{parse_upload_target, MigrationRequest, UploadTarget};
use tracing::{debug, info};

use crate::error::{MigrationError, ResponseStatus};

const OPERATION: &str = "content migration initiation";

pub async fn initiate_migration<A>(
    api: &A,
    request: &MigrationRequest,
) -> Result<UploadTarget, MigrationError>
where
    A: CanvasApi + ?Sized,
{
    info!(
        course_id = request.course_id,
        file_name = %request.file_name,
        migration_type = request.migration_type.as_str(),
        "opening content migration"
    );

    let response = api
        .create_migration(request)
        .await
        .map_err(|e| MigrationError::unreachable(OPERATION, e))?;

    if !response.is_success() {
        return Err(MigrationError::RemoteRejected {
            operation: OPERATION,
            status: ResponseStatus::Http(response.status),
            body: response.body,
        });
    }

    let target = parse_upload_target(&response.body)
        .map_err(|e| MigrationError::malformed(OPERATION, e))?;

    debug!(
        upload_params = target.upload_params.len(),
        progress_url = %target.progress_url,
        "upload slot issued"
    );
    Ok(target)
}
