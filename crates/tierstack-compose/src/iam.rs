//! Task execution role and container log group.

use serde_json::json;
use tierstack_common::constants::{TASK_EXECUTION_POLICY_ARN, TASK_EXECUTION_PRINCIPAL};
use tierstack_common::error::Result;
use tierstack_common::types::ResourceId;
use tierstack_provider::ComputeApi;
use tierstack_provider::spec::{LogGroupSpec, PolicyAttachmentSpec, RoleSpec};

/// Resources every task definition of a stack runs with.
#[derive(Debug, Clone)]
pub struct TaskExecution {
    /// Role the container agent assumes.
    pub role_id: ResourceId,
    /// Attachment of the managed execution policy.
    pub policy_attachment_id: ResourceId,
    /// Log group receiving container output.
    pub log_group_id: ResourceId,
}

/// Trust policy letting the container agent assume the execution role.
#[must_use]
pub fn trust_policy() -> serde_json::Value {
    json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Action": "sts:AssumeRole",
            "Principal": { "Service": TASK_EXECUTION_PRINCIPAL },
            "Effect": "Allow",
            "Sid": "",
        }],
    })
}

/// Creates the execution role, attaches the managed execution policy, and
/// creates the log group.
///
/// # Errors
///
/// Returns the provider's error for the first resource that cannot be created.
pub async fn create_task_execution<P>(
    provider: &P,
    prefix: &str,
    log_retention_days: u32,
) -> Result<TaskExecution>
where
    P: ComputeApi + ?Sized,
{
    let role_name = format!("{prefix}-task-execution");
    let role_id = provider
        .create_role(&RoleSpec {
            name: role_name.clone(),
            assume_role_policy: serde_json::to_string(&trust_policy())?,
        })
        .await?;
    let policy_attachment_id = provider
        .attach_role_policy(&PolicyAttachmentSpec {
            name: format!("{role_name}-policy"),
            role_id: role_id.clone(),
            policy_arn: TASK_EXECUTION_POLICY_ARN.into(),
        })
        .await?;
    let log_group_id = provider
        .create_log_group(&LogGroupSpec {
            name: format!("{prefix}-logs"),
            retention_days: log_retention_days,
        })
        .await?;

    tracing::info!(role = %role_id, log_group = %log_group_id, "task execution resources declared");
    Ok(TaskExecution {
        role_id,
        policy_attachment_id,
        log_group_id,
    })
}

#[cfg(test)]
mod tests {
    use tierstack_provider::MemoryProvider;
    use tierstack_provider::record::ResourceKind;

    use super::*;

    #[test]
    fn trust_policy_names_task_principal() {
        let policy = trust_policy();
        let statement = &policy["Statement"][0];
        assert_eq!(statement["Action"], "sts:AssumeRole");
        assert_eq!(statement["Principal"]["Service"], "ecs-tasks.amazonaws.com");
        assert_eq!(statement["Effect"], "Allow");
    }

    #[tokio::test]
    async fn policy_is_attached_to_the_role() {
        let provider = MemoryProvider::new("us-east-1");
        let execution = create_task_execution(&provider, "infra", 1).await.expect("create");

        let attachments = provider.records_of(ResourceKind::RolePolicyAttachment).await;
        assert_eq!(attachments.len(), 1);
        assert_eq!(attachments[0].id, execution.policy_attachment_id);
        assert!(attachments[0].depends_on.contains(&execution.role_id));
        assert_eq!(
            attachments[0].property("policy_arn"),
            Some(TASK_EXECUTION_POLICY_ARN)
        );

        let logs = provider.records_of(ResourceKind::LogGroup).await;
        assert_eq!(logs[0].properties["retention_days"], 1);
    }
}
