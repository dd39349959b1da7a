//! Three-container task definition of one execution.
//!
//! ```text
//! workspace-setup ──COMPLETE──▶ main-container ──COMPLETE──▶ workspace-teardown
//!   bucket → volume               runs the script              volume → bucket
//!   essential: no                 essential: no                essential: yes
//! ```

use std::collections::BTreeMap;

use ephemeral_common::naming::{self, containers};
use ephemeral_common::{
    ContainerDefinition, ContainerDependency, DependencyCondition, ExecutionSettings,
    LogConfiguration, MountPoint, RunnerConfig, TaskDefinitionRequest, Tags,
};

/// Shell running the sidecars; the sidecar image ships it.
const SIDECAR_SHELL: &str = "bash";

/// Chain the non-blank lines of `script` with `&&` so the first failing line
/// fails the whole script.
#[must_use]
pub fn chain_script(script: &str) -> String {
    script
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join(" && ")
}

fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// `--exclude`/`--include` arguments of the storage CLI's sync command.
/// Every pattern is treated as a prefix.
///
/// The CLI lets the last matching filter win and admits unmatched keys, so
/// a non-empty include list is preceded by `--exclude '*'` and the excludes
/// come last. This gives the same result as [`crate::domain::FilterChain`]:
/// includes act as a whitelist and excludes always win.
#[must_use]
pub fn sync_args(excludes: &[String], includes: &[String]) -> String {
    let prefix = |flag: &str, p: &String| format!("{flag} {}", shell_quote(&format!("{p}*")));
    let whitelist = (!includes.is_empty()).then(|| "--exclude '*'".to_string());
    whitelist
        .into_iter()
        .chain(includes.iter().map(|p| prefix("--include", p)))
        .chain(excludes.iter().map(|p| prefix("--exclude", p)))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Command of the setup sidecar: bucket → shared volume.
#[must_use]
pub fn setup_command(bucket: &str) -> String {
    format!("aws s3 sync s3://{bucket} .")
}

/// Command of the teardown sidecar: shared volume → bucket, filtered by the
/// download lists.
#[must_use]
pub fn teardown_command(bucket: &str, excludes: &[String], includes: &[String]) -> String {
    let args = sync_args(excludes, includes);
    if args.is_empty() {
        format!("aws s3 sync . s3://{bucket}")
    } else {
        format!("aws s3 sync . s3://{bucket} {args}")
    }
}

/// Build the registration request for `settings`.
#[must_use]
pub fn build_task_definition(
    settings: &ExecutionSettings,
    bucket: &str,
    tags: &Tags,
    config: &RunnerConfig,
) -> TaskDefinitionRequest {
    let log_configuration = LogConfiguration {
        group: settings.cluster_name.clone(),
        region: settings.region.clone(),
        stream_prefix: config.log_stream_prefix.clone(),
        create_group: true,
    };
    let mount_points = vec![MountPoint {
        container_path: config.workspace_mount_path.clone(),
        source_volume: containers::WORKSPACE_VOLUME.to_string(),
    }];
    let sidecar = |name: &str, command: String, essential: bool| ContainerDefinition {
        name: name.to_string(),
        image: config.sidecar_image.clone(),
        essential,
        entry_point: vec![SIDECAR_SHELL.to_string(), "-c".to_string()],
        command: vec![command],
        working_directory: config.workspace_mount_path.clone(),
        environment: BTreeMap::new(),
        depends_on: Vec::new(),
        mount_points: mount_points.clone(),
        log_configuration: log_configuration.clone(),
    };

    let main = ContainerDefinition {
        name: containers::MAIN.to_string(),
        image: settings.image.clone(),
        essential: false,
        entry_point: vec![settings.shell.clone(), "-c".to_string()],
        command: vec![chain_script(&settings.run)],
        working_directory: config.workspace_mount_path.clone(),
        environment: settings.environment.clone(),
        depends_on: vec![ContainerDependency {
            container_name: containers::SETUP.to_string(),
            condition: DependencyCondition::Complete,
        }],
        mount_points: mount_points.clone(),
        log_configuration: log_configuration.clone(),
    };

    let setup = sidecar(containers::SETUP, setup_command(bucket), false);

    let mut teardown = sidecar(
        containers::TEARDOWN,
        teardown_command(
            bucket,
            &settings.download_excludes,
            &settings.download_includes,
        ),
        true,
    );
    teardown.depends_on = vec![ContainerDependency {
        container_name: containers::MAIN.to_string(),
        condition: DependencyCondition::Complete,
    }];

    TaskDefinitionRequest {
        family: naming::task_definition_family(&settings.unique_execution_id),
        cpu: settings.cpu.clone(),
        memory: settings.memory.clone(),
        execution_role_arn: settings.execution_role_arn.clone(),
        task_role_arn: settings.task_role_arn.clone(),
        volumes: vec![containers::WORKSPACE_VOLUME.to_string()],
        containers: vec![main, setup, teardown],
        tags: tags.clone(),
    }
}
