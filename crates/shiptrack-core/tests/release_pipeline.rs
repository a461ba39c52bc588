//! Mobile and web release pipelines and version discovery

mod common;

use assert_matches::assert_matches;
use chrono::{TimeZone, Utc};
use common::*;
use shiptrack_core::coordination::release::{
    discover_versions, trigger_deployments, MobileRelease, PairStatus, SkipReason,
    WebDeployRequest, WebRelease,
};
use shiptrack_core::error::{Error, ErrorKind};
use shiptrack_core::types::{
    DeclaredKey, DeploymentRepoConfig, MergeMethod, ModuleVersionMap, RepoId, WebDeployTarget,
    WorkItem, WorkflowConclusion,
};
use tempfile::TempDir;

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

fn versions(pairs: &[(&str, &str)]) -> ModuleVersionMap {
    pairs
        .iter()
        .map(|(m, v)| (m.to_string(), v.to_string()))
        .collect()
}

fn web_target() -> WebDeployTarget {
    WebDeployTarget {
        repo: RepoId::new("acme", "web-values"),
        base_branch: "main".to_string(),
        path_template: "{module}/values-{environment}.yaml".to_string(),
        version_key: "tag".to_string(),
    }
}

fn tracked_item() -> WorkItem {
    let mut item = WorkItem::new("US100-1", repo(), "feature/starship/US100-1");
    item.pr_url = Some("https://github.com/acme/app/pull/42".to_string());
    item
}

fn values_file(tag: &str) -> String {
    format!("replicas: 2\nimage: registry.acme.io/api\ntag: {}\n", tag)
}

fn web_api() -> FakeHosting {
    let api = FakeHosting::new();
    api.state.lock().branches.insert("main".into(), "base-sha".into());
    api
}

// ---------------------------------------------------------------------------
// Web flavor
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_missing_versions_fail_before_any_remote_change() {
    let api = web_api();
    let target = web_target();
    let item = tracked_item();
    let modules = strings(&["api", "web", "worker"]);
    let environments = strings(&["dev"]);
    let known = versions(&[("api", "1.0.0"), ("worker", "3.0.0")]);

    let request = WebDeployRequest {
        item: &item,
        modules: &modules,
        environments: &environments,
        versions: &known,
    };
    let err = WebRelease::new(&api, &target)
        .create_deployment_pr(&request)
        .await
        .unwrap_err();

    assert_matches!(err, Error::MissingVersions(ref missing) if missing == &vec!["web".to_string()]);
    let state = api.state.lock();
    assert!(state.calls.is_empty());
    assert!(state.created_branches.is_empty());
    assert!(state.created_prs.is_empty());
}

#[tokio::test]
async fn test_web_pr_updates_every_pair() {
    let api = web_api();
    for module in ["api", "web"] {
        for env in ["dev", "prod"] {
            api.set_file(&format!("{}/values-{}.yaml", module, env), &values_file("0.0.1"));
        }
    }

    let target = web_target();
    let item = tracked_item();
    let modules = strings(&["api", "web"]);
    let environments = strings(&["dev", "prod"]);
    let known = versions(&[("api", "1.4.2"), ("web", "2.0.0")]);
    let request = WebDeployRequest {
        item: &item,
        modules: &modules,
        environments: &environments,
        versions: &known,
    };

    let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap();
    let pr = WebRelease::new(&api, &target)
        .create_deployment_pr_at(&request, now)
        .await
        .unwrap();

    assert_eq!(pr.branch, "chore/deploy-US100-1-20240501123000");
    assert_eq!(pr.updated_files, 4);
    assert!(pr.outcomes.iter().all(|o| o.is_updated()));

    let state = api.state.lock();
    assert_eq!(state.created_branches, vec![pr.branch.clone()]);
    assert_eq!(state.updates.len(), 4);
    let (path, branch, content) = &state.updates[0];
    assert_eq!(path, "api/values-dev.yaml");
    assert_eq!(branch, &pr.branch);
    assert_eq!(content, &values_file("1.4.2"));

    let (_, head, base, body) = &state.created_prs[0];
    assert_eq!(head, &pr.branch);
    assert_eq!(base, "main");
    assert!(body.contains("Ticket: US100-1"));
    assert!(body.contains("Source: acme/app (feature/starship/US100-1)"));
    assert!(body.contains("Source PR: https://github.com/acme/app/pull/42"));
    assert!(body.contains("Updated files: 4"));
}

#[tokio::test]
async fn test_web_pr_continues_past_failed_pairs() {
    let api = web_api();
    api.set_file("api/values-dev.yaml", &values_file("0.0.1"));
    api.set_file("api/values-prod.yaml", "replicas: 3\n");
    api.set_file("api/values-stage.yaml", &values_file("1.4.2"));
    api.set_file("api/values-qa.yaml", &values_file("0.0.1"));
    api.state.lock().fail_paths.insert("api/values-qa.yaml".into());
    // api/values-perf.yaml does not exist

    let target = web_target();
    let item = tracked_item();
    let modules = strings(&["api"]);
    let environments = strings(&["dev", "prod", "stage", "qa", "perf"]);
    let known = versions(&[("api", "1.4.2")]);
    let request = WebDeployRequest {
        item: &item,
        modules: &modules,
        environments: &environments,
        versions: &known,
    };

    let pr = WebRelease::new(&api, &target)
        .create_deployment_pr(&request)
        .await
        .unwrap();

    assert_eq!(pr.updated_files, 1);
    let statuses: Vec<&PairStatus> = pr.outcomes.iter().map(|o| &o.status).collect();
    assert_eq!(statuses[0], &PairStatus::Updated);
    assert_eq!(statuses[1], &PairStatus::Skipped(SkipReason::KeyMissing));
    assert_eq!(statuses[2], &PairStatus::Skipped(SkipReason::AlreadyCurrent));
    assert_matches!(statuses[3], PairStatus::Skipped(SkipReason::UpdateFailed(_)));
    assert_matches!(statuses[4], PairStatus::Skipped(SkipReason::FetchFailed(_)));
    assert_eq!(api.state.lock().created_prs.len(), 1);
}

#[tokio::test]
async fn test_no_files_updated_opens_no_pr() {
    let api = web_api();
    api.set_file("api/values-dev.yaml", "replicas: 1\n");

    let target = web_target();
    let item = tracked_item();
    let modules = strings(&["api"]);
    let environments = strings(&["dev"]);
    let known = versions(&[("api", "1.4.2")]);
    let request = WebDeployRequest {
        item: &item,
        modules: &modules,
        environments: &environments,
        versions: &known,
    };

    let err = WebRelease::new(&api, &target)
        .create_deployment_pr(&request)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoFilesUpdated);
    assert!(api.state.lock().created_prs.is_empty());
}

#[tokio::test]
async fn test_existing_branch_is_reused() {
    let api = web_api();
    api.set_file("api/values-dev.yaml", &values_file("0.0.1"));

    let target = web_target();
    let item = tracked_item();
    let modules = strings(&["api"]);
    let environments = strings(&["dev"]);
    let known = versions(&[("api", "1.4.2")]);
    let request = WebDeployRequest {
        item: &item,
        modules: &modules,
        environments: &environments,
        versions: &known,
    };
    let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap();
    let release = WebRelease::new(&api, &target);

    let first = release.create_deployment_pr_at(&request, now).await.unwrap();
    // Same branch name again: creation answers AlreadyExists
    api.set_file("api/values-dev.yaml", &values_file("0.0.1"));
    let second = release.create_deployment_pr_at(&request, now).await.unwrap();

    assert_eq!(first.branch, second.branch);
    assert_eq!(api.calls("create_branch"), 2);
    assert_eq!(api.state.lock().created_branches.len(), 1);
}

#[tokio::test]
async fn test_other_branch_errors_are_fatal() {
    let api = web_api();
    api.fail("create_branch");
    api.set_file("api/values-dev.yaml", &values_file("0.0.1"));

    let target = web_target();
    let item = tracked_item();
    let modules = strings(&["api"]);
    let environments = strings(&["dev"]);
    let known = versions(&[("api", "1.4.2")]);
    let request = WebDeployRequest {
        item: &item,
        modules: &modules,
        environments: &environments,
        versions: &known,
    };

    let err = WebRelease::new(&api, &target)
        .create_deployment_pr(&request)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ServerError);
    assert_eq!(api.calls("file_contents"), 0);
}

#[tokio::test]
async fn test_merge_uses_squash() {
    let api = web_api();
    let target = web_target();
    WebRelease::new(&api, &target)
        .merge_deployment_pr(101)
        .await
        .unwrap();
    assert_eq!(api.state.lock().merged, vec![(101, MergeMethod::Squash)]);
}

#[tokio::test]
async fn test_trigger_skips_malformed_responses() {
    let trigger = FakeTrigger {
        malformed: ["web/prod".to_string()].into_iter().collect(),
        ..FakeTrigger::default()
    };
    let item = tracked_item();
    let modules = strings(&["api", "web"]);
    let environments = strings(&["dev", "prod"]);
    let known = versions(&[("api", "1.4.2"), ("web", "2.0.0")]);
    let request = WebDeployRequest {
        item: &item,
        modules: &modules,
        environments: &environments,
        versions: &known,
    };

    let report = trigger_deployments(&trigger, "web-release", &request)
        .await
        .unwrap();

    assert_eq!(report.execution_urls.len(), 3);
    assert!(report
        .execution_urls
        .contains(&"https://deploy.example.com/executions/api/prod".to_string()));
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].0, "web");
    assert_eq!(report.skipped[0].1, "prod");

    let payloads = trigger.payloads.lock();
    assert_eq!(payloads.len(), 4);
    assert_eq!(payloads[0].pipeline, "web-release");
    assert_eq!(payloads[0].version, "1.4.2");
    assert_eq!(payloads[0].ticket, "US100-1");
}

#[tokio::test]
async fn test_trigger_aborts_on_auth_failure() {
    let trigger = FakeTrigger {
        unauthorized: true,
        ..FakeTrigger::default()
    };
    let item = tracked_item();
    let modules = strings(&["api"]);
    let environments = strings(&["dev"]);
    let known = versions(&[("api", "1.4.2")]);
    let request = WebDeployRequest {
        item: &item,
        modules: &modules,
        environments: &environments,
        versions: &known,
    };

    let err = trigger_deployments(&trigger, "web-release", &request)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthenticated);
}

// ---------------------------------------------------------------------------
// Version discovery
// ---------------------------------------------------------------------------

fn publish_log(module: &str, version: &str) -> String {
    format!(
        "#5 pushing registry.acme.io/platform/team/apps/{}:{} done\n",
        module, version
    )
}

#[tokio::test]
async fn test_discovery_prefers_newest_run_and_stops_early() {
    let api = FakeHosting::new();
    {
        let mut state = api.state.lock();
        state.recent_runs = vec![
            run(3, WorkflowConclusion::Failure),
            run(2, WorkflowConclusion::Success),
            run(1, WorkflowConclusion::Success),
        ];
        state.jobs.insert(3, vec![job(30, 3, "Docker Publish (api)"), job(31, 3, "unit tests")]);
        state.jobs.insert(2, vec![job(20, 2, "container scan")]);
        state.jobs.insert(1, vec![job(10, 1, "Docker Publish")]);
        state.logs.insert(30, publish_log("api", "1.4.2"));
        state.logs.insert(31, publish_log("web", "9.9.9"));
        state.logs.insert(
            20,
            format!("{}{}", publish_log("api", "1.4.1"), publish_log("web", "2.0.0")),
        );
        state.logs.insert(10, publish_log("worker", "0.1.0"));
    }

    let found = discover_versions(&api, &repo(), "main", &["api", "web"])
        .await
        .unwrap();

    assert_eq!(found.get("api"), Some("1.4.2"));
    assert_eq!(found.get("web"), Some("2.0.0"));
    assert_eq!(found.len(), 2);
    // Run 1 is never inspected
    assert_eq!(api.calls("jobs"), 2);
}

#[tokio::test]
async fn test_discovery_returns_partial_results_past_failures() {
    let api = FakeHosting::new();
    {
        let mut state = api.state.lock();
        state.recent_runs = vec![run(2, WorkflowConclusion::Success), run(1, WorkflowConclusion::Success)];
        state.malformed_jobs.insert(2);
        state.jobs.insert(1, vec![job(10, 1, "Docker Publish"), job(11, 1, "Container Scan")]);
        state.logs.insert(11, publish_log("api", "1.0.0"));
        // job 10 has no logs
    }

    let found = discover_versions(&api, &repo(), "main", &["api", "web"])
        .await
        .unwrap();
    assert_eq!(found.get("api"), Some("1.0.0"));
    assert_eq!(found.missing(&["api", "web"]), vec!["web"]);
}

#[tokio::test]
async fn test_discovery_fails_only_when_runs_cannot_be_listed() {
    let api = FakeHosting::new();
    api.fail("list_runs");
    let err = discover_versions(&api, &repo(), "main", &["api"])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ServerError);
}

// ---------------------------------------------------------------------------
// Mobile flavor
// ---------------------------------------------------------------------------

const MOBILE_CONFIG: &str = "\
app: starship
deploy:
  # bumped by release tooling
  tag: \"2.3.3\"
  channel: beta
";

fn mobile_setup() -> (TempDir, DeploymentRepoConfig) {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir_all(dir.path().join("deploy")).unwrap();
    std::fs::write(dir.path().join("deploy/config.yml"), MOBILE_CONFIG).unwrap();

    let config = DeploymentRepoConfig {
        repo: RepoId::new("acme", "mobile-deploy"),
        local_path: dir.path().to_path_buf(),
        env_branch: "staging".to_string(),
        config_path: "deploy/config.yml".to_string(),
        config_key: DeclaredKey::nested("deploy", "tag"),
    };
    (dir, config)
}

#[tokio::test]
async fn test_mobile_release_updates_config_and_opens_pr() {
    let (dir, config) = mobile_setup();
    let api = FakeHosting::new();
    let vcs = FakeVcs::default();

    let mut item = tracked_item();
    item.latest_tag = Some("2.3.4".to_string());

    let result = MobileRelease::new(&api, &vcs)
        .update_deployment_config(&config, &item)
        .await
        .unwrap();

    assert_eq!(result.branch, "chore/update-mobile-tag-2.3.4");
    assert_eq!(result.pr_url, "https://github.com/acme/deploy/pull/101");

    let written = std::fs::read_to_string(dir.path().join("deploy/config.yml")).unwrap();
    assert_eq!(written, MOBILE_CONFIG.replace("\"2.3.3\"", "\"2.3.4\""));

    assert_eq!(
        *vcs.calls.lock(),
        vec![
            "checkout staging false",
            "pull staging",
            "checkout chore/update-mobile-tag-2.3.4 true",
            "commit Update mobile deploy tag to 2.3.4",
            "push chore/update-mobile-tag-2.3.4",
        ]
    );

    let state = api.state.lock();
    let (title, head, base, _) = &state.created_prs[0];
    assert!(title.contains("2.3.4"));
    assert_eq!(head, "chore/update-mobile-tag-2.3.4");
    assert_eq!(base, "staging");
}

#[tokio::test]
async fn test_mobile_release_requires_tag() {
    let (_dir, config) = mobile_setup();
    let api = FakeHosting::new();
    let vcs = FakeVcs::default();

    let mut item = tracked_item();
    item.latest_tag = Some("   ".to_string());
    let err = MobileRelease::new(&api, &vcs)
        .update_deployment_config(&config, &item)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::MissingTag);
    assert!(vcs.calls.lock().is_empty());
}

#[tokio::test]
async fn test_mobile_release_rejects_config_without_key() {
    let (dir, config) = mobile_setup();
    std::fs::write(dir.path().join("deploy/config.yml"), "app: starship\n").unwrap();
    let api = FakeHosting::new();
    let vcs = FakeVcs::default();

    let mut item = tracked_item();
    item.latest_tag = Some("2.3.4".to_string());
    let err = MobileRelease::new(&api, &vcs)
        .update_deployment_config(&config, &item)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidConfigFile);
    assert!(api.state.lock().created_prs.is_empty());
}

#[tokio::test]
async fn test_mobile_release_aborts_on_vcs_failure() {
    let (_dir, config) = mobile_setup();
    let api = FakeHosting::new();
    let vcs = FakeVcs {
        fail_on: Some("push"),
        ..FakeVcs::default()
    };

    let mut item = tracked_item();
    item.latest_tag = Some("2.3.4".to_string());
    let err = MobileRelease::new(&api, &vcs)
        .update_deployment_config(&config, &item)
        .await
        .unwrap_err();

    assert_matches!(err, Error::Vcs(ref msg) if msg.contains("push"));
    assert!(api.state.lock().created_prs.is_empty());
}
