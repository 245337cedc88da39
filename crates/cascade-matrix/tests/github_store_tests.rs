//! HTTP tests for the raw content store and a full setup run against it.

use cascade_core::{
    BuildMatrix, ConfigStore, FetchOutcome, PackageSetup, SetupConfig, SourceRef, TriggerContext,
};
use cascade_graph::derive_all;
use cascade_matrix::{
    AssemblerSettings, GithubOutputFile, GithubRawStore, MatrixAssembler, MatrixError, RunInputs,
    publish,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CI_CONFIG: &str = r#"
matrix:
  - mpi_on
  - mpi_off
"#;

fn init_test_logging() {
    use tracing_subscriber::{EnvFilter, fmt};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn,cascade_matrix=debug")),
        )
        .with_test_writer()
        .try_init();
}

fn base_matrix() -> BuildMatrix {
    serde_yaml::from_str(
        "name: [gnu, clang]\ninclude:\n  - name: gnu\n    labels: gnu\n  - name: clang\n    labels: clang\n",
    )
    .unwrap()
}

fn package(name: &str) -> PackageSetup {
    let mut package = PackageSetup::new(name, "ecmwf", name);
    package.path = ".github/ci-config.yml".to_string();
    package
}

#[tokio::test]
async fn test_fetch_found_sends_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ecmwf/eckit/develop/.github/ci-config.yml"))
        .and(header("Authorization", "token secret"))
        .respond_with(ResponseTemplate::new(200).set_body_string(CI_CONFIG))
        .mount(&server)
        .await;

    let store = GithubRawStore::new(&server.uri(), Some("secret".to_string())).unwrap();
    let outcome = store
        .fetch(&SourceRef::new("ecmwf", "eckit", "develop"), ".github/ci-config.yml")
        .await;
    match outcome {
        FetchOutcome::Found(document) => {
            assert_eq!(document.matrix, Some(json!(["mpi_on", "mpi_off"])));
        }
        FetchOutcome::Missing(failure) => panic!("unexpected failure: {failure}"),
    }
}

#[tokio::test]
async fn test_fetch_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404).set_body_string("404: Not Found"))
        .mount(&server)
        .await;

    let store = GithubRawStore::new(&server.uri(), None).unwrap();
    let outcome = store
        .fetch(&SourceRef::new("ecmwf", "eckit", "develop"), "missing.yml")
        .await;
    match outcome {
        FetchOutcome::Missing(failure) => {
            assert_eq!(failure.status, Some(404));
            assert_eq!(failure.detail, "404: Not Found");
        }
        FetchOutcome::Found(_) => panic!("expected a missing config"),
    }
}

#[tokio::test]
async fn test_slow_server_times_out() {
    init_test_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(CI_CONFIG)
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let store = GithubRawStore::new(&server.uri(), None).unwrap();
    let settings = AssemblerSettings {
        fetch_timeout: Duration::from_millis(50),
        fetch_concurrency: 4,
    };
    let setup = SetupConfig {
        packages: vec![package("eckit")],
    };
    let trigger = TriggerContext::new("develop", "ecmwf/eckit").unwrap();
    let inputs = RunInputs {
        matrix: base_matrix(),
        ..Default::default()
    };

    let err = MatrixAssembler::new(Arc::new(store), settings)
        .assemble(&setup, &inputs, &trigger)
        .await
        .unwrap_err();
    assert!(matches!(err, MatrixError::TriggerConfigMissing { .. }));
}

#[tokio::test]
async fn test_setup_run_writes_github_output() {
    init_test_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ecmwf/eckit/master/.github/ci-config.yml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(CI_CONFIG))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/ecmwf/metkit/master/.github/ci-config.yml"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let store = GithubRawStore::new(&server.uri(), None).unwrap();
    let setup = SetupConfig {
        packages: vec![package("eckit"), package("metkit")],
    };
    let trigger = TriggerContext::new("master", "ecmwf/eckit")
        .unwrap()
        .with_skip_jobs("clang\n");
    let inputs = RunInputs {
        matrix: base_matrix(),
        ..Default::default()
    };

    let assembly = MatrixAssembler::new(Arc::new(store), AssemblerSettings::default())
        .assemble(&setup, &inputs, &trigger)
        .await
        .unwrap();
    assert_eq!(assembly.excluded.len(), 1);
    assert_eq!(assembly.excluded[0].1.status, Some(500));

    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("github_output");
    let tree = cascade_core::DependencyTree::from_yaml_str("eckit: {}\nmetkit: {deps: [eckit]}\n").unwrap();
    let mut sink = GithubOutputFile::new(&output);
    publish(&assembly, &derive_all(&tree).unwrap(), &mut sink).unwrap();

    let content = std::fs::read_to_string(&output).unwrap();
    assert!(content.starts_with("trigger_repo=eckit\n"));
    assert!(content.contains("build_package_dep_tree<<EOF\n"));
    assert!(content.contains(
        "eckit<<EOF\n{\"name\":[\"gnu\"],\"include\":[{\"name\":\"gnu\",\"labels\":\"gnu\",\
         \"owner_repo_ref\":\"ecmwf/eckit@master\",\"config_path\":\".github/ci-config.yml\"}],\
         \"config\":[\"mpi_on\",\"mpi_off\"]}\nEOF\n"
    ));
    assert!(!content.contains("metkit<<EOF"));
}
