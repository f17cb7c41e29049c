// tests/integration/error_handling.rs

use std::io::Write;

use tempfile::NamedTempFile;

use execplan::config::load_and_validate;
use execplan::dag::{ExecutionPlan, NodeState};
use execplan::errors::ExecPlanError;

fn config_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{contents}").unwrap();
    file
}

#[test]
fn test_dag_cycle_returns_structured_error() {
    let file = config_file(
        r#"
[task.A]
cmd = "echo A"
after = ["B"]

[task.B]
cmd = "echo B"
after = ["A"]
"#,
    );

    let cfg = load_and_validate(file.path()).unwrap();
    let result = ExecutionPlan::from_config(&cfg);

    match result {
        Err(err @ ExecPlanError::DependencyCycle { .. }) => {
            let msg = err.to_string();
            assert!(msg.contains("dependency cycle detected"));
            assert!(msg.contains("A -> B") || msg.contains("B -> A"));
        }
        Err(e) => panic!("Expected DependencyCycle error, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn test_self_dependency_is_a_cycle() {
    let file = config_file(
        r#"
[task.A]
cmd = "echo A"
after = ["A"]
"#,
    );

    let cfg = load_and_validate(file.path()).unwrap();
    match ExecutionPlan::from_config(&cfg) {
        Err(ExecPlanError::DependencyCycle { cycle }) => assert_eq!(cycle, vec!["A", "A"]),
        other => panic!("Expected DependencyCycle error, got: {:?}", other),
    }
}

#[test]
fn test_unknown_dependency_returns_config_error() {
    let file = config_file(
        r#"
[task.A]
cmd = "echo A"
after = ["NonExistent"]
"#,
    );

    let result = load_and_validate(file.path());

    match result {
        Err(ExecPlanError::Config(msg)) => {
            assert!(msg.contains("unknown dependency"));
            assert!(msg.contains("NonExistent"));
        }
        Err(e) => panic!("Expected Config error, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn test_malformed_toml_returns_toml_error() {
    let file = config_file("[task.A\ncmd = ");
    assert!(matches!(load_and_validate(file.path()), Err(ExecPlanError::Toml(_))));
}

#[test]
fn test_missing_file_returns_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = load_and_validate(dir.path().join("Execplan.toml"));
    assert!(matches!(result, Err(ExecPlanError::Io(_))));
}

#[test]
fn test_valid_config_builds_plan_in_key_order() {
    let file = config_file(
        r#"
[config]
failure_policy = "continue"
max_workers = 2

[task.link]
cmd = "echo link"
after = ["compile"]

[task.compile]
cmd = "echo compile"
"#,
    );

    let cfg = load_and_validate(file.path()).unwrap();
    let plan = ExecutionPlan::from_config(&cfg).unwrap();

    let names: Vec<&str> = plan.nodes().iter().map(|n| n.name()).collect();
    assert_eq!(names, vec!["compile", "link"]);
    assert!(plan.nodes().iter().all(|n| n.state() == NodeState::NotStarted));
    assert_eq!(plan.lookup("link").unwrap().dependencies().len(), 1);
}
