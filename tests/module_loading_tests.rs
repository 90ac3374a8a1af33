//! Module loading tests
//!
//! Dependency ordering, cycles, depth truncation, idempotence and failure
//! containment through the public manager API.

use sentinel_modules::module::{
    LoadOptions, LoadOutcome, LoadStatus, ModuleCatalog, ModuleError, ModuleState, ModuleWarning,
    SessionContext,
};

mod common;
use common::*;

#[test]
fn test_dependency_loads_before_dependent() {
    let fixture = ModuleFixture::new();
    fixture.write_simple("alpha", &["beta"]);
    fixture.write_simple("beta", &[]);
    let manager = fixture.manager();
    let mut ctx = SessionContext::new();

    let report = manager.load_module("alpha", &mut ctx, LoadOptions::default());

    assert_eq!(report.status, LoadStatus::Loaded);
    assert!(report.warnings.is_empty(), "{:?}", report.warnings);
    assert_eq!(ctx.executed(), ["beta".to_string(), "alpha".to_string()]);
    assert_eq!(ctx.var("LOADED_BETA"), Some("1"));
    assert_eq!(manager.registry().get("alpha"), ModuleState::Loaded);
    assert_eq!(manager.registry().get("beta"), ModuleState::Loaded);
}

#[test]
fn test_cycle_is_reported_and_both_load() {
    let fixture = ModuleFixture::new();
    fixture.write_simple("cycle_a", &["cycle_b"]);
    fixture.write_simple("cycle_b", &["cycle_a"]);
    let manager = fixture.manager();
    let mut ctx = SessionContext::new();

    let report = manager.load_module("cycle_a", &mut ctx, LoadOptions::default());

    assert_eq!(report.status, LoadStatus::Loaded);
    assert!(report.has_cycle_warning());
    assert_eq!(ctx.executed(), ["cycle_b".to_string(), "cycle_a".to_string()]);
    assert_eq!(manager.registry().get("cycle_a"), ModuleState::Loaded);
    assert_eq!(manager.registry().get("cycle_b"), ModuleState::Loaded);
}

#[test]
fn test_second_load_is_noop() {
    let fixture = ModuleFixture::new();
    fixture.write_simple("alpha", &["beta"]);
    fixture.write_simple("beta", &[]);
    let manager = fixture.manager();
    let mut ctx = SessionContext::new();

    manager.load_module("alpha", &mut ctx, LoadOptions::default());
    let again = manager.load_module("alpha", &mut ctx, LoadOptions::default());

    assert_eq!(again.status, LoadStatus::AlreadyLoaded);
    assert!(again.warnings.is_empty());
    assert_eq!(ctx.executed().len(), 2);
}

#[test]
fn test_force_reload_reexecutes_only_target() {
    let fixture = ModuleFixture::new();
    fixture.write_simple("alpha", &["beta"]);
    fixture.write_simple("beta", &[]);
    let manager = fixture.manager();
    let mut ctx = SessionContext::new();

    manager.load_module("alpha", &mut ctx, LoadOptions::default());
    let options = LoadOptions {
        force: true,
        ..LoadOptions::default()
    };
    let report = manager.load_module("alpha", &mut ctx, options);

    assert_eq!(report.status, LoadStatus::Loaded);
    assert_eq!(
        ctx.executed(),
        ["beta".to_string(), "alpha".to_string(), "alpha".to_string()]
    );
}

#[test]
fn test_dependency_loading_elsewhere_is_not_a_cycle() {
    let fixture = ModuleFixture::new();
    fixture.write_simple("alpha", &["beta"]);
    fixture.write_simple("beta", &[]);
    let manager = fixture.manager();
    // Another caller sharing the registry is midway through loading beta
    manager.registry().set("beta", ModuleState::Loading);
    let mut ctx = SessionContext::new();

    let report = manager.load_module("alpha", &mut ctx, LoadOptions::default());

    assert_eq!(report.status, LoadStatus::Loaded);
    assert!(!report.has_cycle_warning(), "{:?}", report.warnings);
    match &report.warnings[..] {
        [ModuleWarning::DependencyInProgress { module, dependency }] => {
            assert_eq!(module, "alpha");
            assert_eq!(dependency, "beta");
        }
        other => panic!("unexpected warnings: {:?}", other),
    }
    assert_eq!(ctx.executed(), ["alpha".to_string()]);
    assert_eq!(manager.registry().get("beta"), ModuleState::Loading);
}

#[test]
fn test_depth_bound_truncates_chain() {
    let fixture = ModuleFixture::new();
    for i in 0..8 {
        let name = format!("m{}", i);
        let dep = format!("m{}", i + 1);
        if i < 7 {
            fixture.write_simple(&name, &[dep.as_str()]);
        } else {
            fixture.write_simple(&name, &[]);
        }
    }
    let manager = fixture.manager();
    let mut ctx = SessionContext::new();

    let report = manager.load_module("m0", &mut ctx, LoadOptions::default());

    // Root still loads even though its chain was cut short
    assert_eq!(report.status, LoadStatus::Loaded);
    assert!(report.has_cycle_warning());
    for i in 0..=5 {
        assert_eq!(manager.registry().get(&format!("m{}", i)), ModuleState::Loaded);
    }
    assert_eq!(manager.registry().get("m6"), ModuleState::Unloaded);
    assert_eq!(manager.registry().get("m7"), ModuleState::Unloaded);
    assert_eq!(ctx.executed().first().map(String::as_str), Some("m5"));
}

#[test]
fn test_configured_depth_limit() {
    let mut fixture = ModuleFixture::new();
    fixture.config.modules.max_dependency_depth = 1;
    fixture.write_simple("top", &["middle"]);
    fixture.write_simple("middle", &["bottom"]);
    fixture.write_simple("bottom", &[]);
    let manager = fixture.manager();
    let mut ctx = SessionContext::new();

    manager.load_module("top", &mut ctx, LoadOptions::default());

    assert_eq!(manager.registry().get("middle"), ModuleState::Loaded);
    assert_eq!(manager.registry().get("bottom"), ModuleState::Unloaded);
}

#[test]
fn test_missing_module_suggests_similar_names() {
    let fixture = ModuleFixture::new();
    fixture.write_simple("git_helpers", &[]);
    let manager = fixture.manager();
    let mut ctx = SessionContext::new();

    let report = manager.load_module("git", &mut ctx, LoadOptions::default());

    assert_eq!(report.status, LoadStatus::NotFound);
    match &report.warnings[..] {
        [ModuleWarning::NotFound { name, suggestions }] => {
            assert_eq!(name, "git");
            assert!(suggestions.contains(&"git_helpers".to_string()));
        }
        other => panic!("unexpected warnings: {:?}", other),
    }
    assert_eq!(manager.registry().get("git"), ModuleState::Unloaded);
    assert!(fixture.read_enabled().is_empty());
}

#[test]
fn test_missing_dependency_does_not_stop_dependent() {
    let fixture = ModuleFixture::new();
    fixture.write_simple("alpha", &["ghost"]);
    let manager = fixture.manager();
    let mut ctx = SessionContext::new();

    let report = manager.load_module("alpha", &mut ctx, LoadOptions::default());

    assert_eq!(report.status, LoadStatus::Loaded);
    assert!(report
        .warnings
        .iter()
        .any(|w| matches!(w, ModuleWarning::NotFound { name, .. } if name == "ghost")));
}

#[test]
fn test_invalid_name_is_rejected() {
    let fixture = ModuleFixture::new();
    let manager = fixture.manager();
    let mut ctx = SessionContext::new();

    let report = manager.load_module("../etc/passwd", &mut ctx, LoadOptions::default());

    assert_eq!(report.status, LoadStatus::Rejected);
    assert!(ctx.executed().is_empty());
}

#[test]
fn test_long_module_name_loads() {
    let fixture = ModuleFixture::new();
    let name = "a".repeat(65);
    fixture.write_module(&name, "export LONG_NAME=1\n");
    let manager = fixture.manager();
    let mut ctx = SessionContext::new();

    let report = manager.load_module(&name, &mut ctx, LoadOptions::default());

    assert_eq!(report.status, LoadStatus::Loaded);
    assert!(report.warnings.is_empty(), "{:?}", report.warnings);
    assert_eq!(ctx.var("LONG_NAME"), Some("1"));
}

#[test]
fn test_failed_module_is_marked_loaded() {
    let fixture = ModuleFixture::new();
    fixture.write_module("broken", "export BEFORE=1\nexit 3\nexport AFTER=1\n");
    let manager = fixture.manager();
    let mut ctx = SessionContext::new();

    let report = manager.load_module("broken", &mut ctx, LoadOptions::default());

    assert_eq!(report.status, LoadStatus::Failed);
    assert!(report
        .warnings
        .iter()
        .any(|w| matches!(w, ModuleWarning::ExecutionFailure { .. })));
    assert_eq!(ctx.var("BEFORE"), Some("1"));
    assert_eq!(ctx.var("AFTER"), None);

    let entry = manager.registry().entry("broken");
    assert_eq!(entry.state, ModuleState::Loaded);
    assert!(matches!(entry.outcome, Some(LoadOutcome::Failed(_))));

    // No retry within the session
    let again = manager.load_module("broken", &mut ctx, LoadOptions::default());
    assert_eq!(again.status, LoadStatus::AlreadyLoaded);
}

#[test]
fn test_direct_load_persists_but_dependency_does_not() {
    let fixture = ModuleFixture::new();
    fixture.write_simple("alpha", &["beta"]);
    fixture.write_simple("beta", &[]);
    let manager = fixture.manager();
    let mut ctx = SessionContext::new();

    manager.load_module("alpha", &mut ctx, LoadOptions::default());

    assert_eq!(manager.list_enabled().unwrap(), vec!["alpha".to_string()]);
}

#[test]
fn test_load_without_persist_leaves_list_alone() {
    let fixture = ModuleFixture::new();
    fixture.write_simple("alpha", &[]);
    let manager = fixture.manager();
    let mut ctx = SessionContext::new();

    let options = LoadOptions {
        persist: false,
        ..LoadOptions::default()
    };
    manager.load_module("alpha", &mut ctx, options);

    assert!(manager.list_enabled().unwrap().is_empty());
}

#[test]
fn test_compiled_panic_is_contained() {
    let fixture = ModuleFixture::new();
    fixture.write_simple("explosive", &[]);
    fixture.write_simple("after", &[]);

    let mut catalog = ModuleCatalog::new();
    catalog.register("explosive", |_: &mut SessionContext| -> Result<(), ModuleError> {
        panic!("module blew up")
    });
    let manager = fixture.manager().with_catalog(catalog);
    let mut ctx = SessionContext::new();

    let report = manager.load_module("explosive", &mut ctx, LoadOptions::default());
    assert_eq!(report.status, LoadStatus::Failed);

    // The session keeps working afterwards
    let next = manager.load_module("after", &mut ctx, LoadOptions::default());
    assert_eq!(next.status, LoadStatus::Loaded);
    assert_eq!(ctx.current_module(), None);
}

#[test]
fn test_session_load_follows_enabled_order() {
    let fixture = ModuleFixture::new();
    fixture.write_simple("first", &[]);
    fixture.write_simple("second", &["helper"]);
    fixture.write_simple("helper", &[]);
    fixture.write_enabled("# startup modules\nsecond\n\nfirst\nmissing\n");
    let manager = fixture.manager();
    let mut ctx = SessionContext::new();

    let session = manager.load_enabled(&mut ctx);

    let statuses: Vec<_> = session.reports.iter().map(|r| r.status).collect();
    assert_eq!(
        statuses,
        vec![LoadStatus::Loaded, LoadStatus::Loaded, LoadStatus::NotFound]
    );
    assert_eq!(
        ctx.executed(),
        ["helper".to_string(), "second".to_string(), "first".to_string()]
    );
    assert!(session.has_warnings());
    // Session loads never rewrite the list
    assert_eq!(
        fixture.read_enabled(),
        "# startup modules\nsecond\n\nfirst\nmissing\n"
    );
}

#[test]
fn test_session_without_enabled_file() {
    let fixture = ModuleFixture::new();
    let manager = fixture.manager();
    let mut ctx = SessionContext::new();

    let session = manager.load_enabled(&mut ctx);

    assert!(session.reports.is_empty());
    assert!(!session.has_warnings());
}

#[test]
fn test_module_definitions_reach_session() {
    let fixture = ModuleFixture::new();
    fixture.write_module(
        "git_helpers",
        r#"SENTINEL_MODULE_DESCRIPTION="Git shortcuts"
export GIT_PAGER=${GIT_PAGER:-less}
alias gs='git status'

gl() {
    git log --oneline "$@"
}
"#,
    );
    let manager = fixture.manager();
    let mut ctx = SessionContext::new();

    manager.load_module("git_helpers", &mut ctx, LoadOptions::default());

    assert_eq!(ctx.var("GIT_PAGER"), Some("less"));
    assert_eq!(ctx.alias("gs"), Some("git status"));
    let command = ctx.command("gl").unwrap();
    assert_eq!(command.module.as_deref(), Some("git_helpers"));

    let shell = ctx.render_shell();
    assert!(shell.contains("export GIT_PAGER='less'"));
    assert!(shell.contains("gl() {"));
}

#[test]
fn test_shared_registry_across_managers() {
    use std::sync::Arc;
    use sentinel_modules::module::{ModuleManager, ModuleRegistry};

    let fixture = ModuleFixture::new();
    fixture.write_simple("alpha", &[]);
    let registry = Arc::new(ModuleRegistry::new());
    let first = ModuleManager::with_registry(&fixture.config, Arc::clone(&registry));
    let second = ModuleManager::with_registry(&fixture.config, Arc::clone(&registry));
    let mut ctx = SessionContext::new();

    first.load_module("alpha", &mut ctx, LoadOptions::default());
    let report = second.load_module("alpha", &mut ctx, LoadOptions::default());

    assert_eq!(report.status, LoadStatus::AlreadyLoaded);
}

#[test]
#[serial_test::serial]
fn test_environment_seeded_load_expands_inherited_variables() {
    std::env::set_var("SENTINEL_TEST_BASE", "/opt/base");
    let fixture = ModuleFixture::new();
    fixture.write_module(
        "tooling",
        "export TOOL_HOME=\"$SENTINEL_TEST_BASE/tool\"\nHISTSIZE=5000\n",
    );
    let manager = fixture.manager();
    let mut ctx = SessionContext::from_env();

    let report = manager.load_module("tooling", &mut ctx, LoadOptions::default());
    std::env::remove_var("SENTINEL_TEST_BASE");

    assert_eq!(report.status, LoadStatus::Loaded);
    assert_eq!(ctx.var("TOOL_HOME"), Some("/opt/base/tool"));

    let shell = ctx.render_shell();
    assert!(shell.contains("export TOOL_HOME='/opt/base/tool'\n"));
    assert!(shell.contains("HISTSIZE='5000'\n"));
    assert!(!shell.contains("SENTINEL_TEST_BASE"));
    assert!(!shell.contains("unset "));
}
