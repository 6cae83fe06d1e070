//! End-to-end lifecycle tests with the real executor.
//!
//! These run the scripts as the current user. Tests that need to change
//! ownership or drop privileges live in `privilege_test.rs`.

mod helpers;

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use rsnxscript::config::ProviderConfig;
use rsnxscript::executor::RealScriptExecutor;
use rsnxscript::{SENTINEL_EXIT_CODE, ScriptProvider, ScriptRequest};

use crate::helpers::{config_in, entry_count, real_provider, scratch_root};

#[test]
fn test_set_returns_script_exit_code_without_identity() {
    let (_root, root) = scratch_root();
    let req = ScriptRequest {
        set_script: "exit 7".to_string(),
        ..Default::default()
    };

    assert_eq!(real_provider(&root).set(&req), 7);
    assert_eq!(entry_count(&root), 0);
}

#[test]
fn test_get_returns_stdout_as_result() {
    let (_root, root) = scratch_root();
    let req = ScriptRequest {
        get_script: "#!/bin/sh\necho hello\n".to_string(),
        ..Default::default()
    };

    let outcome = real_provider(&root).get(&req);
    assert_eq!(outcome.exit_code, 0);
    assert_eq!(outcome.result, "hello\n");
    assert_eq!(outcome.request, req);
}

#[test]
fn test_get_exit_code_is_independent_of_output() {
    let (_root, root) = scratch_root();
    let req = ScriptRequest {
        get_script: "#!/bin/sh\necho partial\necho oops >&2\nexit 4\n".to_string(),
        ..Default::default()
    };

    let outcome = real_provider(&root).get(&req);
    assert_eq!(outcome.exit_code, 4);
    assert_eq!(outcome.result, "partial\n");
}

#[test]
fn test_crlf_script_runs() {
    let (_root, root) = scratch_root();
    let req = ScriptRequest {
        test_script: "#!/bin/sh\r\nif [ \"a\" = \"a\" ]; then\r\n  exit 0\r\nfi\r\nexit 1\r\n"
            .to_string(),
        ..Default::default()
    };

    assert_eq!(real_provider(&root).test(&req), 0);
}

#[test]
fn test_script_runs_from_inside_workspace() {
    let (_root, root) = scratch_root();
    let req = ScriptRequest {
        get_script: "#!/bin/sh\nprintf '%s' \"$0\"\n".to_string(),
        ..Default::default()
    };

    let outcome = real_provider(&root).get(&req);
    assert!(outcome.result.starts_with(root.as_str()), "got: {}", outcome.result);
    assert!(outcome.result.ends_with("/temp_script.sh"), "got: {}", outcome.result);
    assert_eq!(entry_count(&root), 0);
}

#[test]
fn test_empty_user_and_group_keep_caller_identity() {
    let (_root, root) = scratch_root();
    let req = ScriptRequest {
        get_script: "#!/bin/sh\nid -u\n".to_string(),
        ..Default::default()
    };

    let outcome = real_provider(&root).get(&req);
    let expected = format!("{}\n", nix::unistd::geteuid());
    assert_eq!(outcome.result, expected);
}

#[test]
fn test_unknown_user_returns_sentinel_and_leaves_no_files() {
    let (_root, root) = scratch_root();
    let req = ScriptRequest {
        set_script: "#!/bin/sh\ntouch /tmp/should-not-exist\n".to_string(),
        user: "rsnxscript-no-such-user".to_string(),
        ..Default::default()
    };

    assert_eq!(real_provider(&root).set(&req), SENTINEL_EXIT_CODE);
    assert_eq!(entry_count(&root), 0);
}

#[test]
fn test_timeout_kills_script_and_returns_sentinel() {
    let (_root, root) = scratch_root();
    let config = ProviderConfig {
        timeout_secs: Some(1),
        ..config_in(&root)
    };
    let provider = ScriptProvider::new(config, Arc::new(RealScriptExecutor));
    let req = ScriptRequest {
        test_script: "#!/bin/sh\nexec sleep 30\n".to_string(),
        ..Default::default()
    };

    assert_eq!(provider.test(&req), SENTINEL_EXIT_CODE);
    assert_eq!(entry_count(&root), 0);
}

#[test]
fn test_timeout_bounds_call_when_script_starts_children() {
    let (_root, root) = scratch_root();
    let config = ProviderConfig {
        timeout_secs: Some(1),
        ..config_in(&root)
    };
    let provider = ScriptProvider::new(config, Arc::new(RealScriptExecutor));
    let req = ScriptRequest {
        test_script: "#!/bin/sh
sleep 30
".to_string(),
        ..Default::default()
    };

    let started = Instant::now();
    assert_eq!(provider.test(&req), SENTINEL_EXIT_CODE);
    assert!(started.elapsed() < Duration::from_secs(4), "took {:?}", started.elapsed());
    assert_eq!(entry_count(&root), 0);
}

#[test]
fn test_concurrent_gets_do_not_interfere() {
    let (_root, root) = scratch_root();
    let provider = Arc::new(real_provider(&root));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let provider = Arc::clone(&provider);
            thread::spawn(move || {
                let req = ScriptRequest {
                    get_script: format!("#!/bin/sh\nsleep 0.1\necho worker-{}\n", i),
                    ..Default::default()
                };
                (i, provider.get(&req))
            })
        })
        .collect();

    for handle in handles {
        let (i, outcome) = handle.join().expect("worker thread panicked");
        assert_eq!(outcome.exit_code, 0);
        assert_eq!(outcome.result, format!("worker-{}\n", i));
    }
    assert_eq!(entry_count(&root), 0);
}
