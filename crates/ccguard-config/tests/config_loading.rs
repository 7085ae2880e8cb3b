//! Config loading and validation tests for ccguard-config.
// crates/ccguard-config/tests/config_loading.rs
// =============================================================================
// Module: Config Loading Tests
// Description: Layering, environment overrides, guards, and validation.
// Purpose: Ensure config input handling is strict and fail-closed.
// =============================================================================

use std::fs;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use ccguard_config::BackendKind;
use ccguard_config::CcguardConfig;
use ccguard_config::ConfigEnvironment;
use ccguard_config::ConfigError;
use ccguard_config::resolve_backend;
use ccguard_store_sqlite::SqliteJournalMode;
use tempfile::NamedTempFile;
use tempfile::TempDir;

type TestResult = Result<(), String>;

fn assert_invalid(result: Result<CcguardConfig, ConfigError>, needle: &str) -> TestResult {
    match result {
        Err(error) => {
            let message = error.to_string();
            if message.contains(needle) {
                Ok(())
            } else {
                Err(format!("error {message} did not contain {needle}"))
            }
        }
        Ok(_) => Err("expected invalid config load".to_string()),
    }
}

fn write_config(dir: &Path, content: &str) -> Result<PathBuf, String> {
    let path = dir.join(".ccguard.toml");
    fs::write(&path, content).map_err(|err| err.to_string())?;
    Ok(path)
}

fn environment(home: &Path) -> ConfigEnvironment {
    ConfigEnvironment {
        home: Some(home.to_path_buf()),
        ..ConfigEnvironment::default()
    }
}

fn ensure(condition: bool, message: &str) -> TestResult {
    if condition { Ok(()) } else { Err(message.to_string()) }
}

// ============================================================================
// SECTION: Layering
// ============================================================================

#[test]
fn defaults_apply_without_files() -> TestResult {
    let home = TempDir::new().map_err(|err| err.to_string())?;
    let repo = TempDir::new().map_err(|err| err.to_string())?;
    let config = CcguardConfig::load(None, Some(repo.path()), &environment(home.path()))
        .map_err(|err| err.to_string())?;

    ensure(config.adapter == "sqlite", "default adapter is sqlite")?;
    ensure(config.policy.target_branch == "master", "default target branch is master")?;
    ensure(config.policy.tolerance == 0.0, "default tolerance is zero")?;
    ensure(
        config.sqlite.path == Some(home.path().join(".ccguard.db")),
        "database defaults to the home directory",
    )?;
    let thresholds = config.policy.thresholds().map_err(|err| err.to_string())?;
    ensure(thresholds.hard_minimum.is_none(), "hard minimum disabled by default")?;
    ensure(config.redis.port == 6379, "default redis port")?;
    Ok(())
}

#[test]
fn repository_layer_overrides_user_layer_key_by_key() -> TestResult {
    let home = TempDir::new().map_err(|err| err.to_string())?;
    let repo = TempDir::new().map_err(|err| err.to_string())?;
    write_config(
        home.path(),
        "adapter = \"redis\"\n[redis]\nhost = \"cache.internal\"\nport = 6380\n\
         [policy]\ntolerance = 0.1\n",
    )?;
    write_config(repo.path(), "[redis]\nport = 7000\n[policy]\ntarget_branch = \"main\"\n")?;

    let config = CcguardConfig::load(None, Some(repo.path()), &environment(home.path()))
        .map_err(|err| err.to_string())?;
    ensure(config.adapter == "redis", "user adapter survives")?;
    ensure(config.redis.host == "cache.internal", "user redis host survives")?;
    ensure(config.redis.port == 7000, "repository port wins")?;
    ensure(config.policy.tolerance == 0.1, "user tolerance survives")?;
    ensure(config.policy.target_branch == "main", "repository branch wins")?;
    Ok(())
}

#[test]
fn explicit_path_replaces_discovered_files() -> TestResult {
    let home = TempDir::new().map_err(|err| err.to_string())?;
    let repo = TempDir::new().map_err(|err| err.to_string())?;
    write_config(home.path(), "adapter = \"redis\"\n")?;
    write_config(repo.path(), "[policy]\ntolerance = 0.5\n")?;
    let mut explicit = NamedTempFile::new().map_err(|err| err.to_string())?;
    explicit
        .write_all(b"[sqlite]\npath = \"/var/lib/ccguard.db\"\njournal_mode = \"delete\"\n")
        .map_err(|err| err.to_string())?;

    let config =
        CcguardConfig::load(Some(explicit.path()), Some(repo.path()), &environment(home.path()))
            .map_err(|err| err.to_string())?;
    ensure(config.adapter == "sqlite", "home layer ignored")?;
    ensure(config.policy.tolerance == 0.0, "repository layer ignored")?;
    ensure(config.sqlite.journal_mode == SqliteJournalMode::Delete, "explicit journal mode")?;
    let store = config.sqlite.store_config();
    ensure(store.path == Path::new("/var/lib/ccguard.db"), "explicit database path")?;
    Ok(())
}

#[test]
fn environment_config_path_is_used_when_no_flag() -> TestResult {
    let home = TempDir::new().map_err(|err| err.to_string())?;
    let mut explicit = NamedTempFile::new().map_err(|err| err.to_string())?;
    explicit.write_all(b"adapter = \"web\"\n").map_err(|err| err.to_string())?;
    let env = ConfigEnvironment {
        config_path: Some(explicit.path().to_path_buf()),
        server_address: Some("https://ccguard.example.com".to_string()),
        ..environment(home.path())
    };

    let config = CcguardConfig::load(None, None, &env).map_err(|err| err.to_string())?;
    ensure(config.adapter == "web", "env config path honored")?;
    Ok(())
}

#[test]
fn explicit_path_must_exist() -> TestResult {
    let home = TempDir::new().map_err(|err| err.to_string())?;
    let missing = home.path().join("missing.toml");
    assert_invalid(
        CcguardConfig::load(Some(&missing), None, &environment(home.path())),
        "config io error",
    )
}

// ============================================================================
// SECTION: Environment Overrides
// ============================================================================

#[test]
fn environment_overrides_remote_settings() -> TestResult {
    let home = TempDir::new().map_err(|err| err.to_string())?;
    write_config(
        home.path(),
        "[web]\nserver_address = \"http://from-file:8080\"\ntoken = \"file-token\"\n",
    )?;
    let env = ConfigEnvironment {
        server_address: Some("https://from-env.example.com".to_string()),
        token: Some("env-token".to_string()),
        ..environment(home.path())
    };

    let config = CcguardConfig::load(None, None, &env).map_err(|err| err.to_string())?;
    let store = config.web.store_config().map_err(|err| err.to_string())?;
    ensure(store.server_address == "https://from-env.example.com", "env address wins")?;
    ensure(store.token.as_deref() == Some("env-token"), "env token wins")?;
    Ok(())
}

#[test]
fn web_store_config_requires_address() -> TestResult {
    let config = CcguardConfig::default();
    match config.web.store_config() {
        Err(ConfigError::Invalid(message)) if message.contains("web.server_address") => Ok(()),
        other => Err(format!("unexpected result: {other:?}")),
    }
}

// ============================================================================
// SECTION: Guards
// ============================================================================

#[test]
fn load_rejects_oversized_file() -> TestResult {
    let mut file = NamedTempFile::new().map_err(|err| err.to_string())?;
    let payload = vec![b'#'; 1_048_577];
    file.write_all(&payload).map_err(|err| err.to_string())?;
    assert_invalid(
        CcguardConfig::load(Some(file.path()), None, &ConfigEnvironment::default()),
        "config file exceeds size limit",
    )
}

#[test]
fn load_rejects_non_utf8_file() -> TestResult {
    let mut file = NamedTempFile::new().map_err(|err| err.to_string())?;
    file.write_all(&[0xFF, 0xFE, 0xFF]).map_err(|err| err.to_string())?;
    assert_invalid(
        CcguardConfig::load(Some(file.path()), None, &ConfigEnvironment::default()),
        "config file must be utf-8",
    )
}

#[test]
fn load_rejects_path_component_too_long() -> TestResult {
    let long_component = "a".repeat(300);
    assert_invalid(
        CcguardConfig::load(Some(Path::new(&long_component)), None, &ConfigEnvironment::default()),
        "config path component too long",
    )
}

#[test]
fn load_rejects_unknown_keys() -> TestResult {
    let mut file = NamedTempFile::new().map_err(|err| err.to_string())?;
    file.write_all(b"[policy]\ntolerence = 0.1\n").map_err(|err| err.to_string())?;
    assert_invalid(
        CcguardConfig::load(Some(file.path()), None, &ConfigEnvironment::default()),
        "config parse error",
    )
}

// ============================================================================
// SECTION: Validation
// ============================================================================

#[test]
fn validation_rejects_out_of_range_values() -> TestResult {
    let cases = [
        ("[policy]\ntolerance = -0.1\n", "tolerance"),
        ("[policy]\nhard_minimum = 1.5\n", "hard minimum"),
        ("[policy]\ntarget_branch = \" \"\n", "policy.target_branch"),
        ("adapter = \"mongo\"\n", "unknown adapter"),
        ("[redis]\nport = 0\n", "redis.port"),
        ("[web]\nserver_address = \"ftp://host\"\n", "web.server_address"),
        ("[web]\ntimeout_ms = 0\n", "web.timeout_ms"),
        ("[repository]\nsuffix = \"a-b\"\n", "repository.suffix"),
    ];
    for (content, needle) in cases {
        let mut file = NamedTempFile::new().map_err(|err| err.to_string())?;
        file.write_all(content.as_bytes()).map_err(|err| err.to_string())?;
        assert_invalid(
            CcguardConfig::load(Some(file.path()), None, &ConfigEnvironment::default()),
            needle,
        )?;
    }
    Ok(())
}

#[test]
fn backend_flag_wins_over_configured_adapter() -> TestResult {
    let config = CcguardConfig::from_toml_str("adapter = \"redis\"\n").map_err(|err| err.to_string())?;
    let chosen = resolve_backend(None, &config).map_err(|err| err.to_string())?;
    ensure(chosen == BackendKind::Redis, "configured adapter used")?;
    let chosen = resolve_backend(Some("web"), &config).map_err(|err| err.to_string())?;
    ensure(chosen == BackendKind::Web, "flag wins")?;
    match resolve_backend(Some("postgres"), &config) {
        Err(ConfigError::Invalid(_)) => Ok(()),
        other => Err(format!("unexpected result: {other:?}")),
    }
}
