//! Diagnostics and shell integration commands.

use cxk::config::{paths, StorageConfig};
use cxk::storage::{platform_store, survives_reboot, FileStore, SecureBackend};
use cxk::Result;

use crate::cli::args::ShellType;

/// Handles the `cxk completions <shell>` command.
///
/// Generates shell completion scripts.
pub fn handle_completions(shell: ShellType) -> Result<()> {
    use clap::CommandFactory;
    use clap_complete::{generate, Shell};

    let mut cmd = crate::cli::Cli::command();
    let shell = match shell {
        ShellType::Bash => Shell::Bash,
        ShellType::Zsh => Shell::Zsh,
        ShellType::Fish => Shell::Fish,
    };

    generate(shell, &mut cmd, "cxk", &mut std::io::stdout());

    Ok(())
}

/// Handles the `cxk doctor` command.
///
/// Checks where credentials would be stored and whether each backend answers.
/// Never prints secret values.
pub fn handle_doctor(config: &StorageConfig) -> Result<()> {
    println!("cxk doctor\n");
    println!("Checking credential storage...\n");

    let mut issues = 0;

    // Check 1: Config directory
    print!("  Config directory: ");
    match paths::config_dir() {
        Ok(path) => {
            if path.exists() {
                println!("OK ({})", path.display());
            } else {
                println!("OK (will be created: {})", path.display());
            }
        }
        Err(e) => {
            println!("ERROR - {e}");
            issues += 1;
        }
    }

    // Check 2: Config file
    print!("  Configuration: ");
    match paths::config_file() {
        Ok(path) if path.exists() => println!("OK ({})", path.display()),
        Ok(_) => println!("OK (defaults)"),
        Err(e) => {
            println!("ERROR - {e}");
            issues += 1;
        }
    }

    // Check 3: Fallback file
    print!("  Fallback file: ");
    match config.resolved_fallback_path() {
        Ok(path) => {
            let store = FileStore::new(&path, config.lock_timeout());
            match store.load() {
                Ok(document) if path.exists() => {
                    let count = document.identities().len();
                    println!("OK ({}, {count} stored identity(ies))", path.display());
                    if let Some(warning) = permission_warning(&path) {
                        println!("    WARNING - {warning}");
                        issues += 1;
                    }
                }
                Ok(_) => println!("N/A (not created yet: {})", path.display()),
                Err(e) => {
                    println!("ERROR - {e}");
                    issues += 1;
                }
            }
        }
        Err(e) => {
            println!("ERROR - {e}");
            issues += 1;
        }
    }

    // Check 4: OS keyring
    print!("  OS keyring: ");
    if config.keychain_enabled {
        let store = platform_store(&config.service_name, &config.account_name);
        match SecureBackend::new(store).probe() {
            Ok(()) => {
                println!("OK ({}/{})", config.service_name, config.account_name);
                if !survives_reboot() {
                    println!(
                        "    NOTE - keyring entries are cleared on reboot; \
                         set keychain_enabled = false to keep tokens in the file"
                    );
                }
            }
            Err(e) => println!("UNAVAILABLE - {e} (file fallback will be used)"),
        }
    } else {
        println!("DISABLED (file fallback only)");
    }

    // Summary
    println!();
    if issues == 0 {
        println!("All checks passed!");
    } else {
        println!("{issues} issue(s) found.");
    }

    Ok(())
}

#[cfg(unix)]
fn permission_warning(path: &std::path::Path) -> Option<String> {
    use std::os::unix::fs::PermissionsExt;

    let mode = std::fs::metadata(path).ok()?.permissions().mode() & 0o777;
    (mode != 0o600).then(|| format!("permissions are {mode:o}, expected 600"))
}

#[cfg(not(unix))]
fn permission_warning(_path: &std::path::Path) -> Option<String> {
    None
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    #[test]
    fn owner_only_file_has_no_warning() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("secrets.yaml");
        std::fs::write(&path, "version: 2\n").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600)).unwrap();

        assert_eq!(permission_warning(&path), None);
    }

    #[test]
    fn group_readable_file_is_flagged() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("secrets.yaml");
        std::fs::write(&path, "version: 2\n").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o640)).unwrap();

        let warning = permission_warning(&path).unwrap();
        assert!(warning.contains("640"));
    }
}
