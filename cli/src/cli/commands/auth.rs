//! Authentication command handlers.

use chrono::{TimeDelta, Utc};

use cxk::config::StorageConfig;
use cxk::{ClientInfo, CxkError, Result, TokenRecord, TokenStorage};

use crate::cli::args::ImportArgs;

/// Handle the `cxk auth list` command.
pub fn handle_list(config: &StorageConfig) -> Result<()> {
    let mut storage = TokenStorage::from_config(config)?;
    let identities = storage.list_identities()?;

    if identities.is_empty() {
        println!("No stored credentials.");
        return Ok(());
    }

    for identity in identities {
        println!("{identity}");
    }

    Ok(())
}

/// Handle the `cxk auth show <identity>` command.
pub fn handle_show(config: &StorageConfig, identity: &str) -> Result<()> {
    let mut storage = TokenStorage::from_config(config)?;
    let tokens = storage.get(identity)?;
    let client_info = storage.get_client_info(identity)?;

    if tokens.is_none() && client_info.is_none() {
        println!("No credentials stored for '{identity}'.");
        println!();
        println!("Run 'cxk auth import {identity} --access-token <token>' to add one.");
        return Ok(());
    }

    println!("{identity}");
    println!();

    if let Some(tokens) = tokens {
        println!("  Access token:  {}", mask_token(&tokens.access_token));
        println!("  Token type:    {}", tokens.token_type);
        println!(
            "  Refresh token: {}",
            if tokens.can_refresh() { "stored" } else { "none" }
        );
        if let Some(scope) = &tokens.scope {
            println!("  Scope:         {scope}");
        }
        if let Some(expires_at) = tokens.expires_at {
            println!("  Expires:       {}", expires_at.to_rfc3339());
        }
        if let Some(issued_at) = tokens.issued_at {
            println!("  Stored:        {}", issued_at.to_rfc3339());
        }
        if tokens.is_expired() {
            println!();
            println!("  Warning: access token has expired or expires within 5 minutes.");
        }
    } else {
        println!("  No tokens stored.");
    }

    if let Some(info) = client_info {
        println!("  Client ID:     {}", info.client_id);
    }

    Ok(())
}

/// Handle the `cxk auth import` command.
pub fn handle_import(config: &StorageConfig, args: ImportArgs) -> Result<()> {
    let identity = args.identity.clone();
    let client_id = args.client_id.clone();
    let record = record_from_args(args)?;

    let mut storage = TokenStorage::from_config(config)?;
    storage.set(&identity, record)?;
    if let Some(client_id) = client_id {
        storage.set_client_info(&identity, ClientInfo::new(client_id))?;
    }

    println!("Stored credentials for '{identity}'.");
    Ok(())
}

/// Handle the `cxk auth logout` command.
pub fn handle_logout(config: &StorageConfig, identity: Option<&str>, all: bool) -> Result<()> {
    let mut storage = TokenStorage::from_config(config)?;

    let targets = if all {
        storage.list_identities()?
    } else {
        identity.map(str::to_string).into_iter().collect()
    };

    if targets.is_empty() {
        println!("Not currently logged in to any server.");
        return Ok(());
    }

    for target in &targets {
        storage.delete(target)?;
        println!("Logged out of '{target}'.");
    }

    Ok(())
}

fn record_from_args(args: ImportArgs) -> Result<TokenRecord> {
    let expires_at = match args.expires_in {
        Some(secs) => Some(
            TimeDelta::try_seconds(secs)
                .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
                .ok_or_else(|| {
                    CxkError::InvalidArgument(format!("--expires-in {secs} is out of range"))
                })?,
        ),
        None => None,
    };

    Ok(TokenRecord {
        refresh_token: args.refresh_token,
        token_type: args.token_type,
        expires_at,
        scope: args.scope,
        ..TokenRecord::new(args.access_token)
    })
}

/// Shows the first few characters of a token.
fn mask_token(token: &str) -> String {
    let visible: String = token.chars().take(4).collect();
    if token.chars().count() <= 8 {
        "********".to_string()
    } else {
        format!("{visible}…")
    }
}
