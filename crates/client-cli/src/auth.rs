//! CLI authentication: password login and local token storage

use anyhow::{bail, Result};
use std::io::{self, BufRead, Write};

use crate::{
    api::{ApiClient, ApiError},
    config::Config,
};

fn prompt_password(username: &str) -> Result<String> {
    eprint!("Password for {}: ", username);
    io::stderr().flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    let password = line.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        bail!("Password must not be empty");
    }
    Ok(password)
}

/// Logs in and stores the access token in the config file.
pub async fn login(
    client: &ApiClient,
    config: &mut Config,
    username: &str,
    password: Option<String>,
) -> Result<()> {
    let password = match password {
        Some(p) => p,
        None => prompt_password(username)?,
    };

    let token = client.login(username, &password).await?;
    config.remote.server = Some(client.base().to_string());
    config.remote.token = Some(token.access_token);
    config.save()?;

    println!("\x1b[1;32m✅ Logged in as {}\x1b[0m", username);
    Ok(())
}

/// Logout by clearing the stored token
pub fn logout(config: &mut Config) -> Result<()> {
    config.remote.token = None;
    config.save()?;
    println!("\x1b[32m✅ Logged out successfully\x1b[0m");
    Ok(())
}

/// Show current login status
pub async fn whoami(client: &ApiClient) -> Result<()> {
    let me = match client.me().await {
        Ok(me) => me,
        Err(ApiError::NotLoggedIn) => {
            println!("\x1b[33m✗ Not logged in\x1b[0m");
            println!("Run '\x1b[1mrepairdesk login <username>\x1b[0m' to authenticate");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    println!("\x1b[32m✓ Logged in\x1b[0m");
    println!("Server: {}", client.base());
    println!("User:   {} (id {}, {})", me.username, me.id, me.role);
    Ok(())
}
