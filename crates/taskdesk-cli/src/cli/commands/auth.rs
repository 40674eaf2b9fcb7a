//! Account command handlers.

use anyhow::{Result, bail};
use taskdesk_core::client::ApiClient;
use taskdesk_core::pages::{LoginPage, NavBar, RegisterPage, require_session};

use super::{NOT_LOGGED_IN, read_input};

pub async fn login(client: &ApiClient, email: Option<String>) -> Result<()> {
    let email = match email {
        Some(email) => email,
        None => read_input("Email: ")?,
    };
    let password = read_input("Password: ")?;

    let mut page = LoginPage::new(email, password);
    if page.submit(client).await.is_none() {
        bail!(page.error.unwrap_or_else(|| "Login failed".to_string()));
    }

    let username = client
        .store()
        .user()?
        .map(|user| user.username)
        .unwrap_or_default();
    println!("✓ Logged in as {username}");
    Ok(())
}

pub struct RegisterArgs {
    pub username: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

pub async fn register(client: &ApiClient, args: RegisterArgs) -> Result<()> {
    let password = read_input("Password: ")?;
    let password_confirm = read_input("Confirm password: ")?;

    let mut page = RegisterPage {
        username: args.username,
        email: args.email,
        password,
        password_confirm,
        first_name: args.first_name.unwrap_or_default(),
        last_name: args.last_name.unwrap_or_default(),
        ..RegisterPage::default()
    };

    if page.submit(client).await.is_none() {
        bail!(page.error.unwrap_or_else(|| "Registration failed".to_string()));
    }
    if let Some(message) = page.success {
        println!("✓ {message}");
    }
    Ok(())
}

pub async fn logout(client: &ApiClient) -> Result<()> {
    match client.store().has_session() {
        Ok(true) => {}
        Ok(false) => {
            println!("Not logged in (no session found).");
            return Ok(());
        }
        // An unreadable session file is still cleared below.
        Err(e) => tracing::warn!(error = %format!("{e:#}"), "session unreadable, clearing it"),
    }

    let mut navbar = NavBar::new(client.store().clone());
    let username = navbar.username().map(str::to_string);
    navbar.logout(client).await;
    if !matches!(client.store().has_session(), Ok(false)) {
        bail!("Failed to clear the local session");
    }

    match username {
        Some(name) => println!("✓ Logged out {name}"),
        None => println!("✓ Logged out"),
    }
    Ok(())
}

pub async fn whoami(client: &ApiClient) -> Result<()> {
    if require_session(client.store()).is_some() {
        bail!(NOT_LOGGED_IN);
    }

    let user = client.auth().current_user().await?;
    client.store().set_user(&user)?;

    println!("{}", user.username);
    if !user.email.is_empty() {
        println!("  Email: {}", user.email);
    }
    let name = user.display_name();
    if name != user.username {
        println!("  Name:  {name}");
    }
    Ok(())
}
