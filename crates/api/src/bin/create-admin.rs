//! Admin bootstrap utility for QuillHub
//!
//! Creates an admin account directly in the database, for the first admin
//! (admin creation over HTTP requires an existing admin).
//!
//! Usage:
//!   cargo run --bin create-admin
//!   cargo run --bin create-admin -- "Ada Lovelace" ada ada@example.com
//!
//! The password is always read from stdin so it never shows in the
//! process list. Reads DATABASE_URL and JWT_SECRET like the server does.

use std::env;
use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{bail, Context};
use quillhub_api::{
    auth::{AccountDraft, AuthError, CredentialStore, PasswordHasher, PgCredentialStore},
    config::Config,
    state::build_auth_service,
};
use quillhub_shared::Role;

fn prompt(label: &str) -> io::Result<String> {
    print!("{}: ", label);
    io::stdout().flush()?;

    let mut value = String::new();
    io::stdin().read_line(&mut value)?;
    Ok(value.trim_end_matches(['\r', '\n']).to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env().context("Invalid configuration")?;

    let mut args = env::args().skip(1);
    let name = match args.next() {
        Some(v) => v,
        None => prompt("Name")?,
    };
    let username = match args.next() {
        Some(v) => v,
        None => prompt("Username")?,
    };
    let email = match args.next() {
        Some(v) => v,
        None => prompt("Email")?,
    };
    let password = prompt("Password")?;

    if password.trim().len() < 12 {
        eprintln!("Warning: Password is less than 12 characters. Consider using a longer password.");
    }

    let pool = quillhub_shared::create_pool(&config.database_url, 1)
        .await
        .context("Failed to connect to database")?;
    quillhub_shared::run_migrations(&pool)
        .await
        .context("Failed to run migrations")?;

    let store: Arc<dyn CredentialStore> = Arc::new(PgCredentialStore::new(pool));
    let service = build_auth_service(&config, store, PasswordHasher::default())?;

    let draft = AccountDraft {
        name,
        username,
        email,
        password,
        role: None,
    };

    // The operator running this binary stands in for an existing admin
    let account = match service.register_admin(draft, Role::Admin).await {
        Ok(account) => account,
        Err(AuthError::Validation(e)) => bail!("Invalid input: {}", e),
        Err(e) => return Err(e.into()),
    };

    println!("\n===========================================");
    println!("Admin account created");
    println!("===========================================");
    println!("ID:       {}", account.id);
    println!("Username: {}", account.username);
    println!("Email:    {}", account.email);
    println!("===========================================\n");

    Ok(())
}
