//! Account registration from a `login:password` credentials file.

use std::path::Path;

use monitoring::models::derived_email;
use monitoring::{AppError, IdentityStore};
use tracing::{error, info};

use crate::errors::{ImportError, SeedError};

/// One parsed line of the credentials file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub login: String,
    pub password: String,
}

/// Outcome of registering one credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    AlreadyRegistered,
    Registered,
}

/// Counts from a registration batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistrationTally {
    pub already_registered: usize,
    pub newly_registered: usize,
    pub errors: usize,
}

impl RegistrationTally {
    pub fn total_success(&self) -> usize {
        self.already_registered + self.newly_registered
    }
}

/// Parses `login:password`, splitting on the first colon.
pub fn parse_credential_line(line: &str) -> Result<Credential, ImportError> {
    let (login, password) = line
        .trim()
        .split_once(':')
        .ok_or_else(|| ImportError::MalformedLine("expected login:password".to_string()))?;

    let login = login.trim();
    if login.is_empty() {
        return Err(ImportError::MalformedLine("empty login".to_string()));
    }

    Ok(Credential {
        login: login.to_string(),
        password: password.trim().to_string(),
    })
}

/// Registers one account unless its login already has a password. Existing passwords are
/// left alone.
///
/// A password-less account (created from measurement data) gets the password and counts as
/// newly registered.
pub async fn register_credential<S>(
    store: &S,
    credential: &Credential,
) -> Result<Registration, ImportError>
where
    S: IdentityStore + ?Sized,
{
    if let Some(existing) = store.find_user_by_name(&credential.login).await? {
        if existing.password_hash.is_some() {
            return Ok(Registration::AlreadyRegistered);
        }
        let claimed = store
            .set_initial_password(existing.id, &credential.password)
            .await?;
        return Ok(if claimed {
            Registration::Registered
        } else {
            Registration::AlreadyRegistered
        });
    }

    match store
        .create_user(
            &credential.login,
            &derived_email(&credential.login),
            &credential.password,
        )
        .await
    {
        Ok(_) => Ok(Registration::Registered),
        // Someone else created it between the lookup and the insert
        Err(AppError::Conflict(_)) => Ok(Registration::AlreadyRegistered),
        Err(e) => Err(e.into()),
    }
}

/// Registers every line, logging and counting failures without stopping.
pub async fn register_users<S, I, L>(store: &S, lines: I) -> RegistrationTally
where
    S: IdentityStore + ?Sized,
    I: IntoIterator<Item = L>,
    L: AsRef<str>,
{
    info!("Registering users...");
    let mut tally = RegistrationTally::default();

    for (index, line) in lines.into_iter().enumerate() {
        let line = line.as_ref();
        if line.trim().is_empty() {
            continue;
        }

        let credential = match parse_credential_line(line) {
            Ok(credential) => credential,
            Err(e) => {
                error!(line = index + 1, "Error registering user: {e}");
                tally.errors += 1;
                continue;
            }
        };

        match register_credential(store, &credential).await {
            Ok(Registration::AlreadyRegistered) => {
                info!("User {} already registered", credential.login);
                tally.already_registered += 1;
            }
            Ok(Registration::Registered) => {
                info!("User {} registered", credential.login);
                tally.newly_registered += 1;
            }
            Err(e) => {
                error!("Error registering user {}: {e}", credential.login);
                tally.errors += 1;
            }
        }
    }

    info!(
        already_registered = tally.already_registered,
        newly_registered = tally.newly_registered,
        errors = tally.errors,
        total_success = tally.total_success(),
        "Users registered"
    );

    tally
}

/// Reads the credentials file at `path` and registers its lines.
pub async fn register_users_from_file<S>(
    store: &S,
    path: &Path,
) -> Result<RegistrationTally, SeedError>
where
    S: IdentityStore + ?Sized,
{
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| SeedError::Io {
            path: path.to_path_buf(),
            source,
        })?;

    Ok(register_users(store, contents.lines()).await)
}
