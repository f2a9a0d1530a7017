//! Sign-in commands.

use std::sync::Arc;

use owl_launcher::auth::LoginEvent;
use owl_launcher::Launcher;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{broadcast, mpsc};

use crate::error::CliError;

/// Run the login command.
///
/// The pending login lives in this process, so the redirect URI has to be
/// pasted back here rather than handed to a second invocation.
pub async fn login(launcher: &Launcher) -> Result<(), CliError> {
    let request = launcher.get_microsoft_auth_url();

    println!("Open this URL in a browser and sign in:");
    println!();
    println!("  {}", request.url);
    println!();
    println!("Then paste the address you were redirected to:");

    let mut events = launcher.identity().subscribe();
    let (inbox, rx) = mpsc::channel(4);
    let worker = Arc::clone(launcher.identity()).spawn_callback_inbox(rx);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let outcome = loop {
        let Some(line) = lines.next_line().await? else {
            break Err(CliError::Login("no redirect address entered".to_string()));
        };
        if line.trim().is_empty() {
            continue;
        }
        if inbox.send(line).await.is_err() {
            break Err(CliError::Login("login handler stopped".to_string()));
        }
        match events.recv().await {
            Ok(LoginEvent::SignedIn { uuid, name }) => {
                println!();
                println!("Signed in as {} ({})", console::style(&name).bold(), uuid);
                break Ok(());
            }
            Ok(LoginEvent::Failed { message }) => break Err(CliError::Login(message)),
            Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => {
                break Err(CliError::Login("login handler stopped".to_string()))
            }
        }
    };

    drop(inbox);
    let _ = worker.await;
    outcome
}

/// Run the whoami command: show the session, refreshing it if needed.
pub async fn whoami(launcher: &Launcher, uuid: &str) -> Result<(), CliError> {
    match launcher.get_auth_token(uuid).await? {
        Some(token) => {
            println!("{} ({})", console::style(&token.name).bold(), token.uuid);
            println!("  Session valid until: {}", format_unix(token.expires_at));
            let groups = launcher.resolve_groups(&token.uuid).await;
            println!("  Groups: {}", groups.iter().collect::<Vec<_>>().join(", "));
        }
        None => println!("Not signed in. Run `owl-launcher login`."),
    }
    Ok(())
}

/// Run the logout command.
pub async fn logout(launcher: &Launcher, uuid: &str) -> Result<(), CliError> {
    launcher.logout_user(uuid).await?;
    println!("Signed out {}", uuid);
    Ok(())
}

fn format_unix(secs: i64) -> String {
    chrono::DateTime::from_timestamp(secs, 0)
        .map(|t| t.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| secs.to_string())
}
