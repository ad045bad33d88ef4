use std::env;

use parlor::prelude::*;
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// Demo accounts
// ---------------------------------------------------------------------------

const ACCOUNTS: &[(&str, &str)] = &[
    ("alice", "correctpass"),
    ("bob", "bobpass"),
    ("carol", "carolpass"),
];

fn authenticator() -> StaticAuthenticator {
    ACCOUNTS
        .iter()
        .fold(StaticAuthenticator::new(), |auth, (name, secret)| {
            auth.with_user(name, secret)
        })
}

fn directory() -> MemoryDirectory {
    ACCOUNTS
        .iter()
        .fold(MemoryDirectory::new(), |dir, (name, _)| {
            dir.with_user(User::new(*name))
        })
        .with_group("everyone", ACCOUNTS.iter().map(|(name, _)| *name))
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Wire {
    WebSocket,
    Tcp,
}

impl Wire {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "ws" | "websocket" => Some(Self::WebSocket),
            "tcp" => Some(Self::Tcp),
            _ => None,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let bind = env::var("PARLOR_BIND").unwrap_or_else(|_| "0.0.0.0:8080".into());
    let wire = match env::var("PARLOR_TRANSPORT") {
        Ok(value) => Wire::parse(&value)
            .ok_or_else(|| format!("PARLOR_TRANSPORT must be ws or tcp, got {value:?}"))?,
        Err(_) => Wire::WebSocket,
    };

    tracing::info!(%bind, ?wire, accounts = ACCOUNTS.len(), "starting relay server");

    let builder = ParlorServerBuilder::new().bind(&bind);
    match wire {
        Wire::WebSocket => {
            builder.build(authenticator(), directory()).await?.run().await?
        }
        Wire::Tcp => {
            builder.build_tcp(authenticator(), directory()).await?.run().await?
        }
    }
    Ok(())
}
