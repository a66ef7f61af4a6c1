//! `gigbook-access`: inspect permission matrices, classify raw failures, and
//! run one gateway call against the in-memory adapters.
#![cfg_attr(not(any(test, doctest)), deny(clippy::unwrap_used))]
#![cfg_attr(not(any(test, doctest)), deny(clippy::expect_used))]

use std::ffi::OsString;
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Context, Result};
use mockable::DefaultClock;
use ortho_config::OrthoConfig;
use serde_json::{Value, json};
use tokio::runtime::Builder;
use tracing::info;

use gigbook_backend::AccessSettings;
use gigbook_backend::domain::ports::{AuthFailure, RawError, RowFilter, StoreError};
use gigbook_backend::domain::{
    Action, DefaultPermissionTable, ErrorClassifier, PermissionAssignmentService, PermissionModel,
    PermissionOverride, ResourceGateway, RetryCollaborators, RetryOrchestrator, RetryPolicy, Role,
    SessionGuard, Table, UserId, WriteRequest,
};
use gigbook_backend::outbound::memory::{
    FixtureAuthProvider, InMemoryPermissionRecordRepository, InMemoryRecordStore,
};
use gigbook_backend::telemetry::init_tracing;

const PROGRAM: &str = "gigbook-access";
const FIXTURE_TOKEN_TTL: Duration = Duration::from_secs(3600);

/// `gigbook-access` command arguments.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "gigbook-access",
    about = "Audit permission defaults and failure classification",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Print the effective permission set for a role.
    Matrix {
        /// Role whose defaults seed the set (`admin`, `user`).
        #[arg(long)]
        role: Role,
        /// Inviter override as JSON, e.g. `{"accounting":{"read":true}}`.
        #[arg(long = "override", value_name = "json")]
        change: Option<String>,
    },
    /// Classify a raw failure and print the resulting error info.
    Classify {
        /// Machine-readable store code.
        #[arg(long)]
        code: Option<String>,
        /// Raw failure message.
        #[arg(long)]
        message: String,
        /// Channel the failure arrived on.
        #[arg(long, value_enum, default_value_t = Channel::Store)]
        channel: Channel,
    },
    /// Run one gateway call against the in-memory adapters.
    Simulate {
        /// Role of the simulated user.
        #[arg(long)]
        role: Role,
        /// Table to touch.
        #[arg(long, default_value = "events")]
        table: Table,
        /// Action to perform (`read`, `write`, `delete`).
        #[arg(long, default_value = "read")]
        action: Action,
        /// Code of a failure the store returns on the first call.
        #[arg(long = "inject-code", value_name = "code")]
        inject_code: Option<String>,
        /// Message of the injected failure.
        #[arg(long = "inject-message", value_name = "text", default_value = "injected failure")]
        inject_message: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum Channel {
    /// Record store.
    Store,
    /// Identity provider rejected the request.
    AuthRejected,
    /// Identity provider unreachable.
    AuthTransport,
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    let settings = AccessSettings::load_from_iter([OsString::from(PROGRAM)])
        .wrap_err("failed to load access settings")?;
    init_tracing(settings.log_format()?);

    let output = match cli.command {
        Command::Matrix { role, change } => matrix(role, change.as_deref())?,
        Command::Classify {
            code,
            message,
            channel,
        } => classify(&settings, code, message, channel)?,
        Command::Simulate {
            role,
            table,
            action,
            inject_code,
            inject_message,
        } => {
            let runtime = Builder::new_current_thread()
                .enable_all()
                .build()
                .wrap_err("failed to build runtime")?;
            let failure = inject_code.map(|code| StoreError::with_code(code, inject_message));
            runtime.block_on(simulate(&settings, role, table, action, failure))?
        }
    };

    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{}", serde_json::to_string_pretty(&output)?)?;
    Ok(())
}

fn matrix(role: Role, change: Option<&str>) -> Result<Value> {
    let change = change
        .map(|raw| serde_json::from_str::<PermissionOverride>(raw))
        .transpose()
        .wrap_err("invalid permission override")?;
    let set = DefaultPermissionTable::standard().resolve(role, change.as_ref());
    Ok(json!({ "role": role.as_str(), "permissions": set }))
}

fn classify(
    settings: &AccessSettings,
    code: Option<String>,
    message: String,
    channel: Channel,
) -> Result<Value> {
    let raw = match (channel, code) {
        (Channel::Store, Some(code)) => RawError::from(StoreError::with_code(code, message)),
        (Channel::Store, None) => RawError::from(StoreError::message_only(message)),
        (Channel::AuthRejected, _) => RawError::from(AuthFailure::rejected(message)),
        (Channel::AuthTransport, _) => RawError::from(AuthFailure::transport(message)),
    };
    let info = ErrorClassifier::new(settings.locale()?).classify(&raw);
    Ok(serde_json::to_value(info)?)
}

async fn simulate(
    settings: &AccessSettings,
    role: Role,
    table: Table,
    action: Action,
    failure: Option<StoreError>,
) -> Result<Value> {
    let clock = Arc::new(DefaultClock);
    let identity = Arc::new(FixtureAuthProvider::new(clock.clone(), FIXTURE_TOKEN_TTL));
    let store = Arc::new(InMemoryRecordStore::new(Arc::clone(&identity)));
    let permissions = Arc::new(PermissionModel::new(Arc::new(DefaultPermissionTable::standard())));
    let assignments = PermissionAssignmentService::new(
        Arc::new(InMemoryPermissionRecordRepository::new()),
        Arc::clone(&permissions),
    );

    let user = UserId::random();
    let set = assignments
        .accept_invitation(&user, json!({ "role": role.as_str() }))
        .await?;
    store.grant(user.clone(), set);
    store.seed(table, [json!({ "id": 1 })]);
    identity.sign_in(&user);

    let session = Arc::new(SessionGuard::new(
        identity,
        clock,
        settings.session_expiry_margin(),
    ));
    session.restore().await?;

    let orchestrator = Arc::new(RetryOrchestrator::new(
        RetryCollaborators::new(permissions, session),
        ErrorClassifier::new(settings.locale()?),
        RetryPolicy {
            blind_retry_delay: settings.retry_delay(),
        },
    ));
    let gateway = ResourceGateway::new(user, store.clone(), orchestrator);
    if let Some(failure) = failure {
        store.fail_next(failure);
    }

    let outcome = match action {
        Action::Read => gateway.read(table, RowFilter::all()).await,
        Action::Write => {
            gateway
                .write(table, WriteRequest::Insert { payload: json!({ "id": 2 }) })
                .await
        }
        Action::Delete => gateway.delete(table, RowFilter::eq("id", 1)).await,
    };
    info!(%table, %action, store_calls = store.calls(), "simulation finished");

    Ok(match outcome {
        Ok(rows) => json!({ "outcome": "ok", "rows": rows, "storeCalls": store.calls() }),
        Err(error) => json!({ "outcome": "error", "error": error, "storeCalls": store.calls() }),
    })
}
