//! Console walkthrough of the interception layer.
//!
//! Starts a UI dispatch loop, wraps a toy account service whose session
//! expires once, and runs an interactive call, a background call and two
//! failures that reach the top-level error sink.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use anyhow::Context;
use callguard_client::logging::{self, LoggingConfig};
use callguard_client::{
    BlockingIndicator, DialogPresenter, DispatchLoop, EventScheduler, InterceptingInvoker,
    ModalIndicator, OperationListener, SerializationOverride, StaticCatalog, TopLevelErrorSink,
    UiContext, UnknownDialogGuard,
};
use callguard_core::{ExceptionMessage, Fault, HandlerChain};
use clap::Parser;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

#[derive(Parser, Debug)]
#[command(name = "callguard-demo", about = "Intercepting invoker walkthrough")]
struct Args {
    /// Deep-copy call arguments through serialization.
    #[arg(long)]
    force_serialization: bool,

    /// Method names (full regex match) exempt from forced serialization.
    #[arg(long, env = callguard_client::config::SERIALIZATION_EXEMPT_PATTERN_ENV)]
    exempt_pattern: Option<String>,

    /// Emit logs as JSON lines.
    #[arg(long)]
    json_logs: bool,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

// ---------------------------------------------------------------------------
// Toy service
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Transfer {
    from: String,
    to: String,
    amount: u64,
}

trait AccountService: Send + Sync {
    fn balance(&self, account: &str) -> Result<u64, Fault>;
    fn transfer(&self, transfer: &Transfer) -> Result<u64, Fault>;
    fn close(&self, account: &str) -> Result<(), Fault>;
}

/// In-memory accounts whose session expires before the first call.
struct LocalAccounts {
    session_valid: AtomicBool,
    balance: u64,
}

impl LocalAccounts {
    fn check_session(&self) -> Result<(), Fault> {
        if self.session_valid.swap(true, Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Fault::session_expired("authentication token expired"))
        }
    }
}

impl AccountService for LocalAccounts {
    fn balance(&self, _account: &str) -> Result<u64, Fault> {
        self.check_session()?;
        Ok(self.balance)
    }

    fn transfer(&self, transfer: &Transfer) -> Result<u64, Fault> {
        self.check_session()?;
        if transfer.amount > self.balance {
            return Err(Fault::business(
                "account.insufficientFunds",
                vec![transfer.from.clone().into(), transfer.amount.into()],
            ));
        }
        Ok(self.balance - transfer.amount)
    }

    fn close(&self, account: &str) -> Result<(), Fault> {
        Err(Fault::wrap(
            callguard_core::WrapperKind::Invocation,
            "close failed",
            Fault::system(format!("ledger for {account} is unreachable"), None),
        ))
    }
}

impl AccountService for InterceptingInvoker<dyn AccountService> {
    fn balance(&self, account: &str) -> Result<u64, Fault> {
        self.invoke("balance", account.to_string(), |svc, account| {
            svc.balance(account)
        })
    }

    fn transfer(&self, transfer: &Transfer) -> Result<u64, Fault> {
        self.invoke("transfer", transfer.clone(), |svc, transfer| {
            svc.transfer(transfer)
        })
    }

    fn close(&self, account: &str) -> Result<(), Fault> {
        self.invoke("close", account.to_string(), |svc, account| svc.close(account))
    }
}

// ---------------------------------------------------------------------------
// Console UI
// ---------------------------------------------------------------------------

struct ConsoleIndicator;

impl ModalIndicator for ConsoleIndicator {
    fn set_message(&self, text: &str) {
        println!("[indicator] {text}");
    }

    fn set_progress(&self, progress: Option<u8>) {
        if let Some(p) = progress {
            println!("[indicator] {p}%");
        }
    }

    fn show(&self) {
        println!("[indicator] shown");
    }

    fn hide(&self) {
        println!("[indicator] hidden");
    }
}

/// Re-authenticates silently, at most three times per run.
#[derive(Default)]
struct ConsoleListener {
    logins: AtomicU32,
}

impl OperationListener for ConsoleListener {
    fn start(&self, description: &str) {
        println!("[listener] start: {description}");
    }

    fn success(&self, description: &str, success_message: &str) {
        println!("[listener] success: {description} {success_message}");
    }

    fn failure(&self, description: &str, fault: &Fault) {
        println!("[listener] failure: {description} ({fault})");
    }

    fn session_expired(&self, message: &str) -> bool {
        let logins = self.logins.fetch_add(1, Ordering::SeqCst);
        println!("[listener] {message}, logging in again");
        logins < 3
    }
}

/// Prints dialogs; the unknown-error dialog stays "open" until the user
/// acknowledges it, so later unknown faults are suppressed meanwhile.
#[derive(Default)]
struct ConsolePresenter {
    open_dialog: Mutex<Option<UnknownDialogGuard>>,
}

impl ConsolePresenter {
    fn acknowledge(&self) {
        self.open_dialog.lock().take();
    }
}

impl DialogPresenter for ConsolePresenter {
    fn show_message(&self, text: &str, message: &ExceptionMessage) {
        println!("[dialog] {:?}: {text}", message.severity());
    }

    fn show_unknown_error(&self, diagnostic: &str, guard: UnknownDialogGuard) {
        println!("[dialog] unexpected error:{diagnostic}");
        *self.open_dialog.lock() = Some(guard);
    }
}

fn catalog() -> StaticCatalog {
    let mut catalog = StaticCatalog::with_defaults();
    catalog.insert("Accounts.balance", "balance lookup");
    catalog.insert("Accounts.balance.success", "Balance loaded");
    catalog.insert("Accounts.transfer", "transfer");
    catalog.insert(
        "account.insufficientFunds",
        "Account {0} cannot cover {1}",
    );
    catalog
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut log_config = LoggingConfig::from_verbosity(args.verbose);
    log_config.json = args.json_logs;
    logging::init(&log_config)?;

    let exemptions = Arc::new(SerializationOverride::new());
    exemptions.set_pattern(args.exempt_pattern.as_deref())?;

    let catalog = Arc::new(catalog());
    let dispatch = DispatchLoop::new();
    let handle = dispatch.handle();

    let presenter = Arc::new(ConsolePresenter::default());
    let sink = TopLevelErrorSink::new(
        Arc::new(HandlerChain::with_defaults()),
        Arc::new(handle.clone()),
        presenter.clone(),
        catalog.clone(),
    );
    let ui_thread = dispatch
        .start(move |fault| {
            sink.handle(fault);
        })
        .context("failed to start UI dispatch loop")?;

    let ui = UiContext {
        entry_point: Arc::new(BlockingIndicator::new(Arc::new(ConsoleIndicator))),
        call_site: Arc::new(handle.clone()),
        catalog,
        exemptions,
    };
    let target: Arc<dyn AccountService> = Arc::new(LocalAccounts {
        session_valid: AtomicBool::new(false),
        balance: 120,
    });
    let accounts = Arc::new(InterceptingInvoker::wrap(
        "Accounts",
        Some(target),
        Arc::new(ConsoleListener::default()),
        args.force_serialization,
        ui,
    )?);

    // Interactive: the expired session is renewed and the call repeated.
    let interactive = Arc::clone(&accounts);
    let balance = handle.invoke_and_wait(move || interactive.balance("ACC-1"))??;
    println!("balance (interactive): {balance}");

    // Background: plain passthrough, no indicator or listener.
    let balance = accounts.balance("ACC-1")?;
    println!("balance (background): {balance}");

    // A business failure escaping a UI event becomes a short dialog.
    let ui_accounts = Arc::clone(&accounts);
    handle.invoke_later(Box::new(move || {
        ui_accounts
            .transfer(&Transfer {
                from: "ACC-1".into(),
                to: "ACC-2".into(),
                amount: 500,
            })
            .map(|_| ())
    }));

    // An unclassified failure opens the diagnostic dialog.
    let ui_accounts = Arc::clone(&accounts);
    handle.invoke_later(Box::new(move || ui_accounts.close("ACC-9")));

    handle.stop();
    ui_thread
        .join()
        .map_err(|_| anyhow::anyhow!("UI dispatch thread panicked"))?;
    presenter.acknowledge();
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
