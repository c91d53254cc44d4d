// KratOs SDK CLI
// Operator tool for submitting operations and following them to consensus

mod ui;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use console::style;
use dialoguer::{theme::ColorfulTheme, Confirm};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use kratos_sdk::keystore::Keystore;
use kratos_sdk::{
    AccountBalanceQuery, AccountId, Client, ClientConfig, OperationId, PrivateKey, Query,
    TopicId, TopicMessageSubmitTransaction, TransferTransaction,
};

use crate::ui::{
    create_spinner, format_balance, parse_amount, print_error, print_header, print_info,
    print_nodes, print_receipt, print_success, read_password, read_password_with_confirm,
};

/// KratOs SDK - submit operations to a KratOs network
#[derive(Parser, Debug)]
#[command(name = "kratos-sdk")]
#[command(author = "KratOs Contributors")]
#[command(version)]
#[command(about = "Build, sign and submit operations to a KratOs network", long_about = None)]
struct Args {
    /// Path to client configuration file
    #[arg(short, long, env = "KRATOS_CONFIG")]
    config: Option<PathBuf>,

    /// Keystore directory holding the operator key
    #[arg(short, long, env = "KRATOS_KEYSTORE")]
    keystore: Option<PathBuf>,

    /// Keystore password (prompted when unset)
    #[arg(long, env = "KRATOS_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// Shorthand for --log-level debug
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create (or import) the operator key and store it encrypted
    Keygen {
        /// Account the key pays for
        #[arg(long)]
        account: Option<AccountId>,

        /// Import this hex secret instead of generating one
        #[arg(long)]
        import: Option<String>,

        /// Overwrite an existing keystore
        #[arg(long)]
        force: bool,
    },

    /// Show the balance of an account (the operator's by default)
    Balance { account: Option<AccountId> },

    /// Send KRAT from the operator account
    Transfer {
        #[arg(long)]
        to: AccountId,

        /// Amount in KRAT, e.g. 1.5
        #[arg(long)]
        amount: String,

        #[arg(long, default_value = "")]
        memo: String,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,

        /// Return after submission without waiting for the receipt
        #[arg(long)]
        no_wait: bool,
    },

    /// Submit a message to a topic, chunked when large
    SubmitMessage {
        #[arg(long)]
        topic: TopicId,

        /// Message text
        #[arg(long, conflicts_with = "file")]
        message: Option<String>,

        /// Read the message from a file
        #[arg(long)]
        file: Option<PathBuf>,

        /// Bytes per chunk (configured default when unset)
        #[arg(long)]
        chunk_size: Option<usize>,
    },

    /// Wait for the receipt of an operation
    Receipt { operation_id: OperationId },

    /// List the known consensus nodes
    Nodes {
        /// Re-read the address book first
        #[arg(long)]
        refresh: bool,
    },
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let level = if args.verbose {
        "debug".to_string()
    } else {
        args.log_level.clone()
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| level.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(args).await {
        print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let keystore = Keystore::new(&args.keystore.clone().unwrap_or_else(Keystore::default_dir));

    match args.command {
        Command::Keygen {
            account,
            import,
            force,
        } => keygen(&keystore, account, import, force),

        Command::Balance { account } => {
            let client = connect(&args.config)?;
            let account = match account {
                Some(account) => account,
                None => keystore
                    .info()?
                    .1
                    .context("no account given and the keystore has none")?,
            };

            let spinner = create_spinner("Querying balance...");
            let balance = Query::new(AccountBalanceQuery::new(account))
                .execute(&client)
                .await;
            spinner.finish_and_clear();

            print_header(&format!("💰 Balance of {}", account));
            println!("  {}", style(format_balance(balance?)).green().bold());
            println!();
            Ok(())
        }

        Command::Transfer {
            to,
            amount,
            memo,
            yes,
            no_wait,
        } => {
            let amount = parse_amount(&amount).map_err(anyhow::Error::msg)?;
            if amount == 0 {
                bail!("amount must be positive");
            }
            let client = connect(&args.config)?;
            let payer = unlock_operator(&client, &keystore, args.password.as_deref())?;

            println!();
            println!("{}", style("  Transaction Summary:").yellow());
            println!("  ├── From: {}", style(payer).white());
            println!("  ├── To: {}", style(to).white());
            println!("  └── Amount: {}", style(format_balance(amount)).green().bold());
            println!();

            if !yes
                && !Confirm::with_theme(&ColorfulTheme::default())
                    .with_prompt("Send this transaction?")
                    .default(false)
                    .interact()?
            {
                print_info("Transaction cancelled");
                return Ok(());
            }

            let spinner = create_spinner("Submitting transaction...");
            let response = TransferTransaction::default()
                .add_send(payer, to, amount)
                .with_memo(memo)
                .execute(&client)
                .await;
            let response = match response {
                Ok(response) => response,
                Err(e) => {
                    spinner.finish_and_clear();
                    return Err(e.into());
                }
            };
            info!("Transfer {} accepted by {}", response.operation_id, response.node_account_id);

            if no_wait {
                spinner.finish_and_clear();
                print_success(&format!("Submitted {}", response.operation_id));
                return Ok(());
            }

            spinner.set_message("Waiting for consensus...");
            let receipt = response.get_receipt(&client).await;
            spinner.finish_and_clear();

            print_header(&format!("📤 Transfer {}", response.operation_id));
            print_receipt(&receipt?);
            println!();
            Ok(())
        }

        Command::SubmitMessage {
            topic,
            message,
            file,
            chunk_size,
        } => {
            let message = match (message, file) {
                (Some(text), _) => text.into_bytes(),
                (None, Some(path)) => std::fs::read(&path)
                    .with_context(|| format!("failed to read {}", path.display()))?,
                (None, None) => bail!("either --message or --file is required"),
            };
            let client = connect(&args.config)?;
            unlock_operator(&client, &keystore, args.password.as_deref())?;

            let mut transaction = TopicMessageSubmitTransaction::default()
                .with_topic_id(topic)
                .with_message(message);
            if let Some(chunk_size) = chunk_size {
                transaction = transaction.with_chunk_size(chunk_size);
            }

            let spinner = create_spinner("Submitting message...");
            let frozen = transaction.freeze_with(&client)?;
            let chunks = frozen.chunks().len();
            let responses = match frozen.execute_all(&client).await {
                Ok(responses) => responses,
                Err(e) => {
                    spinner.finish_and_clear();
                    return Err(e.into());
                }
            };

            spinner.set_message("Waiting for consensus...");
            let mut receipts = Vec::with_capacity(responses.len());
            for response in &responses {
                receipts.push((response.operation_id, response.get_receipt(&client).await));
            }
            spinner.finish_and_clear();

            print_header(&format!("📨 Message to {} ({} chunk(s))", topic, chunks));
            for (operation_id, receipt) in receipts {
                println!("  {}", style(operation_id).cyan());
                print_receipt(&receipt?);
                println!();
            }
            Ok(())
        }

        Command::Receipt { operation_id } => {
            let client = connect(&args.config)?;
            let spinner = create_spinner("Waiting for consensus...");
            let receipt = client.await_receipt(operation_id).await;
            spinner.finish_and_clear();

            print_header(&format!("🧾 Receipt of {}", operation_id));
            print_receipt(&receipt?);
            println!();
            Ok(())
        }

        Command::Nodes { refresh } => {
            let client = connect(&args.config)?;
            if refresh {
                let spinner = create_spinner("Reading address book...");
                let refreshed = client.refresh_network().await;
                spinner.finish_and_clear();
                refreshed?;
            }

            print_header(&format!("🌐 Network '{}'", client.config().network_name));
            print_nodes(&client.network());
            Ok(())
        }
    }
}

/// Load the client configuration, falling back to defaults
fn connect(path: &Option<PathBuf>) -> anyhow::Result<Client> {
    let path = path.clone().unwrap_or_else(ClientConfig::default_path);
    let config = if path.exists() {
        ClientConfig::load(&path)?
    } else {
        warn!("Config file {} not found, using defaults", path.display());
        ClientConfig::default()
    };
    Ok(Client::for_config(config)?)
}

/// Decrypt the keystore and install it as the client's operator
fn unlock_operator(
    client: &Client,
    keystore: &Keystore,
    password: Option<&str>,
) -> anyhow::Result<AccountId> {
    if !keystore.exists() {
        bail!("no keystore found, run `kratos-sdk keygen --account <id>` first");
    }
    let password = match password {
        Some(password) => password.to_string(),
        None => read_password("Keystore password")?,
    };

    let (key, account) = keystore.load(&password)?;
    let account = account.context("the keystore has no account id; re-run keygen with --account")?;
    client.set_operator(account, Arc::new(key));
    Ok(account)
}

fn keygen(
    keystore: &Keystore,
    account: Option<AccountId>,
    import: Option<String>,
    force: bool,
) -> anyhow::Result<()> {
    if keystore.exists() && !force {
        bail!("a keystore already exists, pass --force to overwrite it");
    }

    let key = match import {
        Some(secret) => secret
            .parse::<PrivateKey>()
            .context("invalid secret key")?,
        None => PrivateKey::generate(),
    };

    let password = read_password_with_confirm("New keystore password")?;
    keystore.save(&key, account, &password)?;

    print_header("🔐 Operator key");
    println!("  {} {}", style("Public key:").bold(), style(key.public_key()).green());
    if let Some(account) = account {
        println!("  {} {}", style("Account:").bold(), style(account).green());
    }
    println!();
    print_success("Keystore saved");
    Ok(())
}
