use std::{error::Error, fs::File, io::Write, path::PathBuf};

use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use crossterm::{
    cursor,
    event::{self, Event, KeyCode, KeyEvent, KeyModifiers},
    execute,
    style::Print,
    terminal,
    terminal::ClearType,
};
use engine::{Engine, EngineError, NewAccount, StatementLayout};
use migration::MigratorTrait;
use sea_orm::{Database, DatabaseConnection};

#[derive(Parser, Debug)]
#[command(name = "reconcile_admin")]
#[command(about = "Admin utilities for the reconciliation ledger")]
struct Cli {
    /// Database connection string (also read from `DATABASE_URL`).
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "sqlite:./reconcile.db?mode=rwc"
    )]
    database_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Account(AccountArgs),
    Statement(StatementArgs),
    Lineage(LineageArgs),
    Balances(BalancesArgs),
}

#[derive(Args, Debug)]
struct AccountArgs {
    #[command(subcommand)]
    command: AccountCommand,
}

#[derive(Subcommand, Debug)]
enum AccountCommand {
    /// Create a staff account; the password is prompted for.
    Create(AccountCreateArgs),
}

#[derive(Args, Debug)]
struct AccountCreateArgs {
    #[arg(long)]
    email: String,
    #[arg(long)]
    firstname: String,
    #[arg(long)]
    lastname: String,
    /// May be repeated.
    #[arg(long = "role")]
    roles: Vec<String>,
}

#[derive(Args, Debug)]
struct StatementArgs {
    #[command(subcommand)]
    command: StatementCommand,
}

#[derive(Subcommand, Debug)]
enum StatementCommand {
    /// Import a bank statement exported as CSV.
    Import {
        file: PathBuf,
        /// The file has no header row.
        #[arg(long)]
        no_header: bool,
    },
}

#[derive(Args, Debug)]
struct LineageArgs {
    #[command(subcommand)]
    command: LineageCommand,
}

#[derive(Subcommand, Debug)]
enum LineageCommand {
    /// Compare a parent's drawn amount with its children's credit.
    Check { parent_id: i32 },
}

#[derive(Args, Debug)]
struct BalancesArgs {
    #[command(subcommand)]
    command: BalancesCommand,
}

#[derive(Subcommand, Debug)]
enum BalancesCommand {
    /// Rewrite every stored balance from credit and amount used.
    Recompute,
}

struct RawModeGuard;

impl RawModeGuard {
    fn enter() -> Result<Self, Box<dyn Error + Send + Sync>> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

fn prompt_password(prompt: &str) -> Result<String, Box<dyn Error + Send + Sync>> {
    let _raw = RawModeGuard::enter()?;

    let mut out = std::io::stderr();
    execute!(
        out,
        cursor::MoveToColumn(0),
        terminal::Clear(ClearType::CurrentLine),
        Print(prompt)
    )?;
    out.flush()?;

    let mut buf = String::new();
    loop {
        let Event::Key(KeyEvent {
            code, modifiers, ..
        }) = event::read()?
        else {
            continue;
        };

        match code {
            KeyCode::Enter => {
                execute!(out, Print("\r\n"))?;
                out.flush()?;
                break;
            }
            KeyCode::Backspace => {
                if buf.pop().is_some() {
                    execute!(out, cursor::MoveLeft(1), Print(" "), cursor::MoveLeft(1))?;
                    out.flush()?;
                }
            }
            KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => {
                execute!(out, Print("\r\n"))?;
                out.flush()?;
                return Err("interrupted".into());
            }
            KeyCode::Char(ch) if !modifiers.contains(KeyModifiers::CONTROL) => {
                buf.push(ch);
                execute!(out, Print("*"))?;
                out.flush()?;
            }
            _ => {}
        }
    }

    Ok(buf)
}

fn prompt_password_twice() -> Result<String, Box<dyn Error + Send + Sync>> {
    let mut out = std::io::stderr();
    for _ in 0..3 {
        let p1 = prompt_password("Password: ")?;
        if p1.is_empty() {
            execute!(
                out,
                cursor::MoveToColumn(0),
                terminal::Clear(ClearType::CurrentLine),
                Print("Password must not be empty.\r\n")
            )?;
            continue;
        }

        let p2 = prompt_password("Confirm password: ")?;
        if p1 == p2 {
            return Ok(p1);
        }

        execute!(
            out,
            cursor::MoveToColumn(0),
            terminal::Clear(ClearType::CurrentLine),
            Print("Passwords do not match. Try again.\r\n")
        )?;
    }

    Err("too many attempts".into())
}

async fn connect_db(
    database_url: &str,
) -> Result<DatabaseConnection, Box<dyn Error + Send + Sync>> {
    let db = Database::connect(database_url).await?;
    migration::Migrator::up(&db, None).await?;
    Ok(db)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter("engine=warn")
        .with_writer(std::io::stderr)
        .init();

    let db = connect_db(&cli.database_url).await?;
    let engine = Engine::builder().database(db).build().await?;

    match cli.command {
        Command::Account(AccountArgs {
            command: AccountCommand::Create(args),
        }) => {
            let password = prompt_password_twice()?;
            let new_account = args.roles.into_iter().fold(
                NewAccount::new(args.email, password, args.firstname, args.lastname),
                NewAccount::role,
            );

            match engine.create_account(new_account, Utc::now()).await {
                Ok(account) => println!("created account: {} ({})", account.email, account.id),
                Err(EngineError::ExistingKey(email)) => {
                    eprintln!("account already exists: {email}");
                    std::process::exit(1);
                }
                Err(err @ EngineError::InvalidCredentials(_)) => {
                    eprintln!("{err}");
                    std::process::exit(2);
                }
                Err(err) => return Err(err.into()),
            }
        }
        Command::Statement(StatementArgs {
            command: StatementCommand::Import { file, no_header },
        }) => {
            let layout = StatementLayout {
                has_header: !no_header,
                ..StatementLayout::default()
            };
            let reader = File::open(&file)?;

            match engine.ingest_csv(reader, &layout, Utc::now()).await {
                Ok(summary) => println!(
                    "imported {}: {} inserted, {} skipped",
                    file.display(),
                    summary.inserted,
                    summary.skipped
                ),
                Err(err @ (EngineError::UploadRejected(_)
                | EngineError::InvalidStatement(_)
                | EngineError::InvalidAmount(_)
                | EngineError::InvalidDate(_))) => {
                    eprintln!("{err}");
                    std::process::exit(2);
                }
                Err(err) => return Err(err.into()),
            }
        }
        Command::Lineage(LineageArgs {
            command: LineageCommand::Check { parent_id },
        }) => {
            let report = engine.check_lineage(parent_id).await?;
            println!(
                "parent {}: credit {}, used {}, children {:?} (credit {})",
                report.parent_id,
                report.parent_credit,
                report.parent_amount_used,
                report.children,
                report.children_credit
            );
            if !report.consistent {
                eprintln!("lineage is inconsistent");
                std::process::exit(3);
            }
            println!("lineage is consistent");
        }
        Command::Balances(BalancesArgs {
            command: BalancesCommand::Recompute,
        }) => {
            let updated = engine.recompute_balances().await?;
            println!("recomputed {updated} balances");
        }
    }

    Ok(())
}
