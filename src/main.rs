use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use strongbox::cli::{
    handle_category_command, handle_import_command, handle_init, handle_mapping_command,
    handle_password_command, handle_transaction_command, handle_transfer_command, unlock_session,
    CategoryCommands, ImportArgs, MappingCommands, PasswordCommands, TransactionCommands,
    TransferCommands,
};
use strongbox::config::{paths::StrongboxPaths, settings::Settings};
use strongbox::storage::Storage;

#[derive(Parser)]
#[command(
    name = "strongbox",
    version,
    about = "Local-first encrypted personal finance ledger",
    long_about = "Strongbox keeps your transactions encrypted on disk with a key derived \
                  from your password. Import bank statement CSVs, review suggested \
                  categories, and pair transfers between accounts."
)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Set up the password for a new ledger
    Init,

    /// Show current configuration and paths
    Config,

    /// Category management commands
    #[command(subcommand)]
    Category(CategoryCommands),

    /// Transaction management commands
    #[command(subcommand, alias = "transaction")]
    Txn(TransactionCommands),

    /// Stage, review and commit statement CSV files
    Import(ImportArgs),

    /// Description and account mappings
    #[command(subcommand, alias = "mapping")]
    Mappings(MappingCommands),

    /// Transfer linking
    #[command(subcommand)]
    Transfer(TransferCommands),

    /// Password management
    #[command(subcommand)]
    Password(PasswordCommands),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Priority: RUST_LOG env var > --verbose flag > default (warn)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr).compact())
        .init();

    let paths = StrongboxPaths::new()?;
    let mut settings = Settings::load_or_create(&paths)?;

    let command = match cli.command {
        Some(command) => command,
        None => {
            println!("Strongbox - encrypted personal finance ledger");
            println!();
            println!("Run 'strongbox --help' for usage information.");
            println!("Run 'strongbox init' to set up a new ledger.");
            return Ok(());
        }
    };

    match command {
        Commands::Init => handle_init(&paths, &mut settings)?,
        Commands::Config => {
            println!("Strongbox Configuration");
            println!("=======================");
            println!("Base directory:  {}", paths.base_dir().display());
            println!("Data directory:  {}", paths.data_dir().display());
            println!("Audit log:       {}", paths.audit_log().display());
            println!();
            println!("Settings:");
            println!("  Password set:        {}", settings.has_credential());
            println!("  CSV delimiter:       {:?}", settings.import.delimiter);
            println!(
                "  Transfer window:     {} days",
                settings.import.transfer_match_window_days
            );
            println!(
                "  Skip duplicates:     {}",
                settings.import.skip_duplicates_by_default
            );
        }
        Commands::Password(cmd) => {
            let storage = Storage::open(paths.clone())?;
            handle_password_command(&paths, &mut settings, &storage, cmd)?
        }
        command => {
            let storage = Storage::open(paths.clone())?;
            let session = unlock_session(&paths, &settings)?;

            match command {
                Commands::Category(cmd) => handle_category_command(&storage, &session, cmd)?,
                Commands::Txn(cmd) => handle_transaction_command(&storage, &session, cmd)?,
                Commands::Import(args) => {
                    handle_import_command(&storage, &session, &settings.import, args)?
                }
                Commands::Mappings(cmd) => {
                    handle_mapping_command(&storage, &session, &settings.import, cmd)?
                }
                Commands::Transfer(cmd) => handle_transfer_command(
                    &storage,
                    &session,
                    settings.import.transfer_match_window_days,
                    cmd,
                )?,
                Commands::Init | Commands::Config | Commands::Password(_) => {}
            }
        }
    }

    Ok(())
}
