//! quizkit CLI — practice and exam sessions from the terminal.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

use quizkit_core::model::AnswerMode;

mod commands;

#[derive(Parser)]
#[command(name = "quizkit", version, about = "Command-line quiz client")]
struct Cli {
    /// Config file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a starter quizkit.toml
    Init,

    /// Log in and store the token
    Login {
        #[arg(long)]
        username: String,

        /// Password (read from QUIZKIT_PASSWORD or stdin when omitted)
        #[arg(long)]
        password: Option<String>,

        /// Ask the server for a long-lived token
        #[arg(long)]
        remember: bool,
    },

    /// Log out and forget the stored token
    Logout,

    /// Show the logged-in user
    Whoami {
        /// Fetch the profile from the server instead of the local copy
        #[arg(long)]
        remote: bool,
    },

    /// Decode a token and show when it expires
    Token {
        /// Token to inspect (defaults to the stored one)
        token: Option<String>,
    },

    /// List question banks
    Banks,

    /// Answer a bank one question at a time, graded immediately
    Practice {
        #[arg(long)]
        bank: u64,

        /// Continue a saved session instead of starting over
        #[arg(long)]
        resume: bool,

        /// Write the review to this file (.md or .json)
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Answer a whole bank, then submit everything at once
    Exam {
        #[arg(long)]
        bank: u64,

        #[arg(long)]
        resume: bool,

        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// List or edit favorite questions
    Favorites {
        /// Add a question to favorites
        #[arg(long, conflicts_with = "remove")]
        add: Option<u64>,

        /// Remove a question from favorites
        #[arg(long)]
        remove: Option<u64>,

        /// Notes to attach when adding
        #[arg(long, requires = "add")]
        notes: Option<String>,

        #[arg(long, default_value = "1")]
        page: u32,

        /// Write the list to this file (.md or .json)
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Review wrongly answered questions
    Mistakes {
        /// Mark a question as mastered
        #[arg(long, conflicts_with = "unmastered")]
        mastered: Option<u64>,

        /// Mark a question as not yet mastered
        #[arg(long)]
        unmastered: Option<u64>,

        #[arg(long, default_value = "1")]
        page: u32,

        /// Write the list to this file (.md or .json)
        #[arg(long)]
        report: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("quizkit=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.config;

    let result = match cli.command {
        Commands::Init => commands::init::execute(),
        Commands::Login {
            username,
            password,
            remember,
        } => commands::login::execute(username, password, remember, config).await,
        Commands::Logout => commands::logout::execute(config).await,
        Commands::Whoami { remote } => commands::whoami::execute(remote, config).await,
        Commands::Token { token } => commands::token::execute(token, config),
        Commands::Banks => commands::banks::execute(config).await,
        Commands::Practice {
            bank,
            resume,
            report,
        } => commands::quiz::execute(bank, AnswerMode::Practice, resume, report, config).await,
        Commands::Exam {
            bank,
            resume,
            report,
        } => commands::quiz::execute(bank, AnswerMode::Exam, resume, report, config).await,
        Commands::Favorites {
            add,
            remove,
            notes,
            page,
            report,
        } => commands::favorites::execute(add, remove, notes, page, report, config).await,
        Commands::Mistakes {
            mastered,
            unmastered,
            page,
            report,
        } => commands::mistakes::execute(mastered, unmastered, page, report, config).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
