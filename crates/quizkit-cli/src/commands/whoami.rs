//! The `quizkit whoami` command.

use std::path::PathBuf;

use anyhow::Result;

use quizkit_core::model::User;
use quizkit_core::token::format_remaining;

pub async fn execute(remote: bool, config_path: Option<PathBuf>) -> Result<()> {
    let ctx = super::context(config_path)?;
    if !ctx.credentials().check_and_clean() {
        println!("Not logged in.");
        return Ok(());
    }

    let user = if remote {
        Some(ctx.client().profile().await?)
    } else {
        ctx.credentials().user()
    };

    match user {
        Some(user) => print_user(&user),
        None => println!("Logged in (no stored profile)"),
    }
    println!(
        "Token expires in {}",
        format_remaining(ctx.credentials().remaining_secs())
    );
    Ok(())
}

fn print_user(user: &User) {
    match &user.nickname {
        Some(nick) => println!("{nick} ({})", user.username),
        None => println!("{}", user.username),
    }
    if let Some(email) = &user.email {
        println!("  email: {email}");
    }
    if let Some(role) = &user.role {
        println!("  role:  {role}");
    }
}
