use std::error::Error;

use clap::{Parser, Subcommand};
use dialoguer::{Input, Password};
use dotenvy::dotenv;
use rollcall_cli::admin::create_admin;
use rollcall_cli::seeder::{self, SeedConfig};
use sqlx::PgPool;

#[derive(Parser)]
#[command(name = "rollcall-cli")]
#[command(about = "Rollcall CLI - Administrative tools for Rollcall", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an administrator account
    CreateAdmin {
        #[arg(short = 'f', long)]
        first_name: Option<String>,

        #[arg(short = 'l', long)]
        last_name: Option<String>,

        #[arg(short = 'e', long)]
        email: Option<String>,

        /// Password (will be prompted securely if not provided)
        #[arg(short = 'p', long)]
        password: Option<String>,
    },
    /// Seed fake classes, subjects, teachers, students, enrollments and schedules
    Seed {
        #[arg(short = 'c', long, default_value = "6")]
        classes: usize,

        #[arg(short = 's', long, default_value = "8")]
        subjects: usize,

        #[arg(short = 't', long, default_value = "6")]
        teachers: usize,

        /// Students enrolled in each class
        #[arg(long, default_value = "25")]
        students: usize,

        /// Lessons per school day
        #[arg(long, default_value = "6", value_parser = clap::value_parser!(u8).range(1..=10))]
        periods: u8,
    },
    /// Delete everything except admin accounts
    ClearSeed,
}

#[tokio::main]
async fn main() {
    dotenv().ok();

    if let Err(e) = run(Cli::parse()).await {
        eprintln!("\n❌ {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let pool = rollcall_db::init_db_pool().await?;

    match cli.command {
        Commands::CreateAdmin {
            first_name,
            last_name,
            email,
            password,
        } => handle_create_admin(&pool, first_name, last_name, email, password).await,
        Commands::Seed {
            classes,
            subjects,
            teachers,
            students,
            periods,
        } => {
            let config = SeedConfig {
                classes,
                subjects,
                teachers,
                students_per_class: students,
                periods_per_day: usize::from(periods),
            };
            seeder::seed_all(&pool, config).await
        }
        Commands::ClearSeed => seeder::clear_all(&pool).await,
    }
}

async fn handle_create_admin(
    pool: &PgPool,
    first_name: Option<String>,
    last_name: Option<String>,
    email: Option<String>,
    password: Option<String>,
) -> Result<(), Box<dyn Error>> {
    let first_name = match first_name {
        Some(v) => v,
        None => Input::new().with_prompt("First name").interact_text()?,
    };
    let last_name = match last_name {
        Some(v) => v,
        None => Input::new().with_prompt("Last name").interact_text()?,
    };
    let email = match email {
        Some(v) => v,
        None => Input::new().with_prompt("Email address").interact_text()?,
    };
    let password = match password {
        Some(v) => v,
        None => Password::new()
            .with_prompt("Password")
            .with_confirmation("Confirm password", "Passwords don't match")
            .interact()?,
    };

    create_admin(pool, &first_name, &last_name, &email, &password).await?;

    println!("\n✅ Admin created successfully!");
    println!("   Email: {}", email);
    println!("   Name: {} {}", first_name, last_name);
    Ok(())
}
