use std::error::Error;
use std::path::Path;
use std::process::exit;

use clap::Parser;
use rusqlite::Connection;
use time::{Duration, OffsetDateTime};

use pennywise_rs::{
    MessagePreference, Transaction, TransactionType, User, UserId, create_transaction,
    epoch_millis, initialize_db, upsert_user,
};

/// A utility for creating a test database for the REST API server of pennywise_rs.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to save the SQLite database to.
    #[arg(long, short)]
    output_path: String,
}

/// Create and populate a database for manual testing.
fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let output_path = Path::new(&args.output_path);

    match output_path.extension() {
        None => {
            eprintln!("Output path must include a file extension (e.g., 'my_database.db').");
            exit(1);
        }
        Some(extension) if extension.is_empty() => {
            eprintln!("Output path must include a file extension (e.g., 'my_database.db').");
            exit(1);
        }
        _ => {}
    }

    if output_path.is_file() {
        eprintln!("File already exists at {output_path:#?}!");
        exit(1);
    }

    println!("Creating database at {output_path:#?}");
    let conn = Connection::open(output_path)?;

    initialize_db(&conn)?;

    println!("Creating test users...");

    let users = [
        ("weekly-user", Some("test-token-weekly"), MessagePreference::Weekly),
        ("monthly-user", Some("test-token-monthly"), MessagePreference::Monthly),
        ("quiet-user", Some("test-token-quiet"), MessagePreference::None),
        ("tokenless-user", None, MessagePreference::Weekly),
    ];

    for (id, fcm_token, message_preference) in users {
        upsert_user(
            &User {
                email: Some(format!("{id}@example.com")),
                fcm_token: fcm_token.map(str::to_owned),
                message_preference,
                ..User::new(UserId::new(id))
            },
            &conn,
        )?;
    }

    println!("Creating test transactions...");

    let now = OffsetDateTime::now_utc();

    for (id, _, _) in users {
        // One expense every three days and a pay day every fortnight for the last two months.
        for days_ago in (0..60).step_by(3) {
            let date = epoch_millis(now - Duration::days(days_ago));

            create_transaction(
                &Transaction {
                    id: format!("{id}-expense-{days_ago}"),
                    user_id: UserId::new(id),
                    amount: Some(5.0 + days_ago as f64 * 1.25),
                    kind: TransactionType::Expense,
                    category_id: "groceries".to_owned(),
                    name: "Groceries".to_owned(),
                    note: None,
                    date,
                    updated_at: date,
                },
                &conn,
            )?;

            if days_ago % 14 == 0 {
                create_transaction(
                    &Transaction {
                        id: format!("{id}-income-{days_ago}"),
                        user_id: UserId::new(id),
                        amount: Some(1200.0),
                        kind: TransactionType::Income,
                        category_id: "salary".to_owned(),
                        name: "Pay".to_owned(),
                        note: Some("Fortnightly pay".to_owned()),
                        date,
                        updated_at: date,
                    },
                    &conn,
                )?;
            }
        }
    }

    println!("Success!");

    Ok(())
}
