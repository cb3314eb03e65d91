//! End-to-end tests of the user repository against a file-backed SQLite database.
//!
//! Tests verify that:
//! - Counting, searching and paging agree with each other
//! - Lookups by id, username and email return the expected records
//! - Every supported hashing scheme validates the right password only

use base64::{Engine as _, engine::general_purpose::STANDARD};
use db_user_provider::db::ConnectionProvider;
use db_user_provider::error::StoreError;
use db_user_provider::models::{Dialect, Pageable, QueryConfig, QueryTemplates};
use db_user_provider::repository::UserRepository;
use rand::Rng;
use rand::distributions::Alphanumeric;
use sha2::{Digest, Sha256};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::str::FromStr;
use std::sync::Arc;
use tempfile::TempDir;

const USERS: [(i64, &str, Option<&str>, &str); 5] = [
    (1, "alice", Some("alice@example.com"), "wonderland"),
    (2, "bob", Some("bob@example.org"), "builder"),
    (3, "carol", Some("carol@example.com"), "singer"),
    (4, "dave", None, "diver"),
    (5, "erin", Some("erin@corp.test"), "explorer"),
];

fn pbkdf2_record(password: &str, salt: &str, iterations: u32) -> String {
    let mut key = [0u8; 32];
    pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), salt.as_bytes(), iterations, &mut key);
    format!("pbkdf2_sha256${}${}${}", iterations, salt, STANDARD.encode(key))
}

/// Create and fill the users table, returning its connection URL.
async fn seed_database(dir: &TempDir) -> String {
    let url = format!("sqlite:{}", dir.path().join("users.db").display());
    let options = SqliteConnectOptions::from_str(&url)
        .unwrap()
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .unwrap();

    sqlx::query(
        "CREATE TABLE users (
            id INTEGER PRIMARY KEY,
            username TEXT NOT NULL,
            email TEXT,
            sha256_pwd TEXT,
            pbkdf2_pwd TEXT,
            bcrypt_pwd TEXT
        )",
    )
    .execute(&pool)
    .await
    .unwrap();

    for (id, username, email, password) in USERS {
        sqlx::query("INSERT INTO users VALUES (?, ?, ?, ?, ?, ?)")
            .bind(id)
            .bind(username)
            .bind(email)
            .bind(hex::encode(Sha256::digest(password.as_bytes())))
            .bind(pbkdf2_record(password, "s4lt", 1000))
            .bind(bcrypt::hash(password, 4).unwrap())
            .execute(&pool)
            .await
            .unwrap();
    }

    pool.close().await;
    url
}

fn templates(password_column: &str) -> QueryTemplates {
    QueryTemplates {
        list_all: "SELECT id, username, email FROM users ORDER BY id".into(),
        count: "SELECT COUNT(*) FROM users".into(),
        find_by_id: "SELECT id, username, email FROM users WHERE id = ?".into(),
        find_by_username: "SELECT id, username, email FROM users WHERE username = ?".into(),
        find_by_search_term: "SELECT id, username, email FROM users \
                              WHERE username LIKE '%' || ? || '%' \
                              OR email LIKE '%' || ? || '%' \
                              ORDER BY id;"
            .into(),
        find_password_hash: format!("SELECT {} FROM users WHERE username = ?", password_column),
    }
}

struct Fixture {
    _dir: TempDir,
    provider: Arc<ConnectionProvider>,
}

impl Fixture {
    async fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let url = seed_database(&dir).await;
        let provider = Arc::new(ConnectionProvider::new());
        provider
            .configure(&url, Dialect::SQLite, "", "", "sqlite-test")
            .await
            .unwrap();
        Self {
            _dir: dir,
            provider,
        }
    }

    fn repository(&self, password_column: &str, hash_function: &str, bcrypt: bool) -> UserRepository {
        let config = QueryConfig::builder(templates(password_column), Dialect::SQLite)
            .hash_function(hash_function)
            .bcrypt(bcrypt)
            .build()
            .unwrap();
        UserRepository::new(Arc::new(config), self.provider.clone()).unwrap()
    }

    fn sha256(&self) -> UserRepository {
        self.repository("sha256_pwd", "SHA-256", false)
    }
}

fn usernames(rows: &[db_user_provider::models::RowRecord]) -> Vec<String> {
    rows.iter()
        .map(|r| r["username"].clone().unwrap_or_default())
        .collect()
}

fn random_string(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

#[tokio::test]
async fn test_count_and_list_all() {
    let fixture = Fixture::new().await;
    let repo = fixture.sha256();

    assert_eq!(repo.count_users(None).await.unwrap(), 5);
    let all = repo.all_users().await.unwrap();
    assert_eq!(
        usernames(&all),
        vec!["alice", "bob", "carol", "dave", "erin"]
    );
    assert_eq!(all[3]["email"], None);
}

#[tokio::test]
async fn test_paging_windows() {
    let fixture = Fixture::new().await;
    let repo = fixture.sha256();

    let first = repo
        .find_users(None, Some(&Pageable::window(0, 2)))
        .await
        .unwrap();
    assert_eq!(usernames(&first), vec!["alice", "bob"]);

    let middle = repo
        .find_users(None, Some(&Pageable::window(2, 2)))
        .await
        .unwrap();
    assert_eq!(usernames(&middle), vec!["carol", "dave"]);

    let tail = repo
        .find_users(None, Some(&Pageable::new(Some(4), None)))
        .await
        .unwrap();
    assert_eq!(usernames(&tail), vec!["erin"]);

    // Max results alone starts at the first user.
    let head = repo
        .find_users(None, Some(&Pageable::new(None, Some(1))))
        .await
        .unwrap();
    assert_eq!(usernames(&head), vec!["alice"]);

    let past_end = repo
        .find_users(None, Some(&Pageable::window(10, 5)))
        .await
        .unwrap();
    assert!(past_end.is_empty());
}

#[tokio::test]
async fn test_search_matches_username_and_email() {
    let fixture = Fixture::new().await;
    let repo = fixture.sha256();

    let by_email = repo.find_users(Some("example.com"), None).await.unwrap();
    assert_eq!(usernames(&by_email), vec!["alice", "carol"]);
    assert_eq!(repo.count_users(Some("example.com")).await.unwrap(), 2);

    let by_name = repo.find_users(Some("ro"), None).await.unwrap();
    assert_eq!(usernames(&by_name), vec!["carol"]);

    let paged = repo
        .find_users(Some("example"), Some(&Pageable::window(1, 1)))
        .await
        .unwrap();
    assert_eq!(usernames(&paged), vec!["bob"]);

    // An empty term is no filter at all.
    assert_eq!(repo.find_users(Some(""), None).await.unwrap().len(), 5);
    assert_eq!(repo.count_users(Some("")).await.unwrap(), 5);
}

#[tokio::test]
async fn test_count_agrees_with_search_for_random_terms() {
    let fixture = Fixture::new().await;
    let repo = fixture.sha256();

    let mut terms: Vec<String> = (1..=3).map(random_string).collect();
    terms.extend(["a", "e", "example", "'", "%"].map(String::from));

    for term in terms {
        let count = repo.count_users(Some(&term)).await.unwrap();
        let rows = repo.find_users(Some(&term), None).await.unwrap();
        assert_eq!(count, rows.len() as i64, "term {:?}", term);
    }
}

#[tokio::test]
async fn test_lookups() {
    let fixture = Fixture::new().await;
    let repo = fixture.sha256();

    let carol = repo.find_by_id("3").await.unwrap().unwrap();
    assert_eq!(carol["username"].as_deref(), Some("carol"));
    assert_eq!(carol["id"].as_deref(), Some("3"));
    assert_eq!(carol.len(), 3);

    assert!(repo.find_by_id("42").await.unwrap().is_none());
    assert!(matches!(
        repo.find_by_id("abc").await,
        Err(StoreError::InvalidIdentifier { .. })
    ));
    assert!(matches!(
        repo.find_by_id("").await,
        Err(StoreError::InvalidIdentifier { .. })
    ));

    let dave = repo.find_by_username("dave").await.unwrap().unwrap();
    assert_eq!(dave["email"], None);
    assert!(repo.find_by_username("mallory").await.unwrap().is_none());
    assert_eq!(repo.find_by_email("erin").await.unwrap().unwrap()["id"].as_deref(), Some("5"));
}

#[tokio::test]
async fn test_validate_sha256() {
    let fixture = Fixture::new().await;
    let repo = fixture.sha256();

    for (_, username, _, password) in USERS {
        assert!(repo.validate_credentials(username, password).await.unwrap());
    }
    assert!(!repo.validate_credentials("alice", "builder").await.unwrap());
    assert!(!repo.validate_credentials("alice", "").await.unwrap());
    assert!(!repo.validate_credentials("mallory", "wonderland").await.unwrap());
}

#[tokio::test]
async fn test_validate_pbkdf2() {
    let fixture = Fixture::new().await;
    let repo = fixture.repository("pbkdf2_pwd", "PBKDF2-SHA256", false);

    assert!(repo.validate_credentials("bob", "builder").await.unwrap());
    assert!(!repo.validate_credentials("bob", "Builder").await.unwrap());
}

#[tokio::test]
async fn test_validate_bcrypt() {
    let fixture = Fixture::new().await;
    let repo = fixture.repository("bcrypt_pwd", "ignored", true);

    assert!(repo.validate_credentials("erin", "explorer").await.unwrap());
    assert!(!repo.validate_credentials("erin", "diver").await.unwrap());
}

#[tokio::test]
async fn test_malformed_stored_hash_is_an_error() {
    let fixture = Fixture::new().await;
    // SHA-256 hex is not a PBKDF2 record.
    let repo = fixture.repository("sha256_pwd", "PBKDF2-SHA256", false);

    assert!(matches!(
        repo.validate_credentials("alice", "wonderland").await,
        Err(StoreError::MalformedCredentialRecord { .. })
    ));
}

#[tokio::test]
async fn test_broken_template_yields_empty_results() {
    let fixture = Fixture::new().await;
    let mut broken = templates("sha256_pwd");
    broken.list_all = "SELECT * FROM missing_table".into();
    broken.count = "SELECT COUNT(*) FROM missing_table".into();
    let config = QueryConfig::builder(broken, Dialect::SQLite).build().unwrap();
    let repo = UserRepository::new(Arc::new(config), fixture.provider.clone()).unwrap();

    assert_eq!(repo.count_users(None).await.unwrap(), 0);
    assert!(repo.all_users().await.unwrap().is_empty());
    // The other templates still work.
    assert!(repo.find_by_username("alice").await.unwrap().is_some());
}
