//! Mock Method API server for testing
//!
//! One entity holding a credit card and an auto loan, plus an account held
//! by a different entity. Listing returns each account's listed balance;
//! reading a single account returns its refreshed balance, so tests can
//! tell fresh data from stale. Every request is recorded as `METHOD /path`.
//! - POST /entities, GET /entities/{id}
//! - POST /elements/token
//! - GET /accounts?holder_id=..&type=liability
//! - GET /accounts/{id}, POST /accounts/{id}/updates, POST /accounts/{id}/disconnect

use std::collections::HashSet;
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use serde_json::{json, Value as JsonValue};

use super::mock_http::{read_request, send_response};

pub const MOCK_ENTITY_ID: &str = "ent_mock";
pub const OTHER_ENTITY_ID: &str = "ent_other";
pub const CARD_ID: &str = "acc_card";
pub const AUTO_ID: &str = "acc_auto";
pub const FOREIGN_ID: &str = "acc_foreign";

#[derive(Debug, Clone)]
pub struct MockAccount {
    pub id: String,
    pub holder_id: String,
    pub liability_type: String,
    pub name: String,
    /// Cents, as returned by the listing
    pub listed_balance: i64,
    /// Cents, as returned by a single-account read
    pub fresh_balance: i64,
    pub rate: f64,
}

impl MockAccount {
    fn new(id: &str, holder_id: &str, liability_type: &str, name: &str, listed: i64, fresh: i64, rate: f64) -> Self {
        Self {
            id: id.to_string(),
            holder_id: holder_id.to_string(),
            liability_type: liability_type.to_string(),
            name: name.to_string(),
            listed_balance: listed,
            fresh_balance: fresh,
            rate,
        }
    }

    fn to_json(&self, balance: i64) -> JsonValue {
        let mut liability = json!({ "type": self.liability_type, "name": self.name });
        liability[self.liability_type.as_str()] = json!({
            "balance": balance,
            "interest_rate_percentage": self.rate,
            "next_payment_minimum_amount": 3500,
        });
        json!({
            "id": self.id,
            "holder_id": self.holder_id,
            "type": "liability",
            "status": "active",
            "liability": liability,
        })
    }
}

#[derive(Debug, Clone)]
pub struct MockState {
    pub accounts: Vec<MockAccount>,
    /// Single-account reads of these ids answer 500
    pub failing_reads: HashSet<String>,
    pub requests: Vec<String>,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            accounts: vec![
                MockAccount::new(CARD_ID, MOCK_ENTITY_ID, "credit_card", "Chase Freedom", 150000, 120000, 22.99),
                MockAccount::new(AUTO_ID, MOCK_ENTITY_ID, "auto_loan", "Ally Auto", 1834000, 1800000, 4.9),
                MockAccount::new(FOREIGN_ID, OTHER_ENTITY_ID, "personal_loan", "Other Loan", 500000, 490000, 11.5),
            ],
            failing_reads: HashSet::new(),
            requests: Vec::new(),
        }
    }
}

pub struct MockMethodServer {
    port: u16,
    state: Arc<Mutex<MockState>>,
    running: Arc<AtomicBool>,
    thread_handle: Option<thread::JoinHandle<()>>,
}

impl MockMethodServer {
    /// Start on a random available port
    pub fn start(initial: MockState) -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let port = listener.local_addr()?.port();
        listener.set_nonblocking(true)?;

        let running = Arc::new(AtomicBool::new(true));
        let state = Arc::new(Mutex::new(initial));

        let running_clone = running.clone();
        let state_clone = state.clone();
        let thread_handle = thread::spawn(move || {
            while running_clone.load(Ordering::SeqCst) {
                match listener.accept() {
                    Ok((stream, _)) => {
                        let state = state_clone.clone();
                        thread::spawn(move || handle_connection(stream, &state));
                    }
                    Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                        thread::sleep(std::time::Duration::from_millis(10));
                    }
                    Err(_) => break,
                }
            }
        });

        Ok(Self {
            port,
            state,
            running,
            thread_handle: Some(thread_handle),
        })
    }

    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    pub fn fail_reads_of(&self, account_id: &str) {
        self.state.lock().unwrap().failing_reads.insert(account_id.to_string());
    }

    pub fn requests(&self) -> Vec<String> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for MockMethodServer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn query_param<'a>(query: &'a str, name: &str) -> Option<&'a str> {
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}

fn handle_connection(mut stream: TcpStream, state: &Mutex<MockState>) {
    let Some((method, path, _body)) = read_request(&stream) else {
        send_response(&mut stream, 400, "Bad Request", r#"{"success": false, "message": "Invalid request"}"#);
        return;
    };
    let (route, query) = path.split_once('?').unwrap_or((path.as_str(), ""));

    let mut state = state.lock().unwrap();
    state.requests.push(format!("{} {}", method, route));

    let find = |id: &str| state.accounts.iter().find(|a| a.id == id).cloned();
    let segments: Vec<&str> = route.trim_matches('/').split('/').collect();

    let data = match (method.as_str(), segments.as_slice()) {
        ("POST", ["entities"]) => json!({ "id": MOCK_ENTITY_ID, "status": "active" }),
        ("GET", ["entities", id]) if *id == MOCK_ENTITY_ID || *id == OTHER_ENTITY_ID => {
            json!({ "id": id, "status": "active" })
        }
        ("POST", ["elements", "token"]) => json!({ "element_token": "pk_elem_mock" }),
        ("GET", ["accounts"]) => {
            let holder = query_param(query, "holder_id").unwrap_or_default();
            let listed: Vec<JsonValue> = state
                .accounts
                .iter()
                .filter(|a| a.holder_id == holder)
                .map(|a| a.to_json(a.listed_balance))
                .collect();
            JsonValue::Array(listed)
        }
        ("GET", ["accounts", id]) => match find(*id) {
            Some(_) if state.failing_reads.contains(*id) => {
                send_response(
                    &mut stream,
                    500,
                    "Internal Server Error",
                    r#"{"success": false, "data": null, "message": "mock failure"}"#,
                );
                return;
            }
            Some(account) => account.to_json(account.fresh_balance),
            None => return not_found(&mut stream),
        },
        ("POST", ["accounts", id, "updates"]) => match find(*id) {
            Some(_) => json!({ "id": "upd_mock", "status": "pending" }),
            None => return not_found(&mut stream),
        },
        ("POST", ["accounts", id, "disconnect"]) => match find(*id) {
            Some(account) => json!({ "id": account.id, "status": "disconnected" }),
            None => return not_found(&mut stream),
        },
        _ => return not_found(&mut stream),
    };

    let body = json!({ "success": true, "data": data, "message": null });
    send_response(&mut stream, 200, "OK", &body.to_string());
}

fn not_found(stream: &mut TcpStream) {
    send_response(
        stream,
        404,
        "Not Found",
        r#"{"success": false, "data": null, "message": "not found"}"#,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::method::MethodProvider;
    use crate::config::MethodSettings;
    use crate::domain::result::Error;
    use crate::domain::{AccountCategory, AccountSource, ConnectionRecord, DataMode};
    use crate::ports::{ConnectOptions, LiabilityProvider};
    use rust_decimal::Decimal;

    fn provider(server: &MockMethodServer) -> MethodProvider {
        let settings = MethodSettings {
            api_key: Some("sk_mock".to_string()),
            environment: Some("dev".to_string()),
            base_url: Some(server.base_url()),
        };
        MethodProvider::new(&settings, 5)
    }

    fn connection() -> ConnectionRecord {
        let mut conn = ConnectionRecord::new("user-1", AccountSource::Method, MOCK_ENTITY_ID, "Method");
        conn.item_ref = Some(MOCK_ENTITY_ID.to_string());
        conn
    }

    fn balance_of(records: &[crate::domain::AccountRecord], id: &str) -> Decimal {
        records
            .iter()
            .find(|r| r.provider_account_id.as_deref() == Some(id))
            .map(|r| r.current_balance)
            .unwrap_or_else(|| panic!("no account {}", id))
    }

    #[test]
    fn test_sync_all_refreshes_each_account() {
        let server = MockMethodServer::start(MockState::default()).unwrap();
        let records = provider(&server).sync_all_accounts(&connection()).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(balance_of(&records, CARD_ID), Decimal::new(120000, 2));
        assert_eq!(balance_of(&records, AUTO_ID), Decimal::new(1800000, 2));
        assert!(records.iter().all(|r| r.provider_account_id.as_deref() != Some(FOREIGN_ID)));

        let requests = server.requests();
        assert!(requests.contains(&format!("POST /accounts/{}/updates", CARD_ID)));
        assert!(requests.contains(&format!("POST /accounts/{}/updates", AUTO_ID)));
    }

    #[test]
    fn test_failed_refresh_falls_back_to_listed_data() {
        let server = MockMethodServer::start(MockState::default()).unwrap();
        server.fail_reads_of(AUTO_ID);

        let records = provider(&server).sync_all_accounts(&connection()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(balance_of(&records, CARD_ID), Decimal::new(120000, 2));
        assert_eq!(balance_of(&records, AUTO_ID), Decimal::new(1834000, 2));

        let auto = records.iter().find(|r| r.provider_account_id.as_deref() == Some(AUTO_ID)).unwrap();
        assert_eq!(auto.account_category, AccountCategory::AutoLoan);
        assert_eq!(auto.interest_rate, Decimal::new(49, 1));
    }

    #[test]
    fn test_sync_one_refreshes_owned_account() {
        let server = MockMethodServer::start(MockState::default()).unwrap();
        let record = provider(&server).sync_one_account(&connection(), CARD_ID).unwrap();

        assert_eq!(record.current_balance, Decimal::new(120000, 2));
        assert_eq!(record.account_category, AccountCategory::CreditCard);
        assert!(server.requests().contains(&format!("POST /accounts/{}/updates", CARD_ID)));
    }

    #[test]
    fn test_sync_one_missing_account_is_not_found() {
        let server = MockMethodServer::start(MockState::default()).unwrap();
        let err = provider(&server).sync_one_account(&connection(), "acc_missing").unwrap_err();

        assert!(matches!(err, Error::AccountNotFound(_)));
        assert!(!server.requests().iter().any(|r| r.ends_with("/updates")));
    }

    #[test]
    fn test_sync_one_foreign_account_rejected_before_update() {
        let server = MockMethodServer::start(MockState::default()).unwrap();
        let err = provider(&server).sync_one_account(&connection(), FOREIGN_ID).unwrap_err();

        assert!(matches!(err, Error::AccountNotFound(_)));
        let requests = server.requests();
        assert!(requests.contains(&format!("GET /accounts/{}", FOREIGN_ID)));
        assert!(!requests.contains(&format!("POST /accounts/{}/updates", FOREIGN_ID)));
    }

    #[test]
    fn test_sync_one_unreadable_account_is_upstream_failure() {
        let server = MockMethodServer::start(MockState::default()).unwrap();
        server.fail_reads_of(CARD_ID);

        let err = provider(&server).sync_one_account(&connection(), CARD_ID).unwrap_err();
        assert!(err.is_recoverable());
        assert!(!matches!(err, Error::AccountNotFound(_)));
    }

    #[test]
    fn test_connect_and_exchange() {
        let server = MockMethodServer::start(MockState::default()).unwrap();
        let provider = provider(&server);

        let result = provider.initiate_connection(&ConnectOptions {
            owner_user_id: "user-1".to_string(),
            mode: DataMode::Test,
            ..Default::default()
        });
        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.connection_ref.as_deref(), Some(MOCK_ENTITY_ID));
        assert_eq!(result.embed_token.as_deref(), Some("pk_elem_mock"));

        let grant = provider.exchange_token("user-1", MOCK_ENTITY_ID, DataMode::Test).unwrap();
        assert_eq!(grant.session_ref, MOCK_ENTITY_ID);
        assert_eq!(grant.item_ref.as_deref(), Some(MOCK_ENTITY_ID));

        assert!(provider.exchange_token("user-1", "ent_unknown", DataMode::Test).is_err());
    }

    #[test]
    fn test_terminate_disconnects_owned_accounts() {
        let server = MockMethodServer::start(MockState::default()).unwrap();
        assert!(provider(&server).terminate_connection(&connection()));

        let requests = server.requests();
        assert!(requests.contains(&format!("POST /accounts/{}/disconnect", CARD_ID)));
        assert!(requests.contains(&format!("POST /accounts/{}/disconnect", AUTO_ID)));
        assert!(!requests.contains(&format!("POST /accounts/{}/disconnect", FOREIGN_ID)));
    }
}
