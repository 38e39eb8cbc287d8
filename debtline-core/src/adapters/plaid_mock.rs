//! Mock Plaid API server for testing
//!
//! Serves the handful of Plaid endpoints the provider calls, backed by a
//! single credit card whose balance tests can move between syncs:
//! - POST /link/token/create returns { link_token }
//! - POST /item/public_token/exchange returns { access_token, item_id }
//! - POST /item/get + /institutions/get_by_id resolve the bank name
//! - POST /accounts/get and /liabilities/get return the card
//! - POST /item/remove acknowledges

use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use serde_json::json;

use super::mock_http::{read_request, send_response};

pub const MOCK_ACCESS_TOKEN: &str = "access-sandbox-mock";
pub const MOCK_ITEM_ID: &str = "item-mock-1";
pub const MOCK_ACCOUNT_ID: &str = "plaid-card-1";
pub const MOCK_INSTITUTION: &str = "First Platypus Bank";

/// Mutable state behind the mock endpoints
#[derive(Debug, Clone)]
pub struct MockState {
    /// Reported as-is in balances.current (negative for owed)
    pub balance: String,
    pub purchase_apr: String,
    /// When set, /liabilities/get answers with a Plaid error
    pub fail_liabilities: bool,
    /// When set, every endpoint answers with a Plaid error
    pub fail_all: bool,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            balance: "-100.00".to_string(),
            purchase_apr: "19.99".to_string(),
            fail_liabilities: false,
            fail_all: false,
        }
    }
}

/// Mock Plaid server for testing
pub struct MockPlaidServer {
    port: u16,
    state: Arc<Mutex<MockState>>,
    running: Arc<AtomicBool>,
    thread_handle: Option<thread::JoinHandle<()>>,
}

impl MockPlaidServer {
    /// Start on a random available port
    pub fn start(initial: MockState) -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let port = listener.local_addr()?.port();
        let running = Arc::new(AtomicBool::new(true));
        let state = Arc::new(Mutex::new(initial));

        // Non-blocking accept so stop() can end the loop
        listener.set_nonblocking(true)?;

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

    pub fn set_balance(&self, balance: &str) {
        self.state.lock().unwrap().balance = balance.to_string();
    }

    pub fn set_fail_liabilities(&self, fail: bool) {
        self.state.lock().unwrap().fail_liabilities = fail;
    }

    pub fn set_fail_all(&self, fail: bool) {
        self.state.lock().unwrap().fail_all = fail;
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for MockPlaidServer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn handle_connection(mut stream: TcpStream, state: &Mutex<MockState>) {
    let Some((method, path, _body)) = read_request(&stream) else {
        send_response(&mut stream, 400, "Bad Request", r#"{"error_message": "Invalid request"}"#);
        return;
    };

    if method != "POST" {
        send_response(&mut stream, 405, "Method Not Allowed", r#"{"error_message": "POST only"}"#);
        return;
    }

    let snapshot = state.lock().unwrap().clone();
    if snapshot.fail_all {
        send_plaid_error(&mut stream, "ITEM_ERROR", "INTERNAL_SERVER_ERROR");
        return;
    }

    let body = match path.as_str() {
        "/link/token/create" => json!({
            "link_token": "link-sandbox-mock",
            "expiration": "2030-01-01T00:00:00Z",
            "request_id": "req-1"
        }),
        "/item/public_token/exchange" => json!({
            "access_token": MOCK_ACCESS_TOKEN,
            "item_id": MOCK_ITEM_ID,
            "request_id": "req-2"
        }),
        "/item/get" => json!({
            "item": { "item_id": MOCK_ITEM_ID, "institution_id": "ins_109508" },
            "request_id": "req-3"
        }),
        "/institutions/get_by_id" => json!({
            "institution": { "institution_id": "ins_109508", "name": MOCK_INSTITUTION },
            "request_id": "req-4"
        }),
        "/accounts/get" => json!({
            "accounts": [card_json(&snapshot), checking_json()],
            "request_id": "req-5"
        }),
        "/liabilities/get" => {
            if snapshot.fail_liabilities {
                send_plaid_error(&mut stream, "ITEM_ERROR", "PRODUCTS_NOT_SUPPORTED");
                return;
            }
            json!({
                "accounts": [card_json(&snapshot)],
                "liabilities": {
                    "credit": [{
                        "account_id": MOCK_ACCOUNT_ID,
                        "aprs": [
                            { "apr_percentage": 27.99, "apr_type": "cash_apr" },
                            { "apr_percentage": snapshot.purchase_apr, "apr_type": "purchase_apr" }
                        ],
                        "minimum_payment_amount": 25,
                        "last_payment_date": "2025-01-15",
                        "next_payment_due_date": "2025-02-15"
                    }],
                    "student": null,
                    "mortgage": null
                },
                "request_id": "req-6"
            })
        }
        "/item/remove" => json!({ "request_id": "req-7" }),
        _ => {
            send_response(&mut stream, 404, "Not Found", r#"{"error_message": "Endpoint not found"}"#);
            return;
        }
    };

    send_response(&mut stream, 200, "OK", &body.to_string());
}

fn card_json(state: &MockState) -> serde_json::Value {
    json!({
        "account_id": MOCK_ACCOUNT_ID,
        "name": "Platypus Rewards Card",
        "official_name": "Platypus Rewards Visa Signature",
        "type": "credit",
        "subtype": "credit card",
        "balances": { "current": state.balance, "available": null, "limit": 5000 }
    })
}

fn checking_json() -> serde_json::Value {
    json!({
        "account_id": "plaid-checking-1",
        "name": "Platypus Checking",
        "type": "depository",
        "subtype": "checking",
        "balances": { "current": 1200.50, "limit": null }
    })
}

fn send_plaid_error(stream: &mut TcpStream, error_type: &str, error_code: &str) {
    let body = json!({
        "error_type": error_type,
        "error_code": error_code,
        "error_message": "mock failure",
        "display_message": null
    });
    send_response(stream, 400, "Bad Request", &body.to_string());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::plaid::{PlaidClient, PlaidProvider};
    use crate::config::PlaidSettings;
    use crate::domain::{AccountCategory, AccountSource, ConnectionRecord, DataMode};
    use crate::ports::{ConnectOptions, LiabilityProvider};
    use rust_decimal::Decimal;

    fn settings(server: &MockPlaidServer) -> PlaidSettings {
        PlaidSettings {
            client_id: Some("mock-client".to_string()),
            secret: Some("mock-secret".to_string()),
            environment: Some("sandbox".to_string()),
            base_url: Some(server.base_url()),
        }
    }

    fn connection() -> ConnectionRecord {
        let mut conn =
            ConnectionRecord::new("user-1", AccountSource::Plaid, MOCK_ACCESS_TOKEN, MOCK_INSTITUTION);
        conn.item_ref = Some(MOCK_ITEM_ID.to_string());
        conn
    }

    #[test]
    fn test_link_token() {
        let server = MockPlaidServer::start(MockState::default()).unwrap();
        let provider = PlaidProvider::new(&settings(&server), 5);

        let result = provider.initiate_connection(&ConnectOptions {
            owner_user_id: "user-1".to_string(),
            mode: DataMode::Test,
            ..Default::default()
        });
        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.embed_token.as_deref(), Some("link-sandbox-mock"));
    }

    #[test]
    fn test_exchange_resolves_institution() {
        let server = MockPlaidServer::start(MockState::default()).unwrap();
        let provider = PlaidProvider::new(&settings(&server), 5);

        let grant = provider.exchange_token("user-1", "public-sandbox-x", DataMode::Test).unwrap();
        assert_eq!(grant.session_ref, MOCK_ACCESS_TOKEN);
        assert_eq!(grant.item_ref.as_deref(), Some(MOCK_ITEM_ID));
        assert_eq!(grant.institution_label, MOCK_INSTITUTION);
    }

    #[test]
    fn test_list_accounts_over_http() {
        let server = MockPlaidServer::start(MockState::default()).unwrap();
        let provider = PlaidProvider::new(&settings(&server), 5);

        let accounts = provider.list_accounts(&connection()).unwrap();
        assert_eq!(accounts.len(), 1);
        let card = &accounts[0];
        assert_eq!(card.account_category, AccountCategory::CreditCard);
        assert_eq!(card.current_balance, Decimal::new(10000, 2));
        assert_eq!(card.interest_rate, Decimal::new(1999, 2));
        assert_eq!(card.credit_limit, Some(Decimal::new(5000, 0)));
    }

    #[test]
    fn test_liabilities_failure_is_tolerated() {
        let server = MockPlaidServer::start(MockState::default()).unwrap();
        server.set_fail_liabilities(true);
        let provider = PlaidProvider::new(&settings(&server), 5);

        let accounts = provider.list_accounts(&connection()).unwrap();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].interest_rate, Decimal::ZERO);
    }

    #[test]
    fn test_plaid_error_is_upstream_failure() {
        let server = MockPlaidServer::start(MockState::default()).unwrap();
        server.set_fail_all(true);
        let client = PlaidClient::new(&settings(&server), 5).unwrap();

        let err = client.get_accounts(DataMode::Test, MOCK_ACCESS_TOKEN).unwrap_err();
        assert!(err.is_recoverable());
        assert!(err.to_string().contains("INTERNAL_SERVER_ERROR"));
    }

    #[test]
    fn test_sync_one_unknown_account() {
        let server = MockPlaidServer::start(MockState::default()).unwrap();
        let provider = PlaidProvider::new(&settings(&server), 5);

        let err = provider.sync_one_account(&connection(), "not-mine").unwrap_err();
        assert!(matches!(err, crate::domain::result::Error::AccountNotFound(_)));
    }

    #[test]
    fn test_remove_item() {
        let server = MockPlaidServer::start(MockState::default()).unwrap();
        let provider = PlaidProvider::new(&settings(&server), 5);

        assert!(provider.terminate_connection(&connection()));

        let mut inactive = connection();
        inactive.active = false;
        assert!(!provider.terminate_connection(&inactive));
    }
}
