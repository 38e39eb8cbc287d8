//! Manual entry provider
//!
//! Accounts the user types in. There is nothing upstream to fetch, so
//! sync is a no-op and manual rows are only ever changed through the
//! account service.

use crate::domain::result::{Error, Result};
use crate::domain::{AccountRecord, AccountSource, ConnectionRecord, DataMode};
use crate::ports::{ConnectOptions, ConnectResult, LiabilityProvider, SessionGrant};

pub struct ManualProvider;

impl LiabilityProvider for ManualProvider {
    fn source(&self) -> AccountSource {
        AccountSource::Manual
    }

    fn is_available(&self) -> bool {
        true
    }

    fn initiate_connection(&self, _options: &ConnectOptions) -> ConnectResult {
        ConnectResult {
            success: true,
            ..Default::default()
        }
    }

    fn exchange_token(&self, _owner_user_id: &str, _public_token: &str, _mode: DataMode) -> Result<SessionGrant> {
        Err(Error::validation("manual accounts have no session to exchange"))
    }

    fn terminate_connection(&self, connection: &ConnectionRecord) -> bool {
        connection.active
    }

    fn list_accounts(&self, _connection: &ConnectionRecord) -> Result<Vec<AccountRecord>> {
        Ok(Vec::new())
    }

    fn sync_one_account(
        &self,
        _connection: &ConnectionRecord,
        provider_account_id: &str,
    ) -> Result<AccountRecord> {
        Err(Error::AccountNotFound(provider_account_id.to_string()))
    }
}
