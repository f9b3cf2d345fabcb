use anyhow::anyhow;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use url::Url;

use crate::content::{ContentKey, ContentMap};
use crate::error::FetchError;
use crate::fetcher::Fetcher;
use crate::payout::{Account, GlobalProperties, MedianPrice, RewardFund};

/// Location of a post: `/{category}/@{author}/{permlink}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostPath {
    pub category: String,
    pub author: String,
    pub permlink: String,
}

impl PostPath {
    pub fn key(&self) -> ContentKey {
        ContentKey::new(&self.author, &self.permlink)
    }

    pub fn state_path(&self) -> String {
        format!("/{}/@{}/{}", self.category, self.author, self.permlink)
    }
}

impl std::str::FromStr for PostPath {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().trim_matches('/').split('/').collect();
        match parts.as_slice() {
            [category, author, permlink]
                if !category.is_empty() && author.len() > 1 && !permlink.is_empty() =>
            {
                let author = author
                    .strip_prefix('@')
                    .ok_or_else(|| anyhow!("author segment must start with '@': {s}"))?;
                Ok(Self {
                    category: category.to_string(),
                    author: author.to_string(),
                    permlink: permlink.to_string(),
                })
            }
            _ => Err(anyhow!("expected /category/@author/permlink, got {s}")),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LedgerState {
    #[serde(default)]
    pub content: ContentMap,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    #[serde(default)]
    message: String,
}

#[derive(Clone)]
pub struct LedgerClient {
    fetcher: Fetcher,
    url: Url,
}

impl LedgerClient {
    pub fn new(fetcher: Fetcher, url: Url) -> Self {
        Self { fetcher, url }
    }

    pub async fn get_state(&self, path: &PostPath) -> Result<LedgerState, FetchError> {
        self.call("condenser_api.get_state", json!([path.state_path()]))
            .await
    }

    pub async fn get_account(&self, name: &str) -> Result<Account, FetchError> {
        let accounts: Vec<Account> = self
            .call("condenser_api.get_accounts", json!([[name]]))
            .await?;
        accounts
            .into_iter()
            .next()
            .ok_or_else(|| FetchError::Ledger(format!("unknown account {name}")))
    }

    pub async fn get_global_properties(&self) -> Result<GlobalProperties, FetchError> {
        self.call("condenser_api.get_dynamic_global_properties", json!([]))
            .await
    }

    pub async fn get_reward_fund(&self) -> Result<RewardFund, FetchError> {
        self.call("condenser_api.get_reward_fund", json!(["post"]))
            .await
    }

    pub async fn get_median_price(&self) -> Result<MedianPrice, FetchError> {
        self.call("condenser_api.get_current_median_history_price", json!([]))
            .await
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<T, FetchError> {
        let body = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1,
        });
        let label = format!("RPC {method}");
        let (status, bytes) = self
            .fetcher
            .send(&label, |client| client.post(self.url.clone()).json(&body))
            .await
            .map_err(FetchError::Transport)?;

        if !status.is_success() {
            return Err(FetchError::Transport(anyhow!(
                "{label} failed with status {status}"
            )));
        }

        let resp: RpcResponse<T> = serde_json::from_slice(&bytes)
            .map_err(|e| FetchError::Transport(anyhow!(e).context(format!("parse {label}"))))?;
        match (resp.result, resp.error) {
            (_, Some(err)) => Err(FetchError::Ledger(err.message)),
            (Some(result), None) => Ok(result),
            (None, None) => Err(FetchError::Ledger(format!("{method} returned no result"))),
        }
    }
}
