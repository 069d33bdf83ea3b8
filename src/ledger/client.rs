use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use web3::signing::{Key, SecretKey, SecretKeyRef};

use crate::config::Config;
use crate::ledger::hashing::keccak256;
use crate::ledger::types::{
    LedgerAgreementStatus, LedgerError, LedgerMetadata, LedgerPaymentType, ModuleErrorRef,
    OnChainRecord, SubmitOutcome,
};

/// Pallet that owns agreement records on the ledger node.
pub const WORK_AGREEMENTS_MODULE: &str = "bazariWorkAgreements";

const INCLUSION_POLL_INTERVAL: Duration = Duration::from_secs(3);
const INCLUSION_WAIT: Duration = Duration::from_secs(90);

/// JSON-RPC client for the work-agreements pallet. Calls are signed with
/// the platform service key; the pallet takes the signer as the company
/// side of a registration.
#[derive(Debug)]
pub struct LedgerClient {
    http: reqwest::Client,
    rpc_url: String,
    signer: SecretKey,
    signer_address: String,
    request_id: AtomicU64,
    metadata: RwLock<Option<LedgerMetadata>>,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Value,
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitReceipt {
    tx_hash: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CallStatus {
    status: String,
    block_hash: Option<String>,
    error: Option<ModuleErrorRef>,
}

impl LedgerClient {
    pub fn new(config: &Config) -> Result<Self, LedgerError> {
        let key_hex = config.ledger_signer_key.trim_start_matches("0x");
        let key_bytes = hex::decode(key_hex).map_err(|e| LedgerError::Signer(e.to_string()))?;
        let signer =
            SecretKey::from_slice(&key_bytes).map_err(|e| LedgerError::Signer(e.to_string()))?;
        let signer_address = format!(
            "0x{}",
            hex::encode(SecretKeyRef::new(&signer).address().as_bytes())
        );

        Ok(Self {
            http: reqwest::Client::new(),
            rpc_url: config.ledger_rpc_url.clone(),
            signer,
            signer_address,
            request_id: AtomicU64::new(1),
            metadata: RwLock::new(None),
        })
    }

    pub fn signer_address(&self) -> &str {
        &self.signer_address
    }

    /// Registers an agreement under its id hash. The worker is named in the
    /// call; the company is taken from the signer.
    pub async fn create_agreement(
        &self,
        id_hash: &str,
        worker_address: &str,
        payment_type: LedgerPaymentType,
    ) -> Result<SubmitOutcome, LedgerError> {
        self.submit_call("createAgreement", json!([id_hash, worker_address, payment_type]))
            .await
    }

    pub async fn update_status(
        &self,
        id_hash: &str,
        status: LedgerAgreementStatus,
    ) -> Result<SubmitOutcome, LedgerError> {
        self.submit_call("updateStatus", json!([id_hash, status]))
            .await
    }

    /// Reads the agreement record stored under `id_hash`. Ok(None) means the
    /// ledger answered and no record exists; Err means we could not find out.
    pub async fn agreement(&self, id_hash: &str) -> Result<Option<OnChainRecord>, LedgerError> {
        let raw = self.rpc_call("ledger_agreement", json!([id_hash])).await?;
        if raw.is_null() {
            return Ok(None);
        }
        serde_json::from_value(raw)
            .map(Some)
            .map_err(|e| LedgerError::Decode(e.to_string()))
    }

    /// Whether the node is reachable and carries the work-agreements pallet.
    /// A cached snapshot without the pallet may predate a runtime upgrade,
    /// so it is refetched rather than trusted; only a snapshot that has the
    /// module answers without a round trip.
    pub async fn is_available(&self) -> bool {
        if let Some(meta) = self.metadata.read().await.as_ref() {
            if meta.has_module(WORK_AGREEMENTS_MODULE) {
                return true;
            }
        }
        match self.refresh_metadata().await {
            Ok(meta) => meta.has_module(WORK_AGREEMENTS_MODULE),
            Err(_) => false,
        }
    }

    pub async fn metadata(&self) -> Result<LedgerMetadata, LedgerError> {
        if let Some(meta) = self.metadata.read().await.as_ref() {
            return Ok(meta.clone());
        }
        self.refresh_metadata().await
    }

    /// Fetches a fresh metadata snapshot, replacing the cached one. Called
    /// lazily on first use and again after runtime upgrades surface as
    /// undecodable errors.
    pub async fn refresh_metadata(&self) -> Result<LedgerMetadata, LedgerError> {
        let raw = self.rpc_call("ledger_metadata", json!([])).await?;
        let meta: LedgerMetadata =
            serde_json::from_value(raw).map_err(|e| LedgerError::Decode(e.to_string()))?;
        *self.metadata.write().await = Some(meta.clone());
        Ok(meta)
    }

    async fn submit_call(&self, method: &str, args: Value) -> Result<SubmitOutcome, LedgerError> {
        let call = json!({
            "module": WORK_AGREEMENTS_MODULE,
            "method": method,
            "args": args,
            "signer": self.signer_address,
        });
        let signature = self.sign_call(&call)?;

        let raw = self
            .rpc_call(
                "ledger_submitCall",
                json!([{ "call": call, "signature": signature }]),
            )
            .await?;
        let receipt: SubmitReceipt =
            serde_json::from_value(raw).map_err(|e| LedgerError::Decode(e.to_string()))?;

        tracing::debug!(tx_hash = %receipt.tx_hash, method, "ledger call submitted");
        self.await_inclusion(&receipt.tx_hash).await
    }

    /// serde_json serializes object keys in sorted order, so the signed
    /// byte form of a call is canonical.
    fn sign_call(&self, call: &Value) -> Result<String, LedgerError> {
        let canonical = serde_json::to_vec(call).map_err(|e| LedgerError::Decode(e.to_string()))?;
        let digest = keccak256(&canonical);
        let signature = SecretKeyRef::new(&self.signer)
            .sign_message(&digest)
            .map_err(|e| LedgerError::Signer(e.to_string()))?;

        let mut raw = [0u8; 65];
        raw[..32].copy_from_slice(signature.r.as_bytes());
        raw[32..64].copy_from_slice(signature.s.as_bytes());
        raw[64] = signature.v as u8;
        Ok(format!("0x{}", hex::encode(raw)))
    }

    async fn await_inclusion(&self, tx_hash: &str) -> Result<SubmitOutcome, LedgerError> {
        let started = tokio::time::Instant::now();
        loop {
            tokio::time::sleep(INCLUSION_POLL_INTERVAL).await;

            let raw = self.rpc_call("ledger_callStatus", json!([tx_hash])).await?;
            let status: CallStatus =
                serde_json::from_value(raw).map_err(|e| LedgerError::Decode(e.to_string()))?;

            match status.status.as_str() {
                "inBlock" | "finalized" => {
                    if let Some(module_error) = status.error {
                        return Err(self.decode_module_error(&module_error).await);
                    }
                    return Ok(SubmitOutcome {
                        tx_hash: tx_hash.to_string(),
                        block_hash: status.block_hash.unwrap_or_default(),
                    });
                }
                "dropped" | "invalid" => {
                    return Err(match status.error {
                        Some(module_error) => self.decode_module_error(&module_error).await,
                        None => LedgerError::Rpc {
                            code: -1,
                            message: format!("call {} rejected by the node", tx_hash),
                        },
                    });
                }
                // "pending" and anything newer we keep waiting on.
                _ => {}
            }

            if started.elapsed() >= INCLUSION_WAIT {
                return Err(LedgerError::InclusionTimeout {
                    tx_hash: tx_hash.to_string(),
                    waited_secs: INCLUSION_WAIT.as_secs(),
                });
            }
        }
    }

    async fn decode_module_error(&self, error: &ModuleErrorRef) -> LedgerError {
        let opaque = || LedgerError::Execution {
            module: format!("module#{}", error.module_index),
            name: format!("error#{}", error.error_index),
            description: "unmapped module error".to_string(),
        };
        match self.metadata().await {
            Ok(meta) => match meta.decode_error(error) {
                Some(decoded) => decoded,
                // Stale snapshot after a runtime upgrade; try once more fresh.
                None => match self.refresh_metadata().await {
                    Ok(fresh) => fresh.decode_error(error).unwrap_or_else(opaque),
                    Err(_) => opaque(),
                },
            },
            Err(_) => opaque(),
        }
    }

    async fn rpc_call(&self, method: &str, params: Value) -> Result<Value, LedgerError> {
        let id = self.request_id.fetch_add(1, Ordering::Relaxed);
        let payload = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let response = self
            .http
            .post(&self.rpc_url)
            .json(&payload)
            .send()
            .await?
            .error_for_status()?;
        let body: RpcResponse = response.json().await?;

        if let Some(error) = body.error {
            return Err(LedgerError::Rpc {
                code: error.code,
                message: error.message,
            });
        }
        Ok(body.result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn test_config(rpc_url: &str, signer_key: &str) -> Config {
        Config {
            database_url: "postgres://localhost/bazari".to_string(),
            jwt_secret: "secret".to_string(),
            port: 8000,
            ledger_rpc_url: rpc_url.to_string(),
            ledger_signer_key: signer_key.to_string(),
            chat_service_url: None,
        }
    }

    fn test_client() -> LedgerClient {
        let config = test_config(
            "http://localhost:9966",
            "4c0883a69102937d6231471b5dbb6204fe512961708279feb1be6ae5538da033",
        );
        LedgerClient::new(&config).unwrap()
    }

    /// Answers one `ledger_metadata` request with the given result payload
    /// and closes the connection.
    async fn answer_metadata(listener: &TcpListener, result: &str) {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut buf = vec![0u8; 8192];
        let mut read = 0;
        loop {
            let n = stream.read(&mut buf[read..]).await.unwrap();
            assert!(n > 0, "client closed the connection before the request arrived");
            read += n;
            if String::from_utf8_lossy(&buf[..read]).contains("ledger_metadata") {
                break;
            }
        }
        let body = format!(r#"{{"jsonrpc":"2.0","id":1,"result":{}}}"#, result);
        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        );
        stream.write_all(response.as_bytes()).await.unwrap();
    }

    #[test]
    fn signer_address_derives_from_key() {
        let client = test_client();
        // Keccak-256 of the uncompressed public key for the key above,
        // last twenty bytes.
        assert_eq!(
            client.signer_address(),
            "0xb960bed53c17f9a021538b5d6f08e7466b966c53"
        );
    }

    #[tokio::test]
    async fn availability_recovers_after_a_runtime_upgrade() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let rpc_url = format!("http://{}", listener.local_addr().unwrap());

        let node = tokio::spawn(async move {
            // First the node answers without the pallet, then with it.
            answer_metadata(&listener, r#"{"modules":[]}"#).await;
            answer_metadata(
                &listener,
                r#"{"modules":[{"index":51,"name":"bazariWorkAgreements","errors":[]}]}"#,
            )
            .await;
        });

        let config = test_config(
            &rpc_url,
            "4c0883a69102937d6231471b5dbb6204fe512961708279feb1be6ae5538da033",
        );
        let client = LedgerClient::new(&config).unwrap();

        assert!(!client.is_available().await);
        // The module-less snapshot must not be trusted once the node has it.
        assert!(client.is_available().await);

        node.await.unwrap();
    }

    #[test]
    fn call_signature_is_stable_and_65_bytes() {
        let client = test_client();
        let call = json!({
            "module": WORK_AGREEMENTS_MODULE,
            "method": "updateStatus",
            "args": ["0xabc", "Paused"],
            "signer": client.signer_address(),
        });
        let first = client.sign_call(&call).unwrap();
        let second = client.sign_call(&call).unwrap();
        assert_eq!(first, second);
        assert_eq!(hex::decode(first.trim_start_matches("0x")).unwrap().len(), 65);
    }

    #[test]
    fn key_ordering_does_not_change_the_signature() {
        let client = test_client();
        let a: Value = serde_json::from_str(r#"{"method":"updateStatus","module":"bazariWorkAgreements","args":[],"signer":"0x00"}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"signer":"0x00","args":[],"module":"bazariWorkAgreements","method":"updateStatus"}"#).unwrap();
        assert_eq!(client.sign_call(&a).unwrap(), client.sign_call(&b).unwrap());
    }

    #[test]
    fn rejects_malformed_signer_key() {
        let config = test_config("http://localhost:9966", "not-hex");
        assert!(matches!(
            LedgerClient::new(&config),
            Err(LedgerError::Signer(_))
        ));
    }
}
