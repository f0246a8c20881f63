//! JSON-RPC chain access via alloy.
//!
//! Reads are wrapped in bounded retry. Sends are legacy (gas-price) transactions,
//! signed locally and pushed with `eth_sendRawTransaction`, then awaited until
//! the receipt is mined. Nothing here caches nonces or gas prices.

use super::retry::{retry_read, RetryPolicy};
use super::{ChainAdapter, ContractCaller, TxTemplate};
use crate::contracts::{IUniswapV2Router02, IERC20};
use crate::error::ChainError;
use crate::types::{SecretKey, TxReceiptSummary};
use alloy::consensus::{SignableTransaction, TxEnvelope, TxLegacy};
use alloy::eips::eip2718::Encodable2718;
use alloy::network::{Ethereum, TxSignerSync};
use alloy::primitives::{Address, Bytes, TxKind, U256};
use alloy::providers::{Provider, RootProvider};
use alloy::rpc::types::{TransactionInput, TransactionRequest};
use alloy::signers::local::PrivateKeySigner;
use alloy::transports::http::reqwest::Url;
use async_trait::async_trait;
use tracing::{debug, info};

pub type HttpProvider = RootProvider<Ethereum>;

/// HTTP JSON-RPC implementation of `ChainAdapter` + `ContractCaller`
#[derive(Clone)]
pub struct RpcChain {
    provider: HttpProvider,
    chain_id: u64,
    retry: RetryPolicy,
}

impl RpcChain {
    pub fn connect_http(rpc_url: &str, chain_id: u64) -> Result<Self, ChainError> {
        let url = Url::parse(rpc_url).map_err(|e| ChainError::Rpc(format!("Invalid RPC URL: {}", e)))?;
        Ok(Self {
            provider: RootProvider::new_http(url),
            chain_id,
            retry: RetryPolicy::default(),
        })
    }

    /// Node's chain id, used at startup to catch a misconfigured CHAIN_ID
    pub async fn remote_chain_id(&self) -> Result<u64, ChainError> {
        let provider = self.provider.clone();
        retry_read("eth_chainId", self.retry, move |_| {
            let provider = provider.clone();
            async move { provider.get_chain_id().await.map_err(rpc_err) }
        })
        .await
    }

    fn request_for(&self, tx: &TxTemplate) -> TransactionRequest {
        TransactionRequest {
            from: Some(tx.from),
            to: Some(TxKind::Call(tx.to)),
            value: Some(tx.value),
            input: TransactionInput::new(tx.data.clone()),
            nonce: Some(tx.nonce),
            gas_price: Some(tx.gas_price),
            gas: tx.gas_limit,
            chain_id: Some(self.chain_id),
            ..Default::default()
        }
    }
}

fn rpc_err(e: impl std::fmt::Display) -> ChainError {
    ChainError::Rpc(e.to_string())
}

#[async_trait]
impl ChainAdapter for RpcChain {
    async fn get_balance(&self, address: Address) -> Result<U256, ChainError> {
        let provider = self.provider.clone();
        retry_read("eth_getBalance", self.retry, move |_| {
            let provider = provider.clone();
            async move { provider.get_balance(address).await.map_err(rpc_err) }
        })
        .await
    }

    async fn get_gas_price(&self) -> Result<u128, ChainError> {
        let provider = self.provider.clone();
        retry_read("eth_gasPrice", self.retry, move |_| {
            let provider = provider.clone();
            async move { provider.get_gas_price().await.map_err(rpc_err) }
        })
        .await
    }

    async fn get_transaction_count(&self, address: Address) -> Result<u64, ChainError> {
        let provider = self.provider.clone();
        retry_read("eth_getTransactionCount", self.retry, move |_| {
            let provider = provider.clone();
            async move { provider.get_transaction_count(address).await.map_err(rpc_err) }
        })
        .await
    }

    async fn estimate_gas(&self, tx: &TxTemplate) -> Result<u64, ChainError> {
        // A revert here is an answer, not a transport failure: no retry.
        let request = self.request_for(tx);
        self.provider
            .estimate_gas(request)
            .await
            .map_err(|e| ChainError::GasEstimation(e.to_string()))
    }

    async fn sign(&self, tx: &TxTemplate, key: &SecretKey) -> Result<Bytes, ChainError> {
        let gas_limit = tx
            .gas_limit
            .ok_or_else(|| ChainError::Signing("Missing gas limit in tx template".into()))?;

        let signer = PrivateKeySigner::from_bytes(key.expose())
            .map_err(|e| ChainError::Signing(format!("Invalid private key: {}", e)))?;
        if signer.address() != tx.from {
            return Err(ChainError::Signing(format!(
                "Key does not match sender {:?}",
                tx.from
            )));
        }

        let mut legacy = TxLegacy {
            chain_id: Some(self.chain_id),
            nonce: tx.nonce,
            gas_price: tx.gas_price,
            gas_limit,
            to: TxKind::Call(tx.to),
            value: tx.value,
            input: tx.data.clone(),
        };

        let sig = TxSignerSync::sign_transaction_sync(&signer, &mut legacy)
            .map_err(|e| ChainError::Signing(format!("Sign tx failed: {}", e)))?;
        let signed: TxEnvelope = legacy.into_signed(sig).into();
        Ok(signed.encoded_2718().into())
    }

    async fn broadcast(&self, signed: Bytes) -> Result<TxReceiptSummary, ChainError> {
        let pending = self
            .provider
            .send_raw_transaction(&signed)
            .await
            .map_err(|e| ChainError::Broadcast(e.to_string()))?;

        let hash = *pending.tx_hash();
        info!("Tx submitted: {:?}", hash);

        let receipt = pending
            .get_receipt()
            .await
            .map_err(|e| ChainError::Broadcast(format!("Confirmation failed for {:?}: {}", hash, e)))?;

        debug!(
            "Tx {:?} mined in block {:?} (gas used: {})",
            hash, receipt.block_number, receipt.gas_used
        );

        Ok(TxReceiptSummary {
            hash: receipt.transaction_hash,
            block_number: receipt.block_number,
            gas_used: receipt.gas_used,
            success: receipt.status(),
        })
    }
}

#[async_trait]
impl ContractCaller for RpcChain {
    async fn balance_of(&self, token: Address, owner: Address) -> Result<U256, ChainError> {
        let provider = self.provider.clone();
        retry_read("balanceOf", self.retry, move |_| {
            let contract = IERC20::new(token, provider.clone());
            async move { contract.balanceOf(owner).call().await.map_err(rpc_err) }
        })
        .await
    }

    async fn allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256, ChainError> {
        let provider = self.provider.clone();
        retry_read("allowance", self.retry, move |_| {
            let contract = IERC20::new(token, provider.clone());
            async move { contract.allowance(owner, spender).call().await.map_err(rpc_err) }
        })
        .await
    }

    async fn total_supply(&self, token: Address) -> Result<U256, ChainError> {
        let provider = self.provider.clone();
        retry_read("totalSupply", self.retry, move |_| {
            let contract = IERC20::new(token, provider.clone());
            async move { contract.totalSupply().call().await.map_err(rpc_err) }
        })
        .await
    }

    async fn get_amounts_out(
        &self,
        router: Address,
        amount_in: U256,
        path: Vec<Address>,
    ) -> Result<Vec<U256>, ChainError> {
        let provider = self.provider.clone();
        retry_read("getAmountsOut", self.retry, move |_| {
            let contract = IUniswapV2Router02::new(router, provider.clone());
            let path = path.clone();
            async move { contract.getAmountsOut(amount_in, path).call().await.map_err(rpc_err) }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::keys::MnemonicDerivation;
    use crate::chain::KeyDerivation;

    const TEST_PHRASE: &str = "test test test test test test test test test test test junk";

    fn template(from: Address) -> TxTemplate {
        TxTemplate {
            from,
            to: Address::repeat_byte(0x42),
            value: U256::from(1_000u64),
            data: Bytes::new(),
            nonce: 3,
            gas_price: 5_000_000_000,
            gas_limit: Some(21_000),
        }
    }

    #[test]
    fn test_invalid_url_is_rejected() {
        assert!(RpcChain::connect_http("not a url", 56).is_err());
    }

    #[tokio::test]
    async fn test_sign_produces_legacy_envelope() {
        let chain = RpcChain::connect_http("http://127.0.0.1:8545", 56).unwrap();
        let key = MnemonicDerivation::new().derive(TEST_PHRASE, 0).unwrap();

        let raw = chain.sign(&template(key.address), &key.secret).await.unwrap();
        // Legacy transactions are bare RLP lists, no type byte
        assert!(raw[0] >= 0xc0);
    }

    #[tokio::test]
    async fn test_sign_requires_gas_limit() {
        let chain = RpcChain::connect_http("http://127.0.0.1:8545", 56).unwrap();
        let key = MnemonicDerivation::new().derive(TEST_PHRASE, 0).unwrap();
        let mut tx = template(key.address);
        tx.gas_limit = None;

        assert!(matches!(chain.sign(&tx, &key.secret).await, Err(ChainError::Signing(_))));
    }

    #[tokio::test]
    async fn test_sign_rejects_foreign_sender() {
        let chain = RpcChain::connect_http("http://127.0.0.1:8545", 56).unwrap();
        let key = MnemonicDerivation::new().derive(TEST_PHRASE, 0).unwrap();

        let result = chain.sign(&template(Address::repeat_byte(9)), &key.secret).await;
        assert!(matches!(result, Err(ChainError::Signing(_))));
    }
}
