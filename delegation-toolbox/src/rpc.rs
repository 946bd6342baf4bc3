//! [`BatchCaller`] over JSON-RPC 2.0 batches of `eth_call`.

use crate::config::NetworksConfig;
use alloy_json_rpc::{Id, Request, ResponsePacket, ResponsePayload};
use alloy_primitives::{Address, Bytes};
use delegation_snapshot::{
    BatchCaller, BatchError, BlockRef, CallOutput, CallRequest, ConfigError, NetworkId,
};
use reqwest::blocking::Client;
use serde::Serialize;
use std::collections::HashMap;
use std::hash::Hash;

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
struct EthCall {
    to: Address,
    data: Bytes,
}

/// `eth_call` parameters: the call and the block tag.
type CallParams = (EthCall, String);

pub struct RpcBatchCaller {
    client: Client,
    url: String,
    max_batch_size: usize,
}

impl RpcBatchCaller {
    pub fn new(url: impl Into<String>, max_batch_size: usize) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
            max_batch_size: max_batch_size.max(1),
        }
    }

    pub fn from_config(config: &NetworksConfig, network: NetworkId) -> Result<Self, ConfigError> {
        Ok(Self::new(config.rpc_url(network)?, config.max_batch_size))
    }

    fn send(&self, payload: &[Request<CallParams>]) -> Result<ResponsePacket<Bytes>, BatchError> {
        self.client
            .post(&self.url)
            .json(payload)
            .send()
            .and_then(|response| response.error_for_status())
            .and_then(|response| response.json())
            .map_err(|e| BatchError::Transport(Box::new(e)))
    }
}

impl BatchCaller for RpcBatchCaller {
    fn execute<K>(
        &self,
        requests: Vec<CallRequest<K>>,
        block: BlockRef,
    ) -> Result<HashMap<K, CallOutput>, BatchError>
    where
        K: Eq + Hash + Clone,
    {
        execute_chunked(requests, block, self.max_batch_size, |payload| {
            self.send(payload)
        })
    }
}

/// Sends `requests` in batches of at most `max_batch_size` calls and merges
/// the decoded outputs. Any failing batch fails the whole execution.
fn execute_chunked<K, F>(
    requests: Vec<CallRequest<K>>,
    block: BlockRef,
    max_batch_size: usize,
    mut send: F,
) -> Result<HashMap<K, CallOutput>, BatchError>
where
    K: Eq + Hash + Clone,
    F: FnMut(&[Request<CallParams>]) -> Result<ResponsePacket<Bytes>, BatchError>,
{
    let tag = block.to_rpc_tag();
    let mut outputs = HashMap::with_capacity(requests.len());
    for (index, chunk) in requests.chunks(max_batch_size.max(1)).enumerate() {
        tracing::debug!(chunk = index, calls = chunk.len(), block = %block, "sending eth_call batch");
        let packet = send(&encode_batch(chunk, &tag))?;
        outputs.extend(decode_batch(chunk, packet)?);
    }
    Ok(outputs)
}

/// Request ids are the positions of the calls in the chunk.
fn encode_batch<K>(chunk: &[CallRequest<K>], tag: &str) -> Vec<Request<CallParams>> {
    chunk
        .iter()
        .enumerate()
        .map(|(id, request)| {
            let call = EthCall {
                to: request.target,
                data: request.call.calldata().into(),
            };
            Request::new("eth_call", Id::Number(id as u64), (call, tag.to_string()))
        })
        .collect()
}

fn decode_batch<K: Clone>(
    chunk: &[CallRequest<K>],
    packet: ResponsePacket<Bytes>,
) -> Result<Vec<(K, CallOutput)>, BatchError> {
    // nodes reject a whole batch (rate limits, oversized payloads) with a single error
    let responses = match packet {
        ResponsePacket::Single(response) => {
            if let ResponsePayload::Failure(error) = &response.payload {
                return Err(BatchError::Transport(
                    format!("batch rejected ({}): {}", error.code, error.message).into(),
                ));
            }
            vec![response]
        }
        ResponsePacket::Batch(responses) => responses,
    };
    let mut payloads = responses
        .into_iter()
        .filter_map(|response| match response.id {
            Id::Number(id) => Some((id, response.payload)),
            _ => None,
        })
        .collect::<HashMap<_, _>>();

    chunk
        .iter()
        .enumerate()
        .map(|(id, request)| -> Result<(K, CallOutput), BatchError> {
            match payloads.remove(&(id as u64)) {
                None => Err(BatchError::MissingResponse(id)),
                Some(ResponsePayload::Failure(error)) => Err(BatchError::Call {
                    id,
                    message: format!("{} ({})", error.message, error.code),
                }),
                Some(ResponsePayload::Success(data)) => {
                    Ok((request.key.clone(), request.call.decode(&data)?))
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{hex, U256};
    use delegation_snapshot::contract::DecodeError;
    use delegation_snapshot::{ContractCall, StakeBalance};

    fn word(value: u64) -> String {
        format!("{:064x}", value)
    }

    fn registry() -> Address {
        Address::from([0x5e; 20])
    }

    fn requests() -> Vec<CallRequest<&'static str>> {
        vec![
            CallRequest::new("epoch", registry(), ContractCall::CurrentEpoch),
            CallRequest::new(
                "stake",
                Address::from([0xc1; 20]),
                ContractCall::TotalStake(Address::from([0xa0; 20])),
            ),
        ]
    }

    fn parse(json: &str) -> ResponsePacket<Bytes> {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn batch_encoding() {
        let requests = requests();
        let tag = BlockRef::Number(16).to_rpc_tag();
        let json = serde_json::to_value(encode_batch(&requests, &tag)).unwrap();

        assert_eq!(json[0]["jsonrpc"], "2.0");
        assert_eq!(json[0]["method"], "eth_call");
        assert_eq!(json[0]["id"], 0);
        assert_eq!(json[0]["params"][0]["to"], serde_json::to_value(registry()).unwrap());
        assert_eq!(
            json[0]["params"][0]["data"],
            format!("0x{}", hex::encode(ContractCall::CurrentEpoch.selector()))
        );
        assert_eq!(json[0]["params"][1], "0x10");

        assert_eq!(json[1]["id"], 1);
        let selector = hex::encode(ContractCall::TotalStake(Address::ZERO).selector());
        assert_eq!(
            json[1]["params"][0]["data"],
            format!("0x{}{}{}", selector, "0".repeat(24), "a0".repeat(20))
        );
    }

    #[test]
    fn responses_are_matched_by_id() {
        let response = parse(&format!(
            r#"[
                {{ "jsonrpc": "2.0", "id": 1, "result": "0x{}{}" }},
                {{ "jsonrpc": "2.0", "id": 0, "result": "0x{}" }}
            ]"#,
            word(250),
            word(7),
            word(41)
        ));

        let outputs = decode_batch(&requests(), response)
            .unwrap()
            .into_iter()
            .collect::<HashMap<_, _>>();
        assert_eq!(outputs["epoch"], CallOutput::Counter(41));
        assert_eq!(
            outputs["stake"],
            CallOutput::Stake(StakeBalance {
                amount: U256::from(250u64),
                exchange_rate: U256::from(7u64),
            })
        );
    }

    #[test]
    fn call_error_fails_the_batch() {
        let response = parse(&format!(
            r#"[
                {{ "jsonrpc": "2.0", "id": 0, "result": "0x{}" }},
                {{ "jsonrpc": "2.0", "id": 1, "error": {{ "code": -32000, "message": "execution reverted" }} }}
            ]"#,
            word(41)
        ));
        assert!(matches!(
            decode_batch(&requests(), response),
            Err(BatchError::Call { id: 1, message }) if message.contains("execution reverted")
        ));
    }

    #[test]
    fn missing_response_fails_the_batch() {
        let response = parse(&format!(
            r#"[{{ "jsonrpc": "2.0", "id": 0, "result": "0x{}" }}]"#,
            word(41)
        ));
        assert!(matches!(
            decode_batch(&requests(), response),
            Err(BatchError::MissingResponse(1))
        ));
    }

    #[test]
    fn rejected_batch() {
        let response = parse(
            r#"{ "jsonrpc": "2.0", "id": null, "error": { "code": -32005, "message": "rate limit exceeded" } }"#,
        );
        assert!(matches!(
            decode_batch(&requests(), response),
            Err(BatchError::Transport(_))
        ));
    }

    #[test]
    fn short_result_is_a_decode_error() {
        let response = parse(r#"[{ "jsonrpc": "2.0", "id": 0, "result": "0x" }]"#);
        assert!(matches!(
            decode_batch(&requests()[..1], response),
            Err(BatchError::Decode(DecodeError::Abi(_)))
        ));
    }

    #[test]
    fn chunks_restart_ids_and_merge_outputs() {
        let requests = (1..=5u8)
            .map(|id| {
                CallRequest::new(
                    id,
                    registry(),
                    ContractCall::ValidatorContract(u64::from(id)),
                )
            })
            .collect::<Vec<_>>();

        let mut chunks = Vec::new();
        let outputs = execute_chunked(requests, BlockRef::Latest, 2, |payload| {
            let json = serde_json::to_value(payload).unwrap();
            let calls = json.as_array().unwrap();
            chunks.push(calls.iter().map(|call| call["id"].clone()).collect::<Vec<_>>());

            // answer in reverse order; validator `n` maps to contract `[n; 20]`
            let answers = calls
                .iter()
                .rev()
                .map(|call| {
                    let data = call["params"][0]["data"].as_str().unwrap();
                    let last_byte = &data[data.len() - 2..];
                    serde_json::json!({
                        "jsonrpc": "2.0",
                        "id": call["id"],
                        "result": format!("0x{}{}", "0".repeat(24), last_byte.repeat(20)),
                    })
                })
                .collect::<Vec<_>>();
            Ok(parse(&serde_json::Value::Array(answers).to_string()))
        })
        .unwrap();

        assert_eq!(
            chunks,
            vec![
                vec![serde_json::json!(0), serde_json::json!(1)],
                vec![serde_json::json!(0), serde_json::json!(1)],
                vec![serde_json::json!(0)],
            ]
        );
        assert_eq!(outputs.len(), 5);
        for id in 1..=5u8 {
            assert_eq!(outputs[&id], CallOutput::Address(Address::from([id; 20])));
        }
    }

    #[test]
    fn failing_chunk_fails_the_execution() {
        let requests = (1..=3u64)
            .map(|id| CallRequest::new(id, registry(), ContractCall::Validator(id)))
            .collect::<Vec<_>>();
        let mut sent = 0;
        let result = execute_chunked(requests, BlockRef::Latest, 1, |_| {
            sent += 1;
            Err(BatchError::Transport("connection reset".into()))
        });
        assert!(matches!(result, Err(BatchError::Transport(_))));
        assert_eq!(sent, 1);
    }

    #[test]
    fn empty_batch_sends_nothing() {
        // unroutable url: any request would fail
        let caller = RpcBatchCaller::new("http://127.0.0.1:9", 0);
        let outputs = caller
            .execute(Vec::<CallRequest<u8>>::new(), BlockRef::Latest)
            .unwrap();
        assert!(outputs.is_empty());
    }
}
