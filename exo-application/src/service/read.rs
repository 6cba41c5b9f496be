//! Read service
//!
//! # Usage
//!
//! ```rust,no_run
//! use exo_application::{ContextAllocator, ContextKind, ReadService};
//!
//! let service = ReadService::default();
//! let mut contexts = ContextAllocator::new();
//! let requests = service.prepare(&mut contexts, ContextKind::Peek, &["0:100", "0:101"]);
//! // send every request, then feed the `update` answers to `ReadService::collect`
//! ```

use crate::batcher::{BatchSettings, PointBatcher};
use crate::correlation::{ContextAllocator, ContextKind};
use crate::error_codes::{ErrorDetail, ErrorTranslator};
use crate::pdu::{Message, UpdateParams};
use exo_core::{PointAddress, PointValue};
use std::collections::BTreeMap;

/// Values and device errors of a read
///
/// An address present in `errors` always maps to `None` in `values`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadResult {
    pub values: BTreeMap<PointAddress, Option<PointValue>>,
    pub errors: BTreeMap<PointAddress, ErrorDetail>,
}

impl ReadResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the value of an address, if one was reported
    pub fn value(&self, address: &PointAddress) -> Option<&PointValue> {
        self.values.get(address).and_then(Option::as_ref)
    }

    /// Get the device error of an address
    pub fn error(&self, address: &PointAddress) -> Option<&ErrorDetail> {
        self.errors.get(address)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.errors.is_empty()
    }

    /// Merge the points of one `update`
    ///
    /// Codes 0 or absent are success. Any other code forces the value to
    /// `None` and records the translated error.
    pub fn merge_update(&mut self, update: &UpdateParams, translator: &ErrorTranslator) {
        for block in &update.devices {
            for (index, item) in block.items.iter().enumerate() {
                let address = PointAddress::new(block.device, *item);
                let code = block.errors.get(index).copied().flatten().unwrap_or(0);
                if code != 0 {
                    let detail = translator.detail(code);
                    log::debug!("Read error for {}: {} ({})", address, code, detail.text);
                    self.values.insert(address, None);
                    self.errors.insert(address, detail);
                } else {
                    let value = block.values.get(index).filter(|v| !v.is_null()).cloned();
                    self.values.insert(address, value);
                    self.errors.remove(&address);
                }
            }
        }
    }

    /// Drop the error map, keeping only values
    pub fn into_values(self) -> BTreeMap<PointAddress, Option<PointValue>> {
        self.values
    }
}

/// Prepares chunked read requests and collects their answers
#[derive(Debug, Clone, Default)]
pub struct ReadService {
    batcher: PointBatcher,
}

impl ReadService {
    pub fn new(settings: BatchSettings) -> Self {
        Self {
            batcher: PointBatcher::new(settings),
        }
    }

    /// Build one `read` per chunk
    ///
    /// # Arguments
    ///
    /// * `contexts` - Allocator the correlation ids are drawn from
    /// * `kind` - Peek for plain reads, advise for subscriptions
    /// * `addresses` - `device:item` addresses; malformed ones are skipped
    ///
    /// # Returns
    ///
    /// Correlation id and message of each request, empty if no address is valid
    pub fn prepare<S: AsRef<str>>(
        &self,
        contexts: &mut ContextAllocator,
        kind: ContextKind,
        addresses: &[S],
    ) -> Vec<(u32, Message)> {
        self.batcher
            .chunks(addresses)
            .into_iter()
            .map(|chunk| {
                let context = contexts.next(kind);
                (context, Message::read(context, chunk.device, chunk.items))
            })
            .collect()
    }

    /// Merge the answers of every chunk into one result
    pub fn collect<I>(&self, updates: I, translator: &ErrorTranslator) -> ReadResult
    where
        I: IntoIterator<Item = UpdateParams>,
    {
        let mut result = ReadResult::new();
        for update in updates {
            result.merge_update(&update, translator);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdu::DeviceUpdate;
    use serde_json::json;

    fn update(device: u32, items: Vec<u32>, values: Vec<PointValue>, errors: Vec<Option<i64>>) -> UpdateParams {
        UpdateParams {
            devices: vec![DeviceUpdate {
                device,
                items,
                values,
                errors,
            }],
        }
    }

    #[test]
    fn test_prepare_chunks_and_contexts() {
        let service = ReadService::default();
        let mut contexts = ContextAllocator::new();
        let mut addresses: Vec<String> = (0..90).map(|i| format!("0:{}", i)).collect();
        addresses.push("4:1".to_string());
        addresses.push("oops".to_string());

        let requests = service.prepare(&mut contexts, ContextKind::Peek, &addresses);
        let ids: Vec<u32> = requests.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
        match &requests[2].1 {
            Message::Read { context, params } => {
                assert_eq!(*context, 2);
                assert_eq!(params.devices[0].device, 4);
                assert_eq!(params.devices[0].items, vec![1]);
            }
            other => panic!("unexpected message {:?}", other),
        }

        let advise = service.prepare(&mut contexts, ContextKind::Advise, &["0:1"]);
        assert_eq!(advise[0].0, 200_100);
    }

    #[test]
    fn test_prepare_empty() {
        let service = ReadService::default();
        let mut contexts = ContextAllocator::new();
        let none: [&str; 0] = [];
        assert!(service.prepare(&mut contexts, ContextKind::Peek, &none).is_empty());
        assert!(service.prepare(&mut contexts, ContextKind::Peek, &["bad"]).is_empty());
    }

    #[test]
    fn test_collect_values_and_errors() {
        let service = ReadService::default();
        let translator = ErrorTranslator::builtin();
        let result = service.collect(
            vec![
                update(0, vec![100, 101, 102], vec![json!(21.5), json!(1), json!(7)], vec![Some(0), None, Some(19)]),
                update(1, vec![5, 6], vec![json!("on")], vec![]),
            ],
            &translator,
        );

        assert_eq!(result.value(&PointAddress::new(0, 100)), Some(&json!(21.5)));
        assert_eq!(result.value(&PointAddress::new(0, 101)), Some(&json!(1)));
        assert_eq!(result.values.get(&PointAddress::new(0, 102)), Some(&None));
        assert_eq!(
            result.error(&PointAddress::new(0, 102)),
            Some(&ErrorDetail {
                code: 19,
                text: "The variable does not exist".to_string()
            })
        );
        assert_eq!(result.value(&PointAddress::new(1, 5)), Some(&json!("on")));
        assert_eq!(result.values.get(&PointAddress::new(1, 6)), Some(&None));
        assert_eq!(result.errors.len(), 1);
    }

    #[test]
    fn test_unknown_code_fallback() {
        let translator = ErrorTranslator::builtin();
        let mut result = ReadResult::new();
        result.merge_update(&update(0, vec![9], vec![json!(3)], vec![Some(4242)]), &translator);
        assert_eq!(result.error(&PointAddress::new(0, 9)).unwrap().text, "Unknown error 4242");
        assert!(result.value(&PointAddress::new(0, 9)).is_none());
    }
}
